//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use bookshelf_host::config::ConfigResolver;
use tempfile::TempDir;

pub const BASE_CONNECTION: &str = "Server=db;Database=Bookshelf;User Id=app";

pub const SEED_DATA: &str = r#"{
    "collections": {
        "books": [
            {"title": "Dune", "year": 1965},
            {"title": "Solaris", "year": 1961}
        ],
        "authors": [
            {"name": "Frank Herbert"}
        ]
    }
}"#;

/// Temporary content root with a `wwwroot` directory.
pub struct ContentRoot {
    dir: TempDir,
}

impl ContentRoot {
    pub fn empty() -> Self {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join("wwwroot")).unwrap();
        Self { dir }
    }

    /// Base settings with the default connection string plus seed data.
    pub fn with_defaults() -> Self {
        let root = Self::empty();
        root.write_settings(
            "appsettings.json",
            &format!(r#"{{"ConnectionStrings": {{"DefaultConnection": "{BASE_CONNECTION}"}}}}"#),
        );
        root.write_web_file("seed-data.json", SEED_DATA);
        root
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn write_settings(&self, name: &str, content: &str) {
        fs::write(self.path().join(name), content).unwrap();
    }

    pub fn write_web_file(&self, name: &str, content: &str) {
        fs::write(self.path().join("wwwroot").join(name), content).unwrap();
    }

    /// Initialise a repository at the content root with `branch` checked out.
    pub fn init_repository(&self, branch: &str) {
        let repo = git2::Repository::init(self.path()).unwrap();
        repo.set_head(&format!("refs/heads/{branch}")).unwrap();
    }

    /// Resolver isolated from the process environment.
    pub fn resolver(&self, environment: &str) -> ConfigResolver {
        ConfigResolver::new(self.path(), environment)
            .with_env_vars(std::iter::empty::<(String, String)>())
    }
}
