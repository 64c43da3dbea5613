//! Description of the running host.

use std::path::{Path, PathBuf};

use crate::hosting::branch::detect_branch;

/// Environment variable naming the hosting environment.
pub const ENVIRONMENT_VARIABLE: &str = "APP_ENVIRONMENT";

pub const DEVELOPMENT: &str = "Development";
pub const PRODUCTION: &str = "Production";

/// Directory under the content root holding static files and seed data.
pub const WEB_ROOT_DIR: &str = "wwwroot";

/// Process-wide, read-only description of the running environment.
///
/// Built once at startup and shared via `Arc`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostEnvironment {
    environment_name: String,
    content_root: PathBuf,
    web_root: PathBuf,
    branch_name: Option<String>,
}

impl HostEnvironment {
    /// Build from explicit parts. Performs no filesystem inspection.
    pub fn new(
        environment_name: impl Into<String>,
        content_root: impl Into<PathBuf>,
        branch_name: Option<String>,
    ) -> Self {
        let content_root = content_root.into();
        Self {
            environment_name: environment_name.into(),
            web_root: content_root.join(WEB_ROOT_DIR),
            content_root,
            branch_name: branch_name.filter(|b| !b.is_empty()),
        }
    }

    /// Build for `content_root`, detecting the checked-out branch.
    ///
    /// Branch detection looks at the web root first and falls back to the
    /// content root. A failed lookup yields no branch.
    pub fn detect(environment_name: impl Into<String>, content_root: impl Into<PathBuf>) -> Self {
        let content_root = content_root.into();
        let web_root = content_root.join(WEB_ROOT_DIR);
        let search_from = if web_root.is_dir() { &web_root } else { &content_root };
        let branch_name = detect_branch(search_from);

        tracing::debug!(
            search_from = %search_from.display(),
            branch = branch_name.as_deref().unwrap_or("<none>"),
            "Branch detection finished"
        );

        Self::new(environment_name, content_root, branch_name)
    }

    pub fn environment_name(&self) -> &str {
        &self.environment_name
    }

    pub fn is_development(&self) -> bool {
        self.is_environment(DEVELOPMENT)
    }

    pub fn is_production(&self) -> bool {
        self.is_environment(PRODUCTION)
    }

    pub fn is_environment(&self, name: &str) -> bool {
        self.environment_name.eq_ignore_ascii_case(name)
    }

    pub fn content_root(&self) -> &Path {
        &self.content_root
    }

    pub fn web_root(&self) -> &Path {
        &self.web_root
    }

    pub fn branch_name(&self) -> Option<&str> {
        self.branch_name.as_deref()
    }
}

/// Environment name from [`ENVIRONMENT_VARIABLE`], defaulting to production.
pub fn environment_name_from_process() -> String {
    std::env::var(ENVIRONMENT_VARIABLE)
        .ok()
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| PRODUCTION.to_string())
}

/// Injectable application facts derived at startup.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppInformation {
    branch_name: Option<String>,
}

impl AppInformation {
    pub fn new(branch_name: Option<String>) -> Self {
        Self { branch_name }
    }

    pub fn branch_name(&self) -> Option<&str> {
        self.branch_name.as_deref()
    }
}

impl From<&HostEnvironment> for AppInformation {
    fn from(env: &HostEnvironment) -> Self {
        Self::new(env.branch_name.clone())
    }
}
