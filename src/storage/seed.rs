//! Default data insertion after migration.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::storage::error::SeedError;
use crate::storage::handle::StoreHandle;

/// Bundled seed file, relative to the data source directory.
pub const SEED_FILE_NAME: &str = "seed-data.json";

/// Contents of the seed file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SeedData {
    /// Records per collection. Collections are seeded in key order.
    #[serde(default)]
    pub collections: BTreeMap<String, Vec<Value>>,
}

impl SeedData {
    pub fn load(data_source_path: &Path) -> Result<Self, SeedError> {
        let path = seed_file(data_source_path);
        let content = fs::read_to_string(&path).map_err(|source| SeedError::Read {
            path: path.clone(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| SeedError::Parse { path, source })
    }
}

pub fn seed_file(data_source_path: &Path) -> PathBuf {
    data_source_path.join(SEED_FILE_NAME)
}

/// What a seeding pass did.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SeedReport {
    /// Collections that were empty and received default rows, with row counts.
    pub seeded: BTreeMap<String, usize>,
    /// Collections that already held data and were left alone.
    pub skipped: Vec<String>,
}

impl SeedReport {
    pub fn is_noop(&self) -> bool {
        self.seeded.is_empty()
    }
}

/// Ensures the store holds its default data.
#[derive(Debug, Clone, Copy, Default)]
pub struct SeedOrchestrator;

impl SeedOrchestrator {
    pub fn new() -> Self {
        Self
    }

    /// Seed from `{data_source_path}/seed-data.json`.
    ///
    /// A collection is seeded only if it is empty when checked, so running
    /// this against an already-seeded store changes nothing.
    pub fn seed(&self, handle: &StoreHandle, data_source_path: &Path) -> Result<SeedReport, SeedError> {
        let data = SeedData::load(data_source_path)?;
        self.seed_with(handle, &data)
    }

    pub fn seed_with(&self, handle: &StoreHandle, data: &SeedData) -> Result<SeedReport, SeedError> {
        let report = handle.with_session(|session| {
            let mut report = SeedReport::default();
            for (collection, records) in &data.collections {
                if session.count(collection)? > 0 {
                    report.skipped.push(collection.clone());
                    continue;
                }
                let inserted = session.insert(collection, records)?;
                report.seeded.insert(collection.clone(), inserted);
            }
            Ok(report)
        })?;

        if report.is_noop() {
            tracing::info!(skipped = report.skipped.len(), "Default data already present");
        } else {
            tracing::info!(
                collections = report.seeded.len(),
                rows = report.seeded.values().sum::<usize>(),
                "Default data inserted"
            );
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::handle::{StoreFactory, StoreOptions};
    use crate::storage::memory::InMemoryStore;
    use crate::storage::migrator::StartupMigrator;
    use crate::storage::store::StoreSession;
    use std::sync::Arc;
    use tempfile::TempDir;

    const SEED: &str = r#"{
        "collections": {
            "books": [ { "title": "Refactoring" }, { "title": "Domain-Driven Design" } ],
            "authors": [ { "name": "Martin Fowler" } ]
        }
    }"#;

    fn migrated_handle(store: &InMemoryStore) -> StoreHandle {
        let factory = StoreFactory::new(Arc::new(store.clone()), StoreOptions::new("Server=s;Database=App"));
        let handle = factory.acquire().unwrap();
        StartupMigrator::default().migrate(&handle).unwrap();
        handle
    }

    fn count(handle: &StoreHandle, collection: &str) -> usize {
        handle.with_session(|s: &mut dyn StoreSession| s.count(collection)).unwrap()
    }

    #[test]
    fn test_seed_twice_is_idempotent() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SEED_FILE_NAME), SEED).unwrap();
        let store = InMemoryStore::new();
        let handle = migrated_handle(&store);

        let first = SeedOrchestrator::new().seed(&handle, dir.path()).unwrap();
        assert_eq!(first.seeded.get("books"), Some(&2));
        let books_after_first = count(&handle, "books");

        let second = SeedOrchestrator::new().seed(&handle, dir.path()).unwrap();
        assert!(second.is_noop());
        assert_eq!(second.skipped, vec!["authors", "books"]);
        assert_eq!(count(&handle, "books"), books_after_first);
        assert_eq!(count(&handle, "authors"), 1);
    }

    #[test]
    fn test_missing_seed_file() {
        let dir = TempDir::new().unwrap();
        let store = InMemoryStore::new();
        let handle = migrated_handle(&store);

        let err = SeedOrchestrator::new().seed(&handle, dir.path()).unwrap_err();
        assert!(matches!(err, SeedError::Read { .. }));
    }

    #[test]
    fn test_malformed_seed_file() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(SEED_FILE_NAME), "{ \"collections\": [").unwrap();
        let store = InMemoryStore::new();
        let handle = migrated_handle(&store);

        let err = SeedOrchestrator::new().seed(&handle, dir.path()).unwrap_err();
        assert!(matches!(err, SeedError::Parse { .. }));
    }

    #[test]
    fn test_unmigrated_collection_fails() {
        let store = InMemoryStore::new();
        let factory = StoreFactory::new(Arc::new(store), StoreOptions::new("Server=s;Database=App"));
        let handle = factory.acquire().unwrap();
        let data: SeedData = serde_json::from_str(SEED).unwrap();

        let err = SeedOrchestrator::new().seed_with(&handle, &data).unwrap_err();
        assert!(matches!(err, SeedError::Store(_)));
    }
}
