//! Startup schema migration.

use crate::storage::error::MigrationError;
use crate::storage::handle::StoreHandle;
use crate::storage::store::{Migration, SchemaStep};

/// Schema history of the bookshelf catalog, oldest first.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "InitialCreate",
        steps: &[
            SchemaStep::CreateCollection("books"),
            SchemaStep::CreateCollection("authors"),
            SchemaStep::CreateCollection("book_authors"),
        ],
    },
    Migration {
        version: 2,
        name: "AddReviews",
        steps: &[SchemaStep::CreateCollection("reviews")],
    },
    Migration {
        version: 3,
        name: "AddOrders",
        steps: &[
            SchemaStep::CreateCollection("orders"),
            SchemaStep::CreateCollection("line_items"),
        ],
    },
];

/// Outcome of a migration run.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MigrationReport {
    pub applied: Vec<u32>,
    pub current_version: Option<u32>,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        self.applied.is_empty()
    }
}

/// Applies outstanding migrations before the host serves traffic.
#[derive(Debug, Clone, Copy)]
pub struct StartupMigrator {
    migrations: &'static [Migration],
}

impl Default for StartupMigrator {
    fn default() -> Self {
        Self::new(MIGRATIONS)
    }
}

impl StartupMigrator {
    pub fn new(migrations: &'static [Migration]) -> Self {
        Self { migrations }
    }

    /// Apply every migration the store has not seen yet, in version order.
    ///
    /// Blocks until done. There is no partial success: any failure is
    /// returned and the caller must not proceed to serve requests.
    pub fn migrate(&self, handle: &StoreHandle) -> Result<MigrationReport, MigrationError> {
        let report = handle.with_session(|session| {
            let applied = session.applied_migrations()?;
            let mut pending: Vec<Migration> = self
                .migrations
                .iter()
                .filter(|m| !applied.contains(&m.version))
                .copied()
                .collect();
            pending.sort_by_key(|m| m.version);

            if pending.is_empty() {
                tracing::info!(version = ?applied.last(), "Database schema is up to date");
            } else {
                tracing::info!(
                    pending = pending.len(),
                    first = pending[0].version,
                    "Applying database migrations"
                );
            }

            let newly_applied = session.apply_migrations(&pending)?;
            let current_version = session.applied_migrations()?.last().copied();
            Ok(MigrationReport {
                applied: newly_applied,
                current_version,
            })
        })?;

        for version in &report.applied {
            let name = self
                .migrations
                .iter()
                .find(|m| m.version == *version)
                .map_or("?", |m| m.name);
            tracing::info!(version, name, "Migration applied");
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::handle::{StoreFactory, StoreOptions};
    use crate::storage::memory::InMemoryStore;
    use std::sync::{Arc, Barrier};
    use std::thread;

    fn factory(store: &InMemoryStore) -> StoreFactory {
        StoreFactory::new(Arc::new(store.clone()), StoreOptions::new("Server=s;Database=App"))
    }

    #[test]
    fn test_fresh_store_gets_every_migration() {
        let store = InMemoryStore::new();
        let handle = factory(&store).acquire().unwrap();

        let report = StartupMigrator::default().migrate(&handle).unwrap();
        assert_eq!(report.applied, vec![1, 2, 3]);
        assert_eq!(report.current_version, Some(3));
        assert!(store.collections("App").contains(&"orders".to_string()));
    }

    #[test]
    fn test_already_migrated_store_is_untouched() {
        let store = InMemoryStore::new();
        let handle = factory(&store).acquire().unwrap();
        StartupMigrator::default().migrate(&handle).unwrap();
        let before = store.collections("App");

        let report = StartupMigrator::default().migrate(&handle).unwrap();
        assert!(report.is_noop());
        assert_eq!(report.current_version, Some(3));
        assert_eq!(store.collections("App"), before);
    }

    #[test]
    fn test_only_pending_migrations_applied() {
        let store = InMemoryStore::new();
        let handle = factory(&store).acquire().unwrap();
        StartupMigrator::new(&MIGRATIONS[..1]).migrate(&handle).unwrap();

        let report = StartupMigrator::default().migrate(&handle).unwrap();
        assert_eq!(report.applied, vec![2, 3]);
    }

    #[test]
    fn test_store_lost_mid_run_is_an_error() {
        let store = InMemoryStore::new();
        let handle = factory(&store).acquire().unwrap();
        store.set_reachable(false);

        assert!(StartupMigrator::default().migrate(&handle).is_err());
    }

    #[test]
    fn test_failing_step_is_an_error() {
        const CONFLICTING: &[Migration] = &[
            Migration {
                version: 1,
                name: "First",
                steps: &[SchemaStep::CreateCollection("books")],
            },
            Migration {
                version: 2,
                name: "Again",
                steps: &[SchemaStep::CreateCollection("books")],
            },
        ];
        let store = InMemoryStore::new();
        let handle = factory(&store).acquire().unwrap();

        let err = StartupMigrator::new(CONFLICTING).migrate(&handle).unwrap_err();
        assert!(err.to_string().contains("Again"));
    }

    #[test]
    fn test_concurrent_migrators_apply_each_version_once() {
        let store = InMemoryStore::new();
        let factory = Arc::new(factory(&store));
        let barrier = Arc::new(Barrier::new(2));

        let workers: Vec<_> = (0..2)
            .map(|_| {
                let factory = factory.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    let handle = factory.acquire().unwrap();
                    barrier.wait();
                    StartupMigrator::default().migrate(&handle).unwrap()
                })
            })
            .collect();
        let reports: Vec<MigrationReport> =
            workers.into_iter().map(|w| w.join().unwrap()).collect();

        let mut applied: Vec<u32> = reports.iter().flat_map(|r| r.applied.clone()).collect();
        applied.sort_unstable();
        assert_eq!(applied, vec![1, 2, 3]);
        assert!(reports.iter().all(|r| r.current_version == Some(3)));
        assert_eq!(
            store.collections("App"),
            vec!["authors", "book_authors", "books", "line_items", "orders", "reviews"]
        );
        assert_eq!(factory.open_handles(), 0);
    }
}
