//! In-process store.
//!
//! Models one database server hosting any number of catalogs. Catalogs are
//! created on first connect, so branch-suffixed catalogs live side by side
//! with the base one.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde_json::Value;

use crate::storage::connection::ConnectionString;
use crate::storage::error::{StoreError, StoreResult};
use crate::storage::store::{Migration, SchemaStep, StoreConnector, StoreSession};

#[derive(Debug, Clone, Default)]
struct Catalog {
    applied: BTreeSet<u32>,
    collections: BTreeMap<String, Vec<Value>>,
}

impl Catalog {
    fn apply(&mut self, migration: &Migration) -> StoreResult<()> {
        let fail = |reason: String| StoreError::MigrationStep {
            version: migration.version,
            name: migration.name,
            reason,
        };

        for step in migration.steps {
            match *step {
                SchemaStep::CreateCollection(name) => {
                    if self.collections.contains_key(name) {
                        return Err(fail(format!("collection '{name}' already exists")));
                    }
                    self.collections.insert(name.to_string(), Vec::new());
                }
            }
        }
        self.applied.insert(migration.version);
        Ok(())
    }
}

#[derive(Debug)]
struct ServerState {
    catalogs: DashMap<String, Arc<Mutex<Catalog>>>,
    reachable: AtomicBool,
    migration_lock: Mutex<()>,
    open_sessions: AtomicUsize,
}

/// A thread-safe in-memory database server.
///
/// Cloning shares the same server.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    inner: Arc<ServerState>,
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(ServerState {
                catalogs: DashMap::new(),
                reachable: AtomicBool::new(true),
                migration_lock: Mutex::new(()),
                open_sessions: AtomicUsize::new(0),
            }),
        }
    }

    /// Simulate the server going away (or coming back).
    pub fn set_reachable(&self, reachable: bool) {
        self.inner.reachable.store(reachable, Ordering::SeqCst);
    }

    /// Names of every catalog created so far, sorted.
    pub fn catalog_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.catalogs.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    /// Sessions currently open against this server.
    pub fn open_sessions(&self) -> usize {
        self.inner.open_sessions.load(Ordering::SeqCst)
    }

    /// Collection names present in `catalog`.
    pub fn collections(&self, catalog: &str) -> Vec<String> {
        let Some(entry) = self.inner.catalogs.get(catalog) else {
            return Vec::new();
        };
        let names = match entry.lock() {
            Ok(catalog) => catalog.collections.keys().cloned().collect(),
            Err(_) => Vec::new(),
        };
        names
    }
}

impl StoreConnector for InMemoryStore {
    fn connect(&self, connection_string: &str) -> StoreResult<Box<dyn StoreSession>> {
        let parsed = ConnectionString::parse(connection_string)?;
        let server = parsed.server().unwrap_or("(local)").to_string();
        if !self.inner.reachable.load(Ordering::SeqCst) {
            return Err(StoreError::Unreachable(server));
        }

        let catalog_name = parsed.catalog().ok_or(StoreError::MissingCatalog)?;
        let catalog = self
            .inner
            .catalogs
            .entry(catalog_name.to_string())
            .or_default()
            .clone();

        self.inner.open_sessions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(InMemorySession {
            server: self.inner.clone(),
            server_name: server,
            catalog,
        }))
    }
}

struct InMemorySession {
    server: Arc<ServerState>,
    server_name: String,
    catalog: Arc<Mutex<Catalog>>,
}

impl InMemorySession {
    fn ensure_reachable(&self) -> StoreResult<()> {
        if self.server.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Unreachable(self.server_name.clone()))
        }
    }

    fn read<R>(&self, f: impl FnOnce(&Catalog) -> StoreResult<R>) -> StoreResult<R> {
        self.ensure_reachable()?;
        let catalog = self.catalog.lock().map_err(|_| StoreError::Poisoned)?;
        f(&catalog)
    }
}

impl Drop for InMemorySession {
    fn drop(&mut self) {
        self.server.open_sessions.fetch_sub(1, Ordering::SeqCst);
    }
}

impl StoreSession for InMemorySession {
    fn applied_migrations(&self) -> StoreResult<Vec<u32>> {
        self.read(|c| Ok(c.applied.iter().copied().collect()))
    }

    fn apply_migrations(&mut self, pending: &[Migration]) -> StoreResult<Vec<u32>> {
        self.ensure_reachable()?;
        let _exclusive = self
            .server
            .migration_lock
            .lock()
            .map_err(|_| StoreError::Poisoned)?;
        let mut catalog = self.catalog.lock().map_err(|_| StoreError::Poisoned)?;

        let mut applied = Vec::new();
        for migration in pending {
            if catalog.applied.contains(&migration.version) {
                tracing::debug!(version = migration.version, "Migration already applied by another session");
                continue;
            }
            // Work on a copy so a failing step leaves the catalog untouched.
            let mut next = catalog.clone();
            next.apply(migration)?;
            *catalog = next;
            applied.push(migration.version);
        }
        Ok(applied)
    }

    fn count(&self, collection: &str) -> StoreResult<usize> {
        self.read(|c| {
            c.collections
                .get(collection)
                .map(Vec::len)
                .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
        })
    }

    fn insert(&mut self, collection: &str, records: &[Value]) -> StoreResult<usize> {
        self.ensure_reachable()?;
        let mut catalog = self.catalog.lock().map_err(|_| StoreError::Poisoned)?;
        let rows = catalog
            .collections
            .get_mut(collection)
            .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))?;
        rows.extend(records.iter().cloned());
        Ok(records.len())
    }

    fn list(&self, collection: &str) -> StoreResult<Vec<Value>> {
        self.read(|c| {
            c.collections
                .get(collection)
                .cloned()
                .ok_or_else(|| StoreError::UnknownCollection(collection.to_string()))
        })
    }
}
