use serde_json::Value;

use crate::storage::error::StoreResult;

/// One schema change applied to a catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaStep {
    CreateCollection(&'static str),
}

/// A versioned, ordered group of schema steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Migration {
    pub version: u32,
    pub name: &'static str,
    pub steps: &'static [SchemaStep],
}

/// Opens sessions against a store.
///
/// The connection string handed to `connect` is the only one the store layer
/// ever sees.
pub trait StoreConnector: Send + Sync {
    fn connect(&self, connection_string: &str) -> StoreResult<Box<dyn StoreSession>>;
}

/// A live session against one catalog.
///
/// Implementations must satisfy these invariants:
/// - `apply_migrations` is exclusive across every session and process that
///   shares the catalog (a store-level lock), and skips versions that were
///   applied by someone else while waiting for the lock.
/// - A migration either applies completely or not at all.
pub trait StoreSession: Send {
    /// Versions already applied to the catalog, ascending.
    fn applied_migrations(&self) -> StoreResult<Vec<u32>>;

    /// Apply `pending` in order. Returns the versions this call applied.
    fn apply_migrations(&mut self, pending: &[Migration]) -> StoreResult<Vec<u32>>;

    /// Number of records in `collection`.
    fn count(&self, collection: &str) -> StoreResult<usize>;

    /// Append `records` to `collection`. Returns the number inserted.
    fn insert(&mut self, collection: &str, records: &[Value]) -> StoreResult<usize>;

    /// All records in `collection`, in insertion order.
    fn list(&self, collection: &str) -> StoreResult<Vec<Value>>;
}
