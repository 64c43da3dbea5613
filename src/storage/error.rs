use std::path::PathBuf;

use crate::storage::connection::ConnectionStringError;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The server named in the connection string cannot be reached.
    #[error("store unreachable: {0}")]
    Unreachable(String),

    #[error("invalid connection string: {0}")]
    InvalidConnectionString(#[from] ConnectionStringError),

    #[error("connection string has no catalog component")]
    MissingCatalog,

    /// The collection has not been created by any migration.
    #[error("unknown collection '{0}'")]
    UnknownCollection(String),

    /// A schema step could not be applied.
    #[error("migration {version} ({name}) failed: {reason}")]
    MigrationStep {
        version: u32,
        name: &'static str,
        reason: String,
    },

    /// A lock guarding store state was poisoned by a panicking holder.
    #[error("store state poisoned")]
    Poisoned,
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Startup schema migration failed. The process must not serve traffic.
#[derive(Debug, thiserror::Error)]
#[error("database migration failed: {source}")]
pub struct MigrationError {
    #[from]
    pub source: StoreError,
}

/// Startup seeding failed. The process must not serve traffic.
#[derive(Debug, thiserror::Error)]
pub enum SeedError {
    #[error("failed to read seed data {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed seed data {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to insert seed data: {0}")]
    Store(#[from] StoreError),
}
