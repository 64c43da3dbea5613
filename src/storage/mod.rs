//! Storage subsystem.
//!
//! # Data Flow
//! ```text
//! ConnectionStrings:DefaultConnection
//!     → connection.rs (branch suffix in development)
//!     → StoreOptions → StoreFactory (singleton)
//!
//! Startup (one handle):
//!     StoreFactory::acquire → migrator.rs → seed.rs → drop (release)
//!
//! Per request:
//!     ServiceScope → StoreHandle (scoped) → released with the scope
//! ```
//!
//! # Design Decisions
//! - Migration and seeding are the only startup writers
//! - Mutual exclusion between concurrent migrators is the store's job
//! - Seeding pre-checks each collection instead of relying on conflicts

pub mod connection;
pub mod error;
pub mod handle;
pub mod memory;
pub mod migrator;
pub mod seed;
pub mod store;

pub use connection::{compose, sanitize_branch, ConnectionString};
pub use error::{MigrationError, SeedError, StoreError, StoreResult};
pub use handle::{StoreFactory, StoreHandle, StoreOptions};
pub use memory::InMemoryStore;
pub use migrator::{MigrationReport, StartupMigrator, MIGRATIONS};
pub use seed::{SeedOrchestrator, SeedReport};
pub use store::{Migration, SchemaStep, StoreConnector, StoreSession};
