//! Hosting environment.
//!
//! # Data Flow
//! ```text
//! APP_ENVIRONMENT + content root
//!     → branch.rs (repository discovery from the web root)
//!     → HostEnvironment (immutable, shared via Arc)
//!     → AppInformation (branch name, injectable)
//! ```

pub mod branch;
pub mod environment;

pub use environment::{environment_name_from_process, AppInformation, HostEnvironment};
