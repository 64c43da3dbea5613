//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! appsettings.json
//!     → appsettings.{Environment}.json   (optional)
//!     → process environment (A__B → A:B)
//!     → in-process overrides (--set, tests)
//!     → Settings (flattened, immutable)
//!     → passed by reference to the composition root
//!
//! On file change:
//!     watcher.rs detects change
//!     → loader.rs re-resolves every layer
//!     → LiveSettings swaps in the new snapshot
//! ```
//!
//! # Design Decisions
//! - A missing file is an empty layer; a malformed one is fatal
//! - Later layers only override the keys they define
//! - Keys compare case-insensitively

pub mod loader;
pub mod settings;
pub mod watcher;

pub use loader::{resolve, ConfigError, ConfigResolver};
pub use settings::{MissingConfiguration, Settings};
pub use watcher::{LiveSettings, SettingsWatcher};
