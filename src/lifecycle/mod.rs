//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Resolve config → Detect environment → Compose provider
//!     → Acquire store handle → Migrate → Seed → Release handle
//!     → ReadyHost
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain connections → Exit
//!
//! Signals (signals.rs):
//!     SIGINT (Ctrl+C) → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Ordered startup: config first, then composition, then the store, then listeners
//! - Migration and seeding happen exactly once per process start
//! - A startup failure never leaves a store handle open

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::Shutdown;
pub use signals::spawn_ctrl_c_handler;
pub use startup::{start, start_with, Host, ReadyHost, StartupError};
