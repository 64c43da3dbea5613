//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, TraceLayer)
//!     → request.rs (request ID, task-local request context)
//!     → /static/* → ServeDir over the web root
//!     → otherwise RouteTable match → per-request ServiceScope → handler
//!     → JSON response (errors rendered per environment)
//! ```

pub mod request;
pub mod server;

pub use request::{request_context_middleware, X_REQUEST_ID};
pub use server::{AppState, HttpServer, ERROR_PATH, STATIC_PREFIX};
