//! Routing subsystem.
//!
//! # Data Flow
//! ```text
//! Request path
//!     → router.rs (ordered route table)
//!     → matcher.rs (template segments, defaults)
//!     → RouteValues { controller, action, id? } or NoMatch
//!
//! Route compilation (at composition):
//!     template strings → RouteTemplate → RouteTable (singleton)
//! ```
//!
//! # Design Decisions
//! - Routes compiled at startup, immutable at runtime
//! - Deterministic: same path always matches the same route
//! - First match wins (registration order)

pub mod matcher;
pub mod router;

pub use matcher::{RouteTemplate, RouteTemplateError, RouteValues};
pub use router::{RouteMatch, RouteTable, DEFAULT_ROUTE_NAME, DEFAULT_ROUTE_TEMPLATE};
