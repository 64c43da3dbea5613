//! Service registry.
//!
//! # Data Flow
//! ```text
//! Phase 1: native registrations      → ServiceCollection
//! Phase 2: ServiceModule::load        → same ServiceCollection (additive / override)
//! Phase 3: ContainerBuilder::build    → fold (last wins) → validate singletons
//!                                     → ServiceProvider (immutable)
//!
//! Per request:
//!     ServiceProvider::create_scope → ServiceScope → scoped instances
//!     → dropped with the scope
//! ```
//!
//! # Design Decisions
//! - Services are keyed by type (`TypeId`), including trait objects
//! - Singletons are built against the root, never against a scope
//! - Overrides may not change a service's lifetime

pub mod builder;
pub mod collection;
pub mod error;
pub mod provider;

pub use builder::{ContainerBuilder, ServiceModule};
pub use collection::{Lifetime, RegistrationSource, ServiceCollection, ServiceDescriptor};
pub use error::DiError;
pub use provider::{Resolver, ServiceProvider, ServiceScope};
