use crate::di::Lifetime;

/// Errors raised while building or resolving the service graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DiError {
    #[error("no registration for {service}")]
    NotRegistered { service: &'static str },

    #[error("required service {service} was never registered")]
    MissingRegistration { service: &'static str },

    /// A scoped service was requested outside a scope, or by a singleton.
    #[error("{service} is scoped and cannot be resolved from the root provider")]
    ScopeRequired { service: &'static str },

    #[error("{service} registered as {first:?} and later as {second:?}")]
    LifetimeConflict {
        service: &'static str,
        first: Lifetime,
        second: Lifetime,
    },

    #[error("dependency cycle: {}", chain.join(" -> "))]
    Cycle { chain: Vec<&'static str> },

    #[error("failed to construct {service}: {message}")]
    Construction {
        service: &'static str,
        message: String,
    },

    #[error("validation of {service} failed: {source}")]
    Validation {
        service: &'static str,
        #[source]
        source: Box<DiError>,
    },

    #[error("registry lock poisoned")]
    Poisoned,
}

impl DiError {
    /// Wrap a factory failure for service `T`.
    pub fn construction<T: ?Sized>(error: impl std::fmt::Display) -> Self {
        Self::Construction {
            service: std::any::type_name::<T>(),
            message: error.to_string(),
        }
    }
}
