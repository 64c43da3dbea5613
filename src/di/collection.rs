//! Neutral registration set shared by native code and service modules.

use std::any::{type_name, Any, TypeId};
use std::fmt;
use std::sync::Arc;

use crate::di::error::DiError;
use crate::di::provider::Resolver;

/// How long a resolved instance lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// One instance per provider.
    Singleton,
    /// One instance per [`ServiceScope`](crate::di::ServiceScope).
    Scoped,
    /// A new instance per resolution.
    Transient,
}

/// Where a registration came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RegistrationSource {
    #[default]
    Native,
    Module(&'static str),
}

pub(crate) type Instance = Arc<dyn Any + Send + Sync>;
pub(crate) type Factory = Arc<dyn Fn(&Resolver<'_>) -> Result<Instance, DiError> + Send + Sync>;

/// One registration: service type, factory and lifetime.
#[derive(Clone)]
pub struct ServiceDescriptor {
    pub(crate) type_id: TypeId,
    pub(crate) factory: Factory,
    type_name: &'static str,
    lifetime: Lifetime,
    source: RegistrationSource,
}

impl ServiceDescriptor {
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn source(&self) -> RegistrationSource {
        self.source
    }
}

impl fmt::Debug for ServiceDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceDescriptor")
            .field("service", &self.type_name)
            .field("lifetime", &self.lifetime)
            .field("source", &self.source)
            .finish()
    }
}

/// Ordered list of registrations. Nothing is resolved until the set is
/// frozen by [`ContainerBuilder::build`](crate::di::ContainerBuilder::build).
///
/// Services are keyed by type; `T` may be a trait object such as
/// `dyn StoreConnector`.
#[derive(Debug, Clone, Default)]
pub struct ServiceCollection {
    descriptors: Vec<ServiceDescriptor>,
    source: RegistrationSource,
}

impl ServiceCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an already-built singleton.
    pub fn add_instance<T>(&mut self, instance: Arc<T>) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
    {
        let instance: Instance = Arc::new(instance);
        self.push::<T>(
            Lifetime::Singleton,
            Arc::new(move |_: &Resolver<'_>| Ok(instance.clone())),
        )
    }

    pub fn add_singleton<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>, DiError> + Send + Sync + 'static,
    {
        self.add(Lifetime::Singleton, factory)
    }

    pub fn add_scoped<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>, DiError> + Send + Sync + 'static,
    {
        self.add(Lifetime::Scoped, factory)
    }

    pub fn add_transient<T, F>(&mut self, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>, DiError> + Send + Sync + 'static,
    {
        self.add(Lifetime::Transient, factory)
    }

    pub fn add<T, F>(&mut self, lifetime: Lifetime, factory: F) -> &mut Self
    where
        T: ?Sized + Send + Sync + 'static,
        F: Fn(&Resolver<'_>) -> Result<Arc<T>, DiError> + Send + Sync + 'static,
    {
        self.push::<T>(
            lifetime,
            Arc::new(move |resolver: &Resolver<'_>| {
                factory(resolver).map(|service| Arc::new(service) as Instance)
            }),
        )
    }

    /// Whether any registration for `T` exists.
    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        let id = TypeId::of::<T>();
        self.descriptors.iter().any(|d| d.type_id == id)
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Registrations in the order they were added.
    pub fn descriptors(&self) -> &[ServiceDescriptor] {
        &self.descriptors
    }

    /// Append every registration from `other`, keeping its source tags.
    pub fn extend(&mut self, other: ServiceCollection) {
        self.descriptors.extend(other.descriptors);
    }

    pub(crate) fn set_source(&mut self, source: RegistrationSource) {
        self.source = source;
    }

    pub(crate) fn into_descriptors(self) -> Vec<ServiceDescriptor> {
        self.descriptors
    }

    fn push<T: ?Sized + 'static>(&mut self, lifetime: Lifetime, factory: Factory) -> &mut Self {
        self.descriptors.push(ServiceDescriptor {
            type_id: TypeId::of::<T>(),
            factory,
            type_name: type_name::<T>(),
            lifetime,
            source: self.source,
        });
        self
    }
}
