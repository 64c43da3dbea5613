//! Frozen service graph and resolution.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

use uuid::Uuid;

use crate::di::collection::{Instance, Lifetime, ServiceDescriptor};
use crate::di::error::DiError;

type InstanceCache = Mutex<HashMap<TypeId, Instance>>;

struct ProviderInner {
    descriptors: HashMap<TypeId, ServiceDescriptor>,
    singletons: InstanceCache,
}

/// Resolves services from a frozen registration set.
///
/// Cheap to clone; every clone shares the same singletons.
#[derive(Clone)]
pub struct ServiceProvider {
    inner: Arc<ProviderInner>,
}

impl ServiceProvider {
    pub(crate) fn new(descriptors: HashMap<TypeId, ServiceDescriptor>) -> Self {
        Self {
            inner: Arc::new(ProviderInner {
                descriptors,
                singletons: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// Resolve `T` from the root. Scoped services are not available here.
    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, DiError> {
        Resolver::new(self, None).get::<T>()
    }

    pub fn contains<T: ?Sized + 'static>(&self) -> bool {
        self.inner.descriptors.contains_key(&TypeId::of::<T>())
    }

    /// The registration that won for `T`.
    pub fn descriptor<T: ?Sized + 'static>(&self) -> Option<&ServiceDescriptor> {
        self.inner.descriptors.get(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.inner.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.descriptors.is_empty()
    }

    /// Open a scope. Scoped instances are dropped with it.
    pub fn create_scope(&self) -> ServiceScope {
        ServiceScope {
            id: Uuid::new_v4(),
            provider: self.clone(),
            instances: Mutex::new(HashMap::new()),
        }
    }

    /// Construct every singleton, surfacing the first unresolvable one.
    pub(crate) fn validate(&self) -> Result<(), DiError> {
        let mut singletons: Vec<&ServiceDescriptor> = self
            .inner
            .descriptors
            .values()
            .filter(|d| d.lifetime() == Lifetime::Singleton)
            .collect();
        singletons.sort_by_key(|d| d.type_name());

        for descriptor in singletons {
            Resolver::new(self, None)
                .resolve(descriptor.type_id, descriptor.type_name())
                .map_err(|source| DiError::Validation {
                    service: descriptor.type_name(),
                    source: Box::new(source),
                })?;
        }
        Ok(())
    }
}

impl fmt::Debug for ServiceProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceProvider")
            .field("services", &self.inner.descriptors.len())
            .finish()
    }
}

/// A bounded lifetime for scoped services, typically one request.
pub struct ServiceScope {
    id: Uuid,
    provider: ServiceProvider,
    instances: InstanceCache,
}

impl ServiceScope {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, DiError> {
        Resolver::new(&self.provider, Some(&self.instances)).get::<T>()
    }

    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }
}

impl fmt::Debug for ServiceScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServiceScope").field("id", &self.id).finish()
    }
}

/// Handed to factories to resolve their dependencies.
///
/// Singletons are always built with a root resolver, so a singleton can never
/// capture a scoped service.
pub struct Resolver<'a> {
    provider: &'a ServiceProvider,
    scope: Option<&'a InstanceCache>,
    chain: Vec<(TypeId, &'static str)>,
}

impl<'a> Resolver<'a> {
    fn new(provider: &'a ServiceProvider, scope: Option<&'a InstanceCache>) -> Self {
        Self {
            provider,
            scope,
            chain: Vec::new(),
        }
    }

    pub fn get<T: ?Sized + Send + Sync + 'static>(&self) -> Result<Arc<T>, DiError> {
        let instance = self.resolve(TypeId::of::<T>(), type_name::<T>())?;
        downcast::<T>(&instance)
    }

    fn child(&self, scope: Option<&'a InstanceCache>, id: TypeId, name: &'static str) -> Resolver<'a> {
        let mut chain = self.chain.clone();
        chain.push((id, name));
        Resolver {
            provider: self.provider,
            scope,
            chain,
        }
    }

    fn resolve(&self, id: TypeId, name: &'static str) -> Result<Instance, DiError> {
        if self.chain.iter().any(|(seen, _)| *seen == id) {
            let mut chain: Vec<&'static str> = self.chain.iter().map(|(_, n)| *n).collect();
            chain.push(name);
            return Err(DiError::Cycle { chain });
        }

        let inner = &self.provider.inner;
        let descriptor = inner
            .descriptors
            .get(&id)
            .ok_or(DiError::NotRegistered { service: name })?;

        match descriptor.lifetime() {
            Lifetime::Singleton => {
                cached_or_build(&inner.singletons, id, || {
                    (descriptor.factory)(&self.child(None, id, name))
                })
            }
            Lifetime::Scoped => {
                let scope = self.scope.ok_or(DiError::ScopeRequired { service: name })?;
                cached_or_build(scope, id, || {
                    (descriptor.factory)(&self.child(Some(scope), id, name))
                })
            }
            Lifetime::Transient => (descriptor.factory)(&self.child(self.scope, id, name)),
        }
    }
}

/// Look up `id` in `cache`, building it on a miss. The lock is not held while
/// the factory runs, so factories may resolve other cached services.
fn cached_or_build(
    cache: &InstanceCache,
    id: TypeId,
    build: impl FnOnce() -> Result<Instance, DiError>,
) -> Result<Instance, DiError> {
    if let Some(existing) = cache.lock().map_err(|_| DiError::Poisoned)?.get(&id) {
        return Ok(existing.clone());
    }
    let built = build()?;
    let mut cache = cache.lock().map_err(|_| DiError::Poisoned)?;
    // First writer wins if two callers raced to build.
    Ok(cache.entry(id).or_insert(built).clone())
}

fn downcast<T: ?Sized + Send + Sync + 'static>(instance: &Instance) -> Result<Arc<T>, DiError> {
    let any: &(dyn Any + Send + Sync) = instance.as_ref();
    any.downcast_ref::<Arc<T>>()
        .cloned()
        .ok_or(DiError::Construction {
            service: type_name::<T>(),
            message: "registered instance has an unexpected type".to_string(),
        })
}
