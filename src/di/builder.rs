//! Module hand-off and freezing.

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use crate::di::collection::{RegistrationSource, ServiceCollection, ServiceDescriptor};
use crate::di::error::DiError;
use crate::di::provider::ServiceProvider;

/// A feature-area group of registrations.
pub trait ServiceModule: Send + Sync {
    fn name(&self) -> &'static str;

    fn load(&self, services: &mut ServiceCollection);
}

/// Merges native registrations with module registrations into one provider.
///
/// Merge rule: registrations are folded in the order they were added and the
/// last registration for a service type wins. Native registrations come
/// first, then each module in `register_module` order, so a module can
/// override a native binding but not the other way round. An override must
/// keep the original lifetime.
#[derive(Debug, Default)]
pub struct ContainerBuilder {
    services: ServiceCollection,
    required: Vec<(TypeId, &'static str)>,
}

impl ContainerBuilder {
    /// Start from the native registration set.
    pub fn new(native: ServiceCollection) -> Self {
        Self {
            services: native,
            required: Vec::new(),
        }
    }

    /// Let `module` contribute registrations on top of what is already here.
    pub fn register_module(&mut self, module: &dyn ServiceModule) -> &mut Self {
        let before = self.services.len();
        self.services.set_source(RegistrationSource::Module(module.name()));
        module.load(&mut self.services);
        self.services.set_source(RegistrationSource::Native);

        tracing::debug!(
            module = module.name(),
            registrations = self.services.len() - before,
            "Service module loaded"
        );
        self
    }

    /// Fail the build if `T` ends up unregistered.
    pub fn require<T: ?Sized + 'static>(&mut self) -> &mut Self {
        self.required.push((TypeId::of::<T>(), type_name::<T>()));
        self
    }

    pub fn services(&self) -> &ServiceCollection {
        &self.services
    }

    /// Freeze the merged set and validate it by building every singleton.
    pub fn build(self) -> Result<ServiceProvider, DiError> {
        let mut merged: HashMap<TypeId, ServiceDescriptor> = HashMap::new();

        for descriptor in self.services.into_descriptors() {
            if let Some(previous) = merged.get(&descriptor.type_id) {
                if previous.lifetime() != descriptor.lifetime() {
                    return Err(DiError::LifetimeConflict {
                        service: descriptor.type_name(),
                        first: previous.lifetime(),
                        second: descriptor.lifetime(),
                    });
                }
                tracing::debug!(
                    service = descriptor.type_name(),
                    replaced = ?previous.source(),
                    by = ?descriptor.source(),
                    "Registration overridden"
                );
            }
            merged.insert(descriptor.type_id, descriptor);
        }

        for (id, name) in &self.required {
            if !merged.contains_key(id) {
                return Err(DiError::MissingRegistration { service: *name });
            }
        }

        let provider = ServiceProvider::new(merged);
        provider.validate()?;
        Ok(provider)
    }
}
