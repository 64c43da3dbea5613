//! Composition root.
//!
//! # Data Flow
//! ```text
//! Settings + HostEnvironment + StoreConnector
//!     → native registrations (environment, logging, routes, storage)
//!     → ServiceLayerModule (module registrations, may override)
//!     → ContainerBuilder::build (last wins, singletons validated)
//!     → ServiceProvider
//! ```
//!
//! # Design Decisions
//! - The effective connection string is computed here and nowhere else
//! - Settings are a snapshot; reloads never rebind composed services
//! - Every startup-time failure surfaces as `CompositionError`

use std::sync::Arc;

use crate::config::{LiveSettings, MissingConfiguration, Settings};
use crate::di::{ContainerBuilder, DiError, ServiceCollection, ServiceModule, ServiceProvider};
use crate::hosting::{AppInformation, HostEnvironment};
use crate::observability::{
    RequestContextAccessor, RequestLogStore, RequestLoggerProvider, TaskLocalRequestContext,
};
use crate::routing::{RouteTable, RouteTemplateError};
use crate::services::{BookCatalog, ServiceLayerModule};
use crate::storage::{
    compose, ConnectionString, StoreConnector, StoreFactory, StoreHandle, StoreOptions,
};

/// Name of the connection string the host runs against.
pub const DEFAULT_CONNECTION_NAME: &str = "DefaultConnection";

#[derive(Debug, thiserror::Error)]
pub enum CompositionError {
    #[error(transparent)]
    MissingConfiguration(#[from] MissingConfiguration),

    #[error("invalid route table: {0}")]
    Routes(#[from] RouteTemplateError),

    #[error("service graph is invalid: {0}")]
    Graph(#[from] DiError),
}

/// Effective connection string for `environment`.
pub fn effective_connection_string(
    settings: &Settings,
    environment: &HostEnvironment,
) -> Result<String, MissingConfiguration> {
    let key = format!("ConnectionStrings:{DEFAULT_CONNECTION_NAME}");
    let base = settings.require(&key)?;
    Ok(compose(
        base,
        environment.is_development(),
        environment.branch_name(),
    ))
}

/// Phase 1: the host's own registrations.
pub fn native_services(
    settings: &Settings,
    environment: Arc<HostEnvironment>,
    connector: Arc<dyn StoreConnector>,
) -> Result<ServiceCollection, CompositionError> {
    let connection_string = effective_connection_string(settings, &environment)?;
    tracing::info!(
        environment = environment.environment_name(),
        branch = environment.branch_name().unwrap_or("<none>"),
        catalog = %ConnectionString::parse(&connection_string)
            .ok()
            .and_then(|c| c.catalog().map(str::to_string))
            .unwrap_or_default(),
        "Composing services"
    );

    let snapshot = Arc::new(settings.clone());
    let app_information = Arc::new(AppInformation::from(environment.as_ref()));

    let mut services = ServiceCollection::new();

    // Environment and context singletons.
    services
        .add_instance(environment)
        .add_instance(app_information)
        .add_instance(snapshot.clone())
        .add_instance(Arc::new(LiveSettings::new(snapshot)))
        .add_instance::<dyn RequestContextAccessor>(Arc::new(TaskLocalRequestContext))
        .add_instance(Arc::new(RequestLogStore::default()))
        .add_singleton::<RequestLoggerProvider, _>(|r| {
            Ok(Arc::new(RequestLoggerProvider::new(
                r.get::<dyn RequestContextAccessor>()?,
                r.get::<RequestLogStore>()?,
            )))
        })
        .add_instance(Arc::new(RouteTable::with_default_route()?));

    // Storage, one handle per scope.
    services
        .add_instance(Arc::new(StoreOptions::new(connection_string)))
        .add_instance(connector)
        .add_singleton::<StoreFactory, _>(|r| {
            let connector = r.get::<dyn StoreConnector>()?;
            let options = r.get::<StoreOptions>()?;
            Ok(Arc::new(StoreFactory::new(connector, options.as_ref().clone())))
        })
        .add_scoped::<StoreHandle, _>(|r| {
            let factory = r.get::<StoreFactory>()?;
            factory
                .acquire()
                .map(Arc::new)
                .map_err(DiError::construction::<StoreHandle>)
        });

    Ok(services)
}

/// Build the provider with the service layer module.
pub fn build(
    settings: &Settings,
    environment: Arc<HostEnvironment>,
    connector: Arc<dyn StoreConnector>,
) -> Result<ServiceProvider, CompositionError> {
    build_with_modules(settings, environment, connector, &[&ServiceLayerModule])
}

/// Build the provider, loading `modules` in order after the native set.
pub fn build_with_modules(
    settings: &Settings,
    environment: Arc<HostEnvironment>,
    connector: Arc<dyn StoreConnector>,
    modules: &[&dyn ServiceModule],
) -> Result<ServiceProvider, CompositionError> {
    let native = native_services(settings, environment, connector)?;

    let mut builder = ContainerBuilder::new(native);
    for module in modules {
        builder.register_module(*module);
    }
    builder
        .require::<HostEnvironment>()
        .require::<AppInformation>()
        .require::<RouteTable>()
        .require::<StoreFactory>()
        .require::<StoreHandle>()
        .require::<dyn BookCatalog>();

    let provider = builder.build()?;
    tracing::info!(services = provider.len(), "Service provider built");
    Ok(provider)
}
