//! Startup orchestration.
//!
//! # Responsibilities
//! - Resolve configuration and describe the environment
//! - Compose the service provider
//! - Migrate and seed the store through one scoped handle
//! - Hand a ready host to the HTTP layer
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Steps run in order, not concurrently
//! - Listeners start last (traffic only when ready)

use std::sync::Arc;

use crate::composition::{self, CompositionError};
use crate::config::{ConfigError, ConfigResolver, Settings};
use crate::di::ServiceProvider;
use crate::hosting::HostEnvironment;
use crate::storage::{
    MigrationError, MigrationReport, SeedError, SeedOrchestrator, SeedReport, StartupMigrator,
    StoreConnector, StoreFactory, StoreHandle,
};

/// Any failure that must stop the process before it serves traffic.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("failed to load configuration: {0}")]
    Configuration(#[from] ConfigError),

    #[error(transparent)]
    Composition(#[from] CompositionError),

    #[error(transparent)]
    Migration(#[from] MigrationError),

    #[error("database seeding failed: {0}")]
    Seed(#[from] SeedError),
}

/// A composed host whose store has not been prepared yet.
#[derive(Debug)]
pub struct Host {
    environment: Arc<HostEnvironment>,
    provider: ServiceProvider,
}

impl Host {
    pub fn new(
        settings: &Settings,
        environment: Arc<HostEnvironment>,
        connector: Arc<dyn StoreConnector>,
    ) -> Result<Self, StartupError> {
        let provider = composition::build(settings, environment.clone(), connector)?;
        Ok(Self {
            environment,
            provider,
        })
    }

    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    /// Migrate then seed, exactly once, through a single store handle.
    ///
    /// The handle is released before this returns, on success and on error.
    pub fn prepare_database(self) -> Result<ReadyHost, StartupError> {
        let factory = self
            .provider
            .get::<StoreFactory>()
            .map_err(CompositionError::from)?;

        let result = {
            let handle = factory.acquire().map_err(MigrationError::from)?;
            tracing::debug!(handle = %handle.id(), "Store handle acquired for startup");
            Self::migrate_and_seed(&handle, &self.environment)
        };

        tracing::debug!(open_handles = factory.open_handles(), "Startup store handle released");
        let (migration, seed) = result?;

        Ok(ReadyHost {
            environment: self.environment,
            provider: self.provider,
            migration,
            seed,
        })
    }

    fn migrate_and_seed(
        handle: &StoreHandle,
        environment: &HostEnvironment,
    ) -> Result<(MigrationReport, SeedReport), StartupError> {
        let migration = StartupMigrator::default().migrate(handle)?;
        if migration.is_noop() {
            tracing::info!(version = ?migration.current_version, "Database schema up to date");
        } else {
            tracing::info!(
                applied = ?migration.applied,
                version = ?migration.current_version,
                "Database migrations applied"
            );
        }

        let seed = SeedOrchestrator::new().seed(handle, environment.web_root())?;
        if seed.is_noop() {
            tracing::info!("Seed data already present");
        } else {
            tracing::info!(seeded = ?seed.seeded, "Seed data inserted");
        }

        Ok((migration, seed))
    }
}

/// A host with a migrated and seeded store, ready to serve.
#[derive(Debug)]
pub struct ReadyHost {
    environment: Arc<HostEnvironment>,
    provider: ServiceProvider,
    migration: MigrationReport,
    seed: SeedReport,
}

impl ReadyHost {
    pub fn environment(&self) -> &Arc<HostEnvironment> {
        &self.environment
    }

    pub fn provider(&self) -> &ServiceProvider {
        &self.provider
    }

    pub fn migration(&self) -> &MigrationReport {
        &self.migration
    }

    pub fn seed(&self) -> &SeedReport {
        &self.seed
    }
}

/// Resolve configuration, compose, migrate and seed.
pub fn start(
    resolver: &ConfigResolver,
    connector: Arc<dyn StoreConnector>,
) -> Result<ReadyHost, StartupError> {
    let settings = resolver.resolve()?;
    let environment = Arc::new(HostEnvironment::detect(
        resolver.environment_name(),
        resolver.base_path(),
    ));
    start_with(&settings, environment, connector)
}

/// Compose, migrate and seed with already-resolved settings.
pub fn start_with(
    settings: &Settings,
    environment: Arc<HostEnvironment>,
    connector: Arc<dyn StoreConnector>,
) -> Result<ReadyHost, StartupError> {
    tracing::info!(
        environment = environment.environment_name(),
        content_root = %environment.content_root().display(),
        "Starting host"
    );
    Host::new(settings, environment, connector)?.prepare_database()
}
