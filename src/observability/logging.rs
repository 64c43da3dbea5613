//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber once per process
//! - Pick the output format for the environment
//! - Derive the default filter from settings
//! - Re-apply the level when settings are reloaded
//!
//! # Design Decisions
//! - `RUST_LOG` always wins over settings
//! - JSON format outside development, pretty format in development

use tracing_subscriber::{
    layer::SubscriberExt, reload, util::SubscriberInitExt, EnvFilter, Registry,
};

use crate::config::Settings;

/// Settings key holding the default log level.
pub const LOG_LEVEL_KEY: &str = "Logging:LogLevel";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Filter directive used when `RUST_LOG` is not set.
pub fn default_directive(settings: Option<&Settings>) -> String {
    let level = settings
        .and_then(|s| s.get(LOG_LEVEL_KEY))
        .filter(|level| !level.trim().is_empty())
        .unwrap_or(DEFAULT_LOG_LEVEL)
        .to_ascii_lowercase();
    format!("bookshelf_host={level},tower_http={level}")
}

/// Install the global subscriber.
///
/// Returns `None` if a subscriber was already installed (tests, embedding).
pub fn init_tracing(is_development: bool, default_directive: &str) -> Option<LogLevelReloader> {
    let (filter, pinned) = match EnvFilter::try_from_default_env() {
        Ok(filter) => (filter, true),
        Err(_) => (EnvFilter::new(default_directive), false),
    };
    let (filter, handle) = reload::Layer::new(filter);

    let pretty = is_development.then(|| tracing_subscriber::fmt::layer().pretty());
    let json = (!is_development).then(|| tracing_subscriber::fmt::layer().json());

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .try_init()
        .ok()?;

    Some(LogLevelReloader::new(handle, pinned))
}

/// Swaps the installed filter when `Logging:LogLevel` changes.
///
/// A filter taken from `RUST_LOG` is pinned and never replaced.
#[derive(Clone)]
pub struct LogLevelReloader {
    handle: reload::Handle<EnvFilter, Registry>,
    pinned: bool,
}

impl LogLevelReloader {
    pub fn new(handle: reload::Handle<EnvFilter, Registry>, pinned: bool) -> Self {
        Self { handle, pinned }
    }

    pub fn is_pinned(&self) -> bool {
        self.pinned
    }

    /// Rebuild the filter from `settings`. Returns whether it was replaced.
    pub fn apply(&self, settings: &Settings) -> Result<bool, reload::Error> {
        if self.pinned {
            return Ok(false);
        }
        let directive = default_directive(Some(settings));
        self.handle.reload(EnvFilter::new(&directive))?;
        tracing::info!(directive = %directive, "Log filter reloaded");
        Ok(true)
    }
}
