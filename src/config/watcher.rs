//! Settings file watcher for hot reload.
//!
//! Reloads produce new [`Settings`] snapshots published through
//! [`LiveSettings`], which hands each one to a reload hook (the host uses it
//! to re-apply the log level). Services built by the composition root keep
//! the values they were constructed with.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::config::loader::{ConfigResolver, BASE_SETTINGS_FILE};
use crate::config::settings::Settings;

/// Latest successfully resolved settings snapshot.
#[derive(Debug)]
pub struct LiveSettings {
    current: ArcSwap<Settings>,
}

impl LiveSettings {
    pub fn new(initial: Arc<Settings>) -> Self {
        Self {
            current: ArcSwap::new(initial),
        }
    }

    pub fn load(&self) -> Arc<Settings> {
        self.current.load_full()
    }

    pub fn store(&self, settings: Settings) {
        self.current.store(Arc::new(settings));
    }

    /// Apply updates from a watcher until the channel closes, calling
    /// `on_reload` with each published snapshot.
    pub async fn follow<F>(
        self: Arc<Self>,
        mut updates: mpsc::UnboundedReceiver<Settings>,
        on_reload: F,
    ) where
        F: Fn(&Settings) + Send + 'static,
    {
        while let Some(settings) = updates.recv().await {
            tracing::info!(keys = settings.len(), "Settings reloaded");
            self.store(settings);
            on_reload(&self.load());
        }
    }
}

/// Watches the settings files under the resolver's base path.
pub struct SettingsWatcher {
    resolver: ConfigResolver,
    update_tx: mpsc::UnboundedSender<Settings>,
}

impl SettingsWatcher {
    /// Create a new watcher.
    ///
    /// Returns the watcher and a receiver for reloaded settings.
    pub fn new(resolver: ConfigResolver) -> (Self, mpsc::UnboundedReceiver<Settings>) {
        let (update_tx, update_rx) = mpsc::unbounded_channel();
        (Self { resolver, update_tx }, update_rx)
    }

    /// Start watching. The returned handle must be kept alive.
    pub fn run(self) -> Result<RecommendedWatcher, notify::Error> {
        let tx = self.update_tx.clone();
        let resolver = self.resolver.clone();
        let base_path = resolver.base_path().to_path_buf();

        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let touches_settings = event.paths.iter().any(|p| {
                        p.file_name()
                            .and_then(|n| n.to_str())
                            .is_some_and(|n| n.starts_with("appsettings") && n.ends_with(".json"))
                    });
                    if !touches_settings || !(event.kind.is_modify() || event.kind.is_create()) {
                        return;
                    }
                    tracing::info!("Settings file change detected, reloading...");
                    match resolver.resolve() {
                        Ok(settings) => {
                            let _ = tx.send(settings);
                        }
                        Err(e) => {
                            tracing::error!(error = %e, "Failed to reload settings. Keeping current configuration.");
                        }
                    }
                }
                Err(e) => tracing::error!(error = ?e, "Watch error"),
            },
            Config::default().with_poll_interval(Duration::from_secs(2)),
        )?;

        watcher.watch(&base_path, RecursiveMode::NonRecursive)?;

        tracing::info!(path = %base_path.join(BASE_SETTINGS_FILE).display(), "Settings watcher started");
        Ok(watcher)
    }
}
