//! OS signal handling.
//!
//! Ctrl+C triggers graceful shutdown. Configuration reloads come from the
//! file watcher, not from signals.

use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::lifecycle::shutdown::Shutdown;

/// Trigger `shutdown` on the first Ctrl+C.
pub fn spawn_ctrl_c_handler(shutdown: Arc<Shutdown>) -> JoinHandle<()> {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("Shutdown signal received");
                shutdown.trigger();
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install Ctrl+C handler");
            }
        }
    })
}
