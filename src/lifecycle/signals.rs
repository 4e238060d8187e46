//! OS signal handling.

use std::sync::Arc;

use crate::lifecycle::Shutdown;

/// Translate Ctrl+C / SIGINT into the shutdown broadcast.
pub fn install(shutdown: Arc<Shutdown>) {
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, triggering shutdown");
            shutdown.trigger();
        }
    });
}
