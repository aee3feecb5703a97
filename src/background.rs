use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use crate::state::State;

const SECS_PER_DAY: u64 = 86_400;

/// Resolves on Ctrl-C, or SIGTERM on Unix.
pub(crate) async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!("Failed to register SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Ctrl-C received, shutting down"),
        _ = terminate => info!("SIGTERM received, shutting down"),
    }
}

/// One-shot removal of stored media older than `ttl_days`, off the
/// request path.
pub(crate) fn spawn_media_sweep(state: &Arc<State>, ttl_days: u64) {
    let state = Arc::clone(state);
    let max_age = Duration::from_secs(ttl_days.saturating_mul(SECS_PER_DAY));
    tokio::task::spawn_blocking(move || match state.media.sweep_older_than(max_age) {
        Ok(removed) => {
            info!(removed, ttl_days, "Media sweep finished");
            crate::audit::log_action(
                &state.config.db_path,
                "media_sweep",
                "",
                &format!("removed {removed} file(s) older than {ttl_days}d"),
            );
        }
        Err(e) => warn!("Media sweep failed: {e}"),
    });
}
