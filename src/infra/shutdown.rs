//! Termination signal handling.

use tracing::{info, warn};

/// Resolve when the process receives Ctrl-C or, on Unix, SIGTERM.
pub async fn signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(
                target = "pressroom::shutdown",
                error = %err,
                "failed to listen for ctrl-c"
            );
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                warn!(
                    target = "pressroom::shutdown",
                    error = %err,
                    "failed to listen for SIGTERM"
                );
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!(target = "pressroom::shutdown", signal = "SIGINT", "shutdown requested"),
        _ = terminate => info!(target = "pressroom::shutdown", signal = "SIGTERM", "shutdown requested"),
    }
}
