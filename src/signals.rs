//! Process-wide interrupt handling.
//!
//! One listener task watches for SIGINT/SIGTERM and cancels a root
//! [`CancellationToken`]. Port-forward sessions take child tokens of that
//! root, so any number of sessions share a single OS-level handler.

use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Install the interrupt listener and return the root token it cancels.
///
/// Call once per process, from inside a Tokio runtime.
pub fn install_interrupt_handler() -> CancellationToken {
    let root = CancellationToken::new();
    let token = root.clone();
    tokio::spawn(async move {
        tokio::select! {
            _ = interrupt_signal() => {
                info!("Received interrupt, stopping port-forward sessions");
                token.cancel();
            }
            _ = token.cancelled() => {}
        }
    });
    root
}

/// Wait for SIGINT or SIGTERM.
///
/// If a handler can't be installed, that branch never completes; the
/// other one still can.
async fn interrupt_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
