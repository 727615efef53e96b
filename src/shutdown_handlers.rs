use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[cfg(unix)]
use tokio::signal::unix::{SignalKind, signal};

/// Cancels `cancel` on Ctrl+C or SIGTERM. The task exits once `cancel` fires
/// for any reason.
pub fn setup_signal_shutdown_handler(cancel: &CancellationToken) -> tokio::task::JoinHandle<()> {
    let cancel = cancel.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        let mut term_signal = match signal(SignalKind::terminate()) {
            Ok(signal) => Some(signal),
            Err(err) => {
                warn!("Failed to register SIGTERM handler: {}", err);
                None
            }
        };

        #[cfg(unix)]
        {
            tokio::select! {
                () = cancel.cancelled() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, cancelling run.");
                    cancel.cancel();
                }
                () = async {
                    if let Some(signal) = term_signal.as_mut() {
                        signal.recv().await;
                    } else {
                        std::future::pending::<()>().await;
                    }
                } => {
                    info!("SIGTERM received, cancelling run.");
                    cancel.cancel();
                }
            }
        }

        #[cfg(not(unix))]
        {
            tokio::select! {
                () = cancel.cancelled() => {}
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, cancelling run.");
                    cancel.cancel();
                }
            }
        }
    })
}
