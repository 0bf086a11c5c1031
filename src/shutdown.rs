use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Graceful shutdown coordinator
///
/// Turns SIGINT/SIGTERM into a cancelled [`CancellationToken`]. The sequencer
/// notices at its next probe or sleep boundary, records the phase as
/// cancelled and still prints a summary.
#[derive(Debug, Clone, Default)]
pub struct ShutdownCoordinator {
    token: CancellationToken,
}

impl ShutdownCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Install signal handlers for graceful shutdown
    pub fn install_signal_handlers(&self) {
        let token = self.token.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            warn!("Shutdown signal received, cancelling run after the current step");
            token.cancel();
        });
        info!("Shutdown coordinator ready - will cancel gracefully on SIGINT/SIGTERM");
    }

    pub fn shutdown(&self) {
        self.token.cancel();
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    match signal(SignalKind::terminate()) {
        Ok(mut terminate) => {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = terminate.recv() => {}
            }
        }
        Err(e) => {
            warn!("Failed to install SIGTERM handler: {}", e);
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
