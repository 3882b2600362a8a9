//! Process stop signals.
//!
//! Ctrl-C everywhere, plus SIGTERM on unix.

use tracing::warn;

#[cfg(unix)]
use tokio::signal::unix::{Signal, SignalKind, signal};

/// Listener for the signals that end a recording.
///
/// Handlers are registered in [`StopSignal::install`], so a signal that
/// arrives before [`StopSignal::wait`] is polled is not lost.
#[derive(Debug)]
pub struct StopSignal {
    #[cfg(unix)]
    terminate: Option<Signal>,
}

impl StopSignal {
    /// Register the handlers. Must run inside a tokio runtime.
    pub fn install() -> Self {
        #[cfg(unix)]
        {
            let terminate = match signal(SignalKind::terminate()) {
                Ok(sig) => Some(sig),
                Err(e) => {
                    warn!("cannot listen for SIGTERM: {e}");
                    None
                }
            };
            Self { terminate }
        }
        #[cfg(not(unix))]
        {
            Self {}
        }
    }

    /// Wait for the first stop signal and return its name.
    pub async fn wait(self) -> &'static str {
        #[cfg(unix)]
        if let Some(mut terminate) = self.terminate {
            return tokio::select! {
                _ = ctrl_c() => "Ctrl-C",
                _ = terminate.recv() => "SIGTERM",
            };
        }

        ctrl_c().await;
        "Ctrl-C"
    }
}

/// Ctrl-C, or pending forever if it cannot be listened for.
async fn ctrl_c() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("cannot listen for Ctrl-C: {e}");
        std::future::pending::<()>().await;
    }
}
