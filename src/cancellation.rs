//! Cooperative shutdown: the loop polls a cancellation token between frames;
//! an interrupt handler thread cancels it on SIGINT/SIGTERM (Ctrl+C on Windows).

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Cloneable shutdown flag shared between the loop and signal handling.
#[derive(Clone, Default)]
pub struct ShutdownSignal {
    token: CancellationToken,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request shutdown. The loop exits before reading its next frame.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    #[inline]
    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// Spawn a helper thread that waits for an interrupt and cancels `signal`.
/// The thread runs its own current-thread Tokio runtime and also exits when
/// `signal` is cancelled from elsewhere.
pub fn install_interrupt_handler(signal: &ShutdownSignal) -> std::io::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    let signal = signal.clone();

    std::thread::Builder::new()
        .name("signal-handler".into())
        .spawn(move || {
            runtime.block_on(async move {
                tokio::select! {
                    received = wait_for_interrupt() => {
                        match received {
                            Ok(name) => info!(signal = name, "interrupt received, shutting down"),
                            Err(e) => {
                                warn!(error = %e, "signal handler failed; interrupts will not stop the loop");
                                return;
                            }
                        }
                        signal.cancel();
                    }
                    _ = signal.token().cancelled() => {}
                }
            });
        })?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_interrupt() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => Ok("SIGTERM"),
        _ = sigint.recv() => Ok("SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_interrupt() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await?;
    Ok("Ctrl+C")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_observe_cancel() {
        let signal = ShutdownSignal::new();
        let other = signal.clone();
        assert!(!other.is_cancelled());
        signal.cancel();
        assert!(other.is_cancelled());
    }

    #[test]
    fn handler_thread_exits_on_external_cancel() {
        let signal = ShutdownSignal::new();
        install_interrupt_handler(&signal).unwrap();
        signal.cancel();
        assert!(signal.token().is_cancelled());
    }
}
