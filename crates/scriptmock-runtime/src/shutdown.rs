//! Shutdown signalling
//!
//! The signal is a latched flag: once triggered it stays triggered, so a
//! waiter that starts late still returns immediately.

use std::sync::Arc;
use tokio::signal;
use tokio::sync::watch;

/// Cloneable, latched shutdown flag
#[derive(Debug, Clone)]
pub struct ShutdownSignal {
    flag: Arc<watch::Sender<bool>>,
}

impl ShutdownSignal {
    /// Create an untriggered signal
    pub fn new() -> Self {
        let (flag, _) = watch::channel(false);
        Self {
            flag: Arc::new(flag),
        }
    }

    /// Latch the signal and wake every waiter
    pub fn trigger(&self) {
        if !self.flag.send_replace(true) {
            tracing::info!("Shutdown signal triggered");
        }
    }

    /// Resolve once the signal has been triggered
    pub async fn triggered(&self) {
        let mut rx = self.flag.subscribe();
        // The sender lives in `self`, so this cannot fail.
        let _ = rx.wait_for(|triggered| *triggered).await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Turns SIGINT/SIGTERM into a [`ShutdownSignal`] trigger
#[derive(Debug)]
pub struct SignalHandler {
    signal: ShutdownSignal,
}

impl SignalHandler {
    /// Create a new signal handler
    pub fn new(signal: ShutdownSignal) -> Self {
        Self { signal }
    }

    /// Wait for the first termination signal and trigger shutdown.
    ///
    /// Fails only if the signal handlers cannot be installed.
    pub async fn run(self) -> std::io::Result<()> {
        #[cfg(unix)]
        {
            use signal::unix::{signal, SignalKind};

            let mut sigterm = signal(SignalKind::terminate())?;
            let mut sigint = signal(SignalKind::interrupt())?;

            tokio::select! {
                _ = sigterm.recv() => tracing::info!("Received SIGTERM"),
                _ = sigint.recv() => tracing::info!("Received SIGINT"),
            }
        }

        #[cfg(not(unix))]
        {
            signal::ctrl_c().await?;
            tracing::info!("Received Ctrl+C");
        }

        self.signal.trigger();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_untriggered_signal_does_not_resolve() {
        let signal = ShutdownSignal::new();
        let waited = tokio::time::timeout(Duration::from_millis(20), signal.triggered()).await;
        assert!(waited.is_err());
    }

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let signal = ShutdownSignal::new();
        let waiters: Vec<_> = (0..3)
            .map(|_| {
                let signal = signal.clone();
                tokio::spawn(async move { signal.triggered().await })
            })
            .collect();

        tokio::task::yield_now().await;
        signal.trigger();

        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .unwrap()
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_late_waiter_sees_trigger() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        signal.trigger();

        tokio::time::timeout(Duration::from_millis(100), signal.triggered())
            .await
            .unwrap();
    }
}
