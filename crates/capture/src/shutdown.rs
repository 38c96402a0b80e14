use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Resolves on Ctrl-C, or SIGTERM on unix.
pub async fn wait_for_termination() -> std::io::Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut terminate = signal(SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => result,
            _ = terminate.recv() => Ok(()),
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await
    }
}

/// Listener side of the shutdown broadcast.
///
/// A dropped sender is not a shutdown request: once the channel closes the
/// listener simply never fires.
pub struct Shutdown {
    rx: broadcast::Receiver<()>,
    triggered: bool,
    closed: bool,
}

impl Shutdown {
    pub fn new(rx: broadcast::Receiver<()>) -> Self {
        Self {
            rx,
            triggered: false,
            closed: false,
        }
    }

    /// Non-blocking check.
    pub fn is_triggered(&mut self) -> bool {
        if self.triggered || self.closed {
            return self.triggered;
        }
        match self.rx.try_recv() {
            Ok(()) | Err(TryRecvError::Lagged(_)) => self.triggered = true,
            Err(TryRecvError::Closed) => self.closed = true,
            Err(TryRecvError::Empty) => {}
        }
        self.triggered
    }

    /// Waits for a shutdown request; pends forever if none can arrive.
    pub async fn recv(&mut self) {
        if self.triggered {
            return;
        }
        if !self.closed {
            match self.rx.recv().await {
                Ok(()) | Err(RecvError::Lagged(_)) => {
                    self.triggered = true;
                    return;
                }
                Err(RecvError::Closed) => self.closed = true,
            }
        }
        std::future::pending::<()>().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_signal_is_sticky() {
        let (tx, rx) = broadcast::channel(1);
        let mut shutdown = Shutdown::new(rx);
        assert!(!shutdown.is_triggered());

        tx.send(()).unwrap();
        assert!(shutdown.is_triggered());
        assert!(shutdown.is_triggered());
        shutdown.recv().await;
    }

    #[tokio::test]
    async fn test_dropped_sender_never_fires() {
        let (tx, rx) = broadcast::channel::<()>(1);
        let mut shutdown = Shutdown::new(rx);
        drop(tx);

        assert!(!shutdown.is_triggered());
        let waited = tokio::time::timeout(Duration::from_millis(20), shutdown.recv()).await;
        assert!(waited.is_err());
    }
}
