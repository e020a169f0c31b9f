use std::time::Duration;

use tokio::sync::watch;

use crate::error::{Error, Result};

/// Shared cancellation signal for retries, backoff waits and the scheduler.
///
/// Clones observe the same signal; once cancelled it stays cancelled.
#[derive(Clone, Debug)]
pub struct CancelToken {
    tx: std::sync::Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: std::sync::Arc::new(tx),
            rx,
        }
    }

    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once `cancel` has been called on any clone.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // The sender lives as long as any clone, so `changed` only errors
        // after every token is gone.
        while !*rx.borrow_and_update() {
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep for `duration` unless cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<()> {
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancelled() => Err(Error::Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::CancelToken;
    use crate::Error;
    use std::time::{Duration, Instant};

    #[tokio::test]
    async fn sleep_returns_early_when_cancelled() {
        let token = CancelToken::new();
        let clone = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            clone.cancel();
        });

        let start = Instant::now();
        let result = token.sleep(Duration::from_secs(30)).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(start.elapsed() < Duration::from_secs(5));
        assert!(token.is_cancelled());
    }

    #[tokio::test]
    async fn sleep_completes_when_not_cancelled() {
        let token = CancelToken::new();
        token
            .sleep(Duration::from_millis(5))
            .await
            .expect("sleep should finish");
        assert!(!token.is_cancelled());
    }
}
