use std::fmt;
use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};
use vectorsync_common::{CancelToken, IndexError};
use vectorsync_config::RetryConfig;

/// Exponential backoff for transient index failures.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: Duration::from_millis(config.base_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError {
    /// A permanent failure, or the last transient failure once retries ran out.
    Failed { error: IndexError, attempts: u32 },
    Cancelled,
}

impl RetryError {
    /// Reason string suitable for a report entry.
    pub fn reason(&self) -> String {
        match self {
            Self::Failed { error, attempts } => error.summary(*attempts),
            Self::Cancelled => "cancelled".to_string(),
        }
    }
}

impl fmt::Display for RetryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason())
    }
}

impl std::error::Error for RetryError {}

impl RetryPolicy {
    pub fn no_delay(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 1u32.checked_shl(retry).unwrap_or(u32::MAX);
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }

    /// Run `op` until it succeeds, fails permanently, exhausts its retries, or
    /// `cancel` fires. Both the call and the backoff wait observe `cancel`.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancelToken,
        label: &str,
        mut op: F,
    ) -> Result<T, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, IndexError>>,
    {
        let mut attempts = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(RetryError::Cancelled);
            }

            attempts += 1;
            // A call that completed wins over a cancel observed in the same poll.
            let result = tokio::select! {
                biased;
                result = op() => result,
                _ = cancel.cancelled() => return Err(RetryError::Cancelled),
            };

            let error = match result {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            let retries_used = attempts - 1;
            if !error.is_transient() || retries_used >= self.max_retries {
                return Err(RetryError::Failed { error, attempts });
            }

            let delay = self.backoff(retries_used);
            warn!(
                "{label}: transient failure on attempt {attempts}, retrying in {}ms: {error}",
                delay.as_millis()
            );
            if cancel.sleep(delay).await.is_err() {
                debug!("{label}: cancelled during backoff");
                return Err(RetryError::Cancelled);
            }
        }
    }
}
