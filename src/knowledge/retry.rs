//! Capped exponential backoff shared by the HTTP clients.

use std::future::Future;
use std::time::Duration;

use crate::error::Result;

/// Retry policy for remote calls.
///
/// Only errors reporting [`is_retryable`](crate::GraphSearchError::is_retryable)
/// are retried; everything else is returned on the first failure.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_retries: usize,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(5)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: usize) -> Self {
        Self {
            max_retries,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Run `op` until it succeeds, fails permanently, or the retries run out.
    pub async fn run<T, F, Fut>(&self, operation: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = self.base_delay;

        loop {
            match op().await {
                Ok(value) => {
                    log::debug!(
                        "{} took {:?} (attempt {})",
                        operation,
                        start.elapsed(),
                        attempt + 1
                    );
                    return Ok(value);
                }
                Err(e) if attempt < self.max_retries && e.is_retryable() => {
                    log::warn!(
                        "{}: retry {}/{} after error: {}",
                        operation,
                        attempt + 1,
                        self.max_retries,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    delay *= 2;
                    attempt += 1;
                }
                Err(e) => {
                    if attempt > 0 {
                        log::error!("{}: giving up after {} retries: {}", operation, attempt, e);
                    }
                    return Err(e);
                }
            }
        }
    }
}
