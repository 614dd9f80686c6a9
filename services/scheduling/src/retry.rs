//! Timeout and single-retry policy for storage calls
//!
//! Every store call is bounded by a timeout. A transient failure (timeout,
//! pool exhaustion, I/O, serialization failure) is retried once after a
//! short backoff; anything still failing is surfaced to the caller.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::repositories::StoreError;

/// Retry behaviour for storage calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Upper bound for a single attempt
    pub timeout: Duration,
    /// Pause before the second attempt
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(3),
            backoff: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Run `op` under the timeout, retrying once on a transient failure
    pub async fn run<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        match self.attempt(&mut op).await {
            Err(e) if e.is_transient() => {
                warn!("Storage call '{}' failed transiently, retrying: {}", what, e);
                tokio::time::sleep(self.backoff).await;
                self.attempt(&mut op).await
            }
            other => other,
        }
    }

    async fn attempt<T, F, Fut>(&self, op: &mut F) -> Result<T, StoreError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.timeout, op())
            .await
            .unwrap_or(Err(StoreError::Timeout))
    }
}
