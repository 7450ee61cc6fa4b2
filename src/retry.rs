//! Bounded retry with a fixed delay, shared by the sweep and the retriever.

use crate::config::{ModelSettings, RetrievalSettings};
use crate::error::{Error, Result};
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    /// Whether a failure of the 1-based `attempt` earns another attempt.
    pub fn allows_retry(&self, err: &Error, attempt: u32) -> bool {
        err.is_retryable() && attempt < self.attempts
    }
}

impl From<&RetrievalSettings> for RetryPolicy {
    fn from(settings: &RetrievalSettings) -> Self {
        Self { attempts: settings.retry_attempts, delay: Duration::from_secs(settings.retry_delay_secs) }
    }
}

impl From<&ModelSettings> for RetryPolicy {
    fn from(settings: &ModelSettings) -> Self {
        Self { attempts: settings.retry_attempts, delay: Duration::from_secs(settings.retry_delay_secs) }
    }
}

/// Run `op` until it succeeds, fails with a non-retryable error, or the
/// policy's attempts are used up.
pub async fn with_retry<T, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if policy.allows_retry(&e, attempt) => {
                warn!("{} attempt {}/{} failed: {}; retrying in {:?}", label, attempt, policy.attempts, e, policy.delay);
                attempt += 1;
                tokio::time::sleep(policy.delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}
