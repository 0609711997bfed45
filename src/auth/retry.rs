use std::future::Future;
use std::time::Duration;
use tracing::debug;

use crate::settings::TokenExchangeSettings;

/// Bounded retry for remote calls with a known transient failure mode
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl From<&TokenExchangeSettings> for RetryPolicy {
    fn from(settings: &TokenExchangeSettings) -> Self {
        Self::new(
            settings.max_attempts,
            Duration::from_millis(settings.retry_delay_ms),
        )
    }
}

/// Run `op` until it succeeds, fails with an error `is_retryable` rejects, or
/// the policy's attempts are used up. `op` receives the 1-based attempt number.
///
/// The error of the last attempt is returned.
pub async fn with_retry<T, E, F, Fut, R>(policy: &RetryPolicy, is_retryable: R, mut op: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    R: Fn(&E) -> bool,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < max_attempts && is_retryable(&e) => {
                debug!(attempt, max_attempts, "Attempt failed, trying again");
                if !policy.delay.is_zero() {
                    tokio::time::sleep(policy.delay).await;
                }
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
