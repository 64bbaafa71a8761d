//! Exponential-backoff retry for idempotent fetches.

#[cfg(test)]
#[path = "retry_test.rs"]
mod retry_test;

use std::fmt::Display;
use std::future::Future;

use crate::config::RetryPolicy;

/// Run `op` until it succeeds or `policy.max_retries` retries are used up.
///
/// Retry `n` (0-based) waits `policy.delay(n)` first. The last error is returned.
///
/// # Errors
///
/// Returns the error from the final attempt.
pub async fn retry_with_backoff<T, E, F, Fut>(policy: RetryPolicy, label: &str, mut op: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < policy.max_retries => {
                let delay = policy.delay(attempt);
                tracing::warn!(
                    %label,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis(),
                    %error,
                    "request failed; retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(error) => {
                tracing::error!(%label, attempts = attempt + 1, %error, "request failed; giving up");
                return Err(error);
            }
        }
    }
}
