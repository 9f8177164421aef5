use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Fixed-interval retry budget
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first
    pub max_attempts: usize,
    /// Pause between two consecutive attempts
    pub delay: Duration,
}

impl RetryPolicy {
    pub const fn new(max_attempts: usize, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    /// Six attempts, five seconds apart
    fn default() -> Self {
        Self::new(6, Duration::from_millis(5000))
    }
}

/// Helper to create a constant backoff duration
pub fn constant_backoff(duration_ms: u64) -> impl Fn(usize) -> Duration + Send + Sync {
    move |_| Duration::from_millis(duration_ms)
}

/// Run `operation` until it succeeds or `max_attempts` is reached, sleeping
/// `backoff_fn(attempt)` between attempts. The attempt number (1-based) is
/// passed to the operation.
pub async fn with_retry_and_backoff<T, E, F, Fut, B>(
    mut operation: F,
    max_attempts: usize,
    log_context: &str,
    backoff_fn: B,
) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
    B: Fn(usize) -> Duration,
{
    let max_attempts = max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("{} succeeded after {} attempts", log_context, attempt);
                }
                return Ok(value);
            }
            Err(e) if attempt >= max_attempts => {
                warn!("{} failed after {} attempts: {}", log_context, attempt, e);
                return Err(e);
            }
            Err(e) => {
                let delay = backoff_fn(attempt);
                warn!(
                    "{} failed (attempt {}/{}): {}. Retrying in {:?}",
                    log_context, attempt, max_attempts, e, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

/// Retry with the fixed delay of a [`RetryPolicy`]
pub async fn with_retry_policy<T, E, F, Fut>(
    operation: F,
    policy: RetryPolicy,
    log_context: &str,
) -> Result<T, E>
where
    F: FnMut(usize) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let delay = policy.delay;
    with_retry_and_backoff(operation, policy.max_attempts, log_context, move |_| delay).await
}
