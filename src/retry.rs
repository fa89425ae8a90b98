use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::FetchError;

pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
pub const DEFAULT_BASE_DELAY_MS: u64 = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: Duration::from_millis(DEFAULT_BASE_DELAY_MS),
        }
    }
}

impl RetryPolicy {
    /// Wait after failed attempt `attempt` (1-based): `2^attempt * base`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.min(16));
        self.base_delay.saturating_mul(factor)
    }
}

/// Stops retries from being scheduled once cancelled or past the deadline.
#[derive(Debug, Clone, Default)]
pub struct RetryGuard {
    pub cancel: CancellationToken,
    pub deadline: Option<Instant>,
}

impl RetryGuard {
    pub fn new(cancel: CancellationToken, deadline: Option<Instant>) -> Self {
        Self { cancel, deadline }
    }

    fn allows_wait(&self, delay: Duration) -> bool {
        if self.cancel.is_cancelled() {
            return false;
        }
        match self.deadline {
            Some(deadline) => Instant::now() + delay < deadline,
            None => true,
        }
    }
}

/// Runs `op` until it succeeds, fails terminally or the attempt budget is
/// spent. `op` receives the 1-based attempt number.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    guard: &RetryGuard,
    mut op: F,
) -> Result<T, FetchError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let err = match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        if !err.is_retryable() {
            debug!(source = %err.source_name, attempt, "terminal failure, not retrying");
            return Err(err.with_attempts(attempt));
        }
        if attempt >= max_attempts {
            warn!(source = %err.source_name, attempts = attempt, "retries exhausted: {}", err.message);
            return Err(err.exhausted(attempt));
        }

        let delay = policy.delay_after(attempt);
        if !guard.allows_wait(delay) {
            debug!(source = %err.source_name, attempt, "deadline reached, no further attempts");
            return Err(err.cancelled(attempt));
        }
        debug!(
            source = %err.source_name,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "retryable failure: {}",
            err.message
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = guard.cancel.cancelled() => return Err(err.cancelled(attempt)),
        }
        attempt += 1;
    }
}
