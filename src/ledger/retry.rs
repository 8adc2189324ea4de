//! Bounded exponential backoff for read-only ledger calls.

use std::time::Duration;

use super::client::LedgerError;

/// Retry schedule for read-only calls. Mutating calls are never run
/// through this — an apparent transport failure on a mutation may have
/// landed anyway, so the corrector re-reads state instead.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the first retry; doubles each retry.
    pub base_delay: Duration,
    /// Cap on the per-retry delay.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            base_delay: Duration::from_millis(250),
            max_delay: Duration::from_secs(5),
        }
    }
}

impl RetryPolicy {
    /// Delay before retry number `retry` (1-based), exponential with cap.
    fn delay(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Run a read-only call, retrying transient failures per `policy`.
/// Non-transient errors and exhausted retries propagate to the caller.
pub fn retry_read<T>(
    policy: &RetryPolicy,
    what: &str,
    mut call: impl FnMut() -> Result<T, LedgerError>,
) -> Result<T, LedgerError> {
    let mut retry = 0;
    loop {
        match call() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && retry + 1 < policy.attempts.max(1) => {
                retry += 1;
                let delay = policy.delay(retry);
                tracing::warn!(%what, %err, retry, ?delay, "transient read failure, retrying");
                std::thread::sleep(delay);
            }
            Err(err) => return Err(err),
        }
    }
}
