//! Bounded retry with per-call-site fault classification

use std::future::Future;
use std::time::Duration;

use super::{ApiError, FaultKind};

/// Retryable kinds for plain network boundaries
pub const TRANSPORT_FAULTS: &[FaultKind] = &[FaultKind::Transport];

/// Default number of retries after the first attempt
pub const DEFAULT_MAX_RETRIES: u32 = 5;

/// Stateless retry combinator shared by every network boundary.
///
/// The same policy value can wrap any number of calls; it never carries state
/// between invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is `max_retries + 1`
    pub max_retries: u32,
    /// Fixed pause before each retry
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RETRIES)
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            delay: Duration::ZERO,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Run `operation`, retrying while it fails with one of `retryable`.
    ///
    /// The operation receives the 0-based attempt number. Faults outside
    /// `retryable` propagate immediately; a retryable fault on the last
    /// allowed attempt propagates unchanged.
    pub async fn execute<T, F, Fut>(
        &self,
        retryable: &[FaultKind],
        mut operation: F,
    ) -> Result<T, ApiError>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        let mut attempt = 0;
        loop {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) => {
                    let kind = e.kind();
                    if !retryable.contains(&kind) || attempt >= self.max_retries {
                        return Err(e);
                    }
                    attempt += 1;
                    tracing::info!(
                        error = %e,
                        "caught error {}, retrying ({}/{})",
                        kind,
                        attempt,
                        self.max_retries
                    );
                    if !self.delay.is_zero() {
                        tokio::time::sleep(self.delay).await;
                    }
                }
            }
        }
    }
}
