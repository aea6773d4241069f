//! Reusable retry policy for outbound sends
//!
//! A first-class configuration object instead of a magic "retry forever"
//! constant: callers state which errors are worth retrying, how long to
//! wait between attempts, and whether attempts are capped at all.
use std::future::Future;
use std::time::Duration;

use tokio::time::{sleep, timeout};
use tracing::debug;

use crate::error::{Result, StarlingError};

#[derive(Clone, Debug)]
pub struct RetryPolicy {
    /// Delay between attempts
    pub delay: Duration,

    /// Cap on total attempts; `None` retries until the process shuts down.
    /// Indefinite retry is how the protocol rides out partitions that heal
    /// after an unbounded delay.
    pub max_attempts: Option<u32>,

    /// Bound on each individual attempt, so one slow or partitioned peer
    /// cannot keep the loop from re-attempting promptly.
    pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Unbounded retries with the given inter-attempt delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            max_attempts: None,
            attempt_timeout: None,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = Some(attempt_timeout);
        self
    }

    /// Drive `operation` until it succeeds, fails non-retryably, or the
    /// attempt cap is exhausted.
    ///
    /// Each attempt is independently bounded by `attempt_timeout` when set;
    /// an attempt that overruns it is treated as a timeout error and fed to
    /// `is_retryable` like any other failure. A non-retryable error is
    /// returned to the caller immediately: it would fail identically on
    /// repetition.
    pub async fn run<T, F, Fut, P>(&self, mut operation: F, is_retryable: P) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&StarlingError) -> bool,
    {
        let mut attempts: u32 = 0;

        loop {
            attempts = attempts.saturating_add(1);

            let outcome = match self.attempt_timeout {
                Some(bound) => match timeout(bound, operation()).await {
                    Ok(result) => result,
                    Err(elapsed) => Err(elapsed.into()),
                },
                None => operation().await,
            };

            match outcome {
                Ok(value) => return Ok(value),
                Err(err) if !is_retryable(&err) => return Err(err),
                Err(err) => {
                    if let Some(max) = self.max_attempts {
                        if attempts >= max {
                            return Err(err);
                        }
                    }
                    debug!(
                        attempt = attempts,
                        error = %err,
                        "Retryable failure, waiting before next attempt"
                    );
                    sleep(self.delay).await;
                }
            }
        }
    }
}
