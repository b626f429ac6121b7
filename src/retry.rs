//! Retry combinator shared by the store fetcher and the URL verifier.
//!
//! A [`RetryPolicy`] carries the attempt ceiling and backoff; callers supply the
//! operation and a predicate deciding which errors are worth another attempt.

use serde::Deserialize;
use std::fmt::Debug;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// How the delay grows between attempts
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BackoffStrategy {
    /// base × attempt
    #[default]
    Linear,
    /// base × 2^(attempt - 1)
    Exponential,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one. Never less than 1.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub strategy: BackoffStrategy,
    pub max_delay: Duration,
}

/// Result of running an operation under a policy, with the attempt count.
#[derive(Debug)]
pub struct Attempted<T, E> {
    pub result: Result<T, E>,
    pub attempts: u32,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration, strategy: BackoffStrategy) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            strategy,
            max_delay: Duration::from_secs(30),
        }
    }

    pub fn linear(max_attempts: u32, base_delay: Duration) -> Self {
        Self::new(max_attempts, base_delay, BackoffStrategy::Linear)
    }

    /// A policy that never retries.
    pub fn once() -> Self {
        Self::linear(1, Duration::ZERO)
    }

    /// Delay to wait after `attempt` (1-indexed) has failed.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let delay = match self.strategy {
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt),
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(attempt - 1);
                self.base_delay.saturating_mul(factor)
            }
        };
        delay.min(self.max_delay)
    }

    /// Run `operation` until it succeeds, returns a non-retryable error, or the
    /// attempt ceiling is reached. The operation receives the 1-indexed attempt.
    pub async fn run<T, E, F, Fut, P>(&self, mut operation: F, is_retryable: P) -> Attempted<T, E>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        P: Fn(&E) -> bool,
        E: Debug,
    {
        let mut attempt = 0;

        loop {
            attempt += 1;

            match operation(attempt).await {
                Ok(value) => {
                    return Attempted {
                        result: Ok(value),
                        attempts: attempt,
                    }
                }
                Err(e) => {
                    if !is_retryable(&e) {
                        debug!("Attempt {} failed with non-retryable error: {:?}", attempt, e);
                        return Attempted {
                            result: Err(e),
                            attempts: attempt,
                        };
                    }
                    if attempt >= self.max_attempts {
                        warn!("All {} attempts exhausted, giving up: {:?}", self.max_attempts, e);
                        return Attempted {
                            result: Err(e),
                            attempts: attempt,
                        };
                    }

                    let delay = self.delay_after(attempt);
                    debug!(
                        "Attempt {} failed ({:?}), retrying in {:?} with {:?} backoff",
                        attempt, e, delay, self.strategy
                    );
                    sleep(delay).await;
                }
            }
        }
    }
}
