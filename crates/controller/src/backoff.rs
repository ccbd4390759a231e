// Copyright The Workload Variant Autoscaler Authors
// SPDX-License-Identifier: Apache-2.0

//! Bounded exponential backoff with jitter for store and backend I/O.

use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Retry policy: bounded attempts with exponential backoff and
/// symmetric jitter.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    /// Total attempts, including the first.
    pub attempts: u32,
    /// Delay before the second attempt.
    pub base: Duration,
    /// Multiplier applied per subsequent attempt.
    pub factor: f64,
    /// Jitter fraction applied to each delay (0.1 = +-10%).
    pub jitter: f64,
}

impl Default for Backoff {
    fn default() -> Self {
        Self {
            attempts: 5,
            base: Duration::from_millis(100),
            factor: 2.0,
            jitter: 0.1,
        }
    }
}

impl Backoff {
    /// Delay before the attempt following failure number `failure` (0-based),
    /// jittered.
    #[must_use]
    pub fn delay(&self, failure: u32) -> Duration {
        let exp = self.base.as_secs_f64() * self.factor.powi(failure as i32);
        let jitter = rand::rng().random_range(-self.jitter..=self.jitter);
        Duration::from_secs_f64((exp * (1.0 + jitter)).max(0.0))
    }

    /// Runs `operation` until it succeeds, a failure is not retryable, or
    /// the attempt budget is exhausted.
    pub async fn retry<T, E, Fut>(
        &self,
        operation_name: &str,
        is_retryable: impl Fn(&E) -> bool,
        mut operation: impl FnMut() -> Fut,
    ) -> Result<T, E>
    where
        E: std::fmt::Display,
        Fut: Future<Output = Result<T, E>>,
    {
        let mut failure = 0;
        loop {
            match operation().await {
                Ok(value) => return Ok(value),
                Err(err) if failure + 1 < self.attempts && is_retryable(&err) => {
                    let delay = self.delay(failure);
                    tracing::debug!(
                        operation = operation_name,
                        attempt = failure + 1,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after failure"
                    );
                    tokio::time::sleep(delay).await;
                    failure += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
