// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Bounded retry for store operations.
//!
//! Repository implementations wrap each statement in
//! [`ExponentialBackoff::execute`]. Only [`StoreError::Unavailable`] is
//! retried; once attempts are exhausted the caller sees
//! [`CoreError::ServiceUnavailable`].
//!
//! # Example
//!
//! ```rust,ignore
//! use report_core::retry::{ExponentialBackoff, RetryConfig};
//!
//! let retry = ExponentialBackoff::new(RetryConfig::default());
//! let user = retry.execute("users.find", || async {
//!     sqlx::query("SELECT ...").fetch_optional(&pool).await.map_err(map_sqlx_error)
//! }).await?;
//! ```

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult, StoreError, StoreResult};

// =============================================================================
// Retry Configuration
// =============================================================================

/// Configuration for store retries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry.
    #[serde(default = "default_initial_delay")]
    #[serde(with = "duration_millis", rename = "initial_delay_ms")]
    pub initial_delay: Duration,

    /// Upper bound for a single delay.
    #[serde(default = "default_max_delay")]
    #[serde(with = "duration_millis", rename = "max_delay_ms")]
    pub max_delay: Duration,

    /// Backoff multiplier.
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Jitter factor (0.0 to 1.0).
    #[serde(default)]
    pub jitter: f64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_millis(50)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(2)
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            multiplier: default_multiplier(),
            jitter: 0.1,
        }
    }
}

impl RetryConfig {
    /// Creates a configuration that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Sets the total number of attempts.
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Sets the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Sets the jitter factor.
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// =============================================================================
// Retry Decision
// =============================================================================

/// Decision on whether to retry an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// Do not retry, return the error.
    DoNotRetry,
}

// =============================================================================
// Exponential Backoff
// =============================================================================

/// Exponentially increasing delays.
///
/// Delay formula: `min(initial_delay * multiplier^(attempt-1), max_delay)`
#[derive(Debug, Clone, Default)]
pub struct ExponentialBackoff {
    config: RetryConfig,
}

impl ExponentialBackoff {
    /// Creates a new exponential backoff strategy.
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_delay = self.config.initial_delay.as_millis() as f64;
        let multiplied =
            base_delay * self.config.multiplier.powi(attempt.saturating_sub(1) as i32);
        let capped = multiplied.min(self.config.max_delay.as_millis() as f64);

        Duration::from_millis(capped as u64)
    }

    /// Determines whether to retry after a failure.
    ///
    /// `attempt` is 1-based.
    pub fn should_retry(&self, error: &StoreError, attempt: u32) -> RetryDecision {
        if attempt >= self.config.max_attempts || !error.is_retryable() {
            return RetryDecision::DoNotRetry;
        }

        let delay = apply_jitter(self.calculate_delay(attempt), self.config.jitter);
        RetryDecision::Retry(delay)
    }

    /// Runs `operation` until it succeeds, fails permanently or runs out of
    /// attempts.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, mut operation: F) -> CoreResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 0u32;

        loop {
            attempt += 1;

            match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => match self.should_retry(&error, attempt) {
                    RetryDecision::Retry(delay) => {
                        tracing::debug!(
                            operation = operation_name,
                            attempt = attempt,
                            delay_ms = delay.as_millis() as u64,
                            error = %error,
                            "Retrying store operation"
                        );
                        tokio::time::sleep(delay).await;
                    }
                    RetryDecision::DoNotRetry if error.is_retryable() => {
                        tracing::warn!(
                            operation = operation_name,
                            attempts = attempt,
                            error = %error,
                            "Store retries exhausted"
                        );
                        return Err(CoreError::unavailable(format!(
                            "{operation_name} failed after {attempt} attempts: {error}"
                        )));
                    }
                    RetryDecision::DoNotRetry => return Err(error.into()),
                },
            }
        }
    }
}

fn apply_jitter(duration: Duration, jitter_factor: f64) -> Duration {
    if jitter_factor <= 0.0 {
        return duration;
    }

    let millis = duration.as_millis() as f64;
    let jitter_range = millis * jitter_factor;
    let random: f64 = rand::thread_rng().gen_range(-1.0..=1.0);
    let jittered = millis + (random * jitter_range);

    Duration::from_millis(jittered.max(0.0) as u64)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast() -> ExponentialBackoff {
        ExponentialBackoff::new(
            RetryConfig::default()
                .with_initial_delay(Duration::from_millis(1))
                .with_jitter(0.0),
        )
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let strategy = ExponentialBackoff::new(RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(300),
            multiplier: 2.0,
            jitter: 0.0,
        });

        assert_eq!(strategy.calculate_delay(1), Duration::from_millis(100));
        assert_eq!(strategy.calculate_delay(2), Duration::from_millis(200));
        assert_eq!(strategy.calculate_delay(3), Duration::from_millis(300));
        assert_eq!(strategy.calculate_delay(6), Duration::from_millis(300));
    }

    #[test]
    fn test_permanent_errors_are_not_retried() {
        let strategy = fast();
        assert_eq!(
            strategy.should_retry(&StoreError::conflict("dup"), 1),
            RetryDecision::DoNotRetry
        );
        assert!(matches!(
            strategy.should_retry(&StoreError::unavailable("busy"), 1),
            RetryDecision::Retry(_)
        ));
    }

    #[tokio::test]
    async fn test_recovers_from_transient_failure() {
        let calls = AtomicU32::new(0);
        let result = fast()
            .execute("test.op", || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 0 {
                        Err(StoreError::unavailable("busy"))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result, Ok(7));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_exhaustion_is_service_unavailable() {
        let calls = AtomicU32::new(0);
        let result: CoreResult<()> = fast()
            .execute("test.op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StoreError::unavailable("down")) }
            })
            .await;

        assert!(matches!(result, Err(CoreError::ServiceUnavailable { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_fails_fast() {
        let calls = AtomicU32::new(0);
        let result: CoreResult<()> = fast()
            .execute("test.op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(StoreError::conflict("duplicate")) }
            })
            .await;

        assert!(matches!(result, Err(CoreError::Conflict { .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
