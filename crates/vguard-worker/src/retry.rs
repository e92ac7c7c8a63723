//! Retry utilities with exponential backoff.
//!
//! Probe and frame-grab calls retry transient media failures; live feeds use
//! [`FailureTracker`] to keep a failing camera from flooding the log.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (not including the initial attempt).
    pub max_retries: u32,
    /// Delay before the first retry; doubles with each further retry.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Operation name for logging.
    pub operation_name: String,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            operation_name: "operation".to_string(),
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with the given operation name.
    pub fn new(operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..Default::default()
        }
    }

    /// Same policy under another operation name.
    pub fn named(&self, operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: operation_name.into(),
            ..self.clone()
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    /// Delay before retry number `retry` (1-based).
    fn delay_for_retry(&self, retry: u32) -> Duration {
        let exp = retry.saturating_sub(1).min(16);
        let delay = self.base_delay.saturating_mul(2u32.pow(exp));
        delay.min(self.max_delay)
    }
}

/// Execute an async operation, retrying errors accepted by `is_retryable`.
///
/// Non-retryable errors are returned immediately.
pub async fn retry_if<F, Fut, T, E, P>(config: &RetryConfig, is_retryable: P, operation: F) -> Result<T, E>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let mut retry = 0u32;

    loop {
        match operation().await {
            Ok(value) => return Ok(value),
            Err(e) if retry < config.max_retries && is_retryable(&e) => {
                retry += 1;
                let delay = config.delay_for_retry(retry);
                warn!(
                    operation = %config.operation_name,
                    retry,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(e) => {
                if retry > 0 {
                    debug!(
                        operation = %config.operation_name,
                        attempts = retry + 1,
                        "Giving up after retries"
                    );
                }
                return Err(e);
            }
        }
    }
}

/// Counts consecutive failures of a repeating operation (one live feed's
/// frame analysis, say) and tells the caller when to stop logging them.
#[derive(Debug)]
pub struct FailureTracker {
    label: String,
    consecutive_failures: u32,
    max_logged_failures: u32,
}

impl FailureTracker {
    pub fn new(label: impl Into<String>, max_logged_failures: u32) -> Self {
        Self {
            label: label.into(),
            consecutive_failures: 0,
            max_logged_failures,
        }
    }

    /// Reset after a success, noting recovery if logs were suppressed.
    pub fn record_success(&mut self) {
        if self.is_suppressed() {
            info!(
                label = %self.label,
                failures = self.consecutive_failures,
                "Recovered after suppressed failures"
            );
        }
        self.consecutive_failures = 0;
    }

    /// Returns `true` while this failure should still be logged.
    pub fn record_failure(&mut self) -> bool {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);

        if self.consecutive_failures == self.max_logged_failures + 1 {
            warn!(
                label = %self.label,
                after = self.max_logged_failures,
                "Suppressing further failure logs"
            );
        }
        !self.is_suppressed()
    }

    pub fn is_suppressed(&self) -> bool {
        self.consecutive_failures > self.max_logged_failures
    }

    pub fn failure_count(&self) -> u32 {
        self.consecutive_failures
    }
}
