//! Retry executor for storage reads.
//!
//! Runs a fallible async operation, retrying transient failures with
//! exponential backoff plus up to 10% random jitter, capped at the configured
//! maximum delay. Constraint violations fail immediately.

use std::future::Future;
use std::time::Duration;

use motorway_core::{CachedResult, RetryConfig, StorageResult};

/// Executes storage operations with classification-aware retries.
#[derive(Debug, Clone)]
pub struct RetryExecutor {
    config: RetryConfig,
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Run `operation` with the configured attempt budget and base delay.
    pub async fn run<T, F, Fut>(&self, label: &str, operation: F) -> CachedResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        self.run_with(
            label,
            self.config.max_attempts,
            self.config.base_delay,
            operation,
        )
        .await
    }

    /// Run `operation` with an explicit attempt budget and base delay.
    ///
    /// A budget of zero is treated as one attempt. The returned result always
    /// carries the number of attempts actually made.
    pub async fn run_with<T, F, Fut>(
        &self,
        label: &str,
        max_attempts: u32,
        base_delay: Duration,
        mut operation: F,
    ) -> CachedResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StorageResult<T>>,
    {
        let max_attempts = max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            let error = match operation().await {
                Ok(data) => {
                    if attempt > 1 {
                        tracing::info!(
                            operation = label,
                            attempts = attempt,
                            "[RETRY_SUCCESS] {} succeeded after {} attempts",
                            label,
                            attempt
                        );
                    }
                    return CachedResult::success(data, attempt);
                }
                Err(error) => error,
            };

            if !error.is_retryable() {
                tracing::error!(
                    operation = label,
                    attempts = attempt,
                    code = error.code().unwrap_or("none"),
                    error = %error,
                    "[RETRY_FAILED] {} hit a non-retryable error",
                    label
                );
                return CachedResult::failure(error, attempt);
            }

            if attempt >= max_attempts {
                tracing::error!(
                    operation = label,
                    attempts = attempt,
                    code = error.code().unwrap_or("none"),
                    error = %error,
                    "[RETRY_FAILED] {} failed after {} attempts",
                    label,
                    attempt
                );
                return CachedResult::failure(error, attempt);
            }

            let delay = self.backoff_delay(attempt, base_delay);
            tracing::warn!(
                operation = label,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Transient storage error, retrying"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Delay before the retry that follows failed attempt number `attempt`.
    pub fn backoff_delay(&self, attempt: u32, base_delay: Duration) -> Duration {
        backoff_with_sample(
            attempt,
            base_delay,
            self.config.max_delay,
            self.config.jitter_ratio,
            rand::random::<f64>(),
        )
    }
}

/// `min(base * 2^(attempt - 1) + base * 2^(attempt - 1) * ratio * sample, max)`
/// with `sample` in `[0, 1)`.
fn backoff_with_sample(
    attempt: u32,
    base_delay: Duration,
    max_delay: Duration,
    jitter_ratio: f64,
    sample: f64,
) -> Duration {
    let exponent = attempt.saturating_sub(1).min(30) as i32;
    let exponential = base_delay.as_secs_f64() * 2f64.powi(exponent);
    let jitter = exponential * jitter_ratio.clamp(0.0, 1.0) * sample.clamp(0.0, 1.0);
    let capped = (exponential + jitter).min(max_delay.as_secs_f64());
    Duration::from_secs_f64(capped.max(0.0))
}
