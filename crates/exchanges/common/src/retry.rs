use std::future::Future;
use std::time::Duration;

use candle_feed_core::errors::Error;
use tokio::time::sleep;
use tracing::{debug, info};

/// Retry configuration
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub attempts: u32,
    pub first_sleep: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            first_sleep: Duration::from_secs(1),
            multiplier: 2.0,
        }
    }
}

/// Exponential backoff delay for the given 1-based attempt number:
/// `first_sleep * multiplier^(attempt - 1)`.
pub fn backoff_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let millis =
        config.first_sleep.as_millis() as f64 * config.multiplier.powi(attempt as i32 - 1);
    Duration::from_millis(millis as u64)
}

/// Drive a provider's single-shot request with retries.
///
/// Non-retryable errors surface immediately. When the exchange dictated a
/// wait (rate-limit retry-after), that wait replaces the backoff for the
/// attempt. The last error is returned once `attempts` is exhausted.
pub async fn request_with_retries<F, Fut, T>(
    mut f: F,
    config: &RetryConfig,
    debug_logs: bool,
) -> Result<T, Error>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Error>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        let err = match f().await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if !err.is_retryable() || attempt >= config.attempts.max(1) {
            return Err(err);
        }

        let delay = err
            .retry_after()
            .unwrap_or_else(|| backoff_delay(attempt, config));
        if debug_logs {
            info!(attempt, ?delay, error = %err, "retrying candlestick request");
        } else {
            debug!(attempt, ?delay, error = %err, "retrying candlestick request");
        }
        sleep(delay).await;
    }
}
