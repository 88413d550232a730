//! Capped exponential backoff for rate-limited calls.

use crate::{OperationContext, classify_error, log_api_error};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_retry2::Retry;
use tracing::{debug, instrument, warn};
use turnstile_error::{Classification, ConfigError, RetryError, RetryErrorKind, TurnstileResult};

/// Bounds for [`with_backoff`].
///
/// ```toml
/// [retry]
/// max_attempts = 3
/// initial_backoff_ms = 1000
/// max_backoff_ms = 10000
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct RetryConfig {
    /// Total attempts, including the first
    pub max_attempts: usize,
    /// Wait before the second attempt
    pub initial_backoff_ms: u64,
    /// Upper bound on any single wait
    pub max_backoff_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff_ms: 1_000,
            max_backoff_ms: 10_000,
        }
    }
}

impl RetryConfig {
    /// Check the bounds.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when no attempt is allowed or the
    /// initial wait exceeds the cap.
    pub fn validate(&self) -> TurnstileResult<()> {
        if self.max_attempts == 0 {
            return Err(ConfigError::new("retry.max_attempts must be at least 1").into());
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(ConfigError::new(format!(
                "retry.initial_backoff_ms ({}) exceeds retry.max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            ))
            .into());
        }
        Ok(())
    }
}

/// The waits between attempts: start at the initial backoff, double, cap.
///
/// Yields `max_attempts - 1` durations.
///
/// ```
/// use std::time::Duration;
/// use turnstile_retry::{backoff_schedule, RetryConfig};
///
/// let config = RetryConfig { max_attempts: 6, ..Default::default() };
/// let waits: Vec<_> = backoff_schedule(&config).collect();
/// assert_eq!(waits, [1, 2, 4, 8, 10].map(Duration::from_secs));
/// ```
pub fn backoff_schedule(config: &RetryConfig) -> impl Iterator<Item = Duration> + use<> {
    let cap = Duration::from_millis(config.max_backoff_ms);
    let initial = Duration::from_millis(config.initial_backoff_ms).min(cap);
    std::iter::successors(Some(initial), move |wait| Some(wait.saturating_mul(2).min(cap)))
        .take(config.max_attempts.saturating_sub(1))
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

/// Run `op`, retrying while it fails with a rate-limit error.
///
/// Errors from `op` are classified first. Only rate-limited failures are
/// retried; any other failure is logged and returned as soon as it happens.
/// When every attempt is rate limited the result is a retry error naming the
/// operation and the number of attempts made.
///
/// # Example
///
/// ```rust,ignore
/// let context = OperationContext::new("listMarketBook").with_resources(&ids);
/// let book = with_backoff(&RetryConfig::default(), &context, || {
///     client.query("listMarketBook", params.clone())
/// })
/// .await?;
/// ```
#[instrument(skip(config, op), fields(operation = %context.operation()))]
pub async fn with_backoff<F, Fut, T>(
    config: &RetryConfig,
    context: &OperationContext,
    op: F,
) -> TurnstileResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = TurnstileResult<T>>,
{
    let max_attempts = config.max_attempts.max(1);
    let waits: Vec<Duration> = backoff_schedule(config).collect();
    let mut attempts = 0usize;

    let result = Retry::spawn(
        waits.clone(),
        || {
            attempts += 1;
            let attempt = attempts;
            let next_wait = waits.get(attempt - 1).copied();
            let fut = op();
            async move {
                match fut.await {
                    Ok(value) => Ok(value),
                    Err(e) => {
                        let e = classify_error(e);
                        if e.classification() != Classification::RateLimited {
                            log_api_error(&e, context);
                            return Err(tokio_retry2::RetryError::Permanent(e));
                        }
                        match next_wait {
                            Some(wait) => warn!(
                                operation = %context.operation(),
                                attempt,
                                max_attempts,
                                wait_ms = millis(wait),
                                error = %e,
                                "Rate limited, backing off"
                            ),
                            None => log_api_error(&e, context),
                        }
                        Err(tokio_retry2::RetryError::Transient {
                            err: e,
                            retry_after: None,
                        })
                    }
                }
            }
        },
    )
    .await;

    match result {
        Ok(value) => {
            debug!(attempts, "Operation succeeded");
            Ok(value)
        }
        Err(e) if e.classification() == Classification::RateLimited => {
            warn!(
                operation = %context.operation(),
                attempts,
                "Giving up after repeated rate limiting"
            );
            Err(RetryError::new(RetryErrorKind::Exhausted {
                operation: context.operation().to_string(),
                attempts,
                last: e,
            })
            .into())
        }
        Err(e) => Err(e),
    }
}
