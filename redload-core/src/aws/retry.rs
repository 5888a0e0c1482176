//! Retry layer for object-storage calls that feed a load.
//!
//! Only [`RemoteError`]s that classify as transient are retried. SQL
//! statements never pass through here.

use super::RemoteError;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

fn default_max_attempts() -> u32 {
    5
}

fn default_initial_backoff_ms() -> u64 {
    200
}

fn default_max_backoff_ms() -> u64 {
    10_000
}

fn default_multiplier() -> f64 {
    2.0
}

/// Capped exponential backoff policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts including the first one (at least 1)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    /// Upper bound on any single delay
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    /// Growth factor between consecutive delays
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            multiplier: default_multiplier(),
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.max(1.0).powi(i32::try_from(retry).unwrap_or(i32::MAX));
        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let millis =
            (self.initial_backoff_ms as f64 * factor).min(self.max_backoff_ms as f64) as u64;
        Duration::from_millis(millis.min(self.max_backoff_ms))
    }
}

/// Runs `operation` until it succeeds, fails permanently, or the policy's
/// attempts are used up. The last error is returned on failure.
///
/// ```rust
/// use redload_core::aws::{RemoteError, RetryPolicy, retry_remote};
///
/// # async fn example() -> Result<(), RemoteError> {
/// let body = retry_remote(&RetryPolicy::default(), "get manifest", || async {
///     Ok::<_, RemoteError>("{\"entries\":[]}".to_string())
/// })
/// .await?;
/// # Ok(())
/// # }
/// ```
pub async fn retry_remote<T, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> Result<T, RemoteError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RemoteError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt: u32 = 0;
    loop {
        attempt = attempt.saturating_add(1);
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation = operation_name, attempt, "Succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.backoff(attempt.saturating_sub(1));
                warn!(
                    operation = operation_name,
                    attempt,
                    max_attempts,
                    status = err.status_code,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Transient failure, retrying"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    status = err.status_code,
                    transient = err.is_transient(),
                    "Giving up"
                );
                return Err(err);
            }
        }
    }
}
