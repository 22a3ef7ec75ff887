/*!
 * Fixed-attempt retry with constant backoff for remote channel calls.
 *
 * Every failure path ends in an explicit [`RetryOutcome`]; exhaustion is
 * reported back to the caller instead of panicking or silently dropping
 * the error. Retry activity feeds [`SyncMetrics`].
 */

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::metrics::SyncMetrics;

/// Attempt and backoff settings, shared by all platform clients.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: Duration::from_millis(200),
        }
    }
}

/// Terminal state of a retried operation.
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Succeeded { value: T, attempts: u32 },
    Exhausted { attempts: u32, last_error: String },
}

impl<T> RetryOutcome<T> {
    pub fn attempts(&self) -> u32 {
        match self {
            Self::Succeeded { attempts, .. } | Self::Exhausted { attempts, .. } => *attempts,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded { .. })
    }
}

/// Runs `op` up to `config.max_attempts` times, sleeping `config.backoff`
/// between attempts.
///
/// A success after at least one retry counts once towards
/// `retries_attempted`; running out of attempts counts once towards
/// `retries_failed` and yields [`RetryOutcome::Exhausted`] carrying the
/// last error text.
pub async fn execute_with_retry<T, E, F, Fut>(
    config: &RetryConfig,
    metrics: &SyncMetrics,
    operation: &str,
    mut op: F,
) -> RetryOutcome<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Display,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op().await {
            Ok(value) => {
                if attempt > 1 {
                    metrics.increment_retries_attempted();
                }
                return RetryOutcome::Succeeded {
                    value,
                    attempts: attempt,
                };
            }
            Err(err) if attempt < max_attempts => {
                warn!(
                    "{} attempt {}/{} failed: {}; retrying in {:?}",
                    operation, attempt, max_attempts, err, config.backoff
                );
                tokio::time::sleep(config.backoff).await;
                attempt += 1;
            }
            Err(err) => {
                warn!(
                    "{} failed after {} attempt(s): {}",
                    operation, attempt, err
                );
                metrics.increment_retries_failed();
                return RetryOutcome::Exhausted {
                    attempts: attempt,
                    last_error: err.to_string(),
                };
            }
        }
    }
}
