//! Bounded retry middleware for tool and agent invocations
//!
//! Wraps any `Result`-returning async operation with a bounded attempt
//! loop and a configurable exhaustion disposition: `Continue` hands back
//! a degraded outcome the caller can fold into partial results, `Abort`
//! propagates a terminal error.

use std::future::Future;
use std::time::Duration;

use backon::{BackoffBuilder, ExponentialBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::{Error, Result};

/// What to do once all attempts are spent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnExhaustion {
    /// Return a degraded outcome carrying the last failure
    #[default]
    Continue,
    /// Propagate a terminal error to the caller
    Abort,
}

/// Backoff timing between attempts
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Whether to add jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            jitter: true,
        }
    }
}

/// Retry policy for one middleware instance
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (always >= 1)
    pub max_attempts: u32,
    /// Disposition once attempts are exhausted
    pub on_exhaustion: OnExhaustion,
    /// Delay configuration between attempts
    pub backoff: RetryConfig,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            on_exhaustion: OnExhaustion::Continue,
            backoff: RetryConfig::default(),
        }
    }
}

impl RetryPolicy {
    /// Policy with no delay between attempts (tests, local gateways)
    pub fn immediate(max_attempts: u32, on_exhaustion: OnExhaustion) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            on_exhaustion,
            backoff: RetryConfig {
                initial_delay: Duration::ZERO,
                max_delay: Duration::ZERO,
                jitter: false,
            },
        }
    }

    fn delays(&self) -> impl Iterator<Item = Duration> {
        let mut builder = ExponentialBuilder::default()
            .with_min_delay(self.backoff.initial_delay)
            .with_max_delay(self.backoff.max_delay)
            .with_max_times(self.max_attempts as usize);

        if self.backoff.jitter {
            builder = builder.with_jitter();
        }

        builder.build()
    }
}

/// Outcome of a retried operation
#[derive(Debug)]
pub enum RetryOutcome<T> {
    /// The operation succeeded on attempt `attempts`
    Ok { value: T, attempts: u32 },
    /// Attempts were exhausted in `Continue` mode; the last failure is kept
    Degraded { error: Error, attempts: u32 },
}

impl<T> RetryOutcome<T> {
    /// Number of attempts actually made
    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Ok { attempts, .. } | RetryOutcome::Degraded { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, RetryOutcome::Degraded { .. })
    }
}

/// Run `op` up to `policy.max_attempts` times.
///
/// Non-retriable failures (invalid request, missing executable) stop the
/// loop at the attempt that produced them; the exhaustion disposition
/// still decides whether they degrade or abort. Operations must tolerate
/// at-least-once invocation; side effects of failed attempts are not
/// undone here.
pub async fn with_retry<T, F, Fut>(policy: &RetryPolicy, mut op: F) -> Result<RetryOutcome<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut delays = policy.delays();
    let mut attempts = 0u32;

    loop {
        attempts += 1;
        match op().await {
            Ok(value) => {
                if attempts > 1 {
                    debug!(attempts, "operation succeeded after retry");
                }
                return Ok(RetryOutcome::Ok { value, attempts });
            }
            Err(err) => {
                let permanent = !err.is_retriable();
                if permanent || attempts >= max_attempts {
                    warn!(attempts, error = %err, "retries exhausted");
                    return match policy.on_exhaustion {
                        OnExhaustion::Continue => Ok(RetryOutcome::Degraded {
                            error: err,
                            attempts,
                        }),
                        OnExhaustion::Abort => Err(Error::RetryExhausted {
                            attempts,
                            source: Box::new(err),
                        }),
                    };
                }
                debug!(attempt = attempts, error = %err, "retrying after failure");
                if let Some(delay) = delays.next() {
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }
    }
}
