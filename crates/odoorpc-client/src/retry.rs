//! Retry policy with exponential backoff
//!
//! A [`RetryPolicy`] wraps any zero-argument fallible async operation. It
//! counts attempts rather than time:
//!
//! - Attempt `n` runs the operation to completion before anything else
//!   happens; attempt `n + 1` never overlaps it.
//! - Success returns immediately.
//! - Failure on the last attempt, or one the predicate rejects, is returned
//!   as-is.
//! - Otherwise the policy sleeps and tries again. The first delay is
//!   `base_delay`, each later one is multiplied by `backoff_factor`, and all
//!   are capped at `max_delay`.
//!
//! With the defaults (3 attempts, 1 s base, 2x, 30 s cap) a failing call
//! waits 1 s then 2 s before giving up.
//!
//! Only idempotent calls should be wrapped. A create that reached the backend
//! before the connection dropped would be duplicated by a retry.

use odoorpc_common::protocol::error::{Result, RpcError};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

/// Backoff parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Total attempts including the first one (at least 1)
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
    /// Multiplier applied after each retried attempt (greater than 1)
    pub backoff_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(30_000),
            backoff_factor: 2.0,
        }
    }
}

/// Caller overrides merged over a base [`RetryPolicy`].
///
/// `retry_if` replaces the policy's predicate for the derived policy only.
pub struct RetryOptions<E = RpcError> {
    pub max_attempts: Option<u32>,
    pub base_delay: Option<Duration>,
    pub max_delay: Option<Duration>,
    pub backoff_factor: Option<f64>,
    pub retry_if: Option<RetryPredicate<E>>,
}

impl<E> Default for RetryOptions<E> {
    fn default() -> Self {
        Self {
            max_attempts: None,
            base_delay: None,
            max_delay: None,
            backoff_factor: None,
            retry_if: None,
        }
    }
}

impl<E> Clone for RetryOptions<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            base_delay: self.base_delay,
            max_delay: self.max_delay,
            backoff_factor: self.backoff_factor,
            retry_if: self.retry_if.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryOptions<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryOptions")
            .field("max_attempts", &self.max_attempts)
            .field("base_delay", &self.base_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("retry_if", &self.retry_if.is_some())
            .finish()
    }
}

impl RetryConfig {
    /// Creates a validated config
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error when `max_attempts` is zero,
    /// `backoff_factor` is not greater than 1, or `base_delay_ms` exceeds
    /// `max_delay_ms`.
    pub fn new(max_attempts: u32, base_delay_ms: u64, max_delay_ms: u64, backoff_factor: f64) -> Result<Self> {
        let config = Self {
            max_attempts,
            base_delay: Duration::from_millis(base_delay_ms),
            max_delay: Duration::from_millis(max_delay_ms),
            backoff_factor,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let mut problems = Vec::new();
        if self.max_attempts == 0 {
            problems.push("max_attempts must be at least 1".to_string());
        }
        if !(self.backoff_factor > 1.0 && self.backoff_factor.is_finite()) {
            problems.push(format!("backoff_factor must be greater than 1, got {}", self.backoff_factor));
        }
        if self.base_delay > self.max_delay {
            problems.push("base_delay must not exceed max_delay".to_string());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(RpcError::validation("Invalid retry configuration", problems))
        }
    }

    /// Returns a copy with every `Some` field of `options` applied.
    pub fn merge<E>(&self, options: &RetryOptions<E>) -> Self {
        Self {
            max_attempts: options.max_attempts.unwrap_or(self.max_attempts),
            base_delay: options.base_delay.unwrap_or(self.base_delay),
            max_delay: options.max_delay.unwrap_or(self.max_delay),
            backoff_factor: options.backoff_factor.unwrap_or(self.backoff_factor),
        }
    }

    fn first_delay(&self) -> Duration {
        self.base_delay.min(self.max_delay)
    }

    fn next_delay(&self, current: Duration) -> Duration {
        Duration::try_from_secs_f64(current.as_secs_f64() * self.backoff_factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Shared predicate deciding whether a failure is worth another attempt
pub type RetryPredicate<E> = Arc<dyn Fn(&E) -> bool + Send + Sync>;

/// Backoff configuration plus the predicate that gates retries
///
/// Construct one explicitly and pass it where it is needed; clones share the
/// predicate.
///
/// # Example
///
/// ```no_run
/// use odoorpc_client::{RetryConfig, RetryPolicy, RpcClient};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = RpcClient::new("http://127.0.0.1:8069/xmlrpc/2/common")?;
/// let policy = RetryPolicy::new(RetryConfig::default());
///
/// let version = policy.run(|| client.call("", "version", vec![])).await?;
/// # Ok(())
/// # }
/// ```
pub struct RetryPolicy<E = RpcError> {
    config: RetryConfig,
    predicate: RetryPredicate<E>,
}

impl RetryPolicy<RpcError> {
    /// Policy using [`RpcError::is_retryable`] as its predicate
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            predicate: Arc::new(RpcError::is_retryable),
        }
    }
}

impl Default for RetryPolicy<RpcError> {
    fn default() -> Self {
        Self::new(RetryConfig::default())
    }
}

impl<E> RetryPolicy<E> {
    pub fn with_predicate<P>(config: RetryConfig, predicate: P) -> Self
    where
        P: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self {
            config,
            predicate: Arc::new(predicate),
        }
    }

    pub fn config(&self) -> &RetryConfig {
        &self.config
    }

    /// Overrides merged into the config; the predicate is kept unless
    /// `options.retry_if` replaces it
    pub fn with_options(&self, options: &RetryOptions<E>) -> Self {
        Self {
            config: self.config.merge(options),
            predicate: options
                .retry_if
                .clone()
                .unwrap_or_else(|| Arc::clone(&self.predicate)),
        }
    }

    pub fn should_retry(&self, error: &E) -> bool {
        (self.predicate)(error)
    }

    /// Runs `operation` until it succeeds, the predicate rejects its error,
    /// or the attempts run out. The last error is returned unchanged.
    pub async fn run<T, F, Fut>(&self, mut operation: F) -> std::result::Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
        E: fmt::Display,
    {
        let max_attempts = self.config.max_attempts.max(1);
        let mut delay = self.config.first_delay();
        let mut attempt = 1;

        loop {
            let error = match operation().await {
                Ok(value) => return Ok(value),
                Err(error) => error,
            };

            if attempt >= max_attempts {
                tracing::debug!(attempt, error = %error, "Retry attempts exhausted");
                return Err(error);
            }
            if !self.should_retry(&error) {
                tracing::debug!(attempt, error = %error, "Error is not retryable");
                return Err(error);
            }

            tracing::warn!(
                attempt,
                max_attempts,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "Attempt failed, retrying"
            );
            tokio::time::sleep(delay).await;
            delay = self.config.next_delay(delay);
            attempt += 1;
        }
    }
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            predicate: Arc::clone(&self.predicate),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
