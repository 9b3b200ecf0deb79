//! Retry with exponential backoff, as an executor adapter.
//!
//! The dispatcher never retries a host on its own, since an operation may
//! have side effects on the remote host. An operation that is safe to repeat
//! opts in by wrapping its executor in [`Retrying`], which makes retry part of
//! the operation.

use crate::context::HostExecutor;
use crate::host::Host;
use anyhow::Result;
use std::thread;
use std::time::Duration;

/// Retry schedule for an executor
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_factor: f64,
    /// Upper bound on any single delay
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Retry up to `retries` times after the first attempt, with default backoff
    pub fn with_retries(retries: u32) -> Self {
        Self {
            max_attempts: retries.saturating_add(1),
            ..Default::default()
        }
    }

    /// Create a config that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt number (0-indexed).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let delay = self.base_delay.as_secs_f64() * self.backoff_factor.powi(attempt as i32);
        let capped = delay.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }
}

type RetryPredicate = Box<dyn Fn(&anyhow::Error) -> bool + Send + Sync>;

/// Executor adapter that retries failed attempts.
///
/// Retries every error by default; narrow it with [`when`](Self::when).
pub struct Retrying<E> {
    inner: E,
    config: RetryConfig,
    retryable: RetryPredicate,
}

impl<E: HostExecutor> Retrying<E> {
    pub fn new(inner: E, config: RetryConfig) -> Self {
        Self {
            inner,
            config,
            retryable: Box::new(|_| true),
        }
    }

    /// Only retry errors accepted by `predicate`
    pub fn when<P>(mut self, predicate: P) -> Self
    where
        P: Fn(&anyhow::Error) -> bool + Send + Sync + 'static,
    {
        self.retryable = Box::new(predicate);
        self
    }
}

impl<E: HostExecutor> HostExecutor for Retrying<E> {
    fn execute(&self, host: &Host) -> Result<String> {
        let mut attempt = 0;
        loop {
            match self.inner.execute(host) {
                Ok(output) => return Ok(output),
                Err(e) => {
                    if attempt + 1 >= self.config.max_attempts || !(self.retryable)(&e) {
                        return Err(e);
                    }

                    let delay = self.config.delay_for_attempt(attempt);
                    log::warn!(
                        "{}: attempt {}/{} failed: {e:#}. Retrying in {:.1}s...",
                        host.id,
                        attempt + 1,
                        self.config.max_attempts,
                        delay.as_secs_f64()
                    );
                    thread::sleep(delay);
                    attempt += 1;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(10),
        }
    }

    #[test]
    fn test_delay_for_attempt() {
        let config = RetryConfig {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
            backoff_factor: 2.0,
            max_delay: Duration::from_secs(5),
        };
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(1));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs(2));
        assert_eq!(config.delay_for_attempt(2), Duration::from_secs(4));
        assert_eq!(config.delay_for_attempt(3), Duration::from_secs(5));
    }

    #[test]
    fn test_with_retries() {
        assert_eq!(RetryConfig::with_retries(0).max_attempts, 1);
        assert_eq!(RetryConfig::with_retries(2).max_attempts, 3);
        assert_eq!(RetryConfig::no_retry().max_attempts, 1);
    }

    #[test]
    fn test_eventual_success() {
        let attempts = AtomicU32::new(0);
        let op = |_: &Host| -> Result<String> {
            if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                bail!("timeout");
            }
            Ok("up".into())
        };

        let retrying = Retrying::new(op, fast(3));
        assert_eq!(retrying.execute(&Host::new("sdw1")).unwrap(), "up");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_all_attempts_fail() {
        let attempts = AtomicU32::new(0);
        let op = |_: &Host| -> Result<String> {
            attempts.fetch_add(1, Ordering::SeqCst);
            bail!("timeout")
        };

        let err = Retrying::new(op, fast(3))
            .execute(&Host::new("sdw1"))
            .unwrap_err();
        assert_eq!(err.to_string(), "timeout");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_non_retryable_error_returns_immediately() {
        let attempts = AtomicU32::new(0);
        let op = |_: &Host| -> Result<String> {
            attempts.fetch_add(1, Ordering::SeqCst);
            bail!("permission denied")
        };

        let result = Retrying::new(op, fast(5))
            .when(|e| e.to_string().contains("timeout"))
            .execute(&Host::new("sdw1"));
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
