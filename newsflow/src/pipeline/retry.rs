//! Bounded retry with backoff for unreliable external calls.
//!
//! Agents wrap every network/LLM call in a [`RetryPolicy`]. The policy runs
//! the operation up to `max_attempts` times, waits between attempts, and
//! hands the last error back to the agent once attempts are exhausted.

use crate::errors::{NewsflowError, Result};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Backoff strategy for retry delays.
///
/// `attempt` below is the 1-based number of the attempt that just failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffStrategy {
    /// delay = base * attempt
    #[default]
    Linear,
    /// delay = base * 2^(attempt - 1)
    Exponential,
    /// delay = base
    Constant,
}

/// Jitter applied on top of the computed delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Jitter {
    /// Use the computed delay as is.
    #[default]
    None,
    /// Random from 0 to the computed delay.
    Full,
}

/// Retry policy wrapping a fallible async operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: usize,
    base_delay: Duration,
    max_delay: Duration,
    backoff: BackoffStrategy,
    jitter: Jitter,
    attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    /// Default delay unit between attempts.
    pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(1000);

    /// Creates a policy allowing `max_attempts` attempts.
    ///
    /// Zero attempts is a configuration error.
    pub fn new(max_attempts: usize) -> Result<Self> {
        if max_attempts == 0 {
            return Err(NewsflowError::Config(
                "retry policy requires at least one attempt".to_string(),
            ));
        }
        Ok(Self {
            max_attempts,
            base_delay: Self::DEFAULT_BASE_DELAY,
            max_delay: Duration::from_secs(30),
            backoff: BackoffStrategy::default(),
            jitter: Jitter::default(),
            attempt_timeout: None,
        })
    }

    /// A policy that runs the operation exactly once.
    #[must_use]
    pub fn single() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff: BackoffStrategy::Constant,
            jitter: Jitter::None,
            attempt_timeout: None,
        }
    }

    /// Returns a copy with a different attempt limit.
    pub fn with_max_attempts(&self, max_attempts: usize) -> Result<Self> {
        let mut next = Self::new(max_attempts)?;
        next.base_delay = self.base_delay;
        next.max_delay = self.max_delay;
        next.backoff = self.backoff;
        next.jitter = self.jitter;
        next.attempt_timeout = self.attempt_timeout;
        Ok(next)
    }

    /// Sets the base delay.
    #[must_use]
    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    /// Sets the delay cap.
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Sets the backoff strategy.
    #[must_use]
    pub fn with_backoff(mut self, backoff: BackoffStrategy) -> Self {
        self.backoff = backoff;
        self
    }

    /// Sets the jitter strategy.
    #[must_use]
    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Bounds each individual attempt.
    #[must_use]
    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Maximum number of attempts.
    #[must_use]
    pub fn max_attempts(&self) -> usize {
        self.max_attempts
    }

    /// Backoff strategy.
    #[must_use]
    pub fn backoff(&self) -> BackoffStrategy {
        self.backoff
    }

    /// Delay to wait after the given (1-based) failed attempt, before jitter.
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let attempt = u32::try_from(attempt.max(1)).unwrap_or(u32::MAX);
        let delay = match self.backoff {
            BackoffStrategy::Linear => self.base_delay.saturating_mul(attempt),
            BackoffStrategy::Exponential => {
                let factor = 2u32.saturating_pow(attempt - 1);
                self.base_delay.saturating_mul(factor)
            }
            BackoffStrategy::Constant => self.base_delay,
        };
        delay.min(self.max_delay)
    }

    fn jittered(&self, delay: Duration) -> Duration {
        match self.jitter {
            Jitter::None => delay,
            Jitter::Full => {
                let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
                if millis == 0 {
                    delay
                } else {
                    Duration::from_millis(rand::thread_rng().gen_range(0..=millis))
                }
            }
        }
    }

    /// Runs `operation`, retrying every error.
    pub async fn run<T, F, Fut>(&self, label: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        self.run_if(label, operation, |_| true).await
    }

    /// Runs `operation`, retrying only errors for which `should_retry`
    /// returns true. Other errors are returned immediately.
    pub async fn run_if<T, F, Fut, P>(
        &self,
        label: &str,
        mut operation: F,
        should_retry: P,
    ) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
        P: Fn(&NewsflowError) -> bool,
    {
        let mut attempt = 1;
        loop {
            let outcome = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, operation()).await {
                    Ok(result) => result,
                    Err(_) => Err(NewsflowError::Timeout(
                        u64::try_from(limit.as_millis()).unwrap_or(u64::MAX),
                    )),
                },
                None => operation().await,
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!(operation = label, attempt, "Succeeded after retry");
                    }
                    return Ok(value);
                }
                Err(e) if attempt >= self.max_attempts || !should_retry(&e) => {
                    return Err(e);
                }
                Err(e) => {
                    let delay = self.jittered(self.delay_for(attempt));
                    warn!(
                        operation = label,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                        error = %e,
                        "Attempt failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Self::DEFAULT_BASE_DELAY,
            max_delay: Duration::from_secs(30),
            backoff: BackoffStrategy::default(),
            jitter: Jitter::default(),
            attempt_timeout: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn fast(max_attempts: usize) -> RetryPolicy {
        RetryPolicy::new(max_attempts)
            .unwrap()
            .with_base_delay(Duration::from_millis(1))
    }

    #[test]
    fn test_zero_attempts_is_config_error() {
        let err = RetryPolicy::new(0).unwrap_err();
        assert!(matches!(err, NewsflowError::Config(_)));
        assert!(RetryPolicy::default().with_max_attempts(0).is_err());
    }

    #[test]
    fn test_linear_delay_is_default() {
        let policy = RetryPolicy::new(5)
            .unwrap()
            .with_base_delay(Duration::from_millis(100));

        assert_eq!(policy.backoff(), BackoffStrategy::Linear);
        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(300));
    }

    #[test]
    fn test_exponential_delay() {
        let policy = RetryPolicy::new(5)
            .unwrap()
            .with_base_delay(Duration::from_millis(100))
            .with_backoff(BackoffStrategy::Exponential);

        assert_eq!(policy.delay_for(1), Duration::from_millis(100));
        assert_eq!(policy.delay_for(2), Duration::from_millis(200));
        assert_eq!(policy.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let policy = RetryPolicy::new(20)
            .unwrap()
            .with_base_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff(BackoffStrategy::Exponential);

        assert_eq!(policy.delay_for(10), Duration::from_secs(5));
    }

    #[test]
    fn test_constant_delay_and_full_jitter_bounds() {
        let policy = RetryPolicy::new(3)
            .unwrap()
            .with_base_delay(Duration::from_millis(50))
            .with_backoff(BackoffStrategy::Constant)
            .with_jitter(Jitter::Full);

        assert_eq!(policy.delay_for(7), Duration::from_millis(50));
        for _ in 0..10 {
            assert!(policy.jittered(policy.delay_for(1)) <= Duration::from_millis(50));
        }
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let calls = AtomicUsize::new(0);
        let result = fast(3)
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(42) }
            })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_success_after_failures() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result = fast(5)
            .run("op", move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Err(NewsflowError::Internal(format!("attempt {n}")))
                    } else {
                        Ok(n)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_always_failing_runs_exactly_max_attempts() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let result: Result<()> = fast(4)
            .run("op", move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err(NewsflowError::Internal("always fails".into())) }
            })
            .await;

        assert!(matches!(result, Err(NewsflowError::Internal(ref m)) if m == "always fails"));
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_single_attempt_does_not_wait() {
        let started = std::time::Instant::now();
        let calls = AtomicUsize::new(0);
        let result: Result<()> = RetryPolicy::single()
            .run("op", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(NewsflowError::Internal("nope".into())) }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(started.elapsed() < Duration::from_millis(500));
    }

    #[tokio::test]
    async fn test_run_if_skips_non_transient_errors() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = fast(5)
            .run_if(
                "op",
                || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    async { Err(NewsflowError::from(ServiceError::InvalidResponse("bad".into()))) }
                },
                NewsflowError::is_transient,
            )
            .await;

        assert!(result.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_attempt_timeout_counts_as_failure() {
        let calls = AtomicUsize::new(0);
        let result: Result<()> = fast(2)
            .with_attempt_timeout(Duration::from_millis(10))
            .run("slow", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    Ok(())
                }
            })
            .await;

        assert!(matches!(result, Err(NewsflowError::Timeout(10))));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
