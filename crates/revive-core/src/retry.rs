//! Fixed-delay retry budgets.
//!
//! Every wait in the restart engine is a bounded poll: try, sleep a fixed
//! delay, try again, give up after `max_attempts`. Sleeping goes through
//! [`PhysicalTimeEffects`] so tests drive the clock instead of waiting.

use crate::effects::PhysicalTimeEffects;
use crate::errors::{ReviveError, ReviveResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Bounded retry with a fixed delay between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Pause between two attempts
    pub delay_ms: u64,
}

impl RetryPolicy {
    /// Create a fixed-delay policy.
    pub fn fixed(max_attempts: u32, delay_ms: u64) -> Self {
        Self {
            max_attempts,
            delay_ms,
        }
    }

    /// A policy that tries exactly once.
    pub fn once() -> Self {
        Self::fixed(1, 0)
    }

    /// Delay between attempts.
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// Upper bound of the time spent sleeping when every attempt fails.
    pub fn worst_case_wait(&self) -> Duration {
        self.delay() * self.max_attempts.saturating_sub(1)
    }

    /// Run `operation` until it succeeds or the budget is spent.
    ///
    /// The operation receives the 1-based attempt number. The error of the
    /// last attempt is returned on exhaustion. A budget of zero attempts is
    /// treated as one.
    pub async fn run<T, F, Fut, E>(&self, time: &E, label: &str, mut operation: F) -> ReviveResult<T>
    where
        F: FnMut(u32) -> Fut + Send,
        Fut: Future<Output = ReviveResult<T>> + Send,
        E: PhysicalTimeEffects + ?Sized,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_error = ReviveError::internal(format!("{label}: no attempt made"));

        for attempt in 1..=attempts {
            match operation(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => {
                    tracing::debug!(
                        label,
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "attempt failed"
                    );
                    last_error = err;
                }
            }
            if attempt < attempts {
                time.sleep_ms(self.delay_ms).await;
            }
        }

        Err(last_error)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(10, 1_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicU64, Ordering};

    #[derive(Default)]
    struct CountingClock {
        slept_ms: AtomicU64,
    }

    #[async_trait]
    impl PhysicalTimeEffects for CountingClock {
        async fn now(&self) -> DateTime<Utc> {
            DateTime::<Utc>::UNIX_EPOCH
        }

        async fn sleep_ms(&self, ms: u64) {
            self.slept_ms.fetch_add(ms, Ordering::SeqCst);
        }
    }

    #[test]
    fn worst_case_wait_excludes_last_attempt() {
        assert_eq!(
            RetryPolicy::fixed(5, 1_000).worst_case_wait(),
            Duration::from_secs(4)
        );
        assert_eq!(RetryPolicy::fixed(0, 1_000).worst_case_wait(), Duration::ZERO);
    }

    #[tokio::test]
    async fn succeeds_on_later_attempt() {
        let clock = CountingClock::default();
        let result = RetryPolicy::fixed(5, 100)
            .run(&clock, "test", |attempt| async move {
                if attempt < 3 {
                    Err(ReviveError::network("not yet"))
                } else {
                    Ok(attempt)
                }
            })
            .await;

        assert_eq!(result, Ok(3));
        assert_eq!(clock.slept_ms.load(Ordering::SeqCst), 200);
    }

    #[tokio::test]
    async fn returns_last_error_on_exhaustion() {
        let clock = CountingClock::default();
        let result: ReviveResult<()> = RetryPolicy::fixed(3, 50)
            .run(&clock, "test", |attempt| async move {
                Err(ReviveError::network(format!("attempt {attempt}")))
            })
            .await;

        assert_eq!(result, Err(ReviveError::network("attempt 3")));
        assert_eq!(clock.slept_ms.load(Ordering::SeqCst), 100);
    }
}
