use std::{future::Future, time::Duration};

use thiserror::Error;

use crate::models::ProblemBody;

/// Failure of a history fetch, classified for the retry loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// Network failure, throttling or a server-side error. Worth retrying.
    #[error("{0}")]
    Transient(String),
    /// Validation, not-found and other caller errors. Retrying will not help.
    #[error("{0}")]
    Permanent(String),
}

impl FetchError {
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

impl From<ProblemBody> for FetchError {
    fn from(problem: ProblemBody) -> Self {
        if problem.is_transient() {
            Self::Transient(problem.to_string())
        } else {
            Self::Permanent(problem.to_string())
        }
    }
}

/// Bounded exponential backoff for history fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub factor: u32,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(300),
            factor: 2,
            max_delay: Duration::from_secs(3),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the `attempt`-th failure (1-based).
    #[must_use]
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let multiplier = self.factor.saturating_pow(exponent);
        self.base_delay
            .checked_mul(multiplier)
            .map_or(self.max_delay, |delay| delay.min(self.max_delay))
    }
}

/// Runs `op` until it succeeds, fails permanently, or the policy runs out of attempts.
///
/// `sleep` is injected so the same loop runs on tokio and in the browser.
///
/// # Errors
/// Returns the last [`FetchError`] once retrying stops.
pub async fn with_retry<T, Op, Fut, Sleep, SleepFut>(
    policy: RetryPolicy,
    mut op: Op,
    mut sleep: Sleep,
) -> Result<T, FetchError>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
    Sleep: FnMut(Duration) -> SleepFut,
    SleepFut: Future<Output = ()>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt);
                tracing::debug!(attempt, ?delay, error = %err, "retrying history fetch");
                sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn delays_grow_and_cap() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_after(1), Duration::from_millis(300));
        assert_eq!(policy.delay_after(2), Duration::from_millis(600));
        assert_eq!(policy.delay_after(3), Duration::from_millis(1200));
        assert_eq!(policy.delay_after(10), Duration::from_secs(3));
    }

    #[tokio::test]
    async fn transient_failures_are_retried_until_success() {
        let delays = RefCell::new(Vec::new());
        let result = with_retry(
            RetryPolicy::default(),
            |attempt| async move {
                if attempt < 3 {
                    Err(FetchError::Transient("503".into()))
                } else {
                    Ok(attempt)
                }
            },
            |delay| {
                delays.borrow_mut().push(delay);
                std::future::ready(())
            },
        )
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(
            delays.into_inner(),
            vec![Duration::from_millis(300), Duration::from_millis(600)]
        );
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = RefCell::new(0);
        let result: Result<(), _> = with_retry(
            RetryPolicy::default(),
            |_| {
                *calls.borrow_mut() += 1;
                async { Err(FetchError::Transient("offline".into())) }
            },
            |_| std::future::ready(()),
        )
        .await;

        assert_eq!(result, Err(FetchError::Transient("offline".into())));
        assert_eq!(calls.into_inner(), 3);
    }

    #[tokio::test]
    async fn permanent_failures_stop_immediately() {
        let calls = RefCell::new(0);
        let result: Result<(), _> = with_retry(
            RetryPolicy::default(),
            |_| {
                *calls.borrow_mut() += 1;
                async { Err(FetchError::Permanent("not_found".into())) }
            },
            |_| std::future::ready(()),
        )
        .await;

        assert!(matches!(result, Err(FetchError::Permanent(_))));
        assert_eq!(calls.into_inner(), 1);
    }
}
