use std::future::Future;
use std::time::Duration;

use standard_error::StandardError;

use crate::conf::settings;
use crate::prelude::Result;

// max_retries counts retries after the first attempt, so the call runs at
// most max_retries + 1 times.
#[derive(Debug, Clone, Copy)]
pub struct Backoff {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Backoff {
    pub fn from_settings() -> Self {
        Backoff {
            max_retries: settings.ai_max_retries,
            base_delay: Duration::from_millis(settings.ai_retry_base_ms),
            max_delay: Duration::from_millis(settings.ai_retry_cap_ms),
        }
    }

    fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay
            .saturating_mul(1u32 << attempt.min(16))
            .min(self.max_delay)
    }
}

/// Runs `op`, retrying while `is_transient` accepts the error and the retry
/// budget lasts. Non-transient errors and exhaustion propagate the last error.
pub async fn with_retries<T, F, Fut, P>(policy: Backoff, is_transient: P, mut op: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&StandardError) -> bool,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < policy.max_retries && is_transient(&err) => {
                let delay = policy.delay_for(attempt);
                attempt += 1;
                tracing::warn!(
                    "transient failure on attempt {}: {}; retrying in {:?}",
                    attempt,
                    err.message,
                    delay
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pkg::internal::ai::generate;
    use standard_error::Interpolate;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn instant_policy(max_retries: u32) -> Backoff {
        Backoff {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    fn overloaded() -> StandardError {
        StandardError::new("ERR-AI-002").interpolate_err("503: the model is overloaded".into())
    }

    #[tokio::test]
    async fn three_transient_failures_then_success_takes_exactly_four_attempts() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result = with_retries(instant_policy(3), generate::is_transient, || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 3 {
                    Err(overloaded())
                } else {
                    Ok(42u32)
                }
            }
        })
        .await;
        assert_eq!(result.unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn persistent_overload_exhausts_the_budget_and_surfaces_the_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result: Result<u32> = with_retries(instant_policy(3), generate::is_transient, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(overloaded())
            }
        })
        .await;
        let err = result.unwrap_err();
        assert!(generate::is_transient(&err));
        assert_eq!(attempts.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn non_transient_errors_fail_on_the_first_attempt() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();
        let result: Result<u32> = with_retries(instant_policy(3), generate::is_transient, || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(StandardError::new("ERR-AI-002")
                    .interpolate_err("400: invalid request body".into()))
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn delays_double_and_cap() {
        let policy = Backoff {
            max_retries: 3,
            base_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(4000),
        };
        assert_eq!(policy.delay_for(0), Duration::from_millis(1000));
        assert_eq!(policy.delay_for(1), Duration::from_millis(2000));
        assert_eq!(policy.delay_for(2), Duration::from_millis(4000));
        assert_eq!(policy.delay_for(5), Duration::from_millis(4000));
    }
}
