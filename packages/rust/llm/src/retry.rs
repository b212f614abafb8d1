//! Randomized exponential backoff around a fallible async operation.

use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{error, info};

use seoscribe_shared::{Result, RetryConfig};

/// How often and how patiently a failed request is resubmitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Always at least one.
    pub max_attempts: u32,
    pub min_wait: Duration,
    pub max_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(10, Duration::from_secs(1), Duration::from_secs(60))
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self::new(
            config.max_attempts,
            Duration::from_secs(config.min_wait_secs),
            Duration::from_secs(config.max_wait_secs),
        )
    }
}

impl RetryPolicy {
    /// Build a policy. `max_attempts` is raised to 1 and `max_wait` to `min_wait` when smaller.
    pub fn new(max_attempts: u32, min_wait: Duration, max_wait: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            min_wait,
            max_wait: max_wait.max(min_wait),
        }
    }

    /// A policy that never resubmits.
    pub fn no_retry() -> Self {
        Self::new(1, Duration::ZERO, Duration::ZERO)
    }

    /// Upper bound of the wait after failed attempt `attempt` (1-based):
    /// `min_wait * 2^(attempt-1)` clamped to `[min_wait, max_wait]`.
    pub fn ceiling_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.min_wait
            .saturating_mul(factor)
            .clamp(self.min_wait, self.max_wait)
    }

    /// Wait after failed attempt `attempt`, uniform in `[min_wait, ceiling_for(attempt)]`.
    pub fn wait_for(&self, attempt: u32) -> Duration {
        let low = self.min_wait.as_millis() as u64;
        let high = self.ceiling_for(attempt).as_millis() as u64;
        if high <= low {
            return self.min_wait;
        }
        Duration::from_millis(rand::rng().random_range(low..=high))
    }
}

/// Run `operation` until it succeeds, fails permanently or runs out of attempts.
///
/// Every failed attempt is logged at error level. Errors that are not
/// [transient](seoscribe_shared::SeoScribeError::is_transient) are returned
/// immediately. After the last attempt the last error is returned.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, context: &str, mut operation: F) -> Result<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                error!(
                    context,
                    attempt,
                    max_attempts = policy.max_attempts,
                    error = %err,
                    "attempt failed"
                );

                if !err.is_transient() || attempt >= policy.max_attempts {
                    return Err(err);
                }

                let wait = policy.wait_for(attempt);
                info!(context, attempt, wait_ms = wait.as_millis() as u64, "retrying");
                tokio::time::sleep(wait).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use seoscribe_shared::SeoScribeError;

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy::new(max_attempts, Duration::from_millis(1), Duration::from_millis(4))
    }

    #[test]
    fn ceiling_grows_then_clamps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.ceiling_for(1), Duration::from_secs(1));
        assert_eq!(policy.ceiling_for(2), Duration::from_secs(2));
        assert_eq!(policy.ceiling_for(4), Duration::from_secs(8));
        assert_eq!(policy.ceiling_for(7), Duration::from_secs(60));
        assert_eq!(policy.ceiling_for(40), Duration::from_secs(60));
    }

    #[test]
    fn wait_stays_within_bounds() {
        let policy = RetryPolicy::default();
        for attempt in 1..=10 {
            let wait = policy.wait_for(attempt);
            assert!(wait >= policy.min_wait, "attempt {attempt}: {wait:?}");
            assert!(wait <= policy.ceiling_for(attempt), "attempt {attempt}: {wait:?}");
        }
    }

    #[test]
    fn new_repairs_degenerate_bounds() {
        let policy = RetryPolicy::new(0, Duration::from_secs(5), Duration::from_secs(1));
        assert_eq!(policy.max_attempts, 1);
        assert_eq!(policy.max_wait, Duration::from_secs(5));
    }

    #[test]
    fn policy_from_config() {
        let policy = RetryPolicy::from(&RetryConfig::default());
        assert_eq!(policy, RetryPolicy::default());
    }

    #[tokio::test]
    async fn succeeds_after_transient_failures() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(5), "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(SeoScribeError::Network("connection reset".into()))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_error_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(5), "test", |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(SeoScribeError::Api {
                    status: 401,
                    message: "bad key".into(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(SeoScribeError::Api { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let calls = AtomicU32::new(0);
        let result: Result<()> = with_retry(&fast_policy(3), "test", |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(SeoScribeError::Generation(format!("empty reply {attempt}"))) }
        })
        .await;

        // The last error is the one returned
        assert_eq!(
            result.unwrap_err().to_string(),
            "generation error: empty reply 3"
        );
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }
}
