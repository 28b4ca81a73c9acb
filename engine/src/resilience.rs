//! Resilience: bounded timeout and retry around a single provider call.
//!
//! Every provider adapter funnels its network attempts through
//! [`call_with_resilience`], so timeout, retry and backoff behave the same
//! regardless of which provider is on the other end.
//!
//! # Attempt handling
//!
//! ```text
//! attempt n
//!   ├─ non-empty reply          → Success(text)
//!   ├─ per-attempt timeout      → last? Timeout      : wait base_delay, retry
//!   ├─ 429 / 5xx / transport    → last? Failure      : wait max(base, hint) ≤ cap, retry
//!   └─ other status / empty     → retry once (base_delay), then Failure
//! ```

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

/// Uniform retry policy applied to every provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per call, including the first (values below 1 act as 1).
    pub max_attempts: u32,
    /// Delay between attempts when the server gives no hint.
    pub base_delay_ms: u64,
    /// Upper bound on a single network attempt.
    pub per_attempt_timeout_ms: u64,
    /// Ceiling applied to server-suggested delays (`None` = uncapped).
    pub max_suggested_delay_ms: Option<u64>,
}

impl RetryPolicy {
    /// A policy that makes exactly one attempt.
    pub fn single_attempt(timeout: Duration) -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            per_attempt_timeout_ms: timeout.as_millis() as u64,
            max_suggested_delay_ms: None,
        }
    }

    /// Effective attempt budget (never zero).
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }

    pub fn base_delay(&self) -> Duration {
        Duration::from_millis(self.base_delay_ms)
    }

    pub fn per_attempt_timeout(&self) -> Duration {
        Duration::from_millis(self.per_attempt_timeout_ms)
    }

    /// Wait before the next attempt after a retryable failure.
    ///
    /// A server hint raises the wait to `max(base, hint)`, bounded by the
    /// cap. The cap never pushes the wait below `base_delay`.
    pub fn delay_for(&self, suggested: Option<Duration>) -> Duration {
        let base = self.base_delay();
        let Some(hint) = suggested else {
            return base;
        };
        let wanted = base.max(hint);
        match self.max_suggested_delay_ms {
            Some(cap_ms) => wanted.min(Duration::from_millis(cap_ms).max(base)),
            None => wanted,
        }
    }
}

impl Default for RetryPolicy {
    /// Default: 3 attempts, 2s base delay, 60s per attempt, hints capped at 60s.
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 2_000,
            per_attempt_timeout_ms: 60_000,
            max_suggested_delay_ms: Some(60_000),
        }
    }
}

/// Why a provider call produced no usable reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureReason {
    /// No credential configured; no request was sent.
    #[error("credential not configured")]
    MissingCredential,

    /// No adapter is registered for the requested agent.
    #[error("no adapter registered")]
    NoAdapter,

    /// Attempts ran out without a usable reply.
    #[error("gave up after {attempts} attempt(s): {last_error}")]
    Exhausted { attempts: u32, last_error: String },
}

/// Result of one resilience-wrapped provider call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderCallOutcome {
    Success(String),
    Timeout,
    Failure(FailureReason),
}

impl ProviderCallOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Success(_) => "success",
            Self::Timeout => "timeout",
            Self::Failure(_) => "failure",
        }
    }
}

/// Failure of a single network attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// Provider answered with a non-success HTTP status.
    #[error("HTTP {status}: {body}")]
    Http {
        status: u16,
        /// Server-suggested wait before retrying, if the reply carried one.
        retry_after: Option<Duration>,
        body: String,
    },

    /// Connection, TLS or body-read failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Reply body was not the JSON we expected.
    #[error("unparseable reply: {0}")]
    Parse(String),
}

impl AttemptError {
    /// Rate limits, server errors and transport failures are retried with backoff.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http { status, .. } => *status == 429 || (500..600).contains(status),
            Self::Transport(_) => true,
            Self::Parse(_) => false,
        }
    }

    pub fn suggested_delay(&self) -> Option<Duration> {
        match self {
            Self::Http { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Run `attempt_fn` under `policy`.
///
/// `attempt_fn` receives the 1-based attempt number and performs exactly one
/// network attempt, yielding the normalized reply text (`None` when the reply
/// carried no text). `label` identifies the caller in logs.
pub async fn call_with_resilience<F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    mut attempt_fn: F,
) -> ProviderCallOutcome
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<Option<String>, AttemptError>>,
{
    let max_attempts = policy.max_attempts();
    let mut defensive_retry_used = false;
    let mut last_error = String::new();

    for attempt in 1..=max_attempts {
        let is_last = attempt == max_attempts;
        debug!(provider = label, attempt, max_attempts, "provider attempt");

        let result = tokio::time::timeout(policy.per_attempt_timeout(), attempt_fn(attempt)).await;

        let delay = match result {
            Ok(Ok(Some(text))) if !text.trim().is_empty() => {
                return ProviderCallOutcome::Success(text);
            }
            Err(_elapsed) => {
                if is_last {
                    warn!(provider = label, attempts = attempt, "provider timed out");
                    return ProviderCallOutcome::Timeout;
                }
                last_error = format!(
                    "timed out after {}ms",
                    policy.per_attempt_timeout().as_millis()
                );
                policy.base_delay()
            }
            Ok(Err(err)) if err.is_retryable() => {
                last_error = err.to_string();
                if is_last {
                    break;
                }
                policy.delay_for(err.suggested_delay())
            }
            Ok(other) => {
                // Non-retryable status or empty reply: one extra attempt at most.
                last_error = match other {
                    Err(err) => err.to_string(),
                    Ok(_) => "empty reply".to_string(),
                };
                if is_last || defensive_retry_used {
                    return exhausted(label, attempt, last_error);
                }
                defensive_retry_used = true;
                policy.base_delay()
            }
        };

        warn!(
            provider = label,
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = %last_error,
            "provider attempt failed, retrying"
        );
        tokio::time::sleep(delay).await;
    }

    exhausted(label, max_attempts, last_error)
}

fn exhausted(label: &str, attempts: u32, last_error: String) -> ProviderCallOutcome {
    warn!(provider = label, attempts, error = %last_error, "provider call failed");
    ProviderCallOutcome::Failure(FailureReason::Exhausted {
        attempts,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay_ms: 1_000,
            per_attempt_timeout_ms: 5_000,
            max_suggested_delay_ms: Some(30_000),
        }
    }

    fn http(status: u16, retry_after: Option<Duration>) -> AttemptError {
        AttemptError::Http {
            status,
            retry_after,
            body: String::new(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_after_server_errors() {
        let calls = AtomicU32::new(0);
        let outcome = call_with_resilience("test", &policy(3), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(http(503, None))
                } else {
                    Ok(Some("fine".to_string()))
                }
            }
        })
        .await;

        assert_eq!(outcome, ProviderCallOutcome::Success("fine".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_only_after_all_attempts() {
        let calls = AtomicU32::new(0);
        let outcome = call_with_resilience("test", &policy(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            std::future::pending::<Result<Option<String>, AttemptError>>()
        })
        .await;

        assert_eq!(outcome, ProviderCallOutcome::Timeout);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_success_stops_retrying() {
        let calls = AtomicU32::new(0);
        let outcome = call_with_resilience("test", &policy(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok(Some("  hi  ".to_string())) }
        })
        .await;

        assert!(outcome.is_success());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retryable_failure_exhausts_attempts() {
        let calls = AtomicU32::new(0);
        let outcome = call_with_resilience("test", &policy(3), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(http(429, None)) }
        })
        .await;

        assert!(matches!(
            outcome,
            ProviderCallOutcome::Failure(FailureReason::Exhausted { attempts: 3, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_non_retryable_gets_one_extra_attempt() {
        let calls = AtomicU32::new(0);
        let outcome = call_with_resilience("test", &policy(5), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(http(401, None)) }
        })
        .await;

        assert!(matches!(outcome, ProviderCallOutcome::Failure(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_reply_retried_once() {
        let calls = AtomicU32::new(0);
        let outcome = call_with_resilience("test", &policy(3), |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt == 1 {
                    Ok(Some("   ".to_string()))
                } else {
                    Ok(Some("second time".to_string()))
                }
            }
        })
        .await;

        assert_eq!(
            outcome,
            ProviderCallOutcome::Success("second time".to_string())
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_single_attempt_policy() {
        let calls = AtomicU32::new(0);
        let outcome = call_with_resilience(
            "test",
            &RetryPolicy::single_attempt(Duration::from_secs(1)),
            |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(http(500, None)) }
            },
        )
        .await;

        assert!(matches!(
            outcome,
            ProviderCallOutcome::Failure(FailureReason::Exhausted { attempts: 1, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_hint_extends_wait() {
        let start = Instant::now();
        let outcome = call_with_resilience("test", &policy(2), |attempt| async move {
            if attempt == 1 {
                Err(http(429, Some(Duration::from_secs(10))))
            } else {
                Ok(Some("ok".to_string()))
            }
        })
        .await;

        assert!(outcome.is_success());
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(10));
        assert!(waited < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_hint_is_capped() {
        let start = Instant::now();
        let outcome = call_with_resilience("test", &policy(2), |attempt| async move {
            if attempt == 1 {
                Err(http(503, Some(Duration::from_secs(600))))
            } else {
                Ok(Some("ok".to_string()))
            }
        })
        .await;

        assert!(outcome.is_success());
        let waited = start.elapsed();
        assert!(waited >= Duration::from_secs(30));
        assert!(waited < Duration::from_secs(31));
    }

    #[test]
    fn test_delay_for() {
        let p = policy(3);
        assert_eq!(p.delay_for(None), Duration::from_secs(1));
        // Hints shorter than base never shorten the wait.
        assert_eq!(
            p.delay_for(Some(Duration::from_millis(200))),
            Duration::from_secs(1)
        );
        assert_eq!(
            p.delay_for(Some(Duration::from_secs(12))),
            Duration::from_secs(12)
        );
        assert_eq!(
            p.delay_for(Some(Duration::from_secs(120))),
            Duration::from_secs(30)
        );

        let uncapped = RetryPolicy {
            max_suggested_delay_ms: None,
            ..p
        };
        assert_eq!(
            uncapped.delay_for(Some(Duration::from_secs(120))),
            Duration::from_secs(120)
        );
    }

    #[test]
    fn test_retryable_classification() {
        assert!(http(429, None).is_retryable());
        assert!(http(500, None).is_retryable());
        assert!(http(503, None).is_retryable());
        assert!(!http(400, None).is_retryable());
        assert!(!http(401, None).is_retryable());
        assert!(AttemptError::Transport("reset by peer".into()).is_retryable());
        assert!(!AttemptError::Parse("bad json".into()).is_retryable());
    }

    #[test]
    fn test_zero_attempts_acts_as_one() {
        let p = RetryPolicy {
            max_attempts: 0,
            ..RetryPolicy::default()
        };
        assert_eq!(p.max_attempts(), 1);
    }

    #[test]
    fn test_policy_default_and_toml() {
        let p = RetryPolicy::default();
        assert_eq!(p.max_attempts, 3);
        assert_eq!(p.base_delay(), Duration::from_secs(2));
        assert_eq!(p.per_attempt_timeout(), Duration::from_secs(60));

        let parsed: RetryPolicy = toml::from_str("max_attempts = 5").unwrap();
        assert_eq!(parsed.max_attempts, 5);
        assert_eq!(parsed.base_delay_ms, 2_000);
    }
}
