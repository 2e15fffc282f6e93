//! Bounded retry with exponential backoff for the login request.
//!
//! INLabs is known to drop connections under load, so a failed login is
//! retried while the failure looks transient. Unlike a plain "retry until it
//! works" loop the policy has an attempt cap and grows the delay between
//! attempts.
//!
//! # Example
//!
//! ```
//! use dou_extractor::session::{FailureType, RetryDecision, RetryPolicy};
//!
//! let policy = RetryPolicy::with_max_attempts(3);
//! match policy.should_retry(FailureType::Transient, 1) {
//!     RetryDecision::Retry { attempt, .. } => assert_eq!(attempt, 2),
//!     RetryDecision::DoNotRetry { reason } => panic!("{reason}"),
//! }
//! ```

use std::time::Duration;

use rand::Rng;
use tracing::{debug, instrument};

use super::SessionError;
use crate::config::DEFAULT_LOGIN_MAX_ATTEMPTS;

/// Default base delay for exponential backoff (1 second).
const DEFAULT_BASE_DELAY: Duration = Duration::from_secs(1);

/// Default maximum delay cap (32 seconds).
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(32);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Default maximum jitter added to delays (500ms).
const DEFAULT_MAX_JITTER: Duration = Duration::from_millis(500);

/// Classification of a request failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureType {
    /// Connection refused/reset, DNS hiccup, timeout.
    Transient,
    /// Anything a second attempt will not fix (bad URL, TLS, local IO).
    Permanent,
}

/// Decision on whether to retry a failed request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the delay.
    Retry {
        /// How long to wait before retrying.
        delay: Duration,
        /// Attempt number of the retry (1-indexed, so the first retry is 2).
        attempt: u32,
    },

    /// Give up.
    DoNotRetry {
        /// Human-readable reason.
        reason: String,
    },
}

/// Retry settings.
///
/// ```text
/// delay = min(base_delay * multiplier^(attempt-1), max_delay) + jitter
/// ```
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
    max_jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_LOGIN_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings and default jitter.
    ///
    /// `max_attempts` counts the initial attempt and is clamped to at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
            max_jitter: DEFAULT_MAX_JITTER,
        }
    }

    /// Default delays with a custom attempt cap.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Retries immediately, without backoff or jitter.
    #[must_use]
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            max_jitter: Duration::ZERO,
        }
    }

    /// Maximum number of attempts, including the first.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides what to do after `attempt` (1-indexed) failed.
    #[instrument(skip(self), fields(max_attempts = self.max_attempts))]
    pub fn should_retry(&self, failure_type: FailureType, attempt: u32) -> RetryDecision {
        if failure_type == FailureType::Permanent {
            return RetryDecision::DoNotRetry {
                reason: "permanent failure - retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "max attempts reached");
            return RetryDecision::DoNotRetry {
                reason: format!("max attempts ({}) exhausted", self.max_attempts),
            };
        }

        let delay = self.calculate_delay(attempt);
        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let base_ms = self.base_delay.as_millis() as f64;
        let exponent = f64::from(attempt.saturating_sub(1));
        let delay_ms = base_ms * f64::from(self.backoff_multiplier).powf(exponent);
        let capped_ms = delay_ms.min(self.max_delay.as_millis() as f64);

        Duration::from_millis(capped_ms as u64) + self.calculate_jitter()
    }

    fn calculate_jitter(&self) -> Duration {
        let max_ms = self.max_jitter.as_millis() as u64;
        if max_ms == 0 {
            return Duration::ZERO;
        }
        let jitter_ms = rand::thread_rng().gen_range(0..=max_ms);
        Duration::from_millis(jitter_ms)
    }
}

/// Classifies a session error for retry decisions.
///
/// | Error | Type |
/// |-------|------|
/// | Timeout | Transient |
/// | Network (connect/request) | Transient |
/// | Network (TLS) | Permanent |
/// | everything else | Permanent |
#[must_use]
pub fn classify_error(error: &SessionError) -> FailureType {
    match error {
        SessionError::Timeout { .. } => FailureType::Transient,
        SessionError::Network { source, .. } => {
            if is_tls_error(source) {
                FailureType::Permanent
            } else {
                FailureType::Transient
            }
        }
        _ => FailureType::Permanent,
    }
}

fn is_tls_error(error: &reqwest::Error) -> bool {
    let message = error.to_string().to_lowercase();
    message.contains("certificate")
        || message.contains("tls")
        || message.contains("ssl")
        || message.contains("handshake")
}
