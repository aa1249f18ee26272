//! Immutable retry policies.
//!
//! A policy is validated once, when it is built. The invoker never checks a
//! policy at call time.

use crate::error::{PolicyError, PolicyResult};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry budget and backoff shape for one class of remote call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    overall_timeout: Duration,
    max_attempts: Option<u32>,
    initial_wait: Duration,
    max_wait: Duration,
    use_exponential_backoff: bool,
}

impl RetryPolicy {
    /// Build a validated policy.
    ///
    /// `max_attempts = None` means unbounded attempts (the overall timeout
    /// still applies).
    pub fn new(
        overall_timeout: Duration,
        max_attempts: Option<u32>,
        initial_wait: Duration,
        max_wait: Duration,
        use_exponential_backoff: bool,
    ) -> PolicyResult<Self> {
        for (field, value) in [
            ("overall_timeout", overall_timeout),
            ("initial_wait", initial_wait),
            ("max_wait", max_wait),
        ] {
            if value.is_zero() {
                return Err(PolicyError::NonPositiveDuration { field });
            }
        }
        if max_wait < initial_wait {
            return Err(PolicyError::MaxWaitBelowInitial {
                initial_ms: initial_wait.as_millis(),
                max_ms: max_wait.as_millis(),
            });
        }
        if max_attempts == Some(0) {
            return Err(PolicyError::ZeroAttempts);
        }

        Ok(Self {
            overall_timeout,
            max_attempts,
            initial_wait,
            max_wait,
            use_exponential_backoff,
        })
    }

    /// Request/reply socket channel: 30s budget, up to 10 attempts, 0.5–5s backoff.
    pub const fn socket_channel() -> Self {
        Self {
            overall_timeout: Duration::from_secs(30),
            max_attempts: Some(10),
            initial_wait: Duration::from_millis(500),
            max_wait: Duration::from_secs(5),
            use_exponential_backoff: true,
        }
    }

    /// Order submission: 30s budget, at most 5 attempts, 1–10s backoff.
    ///
    /// Fewer attempts than the socket channel since every attempt can move money.
    pub const fn order_submission() -> Self {
        Self {
            overall_timeout: Duration::from_secs(30),
            max_attempts: Some(5),
            initial_wait: Duration::from_secs(1),
            max_wait: Duration::from_secs(10),
            use_exponential_backoff: true,
        }
    }

    pub fn overall_timeout(&self) -> Duration {
        self.overall_timeout
    }

    pub fn max_attempts(&self) -> Option<u32> {
        self.max_attempts
    }

    pub fn initial_wait(&self) -> Duration {
        self.initial_wait
    }

    pub fn max_wait(&self) -> Duration {
        self.max_wait
    }

    pub fn use_exponential_backoff(&self) -> bool {
        self.use_exponential_backoff
    }

    /// Wait before the retry that follows failed attempt number `attempt` (1-based).
    ///
    /// Exponential: `min(initial * 2^(attempt-1), max)`. Fixed: `initial`.
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        if !self.use_exponential_backoff {
            return self.initial_wait;
        }
        let factor = 2u32
            .checked_pow(attempt.saturating_sub(1))
            .unwrap_or(u32::MAX);
        self.initial_wait
            .checked_mul(factor)
            .unwrap_or(self.max_wait)
            .min(self.max_wait)
    }
}

/// Serde form of [`RetryPolicy`] for configuration files.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    pub overall_timeout_ms: u64,
    /// Omit for unbounded attempts.
    #[serde(default)]
    pub max_attempts: Option<u32>,
    pub initial_wait_ms: u64,
    pub max_wait_ms: u64,
    #[serde(default = "default_exponential_backoff")]
    pub exponential_backoff: bool,
}

fn default_exponential_backoff() -> bool {
    true
}

impl From<RetryPolicy> for RetryPolicyConfig {
    fn from(policy: RetryPolicy) -> Self {
        Self {
            overall_timeout_ms: policy.overall_timeout.as_millis() as u64,
            max_attempts: policy.max_attempts,
            initial_wait_ms: policy.initial_wait.as_millis() as u64,
            max_wait_ms: policy.max_wait.as_millis() as u64,
            exponential_backoff: policy.use_exponential_backoff,
        }
    }
}

impl TryFrom<RetryPolicyConfig> for RetryPolicy {
    type Error = PolicyError;

    fn try_from(cfg: RetryPolicyConfig) -> PolicyResult<Self> {
        Self::new(
            Duration::from_millis(cfg.overall_timeout_ms),
            cfg.max_attempts,
            Duration::from_millis(cfg.initial_wait_ms),
            Duration::from_millis(cfg.max_wait_ms),
            cfg.exponential_backoff,
        )
    }
}
