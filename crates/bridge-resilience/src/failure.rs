//! Classified failures and per-attempt records.

use crate::redact::redact;
use std::fmt;
use std::time::Duration;
use tracing::{debug, warn};

/// Failure class reported by a wrapped operation.
///
/// The operation classifies its own error at call time; the invoker only
/// retries `Retryable`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure<E> {
    /// Transient and safe to repeat (refused, DNS, I/O, idempotent timeout).
    Retryable(E),
    /// Cancellation or shutdown; stop immediately.
    Terminal(E),
    /// Malformed input, protocol or programming error.
    Fatal(E),
    /// The call may have taken effect; repeating it is unsafe.
    Unknown(E),
}

impl<E> Failure<E> {
    pub fn into_inner(self) -> E {
        match self {
            Self::Retryable(e) | Self::Terminal(e) | Self::Fatal(e) | Self::Unknown(e) => e,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    pub fn outcome(&self) -> AttemptOutcome {
        match self {
            Self::Retryable(_) => AttemptOutcome::RetryableFailure,
            Self::Terminal(_) => AttemptOutcome::Terminal,
            Self::Fatal(_) => AttemptOutcome::FatalFailure,
            Self::Unknown(_) => AttemptOutcome::Unknown,
        }
    }
}

/// Classified result of a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    Success,
    RetryableFailure,
    FatalFailure,
    Terminal,
    Unknown,
}

impl AttemptOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::RetryableFailure => "retryable_failure",
            Self::FatalFailure => "fatal_failure",
            Self::Terminal => "terminal",
            Self::Unknown => "unknown",
        }
    }
}

impl fmt::Display for AttemptOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Transient record of one try. Logged, then dropped.
#[derive(Debug, Clone)]
pub struct InvocationAttempt {
    /// 1-based attempt index.
    pub attempt: u32,
    /// Time since the invocation started.
    pub elapsed: Duration,
    pub outcome: AttemptOutcome,
    /// Redacted error text; `None` on success.
    pub error: Option<String>,
}

impl InvocationAttempt {
    pub fn success(attempt: u32, elapsed: Duration) -> Self {
        Self {
            attempt,
            elapsed,
            outcome: AttemptOutcome::Success,
            error: None,
        }
    }

    pub fn failure<E: fmt::Display>(attempt: u32, elapsed: Duration, failure: &Failure<E>) -> Self {
        let text = match failure {
            Failure::Retryable(e) | Failure::Terminal(e) | Failure::Fatal(e) | Failure::Unknown(e) => {
                redact(&e.to_string())
            }
        };
        Self {
            attempt,
            elapsed,
            outcome: failure.outcome(),
            error: Some(text),
        }
    }

    /// Emit the attempt as a structured log line.
    pub fn log(&self, correlation_id: &str, operation: &str) {
        let elapsed_ms = self.elapsed.as_millis() as u64;
        match &self.error {
            None => debug!(
                correlation_id,
                operation,
                attempt = self.attempt,
                elapsed_ms,
                outcome = %self.outcome,
                "Attempt succeeded"
            ),
            Some(error) => warn!(
                correlation_id,
                operation,
                attempt = self.attempt,
                elapsed_ms,
                outcome = %self.outcome,
                error = %error,
                "Attempt failed"
            ),
        }
    }
}
