//! Invocation engine error types.

use std::time::Duration;
use thiserror::Error;

/// Invalid retry policy.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("{field} must be positive")]
    NonPositiveDuration { field: &'static str },

    #[error("max_wait ({max_ms}ms) is below initial_wait ({initial_ms}ms)")]
    MaxWaitBelowInitial { initial_ms: u128, max_ms: u128 },

    #[error("max_attempts must be at least 1")]
    ZeroAttempts,
}

pub type PolicyResult<T> = Result<T, PolicyError>;

/// Why an invocation gave up, carrying the wrapped operation's error.
#[derive(Debug, Error)]
pub enum InvokeError<E> {
    /// Attempt limit reached on retryable failures.
    #[error("retries exhausted after {attempts} attempts: {last}")]
    RetriesExhausted { attempts: u32, last: E },

    /// Next backoff would overrun the overall timeout.
    #[error("retry budget of {budget:?} exceeded after {attempts} attempts: {last}")]
    BudgetExceeded {
        attempts: u32,
        budget: Duration,
        last: E,
    },

    /// No reachability probe endpoint answered; the link is down.
    #[error("network unavailable after {attempts} attempts: {last}")]
    NetworkUnavailable { attempts: u32, last: E },

    /// Shutdown observed before an attempt or during backoff.
    #[error("shutdown requested after {attempts} attempts")]
    Shutdown { attempts: u32 },

    /// The operation reported a cancellation/shutdown signal.
    #[error("terminal signal on attempt {attempts}: {error}")]
    Terminal { attempts: u32, error: E },

    /// Non-retryable failure.
    #[error("fatal failure on attempt {attempts}: {error}")]
    Fatal { attempts: u32, error: E },

    /// The operation may or may not have taken effect.
    #[error("outcome unknown on attempt {attempts}: {error}")]
    OutcomeUnknown { attempts: u32, error: E },
}

impl<E> InvokeError<E> {
    /// Number of times the wrapped operation ran.
    pub fn attempts(&self) -> u32 {
        match self {
            Self::RetriesExhausted { attempts, .. }
            | Self::BudgetExceeded { attempts, .. }
            | Self::NetworkUnavailable { attempts, .. }
            | Self::Shutdown { attempts }
            | Self::Terminal { attempts, .. }
            | Self::Fatal { attempts, .. }
            | Self::OutcomeUnknown { attempts, .. } => *attempts,
        }
    }

    /// Label used for metrics and the final log line.
    pub fn outcome_label(&self) -> &'static str {
        match self {
            Self::RetriesExhausted { .. } => "exhausted",
            Self::BudgetExceeded { .. } => "budget_exceeded",
            Self::NetworkUnavailable { .. } => "network_unavailable",
            Self::Shutdown { .. } => "shutdown",
            Self::Terminal { .. } => "terminal",
            Self::Fatal { .. } => "fatal",
            Self::OutcomeUnknown { .. } => "unknown",
        }
    }

    /// The operation's last error, if one was observed.
    pub fn last_error(&self) -> Option<&E> {
        match self {
            Self::RetriesExhausted { last, .. }
            | Self::BudgetExceeded { last, .. }
            | Self::NetworkUnavailable { last, .. } => Some(last),
            Self::Terminal { error, .. }
            | Self::Fatal { error, .. }
            | Self::OutcomeUnknown { error, .. } => Some(error),
            Self::Shutdown { .. } => None,
        }
    }
}
