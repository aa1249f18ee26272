//! Gateway error types.
//!
//! Ordinary venue outcomes (executed, venue rejected, outcome unknown,
//! risk rejected) are `GatewayResponse` values. These errors are what the
//! caller must handle itself.

use crate::transport::TransportError;
use bridge_core::Action;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GatewayError {
    /// Retries on pre-execution failures ran out. Safe to resubmit with
    /// the same request id.
    #[error("Connection failed for {action} after {attempts} attempts: {source}")]
    ConnectionFailed {
        action: Action,
        attempts: u32,
        source: TransportError,
    },

    /// No reachability probe endpoint answered.
    #[error("Network unavailable during {action} after {attempts} attempts: {source}")]
    NetworkUnavailable {
        action: Action,
        attempts: u32,
        source: TransportError,
    },

    #[error("Shutdown requested during {action}")]
    Shutdown { action: Action },

    /// Non-retryable transport failure. For write actions the venue state
    /// must be reconciled before resubmitting.
    #[error("Fatal transport error during {action}: {source}")]
    Fatal {
        action: Action,
        source: TransportError,
    },

    /// The venue reply broke the wire contract.
    #[error("Protocol violation during {action}: {detail}")]
    ProtocolViolation { action: Action, detail: String },

    /// A query the router issued for itself was refused by the venue.
    #[error("Venue rejected {action}: retcode={retcode} {message}")]
    VenueRejected {
        action: Action,
        retcode: i32,
        message: String,
    },

    #[error("Invalid account data: {0}")]
    InvalidAccountData(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] bridge_core::CoreError),

    #[error("Client setup failed: {0}")]
    ClientSetup(String),
}

pub type GatewayResult<T> = Result<T, GatewayError>;
