//! Risk error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum RiskError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid session: {0}")]
    InvalidSession(String),

    #[error("Venue spec changed for {symbol}: {detail}")]
    SpecChanged { symbol: String, detail: String },

    #[error("No venue spec for symbol {0}")]
    UnknownSymbol(String),
}

pub type RiskResult<T> = Result<T, RiskError>;
