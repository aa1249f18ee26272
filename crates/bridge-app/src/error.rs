//! Application error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid retry policy: {0}")]
    Policy(#[from] bridge_resilience::PolicyError),

    #[error("Core error: {0}")]
    Core(#[from] bridge_core::CoreError),

    #[error("Risk error: {0}")]
    Risk(#[from] bridge_risk::RiskError),

    #[error("Gateway error: {0}")]
    Gateway(#[from] bridge_gateway::GatewayError),

    #[error("Telemetry error: {0}")]
    Telemetry(#[from] bridge_telemetry::TelemetryError),

    #[error("Preflight error: {0}")]
    Preflight(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Shutdown requested")]
    Shutdown,
}

pub type AppResult<T> = Result<T, AppError>;
