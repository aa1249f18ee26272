//! Prometheus metrics and structured logging for the venue bridge.
//!
//! - Prometheus metrics for invocations, gateway outcomes and risk halts
//! - Structured JSON logging with tracing

pub mod error;
pub mod logging;
pub mod metrics;

pub use error::{TelemetryError, TelemetryResult};
pub use logging::init_logging;
pub use metrics::Metrics;
