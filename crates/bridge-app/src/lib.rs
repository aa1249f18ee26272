//! Venue bridge application.
//!
//! Wires the strategy-facing command intake to the venue:
//! - TOML configuration and validation
//! - Gateway router with risk gating
//! - Heartbeat, equity poll, spec refresh and session rollover tasks

pub mod app;
pub mod config;
pub mod error;

pub use app::{refresh_specs, Application, BridgeEvent, BridgeHandle};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
