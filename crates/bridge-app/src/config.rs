//! Application configuration.

use crate::error::{AppError, AppResult};
use bridge_core::{Money, RawVenueSpec, VenueSpec};
use bridge_gateway::{DirectClientConfig, SocketChannelConfig};
use bridge_resilience::{RetryPolicy, RetryPolicyConfig};
use bridge_risk::RiskConfig;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Venue endpoints and per-attempt timeouts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VenueConfig {
    /// WebSocket endpoint for queries and heartbeats.
    #[serde(default = "default_socket_url")]
    pub socket_url: String,
    /// HTTP endpoint for orders and closes.
    #[serde(default = "default_direct_url")]
    pub direct_url: String,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Socket send deadline (ms).
    #[serde(default = "default_send_timeout_ms")]
    pub send_timeout_ms: u64,
    /// Socket reply deadline (ms).
    #[serde(default = "default_recv_timeout_ms")]
    pub recv_timeout_ms: u64,
    /// Whole-request deadline for the direct channel (ms).
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_socket_url() -> String {
    "ws://127.0.0.1:8765".to_string()
}

fn default_direct_url() -> String {
    "http://127.0.0.1:8766/gateway".to_string()
}

fn default_connect_timeout_ms() -> u64 {
    3_000
}

fn default_send_timeout_ms() -> u64 {
    5_000
}

fn default_recv_timeout_ms() -> u64 {
    10_000
}

fn default_request_timeout_ms() -> u64 {
    10_000
}

impl Default for VenueConfig {
    fn default() -> Self {
        Self {
            socket_url: default_socket_url(),
            direct_url: default_direct_url(),
            connect_timeout_ms: default_connect_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            recv_timeout_ms: default_recv_timeout_ms(),
            request_timeout_ms: default_request_timeout_ms(),
        }
    }
}

/// Retry policies per action kind.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    #[serde(default = "default_query_policy")]
    pub query: RetryPolicyConfig,
    #[serde(default = "default_write_policy")]
    pub write: RetryPolicyConfig,
}

fn default_query_policy() -> RetryPolicyConfig {
    RetryPolicy::socket_channel().into()
}

fn default_write_policy() -> RetryPolicyConfig {
    RetryPolicy::order_submission().into()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            query: default_query_policy(),
            write: default_write_policy(),
        }
    }
}

/// Network reachability probe used between retries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_enabled")]
    pub enabled: bool,
    /// `host:port` endpoints; reachable if any accepts a TCP connection.
    #[serde(default = "default_probe_endpoints")]
    pub endpoints: Vec<String>,
    #[serde(default = "default_probe_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_probe_enabled() -> bool {
    true
}

fn default_probe_endpoints() -> Vec<String> {
    bridge_resilience::probe::DEFAULT_PROBE_ENDPOINTS
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_probe_timeout_ms() -> u64 {
    2_000
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            enabled: default_probe_enabled(),
            endpoints: default_probe_endpoints(),
            timeout_ms: default_probe_timeout_ms(),
        }
    }
}

/// Background task intervals. Zero disables a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    #[serde(default = "default_heartbeat_interval_secs")]
    pub heartbeat_interval_secs: u64,
    #[serde(default = "default_equity_poll_interval_secs")]
    pub equity_poll_interval_secs: u64,
    /// How often the session date is checked for rollover.
    #[serde(default = "default_rollover_check_interval_secs")]
    pub rollover_check_interval_secs: u64,
    /// Venue spec refresh. Default: 300 (5 minutes).
    #[serde(default = "default_spec_refresh_interval_secs")]
    pub spec_refresh_interval_secs: u64,
}

fn default_heartbeat_interval_secs() -> u64 {
    10
}

fn default_equity_poll_interval_secs() -> u64 {
    5
}

fn default_rollover_check_interval_secs() -> u64 {
    60
}

fn default_spec_refresh_interval_secs() -> u64 {
    300
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            heartbeat_interval_secs: default_heartbeat_interval_secs(),
            equity_poll_interval_secs: default_equity_poll_interval_secs(),
            rollover_check_interval_secs: default_rollover_check_interval_secs(),
            spec_refresh_interval_secs: default_spec_refresh_interval_secs(),
        }
    }
}

/// Top-level application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Account equity at the start of the first session.
    pub start_equity: Decimal,

    #[serde(default)]
    pub venue: VenueConfig,

    #[serde(default)]
    pub retry: RetryConfig,

    #[serde(default)]
    pub risk: RiskConfig,

    #[serde(default)]
    pub probe: ProbeConfig,

    #[serde(default)]
    pub schedule: ScheduleConfig,

    /// Tradable symbols and their lot constraints.
    #[serde(default)]
    pub symbols: Vec<RawVenueSpec>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            start_equity: Decimal::from(10_000),
            venue: VenueConfig::default(),
            retry: RetryConfig::default(),
            risk: RiskConfig::default(),
            probe: ProbeConfig::default(),
            schedule: ScheduleConfig::default(),
            symbols: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Load and validate a TOML configuration file.
    pub fn from_file(path: &str) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AppError::Config(format!("Failed to read config {path}: {e}")))?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> AppResult<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| AppError::Config(format!("Failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Check everything that would otherwise fail at first use.
    pub fn validate(&self) -> AppResult<()> {
        if self.start_equity <= Decimal::ZERO {
            return Err(AppError::Config(format!(
                "start_equity must be positive, got {}",
                self.start_equity
            )));
        }
        check_scheme("venue.socket_url", &self.venue.socket_url, &["ws://", "wss://"])?;
        check_scheme(
            "venue.direct_url",
            &self.venue.direct_url,
            &["http://", "https://"],
        )?;
        for (name, value) in [
            ("venue.connect_timeout_ms", self.venue.connect_timeout_ms),
            ("venue.send_timeout_ms", self.venue.send_timeout_ms),
            ("venue.recv_timeout_ms", self.venue.recv_timeout_ms),
            ("venue.request_timeout_ms", self.venue.request_timeout_ms),
            ("probe.timeout_ms", self.probe.timeout_ms),
        ] {
            if value == 0 {
                return Err(AppError::Config(format!("{name} must be positive")));
            }
        }

        self.query_policy()?;
        self.write_policy()?;
        self.risk.validate()?;
        self.venue_specs()?;
        Ok(())
    }

    pub fn start_equity(&self) -> Money {
        Money::new(self.start_equity)
    }

    pub fn query_policy(&self) -> AppResult<RetryPolicy> {
        Ok(RetryPolicy::try_from(self.retry.query.clone())?)
    }

    pub fn write_policy(&self) -> AppResult<RetryPolicy> {
        Ok(RetryPolicy::try_from(self.retry.write.clone())?)
    }

    /// Validated specs; duplicate symbols are rejected.
    pub fn venue_specs(&self) -> AppResult<Vec<VenueSpec>> {
        let mut specs: Vec<VenueSpec> = Vec::with_capacity(self.symbols.len());
        for raw in &self.symbols {
            let spec = VenueSpec::try_from(raw.clone())?;
            if specs.iter().any(|s| s.symbol() == spec.symbol()) {
                return Err(AppError::Config(format!(
                    "symbol {} configured twice",
                    spec.symbol()
                )));
            }
            specs.push(spec);
        }
        Ok(specs)
    }

    pub fn socket_channel_config(&self) -> SocketChannelConfig {
        SocketChannelConfig {
            url: self.venue.socket_url.clone(),
            connect_timeout: Duration::from_millis(self.venue.connect_timeout_ms),
            send_timeout: Duration::from_millis(self.venue.send_timeout_ms),
            recv_timeout: Duration::from_millis(self.venue.recv_timeout_ms),
        }
    }

    pub fn direct_client_config(&self) -> DirectClientConfig {
        DirectClientConfig {
            url: self.venue.direct_url.clone(),
            connect_timeout: Duration::from_millis(self.venue.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.venue.request_timeout_ms),
        }
    }
}

fn check_scheme(name: &str, url: &str, schemes: &[&str]) -> AppResult<()> {
    if schemes.iter().any(|s| url.starts_with(s)) {
        Ok(())
    } else {
        Err(AppError::Config(format!(
            "{name} must start with one of {schemes:?}, got {url:?}"
        )))
    }
}
