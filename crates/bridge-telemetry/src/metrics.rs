//! Prometheus metrics for the venue bridge.
//!
//! Covers:
//! - Invocation engine outcomes, attempts and backoff waits
//! - Gateway request outcomes per action
//! - Risk gate rejections, halts and equity
//!
//! # Panics
//!
//! Metric registration uses `unwrap()`. A registration failure means a
//! duplicate metric name, which must crash at startup rather than fail
//! silently. These panics only occur during static initialization.

use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram_vec, register_int_gauge,
    CounterVec, Encoder, Gauge, HistogramVec, IntGauge, TextEncoder,
};

use crate::error::{TelemetryError, TelemetryResult};

// =============================================================================
// Invocation engine
// =============================================================================

/// Completed invocations by final outcome.
/// Labels: operation, outcome (success/exhausted/network_unavailable/terminal/fatal/unknown/shutdown)
pub static INVOCATIONS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bridge_invocations_total",
        "Completed invocations by final outcome",
        &["operation", "outcome"]
    )
    .unwrap()
});

/// Attempts used per invocation.
pub static INVOCATION_ATTEMPTS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "bridge_invocation_attempts",
        "Attempts used per invocation",
        &["operation"],
        vec![1.0, 2.0, 3.0, 4.0, 5.0, 7.0, 10.0, 15.0, 20.0]
    )
    .unwrap()
});

/// Total wall time per invocation in milliseconds.
pub static INVOCATION_DURATION_MS: Lazy<HistogramVec> = Lazy::new(|| {
    register_histogram_vec!(
        "bridge_invocation_duration_ms",
        "Invocation wall time including backoff in milliseconds",
        &["operation"],
        vec![5.0, 20.0, 50.0, 100.0, 250.0, 500.0, 1000.0, 5000.0, 10000.0, 30000.0]
    )
    .unwrap()
});

/// Backoff waits scheduled between attempts.
pub static BACKOFF_WAITS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bridge_backoff_waits_total",
        "Backoff waits scheduled between attempts",
        &["operation"]
    )
    .unwrap()
});

// =============================================================================
// Gateway router
// =============================================================================

/// Routed requests by action and outcome state.
pub static GATEWAY_REQUESTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bridge_gateway_requests_total",
        "Routed requests by action and outcome state",
        &["action", "state"]
    )
    .unwrap()
});

/// Write actions that ended with an unknown outcome.
pub static GATEWAY_OUTCOME_UNKNOWN_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bridge_gateway_outcome_unknown_total",
        "Write actions that ended with an unknown outcome",
        &["action"]
    )
    .unwrap()
});

/// Venue heartbeat state (1 = last heartbeat answered).
pub static VENUE_REACHABLE: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!(
        "bridge_venue_reachable",
        "Last heartbeat answered by the venue (1=yes)"
    )
    .unwrap()
});

// =============================================================================
// Risk gate
// =============================================================================

/// Orders rejected by the risk gate.
/// Labels: reason (halted/symbol_mismatch/non_positive/no_spec)
pub static RISK_REJECTED_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bridge_risk_rejected_total",
        "Orders rejected by the risk gate",
        &["reason"]
    )
    .unwrap()
});

/// Halts triggered.
/// Labels: kind (daily_loss/drawdown)
pub static RISK_HALTS_TOTAL: Lazy<CounterVec> = Lazy::new(|| {
    register_counter_vec!(
        "bridge_risk_halts_total",
        "Risk halts triggered",
        &["kind"]
    )
    .unwrap()
});

/// Trading halted flag (1 = halted).
pub static RISK_HALTED: Lazy<IntGauge> = Lazy::new(|| {
    register_int_gauge!("bridge_risk_halted", "Trading halted (1=halted)").unwrap()
});

/// Latest account equity.
pub static ACCOUNT_EQUITY: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!("bridge_account_equity", "Latest account equity").unwrap()
});

/// Current drawdown from session peak in percent.
pub static DRAWDOWN_PCT: Lazy<Gauge> = Lazy::new(|| {
    register_gauge!(
        "bridge_drawdown_pct",
        "Drawdown from session peak equity in percent"
    )
    .unwrap()
});

/// Metrics facade for easy access.
pub struct Metrics;

impl Metrics {
    /// Record a finished invocation.
    pub fn invocation_finished(operation: &str, outcome: &str, attempts: u32, elapsed_ms: f64) {
        INVOCATIONS_TOTAL
            .with_label_values(&[operation, outcome])
            .inc();
        INVOCATION_ATTEMPTS
            .with_label_values(&[operation])
            .observe(f64::from(attempts));
        INVOCATION_DURATION_MS
            .with_label_values(&[operation])
            .observe(elapsed_ms);
    }

    /// Record a scheduled backoff wait.
    pub fn backoff_scheduled(operation: &str) {
        BACKOFF_WAITS_TOTAL.with_label_values(&[operation]).inc();
    }

    /// Record a routed request's outcome state.
    pub fn gateway_outcome(action: &str, state: &str) {
        GATEWAY_REQUESTS_TOTAL
            .with_label_values(&[action, state])
            .inc();
    }

    /// Record a write that ended with an unknown outcome.
    pub fn gateway_outcome_unknown(action: &str) {
        GATEWAY_OUTCOME_UNKNOWN_TOTAL
            .with_label_values(&[action])
            .inc();
    }

    /// Record venue heartbeat result.
    pub fn venue_reachable(reachable: bool) {
        VENUE_REACHABLE.set(i64::from(reachable));
    }

    /// Record a risk gate rejection.
    pub fn risk_rejected(reason: &str) {
        RISK_REJECTED_TOTAL.with_label_values(&[reason]).inc();
    }

    /// Record a newly triggered halt.
    pub fn risk_halt(kind: &str) {
        RISK_HALTS_TOTAL.with_label_values(&[kind]).inc();
        RISK_HALTED.set(1);
    }

    /// Record the halt flag after a rollover or acknowledgement.
    pub fn risk_halted(halted: bool) {
        RISK_HALTED.set(i64::from(halted));
    }

    /// Record equity and drawdown from the latest equity update.
    pub fn equity(equity: f64, drawdown_pct: f64) {
        ACCOUNT_EQUITY.set(equity);
        DRAWDOWN_PCT.set(drawdown_pct);
    }

    /// Render all registered metrics in Prometheus text format.
    pub fn render() -> TelemetryResult<String> {
        let encoder = TextEncoder::new();
        let families = prometheus::gather();
        let mut buf = Vec::new();
        encoder
            .encode(&families, &mut buf)
            .map_err(|e| TelemetryError::Metrics(e.to_string()))?;
        String::from_utf8(buf).map_err(|e| TelemetryError::Metrics(e.to_string()))
    }
}
