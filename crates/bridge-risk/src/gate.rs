//! Pre-submission risk gate.
//!
//! Converts an order intent into a venue-compliant order only when the
//! session is not halted and the size is usable. A rejection is a normal
//! result, carried in [`NormalizedOrder::reject_reason`].

use crate::config::RiskConfig;
use crate::session::RiskSession;
use crate::sizing::{kelly_fraction_with_fallback, normalize_lots, raw_lots_for_fraction};
use bridge_core::{Lots, Money, NormalizedOrder, OrderIntent, VenueSpec};
use bridge_telemetry::Metrics;
use tracing::{debug, warn};

/// Sizes orders against a venue spec and the session's halt state.
#[derive(Debug, Clone, Default)]
pub struct RiskGate {
    config: RiskConfig,
}

impl RiskGate {
    pub fn new(config: RiskConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RiskConfig {
        &self.config
    }

    /// Normalize `intent` or reject it.
    ///
    /// Checks, in order: halted session (reason passed through verbatim),
    /// symbol mismatch, non-positive size. Accepted sizes are floored to
    /// the lot step and clamped to the spec's bounds.
    pub fn size(
        &self,
        intent: &OrderIntent,
        session: &RiskSession,
        spec: &VenueSpec,
    ) -> NormalizedOrder {
        if let Some(reason) = session.halted_reason() {
            return Self::reject(intent, "halted", reason.to_string());
        }

        if intent.symbol != spec.symbol() {
            return Self::reject(
                intent,
                "symbol_mismatch",
                format!(
                    "symbol mismatch: order for {} sized against spec for {}",
                    intent.symbol,
                    spec.symbol()
                ),
            );
        }

        let Some(lots) = normalize_lots(intent.raw_size, spec) else {
            return Self::reject(
                intent,
                "non_positive",
                format!("order size must be positive, got {}", intent.raw_size),
            );
        };

        debug!(
            symbol = %intent.symbol,
            direction = %intent.direction,
            raw_size = %intent.raw_size,
            lots = %lots,
            "Order sized"
        );
        NormalizedOrder::accepted(intent.symbol.clone(), intent.direction, lots)
    }

    /// Unnormalized size for a win probability: the capped Kelly fraction
    /// of `equity` converted to lots. Feed the result to [`size`](Self::size).
    pub fn raw_size_for_probability(
        &self,
        win_probability: Option<f64>,
        equity: Money,
        spec: &VenueSpec,
    ) -> Lots {
        let fraction = kelly_fraction_with_fallback(
            win_probability,
            self.config.max_risk_fraction,
            self.config.fallback_risk_fraction,
        );
        let raw_size = raw_lots_for_fraction(fraction, equity, spec);
        debug!(
            symbol = spec.symbol(),
            win_probability = ?win_probability,
            fraction,
            equity = %equity,
            raw_size = %raw_size,
            "Kelly size computed"
        );
        raw_size
    }

    fn reject(intent: &OrderIntent, label: &str, reason: String) -> NormalizedOrder {
        Metrics::risk_rejected(label);
        warn!(
            symbol = %intent.symbol,
            direction = %intent.direction,
            raw_size = %intent.raw_size,
            reason = %reason,
            "Order rejected by risk gate"
        );
        NormalizedOrder::rejected(intent.symbol.clone(), intent.direction, reason)
    }
}
