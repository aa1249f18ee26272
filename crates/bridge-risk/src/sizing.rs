//! Position sizing: Kelly fraction and lot normalization.

use bridge_core::{Lots, Money, VenueSpec};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use tracing::debug;

/// Equity fraction used when the win probability is missing or unusable.
pub const FALLBACK_RISK_FRACTION: f64 = 0.01;

/// Decimal places kept when converting a fraction to `Decimal`.
const FRACTION_DP: u32 = 10;

/// Kelly bet fraction `2p - 1`, clamped to `[0, max_risk_fraction]`.
///
/// A missing, NaN or out-of-range probability yields
/// [`FALLBACK_RISK_FRACTION`] capped at `max_risk_fraction`.
pub fn kelly_fraction(win_probability: Option<f64>, max_risk_fraction: f64) -> f64 {
    kelly_fraction_with_fallback(win_probability, max_risk_fraction, FALLBACK_RISK_FRACTION)
}

/// [`kelly_fraction`] with a configurable fallback.
pub fn kelly_fraction_with_fallback(
    win_probability: Option<f64>,
    max_risk_fraction: f64,
    fallback: f64,
) -> f64 {
    if !max_risk_fraction.is_finite() || max_risk_fraction <= 0.0 {
        return 0.0;
    }

    match win_probability.filter(|p| p.is_finite() && (0.0..=1.0).contains(p)) {
        Some(p) => (2.0 * p - 1.0).clamp(0.0, max_risk_fraction),
        None => {
            debug!(
                win_probability = ?win_probability,
                fallback,
                "No usable win probability, using fallback fraction"
            );
            if fallback.is_finite() {
                fallback.clamp(0.0, max_risk_fraction)
            } else {
                0.0
            }
        }
    }
}

/// Unnormalized lots for committing `fraction` of `equity`:
/// `fraction * equity / margin_per_lot`.
///
/// Non-positive equity or fraction gives zero lots. A result too large for
/// a `Decimal` is capped at the spec's largest tradable size.
pub fn raw_lots_for_fraction(fraction: f64, equity: Money, spec: &VenueSpec) -> Lots {
    let fraction = match Decimal::from_f64(fraction) {
        Some(f) if f > Decimal::ZERO => f.round_dp(FRACTION_DP),
        _ => return Lots::ZERO,
    };
    if !equity.is_positive() {
        return Lots::ZERO;
    }
    let margin = spec.margin_per_lot().inner();
    match equity
        .inner()
        .checked_mul(fraction)
        .and_then(|budget| budget.checked_div(margin))
    {
        Some(lots) => Lots::new(lots),
        None => {
            debug!(
                symbol = spec.symbol(),
                equity = %equity,
                margin_per_lot = %margin,
                "Raw size overflowed, capping at max lot"
            );
            spec.max_lot_on_grid()
        }
    }
}

/// Snap `raw` onto the venue's lot grid.
///
/// Floors to a multiple of `lot_step` (never rounds up past the requested
/// size), then clamps to `[min_lot, max_lot]` where the upper bound is
/// `max_lot` floored to the grid. Returns `None` for non-positive input.
pub fn normalize_lots(raw: Lots, spec: &VenueSpec) -> Option<Lots> {
    if !raw.is_positive() {
        return None;
    }
    let max = spec.max_lot_on_grid();
    if raw >= max {
        return Some(max);
    }
    // Below an on-grid max the step count always fits.
    let floored = raw.floor_to_step(spec.lot_step()).unwrap_or(max);
    Some(floored.max(spec.min_lot()).min(max))
}
