//! Risk limits configuration.

use crate::error::{RiskError, RiskResult};
use crate::sizing::FALLBACK_RISK_FRACTION;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Account and session risk limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskConfig {
    /// Session loss (realized + unrealized) in percent of session start equity
    /// at which trading halts until the next session.
    #[serde(default = "default_daily_loss_limit_pct")]
    pub daily_loss_limit_pct: Decimal,
    /// Decline from session peak equity in percent at which trading halts
    /// until an operator acknowledges it.
    #[serde(default = "default_max_drawdown_pct")]
    pub max_drawdown_pct: Decimal,
    /// Upper bound on the fraction of equity committed to one order.
    #[serde(default = "default_max_risk_fraction")]
    pub max_risk_fraction: f64,
    /// Fraction used when no usable win probability is available.
    #[serde(default = "default_fallback_risk_fraction")]
    pub fallback_risk_fraction: f64,
}

fn default_daily_loss_limit_pct() -> Decimal {
    Decimal::from(5)
}

fn default_max_drawdown_pct() -> Decimal {
    Decimal::from(10)
}

fn default_max_risk_fraction() -> f64 {
    0.02
}

fn default_fallback_risk_fraction() -> f64 {
    FALLBACK_RISK_FRACTION
}

impl Default for RiskConfig {
    fn default() -> Self {
        Self {
            daily_loss_limit_pct: default_daily_loss_limit_pct(),
            max_drawdown_pct: default_max_drawdown_pct(),
            max_risk_fraction: default_max_risk_fraction(),
            fallback_risk_fraction: default_fallback_risk_fraction(),
        }
    }
}

impl RiskConfig {
    /// Reject limits that would disable or invert a check.
    pub fn validate(&self) -> RiskResult<()> {
        let hundred = Decimal::ONE_HUNDRED;
        if self.daily_loss_limit_pct <= Decimal::ZERO || self.daily_loss_limit_pct > hundred {
            return Err(RiskError::ConfigError(format!(
                "daily_loss_limit_pct must be in (0, 100], got {}",
                self.daily_loss_limit_pct
            )));
        }
        if self.max_drawdown_pct <= Decimal::ZERO || self.max_drawdown_pct > hundred {
            return Err(RiskError::ConfigError(format!(
                "max_drawdown_pct must be in (0, 100], got {}",
                self.max_drawdown_pct
            )));
        }
        for (name, value) in [
            ("max_risk_fraction", self.max_risk_fraction),
            ("fallback_risk_fraction", self.fallback_risk_fraction),
        ] {
            if !value.is_finite() || value <= 0.0 || value > 1.0 {
                return Err(RiskError::ConfigError(format!(
                    "{name} must be in (0, 1], got {value}"
                )));
            }
        }
        Ok(())
    }
}
