//! Precision-safe decimal types for order sizing and account values.
//!
//! Uses `rust_decimal` for exact decimal arithmetic, so lot normalization
//! produces exact multiples of the venue step instead of values that are
//! only "close enough" under floating point.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Sub};
use std::str::FromStr;

/// Account-currency amount (equity, P&L, margin).
///
/// Wraps `Decimal` to prevent mixing money with lot quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(pub Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Ratio of `self` to `base` expressed in percent.
    ///
    /// Returns `None` when `base` is zero. Saturates at `Decimal::MAX` or
    /// `Decimal::MIN` when the ratio does not fit.
    pub fn pct_of(&self, base: Money) -> Option<Decimal> {
        if base.is_zero() {
            return None;
        }
        let pct = self
            .0
            .checked_div(base.0)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED));
        Some(pct.unwrap_or(if self.0.is_sign_negative() == base.0.is_sign_negative() {
            Decimal::MAX
        } else {
            Decimal::MIN
        }))
    }

    /// Lossy conversion for metrics gauges.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Money {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Money {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}

/// Saturating: account values come from the venue and are not trusted to fit.
impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_add(rhs.0))
    }
}

/// Saturating, like `Add`.
impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0.saturating_sub(rhs.0))
    }
}

/// Order volume in venue lots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Lots(pub Decimal);

impl Lots {
    pub const ZERO: Self = Self(Decimal::ZERO);

    #[inline]
    pub fn new(value: Decimal) -> Self {
        Self(value)
    }

    #[inline]
    pub fn inner(&self) -> Decimal {
        self.0
    }

    #[inline]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    #[inline]
    pub fn is_positive(&self) -> bool {
        self.0.is_sign_positive() && !self.0.is_zero()
    }

    /// Round down to a whole number of steps.
    ///
    /// Never rounds up: a rounded-up volume can exceed the venue cap or
    /// land off the step grid. `None` when the step count overflows.
    #[inline]
    pub fn floor_to_step(&self, step: Lots) -> Option<Self> {
        if step.is_zero() {
            return Some(*self);
        }
        let steps = self.0.checked_div(step.0)?.floor();
        Some(Self(steps.checked_mul(step.0)?.normalize()))
    }

    /// True when the value lies exactly on the step grid.
    #[inline]
    pub fn is_multiple_of(&self, step: Lots) -> bool {
        if step.is_zero() {
            return true;
        }
        (self.0 % step.0).is_zero()
    }

    /// Lossy conversion for the wire payload and metrics.
    #[inline]
    pub fn to_f64(&self) -> f64 {
        self.0.to_f64().unwrap_or(0.0)
    }
}

impl fmt::Display for Lots {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Lots {
    type Err = rust_decimal::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

impl From<Decimal> for Lots {
    fn from(d: Decimal) -> Self {
        Self(d)
    }
}
