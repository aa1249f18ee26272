//! Order intents, normalized orders and account notifications.

use crate::{Lots, Money};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Trade direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Buy,
    Sell,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Buy => write!(f, "buy"),
            Self::Sell => write!(f, "sell"),
        }
    }
}

/// What the strategy wants to trade, before any venue constraints apply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub symbol: String,
    pub direction: Direction,
    /// Unnormalized volume in lots.
    pub raw_size: Lots,
}

impl OrderIntent {
    pub fn new(symbol: impl Into<String>, direction: Direction, raw_size: Lots) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            raw_size,
        }
    }
}

/// Venue-compliant order derived from an [`OrderIntent`].
///
/// Lives only until submission. When `valid` is false, `lots` is zero and
/// `reject_reason` says why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedOrder {
    pub symbol: String,
    pub direction: Direction,
    pub lots: Lots,
    pub valid: bool,
    pub reject_reason: Option<String>,
}

impl NormalizedOrder {
    /// An order accepted by the risk gate.
    pub fn accepted(symbol: impl Into<String>, direction: Direction, lots: Lots) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            lots,
            valid: true,
            reject_reason: None,
        }
    }

    /// An order blocked by the risk gate.
    pub fn rejected(
        symbol: impl Into<String>,
        direction: Direction,
        reason: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            lots: Lots::ZERO,
            valid: false,
            reject_reason: Some(reason.into()),
        }
    }
}

/// Realized P&L notification for a closed trade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeClose {
    pub symbol: String,
    pub realized_pnl: Money,
}

impl TradeClose {
    pub fn new(symbol: impl Into<String>, realized_pnl: Money) -> Self {
        Self {
            symbol: symbol.into(),
            realized_pnl,
        }
    }
}

/// One reading from the live equity feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    /// Current account equity (balance plus floating P&L).
    pub equity: Money,
    /// Floating P&L of open positions.
    #[serde(default)]
    pub unrealized_pnl: Money,
}

impl EquitySnapshot {
    pub fn new(equity: Money, unrealized_pnl: Money) -> Self {
        Self {
            equity,
            unrealized_pnl,
        }
    }
}
