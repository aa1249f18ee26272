//! Session risk state and halt latching.
//!
//! `RiskSession` owns the only copy of `RiskState` behind a single mutex.
//! Every mutation re-evaluates the halt conditions. A halt is a latch:
//! - a daily-loss halt clears at the next session rollover
//! - a drawdown halt survives rollover and clears only on
//!   [`RiskSession::acknowledge_drawdown_halt`]

use crate::config::RiskConfig;
use crate::error::{RiskError, RiskResult};
use bridge_core::{EquitySnapshot, Money, TradeClose};
use bridge_telemetry::Metrics;
use chrono::{DateTime, NaiveDate, Utc};
use parking_lot::Mutex;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info, warn};

// ============================================================================
// HaltReason
// ============================================================================

/// Why trading is halted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HaltReason {
    /// Session P&L fell to or below the daily loss limit.
    DailyLoss {
        /// Session P&L in percent of start equity (negative).
        pnl_pct: Decimal,
        limit_pct: Decimal,
    },
    /// Equity fell from its session peak by at least the drawdown limit.
    Drawdown {
        drawdown_pct: Decimal,
        max_pct: Decimal,
    },
}

impl HaltReason {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DailyLoss { .. } => "daily_loss",
            Self::Drawdown { .. } => "drawdown",
        }
    }

    pub fn is_drawdown(&self) -> bool {
        matches!(self, Self::Drawdown { .. })
    }
}

impl fmt::Display for HaltReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DailyLoss { pnl_pct, limit_pct } => write!(
                f,
                "daily loss limit reached: session P&L {}% (limit -{}%)",
                pnl_pct.round_dp(2),
                limit_pct
            ),
            Self::Drawdown {
                drawdown_pct,
                max_pct,
            } => write!(
                f,
                "max drawdown reached: {}% from peak (limit {}%), operator acknowledgement required",
                drawdown_pct.round_dp(2),
                max_pct
            ),
        }
    }
}

// ============================================================================
// RiskState
// ============================================================================

/// Per-session account risk values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RiskState {
    pub session_start_equity: Money,
    pub peak_equity: Money,
    pub current_equity: Money,
    pub realized_pnl: Money,
    pub unrealized_pnl: Money,
    pub daily_loss_limit_pct: Decimal,
    pub max_drawdown_pct: Decimal,
    pub halted_reason: Option<HaltReason>,
    pub session_date: NaiveDate,
}

impl RiskState {
    /// Session P&L in percent of start equity.
    pub fn session_pnl_pct(&self) -> Option<Decimal> {
        (self.realized_pnl + self.unrealized_pnl).pct_of(self.session_start_equity)
    }

    /// Decline of current equity from the session peak, in percent.
    pub fn drawdown_pct(&self) -> Option<Decimal> {
        (self.peak_equity - self.current_equity).pct_of(self.peak_equity)
    }

    pub fn is_halted(&self) -> bool {
        self.halted_reason.is_some()
    }

    /// The halt condition currently met, drawdown first.
    fn breached_limit(&self) -> Option<HaltReason> {
        if let Some(drawdown_pct) = self.drawdown_pct() {
            if drawdown_pct >= self.max_drawdown_pct {
                return Some(HaltReason::Drawdown {
                    drawdown_pct,
                    max_pct: self.max_drawdown_pct,
                });
            }
        }
        if let Some(pnl_pct) = self.session_pnl_pct() {
            if pnl_pct <= -self.daily_loss_limit_pct {
                return Some(HaltReason::DailyLoss {
                    pnl_pct,
                    limit_pct: self.daily_loss_limit_pct,
                });
            }
        }
        None
    }

    /// Latch any breached limit. Returns the reason if the halt is new or
    /// was escalated from daily loss to drawdown.
    fn evaluate(&mut self) -> Option<HaltReason> {
        let breached = self.breached_limit()?;
        match &self.halted_reason {
            None => {}
            Some(current) if !current.is_drawdown() && breached.is_drawdown() => {}
            Some(_) => return None,
        }
        self.halted_reason = Some(breached.clone());
        Some(breached)
    }

    /// Returns the previous session date.
    fn start_session(&mut self, date: NaiveDate) -> NaiveDate {
        let previous = self.session_date;
        self.session_start_equity = self.current_equity;
        self.peak_equity = self.current_equity;
        self.realized_pnl = Money::ZERO;
        self.unrealized_pnl = Money::ZERO;
        self.session_date = date;
        if matches!(self.halted_reason, Some(HaltReason::DailyLoss { .. })) {
            self.halted_reason = None;
        }
        previous
    }
}

// ============================================================================
// RiskSession
// ============================================================================

/// Shared handle to one trading session's risk state.
///
/// Thread-safe: share via `Arc<RiskSession>`. The lock is only held for the
/// duration of a synchronous update.
#[derive(Debug)]
pub struct RiskSession {
    state: Mutex<RiskState>,
}

impl RiskSession {
    /// Start a session at `start_equity` on `session_date`.
    pub fn new(start_equity: Money, config: &RiskConfig, session_date: NaiveDate) -> RiskResult<Self> {
        config.validate()?;
        if !start_equity.is_positive() {
            return Err(RiskError::InvalidSession(format!(
                "start equity must be positive, got {start_equity}"
            )));
        }

        info!(
            start_equity = %start_equity,
            session_date = %session_date,
            daily_loss_limit_pct = %config.daily_loss_limit_pct,
            max_drawdown_pct = %config.max_drawdown_pct,
            "Risk session started"
        );

        Ok(Self {
            state: Mutex::new(RiskState {
                session_start_equity: start_equity,
                peak_equity: start_equity,
                current_equity: start_equity,
                realized_pnl: Money::ZERO,
                unrealized_pnl: Money::ZERO,
                daily_loss_limit_pct: config.daily_loss_limit_pct,
                max_drawdown_pct: config.max_drawdown_pct,
                halted_reason: None,
                session_date,
            }),
        })
    }

    /// Apply an equity feed update. Returns a newly latched halt, if any.
    pub fn update_equity(&self, snapshot: EquitySnapshot) -> Option<HaltReason> {
        let (halt, equity, drawdown) = {
            let mut state = self.state.lock();
            state.current_equity = snapshot.equity;
            state.unrealized_pnl = snapshot.unrealized_pnl;
            if state.current_equity > state.peak_equity {
                state.peak_equity = state.current_equity;
            }
            (state.evaluate(), state.current_equity, state.drawdown_pct())
        };

        let drawdown = drawdown.unwrap_or(Decimal::ZERO);
        Metrics::equity(equity.to_f64(), drawdown.to_f64().unwrap_or(0.0));
        debug!(equity = %equity, drawdown_pct = %drawdown.round_dp(4), "Equity updated");

        if let Some(reason) = &halt {
            Self::report_halt(reason);
        }
        halt
    }

    /// Re-anchor the session on live account equity.
    ///
    /// Start, peak and current equity all become `snapshot.equity` and
    /// realized P&L is zeroed, so a configured start equity that differs
    /// from the account does not read as a loss. Used once the venue first
    /// reports equity. An existing halt is kept.
    pub fn rebase(&self, snapshot: EquitySnapshot) -> RiskResult<()> {
        if !snapshot.equity.is_positive() {
            return Err(RiskError::InvalidSession(format!(
                "live equity must be positive, got {}",
                snapshot.equity
            )));
        }

        let (previous, halt) = {
            let mut state = self.state.lock();
            let previous = state.session_start_equity;
            state.current_equity = snapshot.equity;
            state.session_start_equity = snapshot.equity;
            state.peak_equity = snapshot.equity;
            state.realized_pnl = Money::ZERO;
            state.unrealized_pnl = snapshot.unrealized_pnl;
            (previous, state.evaluate())
        };

        Metrics::equity(snapshot.equity.to_f64(), 0.0);
        info!(
            previous_start = %previous,
            equity = %snapshot.equity,
            unrealized_pnl = %snapshot.unrealized_pnl,
            "Risk session rebased on live equity"
        );
        if let Some(reason) = &halt {
            Self::report_halt(reason);
        }
        Ok(())
    }

    /// Book a closed trade's realized P&L. Returns a newly latched halt, if any.
    pub fn on_trade_closed(&self, close: &TradeClose) -> Option<HaltReason> {
        let (halt, realized) = {
            let mut state = self.state.lock();
            state.realized_pnl = state.realized_pnl + close.realized_pnl;
            (state.evaluate(), state.realized_pnl)
        };

        info!(
            symbol = %close.symbol,
            realized_pnl = %close.realized_pnl,
            session_realized = %realized,
            "Trade closed"
        );

        if let Some(reason) = &halt {
            Self::report_halt(reason);
        }
        halt
    }

    /// Start a new session on `date`.
    ///
    /// Resets start and peak equity to current equity and zeroes session
    /// P&L. A daily-loss halt is cleared; a drawdown halt is kept. Unrealized
    /// P&L is re-established by the next equity update.
    pub fn roll_over(&self, date: NaiveDate) {
        let (previous, halted) = {
            let mut state = self.state.lock();
            let previous = state.start_session(date);
            (previous, state.halted_reason.clone())
        };
        Self::report_rollover(previous, date, halted);
    }

    /// Roll over if `now` falls on a later calendar day (UTC) than the
    /// current session. Returns whether a rollover happened.
    pub fn check_rollover(&self, now: DateTime<Utc>) -> bool {
        let today = now.date_naive();
        let rolled = {
            let mut state = self.state.lock();
            if today > state.session_date {
                let previous = state.start_session(today);
                Some((previous, state.halted_reason.clone()))
            } else {
                None
            }
        };

        match rolled {
            Some((previous, halted)) => {
                Self::report_rollover(previous, today, halted);
                true
            }
            None => false,
        }
    }

    fn report_rollover(previous: NaiveDate, date: NaiveDate, halted: Option<HaltReason>) {
        Metrics::risk_halted(halted.is_some());
        match halted {
            Some(reason) => warn!(
                previous = %previous,
                session_date = %date,
                reason = %reason,
                "Session rolled over, halt persists"
            ),
            None => info!(previous = %previous, session_date = %date, "Session rolled over"),
        }
    }

    /// Clear a drawdown halt after operator review.
    ///
    /// Resets the peak to current equity so the acknowledged decline does
    /// not immediately re-trigger. Returns `false` if no drawdown halt was
    /// active. A daily-loss breach still in force latches again.
    pub fn acknowledge_drawdown_halt(&self) -> bool {
        let (cleared, relatched) = {
            let mut state = self.state.lock();
            if !matches!(state.halted_reason, Some(HaltReason::Drawdown { .. })) {
                return false;
            }
            let cleared = state.halted_reason.take();
            state.peak_equity = state.current_equity;
            (cleared, state.evaluate())
        };

        if let Some(reason) = &cleared {
            info!(previous_reason = %reason, "Drawdown halt acknowledged by operator");
        }
        match &relatched {
            Some(reason) => Self::report_halt(reason),
            None => Metrics::risk_halted(false),
        }
        true
    }

    pub fn halted_reason(&self) -> Option<HaltReason> {
        self.state.lock().halted_reason.clone()
    }

    pub fn is_halted(&self) -> bool {
        self.state.lock().is_halted()
    }

    pub fn current_equity(&self) -> Money {
        self.state.lock().current_equity
    }

    /// Copy of the current state.
    pub fn snapshot(&self) -> RiskState {
        self.state.lock().clone()
    }

    fn report_halt(reason: &HaltReason) {
        Metrics::risk_halt(reason.kind());
        error!(kind = reason.kind(), reason = %reason, "TRADING HALTED");
    }
}
