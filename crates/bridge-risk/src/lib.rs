//! Position sizing and account risk limits for the venue bridge.
//!
//! Orders reach the venue only through [`RiskGate::size`], which:
//! - refuses everything while the [`RiskSession`] is halted
//! - floors the requested size onto the venue lot grid and clamps it to
//!   the symbol's bounds
//!
//! Sessions halt on a daily loss limit (cleared at rollover) or a maximum
//! drawdown from peak equity (cleared only by an operator).

pub mod config;
pub mod error;
pub mod gate;
pub mod session;
pub mod sizing;
pub mod spec_cache;

pub use config::RiskConfig;
pub use error::{RiskError, RiskResult};
pub use gate::RiskGate;
pub use session::{HaltReason, RiskSession, RiskState};
pub use sizing::{
    kelly_fraction, kelly_fraction_with_fallback, normalize_lots, raw_lots_for_fraction,
    FALLBACK_RISK_FRACTION,
};
pub use spec_cache::{SpecCache, SpecCacheEntry};
