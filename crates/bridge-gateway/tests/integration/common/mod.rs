//! Shared fixtures for gateway integration tests.

#![allow(dead_code)]

pub mod mock_venue;

use std::sync::Arc;
use std::time::Duration;

use bridge_core::{Lots, Money, VenueSpec};
use bridge_resilience::RetryPolicy;
use bridge_risk::{RiskConfig, RiskSession, SpecCache};
use chrono::NaiveDate;
use rust_decimal_macros::dec;

pub fn eurusd_specs() -> Arc<SpecCache> {
    let spec = VenueSpec::new(
        "EURUSD",
        Lots::new(dec!(0.01)),
        Lots::new(dec!(0.01)),
        Lots::new(dec!(100)),
        Money::new(dec!(1000)),
    )
    .unwrap();
    Arc::new(SpecCache::from_specs([spec]).unwrap())
}

pub fn fresh_session() -> Arc<RiskSession> {
    Arc::new(
        RiskSession::new(
            Money::new(dec!(10000)),
            &RiskConfig::default(),
            NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
        )
        .unwrap(),
    )
}

/// Short backoff so real-time tests stay fast.
pub fn quick_policy(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::new(
        Duration::from_secs(5),
        Some(max_attempts),
        Duration::from_millis(20),
        Duration::from_millis(80),
        true,
    )
    .unwrap()
}
