//! Venue symbol specification cache.
//!
//! Holds the lot constraints per symbol and refuses silent changes to
//! anything sizing depends on.

use crate::error::{RiskError, RiskResult};
use bridge_core::VenueSpec;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use tracing::{debug, error};

/// Spec cache entry with change tracking.
#[derive(Debug, Clone)]
pub struct SpecCacheEntry {
    pub spec: VenueSpec,
    pub last_update: DateTime<Utc>,
    pub version: u64,
}

/// Venue specs keyed by symbol.
#[derive(Debug, Default)]
pub struct SpecCache {
    specs: DashMap<String, SpecCacheEntry>,
}

impl SpecCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a cache from an initial set of specs. Later duplicates must
    /// match earlier ones.
    pub fn from_specs(specs: impl IntoIterator<Item = VenueSpec>) -> RiskResult<Self> {
        let cache = Self::new();
        for spec in specs {
            cache.update(spec)?;
        }
        Ok(cache)
    }

    pub fn get(&self, symbol: &str) -> Option<VenueSpec> {
        self.specs.get(symbol).map(|entry| entry.spec.clone())
    }

    /// Like [`get`](Self::get) but an error when the symbol is unknown.
    pub fn require(&self, symbol: &str) -> RiskResult<VenueSpec> {
        self.get(symbol)
            .ok_or_else(|| RiskError::UnknownSymbol(symbol.to_string()))
    }

    /// Insert or refresh a spec.
    ///
    /// Returns `Err(SpecChanged)` and keeps the cached spec if lot bounds
    /// or step changed. A margin change alone is applied.
    pub fn update(&self, spec: VenueSpec) -> RiskResult<()> {
        let symbol = spec.symbol().to_string();
        let version = match self.specs.get(&symbol) {
            Some(existing) => {
                if existing.spec.has_material_change(&spec) {
                    let detail = format!(
                        "min_lot {}->{}, lot_step {}->{}, max_lot {}->{}",
                        existing.spec.min_lot(),
                        spec.min_lot(),
                        existing.spec.lot_step(),
                        spec.lot_step(),
                        existing.spec.max_lot(),
                        spec.max_lot()
                    );
                    error!(symbol = %symbol, %detail, "VENUE SPEC CHANGE DETECTED");
                    return Err(RiskError::SpecChanged { symbol, detail });
                }
                existing.version + 1
            }
            None => 1,
        };

        debug!(symbol = %symbol, version, "Venue spec cached");
        self.specs.insert(
            symbol,
            SpecCacheEntry {
                spec,
                last_update: Utc::now(),
                version,
            },
        );
        Ok(())
    }

    pub fn version(&self, symbol: &str) -> Option<u64> {
        self.specs.get(symbol).map(|entry| entry.version)
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.specs.iter().map(|e| e.key().clone()).collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }
}
