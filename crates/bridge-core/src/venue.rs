//! Venue symbol specification.
//!
//! Symbol metadata (lot bounds and step) is supplied by the venue and is
//! treated as read-only input. A spec is validated once when built so the
//! sizing code can rely on its invariants.

use crate::error::{CoreError, Result};
use crate::{Lots, Money};
use serde::{Deserialize, Serialize};

/// Lot constraints for one tradable symbol.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawVenueSpec", into = "RawVenueSpec")]
pub struct VenueSpec {
    symbol: String,
    min_lot: Lots,
    lot_step: Lots,
    max_lot: Lots,
    margin_per_lot: Money,
    max_lot_on_grid: Lots,
}

impl VenueSpec {
    /// Build a validated spec.
    ///
    /// Requires a positive step, `0 < min_lot <= max_lot`, `min_lot` on the
    /// step grid, a `max_lot` whose step count fits in a `Decimal`, and a
    /// positive margin per lot.
    pub fn new(
        symbol: impl Into<String>,
        min_lot: Lots,
        lot_step: Lots,
        max_lot: Lots,
        margin_per_lot: Money,
    ) -> Result<Self> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(CoreError::InvalidSpec("symbol must not be empty".to_string()));
        }
        if !lot_step.is_positive() {
            return Err(CoreError::InvalidSpec(format!(
                "{symbol}: lot_step must be positive, got {lot_step}"
            )));
        }
        if !min_lot.is_positive() || min_lot > max_lot {
            return Err(CoreError::InvalidSpec(format!(
                "{symbol}: require 0 < min_lot <= max_lot, got min={min_lot} max={max_lot}"
            )));
        }
        if !min_lot.is_multiple_of(lot_step) {
            return Err(CoreError::InvalidSpec(format!(
                "{symbol}: min_lot {min_lot} is not a multiple of lot_step {lot_step}"
            )));
        }
        if !margin_per_lot.is_positive() {
            return Err(CoreError::InvalidSpec(format!(
                "{symbol}: margin_per_lot must be positive, got {margin_per_lot}"
            )));
        }
        let max_lot_on_grid = max_lot.floor_to_step(lot_step).ok_or_else(|| {
            CoreError::InvalidSpec(format!(
                "{symbol}: max_lot {max_lot} is out of range for lot_step {lot_step}"
            ))
        })?;

        Ok(Self {
            symbol,
            min_lot,
            lot_step,
            max_lot,
            margin_per_lot,
            max_lot_on_grid,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn min_lot(&self) -> Lots {
        self.min_lot
    }

    pub fn lot_step(&self) -> Lots {
        self.lot_step
    }

    pub fn max_lot(&self) -> Lots {
        self.max_lot
    }

    /// Largest volume on the step grid that does not exceed `max_lot`.
    pub fn max_lot_on_grid(&self) -> Lots {
        self.max_lot_on_grid
    }

    /// Account currency committed per lot; converts a money budget to lots.
    pub fn margin_per_lot(&self) -> Money {
        self.margin_per_lot
    }

    /// Check whether a refreshed spec moves the lot grid or its bounds.
    ///
    /// Margin per lot is not material: it only scales probability-based
    /// sizing and is refreshed in place.
    pub fn has_material_change(&self, other: &Self) -> bool {
        self.min_lot != other.min_lot
            || self.lot_step != other.lot_step
            || self.max_lot != other.max_lot
    }
}

/// Unvalidated wire/config form of [`VenueSpec`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawVenueSpec {
    pub symbol: String,
    pub min_lot: Lots,
    pub lot_step: Lots,
    pub max_lot: Lots,
    pub margin_per_lot: Money,
}

impl TryFrom<RawVenueSpec> for VenueSpec {
    type Error = CoreError;

    fn try_from(raw: RawVenueSpec) -> Result<Self> {
        Self::new(
            raw.symbol,
            raw.min_lot,
            raw.lot_step,
            raw.max_lot,
            raw.margin_per_lot,
        )
    }
}

impl From<VenueSpec> for RawVenueSpec {
    fn from(spec: VenueSpec) -> Self {
        Self {
            symbol: spec.symbol,
            min_lot: spec.min_lot,
            lot_step: spec.lot_step,
            max_lot: spec.max_lot,
            margin_per_lot: spec.margin_per_lot,
        }
    }
}
