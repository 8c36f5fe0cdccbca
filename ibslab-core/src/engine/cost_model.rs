//! Commission model and position sizing.
//!
//! Commission is charged per fill (entry and exit), symmetric across sides.

use serde::{Deserialize, Serialize};

/// Commission charged on every fill.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CommissionModel {
    /// Flat amount per fill.
    Fixed { amount: f64 },
    /// Percentage of fill notional (0.1 = 0.1%).
    Percentage { percent: f64 },
    /// Flat amount plus a percentage of notional.
    Combined { amount: f64, percent: f64 },
}

impl Default for CommissionModel {
    fn default() -> Self {
        CommissionModel::Fixed { amount: 0.0 }
    }
}

impl CommissionModel {
    pub fn frictionless() -> Self {
        Self::default()
    }

    /// Flat component charged regardless of size.
    pub fn fixed_part(&self) -> f64 {
        match *self {
            CommissionModel::Fixed { amount } | CommissionModel::Combined { amount, .. } => amount,
            CommissionModel::Percentage { .. } => 0.0,
        }
    }

    /// Proportional component as a fraction of notional.
    pub fn rate(&self) -> f64 {
        match *self {
            CommissionModel::Percentage { percent } | CommissionModel::Combined { percent, .. } => {
                percent / 100.0
            }
            CommissionModel::Fixed { .. } => 0.0,
        }
    }

    /// Commission for a fill of the given notional.
    pub fn charge(&self, notional: f64) -> f64 {
        self.fixed_part() + notional.abs() * self.rate()
    }
}

/// Whole shares to buy at `price`.
///
/// Starts from `floor(cash * capital_usage_pct / 100 / price)` and caps the
/// result so that notional plus entry commission never exceeds `cash`.
/// Returns 0 when nothing can be bought.
pub fn size_position(
    cash: f64,
    capital_usage_pct: f64,
    price: f64,
    commission: &CommissionModel,
) -> f64 {
    if !(price > 0.0 && price.is_finite() && cash > 0.0 && capital_usage_pct > 0.0) {
        return 0.0;
    }

    let budget = cash * capital_usage_pct / 100.0;
    let mut quantity = (budget / price).floor();

    let affordable = ((cash - commission.fixed_part()) / (price * (1.0 + commission.rate()))).floor();
    quantity = quantity.min(affordable).max(0.0);

    // Float rounding at the boundary
    while quantity > 0.0 && quantity * price + commission.charge(quantity * price) > cash {
        quantity -= 1.0;
    }
    quantity
}
