//! SplitEvent — a stock split on a given date.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A split effective on `date`.
///
/// `factor > 1` is a forward split (2.0 = 2-for-1), `factor < 1` a reverse
/// split (0.1 = 1-for-10). Factors of exactly 1 or <= 0 carry no adjustment.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SplitEvent {
    pub date: NaiveDate,
    pub factor: f64,
}

impl SplitEvent {
    pub fn new(date: NaiveDate, factor: f64) -> Self {
        Self { date, factor }
    }

    /// Whether this event changes prices at all.
    pub fn is_effective(&self) -> bool {
        self.factor.is_finite() && self.factor > 0.0 && self.factor != 1.0
    }
}
