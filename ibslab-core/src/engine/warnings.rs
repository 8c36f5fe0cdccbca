//! Non-fatal conditions raised during a run.
//!
//! The engine never aborts on these. They are collected in the run result and
//! the caller decides where to report them.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EngineWarning {
    /// `low_ibs` is high enough to enter on most bars.
    PermissiveLowIbs { low_ibs: f64 },
    /// Entry threshold at or above exit threshold.
    OverlappingThresholds { low_ibs: f64, high_ibs: f64 },
    /// Next-open entry signalled on the final bar: there is no next open, so
    /// the entry fell back to that bar's close.
    NextOpenUnavailable { date: NaiveDate },
    /// Close entry signalled on the final bar; nothing left to hold it through.
    EntryOnFinalBar { date: NaiveDate },
    /// Entry signal that could not be sized into one whole share.
    UnaffordableEntry {
        date: NaiveDate,
        price: f64,
        cash: f64,
    },
}

impl fmt::Display for EngineWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineWarning::PermissiveLowIbs { low_ibs } => {
                write!(f, "low_ibs={low_ibs} is permissive; entries will fire on most bars")
            }
            EngineWarning::OverlappingThresholds { low_ibs, high_ibs } => write!(
                f,
                "low_ibs={low_ibs} is not below high_ibs={high_ibs}; entry and exit zones overlap"
            ),
            EngineWarning::NextOpenUnavailable { date } => write!(
                f,
                "{date}: next-open entry on final bar, no next bar to fill; filled at close"
            ),
            EngineWarning::EntryOnFinalBar { date } => {
                write!(f, "{date}: entry signal on final bar ignored")
            }
            EngineWarning::UnaffordableEntry { date, price, cash } => write!(
                f,
                "{date}: entry at {price:.4} sizes to zero shares with cash {cash:.2}"
            ),
        }
    }
}
