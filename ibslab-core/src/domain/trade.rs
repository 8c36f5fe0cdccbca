//! Trade — a completed round-trip with its exit reason and context.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A trade only counts as a winner when its net PnL clears this threshold,
/// so float noise around zero is not booked as a win.
pub const WIN_EPSILON: f64 = 1e-9;

/// Why a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// IBS rose above the high threshold.
    IbsSignal,
    /// Calendar days since entry reached the holding limit.
    MaxHoldDays,
    /// Liquidated on the final bar with no other exit condition met.
    EndOfData,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::IbsSignal => "ibs_signal",
            ExitReason::MaxHoldDays => "max_hold_days",
            ExitReason::EndOfData => "end_of_data",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Bar-level detail behind a trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeContext {
    pub entry_bar: usize,
    pub exit_bar: usize,
    /// Sessions between entry and exit. Unlike `Trade::duration` this counts bars,
    /// not calendar days.
    pub bars_held: usize,
    /// IBS of the bar that produced the entry signal.
    pub entry_ibs: f64,
    /// IBS of the exit bar.
    pub exit_ibs: f64,
    /// `quantity * (exit_price - entry_price)`, before commission.
    pub gross_pnl: f64,
    /// Entry plus exit commission.
    pub commission: f64,
}

/// A closed long trade.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_date: NaiveDate,
    pub exit_date: NaiveDate,
    pub entry_price: f64,
    pub exit_price: f64,
    pub quantity: f64,
    /// Net of entry and exit commission.
    pub pnl: f64,
    /// `pnl` as a percentage of the entry notional.
    pub pnl_percent: f64,
    /// Calendar days between entry and exit. This approximates, but is not,
    /// a count of trading sessions.
    pub duration: i64,
    pub exit_reason: ExitReason,
    pub context: TradeContext,
}

impl Trade {
    pub fn is_winner(&self) -> bool {
        self.pnl > WIN_EPSILON
    }

    pub fn is_loser(&self) -> bool {
        self.pnl < 0.0
    }

    /// Entry notional (cost basis before commission).
    pub fn entry_notional(&self) -> f64 {
        self.quantity * self.entry_price
    }
}
