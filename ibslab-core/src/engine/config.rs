//! Strategy parameters and execution options for one engine run.

use serde::{Deserialize, Serialize};

use super::cost_model::CommissionModel;

/// Above this entry threshold the rule buys on more than half of the day's
/// range, which is no longer a mean-reversion entry.
pub const PERMISSIVE_LOW_IBS: f64 = 0.5;

/// Parameters of the IBS mean-reversion rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategyConfig {
    /// Enter when IBS is strictly below this.
    pub low_ibs: f64,
    /// Exit when IBS is strictly above this.
    pub high_ibs: f64,
    /// Calendar days after which a position is closed.
    pub max_hold_days: u32,
    pub initial_capital: f64,
    /// Share of available cash committed per entry, in percent (0-100).
    #[serde(default = "default_capital_usage")]
    pub capital_usage: f64,
    #[serde(default)]
    pub commission: CommissionModel,
}

fn default_capital_usage() -> f64 {
    100.0
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            low_ibs: 0.1,
            high_ibs: 0.75,
            max_hold_days: 30,
            initial_capital: 10_000.0,
            capital_usage: default_capital_usage(),
            commission: CommissionModel::default(),
        }
    }
}

/// Which price an entry signal fills at.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryExecution {
    /// Same bar's close.
    #[default]
    Close,
    /// Next bar's open.
    #[serde(alias = "nextOpen")]
    NextOpen,
}

/// Execution switches layered over the strategy.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionOptions {
    pub entry_execution: EntryExecution,
    /// Disable the max-hold-days time exit.
    pub ignore_max_hold_days_exit: bool,
    /// Only take an IBS exit when the close is above the entry price.
    pub ibs_exit_require_above_entry: bool,
    /// Bars are already split-adjusted upstream; do not apply split events again.
    pub adjusted_for_splits: bool,
}
