//! Backtesting engine — a fold over daily bars.
//!
//! The engine consumes split-adjusted bars and a precomputed IBS series and
//! runs the three-phase step for every bar:
//!
//! 1. Fill: pending next-open entries buy at the open
//! 2. Decide: IBS / holding-period exits while long, IBS entry while flat
//! 3. Mark: equity point at the close, drawdown from the running peak

pub mod config;
pub mod cost_model;
pub mod loop_runner;
pub mod state;
pub mod warnings;

pub use config::{EntryExecution, ExecutionOptions, StrategyConfig};
pub use cost_model::{size_position, CommissionModel};
pub use loop_runner::{run_backtest, run_ibs_backtest};
pub use state::{Position, PositionState, RunResult, SimState};
pub use warnings::EngineWarning;
