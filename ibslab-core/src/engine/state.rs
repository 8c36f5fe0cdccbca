//! Simulation state threaded through the bar fold, and the run result.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::cost_model::CommissionModel;
use super::warnings::EngineWarning;
use crate::domain::{Candle, EquityPoint, Trade};

/// An open long position. Never escapes the engine.
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    pub entry_date: NaiveDate,
    pub entry_price: f64,
    pub quantity: f64,
    pub entry_index: usize,
    pub entry_ibs: f64,
    pub entry_commission: f64,
}

impl Position {
    /// What the position would fetch if closed at `price` now, net of exit commission.
    pub fn liquidation_value(&self, price: f64, commission: &CommissionModel) -> f64 {
        let notional = self.quantity * price;
        notional - commission.charge(notional)
    }
}

/// Whether the engine currently holds a long.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum PositionState {
    #[default]
    Flat,
    Long(Position),
}

impl PositionState {
    pub fn is_long(&self) -> bool {
        matches!(self, PositionState::Long(_))
    }
}

/// Next-open entry waiting for the following bar.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingEntry {
    /// IBS on the signal bar, recorded as the trade's entry IBS.
    pub signal_ibs: f64,
}

/// Everything the engine carries from one bar to the next.
///
/// Each bar consumes the previous state and returns the next one; nothing
/// outside the value is mutated, so independent runs never interact.
#[derive(Debug, Clone)]
pub struct SimState {
    pub cash: f64,
    /// Highest equity value seen so far. `NEG_INFINITY` before the first bar.
    pub peak: f64,
    pub position: PositionState,
    pub pending_entry: Option<PendingEntry>,
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
    pub warnings: Vec<EngineWarning>,
    /// Bars that closed with a position open.
    pub bars_in_market: usize,
}

impl SimState {
    pub fn new(initial_capital: f64, bar_count: usize) -> Self {
        Self {
            cash: initial_capital,
            peak: f64::NEG_INFINITY,
            position: PositionState::Flat,
            pending_entry: None,
            trades: Vec::new(),
            equity: Vec::with_capacity(bar_count),
            warnings: Vec::new(),
            bars_in_market: 0,
        }
    }

    /// Cash plus liquidation value of the open position at `close`.
    pub fn equity_value(&self, close: f64, commission: &CommissionModel) -> f64 {
        match &self.position {
            PositionState::Flat => self.cash,
            PositionState::Long(pos) => self.cash + pos.liquidation_value(close, commission),
        }
    }

    /// Append the equity point for a bar close and advance the running peak.
    pub fn record_equity(&mut self, date: NaiveDate, close: f64, commission: &CommissionModel) {
        let value = self.equity_value(close, commission);
        if self.position.is_long() {
            self.bars_in_market += 1;
        }
        self.peak = self.peak.max(value);
        let drawdown = if self.peak > 0.0 {
            ((self.peak - value) / self.peak * 100.0).max(0.0)
        } else {
            0.0
        };
        self.equity.push(EquityPoint {
            date,
            value,
            drawdown,
        });
    }
}

/// Result of a complete engine run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    /// Closed trades in exit order.
    pub trades: Vec<Trade>,
    /// One point per input bar.
    pub equity: Vec<EquityPoint>,
    /// Input bars projected for charting.
    pub chart_data: Vec<Candle>,
    pub warnings: Vec<EngineWarning>,
    pub final_cash: f64,
    pub bar_count: usize,
    pub bars_in_market: usize,
}

impl RunResult {
    pub fn final_equity(&self) -> Option<f64> {
        self.equity.last().map(|p| p.value)
    }
}
