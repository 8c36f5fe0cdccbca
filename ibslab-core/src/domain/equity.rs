//! Equity curve points and chart candles.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use super::Bar;

/// Portfolio value at one bar close.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub date: NaiveDate,
    /// Cash plus the liquidation value of any open position.
    pub value: f64,
    /// Percentage below the running peak. Never negative.
    pub drawdown: f64,
}

/// Chart-friendly projection of a bar: UNIX seconds at UTC midnight plus OHLCV.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl From<&Bar> for Candle {
    fn from(bar: &Bar) -> Self {
        Self {
            time: bar.date.and_time(NaiveTime::MIN).and_utc().timestamp(),
            open: bar.open,
            high: bar.high,
            low: bar.low,
            close: bar.close,
            volume: bar.volume,
        }
    }
}

/// Project bars into candles, one per bar, same order.
pub fn to_candles(bars: &[Bar]) -> Vec<Candle> {
    bars.iter().map(Candle::from).collect()
}
