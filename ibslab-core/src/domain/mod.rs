//! Domain types for IBS Lab

pub mod bar;
pub mod equity;
pub mod split;
pub mod trade;

pub use bar::Bar;
pub use equity::{to_candles, Candle, EquityPoint};
pub use split::SplitEvent;
pub use trade::{ExitReason, Trade, TradeContext, WIN_EPSILON};
