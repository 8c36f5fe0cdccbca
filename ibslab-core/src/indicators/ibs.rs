//! Internal Bar Strength (IBS).
//!
//! `(close - low) / (high - low)`: where the close sits inside the day's range,
//! 0 at the low and 1 at the high. No lookback.
//!
//! A flat bar (`high == low`) has no range. It maps to the neutral 0.5 so it
//! can never trip an entry (`< low_ibs`) or exit (`> high_ibs`) threshold on its
//! own. Void bars (NaN fields) map to 0.5 as well.

use crate::domain::Bar;

/// IBS value for a bar with no usable range.
pub const NEUTRAL_IBS: f64 = 0.5;

/// IBS of a single bar, always in `[0, 1]`.
pub fn ibs_value(bar: &Bar) -> f64 {
    let range = bar.high - bar.low;
    if bar.is_void() || range == 0.0 || !range.is_finite() {
        return NEUTRAL_IBS;
    }
    ((bar.close - bar.low) / range).clamp(0.0, 1.0)
}

/// IBS for every bar, same length and order as `bars`.
pub fn ibs_series(bars: &[Bar]) -> Vec<f64> {
    bars.iter().map(ibs_value).collect()
}
