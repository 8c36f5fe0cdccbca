//! Split back-adjustment.
//!
//! Pre-split history is rescaled so a split does not show up as an overnight
//! price gap. For every bar strictly before a split's date, OHLC is divided by
//! the factor and volume multiplied by it. Multiple splits compound.

use chrono::NaiveDate;

use crate::domain::{Bar, SplitEvent};

/// Return a split-adjusted copy of `bars`.
///
/// Events are applied from most recent to oldest. Events with a factor of 1,
/// a non-positive factor, or a date outside the bar range leave the series
/// unchanged. `adj_close` is not touched: providers already adjust it.
pub fn adjust_for_splits(bars: &[Bar], splits: &[SplitEvent]) -> Vec<Bar> {
    let mut adjusted = bars.to_vec();

    let mut events = events_in_range(bars, splits);
    if events.is_empty() {
        return adjusted;
    }
    events.sort_by(|a, b| b.date.cmp(&a.date));

    for event in events {
        let factor = event.factor;
        for bar in adjusted.iter_mut().take_while(|b| b.date < event.date) {
            bar.open /= factor;
            bar.high /= factor;
            bar.low /= factor;
            bar.close /= factor;
            bar.volume *= factor;
        }
    }

    adjusted
}

/// Cumulative factor applied to the bar on `date`: the product of every
/// effective, in-range split dated after it.
pub fn cumulative_factor(bars: &[Bar], date: NaiveDate, splits: &[SplitEvent]) -> f64 {
    events_in_range(bars, splits)
        .into_iter()
        .filter(|s| date < s.date)
        .map(|s| s.factor)
        .product()
}

/// Effective events that have at least one bar before them and fall on or
/// before the last bar. Anything else would either touch nothing or rescale
/// the whole series.
fn events_in_range<'a>(bars: &[Bar], splits: &'a [SplitEvent]) -> Vec<&'a SplitEvent> {
    let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
        return Vec::new();
    };
    splits
        .iter()
        .filter(|s| s.is_effective() && s.date > first.date && s.date <= last.date)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, make_bars, DEFAULT_EPSILON};

    fn split_on(bars: &[Bar], index: usize, factor: f64) -> SplitEvent {
        SplitEvent::new(bars[index].date, factor)
    }

    #[test]
    fn forward_split_halves_prior_prices_and_doubles_volume() {
        let bars = make_bars(&[200.0, 202.0, 101.0, 102.0]);
        let adjusted = adjust_for_splits(&bars, &[split_on(&bars, 2, 2.0)]);

        assert_approx(adjusted[0].close, 100.0, DEFAULT_EPSILON);
        assert_approx(adjusted[1].close, 101.0, DEFAULT_EPSILON);
        assert_approx(adjusted[1].high, bars[1].high / 2.0, DEFAULT_EPSILON);
        assert_approx(adjusted[1].volume, bars[1].volume * 2.0, DEFAULT_EPSILON);
        // On and after the split date nothing changes
        assert_eq!(adjusted[2], bars[2]);
        assert_eq!(adjusted[3], bars[3]);
    }

    #[test]
    fn reverse_split_scales_prior_prices_up() {
        let bars = make_bars(&[1.0, 1.1, 11.0]);
        let adjusted = adjust_for_splits(&bars, &[split_on(&bars, 2, 0.1)]);
        assert_approx(adjusted[0].close, 10.0, 1e-9);
        assert_approx(adjusted[1].close, 11.0, 1e-9);
        assert_approx(adjusted[1].volume, bars[1].volume * 0.1, 1e-9);
    }

    #[test]
    fn multiple_splits_compound() {
        let bars = make_bars(&[400.0, 200.0, 100.0]);
        let splits = [split_on(&bars, 1, 2.0), split_on(&bars, 2, 2.0)];
        let adjusted = adjust_for_splits(&bars, &splits);
        assert_approx(adjusted[0].close, 100.0, DEFAULT_EPSILON);
        assert_approx(adjusted[1].close, 100.0, DEFAULT_EPSILON);
        assert_approx(adjusted[2].close, 100.0, DEFAULT_EPSILON);
        assert_approx(cumulative_factor(&bars, bars[0].date, &splits), 4.0, DEFAULT_EPSILON);
    }

    #[test]
    fn unit_and_invalid_factors_are_noops() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let splits = [
            split_on(&bars, 1, 1.0),
            split_on(&bars, 1, 0.0),
            split_on(&bars, 2, -3.0),
        ];
        assert_eq!(adjust_for_splits(&bars, &splits), bars);
    }

    #[test]
    fn events_outside_range_are_noops() {
        let bars = make_bars(&[10.0, 11.0, 12.0]);
        let before = SplitEvent::new(NaiveDate::from_ymd_opt(2000, 1, 1).unwrap(), 2.0);
        let on_first = split_on(&bars, 0, 2.0);
        let after = SplitEvent::new(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), 2.0);

        for event in [before, on_first, after] {
            assert_eq!(adjust_for_splits(&bars, &[event]), bars);
            assert_eq!(cumulative_factor(&bars, bars[0].date, &[event]), 1.0);
        }
    }

    #[test]
    fn split_on_last_bar_adjusts_everything_before_it() {
        let bars = make_bars(&[10.0, 11.0, 6.0]);
        let adjusted = adjust_for_splits(&bars, &[split_on(&bars, 2, 2.0)]);
        assert_approx(adjusted[0].close, 5.0, DEFAULT_EPSILON);
        assert_approx(adjusted[1].close, 5.5, DEFAULT_EPSILON);
        assert_eq!(adjusted[2], bars[2]);
    }

    #[test]
    fn out_of_range_event_does_not_disturb_in_range_one() {
        let bars = make_bars(&[200.0, 100.0, 101.0]);
        let after = SplitEvent::new(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap(), 3.0);
        let adjusted = adjust_for_splits(&bars, &[after, split_on(&bars, 1, 2.0)]);
        assert_approx(adjusted[0].close, 100.0, DEFAULT_EPSILON);
        assert_eq!(adjusted[1], bars[1]);
        assert_eq!(adjusted[2], bars[2]);
    }

    #[test]
    fn empty_inputs() {
        assert!(adjust_for_splits(&[], &[]).is_empty());
        let bars = make_bars(&[10.0]);
        assert_eq!(adjust_for_splits(&bars, &[]), bars);
    }

    #[test]
    fn split_gap_disappears_after_adjustment() {
        let bars = make_bars(&[200.0, 100.0]);
        let split = split_on(&bars, 1, 2.0);
        let ratio_before = bars[0].close / bars[1].close;
        let adjusted = adjust_for_splits(&bars, &[split]);
        let ratio_after = adjusted[0].close / adjusted[1].close;
        assert_approx(ratio_before, 2.0, DEFAULT_EPSILON);
        assert_approx(ratio_after, 1.0, DEFAULT_EPSILON);
    }
}
