//! Bar-by-bar fold — the heart of the backtesting engine.
//!
//! Each bar runs three phases against the state returned by the previous bar:
//! 1. Fill: a pending next-open entry buys at this bar's open.
//! 2. Decide: while long, check the exits; while flat, check the entry.
//! 3. Mark: record the equity point at this bar's close.
//!
//! The engine only ever holds one long position. A bar that closes a position
//! does not open a new one, and nothing is still open after the final bar: a
//! close entry is skipped there, and a next-open entry with no next bar fills
//! at the final close and is liquidated at once.

use crate::domain::{to_candles, Bar, ExitReason, Trade, TradeContext};
use crate::indicators::{ibs_series, NEUTRAL_IBS};

use super::config::{EntryExecution, ExecutionOptions, StrategyConfig, PERMISSIVE_LOW_IBS};
use super::cost_model::size_position;
use super::state::{PendingEntry, Position, PositionState, RunResult, SimState};
use super::warnings::EngineWarning;

/// Read-only inputs shared by every step of one run.
struct SimContext<'a> {
    bars: &'a [Bar],
    ibs: &'a [f64],
    strategy: &'a StrategyConfig,
    options: &'a ExecutionOptions,
}

impl SimContext<'_> {
    fn ibs(&self, i: usize) -> f64 {
        self.ibs.get(i).copied().unwrap_or(NEUTRAL_IBS)
    }

    fn is_last(&self, i: usize) -> bool {
        i + 1 == self.bars.len()
    }
}

/// Run the IBS rule over bars that are already split-adjusted, computing IBS
/// internally.
pub fn run_ibs_backtest(
    bars: &[Bar],
    strategy: &StrategyConfig,
    options: &ExecutionOptions,
) -> RunResult {
    let ibs = ibs_series(bars);
    run_backtest(bars, &ibs, strategy, options)
}

/// Run the IBS rule over `bars` with a precomputed IBS series.
///
/// `ibs` must be index-aligned with `bars`; missing entries read as neutral.
/// Deterministic and free of I/O: the same inputs always give the same result.
pub fn run_backtest(
    bars: &[Bar],
    ibs: &[f64],
    strategy: &StrategyConfig,
    options: &ExecutionOptions,
) -> RunResult {
    debug_assert_eq!(bars.len(), ibs.len(), "ibs series must match bars");

    let ctx = SimContext {
        bars,
        ibs,
        strategy,
        options,
    };

    let mut initial = SimState::new(strategy.initial_capital, bars.len());
    initial.warnings = config_warnings(strategy);

    let state = (0..bars.len()).fold(initial, |state, i| state.step(&ctx, i));

    RunResult {
        trades: state.trades,
        equity: state.equity,
        chart_data: to_candles(bars),
        warnings: state.warnings,
        final_cash: state.cash,
        bar_count: bars.len(),
        bars_in_market: state.bars_in_market,
    }
}

/// Suspicious but legal parameter combinations.
fn config_warnings(strategy: &StrategyConfig) -> Vec<EngineWarning> {
    let mut warnings = Vec::new();
    if strategy.low_ibs >= PERMISSIVE_LOW_IBS {
        warnings.push(EngineWarning::PermissiveLowIbs {
            low_ibs: strategy.low_ibs,
        });
    }
    if strategy.low_ibs >= strategy.high_ibs {
        warnings.push(EngineWarning::OverlappingThresholds {
            low_ibs: strategy.low_ibs,
            high_ibs: strategy.high_ibs,
        });
    }
    warnings
}

impl SimState {
    fn step(mut self, ctx: &SimContext<'_>, i: usize) -> Self {
        let bar = &ctx.bars[i];

        // ── Phase 1: fill pending next-open entry ──
        if let Some(pending) = self.pending_entry.take() {
            self.open_position(ctx, i, bar.open, pending.signal_ibs);
        }

        // ── Phase 2: exits while long, entries while flat ──
        match std::mem::take(&mut self.position) {
            PositionState::Long(pos) => match exit_reason(ctx, &pos, i) {
                Some(reason) => self.close_position(ctx, pos, i, reason),
                None => self.position = PositionState::Long(pos),
            },
            PositionState::Flat => {
                if ctx.ibs(i) < ctx.strategy.low_ibs {
                    self.on_entry_signal(ctx, i);
                }
            }
        }

        // ── Phase 3: mark-to-market ──
        self.record_equity(bar.date, bar.close, &ctx.strategy.commission);
        self
    }

    fn on_entry_signal(&mut self, ctx: &SimContext<'_>, i: usize) {
        let date = ctx.bars[i].date;
        let signal_ibs = ctx.ibs(i);

        match ctx.options.entry_execution {
            EntryExecution::Close if ctx.is_last(i) => {
                self.warnings.push(EngineWarning::EntryOnFinalBar { date });
            }
            EntryExecution::Close => {
                self.open_position(ctx, i, ctx.bars[i].close, signal_ibs);
            }
            // No next open: fill at this close and liquidate on the same bar.
            EntryExecution::NextOpen if ctx.is_last(i) => {
                self.warnings.push(EngineWarning::NextOpenUnavailable { date });
                self.open_position(ctx, i, ctx.bars[i].close, signal_ibs);
                if let PositionState::Long(pos) = std::mem::take(&mut self.position) {
                    let reason = exit_reason(ctx, &pos, i).unwrap_or(ExitReason::EndOfData);
                    self.close_position(ctx, pos, i, reason);
                }
            }
            EntryExecution::NextOpen => {
                self.pending_entry = Some(PendingEntry { signal_ibs });
            }
        }
    }

    fn open_position(&mut self, ctx: &SimContext<'_>, i: usize, price: f64, signal_ibs: f64) {
        let strategy = ctx.strategy;
        let date = ctx.bars[i].date;
        let quantity = size_position(
            self.cash,
            strategy.capital_usage,
            price,
            &strategy.commission,
        );
        if quantity <= 0.0 {
            self.warnings.push(EngineWarning::UnaffordableEntry {
                date,
                price,
                cash: self.cash,
            });
            return;
        }

        let notional = quantity * price;
        let entry_commission = strategy.commission.charge(notional);
        self.cash -= notional + entry_commission;
        self.position = PositionState::Long(Position {
            entry_date: date,
            entry_price: price,
            quantity,
            entry_index: i,
            entry_ibs: signal_ibs,
            entry_commission,
        });
    }

    fn close_position(&mut self, ctx: &SimContext<'_>, pos: Position, i: usize, reason: ExitReason) {
        let bar = &ctx.bars[i];
        let exit_price = bar.close;
        let notional = pos.quantity * exit_price;
        let exit_commission = ctx.strategy.commission.charge(notional);
        self.cash += notional - exit_commission;

        let gross_pnl = pos.quantity * (exit_price - pos.entry_price);
        let commission = pos.entry_commission + exit_commission;
        let pnl = gross_pnl - commission;
        let cost_basis = pos.quantity * pos.entry_price;
        let pnl_percent = if cost_basis > 0.0 {
            pnl / cost_basis * 100.0
        } else {
            0.0
        };

        self.trades.push(Trade {
            entry_date: pos.entry_date,
            exit_date: bar.date,
            entry_price: pos.entry_price,
            exit_price,
            quantity: pos.quantity,
            pnl,
            pnl_percent,
            duration: (bar.date - pos.entry_date).num_days(),
            exit_reason: reason,
            context: TradeContext {
                entry_bar: pos.entry_index,
                exit_bar: i,
                bars_held: i - pos.entry_index,
                entry_ibs: pos.entry_ibs,
                exit_ibs: ctx.ibs(i),
                gross_pnl,
                commission,
            },
        });
    }
}

/// Exit decision for an open position on bar `i`, in priority order:
/// IBS signal, then holding period, then the final-bar liquidation.
fn exit_reason(ctx: &SimContext<'_>, pos: &Position, i: usize) -> Option<ExitReason> {
    // Same-bar round trips only for next-open entries, which fill at the open.
    let can_exit = i > pos.entry_index
        || (i == pos.entry_index && ctx.options.entry_execution == EntryExecution::NextOpen);
    if !can_exit {
        return None;
    }

    let bar = &ctx.bars[i];
    let strategy = ctx.strategy;

    let ibs_exit = ctx.ibs(i) > strategy.high_ibs
        && (!ctx.options.ibs_exit_require_above_entry || bar.close > pos.entry_price);
    if ibs_exit {
        return Some(ExitReason::IbsSignal);
    }

    if !ctx.options.ignore_max_hold_days_exit {
        let held_days = (bar.date - pos.entry_date).num_days();
        if held_days >= i64::from(strategy.max_hold_days) {
            return Some(ExitReason::MaxHoldDays);
        }
    }

    if ctx.is_last(i) {
        return Some(ExitReason::EndOfData);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Bar;
    use crate::engine::cost_model::CommissionModel;
    use chrono::{Duration, NaiveDate};

    /// Bar on `day` days after 2024-01-01 with range [10, 20] and the close
    /// placed at the requested IBS.
    fn bar_at(day: i64, ibs: f64) -> Bar {
        let date = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(day);
        Bar {
            date,
            open: 15.0,
            high: 20.0,
            low: 10.0,
            close: 10.0 + 10.0 * ibs,
            adj_close: None,
            volume: 1000.0,
        }
    }

    fn bars_from(ibs: &[f64]) -> Vec<Bar> {
        ibs.iter()
            .enumerate()
            .map(|(i, &v)| bar_at(i as i64, v))
            .collect()
    }

    fn strategy() -> StrategyConfig {
        StrategyConfig {
            low_ibs: 0.1,
            high_ibs: 0.75,
            max_hold_days: 30,
            initial_capital: 10_000.0,
            capital_usage: 100.0,
            commission: CommissionModel::frictionless(),
        }
    }

    #[test]
    fn empty_input_gives_empty_result() {
        let result = run_ibs_backtest(&[], &strategy(), &ExecutionOptions::default());
        assert!(result.trades.is_empty());
        assert!(result.equity.is_empty());
        assert!(result.chart_data.is_empty());
        assert_eq!(result.final_cash, 10_000.0);
    }

    #[test]
    fn single_bar_never_trades() {
        let bars = bars_from(&[0.0]);
        let result = run_ibs_backtest(&bars, &strategy(), &ExecutionOptions::default());
        assert!(result.trades.is_empty());
        assert_eq!(result.equity.len(), 1);
        assert_eq!(result.equity[0].value, 10_000.0);
        assert_eq!(
            result.warnings,
            vec![EngineWarning::EntryOnFinalBar { date: bars[0].date }]
        );
    }

    #[test]
    fn close_entry_and_ibs_exit() {
        // Enter day 1 at close 10.5 (ibs 0.05), exit day 3 at close 19 (ibs 0.9).
        let bars = bars_from(&[0.5, 0.05, 0.5, 0.9, 0.5]);
        let result = run_ibs_backtest(&bars, &strategy(), &ExecutionOptions::default());

        assert_eq!(result.trades.len(), 1);
        let t = &result.trades[0];
        assert_eq!(t.entry_date, bars[1].date);
        assert_eq!(t.exit_date, bars[3].date);
        assert_eq!(t.entry_price, 10.5);
        assert_eq!(t.exit_price, 19.0);
        // floor(10_000 / 10.5) = 952
        assert_eq!(t.quantity, 952.0);
        assert!((t.pnl - 952.0 * 8.5).abs() < 1e-9);
        assert_eq!(t.exit_reason, ExitReason::IbsSignal);
        assert_eq!(t.duration, 2);
        assert_eq!(t.context.bars_held, 2);
        assert!((t.context.entry_ibs - 0.05).abs() < 1e-12);
        assert!((result.final_cash - (10_000.0 + t.pnl)).abs() < 1e-9);
    }

    #[test]
    fn entry_bar_does_not_exit_for_close_execution() {
        // Day 1 signal; day 2 is above high_ibs and exits.
        let bars = bars_from(&[0.5, 0.05, 0.8, 0.5]);
        let result = run_ibs_backtest(&bars, &strategy(), &ExecutionOptions::default());
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_date, bars[2].date);
    }

    #[test]
    fn next_open_entry_fills_at_following_open() {
        let mut bars = bars_from(&[0.05, 0.5, 0.5, 0.9]);
        bars[1].open = 12.0;
        let opts = ExecutionOptions {
            entry_execution: EntryExecution::NextOpen,
            ..Default::default()
        };
        let result = run_ibs_backtest(&bars, &strategy(), &opts);

        assert_eq!(result.trades.len(), 1);
        let t = &result.trades[0];
        assert_eq!(t.entry_date, bars[1].date);
        assert_eq!(t.entry_price, 12.0);
        assert_eq!(t.context.entry_bar, 1);
        assert_eq!(t.exit_date, bars[3].date);
        // Signal IBS, not the fill bar's IBS
        assert!((t.context.entry_ibs - 0.05).abs() < 1e-12);
    }

    #[test]
    fn next_open_allows_same_bar_round_trip() {
        let mut bars = bars_from(&[0.05, 0.9, 0.5]);
        bars[1].open = 11.0;
        let opts = ExecutionOptions {
            entry_execution: EntryExecution::NextOpen,
            ..Default::default()
        };
        let result = run_ibs_backtest(&bars, &strategy(), &opts);

        assert_eq!(result.trades.len(), 1);
        let t = &result.trades[0];
        assert_eq!(t.entry_date, t.exit_date);
        assert_eq!(t.duration, 0);
        assert_eq!(t.entry_price, 11.0);
        assert_eq!(t.exit_price, 19.0);
        assert_eq!(t.exit_reason, ExitReason::IbsSignal);
    }

    #[test]
    fn next_open_signal_on_final_bar_falls_back_to_close() {
        let bars = bars_from(&[0.5, 0.5, 0.05]);
        let opts = ExecutionOptions {
            entry_execution: EntryExecution::NextOpen,
            ..Default::default()
        };
        let result = run_ibs_backtest(&bars, &strategy(), &opts);
        assert_eq!(
            result.warnings,
            vec![EngineWarning::NextOpenUnavailable { date: bars[2].date }]
        );

        assert_eq!(result.trades.len(), 1);
        let t = &result.trades[0];
        assert_eq!(t.entry_date, bars[2].date);
        assert_eq!(t.exit_date, bars[2].date);
        assert_eq!(t.entry_price, bars[2].close);
        assert_eq!(t.exit_price, bars[2].close);
        assert_eq!(t.exit_reason, ExitReason::EndOfData);
        assert_eq!(t.context.bars_held, 0);
        assert_eq!(t.pnl, 0.0);
        assert_eq!(result.final_cash, 10_000.0);
        assert_eq!(result.equity[2].value, result.final_cash);
    }

    #[test]
    fn final_bar_fallback_pays_both_commissions() {
        let mut s = strategy();
        s.commission = CommissionModel::Fixed { amount: 5.0 };
        let bars = bars_from(&[0.5, 0.05]);
        let opts = ExecutionOptions {
            entry_execution: EntryExecution::NextOpen,
            ..Default::default()
        };
        let result = run_ibs_backtest(&bars, &s, &opts);

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].pnl, -10.0);
        assert!((result.final_cash - 9_990.0).abs() < 1e-9);
        assert_eq!(result.equity[1].value, result.final_cash);
    }

    #[test]
    fn single_bar_next_open_signal_round_trips_at_close() {
        let bars = bars_from(&[0.0]);
        let opts = ExecutionOptions {
            entry_execution: EntryExecution::NextOpen,
            ..Default::default()
        };
        let result = run_ibs_backtest(&bars, &strategy(), &opts);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.equity.len(), 1);
        assert_eq!(result.equity[0].value, 10_000.0);
    }

    #[test]
    fn max_hold_days_exit() {
        // Entry day 1, then bars every 10 days never above high_ibs.
        let mut bars = vec![bar_at(0, 0.5), bar_at(1, 0.0)];
        for k in 1..=5 {
            bars.push(bar_at(1 + 10 * k, 0.5));
        }
        let result = run_ibs_backtest(&bars, &strategy(), &ExecutionOptions::default());

        assert_eq!(result.trades.len(), 1);
        let t = &result.trades[0];
        assert_eq!(t.exit_reason, ExitReason::MaxHoldDays);
        assert_eq!(t.duration, 30);
        assert_eq!(t.exit_date, bars[4].date);
    }

    #[test]
    fn ignore_max_hold_days_runs_to_end_of_data() {
        let mut bars = vec![bar_at(0, 0.5), bar_at(1, 0.0)];
        for k in 1..=5 {
            bars.push(bar_at(1 + 10 * k, 0.5));
        }
        let opts = ExecutionOptions {
            ignore_max_hold_days_exit: true,
            ..Default::default()
        };
        let result = run_ibs_backtest(&bars, &strategy(), &opts);

        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::EndOfData);
        assert_eq!(result.trades[0].exit_date, bars.last().unwrap().date);
    }

    #[test]
    fn final_bar_reason_prefers_real_exit_condition() {
        let bars = bars_from(&[0.05, 0.5, 0.9]);
        let result = run_ibs_backtest(&bars, &strategy(), &ExecutionOptions::default());
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_reason, ExitReason::IbsSignal);
    }

    #[test]
    fn require_above_entry_blocks_losing_ibs_exit() {
        // Entry at close 10.5; day 2 has ibs 0.8 but the whole bar sits lower.
        let mut bars = bars_from(&[0.05, 0.8, 0.9, 0.5]);
        bars[1].high = 10.0;
        bars[1].low = 5.0;
        bars[1].close = 9.0; // ibs 0.8 below entry
        let opts = ExecutionOptions {
            ibs_exit_require_above_entry: true,
            ..Default::default()
        };
        let result = run_ibs_backtest(&bars, &strategy(), &opts);
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_date, bars[2].date);
        assert!(result.trades[0].exit_price > result.trades[0].entry_price);

        // Without the flag it exits at a loss on day 1.
        let result = run_ibs_backtest(&bars, &strategy(), &ExecutionOptions::default());
        assert_eq!(result.trades[0].exit_date, bars[1].date);
        assert!(result.trades[0].pnl < 0.0);
    }

    #[test]
    fn exit_bar_does_not_reenter() {
        // Day 2 exits by time and also has ibs < low_ibs.
        let mut s = strategy();
        s.max_hold_days = 1;
        let bars = bars_from(&[0.05, 0.05, 0.5, 0.5]);
        let result = run_ibs_backtest(&bars, &s, &ExecutionOptions::default());
        assert_eq!(result.trades.len(), 1);
        assert_eq!(result.trades[0].exit_date, bars[1].date);
        assert_eq!(result.trades[0].exit_reason, ExitReason::MaxHoldDays);
    }

    #[test]
    fn zero_capital_usage_never_trades() {
        let mut s = strategy();
        s.capital_usage = 0.0;
        let bars = bars_from(&[0.05, 0.5, 0.02, 0.9, 0.0, 0.5]);
        let result = run_ibs_backtest(&bars, &s, &ExecutionOptions::default());
        assert!(result.trades.is_empty());
        assert!(result.equity.iter().all(|p| p.value == 10_000.0));
        assert!(result
            .warnings
            .iter()
            .all(|w| matches!(w, EngineWarning::UnaffordableEntry { .. })));
        assert_eq!(result.warnings.len(), 3);
    }

    #[test]
    fn commission_is_deducted_from_pnl_and_cash() {
        let mut s = strategy();
        s.commission = CommissionModel::Fixed { amount: 5.0 };
        let bars = bars_from(&[0.5, 0.05, 0.9, 0.5]);
        let result = run_ibs_backtest(&bars, &s, &ExecutionOptions::default());

        let t = &result.trades[0];
        assert_eq!(t.context.commission, 10.0);
        assert!((t.pnl - (t.context.gross_pnl - 10.0)).abs() < 1e-9);
        assert!((result.final_cash - (10_000.0 + t.pnl)).abs() < 1e-9);
        // Last bar is flat: equity equals cash
        assert!((result.equity.last().unwrap().value - result.final_cash).abs() < 1e-9);
    }

    #[test]
    fn open_position_is_marked_net_of_exit_commission() {
        let mut s = strategy();
        s.commission = CommissionModel::Fixed { amount: 5.0 };
        let bars = bars_from(&[0.05, 0.5, 0.5]);
        let result = run_ibs_backtest(&bars, &s, &ExecutionOptions::default());

        let t = &result.trades[0];
        let expected_day1 = result.final_cash - t.pnl
            + (-(t.quantity * t.entry_price) - 5.0)
            + t.quantity * bars[1].close
            - 5.0;
        assert!((result.equity[1].value - expected_day1).abs() < 1e-9);
    }

    #[test]
    fn equity_has_one_point_per_bar() {
        let bars = bars_from(&[0.5, 0.05, 0.3, 0.9, 0.02, 0.6, 0.95]);
        let result = run_ibs_backtest(&bars, &strategy(), &ExecutionOptions::default());
        assert_eq!(result.equity.len(), bars.len());
        assert_eq!(result.chart_data.len(), bars.len());
        assert_eq!(result.equity[0].drawdown, 0.0);
        for (point, bar) in result.equity.iter().zip(&bars) {
            assert_eq!(point.date, bar.date);
            assert!(point.drawdown >= 0.0);
        }
        assert_eq!(result.trades.len(), 2);
    }

    #[test]
    fn config_warnings_are_reported_first() {
        let mut s = strategy();
        s.low_ibs = 0.8;
        s.high_ibs = 0.7;
        let result = run_ibs_backtest(&[], &s, &ExecutionOptions::default());
        assert_eq!(
            result.warnings,
            vec![
                EngineWarning::PermissiveLowIbs { low_ibs: 0.8 },
                EngineWarning::OverlappingThresholds {
                    low_ibs: 0.8,
                    high_ibs: 0.7
                },
            ]
        );
    }

    #[test]
    fn flat_bars_never_signal() {
        let mut bars = bars_from(&[0.5, 0.5, 0.5]);
        for b in &mut bars {
            b.high = 15.0;
            b.low = 15.0;
            b.close = 15.0;
        }
        let result = run_ibs_backtest(&bars, &strategy(), &ExecutionOptions::default());
        assert!(result.trades.is_empty());
        assert!(result.warnings.is_empty());
    }

    #[test]
    fn identical_inputs_give_identical_results() {
        let bars = bars_from(&[0.5, 0.05, 0.3, 0.9, 0.02, 0.6, 0.95]);
        let a = run_ibs_backtest(&bars, &strategy(), &ExecutionOptions::default());
        let b = run_ibs_backtest(&bars, &strategy(), &ExecutionOptions::default());
        assert_eq!(a.trades, b.trades);
        assert_eq!(a.equity, b.equity);
    }
}
