//! Property tests for the metrics calculator.
//!
//! 1. Profit factor: infinite iff nothing lost and something won; zero iff nothing won
//! 2. No metric is ever NaN, whatever the equity curve and trades
//! 3. Sweep over synthetic data: parallel == sequential

use chrono::{Duration, NaiveDate};
use proptest::prelude::*;

use ibslab_core::domain::{EquityPoint, ExitReason, Trade, TradeContext};
use ibslab_runner::metrics::{profit_factor, MarketAssumptions, PerformanceMetrics};
use ibslab_runner::{synthetic_bars, MarketData, ParamGrid, ParamSweep, BacktestConfig};

fn base() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap()
}

fn trade(pnl: f64) -> Trade {
    Trade {
        entry_date: base(),
        exit_date: base() + Duration::days(3),
        entry_price: 10.0,
        exit_price: 10.0 + pnl / 100.0,
        quantity: 100.0,
        pnl,
        pnl_percent: pnl / 10.0,
        duration: 3,
        exit_reason: ExitReason::IbsSignal,
        context: TradeContext {
            entry_bar: 0,
            exit_bar: 3,
            bars_held: 3,
            entry_ibs: 0.05,
            exit_ibs: 0.8,
            gross_pnl: pnl,
            commission: 0.0,
        },
    }
}

fn arb_pnl() -> impl Strategy<Value = f64> {
    prop_oneof![
        1 => Just(0.0),
        4 => -500.0..500.0_f64,
    ]
}

fn arb_equity() -> impl Strategy<Value = Vec<EquityPoint>> {
    prop::collection::vec(prop_oneof![1 => Just(0.0), 9 => 0.0..20_000.0_f64], 0..300).prop_map(
        |values| {
            let mut peak = f64::NEG_INFINITY;
            values
                .into_iter()
                .enumerate()
                .map(|(i, value)| {
                    peak = peak.max(value);
                    let drawdown = if peak > 0.0 {
                        ((peak - value) / peak * 100.0).max(0.0)
                    } else {
                        0.0
                    };
                    EquityPoint {
                        date: base() + Duration::days(i as i64 * 2),
                        value,
                        drawdown,
                    }
                })
                .collect()
        },
    )
}

proptest! {
    #[test]
    fn profit_factor_edge_rules(pnls in prop::collection::vec(arb_pnl(), 0..30)) {
        let trades: Vec<Trade> = pnls.iter().map(|&p| trade(p)).collect();
        let gross_profit: f64 = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).sum();
        let gross_loss: f64 = trades.iter().filter(|t| t.is_loser()).map(|t| -t.pnl).sum();
        let pf = profit_factor(&trades);

        prop_assert_eq!(pf == f64::INFINITY, gross_loss == 0.0 && gross_profit > 0.0);
        prop_assert_eq!(pf == 0.0, gross_profit == 0.0);
        prop_assert!(pf >= 0.0);
    }

    #[test]
    fn metrics_are_never_nan(
        equity in arb_equity(),
        pnls in prop::collection::vec(arb_pnl(), 0..30),
        initial in prop_oneof![Just(10_000.0), 1.0..50_000.0_f64],
    ) {
        let trades: Vec<Trade> = pnls.iter().map(|&p| trade(p)).collect();
        let m = PerformanceMetrics::compute(
            &trades,
            &equity,
            initial,
            None,
            &MarketAssumptions::default(),
        );
        for (name, value) in m.float_fields() {
            prop_assert!(!value.is_nan(), "{} is NaN", name);
        }
        prop_assert!(m.average_loss <= 0.0);
        prop_assert!(m.max_drawdown >= 0.0);
        prop_assert!(m.value_at_risk >= 0.0);
        if equity.is_empty() {
            prop_assert_eq!(m, PerformanceMetrics::default());
        }
    }
}

#[test]
fn sweep_parallel_equals_sequential() {
    let data = MarketData::from_bars(synthetic_bars(
        99,
        500,
        NaiveDate::from_ymd_opt(2015, 6, 1).unwrap(),
    ));
    let grid = ParamGrid {
        low_ibs: vec![0.05, 0.1, 0.2],
        high_ibs: vec![0.7, 0.9],
        max_hold_days: vec![3, 15],
    };
    let base = BacktestConfig::default();

    let par = ParamSweep::new(&data).sweep(&grid, &base).unwrap();
    let seq = ParamSweep::new(&data)
        .with_parallelism(false)
        .sweep(&grid, &base)
        .unwrap();

    assert_eq!(par.len(), 12);
    for (a, b) in par.all().iter().zip(seq.all()) {
        assert_eq!(a.config, b.config);
        assert_eq!(a.trades, b.trades);
        assert_eq!(a.metrics, b.metrics);
    }
}
