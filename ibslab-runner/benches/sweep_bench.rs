//! Criterion benchmarks for the runner.
//!
//! Benchmarks:
//! 1. Single backtest through the runner (split adjust + engine + metrics)
//! 2. Metrics computation alone
//! 3. Parameter sweep, parallel vs sequential

use chrono::NaiveDate;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use ibslab_core::domain::SplitEvent;
use ibslab_runner::metrics::{MarketAssumptions, PerformanceMetrics};
use ibslab_runner::{run_backtest, synthetic_bars, BacktestConfig, MarketData, ParamGrid, ParamSweep};

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 3).unwrap()
}

fn bench_single_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("single_run");
    let config = BacktestConfig::default();

    for &n in &[1260_usize, 5040] {
        let bars = synthetic_bars(42, n, start());
        let splits = [SplitEvent::new(bars[n / 2].date, 2.0)];
        group.bench_with_input(BenchmarkId::new("bars", n), &n, |b, _| {
            b.iter(|| run_backtest(black_box(&bars), black_box(&splits), None, &config))
        });
    }
    group.finish();
}

fn bench_metrics(c: &mut Criterion) {
    let bars = synthetic_bars(7, 5040, start());
    let result = run_backtest(&bars, &[], None, &BacktestConfig::default())
        .expect("benchmark config is valid");
    let assumptions = MarketAssumptions::default();

    c.bench_function("metrics_5040_bars", |b| {
        b.iter(|| {
            PerformanceMetrics::compute(
                black_box(&result.trades),
                black_box(&result.equity),
                10_000.0,
                Some(&bars),
                &assumptions,
            )
        })
    });
}

fn bench_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("sweep");
    group.sample_size(10);

    let data = MarketData::from_bars(synthetic_bars(3, 2520, start()));
    let grid = ParamGrid::default();
    let base = BacktestConfig::default();

    for parallel in [true, false] {
        let label = if parallel { "parallel" } else { "sequential" };
        group.bench_function(label, |b| {
            b.iter(|| {
                ParamSweep::new(&data)
                    .with_parallelism(parallel)
                    .sweep(black_box(&grid), &base)
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_single_run, bench_metrics, bench_sweep);
criterion_main!(benches);
