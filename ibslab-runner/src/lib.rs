//! IBS Lab Runner — backtest orchestration, metrics, sweeps, artifacts.
//!
//! This crate builds on `ibslab-core` to provide:
//! - TOML configuration with validation and content-hashed run ids
//! - CSV bar/split loading with a seeded synthetic fallback
//! - Single-backtest runner (split adjustment, IBS, engine, metrics)
//! - Performance metrics
//! - Parallel parameter sweeps with ranking
//! - Artifact export (manifest, trade tape, equity curve)

pub mod config;
pub mod data_loader;
pub mod metrics;
pub mod reporting;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError, RunId};
pub use data_loader::{
    load_bars, load_bars_csv, load_splits_csv, synthetic_bars, BarSource, LoadError, LoadedData,
};
pub use metrics::{MarketAssumptions, PerformanceMetrics};
pub use reporting::{save_artifacts, ArtifactManager, ArtifactPaths, RunManifest};
pub use runner::{
    run_backtest, run_backtest_from_data, run_single_backtest, BacktestResult, MarketData,
    RunError, SCHEMA_VERSION,
};
pub use sweep::{ParamGrid, ParamSweep, RankingMetric, SweepResults};
