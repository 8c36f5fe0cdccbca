//! Backtest runner — wires together data preparation, engine, and metrics.
//!
//! Three entry points:
//! - `run_single_backtest()`: loads the data named in the config, then runs. Used by CLI.
//! - `run_backtest_from_data()`: takes pre-loaded market data. Used by sweeps.
//! - `run_backtest()`: takes raw slices, no provenance. Used by tests and embedders.

use std::borrow::Cow;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

use ibslab_core::data::adjust_for_splits;
use ibslab_core::domain::{Bar, Candle, EquityPoint, SplitEvent, Trade};
use ibslab_core::engine::{self, EngineWarning};
use ibslab_core::indicators::ibs_series;

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::data_loader::{
    compute_dataset_hash, load_bars, load_bars_csv, load_splits_csv, BarSource, LoadError,
};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Data(#[from] LoadError),
    #[error("no bar source: set [data].bars in the config or pass --bars / --synthetic")]
    NoBarSource,
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Bars, splits and optional benchmark for one symbol, with provenance.
#[derive(Debug, Clone)]
pub struct MarketData {
    /// Raw (unadjusted unless the config says otherwise) daily bars.
    pub bars: Vec<Bar>,
    pub splits: Vec<SplitEvent>,
    pub benchmark: Option<Vec<Bar>>,
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

impl MarketData {
    /// Wrap in-memory bars with no splits or benchmark.
    pub fn from_bars(bars: Vec<Bar>) -> Self {
        let dataset_hash = compute_dataset_hash(&bars);
        Self {
            bars,
            splits: Vec::new(),
            benchmark: None,
            dataset_hash,
            has_synthetic: false,
        }
    }

    /// Load everything the config's `[data]` section names. `bars_override`
    /// replaces `[data].bars` when given.
    pub fn load(config: &BacktestConfig, bars_override: Option<&BarSource>) -> Result<Self, RunError> {
        let source = match (bars_override, &config.data.bars) {
            (Some(source), _) => source.clone(),
            (None, Some(path)) => BarSource::Csv(path.clone()),
            (None, None) => return Err(RunError::NoBarSource),
        };
        let loaded = load_bars(&source)?;

        let splits = match &config.data.splits {
            Some(path) => load_splits_csv(path)?,
            None => Vec::new(),
        };
        let benchmark = match &config.data.benchmark {
            Some(path) => Some(load_bars_csv(path)?),
            None => None,
        };

        Ok(Self {
            bars: loaded.bars,
            splits,
            benchmark,
            dataset_hash: loaded.dataset_hash,
            has_synthetic: loaded.has_synthetic,
        })
    }
}

/// Complete result of a single backtest run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub symbol: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: usize,
    pub initial_capital: f64,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub config: BacktestConfig,
    pub metrics: PerformanceMetrics,
    pub trades: Vec<Trade>,
    pub equity: Vec<EquityPoint>,
    pub chart_data: Vec<Candle>,
    pub warnings: Vec<EngineWarning>,
}

/// Default schema version for serde deserialization of older JSON without the field.
fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    pub fn final_equity(&self) -> f64 {
        self.equity
            .last()
            .map_or(self.initial_capital, |p| p.value)
    }
}

/// Run a single backtest from a BacktestConfig, loading the data it names.
pub fn run_single_backtest(
    config: &BacktestConfig,
    bars_override: Option<&BarSource>,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let data = MarketData::load(config, bars_override)?;
    run_backtest_from_data(&data, config)
}

/// Run a backtest with pre-loaded data — no I/O.
pub fn run_backtest_from_data(
    data: &MarketData,
    config: &BacktestConfig,
) -> Result<BacktestResult, RunError> {
    let mut result = run_backtest(
        &data.bars,
        &data.splits,
        data.benchmark.as_deref(),
        config,
    )?;
    result.dataset_hash = data.dataset_hash.clone();
    result.has_synthetic = data.has_synthetic;
    Ok(result)
}

/// Validate, split-adjust, compute IBS, simulate and score.
///
/// Engine warnings are kept in the result and also logged.
pub fn run_backtest(
    bars: &[Bar],
    splits: &[SplitEvent],
    benchmark: Option<&[Bar]>,
    config: &BacktestConfig,
) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let symbol = config.backtest.symbol.as_str();
    let strategy = config.strategy_config();
    let options = &config.execution;

    let bars: Cow<'_, [Bar]> = if splits.is_empty() {
        Cow::Borrowed(bars)
    } else if options.adjusted_for_splits {
        debug!(symbol, splits = splits.len(), "bars pre-adjusted; split events ignored");
        Cow::Borrowed(bars)
    } else {
        debug!(symbol, splits = splits.len(), "applying split adjustment");
        Cow::Owned(adjust_for_splits(bars, splits))
    };

    let ibs = ibs_series(&bars);
    let run = engine::run_backtest(&bars, &ibs, &strategy, options);

    for warning in &run.warnings {
        warn!(symbol, "{warning}");
    }

    let metrics = PerformanceMetrics::compute(
        &run.trades,
        &run.equity,
        strategy.initial_capital,
        benchmark,
        &config.market,
    );

    info!(
        symbol,
        bars = bars.len(),
        trades = metrics.trade_count,
        total_return = metrics.total_return,
        sharpe = metrics.sharpe_ratio,
        "backtest complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: config.run_id(),
        symbol: symbol.to_string(),
        start_date: bars.first().map(|b| b.date),
        end_date: bars.last().map(|b| b.date),
        bar_count: bars.len(),
        initial_capital: strategy.initial_capital,
        dataset_hash: compute_dataset_hash(&bars),
        has_synthetic: false,
        config: config.clone(),
        metrics,
        trades: run.trades,
        equity: run.equity,
        chart_data: run.chart_data,
        warnings: run.warnings,
    })
}
