//! Parameter sweep over IBS thresholds and holding limits.

use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::BacktestConfig;
use crate::metrics::PerformanceMetrics;
use crate::runner::{run_backtest_from_data, BacktestResult, MarketData, RunError};

/// Cartesian grid of strategy parameters.
///
/// Defines the values to try for each strategy parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamGrid {
    pub low_ibs: Vec<f64>,
    pub high_ibs: Vec<f64>,
    pub max_hold_days: Vec<u32>,
}

impl Default for ParamGrid {
    /// Entry 0.05-0.25, exit 0.65-0.85, hold 5/10/20/30.
    fn default() -> Self {
        Self {
            low_ibs: vec![0.05, 0.1, 0.15, 0.2, 0.25],
            high_ibs: vec![0.65, 0.7, 0.75, 0.8, 0.85],
            max_hold_days: vec![5, 10, 20, 30],
        }
    }
}

impl ParamGrid {
    /// Upper bound on the number of configurations (before filtering).
    pub fn size(&self) -> usize {
        self.low_ibs.len() * self.high_ibs.len() * self.max_hold_days.len()
    }

    /// Generates all configurations in the grid.
    ///
    /// Combinations with `low >= high` are skipped: entry and exit zones
    /// would overlap.
    pub fn generate_configs(&self, base_config: &BacktestConfig) -> Vec<BacktestConfig> {
        let mut configs = Vec::new();

        for &low in &self.low_ibs {
            for &high in &self.high_ibs {
                if low >= high {
                    continue;
                }
                for &hold in &self.max_hold_days {
                    configs.push(base_config.with_params(low, high, hold));
                }
            }
        }

        configs
    }
}

/// Which metric to rank sweep results by. Higher is better for all of them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingMetric {
    #[default]
    Sharpe,
    TotalReturn,
    Cagr,
    ProfitFactor,
    Calmar,
}

impl RankingMetric {
    pub const ALL: [RankingMetric; 5] = [
        RankingMetric::Sharpe,
        RankingMetric::TotalReturn,
        RankingMetric::Cagr,
        RankingMetric::ProfitFactor,
        RankingMetric::Calmar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RankingMetric::Sharpe => "sharpe",
            RankingMetric::TotalReturn => "total_return",
            RankingMetric::Cagr => "cagr",
            RankingMetric::ProfitFactor => "profit_factor",
            RankingMetric::Calmar => "calmar",
        }
    }

    /// The metric's value for a result.
    pub fn value(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            RankingMetric::Sharpe => metrics.sharpe_ratio,
            RankingMetric::TotalReturn => metrics.total_return,
            RankingMetric::Cagr => metrics.cagr,
            RankingMetric::ProfitFactor => metrics.profit_factor,
            RankingMetric::Calmar => metrics.calmar_ratio,
        }
    }
}

impl fmt::Display for RankingMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RankingMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        RankingMetric::ALL
            .into_iter()
            .find(|m| m.as_str() == wanted)
            .ok_or_else(|| {
                let names: Vec<&str> = RankingMetric::ALL.iter().map(|m| m.as_str()).collect();
                format!("unknown ranking metric '{s}' (expected one of: {})", names.join(", "))
            })
    }
}

/// Parameter sweep executor.
///
/// Runs backtests for all configurations in a grid over the same market
/// data, optionally in parallel. Each run is independent, so parallel and
/// sequential sweeps give identical results in identical order.
pub struct ParamSweep<'a> {
    data: &'a MarketData,
    parallel: bool,
}

impl<'a> ParamSweep<'a> {
    pub fn new(data: &'a MarketData) -> Self {
        Self {
            data,
            parallel: true,
        }
    }

    /// Enables or disables parallel execution.
    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Executes a parameter sweep over the given grid.
    pub fn sweep(
        &self,
        grid: &ParamGrid,
        base_config: &BacktestConfig,
    ) -> Result<SweepResults, RunError> {
        base_config.validate()?;
        let configs = grid.generate_configs(base_config);
        info!(
            configs = configs.len(),
            parallel = self.parallel,
            "starting parameter sweep"
        );

        let results: Vec<BacktestResult> = if self.parallel {
            configs
                .par_iter()
                .map(|config| run_backtest_from_data(self.data, config))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            configs
                .iter()
                .map(|config| run_backtest_from_data(self.data, config))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(SweepResults::new(results))
    }
}

/// Results from a parameter sweep, in grid order.
#[derive(Debug)]
pub struct SweepResults {
    results: Vec<BacktestResult>,
    by_run_id: HashMap<String, usize>,
}

impl SweepResults {
    fn new(results: Vec<BacktestResult>) -> Self {
        let by_run_id = results
            .iter()
            .enumerate()
            .map(|(i, r)| (r.run_id.clone(), i))
            .collect();

        Self {
            results,
            by_run_id,
        }
    }

    /// Returns all results as a slice.
    pub fn all(&self) -> &[BacktestResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Gets a result by RunId.
    pub fn get(&self, run_id: &str) -> Option<&BacktestResult> {
        self.by_run_id.get(run_id).map(|&i| &self.results[i])
    }

    /// Returns results sorted by `metric` (descending). Ties keep grid order.
    pub fn ranked_by(&self, metric: RankingMetric) -> Vec<&BacktestResult> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by(|a, b| {
            metric
                .value(&b.metrics)
                .partial_cmp(&metric.value(&a.metrics))
                .unwrap_or(Ordering::Equal)
        });
        sorted
    }

    /// Returns the top N results by `metric`.
    pub fn top_n(&self, metric: RankingMetric, n: usize) -> Vec<&BacktestResult> {
        self.ranked_by(metric).into_iter().take(n).collect()
    }

    /// Returns the best result by `metric`.
    pub fn best(&self, metric: RankingMetric) -> Option<&BacktestResult> {
        self.ranked_by(metric).into_iter().next()
    }
}
