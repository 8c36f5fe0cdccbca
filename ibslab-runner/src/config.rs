//! Serializable backtest configuration, loaded from TOML.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use ibslab_core::engine::{CommissionModel, ExecutionOptions, StrategyConfig};

use crate::metrics::MarketAssumptions;

/// Unique identifier for a backtest run (content-addressable hash).
pub type RunId = String;

/// Errors raised while reading or checking a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("initial_capital must be positive and finite, got {0}")]
    InvalidCapital(f64),

    #[error("capital_usage must be within [0, 100], got {0}")]
    InvalidCapitalUsage(f64),

    #[error("{name} must be within [0, 1], got {value}")]
    InvalidThreshold { name: &'static str, value: f64 },

    #[error("max_hold_days must be at least 1")]
    ZeroMaxHoldDays,

    #[error("commission must be non-negative and finite, got {0:?}")]
    InvalidCommission(CommissionModel),
}

/// `[backtest]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestSection {
    #[serde(default = "default_symbol")]
    pub symbol: String,
    pub initial_capital: f64,
}

fn default_symbol() -> String {
    "SPY".to_string()
}

/// `[strategy]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySection {
    pub low_ibs: f64,
    pub high_ibs: f64,
    pub max_hold_days: u32,
    #[serde(default = "default_capital_usage")]
    pub capital_usage: f64,
    #[serde(default)]
    pub commission: CommissionModel,
}

fn default_capital_usage() -> f64 {
    100.0
}

/// `[data]` section. Paths are resolved against the working directory.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataSection {
    pub bars: Option<PathBuf>,
    pub splits: Option<PathBuf>,
    pub benchmark: Option<PathBuf>,
}

/// Serializable configuration for a single backtest run.
///
/// Captures everything needed to reproduce a run: symbol and capital,
/// IBS thresholds and holding limit, execution switches, data sources and
/// the market assumptions behind alpha and the Sharpe/Sortino hurdle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub backtest: BacktestSection,
    pub strategy: StrategySection,
    #[serde(default)]
    pub execution: ExecutionOptions,
    #[serde(default)]
    pub data: DataSection,
    #[serde(default)]
    pub market: MarketAssumptions,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self::from_strategy("SPY", &StrategyConfig::default())
    }
}

impl BacktestConfig {
    /// Build a config around engine parameters, with default execution,
    /// no data sources and default market assumptions.
    pub fn from_strategy(symbol: &str, strategy: &StrategyConfig) -> Self {
        Self {
            backtest: BacktestSection {
                symbol: symbol.to_string(),
                initial_capital: strategy.initial_capital,
            },
            strategy: StrategySection {
                low_ibs: strategy.low_ibs,
                high_ibs: strategy.high_ibs,
                max_hold_days: strategy.max_hold_days,
                capital_usage: strategy.capital_usage,
                commission: strategy.commission,
            },
            execution: ExecutionOptions::default(),
            data: DataSection::default(),
            market: MarketAssumptions::default(),
        }
    }

    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Serialize back to TOML.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Reject values the engine cannot run with.
    ///
    /// `low_ibs >= high_ibs` is legal and only warned about by the engine.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let capital = self.backtest.initial_capital;
        if !(capital.is_finite() && capital > 0.0) {
            return Err(ConfigError::InvalidCapital(capital));
        }

        let s = &self.strategy;
        if !(0.0..=100.0).contains(&s.capital_usage) {
            return Err(ConfigError::InvalidCapitalUsage(s.capital_usage));
        }
        for (name, value) in [("low_ibs", s.low_ibs), ("high_ibs", s.high_ibs)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(ConfigError::InvalidThreshold { name, value });
            }
        }
        if s.max_hold_days == 0 {
            return Err(ConfigError::ZeroMaxHoldDays);
        }

        let fixed = s.commission.fixed_part();
        let rate = s.commission.rate();
        if !(fixed.is_finite() && rate.is_finite() && fixed >= 0.0 && rate >= 0.0) {
            return Err(ConfigError::InvalidCommission(s.commission));
        }
        Ok(())
    }

    /// Engine parameters for this config.
    pub fn strategy_config(&self) -> StrategyConfig {
        StrategyConfig {
            low_ibs: self.strategy.low_ibs,
            high_ibs: self.strategy.high_ibs,
            max_hold_days: self.strategy.max_hold_days,
            initial_capital: self.backtest.initial_capital,
            capital_usage: self.strategy.capital_usage,
            commission: self.strategy.commission,
        }
    }

    /// Copy of this config with different IBS thresholds and holding limit.
    pub fn with_params(&self, low_ibs: f64, high_ibs: f64, max_hold_days: u32) -> Self {
        let mut config = self.clone();
        config.strategy.low_ibs = low_ibs;
        config.strategy.high_ibs = high_ibs;
        config.strategy.max_hold_days = max_hold_days;
        config
    }

    /// Computes a deterministic hash ID for this configuration.
    ///
    /// Two runs with identical configs share a RunId, so their artifacts land
    /// in the same directory.
    pub fn run_id(&self) -> RunId {
        // Scalars, strings and paths only: serialization cannot fail.
        let json = serde_json::to_vec(self).unwrap_or_default();
        blake3::hash(&json).to_hex()[..16].to_string()
    }
}
