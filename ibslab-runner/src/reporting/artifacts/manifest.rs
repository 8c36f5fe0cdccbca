//! Run manifest export (JSON).

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;

use ibslab_core::engine::EngineWarning;

use crate::config::BacktestConfig;
use crate::metrics::PerformanceMetrics;
use crate::runner::BacktestResult;

/// Everything about a run except the per-bar and per-trade series.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunManifest {
    pub schema_version: u32,
    pub run_id: String,
    pub written_at: DateTime<Utc>,
    pub symbol: String,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub bar_count: usize,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub dataset_hash: String,
    pub has_synthetic: bool,
    pub config: BacktestConfig,
    pub metrics: PerformanceMetrics,
    pub warnings: Vec<EngineWarning>,
}

impl RunManifest {
    pub fn from_result(result: &BacktestResult) -> Self {
        Self {
            schema_version: result.schema_version,
            run_id: result.run_id.clone(),
            written_at: Utc::now(),
            symbol: result.symbol.clone(),
            start_date: result.start_date,
            end_date: result.end_date,
            bar_count: result.bar_count,
            initial_capital: result.initial_capital,
            final_equity: result.final_equity(),
            dataset_hash: result.dataset_hash.clone(),
            has_synthetic: result.has_synthetic,
            config: result.config.clone(),
            metrics: result.metrics.clone(),
            warnings: result.warnings.clone(),
        }
    }
}

pub fn write_manifest(path: &Path, result: &BacktestResult) -> Result<()> {
    let manifest = RunManifest::from_result(result);
    let json =
        serde_json::to_string_pretty(&manifest).context("Failed to serialize run manifest")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write manifest to {}", path.display()))?;
    Ok(())
}
