//! Artifact manager for persisting run outputs.
//!
//! Layout: `<output_dir>/<run_id>/{manifest.json, trades.csv, trades.json, equity.csv}`.

mod equity;
mod manifest;
mod trades;

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use crate::runner::BacktestResult;

pub use manifest::RunManifest;

/// Artifact paths returned after export.
#[derive(Debug, Clone)]
pub struct ArtifactPaths {
    pub run_dir: PathBuf,
    pub manifest: PathBuf,
    pub equity_csv: PathBuf,
    pub trades_csv: PathBuf,
    pub trades_json: PathBuf,
}

/// Manages writing all artifacts for a run.
#[derive(Debug, Clone)]
pub struct ArtifactManager {
    output_dir: PathBuf,
}

impl ArtifactManager {
    pub fn new(output_dir: impl AsRef<Path>) -> Result<Self> {
        let output_dir = output_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&output_dir)
            .context("Failed to create artifact output directory")?;
        Ok(Self { output_dir })
    }

    /// Save complete run artifacts. Re-saving the same run overwrites it.
    pub fn save_run(&self, result: &BacktestResult) -> Result<ArtifactPaths> {
        let run_dir = self.output_dir.join(&result.run_id);
        std::fs::create_dir_all(&run_dir).context("Failed to create run artifact directory")?;

        let manifest_path = run_dir.join("manifest.json");
        manifest::write_manifest(&manifest_path, result)?;

        let equity_csv = run_dir.join("equity.csv");
        equity::write_equity_csv(&equity_csv, &result.equity)?;

        let trades_csv = run_dir.join("trades.csv");
        let trades_json = run_dir.join("trades.json");
        trades::write_trades_csv(&trades_csv, &result.symbol, &result.trades)?;
        trades::write_trades_json(&trades_json, &result.trades)?;

        info!(run_id = %result.run_id, dir = %run_dir.display(), "artifacts written");

        Ok(ArtifactPaths {
            run_dir,
            manifest: manifest_path,
            equity_csv,
            trades_csv,
            trades_json,
        })
    }
}

/// Write all artifacts for `result` under `output_dir`.
pub fn save_artifacts(result: &BacktestResult, output_dir: &Path) -> Result<ArtifactPaths> {
    ArtifactManager::new(output_dir)?.save_run(result)
}
