//! Bar and split loading for the runner.
//!
//! Bars come from a CSV file or, for development, from a seeded random walk.
//! The CSV path implements the cleaning policy the engine relies on:
//! 1. Rows are sorted by date
//! 2. Duplicate dates keep the first row
//! 3. Rows with non-finite prices are dropped
//!
//! Synthetic data is a developer-only debug mode. Results produced on
//! synthetic data are tagged as such in the run result and manifest.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, Weekday};
use csv::ReaderBuilder;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use ibslab_core::domain::{Bar, SplitEvent};

/// Errors from the data loading layer.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed CSV in {source_name}: {error}")]
    Csv {
        source_name: String,
        error: csv::Error,
    },

    #[error("{source_name} row {row}: invalid date '{value}' (expected YYYY-MM-DD)")]
    InvalidDate {
        source_name: String,
        row: usize,
        value: String,
    },

    #[error("no usable bars in {source_name}")]
    NoData { source_name: String },
}

/// Where bars for a run come from.
#[derive(Debug, Clone, PartialEq)]
pub enum BarSource {
    Csv(PathBuf),
    Synthetic {
        seed: u64,
        count: usize,
        start: NaiveDate,
    },
}

/// Result of loading bars, including data provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    pub bars: Vec<Bar>,
    /// Dataset hash for provenance (BLAKE3 over all bar data).
    pub dataset_hash: String,
    pub has_synthetic: bool,
}

/// Load bars from `source`, computing the dataset hash.
pub fn load_bars(source: &BarSource) -> Result<LoadedData, LoadError> {
    let (bars, has_synthetic) = match source {
        BarSource::Csv(path) => (load_bars_csv(path)?, false),
        BarSource::Synthetic { seed, count, start } => {
            warn!(seed, count, "generating synthetic bars; results will be tagged as synthetic");
            (synthetic_bars(*seed, *count, *start), true)
        }
    };
    let dataset_hash = compute_dataset_hash(&bars);
    Ok(LoadedData {
        bars,
        dataset_hash,
        has_synthetic,
    })
}

#[derive(Debug, Deserialize)]
struct BarRow {
    #[serde(alias = "Date", alias = "DATE", alias = "timestamp")]
    date: String,
    #[serde(alias = "Open")]
    open: f64,
    #[serde(alias = "High")]
    high: f64,
    #[serde(alias = "Low")]
    low: f64,
    #[serde(alias = "Close")]
    close: f64,
    #[serde(
        default,
        alias = "Adj Close",
        alias = "adjClose",
        deserialize_with = "csv::invalid_option"
    )]
    adj_close: Option<f64>,
    #[serde(alias = "Volume")]
    volume: f64,
}

#[derive(Debug, Deserialize)]
struct SplitRow {
    #[serde(alias = "Date", alias = "DATE")]
    date: String,
    #[serde(alias = "Factor", alias = "ratio", alias = "Ratio")]
    factor: f64,
}

/// Load daily bars from a CSV file with a header row
/// `date,open,high,low,close[,adj_close],volume`.
pub fn load_bars_csv(path: &Path) -> Result<Vec<Bar>, LoadError> {
    info!("Loading bars from: {}", path.display());
    let file = open(path)?;
    load_bars_from_reader(file, &path.display().to_string())
}

/// Same as [`load_bars_csv`] over any reader. `source_name` appears in errors
/// and log lines.
pub fn load_bars_from_reader<R: Read>(reader: R, source_name: &str) -> Result<Vec<Bar>, LoadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut bars = Vec::new();
    let mut skipped = 0usize;
    let mut insane = 0usize;

    for (idx, result) in reader.deserialize::<BarRow>().enumerate() {
        let row_num = idx + 1;
        let row = result.map_err(|error| LoadError::Csv {
            source_name: source_name.to_string(),
            error,
        })?;
        let date = parse_date(&row.date, source_name, row_num)?;

        let bar = Bar {
            date,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            adj_close: row.adj_close,
            volume: row.volume,
        };

        let finite = [bar.open, bar.high, bar.low, bar.close]
            .iter()
            .all(|v| v.is_finite());
        if !finite {
            debug!("Skipping row {} ({}): non-finite price", row_num, date);
            skipped += 1;
            continue;
        }
        if !bar.is_sane() {
            debug!("Row {} ({}) has inconsistent OHLC: {:?}", row_num, date, bar);
            insane += 1;
        }
        bars.push(bar);
    }

    if skipped > 0 {
        warn!("Skipped {} rows with non-finite prices in {}", skipped, source_name);
    }
    if insane > 0 {
        warn!("{} rows with inconsistent OHLC in {}", insane, source_name);
    }

    // Stable sort keeps file order among equal dates, so dedup keeps the first.
    bars.sort_by_key(|b| b.date);
    let original_len = bars.len();
    bars.dedup_by_key(|b| b.date);
    if bars.len() < original_len {
        warn!(
            "Removed {} duplicate dates in {}",
            original_len - bars.len(),
            source_name
        );
    }

    if bars.is_empty() {
        return Err(LoadError::NoData {
            source_name: source_name.to_string(),
        });
    }

    info!(
        "Loaded {} bars from {} to {}",
        bars.len(),
        bars[0].date,
        bars[bars.len() - 1].date
    );
    Ok(bars)
}

/// Load split events from a CSV file with a header row `date,factor`.
pub fn load_splits_csv(path: &Path) -> Result<Vec<SplitEvent>, LoadError> {
    let file = open(path)?;
    load_splits_from_reader(file, &path.display().to_string())
}

pub fn load_splits_from_reader<R: Read>(
    reader: R,
    source_name: &str,
) -> Result<Vec<SplitEvent>, LoadError> {
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut splits = Vec::new();
    for (idx, result) in reader.deserialize::<SplitRow>().enumerate() {
        let row = result.map_err(|error| LoadError::Csv {
            source_name: source_name.to_string(),
            error,
        })?;
        let event = SplitEvent::new(parse_date(&row.date, source_name, idx + 1)?, row.factor);
        if !event.is_effective() {
            debug!("Split on {} with factor {} has no effect", event.date, event.factor);
        }
        splits.push(event);
    }
    splits.sort_by_key(|s| s.date);
    info!("Loaded {} split events from {}", splits.len(), source_name);
    Ok(splits)
}

/// Deterministic random-walk daily bars on weekdays, starting at 100.0.
///
/// The same `(seed, count, start)` always produces the same bars. These are
/// clearly fake and exist for demos, benches and tests.
pub fn synthetic_bars(seed: u64, count: usize, start: NaiveDate) -> Vec<Bar> {
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    let mut rng = StdRng::seed_from_u64(seed);
    let mut bars = Vec::with_capacity(count);
    let mut price = 100.0_f64;
    let mut current = start;

    while bars.len() < count {
        if matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            current += chrono::Duration::days(1);
            continue;
        }

        let daily_return: f64 = rng.gen_range(-0.02..0.021);
        let open = price * (1.0 + rng.gen_range(-0.005..0.005));
        let close = price * (1.0 + daily_return);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.01));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.01));
        let volume = rng.gen_range(500_000..5_000_000u64) as f64;

        bars.push(Bar {
            date: current,
            open,
            high,
            low,
            close,
            adj_close: None,
            volume,
        });
        price = close;
        current += chrono::Duration::days(1);
    }
    bars
}

/// Compute a deterministic BLAKE3 hash over all bar data.
pub fn compute_dataset_hash(bars: &[Bar]) -> String {
    let mut hasher = blake3::Hasher::new();
    for bar in bars {
        hasher.update(bar.date.to_string().as_bytes());
        hasher.update(&bar.open.to_le_bytes());
        hasher.update(&bar.high.to_le_bytes());
        hasher.update(&bar.low.to_le_bytes());
        hasher.update(&bar.close.to_le_bytes());
        hasher.update(&bar.volume.to_le_bytes());
    }
    hasher.finalize().to_hex().to_string()
}

fn open(path: &Path) -> Result<std::fs::File, LoadError> {
    std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn parse_date(value: &str, source_name: &str, row: usize) -> Result<NaiveDate, LoadError> {
    // Accept a trailing time component ("2024-01-02 00:00:00")
    let day = value.split([' ', 'T']).next().unwrap_or(value);
    NaiveDate::parse_from_str(day, "%Y-%m-%d").map_err(|_| LoadError::InvalidDate {
        source_name: source_name.to_string(),
        row,
        value: value.to_string(),
    })
}
