//! Equity curve export (CSV).

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ibslab_core::domain::EquityPoint;

pub fn write_equity_csv(path: &Path, equity: &[EquityPoint]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create equity CSV {}", path.display()))?;
    let mut out = BufWriter::new(file);
    writeln!(out, "date,equity,drawdown_pct")?;
    for point in equity {
        writeln!(out, "{},{:.4},{:.4}", point.date, point.value, point.drawdown)?;
    }
    out.flush()?;
    Ok(())
}
