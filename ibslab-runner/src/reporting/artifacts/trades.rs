//! Trade tape export (CSV/JSON).

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use ibslab_core::domain::Trade;

pub fn write_trades_csv(path: &Path, symbol: &str, trades: &[Trade]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create trades CSV {}", path.display()))?;
    let mut out = BufWriter::new(file);

    writeln!(
        out,
        "symbol,entry_date,exit_date,entry_price,exit_price,quantity,pnl,pnl_pct,duration_days,bars_held,entry_ibs,exit_ibs,commission,exit_reason"
    )?;

    for trade in trades {
        writeln!(
            out,
            "{},{},{},{:.4},{:.4},{},{:.4},{:.4},{},{},{:.4},{:.4},{:.4},{}",
            symbol,
            trade.entry_date,
            trade.exit_date,
            trade.entry_price,
            trade.exit_price,
            trade.quantity,
            trade.pnl,
            trade.pnl_percent,
            trade.duration,
            trade.context.bars_held,
            trade.context.entry_ibs,
            trade.context.exit_ibs,
            trade.context.commission,
            trade.exit_reason
        )?;
    }

    out.flush()?;
    Ok(())
}

pub fn write_trades_json(path: &Path, trades: &[Trade]) -> Result<()> {
    let json = serde_json::to_string_pretty(trades).context("Failed to serialize trades")?;
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write trades JSON {}", path.display()))?;
    Ok(())
}
