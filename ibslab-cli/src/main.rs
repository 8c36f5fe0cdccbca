//! IBS Lab CLI — run and sweep commands.
//!
//! Commands:
//! - `run` — execute one backtest from a TOML config file and/or flags
//! - `sweep` — grid-search IBS thresholds and holding limits, ranked by a metric

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use ibslab_core::engine::EntryExecution;
use ibslab_runner::runner::{run_backtest_from_data, MarketData};
use ibslab_runner::{
    save_artifacts, BacktestConfig, BacktestResult, BarSource, ParamGrid, ParamSweep,
    RankingMetric,
};

#[derive(Parser)]
#[command(name = "ibslab", about = "IBS Lab CLI — IBS mean-reversion backtesting")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute a single backtest.
    Run {
        #[command(flatten)]
        data: DataArgs,

        /// Buy below this IBS.
        #[arg(long)]
        low_ibs: Option<f64>,

        /// Sell above this IBS.
        #[arg(long)]
        high_ibs: Option<f64>,

        /// Calendar-day holding limit.
        #[arg(long)]
        max_hold_days: Option<u32>,

        /// Entry fill price.
        #[arg(long, value_enum)]
        entry: Option<EntryArg>,

        /// Output directory for run artifacts.
        #[arg(long, default_value = "results")]
        output_dir: PathBuf,

        /// Print the summary only; write no artifacts.
        #[arg(long, default_value_t = false)]
        no_save: bool,
    },
    /// Run a parameter grid and rank the results.
    Sweep {
        #[command(flatten)]
        data: DataArgs,

        /// Low IBS thresholds (comma separated). Defaults to the standard grid.
        #[arg(long, value_delimiter = ',')]
        low: Vec<f64>,

        /// High IBS thresholds (comma separated). Defaults to the standard grid.
        #[arg(long, value_delimiter = ',')]
        high: Vec<f64>,

        /// Holding limits in calendar days (comma separated). Defaults to the standard grid.
        #[arg(long, value_delimiter = ',')]
        hold: Vec<u32>,

        /// Metric to rank by: sharpe, total_return, cagr, profit_factor, calmar.
        #[arg(long, default_value = "sharpe")]
        rank: RankingMetric,

        /// Number of ranked rows to print.
        #[arg(long, default_value_t = 10)]
        top: usize,

        /// Run configurations one at a time.
        #[arg(long, default_value_t = false)]
        sequential: bool,
    },
}

/// Where bars come from and which base config applies.
#[derive(Args)]
struct DataArgs {
    /// Path to a TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Daily bars CSV (overrides `[data].bars`).
    #[arg(long)]
    bars: Option<PathBuf>,

    /// Split events CSV (overrides `[data].splits`).
    #[arg(long)]
    splits: Option<PathBuf>,

    /// Benchmark bars CSV for beta/alpha (overrides `[data].benchmark`).
    #[arg(long)]
    benchmark: Option<PathBuf>,

    /// Symbol label for reports.
    #[arg(long)]
    symbol: Option<String>,

    /// Starting capital.
    #[arg(long)]
    capital: Option<f64>,

    /// Use seeded synthetic bars instead of a CSV (debug only).
    #[arg(long, default_value_t = false)]
    synthetic: bool,

    /// Seed for --synthetic.
    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Number of synthetic bars.
    #[arg(long, default_value_t = 1260)]
    count: usize,
}

#[derive(Clone, Copy, ValueEnum)]
enum EntryArg {
    Close,
    #[value(name = "next_open", alias = "next-open")]
    NextOpen,
}

impl From<EntryArg> for EntryExecution {
    fn from(arg: EntryArg) -> Self {
        match arg {
            EntryArg::Close => EntryExecution::Close,
            EntryArg::NextOpen => EntryExecution::NextOpen,
        }
    }
}

impl Cli {
    fn init_logging(&self) -> Result<()> {
        let level = match self.verbose {
            0 => Level::WARN,
            1 => Level::INFO,
            2 => Level::DEBUG,
            _ => Level::TRACE,
        };

        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(false)
            .finish();

        tracing::subscriber::set_global_default(subscriber)
            .context("failed to set tracing subscriber")
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    cli.init_logging()?;

    match cli.command {
        Commands::Run {
            data,
            low_ibs,
            high_ibs,
            max_hold_days,
            entry,
            output_dir,
            no_save,
        } => {
            let mut config = data.base_config()?;
            if let Some(low) = low_ibs {
                config.strategy.low_ibs = low;
            }
            if let Some(high) = high_ibs {
                config.strategy.high_ibs = high;
            }
            if let Some(hold) = max_hold_days {
                config.strategy.max_hold_days = hold;
            }
            if let Some(entry) = entry {
                config.execution.entry_execution = entry.into();
            }
            run_backtest_cmd(&data, &config, (!no_save).then_some(output_dir))
        }
        Commands::Sweep {
            data,
            low,
            high,
            hold,
            rank,
            top,
            sequential,
        } => {
            let config = data.base_config()?;
            let grid = sweep_grid(low, high, hold);
            run_sweep_cmd(&data, &config, &grid, rank, top, !sequential)
        }
    }
}

/// `ParamGrid::default()` with any axis given on the command line replaced.
fn sweep_grid(low: Vec<f64>, high: Vec<f64>, hold: Vec<u32>) -> ParamGrid {
    let mut grid = ParamGrid::default();
    if !low.is_empty() {
        grid.low_ibs = low;
    }
    if !high.is_empty() {
        grid.high_ibs = high;
    }
    if !hold.is_empty() {
        grid.max_hold_days = hold;
    }
    grid
}

impl DataArgs {
    /// Config file (or defaults) with command-line overrides applied.
    fn base_config(&self) -> Result<BacktestConfig> {
        let mut config = match &self.config {
            Some(path) => BacktestConfig::from_file(path)
                .with_context(|| format!("loading config {}", path.display()))?,
            None => BacktestConfig::default(),
        };

        if let Some(symbol) = &self.symbol {
            config.backtest.symbol = symbol.clone();
        }
        if let Some(capital) = self.capital {
            config.backtest.initial_capital = capital;
        }
        if let Some(bars) = &self.bars {
            config.data.bars = Some(bars.clone());
        }
        if let Some(splits) = &self.splits {
            config.data.splits = Some(splits.clone());
        }
        if let Some(benchmark) = &self.benchmark {
            config.data.benchmark = Some(benchmark.clone());
        }

        if !self.synthetic && config.data.bars.is_none() {
            bail!("no bar data: pass --config with [data].bars, --bars <csv>, or --synthetic");
        }
        Ok(config)
    }

    fn bar_source(&self) -> Option<BarSource> {
        self.synthetic.then(|| BarSource::Synthetic {
            seed: self.seed,
            count: self.count,
            start: NaiveDate::from_ymd_opt(2015, 1, 2).unwrap_or_default(),
        })
    }

    fn load(&self, config: &BacktestConfig) -> Result<MarketData> {
        let source = self.bar_source();
        let data = MarketData::load(config, source.as_ref())?;
        info!(bars = data.bars.len(), splits = data.splits.len(), "market data loaded");
        Ok(data)
    }
}

fn run_backtest_cmd(
    data_args: &DataArgs,
    config: &BacktestConfig,
    output_dir: Option<PathBuf>,
) -> Result<()> {
    let data = data_args.load(config)?;
    let result = run_backtest_from_data(&data, config)?;
    print_summary(&result);

    if let Some(dir) = output_dir {
        let paths = save_artifacts(&result, &dir)?;
        println!("Artifacts saved to: {}", paths.run_dir.display());
    }
    Ok(())
}

fn run_sweep_cmd(
    data_args: &DataArgs,
    config: &BacktestConfig,
    grid: &ParamGrid,
    rank: RankingMetric,
    top: usize,
    parallel: bool,
) -> Result<()> {
    if grid.size() == 0 {
        bail!("empty parameter grid");
    }
    let data = data_args.load(config)?;
    let results = ParamSweep::new(&data)
        .with_parallelism(parallel)
        .sweep(grid, config)?;

    println!();
    println!(
        "=== Sweep: {} configs on {} ({} bars), ranked by {} ===",
        results.len(),
        config.backtest.symbol,
        data.bars.len(),
        rank
    );
    println!(
        "{:<4} {:>6} {:>6} {:>5} {:>7} {:>10} {:>8} {:>8} {:>8} {:>7}",
        "#", "Low", "High", "Hold", "Trades", "Return%", "CAGR%", "Sharpe", "MaxDD%", "Win%"
    );
    println!("{}", "-".repeat(78));
    for (i, result) in results.top_n(rank, top).into_iter().enumerate() {
        let s = &result.config.strategy;
        let m = &result.metrics;
        println!(
            "{:<4} {:>6.2} {:>6.2} {:>5} {:>7} {:>10.2} {:>8.2} {:>8.3} {:>8.2} {:>7.1}",
            i + 1,
            s.low_ibs,
            s.high_ibs,
            s.max_hold_days,
            m.trade_count,
            m.total_return,
            m.cagr,
            m.sharpe_ratio,
            m.max_drawdown,
            m.win_rate
        );
    }
    if data.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    println!();
    Ok(())
}

fn print_summary(result: &BacktestResult) {
    let m = &result.metrics;
    let s = &result.config.strategy;
    let period = match (result.start_date, result.end_date) {
        (Some(start), Some(end)) => format!("{start} to {end}"),
        _ => "-".to_string(),
    };

    println!();
    println!("=== Backtest Result ===");
    println!("Symbol:         {}", result.symbol);
    println!("Period:         {period}");
    println!("Bars:           {}", result.bar_count);
    println!(
        "Strategy:       low {:.2} / high {:.2} / hold {}d",
        s.low_ibs, s.high_ibs, s.max_hold_days
    );
    println!("Trades:         {}", m.trade_count);
    println!("Final Equity:   {:.2}", result.final_equity());
    println!();
    println!("--- Performance ---");
    println!("Total Return:   {:.2}%", m.total_return);
    println!("CAGR:           {:.2}%", m.cagr);
    println!("Sharpe:         {:.3}", m.sharpe_ratio);
    println!("Sortino:        {:.3}", m.sortino_ratio);
    println!("Calmar:         {:.3}", m.calmar_ratio);
    println!("Max Drawdown:   {:.2}%", m.max_drawdown);
    println!("Win Rate:       {:.1}%", m.win_rate);
    println!("Profit Factor:  {:.2}", m.profit_factor);
    println!("Recovery:       {:.2}", m.recovery_factor);
    println!("Avg Win/Loss:   {:.2} / {:.2}", m.average_win, m.average_loss);
    println!("Beta / Alpha:   {:.3} / {:.2}", m.beta, m.alpha);
    println!("VaR 95%:        {:.2}%", m.value_at_risk);
    println!("Exposure:       {:.1}%", m.exposure);
    println!("Max Consec Win: {}", m.max_consecutive_wins);
    println!("Max Consec Loss:{}", m.max_consecutive_losses);
    if result.has_synthetic {
        println!();
        println!("WARNING: Results based on SYNTHETIC data");
    }
    for warn in &result.warnings {
        println!("WARNING: {warn}");
    }
    println!();
}
