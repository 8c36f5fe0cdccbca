//! Performance metrics — pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity curve and/or trade list in, scalar out.
//! Percent-valued metrics (returns, drawdown, win rate, alpha, VaR) are in
//! percent, ratios are plain numbers. No metric is ever NaN.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use ibslab_core::domain::{Bar, EquityPoint, Trade};

/// Trading days per year used to annualize daily statistics.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Calendar days per year used for CAGR.
pub const DAYS_PER_YEAR: f64 = 365.25;

/// Market-wide assumptions feeding the risk-adjusted metrics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketAssumptions {
    /// Annual risk-free rate as a fraction (0.02 = 2%).
    pub risk_free_rate: f64,
    /// Annual market return as a fraction, used for alpha when no
    /// benchmark series is supplied.
    pub market_return: f64,
}

impl Default for MarketAssumptions {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            market_return: 0.08,
        }
    }
}

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    pub total_return: f64,
    pub cagr: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    pub win_rate: f64,
    #[serde(with = "infinite_f64")]
    pub profit_factor: f64,
    pub calmar_ratio: f64,
    #[serde(with = "infinite_f64")]
    pub recovery_factor: f64,
    pub average_win: f64,
    pub average_loss: f64,
    pub beta: f64,
    pub alpha: f64,
    pub skewness: f64,
    pub kurtosis: f64,
    pub value_at_risk: f64,
    pub trade_count: usize,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    /// Share of bars that closed with a position open, in percent.
    pub exposure: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from a trade list and equity curve.
    ///
    /// `benchmark` bars, when given, are aligned with the equity curve by date
    /// for beta and alpha. An empty equity curve gives all-zero metrics.
    pub fn compute(
        trades: &[Trade],
        equity: &[EquityPoint],
        initial_capital: f64,
        benchmark: Option<&[Bar]>,
        assumptions: &MarketAssumptions,
    ) -> Self {
        let (Some(first), Some(last)) = (equity.first(), equity.last()) else {
            return Self::default();
        };

        let values: Vec<f64> = equity.iter().map(|p| p.value).collect();
        let returns = daily_returns(&values);
        let rf = assumptions.risk_free_rate;

        let total_return = total_return(initial_capital, last.value);
        let cagr = cagr(initial_capital, last.value, first.date, last.date);
        let max_drawdown = max_drawdown(equity);
        let (beta, alpha) = match benchmark.and_then(|b| benchmark_returns(equity, b)) {
            Some((strategy_r, bench_r)) => beta_alpha(&strategy_r, &bench_r, rf)
                .unwrap_or_else(|| assumed_beta_alpha(cagr, assumptions)),
            None => assumed_beta_alpha(cagr, assumptions),
        };

        Self {
            total_return,
            cagr,
            sharpe_ratio: sharpe_ratio(&returns, rf),
            sortino_ratio: sortino_ratio(&returns, rf),
            max_drawdown,
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            calmar_ratio: calmar_ratio(cagr, max_drawdown),
            recovery_factor: recovery_factor(total_return, max_drawdown),
            average_win: average_win(trades),
            average_loss: average_loss(trades),
            beta,
            alpha,
            skewness: skewness(&returns),
            kurtosis: kurtosis(&returns),
            value_at_risk: value_at_risk(&returns),
            trade_count: trades.len(),
            max_consecutive_wins: max_consecutive_wins(trades),
            max_consecutive_losses: max_consecutive_losses(trades),
            exposure: exposure(trades, equity),
        }
    }

    /// Every float field, for checks that apply to all of them.
    pub fn float_fields(&self) -> [(&'static str, f64); 16] {
        [
            ("total_return", self.total_return),
            ("cagr", self.cagr),
            ("sharpe_ratio", self.sharpe_ratio),
            ("sortino_ratio", self.sortino_ratio),
            ("max_drawdown", self.max_drawdown),
            ("win_rate", self.win_rate),
            ("profit_factor", self.profit_factor),
            ("calmar_ratio", self.calmar_ratio),
            ("recovery_factor", self.recovery_factor),
            ("average_win", self.average_win),
            ("average_loss", self.average_loss),
            ("beta", self.beta),
            ("alpha", self.alpha),
            ("skewness", self.skewness),
            ("kurtosis", self.kurtosis),
            ("value_at_risk", self.value_at_risk),
        ]
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Total return in percent: (final - initial) / initial * 100.
pub fn total_return(initial_capital: f64, final_value: f64) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }
    (final_value - initial_capital) / initial_capital * 100.0
}

/// Compound annual growth rate in percent over the calendar span of the run.
///
/// Runs shorter than a year report plain total return. A wiped-out account
/// reports -100.
pub fn cagr(initial_capital: f64, final_value: f64, start: NaiveDate, end: NaiveDate) -> f64 {
    if initial_capital <= 0.0 {
        return 0.0;
    }
    let days = (end - start).num_days() as f64;
    if days / DAYS_PER_YEAR < 1.0 {
        return total_return(initial_capital, final_value);
    }
    if final_value <= 0.0 {
        return -100.0;
    }
    ((final_value / initial_capital).powf(DAYS_PER_YEAR / days) - 1.0) * 100.0
}

/// Annualized Sharpe ratio.
///
/// `(mean(r) * 252 - rf) / (stdev(r) * sqrt(252))` with the sample standard
/// deviation. Returns 0.0 with fewer than 2 returns or zero deviation.
pub fn sharpe_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(returns);
    if std < 1e-15 {
        return 0.0;
    }
    (mean_f64(returns) * TRADING_DAYS_PER_YEAR - risk_free_rate)
        / (std * TRADING_DAYS_PER_YEAR.sqrt())
}

/// Annualized Sortino ratio.
///
/// Same numerator as Sharpe; the denominator is the downside deviation below
/// the daily risk-free rate, averaged over all returns. Returns 0.0 when no
/// return falls below the target.
pub fn sortino_ratio(returns: &[f64], risk_free_rate: f64) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let target = risk_free_rate / TRADING_DAYS_PER_YEAR;
    let downside_sq: f64 = returns
        .iter()
        .map(|r| (r - target).min(0.0).powi(2))
        .sum();
    let downside_dev = (downside_sq / returns.len() as f64).sqrt() * TRADING_DAYS_PER_YEAR.sqrt();
    if downside_dev < 1e-15 {
        return 0.0;
    }
    (mean_f64(returns) * TRADING_DAYS_PER_YEAR - risk_free_rate) / downside_dev
}

/// Largest drawdown on the curve, in percent (positive number).
pub fn max_drawdown(equity: &[EquityPoint]) -> f64 {
    equity.iter().map(|p| p.drawdown).fold(0.0, f64::max)
}

/// CAGR / max drawdown. Returns 0.0 if there was no drawdown.
pub fn calmar_ratio(cagr: f64, max_drawdown: f64) -> f64 {
    if max_drawdown <= 0.0 {
        return 0.0;
    }
    cagr / max_drawdown
}

/// Total return / max drawdown.
///
/// With no drawdown: infinite for a positive return, 0.0 otherwise.
pub fn recovery_factor(total_return: f64, max_drawdown: f64) -> f64 {
    if max_drawdown <= 0.0 {
        return if total_return > 0.0 { f64::INFINITY } else { 0.0 };
    }
    total_return / max_drawdown
}

/// Win rate in percent.
pub fn win_rate(trades: &[Trade]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let winners = trades.iter().filter(|t| t.is_winner()).count();
    winners as f64 / trades.len() as f64 * 100.0
}

/// Gross profit / gross loss.
///
/// 0.0 when nothing was won; infinite when something was won and nothing lost.
pub fn profit_factor(trades: &[Trade]) -> f64 {
    let gross_profit: f64 = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).sum();
    let gross_loss: f64 = trades
        .iter()
        .filter(|t| t.is_loser())
        .map(|t| t.pnl.abs())
        .sum();

    if gross_profit <= 0.0 {
        return 0.0;
    }
    if gross_loss <= 0.0 {
        return f64::INFINITY;
    }
    gross_profit / gross_loss
}

/// Mean PnL of winning trades, 0.0 if none.
pub fn average_win(trades: &[Trade]) -> f64 {
    let wins: Vec<f64> = trades.iter().filter(|t| t.is_winner()).map(|t| t.pnl).collect();
    mean_f64(&wins)
}

/// Mean PnL of losing trades. Never positive; 0.0 if none.
pub fn average_loss(trades: &[Trade]) -> f64 {
    let losses: Vec<f64> = trades.iter().filter(|t| t.is_loser()).map(|t| t.pnl).collect();
    mean_f64(&losses)
}

/// Beta and annualized Jensen alpha (percent) against aligned benchmark returns.
///
/// `None` with fewer than 2 returns or a benchmark with no variance.
pub fn beta_alpha(strategy: &[f64], benchmark: &[f64], risk_free_rate: f64) -> Option<(f64, f64)> {
    let n = strategy.len().min(benchmark.len());
    if n < 2 {
        return None;
    }
    let (s, b) = (&strategy[..n], &benchmark[..n]);
    let (mean_s, mean_b) = (mean_f64(s), mean_f64(b));

    let cov = s
        .iter()
        .zip(b)
        .map(|(x, y)| (x - mean_s) * (y - mean_b))
        .sum::<f64>()
        / (n - 1) as f64;
    let var_b = b.iter().map(|y| (y - mean_b).powi(2)).sum::<f64>() / (n - 1) as f64;
    if var_b < 1e-15 {
        return None;
    }

    let beta = cov / var_b;
    let annual_s = mean_s * TRADING_DAYS_PER_YEAR;
    let annual_b = mean_b * TRADING_DAYS_PER_YEAR;
    let alpha = ((annual_s - risk_free_rate) - beta * (annual_b - risk_free_rate)) * 100.0;
    Some((beta, alpha))
}

/// Beta of 1 and alpha against the assumed market return.
pub fn assumed_beta_alpha(cagr: f64, assumptions: &MarketAssumptions) -> (f64, f64) {
    let beta = 1.0;
    let rf = assumptions.risk_free_rate * 100.0;
    let market = assumptions.market_return * 100.0;
    (beta, cagr - (rf + beta * (market - rf)))
}

/// Third standardized moment. 0.0 below 3 returns or with no variance.
pub fn skewness(returns: &[f64]) -> f64 {
    if returns.len() < 3 {
        return 0.0;
    }
    let m2 = central_moment(returns, 2);
    if m2 < 1e-30 {
        return 0.0;
    }
    central_moment(returns, 3) / m2.powf(1.5)
}

/// Fourth standardized moment (not excess; a normal distribution gives 3).
/// 0.0 below 4 returns or with no variance.
pub fn kurtosis(returns: &[f64]) -> f64 {
    if returns.len() < 4 {
        return 0.0;
    }
    let m2 = central_moment(returns, 2);
    if m2 < 1e-30 {
        return 0.0;
    }
    central_moment(returns, 4) / (m2 * m2)
}

/// Historical one-day 95% value at risk, in percent (positive number).
pub fn value_at_risk(returns: &[f64]) -> f64 {
    if returns.is_empty() {
        return 0.0;
    }
    let mut sorted = returns.to_vec();
    sorted.sort_by(f64::total_cmp);
    let index = ((sorted.len() as f64 * 0.05).floor() as usize).min(sorted.len() - 1);
    sorted[index].abs() * 100.0
}

/// Maximum consecutive winning trades.
pub fn max_consecutive_wins(trades: &[Trade]) -> usize {
    max_consecutive(trades, Trade::is_winner)
}

/// Maximum consecutive losing trades.
pub fn max_consecutive_losses(trades: &[Trade]) -> usize {
    max_consecutive(trades, Trade::is_loser)
}

/// Percent of equity points that closed with a position open.
///
/// A position is open from its entry bar up to, not including, its exit bar.
pub fn exposure(trades: &[Trade], equity: &[EquityPoint]) -> f64 {
    if equity.is_empty() {
        return 0.0;
    }
    let mut held = 0usize;
    let mut trade_iter = trades.iter().peekable();
    for point in equity {
        while trade_iter
            .peek()
            .is_some_and(|t| t.exit_date <= point.date)
        {
            trade_iter.next();
        }
        if trade_iter
            .peek()
            .is_some_and(|t| t.entry_date <= point.date && point.date < t.exit_date)
        {
            held += 1;
        }
    }
    held as f64 / equity.len() as f64 * 100.0
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Compute daily returns from an equity curve. A non-positive prior value
/// contributes a zero return.
pub fn daily_returns(values: &[f64]) -> Vec<f64> {
    values
        .windows(2)
        .map(|w| {
            if w[0] > 0.0 {
                (w[1] - w[0]) / w[0]
            } else {
                0.0
            }
        })
        .collect()
}

/// Strategy and benchmark daily returns over the dates both series share.
fn benchmark_returns(equity: &[EquityPoint], benchmark: &[Bar]) -> Option<(Vec<f64>, Vec<f64>)> {
    let closes: HashMap<NaiveDate, f64> = benchmark.iter().map(|b| (b.date, b.close)).collect();
    let aligned: Vec<(f64, f64)> = equity
        .iter()
        .filter_map(|p| closes.get(&p.date).map(|&c| (p.value, c)))
        .collect();
    if aligned.len() < 3 {
        return None;
    }

    let strategy: Vec<f64> = aligned.iter().map(|&(v, _)| v).collect();
    let bench: Vec<f64> = aligned.iter().map(|&(_, c)| c).collect();
    Some((daily_returns(&strategy), daily_returns(&bench)))
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn central_moment(values: &[f64], k: i32) -> f64 {
    let mean = mean_f64(values);
    values.iter().map(|v| (v - mean).powi(k)).sum::<f64>() / values.len() as f64
}

fn max_consecutive(trades: &[Trade], pred: fn(&Trade) -> bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;

    for trade in trades {
        if pred(trade) {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}

/// Serde for floats that may be infinite. JSON has no infinity literal, so
/// infinities are written as the strings `"Infinity"` / `"-Infinity"`.
pub mod infinite_f64 {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &f64, serializer: S) -> Result<S::Ok, S::Error> {
        if value.is_infinite() {
            let text = if *value > 0.0 { "Infinity" } else { "-Infinity" };
            serializer.serialize_str(text)
        } else {
            serializer.serialize_f64(*value)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Number(f64),
        Text(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
        match Repr::deserialize(deserializer)? {
            Repr::Number(v) => Ok(v),
            Repr::Text(s) => match s.as_str() {
                "Infinity" | "inf" => Ok(f64::INFINITY),
                "-Infinity" | "-inf" => Ok(f64::NEG_INFINITY),
                other => Err(serde::de::Error::custom(format!(
                    "expected a number or \"Infinity\", got {other:?}"
                ))),
            },
        }
    }
}
