//! Performance metrics over a finished run.
//!
//! Trade statistics count closed trades only; trades still pending at the end
//! of the series are reported in `open_trades`.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::ledger::EquityPoint;
use super::trade::Trade;

const TRADING_DAYS_PER_YEAR: f64 = 252.0;
const DAYS_PER_YEAR: f64 = 365.0;
const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    /// Set when the series was too short to simulate; every other field is
    /// then at its neutral value.
    pub insufficient_data: bool,
    pub initial_capital: f64,
    pub final_equity: f64,
    pub total_return: f64,
    pub cagr: f64,
    pub days: f64,
    pub max_drawdown: f64,
    pub sharpe_ratio: f64,
    pub total_trades: usize,
    pub open_trades: usize,
    pub trades_won: usize,
    pub trades_lost: usize,
    pub win_rate: f64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub profit_factor: f64,
    pub largest_win: f64,
    pub largest_loss: f64,
    pub avg_return_pct: f64,
    pub median_duration_minutes: f64,
    pub avg_exposure: f64,
    pub max_exposure: f64,
}

impl Metrics {
    pub fn insufficient(initial_capital: f64) -> Self {
        Metrics {
            insufficient_data: true,
            initial_capital,
            final_equity: initial_capital,
            total_return: 0.0,
            cagr: 0.0,
            days: 0.0,
            max_drawdown: 0.0,
            sharpe_ratio: 0.0,
            total_trades: 0,
            open_trades: 0,
            trades_won: 0,
            trades_lost: 0,
            win_rate: 0.0,
            total_pnl: 0.0,
            avg_pnl: 0.0,
            profit_factor: 0.0,
            largest_win: 0.0,
            largest_loss: 0.0,
            avg_return_pct: 0.0,
            median_duration_minutes: 0.0,
            avg_exposure: 0.0,
            max_exposure: 0.0,
        }
    }

    pub fn compute(trades: &[Trade], equity_curve: &[EquityPoint], initial_capital: f64) -> Self {
        let final_equity = equity_curve
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_capital);

        let growth = if initial_capital > 0.0 {
            final_equity / initial_capital
        } else {
            1.0
        };
        let total_return = growth - 1.0;

        let days = match (equity_curve.first(), equity_curve.last()) {
            (Some(first), Some(last)) => {
                (last.timestamp - first.timestamp).num_seconds() as f64 / SECONDS_PER_DAY
            }
            _ => 0.0,
        };
        let cagr = if days <= 0.0 {
            0.0
        } else if growth <= 0.0 {
            -1.0
        } else {
            growth.powf(DAYS_PER_YEAR / days) - 1.0
        };

        let max_drawdown = compute_drawdown(equity_curve);
        let sharpe_ratio = compute_sharpe(equity_curve);

        let closed: Vec<&Trade> = trades.iter().filter(|t| !t.is_pending()).collect();
        let open_trades = trades.len() - closed.len();
        let total_trades = closed.len();

        let mut trades_won = 0usize;
        let mut trades_lost = 0usize;
        let mut total_wins = 0.0_f64;
        let mut total_losses = 0.0_f64;
        let mut largest_win = 0.0_f64;
        let mut largest_loss = 0.0_f64;
        let mut total_return_pct = 0.0_f64;
        let mut durations: Vec<f64> = Vec::with_capacity(total_trades);

        for trade in &closed {
            let pnl = trade.pnl().unwrap_or(0.0);
            if pnl > 0.0 {
                trades_won += 1;
                total_wins += pnl;
                largest_win = largest_win.max(pnl);
            } else {
                if pnl < 0.0 {
                    trades_lost += 1;
                }
                total_losses += pnl.abs();
                largest_loss = largest_loss.max(pnl.abs());
            }
            total_return_pct += trade.return_pct().unwrap_or(0.0);
            if let Some(minutes) = trade.duration_minutes() {
                durations.push(minutes);
            }
        }

        let total_pnl = total_wins - total_losses;
        let (win_rate, avg_pnl, avg_return_pct) = if total_trades > 0 {
            let n = total_trades as f64;
            (trades_won as f64 / n, total_pnl / n, total_return_pct / n)
        } else {
            (0.0, 0.0, 0.0)
        };

        let profit_factor = if total_losses > 0.0 {
            total_wins / total_losses
        } else if total_wins > 0.0 {
            f64::INFINITY
        } else {
            0.0
        };

        let (avg_exposure, max_exposure) = compute_exposure(equity_curve);

        Metrics {
            insufficient_data: false,
            initial_capital,
            final_equity,
            total_return,
            cagr,
            days,
            max_drawdown,
            sharpe_ratio,
            total_trades,
            open_trades,
            trades_won,
            trades_lost,
            win_rate,
            total_pnl,
            avg_pnl,
            profit_factor,
            largest_win,
            largest_loss,
            avg_return_pct,
            median_duration_minutes: median(&mut durations),
            avg_exposure,
            max_exposure,
        }
    }
}

/// min over time of (equity - running_max) / running_max; never positive.
fn compute_drawdown(equity_curve: &[EquityPoint]) -> f64 {
    let mut peak = f64::NEG_INFINITY;
    let mut max_dd = 0.0_f64;

    for point in equity_curve {
        peak = peak.max(point.equity);
        if peak > 0.0 {
            let dd = (point.equity - peak) / peak;
            if dd < max_dd {
                max_dd = dd;
            }
        }
    }

    max_dd
}

/// Last equity value of each UTC calendar day, in order.
fn daily_closes(equity_curve: &[EquityPoint]) -> Vec<f64> {
    let mut closes: Vec<f64> = Vec::new();
    let mut current_day: Option<NaiveDate> = None;

    for point in equity_curve {
        let day = Some(point.timestamp.date_naive());
        if day == current_day {
            if let Some(last) = closes.last_mut() {
                *last = point.equity;
            }
        } else {
            closes.push(point.equity);
            current_day = day;
        }
    }

    closes
}

/// Annualized Sharpe of daily simple returns (sample std, no risk-free rate).
fn compute_sharpe(equity_curve: &[EquityPoint]) -> f64 {
    let closes = daily_closes(equity_curve);
    let returns: Vec<f64> = closes
        .windows(2)
        .filter(|w| w[0] != 0.0)
        .map(|w| w[1] / w[0] - 1.0)
        .collect();

    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let stddev = variance.sqrt();

    if stddev > 0.0 && stddev.is_finite() {
        (mean / stddev) * TRADING_DAYS_PER_YEAR.sqrt()
    } else {
        0.0
    }
}

fn compute_exposure(equity_curve: &[EquityPoint]) -> (f64, f64) {
    if equity_curve.is_empty() {
        return (0.0, 0.0);
    }
    let sum: f64 = equity_curve.iter().map(|p| p.exposure).sum();
    let max = equity_curve.iter().map(|p| p.exposure).fold(0.0, f64::max);
    (sum / equity_curve.len() as f64, max)
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}
