//! Parameter sweep over risk, stop and target settings.
//!
//! Indicators and pivots do not depend on the swept parameters, so the series
//! is prepared once and shared read-only across the rayon workers. Each grid
//! point runs its own independent simulation.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::backtest::{BacktestConfig, PreparedSeries, run_prepared};
use super::ohlcv::Bar;

#[derive(Debug, Clone, PartialEq)]
pub struct SweepGrid {
    pub risk_pcts: Vec<f64>,
    pub stop_atr_mults: Vec<f64>,
    pub target_rs: Vec<f64>,
}

impl Default for SweepGrid {
    /// 4 x 4 risk/stop grid at the default 3R target.
    fn default() -> Self {
        Self {
            risk_pcts: vec![0.0005, 0.001, 0.0015, 0.002],
            stop_atr_mults: vec![1.25, 1.5, 1.75, 2.0],
            target_rs: vec![3.0],
        }
    }
}

impl SweepGrid {
    pub fn size(&self) -> usize {
        self.risk_pcts.len() * self.stop_atr_mults.len() * self.target_rs.len()
    }

    /// Configurations in grid order: risk outermost, target innermost.
    pub fn generate_configs(&self, base: &BacktestConfig) -> Vec<BacktestConfig> {
        let mut configs = Vec::with_capacity(self.size());
        for &risk_pct in &self.risk_pcts {
            for &stop_atr_mult in &self.stop_atr_mults {
                for &target_r in &self.target_rs {
                    configs.push(BacktestConfig {
                        risk_pct,
                        stop_atr_mult,
                        target_r,
                        ..base.clone()
                    });
                }
            }
        }
        configs
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepRow {
    pub risk_pct: f64,
    pub stop_atr_mult: f64,
    pub target_r: f64,
    pub final_equity: f64,
    pub max_drawdown: f64,
    pub total_trades: usize,
    pub win_rate: f64,
}

pub fn run_sweep(bars: &[Bar], base: &BacktestConfig, grid: &SweepGrid) -> Vec<SweepRow> {
    let configs = grid.generate_configs(base);
    info!(points = configs.len(), bars = bars.len(), "starting sweep");

    let prepared = PreparedSeries::new(bars, &base.indicators);

    configs
        .par_iter()
        .map(|config| {
            let result = run_prepared(bars, &prepared, config);
            SweepRow {
                risk_pct: config.risk_pct,
                stop_atr_mult: config.stop_atr_mult,
                target_r: config.target_r,
                final_equity: result.metrics.final_equity,
                max_drawdown: result.metrics.max_drawdown,
                total_trades: result.metrics.total_trades,
                win_rate: result.metrics.win_rate,
            }
        })
        .collect()
}
