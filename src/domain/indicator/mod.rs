//! Indicator pipeline.
//!
//! Derives one `IndicatorRow` per bar from the raw series. Every row is a pure
//! function of bars `0..=i`; no indicator looks ahead and none raises on short
//! history (fallbacks are documented per submodule).
//!
//! Indicators run on the rayon pool and are zipped into rows before the trade
//! loop starts.

pub mod atr;
pub mod bollinger;
pub mod ema;
pub mod rsi;

use serde::{Deserialize, Serialize};

use crate::domain::ohlcv::Bar;

/// Periods and multipliers for the pipeline and the pivot detector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorParams {
    pub ema_fast: usize,
    pub ema_slow: usize,
    pub rsi_period: usize,
    pub bb_window: usize,
    pub bb_dev: f64,
    pub atr_window: usize,
    pub pivot_lookback: usize,
    /// Trailing bars searched by `recent_pivot`.
    pub pivot_window: usize,
}

impl Default for IndicatorParams {
    fn default() -> Self {
        Self {
            ema_fast: 13,
            ema_slow: 55,
            rsi_period: 14,
            bb_window: 20,
            bb_dev: 2.0,
            atr_window: 14,
            pivot_lookback: 5,
            pivot_window: 200,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorRow {
    pub ema_fast: f64,
    pub ema_slow: f64,
    pub rsi: f64,
    pub atr: f64,
    pub bb_width: f64,
    pub bb_position: f64,
}

impl IndicatorRow {
    /// (ema_fast - ema_slow) / ema_slow, 0 when ema_slow is 0.
    pub fn trend_spread(&self) -> f64 {
        if self.ema_slow == 0.0 {
            0.0
        } else {
            (self.ema_fast - self.ema_slow) / self.ema_slow
        }
    }
}

pub fn compute_indicators(bars: &[Bar], params: &IndicatorParams) -> Vec<IndicatorRow> {
    let closes: Vec<f64> = bars.iter().map(|b| b.close).collect();

    let ((ema_fast, ema_slow), (rsi, (bands, atr))) = rayon::join(
        || {
            rayon::join(
                || ema::calculate_ema(&closes, params.ema_fast),
                || ema::calculate_ema(&closes, params.ema_slow),
            )
        },
        || {
            rayon::join(
                || rsi::calculate_rsi(&closes, params.rsi_period),
                || {
                    rayon::join(
                        || bollinger::calculate_bollinger(&closes, params.bb_window, params.bb_dev),
                        || atr::calculate_atr(bars, params.atr_window),
                    )
                },
            )
        },
    );

    (0..bars.len())
        .map(|i| IndicatorRow {
            ema_fast: ema_fast[i],
            ema_slow: ema_slow[i],
            rsi: rsi[i],
            atr: atr[i],
            bb_width: bands[i].width,
            bb_position: bands[i].position,
        })
        .collect()
}
