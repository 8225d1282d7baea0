//! Pivot detection with an ATR-scaled prominence filter.
//!
//! Bar `i` is a pivot high when its close is the maximum of the symmetric
//! window `closes[i-lookback..=i+lookback]` and sits at least `0.5 * ATR[i]`
//! away from the window mean; pivot lows mirror this with the minimum. The
//! first and last `lookback` bars are never labeled.
//!
//! Labels are computed once over the whole series, so every query takes the
//! decision index `i` and only sees pivots with `j + lookback <= i`.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::domain::indicator::IndicatorRow;
use crate::domain::ohlcv::Bar;

const PROMINENCE_ATR_MULT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PivotKind {
    High,
    Low,
}

/// Per-bar tag; `None` for unlabeled bars.
pub type PivotLabel = Option<PivotKind>;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pivot {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub price: f64,
}

#[derive(Debug, Clone)]
pub struct PivotMap {
    lookback: usize,
    labels: Vec<PivotLabel>,
    highs: Vec<Pivot>,
    lows: Vec<Pivot>,
}

impl PivotMap {
    pub fn detect(bars: &[Bar], rows: &[IndicatorRow], lookback: usize) -> Self {
        let n = bars.len();
        let mut labels = vec![None; n];

        if lookback > 0 && n > 2 * lookback {
            let inner: Vec<PivotLabel> = (lookback..n - lookback)
                .into_par_iter()
                .map(|i| label_at(bars, rows[i].atr, i, lookback))
                .collect();
            labels[lookback..n - lookback].copy_from_slice(&inner);
        }

        let collect = |kind: PivotKind| -> Vec<Pivot> {
            labels
                .iter()
                .enumerate()
                .filter(|(_, label)| **label == Some(kind))
                .map(|(index, _)| Pivot {
                    index,
                    timestamp: bars[index].timestamp,
                    price: bars[index].close,
                })
                .collect()
        };
        let highs = collect(PivotKind::High);
        let lows = collect(PivotKind::Low);

        Self {
            lookback,
            labels,
            highs,
            lows,
        }
    }

    pub fn labels(&self) -> &[PivotLabel] {
        &self.labels
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    /// Pivots of `kind` usable by a decision at bar `i`, oldest first.
    pub fn confirmed_pivots(&self, kind: PivotKind, i: usize) -> &[Pivot] {
        let all = match kind {
            PivotKind::High => &self.highs,
            PivotKind::Low => &self.lows,
        };
        if i < self.lookback {
            return &all[..0];
        }
        let limit = i - self.lookback;
        let end = all.partition_point(|p| p.index <= limit);
        &all[..end]
    }

    /// Most recent confirmed pivot of `kind` within the trailing `window`
    /// bars ending at `i` (inclusive).
    pub fn recent_pivot(&self, kind: PivotKind, i: usize, window: usize) -> Option<Pivot> {
        let earliest = (i + 1).saturating_sub(window);
        self.confirmed_pivots(kind, i)
            .last()
            .filter(|p| p.index >= earliest)
            .copied()
    }
}

fn label_at(bars: &[Bar], atr: f64, i: usize, lookback: usize) -> PivotLabel {
    let window = &bars[i - lookback..=i + lookback];
    let close = bars[i].close;

    let mut max = f64::NEG_INFINITY;
    let mut min = f64::INFINITY;
    let mut sum = 0.0;
    for bar in window {
        max = max.max(bar.close);
        min = min.min(bar.close);
        sum += bar.close;
    }
    let mean = sum / window.len() as f64;
    let prominent = (close - mean).abs() >= PROMINENCE_ATR_MULT * atr;

    if close == max && prominent {
        Some(PivotKind::High)
    } else if close == min && prominent {
        Some(PivotKind::Low)
    } else {
        None
    }
}
