//! Regular divergence between price and RSI across the last two confirmed
//! pivots of one kind.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::indicator::IndicatorRow;
use crate::domain::pivot::{PivotKind, PivotMap};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DivergenceKind {
    /// Higher pivot high with lower RSI.
    Bearish,
    /// Lower pivot low with higher RSI.
    Bullish,
}

impl DivergenceKind {
    pub fn pivot_kind(self) -> PivotKind {
        match self {
            DivergenceKind::Bearish => PivotKind::High,
            DivergenceKind::Bullish => PivotKind::Low,
        }
    }
}

/// Present only when a divergence was detected.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DivergenceFlag {
    pub kind: DivergenceKind,
    pub pivot_pair: (DateTime<Utc>, DateTime<Utc>),
}

/// Compare the two most recent pivots of `kind`'s pivot type visible at bar
/// `i`. Fewer than two pivots means no divergence.
pub fn detect_divergence(
    pivots: &PivotMap,
    rows: &[IndicatorRow],
    kind: DivergenceKind,
    i: usize,
) -> Option<DivergenceFlag> {
    let visible = pivots.confirmed_pivots(kind.pivot_kind(), i);
    let [prev, last] = visible.get(visible.len().checked_sub(2)?..)? else {
        return None;
    };

    let price_up = last.price > prev.price;
    let price_down = last.price < prev.price;
    let rsi_up = rows[last.index].rsi > rows[prev.index].rsi;
    let rsi_down = rows[last.index].rsi < rows[prev.index].rsi;

    let detected = match kind {
        DivergenceKind::Bearish => price_up && rsi_down,
        DivergenceKind::Bullish => price_down && rsi_up,
    };

    detected.then_some(DivergenceFlag {
        kind,
        pivot_pair: (prev.timestamp, last.timestamp),
    })
}
