//! OHLCV bar representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PhaseTraderError;

/// One fixed-interval price bar. Series are ordered by strictly increasing
/// `timestamp`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// max(high - low, |high - prev_close|, |low - prev_close|)
    pub fn true_range(&self, prev_close: f64) -> f64 {
        let hl = self.high - self.low;
        let hc = (self.high - prev_close).abs();
        let lc = (self.low - prev_close).abs();
        hl.max(hc).max(lc)
    }
}

/// Check that timestamps strictly increase and prices are finite.
///
/// Loaders call this before handing a series to the simulator, which assumes
/// a clean series and does not re-check.
pub fn validate_series(bars: &[Bar]) -> Result<(), PhaseTraderError> {
    for (i, bar) in bars.iter().enumerate() {
        let prices = [bar.open, bar.high, bar.low, bar.close];
        if prices.iter().any(|p| !p.is_finite()) {
            return Err(PhaseTraderError::Data {
                reason: format!("non-finite price at bar {} ({})", i, bar.timestamp),
            });
        }
        if i > 0 && bar.timestamp <= bars[i - 1].timestamp {
            return Err(PhaseTraderError::Data {
                reason: format!(
                    "timestamps not strictly increasing at bar {} ({} after {})",
                    i,
                    bar.timestamp,
                    bars[i - 1].timestamp
                ),
            });
        }
    }
    Ok(())
}
