//! Bollinger Bands, reduced to the two values the classifier reads.
//!
//! - Middle: mean of close over the last `window` bars
//! - Upper/Lower: middle ± dev × population std
//! - Width: (upper - lower) / middle, 0 when middle is 0
//! - Position: (close - lower) / (upper - lower), 0.5 when the bands coincide
//!
//! Before the window fills, the bars available so far form the window.

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BollingerPoint {
    pub width: f64,
    pub position: f64,
}

pub fn calculate_bollinger(closes: &[f64], window: usize, dev: f64) -> Vec<BollingerPoint> {
    let window = window.max(1);
    let mut values = Vec::with_capacity(closes.len());

    for i in 0..closes.len() {
        let start = (i + 1).saturating_sub(window);
        let slice = &closes[start..=i];
        let len = slice.len() as f64;

        let mean = slice.iter().sum::<f64>() / len;
        let variance = slice
            .iter()
            .map(|c| {
                let diff = c - mean;
                diff * diff
            })
            .sum::<f64>()
            / len;
        let stddev = variance.sqrt();

        let upper = mean + dev * stddev;
        let lower = mean - dev * stddev;

        let width = if mean == 0.0 { 0.0 } else { (upper - lower) / mean };
        let position = if upper == lower {
            0.5
        } else {
            (closes[i] - lower) / (upper - lower)
        };

        values.push(BollingerPoint { width, position });
    }

    values
}
