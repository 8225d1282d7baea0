//! RSI (Relative Strength Index).
//!
//! Uses Wilder's smoothing for average gain/loss calculation:
//! - First average: simple mean of the first n gains/losses (at bar n)
//! - Subsequent: avg = (prev_avg * (n-1) + current) / n
//!
//! Formula: RSI = 100 - (100 / (1 + avg_gain / avg_loss))
//!
//! Neutral 50 before bar n, and whenever avg_loss == 0.

pub const NEUTRAL_RSI: f64 = 50.0;

pub fn calculate_rsi(closes: &[f64], period: usize) -> Vec<f64> {
    let mut values = vec![NEUTRAL_RSI; closes.len()];
    if period == 0 || closes.len() < 2 {
        return values;
    }

    let n = period as f64;
    let mut avg_gain = 0.0;
    let mut avg_loss = 0.0;

    for i in 1..closes.len() {
        let change = closes[i] - closes[i - 1];
        let gain = if change > 0.0 { change } else { 0.0 };
        let loss = if change < 0.0 { -change } else { 0.0 };

        if i < period {
            avg_gain += gain;
            avg_loss += loss;
            continue;
        } else if i == period {
            avg_gain = (avg_gain + gain) / n;
            avg_loss = (avg_loss + loss) / n;
        } else {
            avg_gain = (avg_gain * (n - 1.0) + gain) / n;
            avg_loss = (avg_loss * (n - 1.0) + loss) / n;
        }

        if avg_loss != 0.0 {
            values[i] = 100.0 - 100.0 / (1.0 + avg_gain / avg_loss);
        }
    }

    values
}
