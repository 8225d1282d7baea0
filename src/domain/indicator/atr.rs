//! Average True Range as a rolling mean of true range.
//!
//! TR[0] = high - low; TR[i] = max(H-L, |H-prevC|, |L-prevC|).
//! ATR[i] = mean of TR over the last `window` bars, or of all bars so far
//! while the window is still filling.

use crate::domain::ohlcv::Bar;

pub fn calculate_atr(bars: &[Bar], window: usize) -> Vec<f64> {
    let window = window.max(1);
    let mut trs = Vec::with_capacity(bars.len());
    let mut values = Vec::with_capacity(bars.len());
    let mut sum = 0.0;

    for (i, bar) in bars.iter().enumerate() {
        let tr = if i == 0 {
            bar.high - bar.low
        } else {
            bar.true_range(bars[i - 1].close)
        };
        trs.push(tr);
        sum += tr;
        if trs.len() > window {
            sum -= trs[trs.len() - 1 - window];
        }
        let count = trs.len().min(window) as f64;
        values.push(sum / count);
    }

    values
}
