//! Exponential Moving Average.
//!
//! k = 2/(span+1), seeded with the first close, then
//! EMA[i] = EMA[i-1] + k*(C[i] - EMA[i-1]).
//! No warmup: every bar carries a value.

pub fn calculate_ema(closes: &[f64], span: usize) -> Vec<f64> {
    let k = 2.0 / (span.max(1) as f64 + 1.0);
    let mut values = Vec::with_capacity(closes.len());
    let mut ema = 0.0;

    for (i, &close) in closes.iter().enumerate() {
        ema = if i == 0 { close } else { ema + k * (close - ema) };
        values.push(ema);
    }

    values
}
