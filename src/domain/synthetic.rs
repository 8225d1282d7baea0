//! Deterministic synthetic bars for offline runs and tests.
//!
//! Random walk with drift: price[i] = start * prod(1 + r[k]), r ~ N(0.0002, 0.01).
//! open = price, close = price * (1 + N(0, 0.001)); high and low widen the
//! open/close range by |N(0, 0.002)|. The same seed always yields the same bars.

use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use super::ohlcv::Bar;

const DRIFT: f64 = 0.0002;
const VOLATILITY: f64 = 0.01;
const CLOSE_NOISE: f64 = 0.001;
const WICK_NOISE: f64 = 0.002;

/// First bar timestamp, 2024-01-01T00:00:00Z.
pub fn synthetic_start() -> DateTime<Utc> {
    Utc.timestamp_opt(1_704_067_200, 0)
        .single()
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn normal(mean: f64, std_dev: f64) -> Normal<f64> {
    Normal::new(mean, std_dev)
        .unwrap_or_else(|e| panic!("normal({mean}, {std_dev}) rejected: {e}"))
}

fn draw(rng: &mut StdRng, n: usize, dist: &Normal<f64>) -> Vec<f64> {
    dist.sample_iter(&mut *rng).take(n).collect()
}

pub fn generate_bars(n: usize, seed: u64, start_price: f64, interval: Duration) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(seed);

    let return_dist = normal(DRIFT, VOLATILITY);
    let close_dist = normal(0.0, CLOSE_NOISE);
    let wick_dist = normal(0.0, WICK_NOISE);

    let returns = draw(&mut rng, n, &return_dist);
    let close_noise = draw(&mut rng, n, &close_dist);
    let high_noise = draw(&mut rng, n, &wick_dist);
    let low_noise = draw(&mut rng, n, &wick_dist);
    let volumes: Vec<u32> = (0..n).map(|_| rng.gen_range(100..1000)).collect();

    let start = synthetic_start();
    let mut price = start_price;
    let mut bars = Vec::with_capacity(n);

    for i in 0..n {
        price *= 1.0 + returns[i];
        let open = price;
        let close = price * (1.0 + close_noise[i]);
        let high = open.max(close) * (1.0 + high_noise[i].abs());
        let low = open.min(close) * (1.0 - low_noise[i].abs());

        bars.push(Bar {
            timestamp: start + interval * i as i32,
            open,
            high,
            low,
            close,
            volume: volumes[i] as f64,
        });
    }

    bars
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ohlcv::validate_series;

    #[test]
    fn same_seed_same_bars() {
        let a = generate_bars(200, 42, 1000.0, Duration::minutes(15));
        let b = generate_bars(200, 42, 1000.0, Duration::minutes(15));
        assert_eq!(a, b);
    }

    #[test]
    fn different_seed_different_bars() {
        let a = generate_bars(50, 1, 1000.0, Duration::minutes(15));
        let b = generate_bars(50, 2, 1000.0, Duration::minutes(15));
        assert_ne!(a, b);
    }

    #[test]
    fn bars_are_well_formed() {
        let bars = generate_bars(500, 3, 100.0, Duration::minutes(15));
        assert_eq!(bars.len(), 500);
        assert!(validate_series(&bars).is_ok());
        for bar in &bars {
            assert!(bar.high >= bar.open.max(bar.close));
            assert!(bar.low <= bar.open.min(bar.close));
            assert!((100.0..1000.0).contains(&bar.volume));
        }
    }

    #[test]
    fn fixed_interval_from_start() {
        let bars = generate_bars(3, 0, 100.0, Duration::hours(1));
        assert_eq!(bars[0].timestamp, synthetic_start());
        assert_eq!(bars[2].timestamp - bars[0].timestamp, Duration::hours(2));
    }

    #[test]
    fn open_to_open_returns_follow_drift_and_volatility() {
        let bars = generate_bars(20_000, 17, 100.0, Duration::minutes(15));
        let returns: Vec<f64> = bars.windows(2).map(|w| w[1].open / w[0].open - 1.0).collect();

        let n = returns.len() as f64;
        let mean = returns.iter().sum::<f64>() / n;
        let var = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);

        // 4 standard errors either side
        assert!((mean - DRIFT).abs() < 4.0 * VOLATILITY / n.sqrt(), "mean {mean}");
        assert!((var.sqrt() - VOLATILITY).abs() < 0.0005, "std {}", var.sqrt());
    }

    #[test]
    fn zero_bars() {
        assert!(generate_bars(0, 0, 100.0, Duration::minutes(15)).is_empty());
    }
}
