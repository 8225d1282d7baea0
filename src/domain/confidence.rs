//! Confidence scoring for position sizing.
//!
//! Each bar's trend spread, RSI and Bollinger width are z-scored against the
//! running distribution of all bars seen so far (including the current one),
//! blended with fixed weights and squashed through a logistic:
//!
//! raw = w_t * z_trend + w_m * z_momentum + w_v * z_volatility
//! confidence = 1 / (1 + e^-raw)
//!
//! A zero or undefined standard deviation divides by 1.0 instead, and any
//! non-finite intermediate gives the neutral 0.5.

use serde::{Deserialize, Serialize};

use crate::domain::indicator::IndicatorRow;

pub const NEUTRAL_CONFIDENCE: f64 = 0.5;

/// Welford accumulator: mean and sample standard deviation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunningStats {
    count: usize,
    mean: f64,
    m2: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, value: f64) {
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample (n-1) standard deviation; 0 with fewer than two samples.
    pub fn std_dev(&self) -> f64 {
        if self.count < 2 {
            return 0.0;
        }
        (self.m2 / (self.count - 1) as f64).sqrt()
    }

    pub fn z_score(&self, value: f64) -> f64 {
        let std = self.std_dev();
        let divisor = if std == 0.0 || !std.is_finite() {
            1.0
        } else {
            std
        };
        (value - self.mean) / divisor
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConfidenceWeights {
    pub trend: f64,
    pub momentum: f64,
    pub volatility: f64,
}

impl Default for ConfidenceWeights {
    fn default() -> Self {
        Self {
            trend: 0.5,
            momentum: 0.4,
            volatility: 0.1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ConfidenceScorer {
    weights: ConfidenceWeights,
    trend: RunningStats,
    momentum: RunningStats,
    volatility: RunningStats,
}

impl ConfidenceScorer {
    pub fn new(weights: ConfidenceWeights) -> Self {
        Self {
            weights,
            trend: RunningStats::new(),
            momentum: RunningStats::new(),
            volatility: RunningStats::new(),
        }
    }

    /// Add one bar to the running distributions. Call once per bar, in order.
    pub fn update(&mut self, row: &IndicatorRow) {
        self.trend.push(row.trend_spread());
        self.momentum.push(row.rsi);
        self.volatility.push(row.bb_width);
    }

    pub fn observed(&self) -> usize {
        self.trend.count()
    }

    pub fn score(&self, row: &IndicatorRow) -> f64 {
        let z_trend = self.trend.z_score(row.trend_spread());
        let z_momentum = self.momentum.z_score(row.rsi);
        let z_volatility = self.volatility.z_score(row.bb_width);

        let raw = self.weights.trend * z_trend
            + self.weights.momentum * z_momentum
            + self.weights.volatility * z_volatility;
        if !raw.is_finite() {
            return NEUTRAL_CONFIDENCE;
        }

        let confidence = 1.0 / (1.0 + (-raw).exp());
        if confidence.is_finite() {
            confidence
        } else {
            NEUTRAL_CONFIDENCE
        }
    }
}
