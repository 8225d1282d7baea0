//! Market phase classification.
//!
//! Combines trend (EMA fast vs slow), momentum (RSI regime), volatility
//! (Bollinger width regime) and proximity to the latest confirmed pivots into
//! a `Phase`, a signed score and an entry/stop suggestion.
//!
//! Phase rules, first match wins:
//! 1. volatility low → Ranging/Consolidation
//! 2. bull trend, momentum neutral or oversold → Bull Pullback (near pivot low) or Bull Trend
//! 3. bear trend, momentum neutral or overbought → Bear Pullback (near pivot high) or Bear Trend
//! 4. oversold and high volatility → Reversal Candidate (bear exhausted)
//! 5. overbought and high volatility → Reversal Candidate (bull exhausted)
//! 6. otherwise → Unknown/Transition
//!
//! Divergence against the trend overrides the phase afterwards.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::divergence::{DivergenceFlag, DivergenceKind, detect_divergence};
use crate::domain::indicator::{IndicatorParams, IndicatorRow};
use crate::domain::ohlcv::Bar;
use crate::domain::pivot::{Pivot, PivotKind, PivotMap};
use crate::domain::trade::Side;

const SUGGESTION_STOP_ATR_MULT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trend {
    Bull,
    Bear,
    Flat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Momentum {
    Overbought,
    Oversold,
    Neutral,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Volatility {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Proximity {
    Far,
    NearLow,
    NearHigh,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Phase {
    Ranging,
    BullPullback,
    BullTrend,
    BearPullback,
    BearTrend,
    BearExhausted,
    BullExhausted,
    BearDivergence,
    BullDivergence,
    Unknown,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Phase::Ranging => "Ranging/Consolidation",
            Phase::BullPullback => "Bull Pullback",
            Phase::BullTrend => "Bull Trend",
            Phase::BearPullback => "Bear Pullback",
            Phase::BearTrend => "Bear Trend",
            Phase::BearExhausted => "Reversal Candidate (bear exhausted)",
            Phase::BullExhausted => "Reversal Candidate (bull exhausted)",
            Phase::BearDivergence => "Reversal Candidate (bear divergence)",
            Phase::BullDivergence => "Reversal Candidate (bull divergence)",
            Phase::Unknown => "Unknown/Transition",
        };
        write!(f, "{}", label)
    }
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Trend::Bull => write!(f, "bull"),
            Trend::Bear => write!(f, "bear"),
            Trend::Flat => write!(f, "flat"),
        }
    }
}

impl fmt::Display for Momentum {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Momentum::Overbought => write!(f, "overbought"),
            Momentum::Oversold => write!(f, "oversold"),
            Momentum::Neutral => write!(f, "neutral"),
        }
    }
}

impl fmt::Display for Volatility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Volatility::Low => write!(f, "low"),
            Volatility::Normal => write!(f, "normal"),
            Volatility::High => write!(f, "high"),
        }
    }
}

impl fmt::Display for Proximity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Proximity::Far => write!(f, "far"),
            Proximity::NearLow => write!(f, "near_low"),
            Proximity::NearHigh => write!(f, "near_high"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseThresholds {
    pub rsi_overbought: f64,
    pub rsi_oversold: f64,
    pub bb_width_low: f64,
    pub bb_width_high: f64,
    /// Pivot proximity radius in ATRs.
    pub proximity_atr_mult: f64,
}

impl Default for PhaseThresholds {
    fn default() -> Self {
        Self {
            rsi_overbought: 72.0,
            rsi_oversold: 28.0,
            bb_width_low: 0.015,
            bb_width_high: 0.07,
            proximity_atr_mult: 1.0,
        }
    }
}

/// Entry hint for the trend direction. Pullback to the fast EMA is always
/// offered; the pivot and its stop only exist when a confirmed pivot does.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntrySuggestion {
    pub side: Side,
    pub ema_level: f64,
    pub pivot: Option<Pivot>,
    pub stop: Option<f64>,
}

impl EntrySuggestion {
    pub fn references_pivot(&self) -> bool {
        self.pivot.is_some()
    }
}

impl fmt::Display for EntrySuggestion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self.side {
            Side::Long => "low",
            Side::Short => "high",
        };
        match (self.pivot, self.stop) {
            (Some(pivot), Some(stop)) => write!(
                f,
                "pullback to EMA {:.2} or pivot {} {:.2}, stop {:.2}",
                self.ema_level, kind, pivot.price, stop
            ),
            _ => write!(f, "pullback to EMA {:.2} or mid-band", self.ema_level),
        }
    }
}

/// Everything the classifier reads for one bar.
#[derive(Debug, Clone, Copy)]
pub struct PhaseInputs<'a> {
    pub close: f64,
    pub row: &'a IndicatorRow,
    pub pivot_low: Option<Pivot>,
    pub pivot_high: Option<Pivot>,
    pub bearish_divergence: Option<DivergenceFlag>,
    pub bullish_divergence: Option<DivergenceFlag>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseReading {
    pub phase: Phase,
    pub trend: Trend,
    pub momentum: Momentum,
    pub volatility: Volatility,
    pub proximity: Proximity,
    pub score: i32,
    pub pivot_low: Option<Pivot>,
    pub pivot_high: Option<Pivot>,
    pub bearish_divergence: Option<DivergenceFlag>,
    pub bullish_divergence: Option<DivergenceFlag>,
    pub suggestion: Option<EntrySuggestion>,
}

pub fn trend_of(row: &IndicatorRow) -> Trend {
    if row.ema_fast > row.ema_slow {
        Trend::Bull
    } else if row.ema_fast < row.ema_slow {
        Trend::Bear
    } else {
        Trend::Flat
    }
}

pub fn momentum_of(rsi: f64, thresholds: &PhaseThresholds) -> Momentum {
    if rsi > thresholds.rsi_overbought {
        Momentum::Overbought
    } else if rsi < thresholds.rsi_oversold {
        Momentum::Oversold
    } else {
        Momentum::Neutral
    }
}

pub fn volatility_of(bb_width: f64, thresholds: &PhaseThresholds) -> Volatility {
    if bb_width > thresholds.bb_width_high {
        Volatility::High
    } else if bb_width < thresholds.bb_width_low {
        Volatility::Low
    } else {
        Volatility::Normal
    }
}

/// near_low is checked first and near_high overwrites it when both hold.
fn proximity_of(inputs: &PhaseInputs<'_>, thresholds: &PhaseThresholds) -> Proximity {
    let atr = inputs.row.atr;
    let mut proximity = Proximity::Far;
    if atr <= 0.0 {
        return proximity;
    }
    let radius = thresholds.proximity_atr_mult * atr;
    let near = |pivot: Option<Pivot>| {
        pivot.is_some_and(|p| (inputs.close - p.price).abs() <= radius)
    };
    if near(inputs.pivot_low) {
        proximity = Proximity::NearLow;
    }
    if near(inputs.pivot_high) {
        proximity = Proximity::NearHigh;
    }
    proximity
}

fn suggestion_for(trend: Trend, inputs: &PhaseInputs<'_>) -> Option<EntrySuggestion> {
    let atr = inputs.row.atr;
    let ema_level = inputs.row.ema_fast;
    match trend {
        Trend::Bull => Some(EntrySuggestion {
            side: Side::Long,
            ema_level,
            pivot: inputs.pivot_low,
            stop: inputs
                .pivot_low
                .map(|p| (p.price - SUGGESTION_STOP_ATR_MULT * atr).max(0.0)),
        }),
        Trend::Bear => Some(EntrySuggestion {
            side: Side::Short,
            ema_level,
            pivot: inputs.pivot_high,
            stop: inputs
                .pivot_high
                .map(|p| p.price + SUGGESTION_STOP_ATR_MULT * atr),
        }),
        Trend::Flat => None,
    }
}

pub fn classify(inputs: &PhaseInputs<'_>, thresholds: &PhaseThresholds) -> PhaseReading {
    let row = inputs.row;
    let trend = trend_of(row);
    let momentum = momentum_of(row.rsi, thresholds);
    let volatility = volatility_of(row.bb_width, thresholds);
    let proximity = proximity_of(inputs, thresholds);

    let mut phase = match (trend, momentum, volatility) {
        (_, _, Volatility::Low) => Phase::Ranging,
        (Trend::Bull, Momentum::Neutral | Momentum::Oversold, _) => {
            if proximity == Proximity::NearLow {
                Phase::BullPullback
            } else {
                Phase::BullTrend
            }
        }
        (Trend::Bear, Momentum::Neutral | Momentum::Overbought, _) => {
            if proximity == Proximity::NearHigh {
                Phase::BearPullback
            } else {
                Phase::BearTrend
            }
        }
        (_, Momentum::Oversold, Volatility::High) => Phase::BearExhausted,
        (_, Momentum::Overbought, Volatility::High) => Phase::BullExhausted,
        _ => Phase::Unknown,
    };

    let mut score: i32 = match trend {
        Trend::Bull => 1,
        Trend::Bear => -1,
        Trend::Flat => 0,
    };
    match momentum {
        Momentum::Overbought => score -= 1,
        Momentum::Oversold => score += 1,
        Momentum::Neutral => {}
    }
    if volatility == Volatility::High {
        score *= 2;
    }

    if inputs.bearish_divergence.is_some() && trend == Trend::Bull {
        phase = Phase::BearDivergence;
        score -= 2;
    }
    if inputs.bullish_divergence.is_some() && trend == Trend::Bear {
        phase = Phase::BullDivergence;
        score += 2;
    }

    PhaseReading {
        phase,
        trend,
        momentum,
        volatility,
        proximity,
        score,
        pivot_low: inputs.pivot_low,
        pivot_high: inputs.pivot_high,
        bearish_divergence: inputs.bearish_divergence,
        bullish_divergence: inputs.bullish_divergence,
        suggestion: suggestion_for(trend, inputs),
    }
}

/// Gather the causal inputs for bar `i` and classify it.
pub fn classify_at(
    bars: &[Bar],
    rows: &[IndicatorRow],
    pivots: &PivotMap,
    i: usize,
    params: &IndicatorParams,
    thresholds: &PhaseThresholds,
) -> PhaseReading {
    let inputs = PhaseInputs {
        close: bars[i].close,
        row: &rows[i],
        pivot_low: pivots.recent_pivot(PivotKind::Low, i, params.pivot_window),
        pivot_high: pivots.recent_pivot(PivotKind::High, i, params.pivot_window),
        bearish_divergence: detect_divergence(pivots, rows, DivergenceKind::Bearish, i),
        bullish_divergence: detect_divergence(pivots, rows, DivergenceKind::Bullish, i),
    };
    classify(&inputs, thresholds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn row(ema_fast: f64, ema_slow: f64, rsi: f64, bb_width: f64, atr: f64) -> IndicatorRow {
        IndicatorRow {
            ema_fast,
            ema_slow,
            rsi,
            atr,
            bb_width,
            bb_position: 0.5,
        }
    }

    fn pivot(price: f64) -> Pivot {
        Pivot {
            index: 0,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            price,
        }
    }

    fn flag(kind: DivergenceKind) -> DivergenceFlag {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        DivergenceFlag {
            kind,
            pivot_pair: (t, t),
        }
    }

    fn inputs(close: f64, row: &IndicatorRow) -> PhaseInputs<'_> {
        PhaseInputs {
            close,
            row,
            pivot_low: None,
            pivot_high: None,
            bearish_divergence: None,
            bullish_divergence: None,
        }
    }

    fn run(inputs: &PhaseInputs<'_>) -> PhaseReading {
        classify(inputs, &PhaseThresholds::default())
    }

    #[test]
    fn low_volatility_is_ranging_first() {
        let r = row(105.0, 100.0, 50.0, 0.01, 1.0);
        let reading = run(&inputs(105.0, &r));
        assert_eq!(reading.phase, Phase::Ranging);
        assert_eq!(reading.phase.to_string(), "Ranging/Consolidation");
        assert_eq!(reading.score, 1);
    }

    #[test]
    fn bull_trend_and_pullback() {
        let r = row(105.0, 100.0, 55.0, 0.03, 2.0);
        assert_eq!(run(&inputs(104.0, &r)).phase, Phase::BullTrend);

        let mut near = inputs(104.0, &r);
        near.pivot_low = Some(pivot(103.0));
        let reading = run(&near);
        assert_eq!(reading.phase, Phase::BullPullback);
        assert_eq!(reading.proximity, Proximity::NearLow);
    }

    #[test]
    fn near_high_overwrites_near_low() {
        let r = row(105.0, 100.0, 55.0, 0.03, 2.0);
        let mut both = inputs(104.0, &r);
        both.pivot_low = Some(pivot(103.0));
        both.pivot_high = Some(pivot(105.0));
        let reading = run(&both);
        assert_eq!(reading.proximity, Proximity::NearHigh);
        assert_eq!(reading.phase, Phase::BullTrend);
    }

    #[test]
    fn zero_atr_is_never_near() {
        let r = row(105.0, 100.0, 55.0, 0.03, 0.0);
        let mut at_pivot = inputs(103.0, &r);
        at_pivot.pivot_low = Some(pivot(103.0));
        assert_eq!(run(&at_pivot).proximity, Proximity::Far);
    }

    #[test]
    fn bear_trend_and_pullback() {
        let r = row(95.0, 100.0, 50.0, 0.03, 2.0);
        let reading = run(&inputs(96.0, &r));
        assert_eq!(reading.phase, Phase::BearTrend);
        assert_eq!(reading.score, -1);

        let mut near = inputs(96.0, &r);
        near.pivot_high = Some(pivot(97.5));
        assert_eq!(run(&near).phase, Phase::BearPullback);
    }

    #[test]
    fn exhausted_reversals_in_high_volatility() {
        // bull trend with overbought momentum skips rule 2
        let r = row(105.0, 100.0, 80.0, 0.09, 2.0);
        let reading = run(&inputs(110.0, &r));
        assert_eq!(reading.phase, Phase::BullExhausted);
        // (1 - 1) * 2
        assert_eq!(reading.score, 0);

        let r = row(95.0, 100.0, 20.0, 0.09, 2.0);
        let reading = run(&inputs(90.0, &r));
        assert_eq!(reading.phase, Phase::BearExhausted);
        assert_eq!(reading.score, 0);
    }

    #[test]
    fn overbought_bull_normal_vol_is_unknown() {
        let r = row(105.0, 100.0, 80.0, 0.03, 2.0);
        let reading = run(&inputs(110.0, &r));
        assert_eq!(reading.phase, Phase::Unknown);
        assert_eq!(reading.phase.to_string(), "Unknown/Transition");
    }

    #[test]
    fn high_volatility_doubles_score() {
        let r = row(100.0, 100.0, 20.0, 0.09, 2.0);
        let reading = run(&inputs(100.0, &r));
        assert_eq!(reading.trend, Trend::Flat);
        assert_eq!(reading.score, 2);
    }

    #[test]
    fn bearish_divergence_overrides_bull() {
        let r = row(105.0, 100.0, 55.0, 0.03, 2.0);
        let mut div = inputs(104.0, &r);
        div.bearish_divergence = Some(flag(DivergenceKind::Bearish));
        let reading = run(&div);
        assert_eq!(reading.phase, Phase::BearDivergence);
        assert_eq!(reading.score, -1);
    }

    #[test]
    fn bullish_divergence_overrides_bear() {
        let r = row(95.0, 100.0, 50.0, 0.01, 2.0);
        let mut div = inputs(96.0, &r);
        div.bullish_divergence = Some(flag(DivergenceKind::Bullish));
        let reading = run(&div);
        assert_eq!(reading.phase, Phase::BullDivergence);
        assert_eq!(reading.score, 1);
    }

    #[test]
    fn divergence_with_trend_is_ignored() {
        let r = row(105.0, 100.0, 55.0, 0.03, 2.0);
        let mut div = inputs(104.0, &r);
        div.bullish_divergence = Some(flag(DivergenceKind::Bullish));
        assert_eq!(run(&div).phase, Phase::BullTrend);
    }

    #[test]
    fn bull_suggestion_with_pivot_stop() {
        let r = row(105.0, 100.0, 55.0, 0.03, 2.0);
        let mut with_pivot = inputs(110.0, &r);
        with_pivot.pivot_low = Some(pivot(100.0));
        let suggestion = run(&with_pivot).suggestion.unwrap();
        assert_eq!(suggestion.side, Side::Long);
        assert!(suggestion.references_pivot());
        assert!((suggestion.stop.unwrap() - 99.0).abs() < f64::EPSILON);
    }

    #[test]
    fn suggestion_stop_floored_at_zero() {
        let r = row(1.05, 1.0, 55.0, 0.03, 4.0);
        let mut with_pivot = inputs(1.1, &r);
        with_pivot.pivot_low = Some(pivot(1.0));
        let suggestion = run(&with_pivot).suggestion.unwrap();
        assert_eq!(suggestion.stop, Some(0.0));
    }

    #[test]
    fn suggestion_without_pivot_has_no_stop() {
        let r = row(95.0, 100.0, 50.0, 0.03, 2.0);
        let suggestion = run(&inputs(96.0, &r)).suggestion.unwrap();
        assert_eq!(suggestion.side, Side::Short);
        assert!(suggestion.stop.is_none());
        assert!(!suggestion.references_pivot());
    }

    #[test]
    fn flat_trend_has_no_suggestion() {
        let r = row(100.0, 100.0, 50.0, 0.03, 2.0);
        assert!(run(&inputs(100.0, &r)).suggestion.is_none());
    }

    #[test]
    fn configurable_thresholds() {
        let r = row(105.0, 100.0, 65.0, 0.03, 2.0);
        let thresholds = PhaseThresholds {
            rsi_overbought: 60.0,
            ..PhaseThresholds::default()
        };
        let reading = classify(&inputs(110.0, &r), &thresholds);
        assert_eq!(reading.momentum, Momentum::Overbought);
        assert_eq!(reading.score, 0);
    }
}
