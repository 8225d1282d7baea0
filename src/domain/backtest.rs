//! Backtest simulator.
//!
//! A single-instrument, single-position state machine (FLAT, LONG_OPEN,
//! SHORT_OPEN) stepped bar by bar over a fully resident series. Indicators
//! and pivot labels are precomputed once (`PreparedSeries`); everything the
//! loop reads at bar `i` is restricted to bars `0..=i`, and fills use the
//! open of bar `i + 1`.
//!
//! The loop runs from `warmup_bars` to `len - 2` inclusive; the last bar is
//! reserved for the final fill and is marked to market once after the loop.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::confidence::{ConfidenceScorer, ConfidenceWeights};
use super::execution::{entry_fill, exit_fill, position_units, risk_per_unit, target_price};
use super::indicator::{IndicatorParams, IndicatorRow, compute_indicators};
use super::ledger::{EquityPoint, Ledger};
use super::metrics::Metrics;
use super::ohlcv::Bar;
use super::phase::{
    Momentum, Phase, PhaseReading, PhaseThresholds, Trend, Volatility, classify_at,
};
use super::pivot::PivotMap;
use super::trade::{ExitReason, Side, StopSource, Trade, TradeEntry};

/// Stop distance beyond a pivot, in ATRs.
const PIVOT_STOP_ATR_MULT: f64 = 0.5;

/// Entry filters applied on top of the phase reading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRules {
    pub long_rsi_min: f64,
    /// Long when close <= ema_fast * long_ema_buffer.
    pub long_ema_buffer: f64,
    pub short_rsi_max: f64,
    /// Short when close >= ema_fast * short_ema_buffer.
    pub short_ema_buffer: f64,
    pub short_bb_width_min: f64,
    pub short_proximity_atr_mult: f64,
    pub allow_ranging_entries: bool,
}

impl Default for EntryRules {
    fn default() -> Self {
        Self {
            long_rsi_min: 45.0,
            long_ema_buffer: 1.001,
            short_rsi_max: 45.0,
            short_ema_buffer: 0.998,
            short_bb_width_min: 0.01,
            short_proximity_atr_mult: 1.0,
            allow_ranging_entries: false,
        }
    }
}

/// One validated configuration per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestConfig {
    pub initial_capital: f64,
    /// Fraction of capital risked per trade before confidence scaling.
    pub risk_pct: f64,
    pub slippage: f64,
    pub fee: f64,
    pub stop_atr_mult: f64,
    pub target_r: f64,
    pub enable_shorts: bool,
    pub long_only: bool,
    pub warmup_bars: usize,
    pub indicators: IndicatorParams,
    pub phase: PhaseThresholds,
    pub entry: EntryRules,
    pub confidence: ConfidenceWeights,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            initial_capital: 10_000.0,
            risk_pct: 0.0015,
            slippage: 0.0008,
            fee: 0.0015,
            stop_atr_mult: 1.75,
            target_r: 3.0,
            enable_shorts: false,
            long_only: true,
            warmup_bars: 50,
            indicators: IndicatorParams::default(),
            phase: PhaseThresholds::default(),
            entry: EntryRules::default(),
            confidence: ConfidenceWeights::default(),
        }
    }
}

impl BacktestConfig {
    /// `long_only` wins over `enable_shorts`.
    pub fn shorts_enabled(&self) -> bool {
        self.enable_shorts && !self.long_only
    }

    /// Fewest bars a run needs before it is attempted.
    pub fn min_bars(&self) -> usize {
        self.warmup_bars + 2 * self.indicators.pivot_lookback
    }
}

/// Decision taken at a bar. Entry signals record the intent; whether the
/// next-bar fill went through shows up in the trade list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Signal {
    Hold,
    EnterLong,
    EnterShort,
    ExitStop,
    ExitTarget,
}

impl std::fmt::Display for Signal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Signal::Hold => "hold",
            Signal::EnterLong => "enter_long",
            Signal::EnterShort => "enter_short",
            Signal::ExitStop => "exit_stop",
            Signal::ExitTarget => "exit_target",
        };
        write!(f, "{}", label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarSignal {
    pub timestamp: DateTime<Utc>,
    pub phase: Phase,
    pub trend: Trend,
    pub momentum: Momentum,
    pub volatility: Volatility,
    pub score: i32,
    pub confidence: f64,
    pub signal: Signal,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BacktestResult {
    pub trades: Vec<Trade>,
    pub equity_curve: Vec<EquityPoint>,
    pub signals: Vec<BarSignal>,
    pub metrics: Metrics,
}

/// Indicator rows and pivot labels for one bar series.
#[derive(Debug, Clone)]
pub struct PreparedSeries {
    pub rows: Vec<IndicatorRow>,
    pub pivots: PivotMap,
}

impl PreparedSeries {
    pub fn new(bars: &[Bar], params: &IndicatorParams) -> Self {
        let rows = compute_indicators(bars, params);
        let pivots = PivotMap::detect(bars, &rows, params.pivot_lookback);
        Self { rows, pivots }
    }
}

pub fn run_backtest(bars: &[Bar], config: &BacktestConfig) -> BacktestResult {
    if bars.len() < config.min_bars() {
        return insufficient(bars.len(), config);
    }
    let prepared = PreparedSeries::new(bars, &config.indicators);
    run_prepared(bars, &prepared, config)
}

/// Run over a series already prepared with `config.indicators`.
pub fn run_prepared(
    bars: &[Bar],
    prepared: &PreparedSeries,
    config: &BacktestConfig,
) -> BacktestResult {
    let n = bars.len();
    if n < config.min_bars() || n < config.warmup_bars + 2 {
        return insufficient(n, config);
    }
    assert_eq!(
        prepared.rows.len(),
        n,
        "prepared series length does not match bars"
    );

    info!(
        bars = n,
        warmup = config.warmup_bars,
        shorts = config.shorts_enabled(),
        "starting backtest"
    );

    let mut sim = Simulator::new(bars, prepared, config);
    let signals: Vec<BarSignal> = (config.warmup_bars..n - 1).map(|i| sim.step(i)).collect();

    let last = &bars[n - 1];
    sim.ledger.record_equity(last.timestamp, last.close);

    let (trades, equity_curve) = sim.ledger.into_parts();
    let metrics = Metrics::compute(&trades, &equity_curve, config.initial_capital);

    info!(
        trades = trades.len(),
        final_equity = metrics.final_equity,
        "backtest complete"
    );

    BacktestResult {
        trades,
        equity_curve,
        signals,
        metrics,
    }
}

fn insufficient(n: usize, config: &BacktestConfig) -> BacktestResult {
    warn!(
        bars = n,
        required = config.min_bars(),
        "insufficient data, skipping run"
    );
    BacktestResult {
        trades: Vec::new(),
        equity_curve: Vec::new(),
        signals: Vec::new(),
        metrics: Metrics::insufficient(config.initial_capital),
    }
}

struct Simulator<'a> {
    bars: &'a [Bar],
    prepared: &'a PreparedSeries,
    config: &'a BacktestConfig,
    ledger: Ledger,
    scorer: ConfidenceScorer,
}

struct EntryPlan {
    side: Side,
    stop: f64,
    stop_source: StopSource,
}

impl<'a> Simulator<'a> {
    fn new(bars: &'a [Bar], prepared: &'a PreparedSeries, config: &'a BacktestConfig) -> Self {
        let mut scorer = ConfidenceScorer::new(config.confidence.clone());
        for row in &prepared.rows[..config.warmup_bars.min(bars.len())] {
            scorer.update(row);
        }
        Self {
            bars,
            prepared,
            config,
            ledger: Ledger::new(config.initial_capital),
            scorer,
        }
    }

    fn step(&mut self, i: usize) -> BarSignal {
        let bars = self.bars;
        let prepared = self.prepared;
        let bar = &bars[i];
        let row = &prepared.rows[i];

        self.scorer.update(row);
        self.ledger.record_equity(bar.timestamp, bar.close);

        let reading = classify_at(
            bars,
            &prepared.rows,
            &prepared.pivots,
            i,
            &self.config.indicators,
            &self.config.phase,
        );
        let confidence = self.scorer.score(row);

        let signal = if self.ledger.is_flat() {
            match self.plan_entry(bar, row, &reading) {
                Some(plan) => {
                    let signal = match plan.side {
                        Side::Long => Signal::EnterLong,
                        Side::Short => Signal::EnterShort,
                    };
                    self.fill_entry(i, plan, confidence);
                    signal
                }
                None => Signal::Hold,
            }
        } else {
            self.check_exit(bar)
        };

        BarSignal {
            timestamp: bar.timestamp,
            phase: reading.phase,
            trend: reading.trend,
            momentum: reading.momentum,
            volatility: reading.volatility,
            score: reading.score,
            confidence,
            signal,
        }
    }

    fn plan_entry(
        &self,
        bar: &Bar,
        row: &IndicatorRow,
        reading: &PhaseReading,
    ) -> Option<EntryPlan> {
        let rules = &self.config.entry;
        if reading.phase == Phase::Ranging && !rules.allow_ranging_entries {
            return None;
        }

        let close = bar.close;
        let references_pivot = reading.suggestion.is_some_and(|s| s.references_pivot());

        let long = reading.trend == Trend::Bull
            && (close <= row.ema_fast * rules.long_ema_buffer || references_pivot)
            && row.rsi >= rules.long_rsi_min
            && reading.bearish_divergence.is_none();
        if long {
            let plan = match reading.pivot_low {
                Some(pivot) => EntryPlan {
                    side: Side::Long,
                    stop: pivot.price - PIVOT_STOP_ATR_MULT * row.atr,
                    stop_source: StopSource::Pivot,
                },
                None => EntryPlan {
                    side: Side::Long,
                    stop: close - self.config.stop_atr_mult * row.atr,
                    stop_source: StopSource::Atr,
                },
            };
            return Some(plan);
        }

        if !self.config.shorts_enabled() {
            return None;
        }

        let near_pivot_high = reading
            .pivot_high
            .is_none_or(|p| (close - p.price).abs() <= rules.short_proximity_atr_mult * row.atr);
        let short = reading.trend == Trend::Bear
            && (close >= row.ema_fast * rules.short_ema_buffer || references_pivot)
            && row.rsi < rules.short_rsi_max
            && row.bb_width > rules.short_bb_width_min
            && reading.bullish_divergence.is_none()
            && near_pivot_high;
        if !short {
            return None;
        }

        let plan = match reading.pivot_high {
            Some(pivot) => EntryPlan {
                side: Side::Short,
                stop: pivot.price + PIVOT_STOP_ATR_MULT * row.atr,
                stop_source: StopSource::Pivot,
            },
            None => EntryPlan {
                side: Side::Short,
                stop: close + self.config.stop_atr_mult * row.atr,
                stop_source: StopSource::Atr,
            },
        };
        Some(plan)
    }

    fn fill_entry(&mut self, i: usize, plan: EntryPlan, confidence: f64) {
        let next = &self.bars[i + 1];
        let rpu = risk_per_unit(plan.side, next.open, plan.stop);
        let units = position_units(
            self.ledger.capital(),
            self.config.risk_pct,
            confidence,
            rpu,
        )
        .filter(|u| *u > 0.0 && u.is_finite());

        let Some(units) = units else {
            debug!(
                timestamp = %self.bars[i].timestamp,
                side = %plan.side,
                next_open = next.open,
                stop = plan.stop,
                risk_per_unit = rpu,
                "entry skipped"
            );
            return;
        };

        let entry_price = entry_fill(plan.side, next.open, self.config.slippage);
        let entry = TradeEntry {
            side: plan.side,
            entry_price,
            stop_price: plan.stop,
            target_price: target_price(entry_price, plan.stop, self.config.target_r),
            units,
            entry_time: next.timestamp,
            confidence,
            stop_source: plan.stop_source,
        };

        debug!(
            timestamp = %entry.entry_time,
            side = %entry.side,
            price = entry.entry_price,
            units = entry.units,
            stop = entry.stop_price,
            target = entry.target_price,
            stop_source = %entry.stop_source,
            "entry"
        );
        self.ledger.open(entry);
    }

    fn check_exit(&mut self, bar: &Bar) -> Signal {
        let Some(entry) = self.ledger.pending() else {
            panic!(
                "position units {} with no pending trade",
                self.ledger.position_units()
            );
        };

        let (reason, trigger) = if entry.stop_hit(bar.close) {
            (ExitReason::Stop, bar.close)
        } else if entry.target_hit(bar.close) {
            (ExitReason::Target, entry.target_price)
        } else {
            return Signal::Hold;
        };

        let side = entry.side;
        let exit_price = exit_fill(side, trigger, self.config.slippage, self.config.fee);
        let exit = self.ledger.close(exit_price, bar.timestamp, reason);

        debug!(
            timestamp = %bar.timestamp,
            side = %side,
            price = exit.exit_price,
            pnl = exit.pnl,
            reason = %reason,
            "exit"
        );

        match reason {
            ExitReason::Stop => Signal::ExitStop,
            ExitReason::Target => Signal::ExitTarget,
        }
    }
}
