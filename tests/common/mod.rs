#![allow(dead_code)]

use chrono::Duration;
use phasetrader::domain::backtest::BacktestConfig;
use phasetrader::domain::error::PhaseTraderError;
pub use phasetrader::domain::ohlcv::Bar;
use phasetrader::domain::synthetic::synthetic_start;
use phasetrader::ports::data_port::DataPort;
use std::collections::HashMap;

pub struct MockDataPort {
    pub data: HashMap<String, Vec<Bar>>,
    pub errors: HashMap<String, String>,
}

impl MockDataPort {
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
            errors: HashMap::new(),
        }
    }

    pub fn with_bars(mut self, symbol: &str, bars: Vec<Bar>) -> Self {
        self.data.insert(symbol.to_string(), bars);
        self
    }

    pub fn with_error(mut self, symbol: &str, reason: &str) -> Self {
        self.errors.insert(symbol.to_string(), reason.to_string());
        self
    }
}

impl DataPort for MockDataPort {
    fn load_bars(&self, symbol: &str) -> Result<Vec<Bar>, PhaseTraderError> {
        if let Some(reason) = self.errors.get(symbol) {
            return Err(PhaseTraderError::Data {
                reason: reason.clone(),
            });
        }
        match self.data.get(symbol) {
            Some(bars) if !bars.is_empty() => Ok(bars.clone()),
            _ => Err(PhaseTraderError::NoData {
                symbol: symbol.to_string(),
            }),
        }
    }
}

/// Bars at 15 minute spacing. Each bar opens at the previous close and its
/// high/low sit `half_range` either side of the close.
pub fn bars_from_closes(closes: &[f64], half_range: f64) -> Vec<Bar> {
    let start = synthetic_start();
    let mut prev: Option<f64> = None;
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = prev.unwrap_or(close);
            prev = Some(close);
            Bar {
                timestamp: start + Duration::minutes(15 * i as i64),
                open,
                high: close + half_range,
                low: close - half_range,
                close,
                volume: 1000.0,
            }
        })
        .collect()
}

/// close = 100 + 0.05 i + 0.8 sin(2 pi i / 10), high/low = close +/- 1.
///
/// ATR is exactly 2.0 throughout and the fast EMA stays above the slow one.
/// Swings are too shallow to clear the pivot prominence threshold, so the
/// single long entry (filled at bar 57, still open at the end) takes the ATR
/// stop.
pub fn uptrend_bars(n: usize) -> Vec<Bar> {
    let closes: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64;
            100.0 + 0.05 * x + 0.8 * (std::f64::consts::TAU * x / 10.0).sin()
        })
        .collect();
    bars_from_closes(&closes, 1.0)
}

/// close = 100 + 0.15 i + 3 sin(2 pi i / 20), high/low = close +/- 1.
///
/// Swing lows sit at bars 14, 34, 54 and highs at 6, 26, 46, all clearing the
/// prominence threshold. The first long is decided at bar 50 against the
/// pivot low at bar 34 and fills at bar 51.
pub fn swing_bars(n: usize) -> Vec<Bar> {
    let closes: Vec<f64> = (0..n)
        .map(|i| {
            let x = i as f64;
            100.0 + 0.15 * x + 3.0 * (std::f64::consts::TAU * x / 20.0).sin()
        })
        .collect();
    bars_from_closes(&closes, 1.0)
}

/// close = 100 + 0.05 sin(0.9 i), high/low = close +/- 0.5. Bands stay far
/// below the low-width threshold so every bar reads as ranging.
pub fn flat_bars(n: usize) -> Vec<Bar> {
    let closes: Vec<f64> = (0..n)
        .map(|i| 100.0 + 0.05 * (0.9 * i as f64).sin())
        .collect();
    bars_from_closes(&closes, 0.5)
}

pub fn uptrend_config() -> BacktestConfig {
    BacktestConfig {
        risk_pct: 0.001,
        ..BacktestConfig::default()
    }
}

pub const SAMPLE_INI: &str = r#"
[data]
path = bars/SYN.csv

[backtest]
initial_capital = 10000
risk_pct = 0.001
slippage = 0.0008
fee = 0.0015
stop_atr_mult = 1.75
target_r = 3.0
enable_shorts = false
long_only = true
warmup_bars = 50

[indicators]
ema_fast = 13
ema_slow = 55
rsi_period = 14
bb_window = 20
bb_dev = 2.0
atr_window = 14
pivot_lookback = 5
pivot_window = 200

[phase]
rsi_overbought = 72
rsi_oversold = 28

[confidence]
trend = 0.5
momentum = 0.4
volatility = 0.1
"#;
