//! Configuration building and validation.
//!
//! `build_backtest_config` reads every section through a `ConfigPort`
//! (missing keys take defaults) and validates the result once, before any
//! run starts.

use crate::domain::backtest::{BacktestConfig, EntryRules};
use crate::domain::confidence::ConfidenceWeights;
use crate::domain::error::PhaseTraderError;
use crate::domain::indicator::IndicatorParams;
use crate::domain::phase::PhaseThresholds;
use crate::ports::config_port::ConfigPort;

pub fn build_backtest_config(config: &dyn ConfigPort) -> Result<BacktestConfig, PhaseTraderError> {
    let d = BacktestConfig::default();

    let built = BacktestConfig {
        initial_capital: config.get_double("backtest", "initial_capital", d.initial_capital),
        risk_pct: config.get_double("backtest", "risk_pct", d.risk_pct),
        slippage: config.get_double("backtest", "slippage", d.slippage),
        fee: config.get_double("backtest", "fee", d.fee),
        stop_atr_mult: config.get_double("backtest", "stop_atr_mult", d.stop_atr_mult),
        target_r: config.get_double("backtest", "target_r", d.target_r),
        enable_shorts: config.get_bool("backtest", "enable_shorts", d.enable_shorts),
        long_only: config.get_bool("backtest", "long_only", d.long_only),
        warmup_bars: get_usize(config, "backtest", "warmup_bars", d.warmup_bars)?,
        indicators: build_indicator_params(config)?,
        phase: build_phase_thresholds(config),
        entry: build_entry_rules(config),
        confidence: build_confidence_weights(config),
    };

    validate_backtest_config(&built)?;
    Ok(built)
}

fn get_usize(
    config: &dyn ConfigPort,
    section: &str,
    key: &str,
    default: usize,
) -> Result<usize, PhaseTraderError> {
    let value = config.get_int(section, key, default as i64);
    usize::try_from(value)
        .map_err(|_| PhaseTraderError::invalid(section, key, format!("{} is negative", value)))
}

fn build_indicator_params(config: &dyn ConfigPort) -> Result<IndicatorParams, PhaseTraderError> {
    let d = IndicatorParams::default();
    Ok(IndicatorParams {
        ema_fast: get_usize(config, "indicators", "ema_fast", d.ema_fast)?,
        ema_slow: get_usize(config, "indicators", "ema_slow", d.ema_slow)?,
        rsi_period: get_usize(config, "indicators", "rsi_period", d.rsi_period)?,
        bb_window: get_usize(config, "indicators", "bb_window", d.bb_window)?,
        bb_dev: config.get_double("indicators", "bb_dev", d.bb_dev),
        atr_window: get_usize(config, "indicators", "atr_window", d.atr_window)?,
        pivot_lookback: get_usize(config, "indicators", "pivot_lookback", d.pivot_lookback)?,
        pivot_window: get_usize(config, "indicators", "pivot_window", d.pivot_window)?,
    })
}

fn build_phase_thresholds(config: &dyn ConfigPort) -> PhaseThresholds {
    let d = PhaseThresholds::default();
    PhaseThresholds {
        rsi_overbought: config.get_double("phase", "rsi_overbought", d.rsi_overbought),
        rsi_oversold: config.get_double("phase", "rsi_oversold", d.rsi_oversold),
        bb_width_low: config.get_double("phase", "bb_width_low", d.bb_width_low),
        bb_width_high: config.get_double("phase", "bb_width_high", d.bb_width_high),
        proximity_atr_mult: config.get_double("phase", "proximity_atr_mult", d.proximity_atr_mult),
    }
}

fn build_entry_rules(config: &dyn ConfigPort) -> EntryRules {
    let d = EntryRules::default();
    EntryRules {
        long_rsi_min: config.get_double("entry", "long_rsi_min", d.long_rsi_min),
        long_ema_buffer: config.get_double("entry", "long_ema_buffer", d.long_ema_buffer),
        short_rsi_max: config.get_double("entry", "short_rsi_max", d.short_rsi_max),
        short_ema_buffer: config.get_double("entry", "short_ema_buffer", d.short_ema_buffer),
        short_bb_width_min: config.get_double("entry", "short_bb_width_min", d.short_bb_width_min),
        short_proximity_atr_mult: config.get_double(
            "entry",
            "short_proximity_atr_mult",
            d.short_proximity_atr_mult,
        ),
        allow_ranging_entries: config.get_bool(
            "entry",
            "allow_ranging_entries",
            d.allow_ranging_entries,
        ),
    }
}

fn build_confidence_weights(config: &dyn ConfigPort) -> ConfidenceWeights {
    let d = ConfidenceWeights::default();
    ConfidenceWeights {
        trend: config.get_double("confidence", "trend", d.trend),
        momentum: config.get_double("confidence", "momentum", d.momentum),
        volatility: config.get_double("confidence", "volatility", d.volatility),
    }
}

pub fn validate_backtest_config(config: &BacktestConfig) -> Result<(), PhaseTraderError> {
    validate_capital_and_risk(config)?;
    validate_costs(config)?;
    validate_indicator_params(&config.indicators)?;
    validate_phase_thresholds(&config.phase)?;
    validate_weights(&config.confidence)?;
    Ok(())
}

fn validate_capital_and_risk(config: &BacktestConfig) -> Result<(), PhaseTraderError> {
    if !(config.initial_capital > 0.0 && config.initial_capital.is_finite()) {
        return Err(PhaseTraderError::invalid(
            "backtest",
            "initial_capital",
            "initial_capital must be positive",
        ));
    }
    if !(config.risk_pct > 0.0 && config.risk_pct <= 1.0) {
        return Err(PhaseTraderError::invalid(
            "backtest",
            "risk_pct",
            "risk_pct must be in (0, 1]",
        ));
    }
    if !(config.target_r > 0.0 && config.target_r.is_finite()) {
        return Err(PhaseTraderError::invalid(
            "backtest",
            "target_r",
            "target_r must be positive",
        ));
    }
    Ok(())
}

fn validate_costs(config: &BacktestConfig) -> Result<(), PhaseTraderError> {
    let non_negative = [
        ("slippage", config.slippage),
        ("fee", config.fee),
        ("stop_atr_mult", config.stop_atr_mult),
    ];
    for (key, value) in non_negative {
        if !(value >= 0.0 && value.is_finite()) {
            return Err(PhaseTraderError::invalid(
                "backtest",
                key,
                format!("{} must be non-negative", key),
            ));
        }
    }
    Ok(())
}

fn validate_indicator_params(params: &IndicatorParams) -> Result<(), PhaseTraderError> {
    let periods = [
        ("ema_fast", params.ema_fast),
        ("ema_slow", params.ema_slow),
        ("rsi_period", params.rsi_period),
        ("bb_window", params.bb_window),
        ("atr_window", params.atr_window),
        ("pivot_lookback", params.pivot_lookback),
        ("pivot_window", params.pivot_window),
    ];
    for (key, value) in periods {
        if value == 0 {
            return Err(PhaseTraderError::invalid(
                "indicators",
                key,
                format!("{} must be at least 1", key),
            ));
        }
    }
    if params.ema_fast >= params.ema_slow {
        return Err(PhaseTraderError::invalid(
            "indicators",
            "ema_fast",
            format!(
                "ema_fast ({}) must be shorter than ema_slow ({})",
                params.ema_fast, params.ema_slow
            ),
        ));
    }
    if !(params.bb_dev > 0.0 && params.bb_dev.is_finite()) {
        return Err(PhaseTraderError::invalid(
            "indicators",
            "bb_dev",
            "bb_dev must be positive",
        ));
    }
    Ok(())
}

fn validate_phase_thresholds(thresholds: &PhaseThresholds) -> Result<(), PhaseTraderError> {
    let os = thresholds.rsi_oversold;
    let ob = thresholds.rsi_overbought;
    if !(0.0 <= os && os < ob && ob <= 100.0) {
        return Err(PhaseTraderError::invalid(
            "phase",
            "rsi_overbought",
            format!(
                "need 0 <= rsi_oversold ({}) < rsi_overbought ({}) <= 100",
                os, ob
            ),
        ));
    }
    if !(thresholds.bb_width_low < thresholds.bb_width_high) {
        return Err(PhaseTraderError::invalid(
            "phase",
            "bb_width_low",
            format!(
                "bb_width_low ({}) must be below bb_width_high ({})",
                thresholds.bb_width_low, thresholds.bb_width_high
            ),
        ));
    }
    if !(thresholds.proximity_atr_mult >= 0.0) {
        return Err(PhaseTraderError::invalid(
            "phase",
            "proximity_atr_mult",
            "proximity_atr_mult must be non-negative",
        ));
    }
    Ok(())
}

fn validate_weights(weights: &ConfidenceWeights) -> Result<(), PhaseTraderError> {
    let all = [
        ("trend", weights.trend),
        ("momentum", weights.momentum),
        ("volatility", weights.volatility),
    ];
    for (key, value) in all {
        if !value.is_finite() {
            return Err(PhaseTraderError::invalid(
                "confidence",
                key,
                format!("{} weight must be finite", key),
            ));
        }
    }
    if all.iter().all(|(_, v)| *v == 0.0) {
        return Err(PhaseTraderError::invalid(
            "confidence",
            "trend",
            "confidence weights are all zero",
        ));
    }
    Ok(())
}
