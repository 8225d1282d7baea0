//! Core domain types and logic.

pub mod ohlcv;
pub mod indicator;
pub mod pivot;
pub mod divergence;
pub mod phase;
pub mod confidence;
pub mod trade;
pub mod ledger;
pub mod execution;
pub mod backtest;
pub mod metrics;
pub mod sweep;
pub mod synthetic;
pub mod config_validation;
pub mod error;
