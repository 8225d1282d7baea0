//! Trade records.
//!
//! A trade is `Pending` from its fill until a stop or target closes it, and
//! immutable once `Closed`. Exit fields only exist on the closed variant.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Long,
    Short,
}

impl Side {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            Side::Long => 1.0,
            Side::Short => -1.0,
        }
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Long => write!(f, "long"),
            Side::Short => write!(f, "short"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StopSource {
    Pivot,
    Atr,
}

impl fmt::Display for StopSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StopSource::Pivot => write!(f, "pivot"),
            StopSource::Atr => write!(f, "atr"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExitReason {
    Stop,
    Target,
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExitReason::Stop => write!(f, "stop"),
            ExitReason::Target => write!(f, "target"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeEntry {
    pub side: Side,
    pub entry_price: f64,
    pub stop_price: f64,
    pub target_price: f64,
    pub units: f64,
    pub entry_time: DateTime<Utc>,
    pub confidence: f64,
    pub stop_source: StopSource,
}

impl TradeEntry {
    /// Realized pnl for an exit at `exit_price`.
    ///
    /// Long: (exit - entry) * units. Short: (entry - exit) * units.
    pub fn pnl_at(&self, exit_price: f64) -> f64 {
        match self.side {
            Side::Long => (exit_price - self.entry_price) * self.units,
            Side::Short => (self.entry_price - exit_price) * self.units,
        }
    }

    pub fn stop_hit(&self, close: f64) -> bool {
        match self.side {
            Side::Long => close <= self.stop_price,
            Side::Short => close >= self.stop_price,
        }
    }

    pub fn target_hit(&self, close: f64) -> bool {
        match self.side {
            Side::Long => close >= self.target_price,
            Side::Short => close <= self.target_price,
        }
    }

    /// Signed position size held while this trade is open.
    pub fn signed_units(&self) -> f64 {
        self.side.sign() * self.units
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeExit {
    pub exit_price: f64,
    pub exit_time: DateTime<Utc>,
    pub pnl: f64,
    pub reason: ExitReason,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Trade {
    Pending(TradeEntry),
    Closed { entry: TradeEntry, exit: TradeExit },
}

impl Trade {
    pub fn entry(&self) -> &TradeEntry {
        match self {
            Trade::Pending(entry) => entry,
            Trade::Closed { entry, .. } => entry,
        }
    }

    pub fn exit(&self) -> Option<&TradeExit> {
        match self {
            Trade::Pending(_) => None,
            Trade::Closed { exit, .. } => Some(exit),
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Trade::Pending(_))
    }

    pub fn pnl(&self) -> Option<f64> {
        self.exit().map(|e| e.pnl)
    }

    /// Minutes between fill and exit, for closed trades.
    pub fn duration_minutes(&self) -> Option<f64> {
        self.exit()
            .map(|e| (e.exit_time - self.entry().entry_time).num_seconds() as f64 / 60.0)
    }

    /// pnl / |entry_price * units|, for closed trades.
    pub fn return_pct(&self) -> Option<f64> {
        let entry = self.entry();
        let notional = (entry.entry_price * entry.units).abs();
        self.pnl()
            .map(|pnl| if notional == 0.0 { 0.0 } else { pnl / notional })
    }
}
