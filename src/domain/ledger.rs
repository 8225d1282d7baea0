//! Run state owned by the simulator: capital, position, trades and equity.
//!
//! Invariant: `position_units != 0` exactly when one trade is `Pending`, and
//! at most one trade is ever `Pending`. Any transition that would break this
//! panics.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::trade::{ExitReason, Trade, TradeEntry, TradeExit};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    /// capital + position_units * close
    pub equity: f64,
    /// |position_units| * close
    pub exposure: f64,
    pub capital: f64,
    pub position_units: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Ledger {
    initial_capital: f64,
    capital: f64,
    position_units: f64,
    trades: Vec<Trade>,
    equity_curve: Vec<EquityPoint>,
}

impl Ledger {
    pub fn new(initial_capital: f64) -> Self {
        Ledger {
            initial_capital,
            capital: initial_capital,
            position_units: 0.0,
            trades: Vec::new(),
            equity_curve: Vec::new(),
        }
    }

    pub fn initial_capital(&self) -> f64 {
        self.initial_capital
    }

    pub fn capital(&self) -> f64 {
        self.capital
    }

    pub fn position_units(&self) -> f64 {
        self.position_units
    }

    pub fn is_flat(&self) -> bool {
        self.position_units == 0.0
    }

    pub fn trades(&self) -> &[Trade] {
        &self.trades
    }

    pub fn equity_curve(&self) -> &[EquityPoint] {
        &self.equity_curve
    }

    pub fn pending(&self) -> Option<&TradeEntry> {
        match self.trades.last() {
            Some(Trade::Pending(entry)) => Some(entry),
            _ => None,
        }
    }

    /// Record a new Pending trade and take on its position.
    pub fn open(&mut self, entry: TradeEntry) {
        assert!(
            self.is_flat() && self.pending().is_none(),
            "open with a trade already pending (units {})",
            self.position_units
        );
        assert!(
            entry.units > 0.0 && entry.units.is_finite(),
            "open with invalid units {}",
            entry.units
        );
        self.position_units = entry.signed_units();
        self.trades.push(Trade::Pending(entry));
    }

    /// Close the Pending trade at `exit_price`, book its pnl and go flat.
    pub fn close(
        &mut self,
        exit_price: f64,
        exit_time: DateTime<Utc>,
        reason: ExitReason,
    ) -> TradeExit {
        let Some(Trade::Pending(entry)) = self.trades.pop() else {
            panic!("close with no pending trade");
        };

        let pnl = entry.pnl_at(exit_price);
        self.capital += pnl;
        self.position_units = 0.0;

        let exit = TradeExit {
            exit_price,
            exit_time,
            pnl,
            reason,
        };
        self.trades.push(Trade::Closed {
            entry,
            exit: exit.clone(),
        });
        exit
    }

    /// Mark to market at `close` and append an equity point.
    pub fn record_equity(&mut self, timestamp: DateTime<Utc>, close: f64) {
        self.check_invariant();
        self.equity_curve.push(EquityPoint {
            timestamp,
            equity: self.capital + self.position_units * close,
            exposure: self.position_units.abs() * close,
            capital: self.capital,
            position_units: self.position_units,
        });
    }

    fn check_invariant(&self) {
        debug_assert!(
            self.trades.iter().filter(|t| t.is_pending()).count() <= 1,
            "more than one trade pending"
        );
        assert_eq!(
            self.position_units != 0.0,
            self.pending().is_some(),
            "position units {} disagree with pending trade state",
            self.position_units
        );
    }

    pub fn into_parts(self) -> (Vec<Trade>, Vec<EquityPoint>) {
        (self.trades, self.equity_curve)
    }
}
