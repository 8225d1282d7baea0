//! Fill pricing and position sizing.
//!
//! Entries fill at the next bar's open with slippage against the trader.
//! Exits fill at the trigger price (bar close for stops, the fixed target for
//! targets) with slippage and a proportional fee, both against the trader.
//! Slippage and fee are fractions (0.0008 = 8 bp).

use super::trade::Side;

/// Long entry (buy): open * (1 + slippage).
pub fn apply_slippage_long_entry(market_price: f64, slippage: f64) -> f64 {
    market_price * (1.0 + slippage)
}

/// Short entry (sell short): open * (1 - slippage).
pub fn apply_slippage_short_entry(market_price: f64, slippage: f64) -> f64 {
    market_price * (1.0 - slippage)
}

/// Long exit (sell): price * (1 - slippage) - fee * price.
pub fn long_exit_price(trigger_price: f64, slippage: f64, fee: f64) -> f64 {
    trigger_price * (1.0 - slippage) - fee * trigger_price
}

/// Short exit (buy to cover): price * (1 + slippage) + fee * price.
pub fn short_exit_price(trigger_price: f64, slippage: f64, fee: f64) -> f64 {
    trigger_price * (1.0 + slippage) + fee * trigger_price
}

pub fn entry_fill(side: Side, next_open: f64, slippage: f64) -> f64 {
    match side {
        Side::Long => apply_slippage_long_entry(next_open, slippage),
        Side::Short => apply_slippage_short_entry(next_open, slippage),
    }
}

pub fn exit_fill(side: Side, trigger_price: f64, slippage: f64, fee: f64) -> f64 {
    match side {
        Side::Long => long_exit_price(trigger_price, slippage, fee),
        Side::Short => short_exit_price(trigger_price, slippage, fee),
    }
}

/// Distance from the fill bar's open to the stop, in the losing direction.
/// Non-positive means the stop is already through the open.
pub fn risk_per_unit(side: Side, next_open: f64, stop: f64) -> f64 {
    match side {
        Side::Long => next_open - stop,
        Side::Short => stop - next_open,
    }
}

/// units = capital * risk_pct * confidence / risk_per_unit.
/// Returns `None` when risk_per_unit is not positive.
pub fn position_units(
    capital: f64,
    risk_pct: f64,
    confidence: f64,
    risk_per_unit: f64,
) -> Option<f64> {
    if risk_per_unit <= 0.0 || !risk_per_unit.is_finite() {
        return None;
    }
    Some(capital * risk_pct * confidence / risk_per_unit)
}

/// entry + target_r * (entry - stop); the same expression serves both sides.
pub fn target_price(entry_price: f64, stop: f64, target_r: f64) -> f64 {
    entry_price + target_r * (entry_price - stop)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SLIP: f64 = 0.0008;
    const FEE: f64 = 0.0015;

    #[test]
    fn slippage_long_entry() {
        let price = apply_slippage_long_entry(100.0, 0.01);
        assert!((price - 101.0).abs() < 1e-10);
    }

    #[test]
    fn slippage_short_entry() {
        let price = apply_slippage_short_entry(100.0, 0.01);
        assert!((price - 99.0).abs() < 1e-10);
    }

    #[test]
    fn long_stop_exit_price() {
        let price = exit_fill(Side::Long, 90.0, SLIP, FEE);
        assert!((price - (90.0 * (1.0 - SLIP) - FEE * 90.0)).abs() < 1e-12);
    }

    #[test]
    fn short_exit_price_adds_costs() {
        let price = exit_fill(Side::Short, 90.0, SLIP, FEE);
        assert!((price - (90.0 * (1.0 + SLIP) + FEE * 90.0)).abs() < 1e-12);
        assert!(price > 90.0);
    }

    #[test]
    fn entry_fill_by_side() {
        assert!(entry_fill(Side::Long, 100.0, SLIP) > 100.0);
        assert!(entry_fill(Side::Short, 100.0, SLIP) < 100.0);
    }

    #[test]
    fn risk_per_unit_by_side() {
        assert!((risk_per_unit(Side::Long, 100.0, 95.0) - 5.0).abs() < f64::EPSILON);
        assert!((risk_per_unit(Side::Short, 100.0, 104.0) - 4.0).abs() < f64::EPSILON);
        assert!(risk_per_unit(Side::Long, 94.0, 95.0) < 0.0);
    }

    #[test]
    fn sizing_basic() {
        // 10000 * 0.001 * 0.5 / 2.0 = 2.5
        let units = position_units(10_000.0, 0.001, 0.5, 2.0).unwrap();
        assert!((units - 2.5).abs() < 1e-12);
    }

    #[test]
    fn sizing_skips_non_positive_risk() {
        assert!(position_units(10_000.0, 0.001, 0.5, 0.0).is_none());
        assert!(position_units(10_000.0, 0.001, 0.5, -1.0).is_none());
    }

    #[test]
    fn target_long_and_short() {
        assert!((target_price(100.0, 95.0, 3.0) - 115.0).abs() < f64::EPSILON);
        assert!((target_price(100.0, 105.0, 3.0) - 85.0).abs() < f64::EPSILON);
    }
}
