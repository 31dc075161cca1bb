//! R-multiple arithmetic.
//!
//! 1R is the per-share distance from entry to the initial stop. Without an
//! initial stop, the floor distance stands in.

use rust_decimal::Decimal;

use crate::domain::portfolio::Position;

/// Per-share risk (1R).
#[must_use]
pub fn risk_per_share(position: &Position, floor_pct: Decimal) -> Decimal {
    position
        .initial_stop
        .map(|stop| (position.avg_entry_price - stop).abs())
        .filter(|r| *r > Decimal::ZERO)
        .unwrap_or(position.avg_entry_price * floor_pct)
}

/// Unrealized profit in R. Zero when 1R is zero.
#[must_use]
pub fn r_multiple(position: &Position, floor_pct: Decimal) -> Decimal {
    let risk = risk_per_share(position, floor_pct);
    if risk.is_zero() {
        return Decimal::ZERO;
    }
    position
        .side
        .favorable_move(position.avg_entry_price, position.current_price)
        / risk
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::portfolio::PositionSide;
    use crate::domain::shared::Symbol;
    use rust_decimal_macros::dec;

    #[test]
    fn r_uses_initial_stop() {
        let p = Position::new(Symbol::new("AAPL"), PositionSide::Long, dec!(10), dec!(100), dec!(106))
            .with_levels(Some(dec!(96)), None);
        assert_eq!(risk_per_share(&p, dec!(0.015)), dec!(4));
        assert_eq!(r_multiple(&p, dec!(0.015)), dec!(1.5));
    }

    #[test]
    fn r_falls_back_to_floor_for_shorts() {
        let p = Position::new(Symbol::new("TSLA"), PositionSide::Short, dec!(10), dec!(200), dec!(194));
        assert_eq!(risk_per_share(&p, dec!(0.015)), dec!(3.000));
        assert_eq!(r_multiple(&p, dec!(0.015)), dec!(2));
    }
}
