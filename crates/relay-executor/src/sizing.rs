//! Position sizing from fixed capital risk.

use relay_core::{CoreError, Price, Size};
use rust_decimal::Decimal;

/// Floor applied to the entry price before dividing by it.
pub const MIN_ENTRY_PRICE: Decimal = Decimal::from_parts(1, 0, 0, false, 9);

/// Raw order quantity: `usdt_per_trade * leverage / entry`.
///
/// Not yet on the instrument's quantity grid.
pub fn raw_quantity(usdt_per_trade: Decimal, leverage: u32, entry: Price) -> Result<Size, CoreError> {
    let notional = usdt_per_trade
        .checked_mul(Decimal::from(leverage))
        .ok_or_else(|| CoreError::Overflow(format!("{usdt_per_trade} * {leverage}")))?;
    let entry = entry.inner().max(MIN_ENTRY_PRICE);

    notional
        .checked_div(entry)
        .map(Size::new)
        .ok_or_else(|| CoreError::Overflow(format!("{notional} / {entry}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_min_entry_price() {
        assert_eq!(MIN_ENTRY_PRICE, dec!(0.000000001));
    }

    #[test]
    fn test_raw_quantity() {
        let qty = raw_quantity(dec!(100), 20, Price::new(dec!(150.0))).unwrap();
        assert_eq!(qty.inner().round_dp(6), dec!(13.333333));
    }

    #[test]
    fn test_zero_entry_is_floored() {
        let qty = raw_quantity(dec!(1), 1, Price::new(Decimal::ZERO)).unwrap();
        assert_eq!(qty.inner(), dec!(1000000000));

        let qty = raw_quantity(dec!(1), 1, Price::new(dec!(-5))).unwrap();
        assert_eq!(qty.inner(), dec!(1000000000));
    }
}
