use crate::error::MarketError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Represents a single price level in the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: Decimal,
    pub quantity: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, quantity: Decimal) -> Result<Self, MarketError> {
        if price.is_sign_negative() && !price.is_zero() {
            return Err(MarketError::NegativePrice(price));
        }
        if quantity.is_sign_negative() && !quantity.is_zero() {
            return Err(MarketError::NegativeQuantity(quantity));
        }
        Ok(PriceLevel { price, quantity })
    }

    /// A zero quantity level marks the removal of that price in a depth delta
    pub fn is_empty(&self) -> bool {
        self.quantity.is_zero()
    }
}

impl TryFrom<(Decimal, Decimal)> for PriceLevel {
    type Error = MarketError;

    fn try_from((price, quantity): (Decimal, Decimal)) -> Result<Self, Self::Error> {
        PriceLevel::new(price, quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_price_level() {
        let level = PriceLevel::new(dec!(100.5), dec!(2)).unwrap();
        assert_eq!(level.price, dec!(100.5));
        assert!(!level.is_empty());

        let removal = PriceLevel::new(dec!(100.5), dec!(0)).unwrap();
        assert!(removal.is_empty());
    }

    #[test]
    fn test_rejects_negative_values() {
        assert_eq!(
            PriceLevel::new(dec!(-1), dec!(1)),
            Err(MarketError::NegativePrice(dec!(-1)))
        );
        assert_eq!(
            PriceLevel::try_from((dec!(1), dec!(-0.5))),
            Err(MarketError::NegativeQuantity(dec!(-0.5)))
        );
    }
}
