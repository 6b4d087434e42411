use super::Sequenced;
use crate::error::MarketError;
use crate::value_objects::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Trades filled by the same taker order at the same price, merged by the venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateTrade {
    pub symbol: String,
    pub id: u64,
    pub price: Decimal,
    pub quantity: Decimal,
    pub first_trade_id: u64,
    pub last_trade_id: u64,
    pub time: Timestamp,
    pub is_buyer_maker: bool,
    pub is_best_price_match: bool,
}

impl AggregateTrade {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        symbol: impl Into<String>,
        id: u64,
        price: Decimal,
        quantity: Decimal,
        first_trade_id: u64,
        last_trade_id: u64,
        time: Timestamp,
        is_buyer_maker: bool,
        is_best_price_match: bool,
    ) -> Result<Self, MarketError> {
        if price.is_sign_negative() && !price.is_zero() {
            return Err(MarketError::NegativePrice(price));
        }
        if quantity <= Decimal::ZERO {
            return Err(MarketError::NonPositiveQuantity(quantity));
        }
        if last_trade_id < first_trade_id {
            return Err(MarketError::TradeIdRange {
                first: first_trade_id,
                last: last_trade_id,
            });
        }

        Ok(AggregateTrade {
            symbol: symbol.into(),
            id,
            price,
            quantity,
            first_trade_id,
            last_trade_id,
            time,
            is_buyer_maker,
            is_best_price_match,
        })
    }

    /// Number of raw trades merged into this one
    pub fn trade_count(&self) -> u64 {
        self.last_trade_id - self.first_trade_id + 1
    }
}

impl Sequenced for AggregateTrade {
    fn sequence_id(&self) -> u64 {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    #[test]
    fn test_valid_aggregate_trade() {
        let trade =
            AggregateTrade::new("BTCUSDT", 7, dec!(0.01), dec!(100), 10, 12, Utc::now(), true, true)
                .unwrap();
        assert_eq!(trade.sequence_id(), 7);
        assert_eq!(trade.trade_count(), 3);
    }

    #[test]
    fn test_zero_price_allowed() {
        assert!(
            AggregateTrade::new("BTCUSDT", 1, dec!(0), dec!(1), 1, 1, Utc::now(), false, true)
                .is_ok()
        );
    }

    #[test]
    fn test_invalid_values() {
        let now = Utc::now();
        assert_eq!(
            AggregateTrade::new("BTCUSDT", 1, dec!(-1), dec!(1), 1, 1, now, false, true),
            Err(MarketError::NegativePrice(dec!(-1)))
        );
        assert_eq!(
            AggregateTrade::new("BTCUSDT", 1, dec!(1), dec!(0), 1, 1, now, false, true),
            Err(MarketError::NonPositiveQuantity(dec!(0)))
        );
        assert_eq!(
            AggregateTrade::new("BTCUSDT", 1, dec!(1), dec!(1), 5, 4, now, false, true),
            Err(MarketError::TradeIdRange { first: 5, last: 4 })
        );
    }
}
