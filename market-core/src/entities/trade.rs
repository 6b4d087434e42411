use super::Sequenced;
use crate::value_objects::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A single raw trade reported by the venue
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub symbol: String,
    pub id: u64,
    pub price: Decimal,
    pub quantity: Decimal,
    /// Not reported by the recent-trades endpoint
    pub buyer_order_id: Option<u64>,
    pub seller_order_id: Option<u64>,
    pub time: Timestamp,
    pub is_buyer_maker: bool,
    pub is_best_price_match: bool,
}

impl Trade {
    /// Notional value of the trade
    pub fn value(&self) -> Decimal {
        self.price * self.quantity
    }
}

impl Sequenced for Trade {
    fn sequence_id(&self) -> u64 {
        self.id
    }
}
