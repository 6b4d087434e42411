use super::PriceLevel;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Immutable copy of a synchronized order book.
///
/// Bids are kept in descending price order and asks in ascending price
/// order, so index 0 of each side is the top of book. Empty levels are
/// never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderBook {
    symbol: String,
    last_update_id: u64,
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
}

impl OrderBook {
    pub fn new(
        symbol: impl Into<String>,
        last_update_id: u64,
        mut bids: Vec<PriceLevel>,
        mut asks: Vec<PriceLevel>,
    ) -> Self {
        bids.retain(|l| !l.is_empty());
        asks.retain(|l| !l.is_empty());
        bids.sort_by(|a, b| b.price.cmp(&a.price));
        asks.sort_by(|a, b| a.price.cmp(&b.price));
        bids.dedup_by(|a, b| a.price == b.price);
        asks.dedup_by(|a, b| a.price == b.price);

        OrderBook {
            symbol: symbol.into(),
            last_update_id,
            bids,
            asks,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn last_update_id(&self) -> u64 {
        self.last_update_id
    }

    pub fn bids(&self) -> &[PriceLevel] {
        &self.bids
    }

    pub fn asks(&self) -> &[PriceLevel] {
        &self.asks
    }

    pub fn best_bid(&self) -> Option<&PriceLevel> {
        self.bids.first()
    }

    pub fn best_ask(&self) -> Option<&PriceLevel> {
        self.asks.first()
    }

    /// Book truncated to the best `depth` levels per side
    pub fn top(&self, depth: usize) -> OrderBook {
        OrderBook {
            symbol: self.symbol.clone(),
            last_update_id: self.last_update_id,
            bids: self.bids.iter().take(depth).copied().collect(),
            asks: self.asks.iter().take(depth).copied().collect(),
        }
    }

    pub fn mid_market_price(&self) -> Option<Decimal> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some((bid.price + ask.price) / Decimal::TWO)
    }

    pub fn spread(&self) -> Option<Decimal> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some(ask.price - bid.price)
    }

    /// Quantity resting at `price` on either side, zero when absent
    pub fn quantity_at(&self, price: Decimal) -> Decimal {
        self.bids
            .iter()
            .chain(self.asks.iter())
            .find(|l| l.price == price)
            .map(|l| l.quantity)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, quantity: Decimal) -> PriceLevel {
        PriceLevel::new(price, quantity).unwrap()
    }

    fn make_book() -> OrderBook {
        OrderBook::new(
            "BTCUSDT",
            42,
            vec![
                level(dec!(99), dec!(2)),
                level(dec!(100), dec!(1)),
                level(dec!(98), dec!(0)),
            ],
            vec![level(dec!(102), dec!(4)), level(dec!(101), dec!(3))],
        )
    }

    #[test]
    fn test_sides_are_sorted() {
        let book = make_book();
        assert_eq!(book.last_update_id(), 42);
        assert_eq!(
            book.bids().iter().map(|l| l.price).collect::<Vec<_>>(),
            vec![dec!(100), dec!(99)]
        );
        assert_eq!(
            book.asks().iter().map(|l| l.price).collect::<Vec<_>>(),
            vec![dec!(101), dec!(102)]
        );
    }

    #[test]
    fn test_top_of_book() {
        let book = make_book();
        assert_eq!(book.best_bid().unwrap().price, dec!(100));
        assert_eq!(book.best_ask().unwrap().price, dec!(101));
        assert_eq!(book.spread(), Some(dec!(1)));
        assert_eq!(book.mid_market_price(), Some(dec!(100.5)));

        let top = book.top(1);
        assert_eq!(top.bids().len(), 1);
        assert_eq!(top.asks().len(), 1);
    }

    #[test]
    fn test_quantity_at() {
        let book = make_book();
        assert_eq!(book.quantity_at(dec!(99)), dec!(2));
        assert_eq!(book.quantity_at(dec!(102)), dec!(4));
        assert_eq!(book.quantity_at(dec!(98)), Decimal::ZERO);
    }

    #[test]
    fn test_empty_book() {
        let book = OrderBook::new("BTCUSDT", 0, vec![], vec![]);
        assert!(book.is_empty());
        assert_eq!(book.mid_market_price(), None);
        assert_eq!(book.spread(), None);
    }
}
