mod aggregate_trade;
mod candlestick;
mod depth_snapshot;
mod order_book;
mod price_level;
mod trade;

pub use aggregate_trade::AggregateTrade;
pub use candlestick::Candlestick;
pub use depth_snapshot::DepthSnapshot;
pub use order_book::OrderBook;
pub use price_level::PriceLevel;
pub use trade::Trade;

/// Entities carried by a venue stream with a monotonically increasing id
pub trait Sequenced {
    fn sequence_id(&self) -> u64;
}
