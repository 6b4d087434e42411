pub mod entities;
pub mod error;
pub mod value_objects;

// Re-export value objects at crate root for convenience
pub use value_objects::{
    CandlestickInterval, Timestamp, format_symbol, timestamp_from_millis, timestamp_to_millis,
};

// Re-export entities at crate root
pub use entities::{
    AggregateTrade, Candlestick, DepthSnapshot, OrderBook, PriceLevel, Sequenced, Trade,
};

pub use error::MarketError;
