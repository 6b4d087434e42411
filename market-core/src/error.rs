use rust_decimal::Decimal;
use thiserror::Error;

/// Invalid market values rejected by the validating constructors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MarketError {
    #[error("Price must not be negative: {0}")]
    NegativePrice(Decimal),

    #[error("Quantity must not be negative: {0}")]
    NegativeQuantity(Decimal),

    #[error("Trade quantity must be greater than zero: {0}")]
    NonPositiveQuantity(Decimal),

    #[error("Last trade id {last} is before first trade id {first}")]
    TradeIdRange { first: u64, last: u64 },

    #[error("Unknown candlestick interval: {0}")]
    UnknownInterval(String),

    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(i64),
}
