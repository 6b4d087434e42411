mod candlestick_interval;
mod symbol;
mod timestamp;

pub use candlestick_interval::CandlestickInterval;
pub use symbol::format_symbol;
pub use timestamp::{timestamp_from_millis, timestamp_to_millis};

pub type Timestamp = chrono::DateTime<chrono::Utc>;
