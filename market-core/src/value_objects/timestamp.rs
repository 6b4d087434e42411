use super::Timestamp;
use crate::error::MarketError;
use chrono::{TimeZone, Utc};

/// Convert venue epoch milliseconds into a UTC timestamp.
pub fn timestamp_from_millis(millis: i64) -> Result<Timestamp, MarketError> {
    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or(MarketError::InvalidTimestamp(millis))
}

/// Convert a UTC timestamp into epoch milliseconds.
pub fn timestamp_to_millis(timestamp: &Timestamp) -> i64 {
    timestamp.timestamp_millis()
}
