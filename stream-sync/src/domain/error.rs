use thiserror::Error;

/// Failure to turn a stream message into a typed event
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Malformed JSON: {0}")]
    Json(String),

    #[error("Missing or invalid field '{0}'")]
    Field(&'static str),

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Invalid market value: {0}")]
    Market(#[from] market_core::MarketError),
}

/// Result of a user callback that did not complete normally
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallbackError {
    /// Cooperative cancellation, ignored by fan-out
    #[error("Callback cancelled")]
    Cancelled,

    #[error("Callback failed: {0}")]
    Failed(String),
}

/// Subscription precondition violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscribeError {
    #[error("Symbol must not be blank")]
    BlankSymbol,

    #[error("Already subscribed to {0}")]
    AlreadySubscribed(String),

    #[error("Invalid depth limit {0}, expected one of 0, 5, 10, 20")]
    InvalidDepthLimit(u32),

    #[error("Not subscribed to {0}")]
    NotSubscribed(String),
}
