use async_trait::async_trait;
use market_core::DepthSnapshot;
use std::fmt;
use tokio_util::sync::CancellationToken;

use super::error::DecodeError;

/// Domain error for snapshot fetching operations
///
/// Infrastructure implementations convert their specific errors to this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Network or communication failure
    Network(String),
    /// API returned an error response
    Api { code: i32, message: String },
    /// Failed to parse the response
    Parse(String),
    /// The cancellation signal fired before the fetch completed
    Cancelled,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::Network(msg) => write!(f, "Network error: {}", msg),
            FetchError::Api { code, message } => write!(f, "API error {}: {}", code, message),
            FetchError::Parse(msg) => write!(f, "Parse error: {}", msg),
            FetchError::Cancelled => write!(f, "Fetch cancelled"),
        }
    }
}

impl std::error::Error for FetchError {}

/// Source of the most recent trades for a symbol, oldest first
#[async_trait]
pub trait TradeFetcher<T>: Send + Sync {
    async fn recent_trades(
        &self,
        symbol: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<T>, FetchError>;
}

/// Source of point-in-time order book depth
#[async_trait]
pub trait DepthFetcher: Send + Sync {
    async fn get_depth(
        &self,
        symbol: &str,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<DepthSnapshot, FetchError>;
}

/// Turns the JSON payload of one stream message into a typed event
///
/// Add new event kinds by adding decoders, not by changing the dispatcher.
pub trait EventDecoder: Send + Sync + 'static {
    type Event: Clone + Send + Sync + 'static;

    /// Event-type discriminator handled by this decoder, for logging
    fn name(&self) -> &'static str;

    fn decode(&self, stream: &str, data: &serde_json::Value) -> Result<Self::Event, DecodeError>;
}

/// Receives every complete text message a transport reads
pub trait MessageSink: Send + Sync {
    /// `stream` is the stream identifier of the connection the message arrived on
    fn on_message(&self, stream: &str, message: &str);
}
