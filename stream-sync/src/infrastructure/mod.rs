//! Infrastructure Layer - adapters to the venue
//!
//! - WebSocketTransport: streaming connection delivering text messages
//! - Parsers: event decoders for the venue's JSON formats
//! - RestClient: snapshot source over the REST API

pub mod parsers;
pub mod rest_client;
pub mod websocket;

pub use parsers::{
    AggregateTradeDecoder, CandlestickDecoder, DepthDecoder, StreamEventDecoder, TradeDecoder,
};
pub use rest_client::{RestClient, RestError};
pub use websocket::{TransportError, TransportEvent, WebSocketTransport};

use crate::application::StreamClient;

pub type TradeClient = StreamClient<TradeDecoder>;
pub type AggregateTradeClient = StreamClient<AggregateTradeDecoder>;
pub type DepthClient = StreamClient<DepthDecoder>;
pub type CandlestickClient = StreamClient<CandlestickDecoder>;
pub type StreamEventClient = StreamClient<StreamEventDecoder>;
