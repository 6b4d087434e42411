//! Stream Sync Crate
//!
//! Keeps local market data views consistent with a venue's push feed.
//!
//! # Architecture
//!
//! ```text
//!   ┌──────────────────────┐        ┌──────────────────────┐
//!   │  WebSocketTransport  │        │      RestClient      │
//!   │ (text messages, one  │        │ (trades / depth      │
//!   │  connection)         │        │  snapshots)          │
//!   └──────────┬───────────┘        └──────────┬───────────┘
//!              │ MessageSink                   │ TradeFetcher / DepthFetcher
//!              ▼                               │
//!   ┌──────────────────────┐                   │
//!   │   StreamClient<D>    │ decode once,      │
//!   │ (registry + decoder) │ fan out by stream │
//!   └──────────┬───────────┘                   │
//!              │ per-stream callback           │
//!              ▼                               ▼
//!   ┌──────────────────────────────────────────────────────┐
//!   │ TradeWindowCache / OrderBookCache                    │
//!   │  worker task -> TradeWindowSync / DepthSynchronizer  │
//!   │  gap -> OutOfSync + snapshot fetch (unlocked)        │
//!   └──────────────────────────┬───────────────────────────┘
//!                              │ consistent snapshots
//!                              ▼
//!                         subscribers
//! ```

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

// Re-export key types
pub use domain::stream_name::{
    agg_trade_stream, combined_stream_uri, depth_stream, kline_stream, symbol_from_stream,
    trade_stream,
};
pub use domain::{
    AggregateTradeEvent, CallbackError, CandlestickEvent, DecodeError, DepthFetcher,
    DepthUpdateEvent, EventDecoder, FetchError, MessageSink, OutOfSync, StreamEvent,
    SubscribeError, SyncStatus, TradeEvent, TradeFetcher,
};

pub use application::{
    AggregateTradeCache, Callback, ConnectionConfig, DepthSynchronizer, MarketDataConfig,
    OrderBookCache, StreamClient, SubscriptionId, SubscriptionRegistry, TradeCache, TradeWindow,
    TradeWindowCache, callback,
};

pub use infrastructure::{
    AggregateTradeClient, AggregateTradeDecoder, CandlestickClient, CandlestickDecoder,
    DepthClient, DepthDecoder, RestClient, RestError, StreamEventClient, StreamEventDecoder,
    TradeClient, TradeDecoder, TransportError, TransportEvent, WebSocketTransport,
};

pub use config::{
    CacheConfig, CacheKind, ConfigError, StreamConfigFile, load_config, load_default_config,
};
