use market_core::CandlestickInterval;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::application::{ConnectionConfig, MarketDataConfig};

/// Root configuration file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfigFile {
    /// WebSocket base URL, without the `/ws` or `/stream` path
    pub ws_url: String,
    /// REST API base URL
    pub rest_url: String,
    #[serde(default)]
    pub api_key: String,
    /// Caches and plain streams to run
    #[serde(default)]
    pub caches: Vec<CacheConfig>,
    #[serde(default)]
    pub market_data: MarketDataConfigJson,
    /// Delay before the binary reconnects a closed stream
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
}

impl StreamConfigFile {
    pub fn connection(&self) -> ConnectionConfig {
        ConnectionConfig::new(
            self.rest_url.clone(),
            self.ws_url.clone(),
            self.api_key.clone(),
        )
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CacheKind {
    #[serde(rename = "trade")]
    Trade,
    #[serde(rename = "aggTrade")]
    AggregateTrade,
    #[serde(rename = "depth")]
    Depth,
    /// Candlesticks are streamed without a cache
    #[serde(rename = "kline")]
    Candlestick,
}

/// One cache (or plain stream) entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub kind: CacheKind,
    pub symbol: String,
    /// Window size for trade caches, depth levels (0, 5, 10, 20) for books
    #[serde(default)]
    pub limit: Option<u32>,
    /// Required for `kline`
    #[serde(default)]
    pub interval: Option<CandlestickInterval>,
}

impl CacheConfig {
    pub fn trade_limit(&self) -> usize {
        self.limit.map(|l| l as usize).unwrap_or(default_trade_limit())
    }

    pub fn depth_limit(&self) -> u32 {
        self.limit.unwrap_or(0)
    }
}

/// Market data configuration (JSON representation)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketDataConfigJson {
    #[serde(default = "default_snapshot_depth")]
    pub snapshot_depth: u32,
    #[serde(default = "default_max_buffer_size")]
    pub max_buffer_size: usize,
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,
}

impl Default for MarketDataConfigJson {
    fn default() -> Self {
        MarketDataConfigJson {
            snapshot_depth: default_snapshot_depth(),
            max_buffer_size: default_max_buffer_size(),
            event_channel_capacity: default_event_channel_capacity(),
        }
    }
}

impl MarketDataConfigJson {
    /// Convert to application-layer MarketDataConfig
    pub fn to_market_data_config(&self) -> MarketDataConfig {
        MarketDataConfig::new()
            .with_snapshot_depth(self.snapshot_depth)
            .with_max_buffer_size(self.max_buffer_size)
            .with_event_channel_capacity(self.event_channel_capacity)
    }
}

// Default value functions for serde
fn default_trade_limit() -> usize {
    100
}

fn default_snapshot_depth() -> u32 {
    1000
}

fn default_max_buffer_size() -> usize {
    1000
}

fn default_event_channel_capacity() -> usize {
    4096
}

fn default_reconnect_delay() -> u64 {
    5000
}
