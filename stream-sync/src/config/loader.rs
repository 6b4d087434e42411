use std::path::Path;
use thiserror::Error;

use super::types::{CacheKind, StreamConfigFile};
use crate::domain::stream_name::is_valid_depth_limit;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse config: {0}")]
    ParseError(#[from] serde_json::Error),
    #[error("No caches in config")]
    NoCaches,
    #[error("Cache #{0} has a blank symbol")]
    BlankSymbol(usize),
    #[error("Invalid depth limit {limit} for {symbol}")]
    InvalidDepthLimit { symbol: String, limit: u32 },
    #[error("Missing candlestick interval for {0}")]
    MissingInterval(String),
}

/// Load configuration from a JSON file
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<StreamConfigFile, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    load_config_from_str(&content)
}

/// Load configuration from a JSON string
pub fn load_config_from_str(json: &str) -> Result<StreamConfigFile, ConfigError> {
    let config: StreamConfigFile = serde_json::from_str(json)?;
    Ok(config)
}

/// Load the default embedded configuration
pub fn load_default_config() -> Result<StreamConfigFile, ConfigError> {
    let default_config = include_str!("stream_config.json");
    load_config_from_str(default_config)
}

impl StreamConfigFile {
    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.caches.is_empty() {
            return Err(ConfigError::NoCaches);
        }
        for (index, cache) in self.caches.iter().enumerate() {
            if cache.symbol.trim().is_empty() {
                return Err(ConfigError::BlankSymbol(index));
            }
            match cache.kind {
                CacheKind::Depth if !is_valid_depth_limit(cache.depth_limit()) => {
                    return Err(ConfigError::InvalidDepthLimit {
                        symbol: cache.symbol.clone(),
                        limit: cache.depth_limit(),
                    });
                }
                CacheKind::Candlestick if cache.interval.is_none() => {
                    return Err(ConfigError::MissingInterval(cache.symbol.clone()));
                }
                _ => {}
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::CandlestickInterval;

    #[test]
    fn test_load_default_config() {
        let config = load_default_config().unwrap();
        assert!(!config.caches.is_empty());
        assert!(config.validate().is_ok());
        assert_eq!(config.market_data.snapshot_depth, 1000);
    }

    #[test]
    fn test_defaults_applied() {
        let config = load_config_from_str(
            r#"{
                "ws_url": "wss://stream.binance.com:9443",
                "rest_url": "https://api.binance.com",
                "caches": [{ "kind": "aggTrade", "symbol": "BTCUSDT" }]
            }"#,
        )
        .unwrap();
        assert_eq!(config.api_key, "");
        assert_eq!(config.caches[0].trade_limit(), 100);
        assert_eq!(config.market_data.max_buffer_size, 1000);
        assert_eq!(config.market_data.event_channel_capacity, 4096);
        assert_eq!(config.reconnect_delay_ms, 5000);
    }

    #[test]
    fn test_kline_interval() {
        let config = load_config_from_str(
            r#"{
                "ws_url": "ws://localhost",
                "rest_url": "http://localhost",
                "caches": [{ "kind": "kline", "symbol": "ETHUSDT", "interval": "1M" }]
            }"#,
        )
        .unwrap();
        assert_eq!(config.caches[0].interval, Some(CandlestickInterval::OneMonth));
    }

    #[test]
    fn test_validate_rejects_bad_entries() {
        let empty = load_config_from_str(
            r#"{ "ws_url": "ws://localhost", "rest_url": "http://localhost" }"#,
        )
        .unwrap();
        assert!(matches!(empty.validate(), Err(ConfigError::NoCaches)));

        let blank = load_config_from_str(
            r#"{
                "ws_url": "ws://localhost",
                "rest_url": "http://localhost",
                "caches": [{ "kind": "trade", "symbol": "  " }]
            }"#,
        )
        .unwrap();
        assert!(matches!(blank.validate(), Err(ConfigError::BlankSymbol(0))));

        let depth = load_config_from_str(
            r#"{
                "ws_url": "ws://localhost",
                "rest_url": "http://localhost",
                "caches": [{ "kind": "depth", "symbol": "BTCUSDT", "limit": 15 }]
            }"#,
        )
        .unwrap();
        assert!(matches!(
            depth.validate(),
            Err(ConfigError::InvalidDepthLimit { limit: 15, .. })
        ));

        let kline = load_config_from_str(
            r#"{
                "ws_url": "ws://localhost",
                "rest_url": "http://localhost",
                "caches": [{ "kind": "kline", "symbol": "BTCUSDT" }]
            }"#,
        )
        .unwrap();
        assert!(matches!(kline.validate(), Err(ConfigError::MissingInterval(_))));
    }

    #[test]
    fn test_unknown_kind_is_parse_error() {
        let result = load_config_from_str(
            r#"{
                "ws_url": "ws://localhost",
                "rest_url": "http://localhost",
                "caches": [{ "kind": "ticker", "symbol": "BTCUSDT" }]
            }"#,
        );
        assert!(matches!(result, Err(ConfigError::ParseError(_))));
    }
}
