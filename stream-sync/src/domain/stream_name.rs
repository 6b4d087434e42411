//! Stream naming shared by subscription registration and message routing.
//!
//! A stream name is `<lowercased-symbol>@<kind>[parameters]`. Both sides
//! derive names through these functions only.

use market_core::CandlestickInterval;

/// Valid partial-depth levels; 0 selects the differential stream
pub const DEPTH_LIMITS: [u32; 4] = [0, 5, 10, 20];

fn stream_name(symbol: &str, suffix: &str) -> String {
    format!("{}@{}", symbol.trim().to_lowercase(), suffix)
}

pub fn trade_stream(symbol: &str) -> String {
    stream_name(symbol, "trade")
}

pub fn agg_trade_stream(symbol: &str) -> String {
    stream_name(symbol, "aggTrade")
}

pub fn depth_stream(symbol: &str, limit: u32) -> String {
    if limit == 0 {
        stream_name(symbol, "depth")
    } else {
        stream_name(symbol, &format!("depth{}", limit))
    }
}

pub fn kline_stream(symbol: &str, interval: CandlestickInterval) -> String {
    stream_name(symbol, &format!("kline_{}", interval.as_str()))
}

pub fn is_valid_depth_limit(limit: u32) -> bool {
    DEPTH_LIMITS.contains(&limit)
}

/// Upper-cased symbol prefix of a stream name
pub fn symbol_from_stream(stream: &str) -> Option<String> {
    let (symbol, _) = stream.split_once('@')?;
    if symbol.is_empty() {
        return None;
    }
    Some(symbol.to_uppercase())
}

/// Endpoint for one raw stream (`/ws/<name>`) or several combined streams
pub fn combined_stream_uri(base: &str, streams: &[String]) -> String {
    let base = base.trim_end_matches('/');
    match streams {
        [single] => format!("{}/ws/{}", base, single),
        _ => format!("{}/stream?streams={}", base, streams.join("/")),
    }
}

/// Stream name carried by a raw `/ws/<name>` endpoint path
pub fn stream_from_path(path: &str) -> Option<&str> {
    let name = path.rsplit_once("/ws/")?.1;
    if name.is_empty() || !name.contains('@') {
        return None;
    }
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_names() {
        assert_eq!(trade_stream("BTCUSDT"), "btcusdt@trade");
        assert_eq!(agg_trade_stream(" BtcUsdt "), "btcusdt@aggTrade");
        assert_eq!(depth_stream("BTCUSDT", 0), "btcusdt@depth");
        assert_eq!(depth_stream("BTCUSDT", 20), "btcusdt@depth20");
        assert_eq!(
            kline_stream("ETHUSDT", CandlestickInterval::OneMinute),
            "ethusdt@kline_1m"
        );
        assert_eq!(
            kline_stream("ETHUSDT", CandlestickInterval::OneMonth),
            "ethusdt@kline_1M"
        );
    }

    #[test]
    fn test_depth_limits() {
        assert!(is_valid_depth_limit(0));
        assert!(is_valid_depth_limit(10));
        assert!(!is_valid_depth_limit(15));
    }

    #[test]
    fn test_symbol_from_stream() {
        assert_eq!(symbol_from_stream("btcusdt@depth20").as_deref(), Some("BTCUSDT"));
        assert_eq!(symbol_from_stream("@trade"), None);
        assert_eq!(symbol_from_stream("btcusdt"), None);
    }

    #[test]
    fn test_combined_stream_uri() {
        let one = vec![agg_trade_stream("BTCUSDT")];
        assert_eq!(
            combined_stream_uri("wss://stream.binance.com:9443/", &one),
            "wss://stream.binance.com:9443/ws/btcusdt@aggTrade"
        );

        let many = vec![trade_stream("BTCUSDT"), depth_stream("ETHUSDT", 0)];
        assert_eq!(
            combined_stream_uri("wss://stream.binance.com:9443", &many),
            "wss://stream.binance.com:9443/stream?streams=btcusdt@trade/ethusdt@depth"
        );
    }

    #[test]
    fn test_stream_from_path() {
        assert_eq!(stream_from_path("/ws/btcusdt@trade"), Some("btcusdt@trade"));
        assert_eq!(stream_from_path("/stream"), None);
        assert_eq!(stream_from_path("/ws/"), None);
    }
}
