use market_core::{AggregateTrade, Candlestick, PriceLevel, Timestamp, Trade};
use serde::{Deserialize, Serialize};

/// `<symbol>@trade` push event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradeEvent {
    pub event_time: Timestamp,
    pub trade: Trade,
}

/// `<symbol>@aggTrade` push event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateTradeEvent {
    pub event_time: Timestamp,
    pub trade: AggregateTrade,
}

/// Order book delta covering update ids `first_update_id..=last_update_id`.
///
/// Partial-depth pushes are decoded into the same shape with both ids set
/// to the book's `lastUpdateId` and `partial` set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DepthUpdateEvent {
    pub event_time: Timestamp,
    pub symbol: String,
    pub first_update_id: u64,
    pub last_update_id: u64,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    #[serde(default)]
    pub partial: bool,
}

/// `<symbol>@kline_<interval>` push event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandlestickEvent {
    pub event_time: Timestamp,
    pub candlestick: Candlestick,
    pub first_trade_id: i64,
    pub last_trade_id: i64,
    /// Closed bar; an open bar keeps updating until its close time
    pub is_final: bool,
}

/// Any decoded stream event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "event")]
pub enum StreamEvent {
    Trade(TradeEvent),
    AggregateTrade(AggregateTradeEvent),
    DepthUpdate(DepthUpdateEvent),
    Candlestick(CandlestickEvent),
}

impl StreamEvent {
    pub fn event_time(&self) -> Timestamp {
        match self {
            StreamEvent::Trade(e) => e.event_time,
            StreamEvent::AggregateTrade(e) => e.event_time,
            StreamEvent::DepthUpdate(e) => e.event_time,
            StreamEvent::Candlestick(e) => e.event_time,
        }
    }

    pub fn symbol(&self) -> &str {
        match self {
            StreamEvent::Trade(e) => &e.trade.symbol,
            StreamEvent::AggregateTrade(e) => &e.trade.symbol,
            StreamEvent::DepthUpdate(e) => &e.symbol,
            StreamEvent::Candlestick(e) => &e.candlestick.symbol,
        }
    }
}

/// Raised when continuity with the live stream was lost
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutOfSync {
    pub symbol: String,
    /// Next sequence id the cache was waiting for
    pub expected: u64,
    /// First sequence id the offending event carried
    pub received: u64,
}
