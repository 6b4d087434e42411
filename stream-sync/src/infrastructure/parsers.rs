use chrono::Utc;
use market_core::{
    AggregateTrade, Candlestick, CandlestickInterval, PriceLevel, Timestamp, Trade,
    timestamp_from_millis,
};
use rust_decimal::Decimal;
use serde_json::Value;
use std::str::FromStr;
use tracing::debug;

use crate::domain::stream_name::symbol_from_stream;
use crate::domain::{
    AggregateTradeEvent, CandlestickEvent, DecodeError, DepthUpdateEvent, EventDecoder,
    StreamEvent, TradeEvent,
};

/// Decoder for `trade` events
pub struct TradeDecoder;

impl EventDecoder for TradeDecoder {
    type Event = TradeEvent;

    fn name(&self) -> &'static str {
        "trade"
    }

    fn decode(&self, stream: &str, data: &Value) -> Result<TradeEvent, DecodeError> {
        expect_event_type(data, "trade")?;
        let result = (|| -> Result<TradeEvent, DecodeError> {
            Ok(TradeEvent {
                event_time: time_field(data, "E")?,
                trade: Trade {
                    symbol: str_field(data, "s")?.to_string(),
                    id: u64_field(data, "t")?,
                    price: decimal_field(data, "p")?,
                    quantity: decimal_field(data, "q")?,
                    buyer_order_id: data.get("b").and_then(Value::as_u64),
                    seller_order_id: data.get("a").and_then(Value::as_u64),
                    time: time_field(data, "T")?,
                    is_buyer_maker: bool_field(data, "m")?,
                    is_best_price_match: bool_field(data, "M")?,
                },
            })
        })();
        log_failure(self.name(), stream, data, &result);
        result
    }
}

/// Decoder for `aggTrade` events
pub struct AggregateTradeDecoder;

impl EventDecoder for AggregateTradeDecoder {
    type Event = AggregateTradeEvent;

    fn name(&self) -> &'static str {
        "aggTrade"
    }

    fn decode(&self, stream: &str, data: &Value) -> Result<AggregateTradeEvent, DecodeError> {
        expect_event_type(data, "aggTrade")?;
        let result = (|| -> Result<AggregateTradeEvent, DecodeError> {
            let trade = AggregateTrade::new(
                str_field(data, "s")?,
                u64_field(data, "a")?,
                decimal_field(data, "p")?,
                decimal_field(data, "q")?,
                u64_field(data, "f")?,
                u64_field(data, "l")?,
                time_field(data, "T")?,
                bool_field(data, "m")?,
                bool_field(data, "M")?,
            )?;
            Ok(AggregateTradeEvent {
                event_time: time_field(data, "E")?,
                trade,
            })
        })();
        log_failure(self.name(), stream, data, &result);
        result
    }
}

/// Decoder for `depthUpdate` events and partial-depth pushes
///
/// Partial depth carries no discriminator, symbol, or event time: the
/// symbol comes from the stream name and the event time is the local clock.
pub struct DepthDecoder;

impl EventDecoder for DepthDecoder {
    type Event = DepthUpdateEvent;

    fn name(&self) -> &'static str {
        "depthUpdate"
    }

    fn decode(&self, stream: &str, data: &Value) -> Result<DepthUpdateEvent, DecodeError> {
        let result = if data.get("e").is_none() && data.get("lastUpdateId").is_some() {
            decode_partial_depth(stream, data)
        } else {
            expect_event_type(data, "depthUpdate")?;
            (|| -> Result<DepthUpdateEvent, DecodeError> {
                Ok(DepthUpdateEvent {
                    event_time: time_field(data, "E")?,
                    symbol: str_field(data, "s")?.to_string(),
                    first_update_id: u64_field(data, "U")?,
                    last_update_id: u64_field(data, "u")?,
                    bids: parse_price_levels(data, "b")?,
                    asks: parse_price_levels(data, "a")?,
                    partial: false,
                })
            })()
        };
        log_failure(self.name(), stream, data, &result);
        result
    }
}

fn decode_partial_depth(stream: &str, data: &Value) -> Result<DepthUpdateEvent, DecodeError> {
    let symbol = symbol_from_stream(stream).ok_or(DecodeError::Field("stream"))?;
    let last_update_id = u64_field(data, "lastUpdateId")?;
    Ok(DepthUpdateEvent {
        event_time: Utc::now(),
        symbol,
        first_update_id: last_update_id,
        last_update_id,
        bids: parse_price_levels(data, "bids")?,
        asks: parse_price_levels(data, "asks")?,
        partial: true,
    })
}

/// Decoder for `kline` events
pub struct CandlestickDecoder;

impl EventDecoder for CandlestickDecoder {
    type Event = CandlestickEvent;

    fn name(&self) -> &'static str {
        "kline"
    }

    fn decode(&self, stream: &str, data: &Value) -> Result<CandlestickEvent, DecodeError> {
        expect_event_type(data, "kline")?;
        let result = (|| -> Result<CandlestickEvent, DecodeError> {
            let k = data.get("k").ok_or(DecodeError::Field("k"))?;
            let interval = CandlestickInterval::from_str(str_field(k, "i")?)?;
            Ok(CandlestickEvent {
                event_time: time_field(data, "E")?,
                candlestick: Candlestick {
                    symbol: str_field(k, "s")?.to_string(),
                    interval,
                    open_time: time_field(k, "t")?,
                    open: decimal_field(k, "o")?,
                    high: decimal_field(k, "h")?,
                    low: decimal_field(k, "l")?,
                    close: decimal_field(k, "c")?,
                    volume: decimal_field(k, "v")?,
                    close_time: time_field(k, "T")?,
                    quote_asset_volume: decimal_field(k, "q")?,
                    number_of_trades: u64_field(k, "n")?,
                    taker_buy_base_asset_volume: decimal_field(k, "V")?,
                    taker_buy_quote_asset_volume: decimal_field(k, "Q")?,
                },
                first_trade_id: i64_field(k, "f")?,
                last_trade_id: i64_field(k, "L")?,
                is_final: bool_field(k, "x")?,
            })
        })();
        log_failure(self.name(), stream, data, &result);
        result
    }
}

/// Decoder for every supported event kind, selected by discriminator
#[derive(Default)]
pub struct StreamEventDecoder;

impl EventDecoder for StreamEventDecoder {
    type Event = StreamEvent;

    fn name(&self) -> &'static str {
        "stream"
    }

    fn decode(&self, stream: &str, data: &Value) -> Result<StreamEvent, DecodeError> {
        match data.get("e").and_then(Value::as_str) {
            Some("trade") => TradeDecoder.decode(stream, data).map(StreamEvent::Trade),
            Some("aggTrade") => AggregateTradeDecoder
                .decode(stream, data)
                .map(StreamEvent::AggregateTrade),
            Some("depthUpdate") => DepthDecoder.decode(stream, data).map(StreamEvent::DepthUpdate),
            Some("kline") => CandlestickDecoder
                .decode(stream, data)
                .map(StreamEvent::Candlestick),
            Some(other) => Err(DecodeError::UnknownEventType(other.to_string())),
            None if data.get("lastUpdateId").is_some() => {
                DepthDecoder.decode(stream, data).map(StreamEvent::DepthUpdate)
            }
            None => Err(DecodeError::Field("e")),
        }
    }
}

fn expect_event_type(data: &Value, expected: &str) -> Result<(), DecodeError> {
    let kind = str_field(data, "e")?;
    if kind != expected {
        return Err(DecodeError::UnknownEventType(kind.to_string()));
    }
    Ok(())
}

fn log_failure<T>(decoder: &str, stream: &str, data: &Value, result: &Result<T, DecodeError>) {
    if let Err(e) = result {
        debug!(
            decoder = decoder,
            stream = %stream,
            data = %data,
            error = %e,
            "Failed to decode event - missing or invalid fields"
        );
    }
}

fn str_field<'a>(data: &'a Value, key: &'static str) -> Result<&'a str, DecodeError> {
    data.get(key)
        .and_then(Value::as_str)
        .ok_or(DecodeError::Field(key))
}

fn u64_field(data: &Value, key: &'static str) -> Result<u64, DecodeError> {
    data.get(key)
        .and_then(Value::as_u64)
        .ok_or(DecodeError::Field(key))
}

fn i64_field(data: &Value, key: &'static str) -> Result<i64, DecodeError> {
    data.get(key)
        .and_then(Value::as_i64)
        .ok_or(DecodeError::Field(key))
}

fn bool_field(data: &Value, key: &'static str) -> Result<bool, DecodeError> {
    data.get(key)
        .and_then(Value::as_bool)
        .ok_or(DecodeError::Field(key))
}

fn time_field(data: &Value, key: &'static str) -> Result<Timestamp, DecodeError> {
    Ok(timestamp_from_millis(i64_field(data, key)?)?)
}

/// Venue decimals arrive as strings and are parsed exactly; JSON numbers
/// are rejected since they may already have been rounded through f64
pub(crate) fn parse_decimal(value: &Value) -> Option<Decimal> {
    value.as_str().and_then(|s| Decimal::from_str(s).ok())
}

fn decimal_field(data: &Value, key: &'static str) -> Result<Decimal, DecodeError> {
    data.get(key)
        .and_then(parse_decimal)
        .ok_or(DecodeError::Field(key))
}

/// `[["price", "qty"], ...]`
pub(crate) fn parse_levels(value: &Value) -> Option<Vec<PriceLevel>> {
    let arr = value.as_array()?;
    let mut levels = Vec::with_capacity(arr.len());

    for item in arr {
        let inner = item.as_array()?;
        if inner.len() >= 2 {
            let price = parse_decimal(&inner[0])?;
            let quantity = parse_decimal(&inner[1])?;
            levels.push(PriceLevel::new(price, quantity).ok()?);
        }
    }

    Some(levels)
}

fn parse_price_levels(data: &Value, key: &'static str) -> Result<Vec<PriceLevel>, DecodeError> {
    data.get(key)
        .and_then(parse_levels)
        .ok_or(DecodeError::Field(key))
}
