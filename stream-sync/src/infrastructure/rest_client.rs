use async_trait::async_trait;
use market_core::{
    AggregateTrade, DepthSnapshot, PriceLevel, Trade, format_symbol, timestamp_from_millis,
};
use reqwest::Client;
use rust_decimal::Decimal;
use serde::{Deserialize, de::DeserializeOwned};
use std::future::Future;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::domain::{DepthFetcher, FetchError, TradeFetcher};

/// Largest page the venue serves for trades and aggregate trades
const MAX_TRADES_LIMIT: usize = 1000;

#[derive(Error, Debug)]
pub enum RestError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {code} - {msg}")]
    Api { code: i32, msg: String },
    #[error("Parse error: {0}")]
    Parse(String),
    #[error("Request cancelled")]
    Cancelled,
}

/// Convert infrastructure RestError to domain FetchError
impl From<RestError> for FetchError {
    fn from(err: RestError) -> Self {
        match err {
            RestError::Http(e) => FetchError::Network(e.to_string()),
            RestError::Api { code, msg } => FetchError::Api { code, message: msg },
            RestError::Parse(msg) => FetchError::Parse(msg),
            RestError::Cancelled => FetchError::Cancelled,
        }
    }
}

/// REST client for the venue's public market data endpoints
#[derive(Clone)]
pub struct RestClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl RestClient {
    pub fn new(base_url: String, api_key: String) -> Self {
        RestClient {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }
    }

    /// Most recent trades, oldest first
    pub async fn get_trades(&self, symbol: &str, limit: usize) -> Result<Vec<Trade>, RestError> {
        let symbol = format_symbol(symbol);
        let path = format!(
            "/api/v3/trades?symbol={}&limit={}",
            symbol,
            limit.clamp(1, MAX_TRADES_LIMIT)
        );
        let raw: Vec<RawTrade> = self.get(&path).await?;
        raw.into_iter().map(|t| t.into_trade(&symbol)).collect()
    }

    /// Most recent aggregate trades, oldest first
    pub async fn get_aggregate_trades(
        &self,
        symbol: &str,
        limit: usize,
    ) -> Result<Vec<AggregateTrade>, RestError> {
        let symbol = format_symbol(symbol);
        let path = format!(
            "/api/v3/aggTrades?symbol={}&limit={}",
            symbol,
            limit.clamp(1, MAX_TRADES_LIMIT)
        );
        let raw: Vec<RawAggregateTrade> = self.get(&path).await?;
        raw.into_iter().map(|t| t.into_trade(&symbol)).collect()
    }

    /// Order book depth snapshot
    pub async fn get_depth(&self, symbol: &str, limit: u32) -> Result<DepthSnapshot, RestError> {
        let symbol = format_symbol(symbol);
        let path = format!("/api/v3/depth?symbol={}&limit={}", symbol, limit);
        let raw: RawDepth = self.get(&path).await?;
        raw.into_snapshot(&symbol)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, RestError> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "GET");
        let mut request = self.client.get(&url);
        if !self.api_key.is_empty() {
            request = request.header("X-MBX-APIKEY", &self.api_key);
        }
        let resp = request.send().await?;

        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, RestError> {
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            if let Ok(err) = serde_json::from_str::<ApiError>(&text) {
                return Err(RestError::Api {
                    code: err.code,
                    msg: err.msg,
                });
            }
            return Err(RestError::Parse(format!("HTTP {}: {}", status, text)));
        }

        serde_json::from_str(&text).map_err(|e| RestError::Parse(e.to_string()))
    }
}

async fn cancellable<T>(
    cancel: &CancellationToken,
    request: impl Future<Output = Result<T, RestError>>,
) -> Result<T, FetchError> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(RestError::Cancelled.into()),
        result = request => result.map_err(FetchError::from),
    }
}

#[async_trait]
impl TradeFetcher<Trade> for RestClient {
    async fn recent_trades(
        &self,
        symbol: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<Trade>, FetchError> {
        cancellable(cancel, self.get_trades(symbol, limit)).await
    }
}

#[async_trait]
impl TradeFetcher<AggregateTrade> for RestClient {
    async fn recent_trades(
        &self,
        symbol: &str,
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<AggregateTrade>, FetchError> {
        cancellable(cancel, self.get_aggregate_trades(symbol, limit)).await
    }
}

#[async_trait]
impl DepthFetcher for RestClient {
    async fn get_depth(
        &self,
        symbol: &str,
        limit: u32,
        cancel: &CancellationToken,
    ) -> Result<DepthSnapshot, FetchError> {
        cancellable(cancel, RestClient::get_depth(self, symbol, limit)).await
    }
}

#[derive(Deserialize)]
struct ApiError {
    code: i32,
    msg: String,
}

#[derive(Deserialize)]
struct RawTrade {
    id: u64,
    price: Decimal,
    qty: Decimal,
    time: i64,
    #[serde(rename = "isBuyerMaker")]
    is_buyer_maker: bool,
    #[serde(rename = "isBestMatch")]
    is_best_match: bool,
}

impl RawTrade {
    fn into_trade(self, symbol: &str) -> Result<Trade, RestError> {
        Ok(Trade {
            symbol: symbol.to_string(),
            id: self.id,
            price: self.price,
            quantity: self.qty,
            buyer_order_id: None,
            seller_order_id: None,
            time: timestamp_from_millis(self.time).map_err(|e| RestError::Parse(e.to_string()))?,
            is_buyer_maker: self.is_buyer_maker,
            is_best_price_match: self.is_best_match,
        })
    }
}

#[derive(Deserialize)]
struct RawAggregateTrade {
    a: u64,
    p: Decimal,
    q: Decimal,
    f: u64,
    l: u64,
    #[serde(rename = "T")]
    time: i64,
    m: bool,
    #[serde(rename = "M")]
    best_match: bool,
}

impl RawAggregateTrade {
    fn into_trade(self, symbol: &str) -> Result<AggregateTrade, RestError> {
        let time = timestamp_from_millis(self.time).map_err(|e| RestError::Parse(e.to_string()))?;
        AggregateTrade::new(
            symbol,
            self.a,
            self.p,
            self.q,
            self.f,
            self.l,
            time,
            self.m,
            self.best_match,
        )
        .map_err(|e| RestError::Parse(e.to_string()))
    }
}

#[derive(Deserialize)]
struct RawDepth {
    #[serde(rename = "lastUpdateId")]
    last_update_id: u64,
    bids: Vec<[Decimal; 2]>,
    asks: Vec<[Decimal; 2]>,
}

impl RawDepth {
    fn into_snapshot(self, symbol: &str) -> Result<DepthSnapshot, RestError> {
        let levels = |raw: Vec<[Decimal; 2]>| {
            raw.into_iter()
                .map(|[price, quantity]| {
                    PriceLevel::new(price, quantity).map_err(|e| RestError::Parse(e.to_string()))
                })
                .collect::<Result<Vec<_>, _>>()
        };
        Ok(DepthSnapshot {
            symbol: symbol.to_string(),
            last_update_id: self.last_update_id,
            bids: levels(self.bids)?,
            asks: levels(self.asks)?,
        })
    }
}
