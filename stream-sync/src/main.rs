use anyhow::Context;
use market_core::{AggregateTrade, OrderBook, Trade};
use std::sync::Arc;
use stream_sync::{
    AggregateTradeCache, AggregateTradeClient, AggregateTradeDecoder, CacheKind,
    CandlestickClient, CandlestickDecoder, CandlestickEvent, DepthClient, DepthDecoder,
    OrderBookCache, RestClient, TradeCache, TradeClient, TradeDecoder, WebSocketTransport,
    callback, combined_stream_uri, kline_stream, load_config, load_default_config,
};
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("stream_sync=info".parse()?))
        .init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install rustls crypto provider"))?;

    let config = match std::env::args().nth(1) {
        Some(path) => load_config(&path).with_context(|| format!("loading {}", path))?,
        None => load_default_config()?,
    };
    config.validate()?;

    let connection = config.connection();
    info!(ws_url = %connection.ws_url, caches = config.caches.len(), "Starting stream sync");

    let cancel = CancellationToken::new();
    let market_data = config.market_data.to_market_data_config();
    let capacity = market_data.event_channel_capacity;
    let rest = Arc::new(RestClient::new(connection.rest_url.clone(), connection.api_key.clone()));

    let trade_client = Arc::new(TradeClient::with_capacity(TradeDecoder, capacity));
    let agg_trade_client = Arc::new(AggregateTradeClient::with_capacity(
        AggregateTradeDecoder,
        capacity,
    ));
    let depth_client = Arc::new(DepthClient::with_capacity(DepthDecoder, capacity));
    let kline_client = Arc::new(CandlestickClient::with_capacity(CandlestickDecoder, capacity));

    let transport = Arc::new(WebSocketTransport::new());
    transport.add_sink(trade_client.clone());
    transport.add_sink(agg_trade_client.clone());
    transport.add_sink(depth_client.clone());
    transport.add_sink(kline_client.clone());

    let mut trade_caches = Vec::new();
    let mut agg_trade_caches = Vec::new();
    let mut books = Vec::new();
    let mut streams = Vec::new();

    for entry in &config.caches {
        match entry.kind {
            CacheKind::Trade => {
                let cache = TradeCache::new(
                    trade_client.clone(),
                    rest.clone(),
                    market_data.clone(),
                    cancel.clone(),
                );
                cache.subscribe(
                    &entry.symbol,
                    entry.trade_limit(),
                    Some(callback(|trades: &Vec<Trade>| {
                        if let Some(last) = trades.last() {
                            info!(
                                symbol = %last.symbol,
                                trades = trades.len(),
                                trade_id = last.id,
                                price = %last.price,
                                "Trade window updated"
                            );
                        }
                        Ok(())
                    })),
                )?;
                log_out_of_sync(cache.out_of_sync(), cancel.clone());
                streams.extend(cache.subscribed_streams());
                trade_caches.push(cache);
            }
            CacheKind::AggregateTrade => {
                let cache = AggregateTradeCache::new(
                    agg_trade_client.clone(),
                    rest.clone(),
                    market_data.clone(),
                    cancel.clone(),
                );
                cache.subscribe(
                    &entry.symbol,
                    entry.trade_limit(),
                    Some(callback(|trades: &Vec<AggregateTrade>| {
                        if let Some(last) = trades.last() {
                            info!(
                                symbol = %last.symbol,
                                trades = trades.len(),
                                trade_id = last.id,
                                price = %last.price,
                                "Aggregate trade window updated"
                            );
                        }
                        Ok(())
                    })),
                )?;
                log_out_of_sync(cache.out_of_sync(), cancel.clone());
                streams.extend(cache.subscribed_streams());
                agg_trade_caches.push(cache);
            }
            CacheKind::Depth => {
                let cache = OrderBookCache::new(
                    depth_client.clone(),
                    rest.clone(),
                    market_data.clone(),
                    cancel.clone(),
                );
                cache.subscribe(
                    &entry.symbol,
                    entry.depth_limit(),
                    Some(callback(|book: &OrderBook| {
                        info!(
                            symbol = %book.symbol(),
                            last_update_id = book.last_update_id(),
                            best_bid = ?book.best_bid().map(|l| l.price),
                            best_ask = ?book.best_ask().map(|l| l.price),
                            "Order book updated"
                        );
                        Ok(())
                    })),
                )?;
                log_out_of_sync(cache.out_of_sync(), cancel.clone());
                streams.extend(cache.subscribed_streams());
                books.push(cache);
            }
            CacheKind::Candlestick => {
                let interval = entry
                    .interval
                    .with_context(|| format!("missing interval for {}", entry.symbol))?;
                let stream = kline_stream(&entry.symbol, interval);
                kline_client.subscribe(
                    &stream,
                    Some(callback(|event: &CandlestickEvent| {
                        let bar = &event.candlestick;
                        info!(
                            symbol = %bar.symbol,
                            interval = %bar.interval,
                            close = %bar.close,
                            is_final = event.is_final,
                            "Candlestick"
                        );
                        Ok(())
                    })),
                );
                streams.push(stream);
            }
        }
    }

    streams.sort();
    streams.dedup();
    let uri = combined_stream_uri(&connection.ws_url, &streams);
    let reconnect_delay = config.reconnect_delay();

    // Reconnect policy lives here, not in the transport
    let stream_task = {
        let transport = transport.clone();
        let cancel = cancel.clone();
        tokio::spawn(async move {
            loop {
                if let Err(e) = transport.stream(&uri, &cancel).await {
                    error!(error = %e, "Streaming failed");
                }
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(reconnect_delay) => {}
                }
                info!(uri = %uri, "Reconnecting");
            }
        })
    };

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    cancel.cancel();
    stream_task.await?;

    for cache in &trade_caches {
        cache.unsubscribe();
    }
    for cache in &agg_trade_caches {
        cache.unsubscribe();
    }
    for book in &books {
        book.unsubscribe();
    }

    Ok(())
}

fn log_out_of_sync(mut rx: broadcast::Receiver<stream_sync::OutOfSync>, cancel: CancellationToken) {
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                notice = rx.recv() => match notice {
                    Ok(notice) => warn!(
                        symbol = %notice.symbol,
                        expected = notice.expected,
                        received = notice.received,
                        "Cache out of sync, resynchronizing"
                    ),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped = skipped, "Out-of-sync notifications lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });
}
