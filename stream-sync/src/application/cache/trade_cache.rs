use market_core::{AggregateTrade, Sequenced, Trade, format_symbol};
use parking_lot::Mutex;
use std::fmt::Debug;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::{ActiveSubscription, queue_callback};
use crate::application::config::MarketDataConfig;
use crate::application::registry::Callback;
use crate::application::stream_client::{StreamClient, invoke_callback};
use crate::application::sync::trade_window::{TradeWindowSync, WindowState};
use crate::domain::stream_name::{agg_trade_stream, trade_stream};
use crate::domain::{
    AggregateTradeEvent, EventDecoder, OutOfSync, SubscribeError, SyncStatus, TradeEvent,
    TradeFetcher,
};
use crate::infrastructure::parsers::{AggregateTradeDecoder, TradeDecoder};

/// Trade stream flavour served by a [`TradeWindowCache`]
pub trait TradeKind: Send + Sync + 'static {
    type Decoder: EventDecoder;
    type Trade: Sequenced + Clone + Debug + Send + Sync + 'static;

    fn stream_name(symbol: &str) -> String;

    fn into_trade(event: <Self::Decoder as EventDecoder>::Event) -> Self::Trade;
}

/// `<symbol>@trade`
pub struct Trades;

impl TradeKind for Trades {
    type Decoder = TradeDecoder;
    type Trade = Trade;

    fn stream_name(symbol: &str) -> String {
        trade_stream(symbol)
    }

    fn into_trade(event: TradeEvent) -> Trade {
        event.trade
    }
}

/// `<symbol>@aggTrade`
pub struct AggregateTrades;

impl TradeKind for AggregateTrades {
    type Decoder = AggregateTradeDecoder;
    type Trade = AggregateTrade;

    fn stream_name(symbol: &str) -> String {
        agg_trade_stream(symbol)
    }

    fn into_trade(event: AggregateTradeEvent) -> AggregateTrade {
        event.trade
    }
}

pub type TradeCache = TradeWindowCache<Trades>;
pub type AggregateTradeCache = TradeWindowCache<AggregateTrades>;

/// Trailing window of the most recent trades for one symbol.
///
/// Emits the whole window to the subscriber after every applied trade.
pub struct TradeWindowCache<K: TradeKind> {
    client: Arc<StreamClient<K::Decoder>>,
    fetcher: Arc<dyn TradeFetcher<K::Trade>>,
    config: MarketDataConfig,
    cancel: CancellationToken,
    state: Arc<Mutex<WindowState<K::Trade>>>,
    subscription: Mutex<Option<ActiveSubscription>>,
    out_of_sync: broadcast::Sender<OutOfSync>,
}

impl<K: TradeKind> TradeWindowCache<K> {
    /// `cancel` stops every worker this cache spawns
    pub fn new(
        client: Arc<StreamClient<K::Decoder>>,
        fetcher: Arc<dyn TradeFetcher<K::Trade>>,
        config: MarketDataConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (out_of_sync, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            client,
            fetcher,
            config,
            cancel,
            state: Arc::new(Mutex::new(WindowState::new())),
            subscription: Mutex::new(None),
            out_of_sync,
        }
    }

    /// Start tracking `symbol`, keeping at most `limit` trades.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(
        &self,
        symbol: &str,
        limit: usize,
        on_update: Option<Callback<Vec<K::Trade>>>,
    ) -> Result<(), SubscribeError> {
        let symbol = format_symbol(symbol);
        if symbol.is_empty() {
            return Err(SubscribeError::BlankSymbol);
        }

        let mut active = self.subscription.lock();
        if let Some(current) = active.as_ref() {
            return Err(SubscribeError::AlreadySubscribed(current.symbol.clone()));
        }

        let epoch = self.state.lock().reset(limit);
        let stream = K::stream_name(&symbol);
        let (tx, rx) = mpsc::channel(self.config.event_channel_capacity.max(1));
        let id = self.client.subscribe(&stream, Some(queue_callback(tx)));
        let worker = self.cancel.child_token();

        let sync = TradeWindowSync::new(
            symbol.clone(),
            limit,
            epoch,
            self.state.clone(),
            self.fetcher.clone(),
            self.out_of_sync.clone(),
        );
        tokio::spawn(run_worker::<K>(sync, rx, on_update, stream.clone(), worker.clone()));

        info!(symbol = %symbol, stream = %stream, limit = limit, "Trade cache subscribed");
        *active = Some(ActiveSubscription {
            symbol,
            stream,
            id,
            worker,
        });
        Ok(())
    }

    /// Drop the subscription and all cached state. No-op when idle.
    pub fn unsubscribe(&self) {
        let Some(active) = self.subscription.lock().take() else {
            return;
        };
        self.client.unsubscribe(&active.stream, Some(active.id));
        active.worker.cancel();
        self.state.lock().reset(0);
        info!(symbol = %active.symbol, "Trade cache unsubscribed");
    }

    /// Unsubscribe only if currently tracking `symbol`
    pub fn unsubscribe_symbol(&self, symbol: &str) -> Result<(), SubscribeError> {
        let symbol = format_symbol(symbol);
        if self.symbol().as_deref() != Some(symbol.as_str()) {
            return Err(SubscribeError::NotSubscribed(symbol));
        }
        self.unsubscribe();
        Ok(())
    }

    /// Copy of the current window, oldest first; empty until synchronized
    pub fn trades(&self) -> Vec<K::Trade> {
        self.state.lock().window.snapshot()
    }

    pub fn status(&self) -> SyncStatus {
        self.state.lock().status
    }

    pub fn symbol(&self) -> Option<String> {
        self.subscription.lock().as_ref().map(|a| a.symbol.clone())
    }

    pub fn subscribed_streams(&self) -> Vec<String> {
        self.subscription
            .lock()
            .as_ref()
            .map(|a| vec![a.stream.clone()])
            .unwrap_or_default()
    }

    pub fn out_of_sync(&self) -> broadcast::Receiver<OutOfSync> {
        self.out_of_sync.subscribe()
    }
}

impl<K: TradeKind> Drop for TradeWindowCache<K> {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

async fn run_worker<K: TradeKind>(
    sync: TradeWindowSync<K::Trade>,
    mut rx: mpsc::Receiver<<K::Decoder as EventDecoder>::Event>,
    on_update: Option<Callback<Vec<K::Trade>>>,
    stream: String,
    cancel: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => break,
            event = rx.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };

        let Some(trades) = sync.on_trade(K::into_trade(event), &cancel).await else {
            continue;
        };
        if let Some(cb) = &on_update {
            invoke_callback(cb, &trades, &stream);
        }
    }
    debug!(stream = %stream, "Trade cache worker stopped");
}
