use futures_util::future::OptionFuture;
use market_core::{DepthSnapshot, OrderBook, format_symbol};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{ActiveSubscription, queue_callback};
use crate::application::config::MarketDataConfig;
use crate::application::registry::Callback;
use crate::application::stream_client::invoke_callback;
use crate::application::sync::depth::{DeltaOutcome, DepthSynchronizer, ReplayError};
use crate::domain::stream_name::{depth_stream, is_valid_depth_limit};
use crate::domain::{
    DepthFetcher, DepthUpdateEvent, FetchError, OutOfSync, SubscribeError, SyncStatus,
};
use crate::infrastructure::DepthClient;

struct BookState {
    synchronizer: Option<DepthSynchronizer>,
    epoch: u64,
}

impl BookState {
    fn reset(&mut self, synchronizer: Option<DepthSynchronizer>) -> u64 {
        self.synchronizer = synchronizer;
        self.epoch += 1;
        self.epoch
    }
}

/// Locally merged order book for one symbol.
///
/// With limit 0 the book follows the differential depth stream and is
/// resynchronized from depth snapshots. With limit 5, 10 or 20 every
/// partial-depth push replaces the book.
pub struct OrderBookCache {
    client: Arc<DepthClient>,
    fetcher: Arc<dyn DepthFetcher>,
    config: MarketDataConfig,
    cancel: CancellationToken,
    state: Arc<Mutex<BookState>>,
    subscription: Mutex<Option<ActiveSubscription>>,
    out_of_sync: broadcast::Sender<OutOfSync>,
}

impl OrderBookCache {
    pub fn new(
        client: Arc<DepthClient>,
        fetcher: Arc<dyn DepthFetcher>,
        config: MarketDataConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (out_of_sync, _) = broadcast::channel(config.event_channel_capacity.max(1));
        Self {
            client,
            fetcher,
            config,
            cancel,
            state: Arc::new(Mutex::new(BookState {
                synchronizer: None,
                epoch: 0,
            })),
            subscription: Mutex::new(None),
            out_of_sync,
        }
    }

    /// Start maintaining the book of `symbol`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn subscribe(
        &self,
        symbol: &str,
        limit: u32,
        on_update: Option<Callback<OrderBook>>,
    ) -> Result<(), SubscribeError> {
        let symbol = format_symbol(symbol);
        if symbol.is_empty() {
            return Err(SubscribeError::BlankSymbol);
        }
        if !is_valid_depth_limit(limit) {
            return Err(SubscribeError::InvalidDepthLimit(limit));
        }

        let mut active = self.subscription.lock();
        if let Some(current) = active.as_ref() {
            return Err(SubscribeError::AlreadySubscribed(current.symbol.clone()));
        }

        let synchronizer = DepthSynchronizer::new(symbol.clone(), self.config.max_buffer_size);
        let epoch = self.state.lock().reset(Some(synchronizer));
        let stream = depth_stream(&symbol, limit);
        let (tx, rx) = mpsc::channel(self.config.event_channel_capacity.max(1));
        let id = self.client.subscribe(&stream, Some(queue_callback(tx)));
        let worker = self.cancel.child_token();

        let task = BookWorker {
            symbol: symbol.clone(),
            stream: stream.clone(),
            snapshot_depth: self.config.snapshot_depth,
            epoch,
            state: self.state.clone(),
            fetcher: self.fetcher.clone(),
            out_of_sync: self.out_of_sync.clone(),
            on_update,
            cancel: worker.clone(),
        };
        if limit == 0 {
            tokio::spawn(task.run_diff(rx));
        } else {
            tokio::spawn(task.run_partial(rx));
        }

        info!(symbol = %symbol, stream = %stream, limit = limit, "Order book cache subscribed");
        *active = Some(ActiveSubscription {
            symbol,
            stream,
            id,
            worker,
        });
        Ok(())
    }

    /// Drop the subscription and the book. No-op when idle.
    pub fn unsubscribe(&self) {
        let Some(active) = self.subscription.lock().take() else {
            return;
        };
        self.client.unsubscribe(&active.stream, Some(active.id));
        active.worker.cancel();
        self.state.lock().reset(None);
        info!(symbol = %active.symbol, "Order book cache unsubscribed");
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

    /// Copy of the book; None until synchronized
    pub fn order_book(&self) -> Option<OrderBook> {
        self.state
            .lock()
            .synchronizer
            .as_ref()
            .and_then(|s| s.order_book())
    }

    pub fn status(&self) -> SyncStatus {
        self.state
            .lock()
            .synchronizer
            .as_ref()
            .map(|s| s.status())
            .unwrap_or_default()
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

impl Drop for OrderBookCache {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

type SnapshotTask = JoinHandle<Result<DepthSnapshot, FetchError>>;

struct BookWorker {
    symbol: String,
    stream: String,
    snapshot_depth: u32,
    epoch: u64,
    state: Arc<Mutex<BookState>>,
    fetcher: Arc<dyn DepthFetcher>,
    out_of_sync: broadcast::Sender<OutOfSync>,
    on_update: Option<Callback<OrderBook>>,
    cancel: CancellationToken,
}

impl BookWorker {
    /// Differential stream: deltas are buffered while at most one snapshot
    /// fetch runs next to the receive loop.
    async fn run_diff(self, mut rx: mpsc::Receiver<DepthUpdateEvent>) {
        let mut fetch: Option<SnapshotTask> = None;

        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break,
                Some(result) = OptionFuture::from(fetch.as_mut()) => {
                    fetch = None;
                    let snapshot = result.unwrap_or_else(|e| {
                        Err(FetchError::Network(format!("snapshot task failed: {}", e)))
                    });
                    if self.on_snapshot(snapshot) {
                        fetch = Some(self.spawn_fetch());
                    }
                }
                event = rx.recv() => {
                    let Some(delta) = event else { break };
                    if self.on_delta(delta) && fetch.is_none() {
                        fetch = Some(self.spawn_fetch());
                    }
                }
            }
        }

        if let Some(task) = fetch {
            task.abort();
        }
        debug!(stream = %self.stream, "Order book worker stopped");
    }

    async fn run_partial(self, mut rx: mpsc::Receiver<DepthUpdateEvent>) {
        loop {
            let update = tokio::select! {
                _ = self.cancel.cancelled() => break,
                event = rx.recv() => match event {
                    Some(update) => update,
                    None => break,
                },
            };

            let book = {
                let mut state = self.state.lock();
                if state.epoch != self.epoch {
                    break;
                }
                let Some(sync) = state.synchronizer.as_mut() else {
                    break;
                };
                if sync.on_partial(update) {
                    sync.order_book()
                } else {
                    None
                }
            };
            if let Some(book) = book {
                self.emit(&book);
            }
        }
        debug!(stream = %self.stream, "Order book worker stopped");
    }

    /// Returns true when a snapshot fetch should be started
    fn on_delta(&self, delta: DepthUpdateEvent) -> bool {
        let (outcome, book) = {
            let mut state = self.state.lock();
            if state.epoch != self.epoch {
                return false;
            }
            let Some(sync) = state.synchronizer.as_mut() else {
                return false;
            };
            let outcome = sync.on_delta(delta);
            let book = match outcome {
                DeltaOutcome::Applied => sync.order_book(),
                _ => None,
            };
            (outcome, book)
        };

        match outcome {
            DeltaOutcome::Buffered { request_snapshot } => request_snapshot,
            DeltaOutcome::Applied => {
                if let Some(book) = book {
                    self.emit(&book);
                }
                false
            }
            DeltaOutcome::Skipped => false,
            DeltaOutcome::Gap(notice) => {
                warn!(
                    symbol = %self.symbol,
                    expected = notice.expected,
                    received = notice.received,
                    "Order book out of sync"
                );
                let _ = self.out_of_sync.send(notice);
                true
            }
        }
    }

    /// Returns true when the snapshot could not be used and another is needed
    fn on_snapshot(&self, snapshot: Result<DepthSnapshot, FetchError>) -> bool {
        let (replay, book) = {
            let mut state = self.state.lock();
            if state.epoch != self.epoch {
                return false;
            }
            let Some(sync) = state.synchronizer.as_mut() else {
                return false;
            };
            match snapshot {
                Ok(snapshot) => {
                    let replay = sync.on_snapshot(snapshot);
                    let book = sync.order_book();
                    (replay, book)
                }
                Err(FetchError::Cancelled) => {
                    debug!(symbol = %self.symbol, "Depth snapshot fetch cancelled");
                    sync.on_fetch_failed();
                    return false;
                }
                Err(e) => {
                    error!(symbol = %self.symbol, error = %e, "Failed to fetch depth snapshot");
                    sync.on_fetch_failed();
                    return false;
                }
            }
        };

        match replay {
            Ok(()) => {
                if let Some(book) = book {
                    self.emit(&book);
                }
                false
            }
            Err(ReplayError(notice)) => {
                let _ = self.out_of_sync.send(notice);
                true
            }
        }
    }

    fn spawn_fetch(&self) -> SnapshotTask {
        info!(symbol = %self.symbol, depth = self.snapshot_depth, "Fetching depth snapshot");
        let fetcher = self.fetcher.clone();
        let symbol = self.symbol.clone();
        let depth = self.snapshot_depth;
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => Err(FetchError::Cancelled),
                result = fetcher.get_depth(&symbol, depth, &cancel) => result,
            }
        })
    }

    fn emit(&self, book: &OrderBook) {
        if let Some(cb) = &self.on_update {
            invoke_callback(cb, book, &self.stream);
        }
    }
}
