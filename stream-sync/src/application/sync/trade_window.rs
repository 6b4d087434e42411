use market_core::Sequenced;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::domain::{FetchError, OutOfSync, SyncStatus, TradeFetcher};

/// How an incoming sequence id relates to the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuity {
    /// Window is empty
    Uninitialized,
    /// Id is the next one expected
    Contiguous,
    /// Id is at or before the newest entry
    Stale,
    /// Id skips ahead of `expected`
    Gap { expected: u64 },
}

/// Bounded, contiguous run of trades ordered by id, newest last
#[derive(Debug, Clone)]
pub struct TradeWindow<T> {
    limit: usize,
    trades: VecDeque<T>,
}

impl<T: Sequenced + Clone> TradeWindow<T> {
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            trades: VecDeque::with_capacity(limit),
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn len(&self) -> usize {
        self.trades.len()
    }

    pub fn is_empty(&self) -> bool {
        self.trades.is_empty()
    }

    pub fn last_id(&self) -> Option<u64> {
        self.trades.back().map(|t| t.sequence_id())
    }

    pub fn continuity(&self, id: u64) -> Continuity {
        let Some(last) = self.last_id() else {
            return Continuity::Uninitialized;
        };
        if id <= last {
            Continuity::Stale
        } else if id == last + 1 {
            Continuity::Contiguous
        } else {
            Continuity::Gap { expected: last + 1 }
        }
    }

    /// Replace the contents wholesale with fetched trades (oldest first).
    ///
    /// Only the newest contiguous run is kept, truncated to the limit.
    pub fn replace(&mut self, trades: Vec<T>) {
        let mut start = trades.len();
        while start > 0 && trades.len() - start < self.limit {
            if start < trades.len()
                && trades[start - 1].sequence_id() + 1 != trades[start].sequence_id()
            {
                break;
            }
            start -= 1;
        }
        self.trades = trades.into_iter().skip(start).collect();
    }

    /// Append the next trade, evicting the oldest entry at capacity
    pub fn push(&mut self, trade: T) {
        if self.limit == 0 {
            return;
        }
        if self.trades.len() >= self.limit
            && let Some(removed) = self.trades.pop_front()
        {
            trace!(trade_id = removed.sequence_id(), "REMOVE trade");
        }
        trace!(trade_id = trade.sequence_id(), "ADD trade");
        self.trades.push_back(trade);
    }

    pub fn clear(&mut self) {
        self.trades.clear();
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.trades.iter().cloned().collect()
    }
}

/// Window plus sync status, guarded by one lock per facade
#[derive(Debug)]
pub struct WindowState<T> {
    pub window: TradeWindow<T>,
    pub status: SyncStatus,
    /// Bumped on every subscribe/unsubscribe; results of an older epoch are discarded
    pub epoch: u64,
}

impl<T: Sequenced + Clone> WindowState<T> {
    pub fn new() -> Self {
        Self {
            window: TradeWindow::new(0),
            status: SyncStatus::Uninitialized,
            epoch: 0,
        }
    }

    /// Start a new subscription epoch with an empty window
    pub fn reset(&mut self, limit: usize) -> u64 {
        self.window = TradeWindow::new(limit);
        self.status = SyncStatus::Uninitialized;
        self.epoch += 1;
        self.epoch
    }
}

impl<T: Sequenced + Clone> Default for WindowState<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Keeps a [`TradeWindow`] current against the live trade stream,
/// resynchronizing from the snapshot source on gaps.
///
/// Events must be fed one at a time, in arrival order.
pub struct TradeWindowSync<T> {
    symbol: String,
    limit: usize,
    epoch: u64,
    state: Arc<Mutex<WindowState<T>>>,
    fetcher: Arc<dyn TradeFetcher<T>>,
    out_of_sync: broadcast::Sender<OutOfSync>,
}

impl<T> TradeWindowSync<T>
where
    T: Sequenced + Clone + Send + Sync + 'static,
{
    pub fn new(
        symbol: String,
        limit: usize,
        epoch: u64,
        state: Arc<Mutex<WindowState<T>>>,
        fetcher: Arc<dyn TradeFetcher<T>>,
        out_of_sync: broadcast::Sender<OutOfSync>,
    ) -> Self {
        Self {
            symbol,
            limit,
            epoch,
            state,
            fetcher,
            out_of_sync,
        }
    }

    /// Apply one live trade. Returns the window contents to emit, if any.
    pub async fn on_trade(&self, trade: T, cancel: &CancellationToken) -> Option<Vec<T>> {
        let id = trade.sequence_id();

        let synchronize = {
            let mut state = self.state.lock();
            if state.epoch != self.epoch {
                return None;
            }
            if self.limit == 0 {
                state.status = SyncStatus::Live;
                return Some(Vec::new());
            }
            match state.window.continuity(id) {
                Continuity::Uninitialized => {
                    state.status = SyncStatus::Synchronizing;
                    true
                }
                Continuity::Gap { expected } => {
                    state.status = SyncStatus::Synchronizing;
                    warn!(
                        symbol = %self.symbol,
                        expected = expected,
                        received = id,
                        "Trade window out of sync"
                    );
                    let _ = self.out_of_sync.send(OutOfSync {
                        symbol: self.symbol.clone(),
                        expected,
                        received: id,
                    });
                    true
                }
                Continuity::Contiguous | Continuity::Stale => false,
            }
        };

        if synchronize && !self.synchronize(cancel).await {
            return None;
        }

        let mut state = self.state.lock();
        if state.epoch != self.epoch {
            return None;
        }

        match state.window.continuity(id) {
            Continuity::Contiguous => {
                state.window.push(trade);
                state.status = SyncStatus::Live;
                Some(state.window.snapshot())
            }
            Continuity::Stale => {
                debug!(symbol = %self.symbol, trade_id = id, "Ignoring stale trade");
                None
            }
            Continuity::Uninitialized | Continuity::Gap { .. } => {
                error!(symbol = %self.symbol, trade_id = id, "Failed to synchronize trades");
                None
            }
        }
    }

    /// Fetch the latest trades unlocked, then swap them in under the lock.
    /// Returns false when the event should not be processed further.
    async fn synchronize(&self, cancel: &CancellationToken) -> bool {
        info!(symbol = %self.symbol, limit = self.limit, "Synchronizing trades");

        let fetched = tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.fetcher.recent_trades(&self.symbol, self.limit, cancel) => result,
        };

        let mut state = self.state.lock();
        if state.epoch != self.epoch {
            return false;
        }

        // Nothing is in flight past this point
        match fetched {
            Ok(trades) => {
                state.window.replace(trades);
                state.status = if state.window.is_empty() {
                    SyncStatus::Uninitialized
                } else {
                    SyncStatus::Live
                };
                info!(
                    symbol = %self.symbol,
                    latest_trade_id = ?state.window.last_id(),
                    "Synchronization complete"
                );
                true
            }
            Err(FetchError::Cancelled) => {
                state.status = SyncStatus::Uninitialized;
                debug!(symbol = %self.symbol, "Trade synchronization cancelled");
                false
            }
            Err(e) => {
                state.status = SyncStatus::Uninitialized;
                error!(symbol = %self.symbol, error = %e, "Failed to fetch trades");
                false
            }
        }
    }
}
