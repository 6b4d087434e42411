use market_core::{DepthSnapshot, OrderBook, PriceLevel};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, info, trace, warn};

use crate::domain::{DepthUpdateEvent, OutOfSync, SyncStatus};

/// Result of feeding one delta to the synchronizer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeltaOutcome {
    /// Held back until a snapshot arrives
    Buffered { request_snapshot: bool },
    /// Merged into the live book
    Applied,
    /// Already covered by the book
    Skipped,
    /// Continuity lost; book discarded, delta buffered, new snapshot needed
    Gap(OutOfSync),
}

/// The snapshot was too old for the buffered deltas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayError(pub OutOfSync);

/// Buffer-then-replay order book synchronization for one symbol.
///
/// Pure state machine: the caller fetches snapshots and feeds them back.
#[derive(Debug)]
pub struct DepthSynchronizer {
    symbol: String,
    max_buffer_size: usize,
    status: SyncStatus,
    bids: BTreeMap<Decimal, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    last_update_id: u64,
    buffer: VecDeque<DepthUpdateEvent>,
}

impl DepthSynchronizer {
    pub fn new(symbol: impl Into<String>, max_buffer_size: usize) -> Self {
        Self {
            symbol: symbol.into(),
            max_buffer_size: max_buffer_size.max(1),
            status: SyncStatus::Uninitialized,
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_update_id: 0,
            buffer: VecDeque::new(),
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn status(&self) -> SyncStatus {
        self.status
    }

    pub fn last_update_id(&self) -> u64 {
        self.last_update_id
    }

    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Copy of the book; None until synchronized
    pub fn order_book(&self) -> Option<OrderBook> {
        if !self.status.is_ready() {
            return None;
        }
        Some(make_book(
            &self.symbol,
            self.last_update_id,
            &self.bids,
            &self.asks,
        ))
    }

    pub fn on_delta(&mut self, delta: DepthUpdateEvent) -> DeltaOutcome {
        match self.status {
            SyncStatus::Uninitialized => {
                self.buffer_delta(delta);
                self.status = SyncStatus::Synchronizing;
                DeltaOutcome::Buffered {
                    request_snapshot: true,
                }
            }
            SyncStatus::Synchronizing => {
                self.buffer_delta(delta);
                DeltaOutcome::Buffered {
                    request_snapshot: false,
                }
            }
            SyncStatus::Live => {
                let expected = self.last_update_id + 1;
                if delta.last_update_id < expected {
                    debug!(
                        symbol = %self.symbol,
                        last_update_id = delta.last_update_id,
                        "Ignoring stale depth update"
                    );
                    return DeltaOutcome::Skipped;
                }
                if delta.first_update_id > expected {
                    let notice = OutOfSync {
                        symbol: self.symbol.clone(),
                        expected,
                        received: delta.first_update_id,
                    };
                    self.invalidate();
                    self.buffer_delta(delta);
                    return DeltaOutcome::Gap(notice);
                }
                self.apply(&delta);
                DeltaOutcome::Applied
            }
        }
    }

    /// Replace the book with `snapshot` and replay buffered deltas.
    ///
    /// On a gap the book is discarded again and the deltas from the gap
    /// onward stay buffered for the next snapshot.
    pub fn on_snapshot(&mut self, snapshot: DepthSnapshot) -> Result<(), ReplayError> {
        self.bids = ladder(&snapshot.bids);
        self.asks = ladder(&snapshot.asks);
        self.last_update_id = snapshot.last_update_id;

        let mut discarded = 0usize;
        let mut applied = 0usize;
        while let Some(delta) = self.buffer.pop_front() {
            if delta.last_update_id <= self.last_update_id {
                discarded += 1;
                continue;
            }
            let expected = self.last_update_id + 1;
            if delta.first_update_id > expected {
                warn!(
                    symbol = %self.symbol,
                    expected = expected,
                    first_update_id = delta.first_update_id,
                    last_update_id = delta.last_update_id,
                    "Gap in buffered updates after snapshot"
                );
                let notice = OutOfSync {
                    symbol: self.symbol.clone(),
                    expected,
                    received: delta.first_update_id,
                };
                self.buffer.push_front(delta);
                self.clear_book();
                self.status = SyncStatus::Synchronizing;
                return Err(ReplayError(notice));
            }
            self.apply(&delta);
            applied += 1;
        }

        self.status = SyncStatus::Live;
        info!(
            symbol = %self.symbol,
            snapshot_update_id = snapshot.last_update_id,
            last_update_id = self.last_update_id,
            discarded = discarded,
            applied = applied,
            "Order book synchronized"
        );
        Ok(())
    }

    /// Wholesale replacement from a partial-depth push.
    /// Returns false when the update does not advance the book.
    pub fn on_partial(&mut self, update: DepthUpdateEvent) -> bool {
        if self.status.is_ready() && update.last_update_id <= self.last_update_id {
            debug!(
                symbol = %self.symbol,
                last_update_id = update.last_update_id,
                "Ignoring stale partial depth"
            );
            return false;
        }
        self.bids = ladder(&update.bids);
        self.asks = ladder(&update.asks);
        self.last_update_id = update.last_update_id;
        self.status = SyncStatus::Live;
        true
    }

    /// Keep the buffer; the next delta asks for a snapshot again
    pub fn on_fetch_failed(&mut self) {
        if self.status == SyncStatus::Synchronizing {
            self.status = SyncStatus::Uninitialized;
        }
    }

    pub fn reset(&mut self) {
        self.invalidate();
        self.status = SyncStatus::Uninitialized;
    }

    fn invalidate(&mut self) {
        self.clear_book();
        self.buffer.clear();
        self.status = SyncStatus::Synchronizing;
    }

    fn clear_book(&mut self) {
        self.bids.clear();
        self.asks.clear();
        self.last_update_id = 0;
    }

    fn buffer_delta(&mut self, delta: DepthUpdateEvent) {
        if self.buffer.len() >= self.max_buffer_size
            && let Some(dropped) = self.buffer.pop_front()
        {
            warn!(
                symbol = %self.symbol,
                first_update_id = dropped.first_update_id,
                last_update_id = dropped.last_update_id,
                "Depth buffer full, dropping oldest update"
            );
        }
        self.buffer.push_back(delta);
    }

    fn apply(&mut self, delta: &DepthUpdateEvent) {
        merge(&mut self.bids, &delta.bids);
        merge(&mut self.asks, &delta.asks);
        self.last_update_id = delta.last_update_id;
        trace!(
            symbol = %self.symbol,
            first_update_id = delta.first_update_id,
            last_update_id = delta.last_update_id,
            "Applied depth update"
        );
    }
}

fn ladder(levels: &[PriceLevel]) -> BTreeMap<Decimal, Decimal> {
    let mut side = BTreeMap::new();
    merge(&mut side, levels);
    side
}

/// Zero quantity removes the level, anything else replaces it
fn merge(side: &mut BTreeMap<Decimal, Decimal>, levels: &[PriceLevel]) {
    for level in levels {
        if level.is_empty() {
            side.remove(&level.price);
        } else {
            side.insert(level.price, level.quantity);
        }
    }
}

fn make_book(
    symbol: &str,
    last_update_id: u64,
    bids: &BTreeMap<Decimal, Decimal>,
    asks: &BTreeMap<Decimal, Decimal>,
) -> OrderBook {
    let to_levels = |(price, quantity): (&Decimal, &Decimal)| PriceLevel {
        price: *price,
        quantity: *quantity,
    };
    OrderBook::new(
        symbol,
        last_update_id,
        bids.iter().rev().map(to_levels).collect(),
        asks.iter().map(to_levels).collect(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn level(price: Decimal, quantity: Decimal) -> PriceLevel {
        PriceLevel::new(price, quantity).unwrap()
    }

    fn delta(
        first: u64,
        last: u64,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    ) -> DepthUpdateEvent {
        DepthUpdateEvent {
            event_time: Utc::now(),
            symbol: "BTCUSDT".to_string(),
            first_update_id: first,
            last_update_id: last,
            bids,
            asks,
            partial: false,
        }
    }

    fn snapshot(last_update_id: u64) -> DepthSnapshot {
        DepthSnapshot {
            symbol: "BTCUSDT".to_string(),
            last_update_id,
            bids: vec![level(dec!(100), dec!(1)), level(dec!(99), dec!(2))],
            asks: vec![level(dec!(101), dec!(1))],
        }
    }

    #[test]
    fn test_first_delta_requests_snapshot() {
        let mut sync = DepthSynchronizer::new("BTCUSDT", 100);
        assert_eq!(
            sync.on_delta(delta(1, 2, vec![], vec![])),
            DeltaOutcome::Buffered { request_snapshot: true }
        );
        assert_eq!(
            sync.on_delta(delta(3, 4, vec![], vec![])),
            DeltaOutcome::Buffered { request_snapshot: false }
        );
        assert_eq!(sync.status(), SyncStatus::Synchronizing);
        assert!(sync.order_book().is_none());
    }

    #[test]
    fn test_replay_discards_older_and_applies_in_order() {
        let mut sync = DepthSynchronizer::new("BTCUSDT", 100);
        sync.on_delta(delta(100, 105, vec![level(dec!(50), dec!(9))], vec![]));
        sync.on_delta(delta(106, 110, vec![level(dec!(98), dec!(3))], vec![]));
        sync.on_delta(delta(111, 115, vec![], vec![level(dec!(102), dec!(4))]));

        sync.on_snapshot(snapshot(107)).unwrap();

        assert_eq!(sync.status(), SyncStatus::Live);
        assert_eq!(sync.last_update_id(), 115);
        let book = sync.order_book().unwrap();
        assert_eq!(book.last_update_id(), 115);
        assert_eq!(book.quantity_at(dec!(50)), Decimal::ZERO);
        assert_eq!(book.quantity_at(dec!(98)), dec!(3));
        assert_eq!(book.quantity_at(dec!(102)), dec!(4));
    }

    #[test]
    fn test_zero_quantity_removes_and_non_zero_replaces() {
        let mut sync = DepthSynchronizer::new("BTCUSDT", 100);
        sync.on_delta(delta(1, 1, vec![], vec![]));
        sync.on_snapshot(snapshot(1)).unwrap();

        let outcome = sync.on_delta(delta(
            2,
            2,
            vec![level(dec!(100), dec!(0)), level(dec!(99), dec!(5))],
            vec![],
        ));
        assert_eq!(outcome, DeltaOutcome::Applied);

        let book = sync.order_book().unwrap();
        assert_eq!(book.quantity_at(dec!(100)), Decimal::ZERO);
        assert_eq!(book.quantity_at(dec!(99)), dec!(5));
        assert_eq!(book.bids().len(), 1);
        assert_eq!(book.best_bid().unwrap().price, dec!(99));
    }

    #[test]
    fn test_live_gap_invalidates_book() {
        let mut sync = DepthSynchronizer::new("BTCUSDT", 100);
        sync.on_delta(delta(1, 1, vec![], vec![]));
        sync.on_snapshot(snapshot(1)).unwrap();

        assert_eq!(sync.on_delta(delta(2, 3, vec![], vec![])), DeltaOutcome::Applied);
        assert_eq!(sync.on_delta(delta(2, 3, vec![], vec![])), DeltaOutcome::Skipped);

        let outcome = sync.on_delta(delta(10, 12, vec![], vec![]));
        assert_eq!(
            outcome,
            DeltaOutcome::Gap(OutOfSync {
                symbol: "BTCUSDT".to_string(),
                expected: 4,
                received: 10,
            })
        );
        assert_eq!(sync.status(), SyncStatus::Synchronizing);
        assert!(sync.order_book().is_none());
        assert_eq!(sync.buffered(), 1);
    }

    #[test]
    fn test_snapshot_too_old_keeps_buffer() {
        let mut sync = DepthSynchronizer::new("BTCUSDT", 100);
        sync.on_delta(delta(100, 105, vec![], vec![]));
        sync.on_delta(delta(106, 110, vec![], vec![]));

        let err = sync.on_snapshot(snapshot(90)).unwrap_err();
        assert_eq!(err.0.expected, 91);
        assert_eq!(err.0.received, 100);
        assert_eq!(sync.buffered(), 2);
        assert!(sync.order_book().is_none());

        sync.on_snapshot(snapshot(104)).unwrap();
        assert_eq!(sync.last_update_id(), 110);
    }

    #[test]
    fn test_buffer_cap_drops_oldest() {
        let mut sync = DepthSynchronizer::new("BTCUSDT", 2);
        sync.on_delta(delta(1, 1, vec![], vec![]));
        sync.on_delta(delta(2, 2, vec![], vec![]));
        sync.on_delta(delta(3, 3, vec![], vec![]));
        assert_eq!(sync.buffered(), 2);

        // Update 1 is gone, so a snapshot at 0 cannot bridge to 2
        assert!(sync.on_snapshot(snapshot(0)).is_err());
    }

    #[test]
    fn test_fetch_failure_rearms_request() {
        let mut sync = DepthSynchronizer::new("BTCUSDT", 100);
        sync.on_delta(delta(1, 1, vec![], vec![]));
        sync.on_fetch_failed();
        assert_eq!(sync.status(), SyncStatus::Uninitialized);
        assert_eq!(
            sync.on_delta(delta(2, 2, vec![], vec![])),
            DeltaOutcome::Buffered { request_snapshot: true }
        );
        assert_eq!(sync.buffered(), 2);
    }

    #[test]
    fn test_partial_depth_replaces_wholesale() {
        let mut sync = DepthSynchronizer::new("BTCUSDT", 100);
        let mut update = delta(
            10,
            10,
            vec![level(dec!(100), dec!(1))],
            vec![level(dec!(101), dec!(1))],
        );
        update.partial = true;
        assert!(sync.on_partial(update.clone()));

        let mut next = delta(12, 12, vec![level(dec!(99), dec!(2))], vec![]);
        next.partial = true;
        assert!(sync.on_partial(next));
        assert!(!sync.on_partial(update));

        let book = sync.order_book().unwrap();
        assert_eq!(book.last_update_id(), 12);
        assert_eq!(book.bids().len(), 1);
        assert!(book.asks().is_empty());
    }
}
