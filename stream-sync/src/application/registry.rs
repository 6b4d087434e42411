use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::trace;

use crate::domain::CallbackError;

/// Per-stream callback. Returning `Err` never interrupts fan-out.
pub type Callback<E> = Arc<dyn Fn(&E) -> Result<(), CallbackError> + Send + Sync>;

/// Wrap a closure as a [`Callback`]
pub fn callback<E, F>(f: F) -> Callback<E>
where
    F: Fn(&E) -> Result<(), CallbackError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Handle identifying one registration, used for targeted removal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

struct Entry<E> {
    id: SubscriptionId,
    callback: Option<Callback<E>>,
}

/// Stream name -> ordered callbacks registered for it
///
/// A stream stays registered while it has at least one entry, including
/// entries without a callback.
pub struct SubscriptionRegistry<E> {
    streams: DashMap<String, Vec<Entry<E>>>,
    next_id: AtomicU64,
}

impl<E> SubscriptionRegistry<E> {
    pub fn new() -> Self {
        Self {
            streams: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    pub fn add(&self, stream: &str, callback: Option<Callback<E>>) -> SubscriptionId {
        let id = SubscriptionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.streams
            .entry(stream.to_string())
            .or_default()
            .push(Entry { id, callback });
        trace!(stream = %stream, id = id.0, "Registered subscription");
        id
    }

    /// Remove one registration, or every registration of `stream` when `id` is None.
    /// Returns true if anything was removed.
    pub fn remove(&self, stream: &str, id: Option<SubscriptionId>) -> bool {
        let Some(id) = id else {
            let removed = self.streams.remove(stream).is_some();
            if removed {
                trace!(stream = %stream, "Removed all subscriptions for stream");
            }
            return removed;
        };

        let mut removed = false;
        let mut now_empty = false;
        if let Some(mut entries) = self.streams.get_mut(stream) {
            let before = entries.len();
            entries.retain(|e| e.id != id);
            removed = entries.len() != before;
            now_empty = entries.is_empty();
        }
        if now_empty {
            self.streams.remove_if(stream, |_, entries| entries.is_empty());
        }
        if removed {
            trace!(stream = %stream, id = id.0, "Removed subscription");
        }
        removed
    }

    pub fn clear(&self) {
        self.streams.clear();
    }

    pub fn contains(&self, stream: &str) -> bool {
        self.streams.contains_key(stream)
    }

    /// Copy of the callbacks registered for `stream` at this instant, in
    /// registration order. None when the stream is not registered.
    pub fn callbacks(&self, stream: &str) -> Option<Vec<Callback<E>>> {
        let entries = self.streams.get(stream)?;
        Some(entries.iter().filter_map(|e| e.callback.clone()).collect())
    }

    pub fn streams(&self) -> Vec<String> {
        let mut streams: Vec<String> = self.streams.iter().map(|e| e.key().clone()).collect();
        streams.sort();
        streams
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }
}

impl<E> Default for SubscriptionRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
