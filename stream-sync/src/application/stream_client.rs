use serde_json::Value;
use std::panic::{AssertUnwindSafe, catch_unwind};
use tokio::sync::broadcast;
use tracing::{debug, error, trace, warn};

use super::registry::{Callback, SubscriptionId, SubscriptionRegistry};
use crate::domain::{CallbackError, DecodeError, EventDecoder, MessageSink};

/// Default capacity of the type-wide event channel
pub const DEFAULT_EVENT_CAPACITY: usize = 4096;

/// Routes stream messages to callbacks registered by stream name.
///
/// One client handles one event kind, chosen by its decoder. Each message
/// is decoded once, handed to every callback registered for its stream in
/// registration order, then published on the type-wide broadcast channel.
pub struct StreamClient<D: EventDecoder> {
    decoder: D,
    registry: SubscriptionRegistry<D::Event>,
    events: broadcast::Sender<D::Event>,
}

impl<D: EventDecoder> StreamClient<D> {
    pub fn new(decoder: D) -> Self {
        Self::with_capacity(decoder, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_capacity(decoder: D, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            decoder,
            registry: SubscriptionRegistry::new(),
            events,
        }
    }

    pub fn subscribe(&self, stream: &str, callback: Option<Callback<D::Event>>) -> SubscriptionId {
        debug!(
            decoder = self.decoder.name(),
            stream = %stream,
            callback = callback.is_some(),
            "Subscribe"
        );
        self.registry.add(stream, callback)
    }

    /// Remove one registration, or the whole stream when `id` is None
    pub fn unsubscribe(&self, stream: &str, id: Option<SubscriptionId>) -> bool {
        debug!(decoder = self.decoder.name(), stream = %stream, "Unsubscribe");
        self.registry.remove(stream, id)
    }

    pub fn unsubscribe_all(&self) {
        debug!(decoder = self.decoder.name(), "Unsubscribe all");
        self.registry.clear();
    }

    pub fn is_subscribed(&self, stream: &str) -> bool {
        self.registry.contains(stream)
    }

    pub fn subscribed_streams(&self) -> Vec<String> {
        self.registry.streams()
    }

    /// Receiver for every event this client decodes, across all streams
    pub fn subscribe_events(&self) -> broadcast::Receiver<D::Event> {
        self.events.subscribe()
    }

    /// Decode and fan out one message. Never fails: faults are logged here.
    pub fn handle_message(&self, stream: &str, message: &str) {
        let value: Value = match serde_json::from_str::<Value>(message)
            .map_err(|e| DecodeError::Json(e.to_string()))
        {
            Ok(v) => v,
            Err(e) => {
                error!(stream = %stream, error = %e, "Failed to parse message");
                return;
            }
        };

        let (stream, data) = unwrap_envelope(stream, &value);

        let Some(callbacks) = self.registry.callbacks(stream) else {
            trace!(stream = %stream, "Ignoring message for unsubscribed stream");
            return;
        };

        let event = match self.decoder.decode(stream, data) {
            Ok(event) => event,
            Err(DecodeError::UnknownEventType(kind)) => {
                warn!(
                    decoder = self.decoder.name(),
                    stream = %stream,
                    event_type = %kind,
                    "Unexpected event type"
                );
                return;
            }
            Err(e) => {
                error!(
                    decoder = self.decoder.name(),
                    stream = %stream,
                    error = %e,
                    "Failed to decode event"
                );
                return;
            }
        };

        for callback in &callbacks {
            invoke_callback(callback, &event, stream);
        }

        // No receivers is not an error
        let _ = self.events.send(event);
    }
}

impl<D: EventDecoder> MessageSink for StreamClient<D> {
    fn on_message(&self, stream: &str, message: &str) {
        self.handle_message(stream, message);
    }
}

/// Combined-stream messages carry their own routing key
fn unwrap_envelope<'a>(stream: &'a str, value: &'a Value) -> (&'a str, &'a Value) {
    if let Some(inner) = value.get("stream").and_then(|s| s.as_str())
        && let Some(data) = value.get("data")
        && data.is_object()
    {
        return (inner, data);
    }
    (stream, value)
}

/// Run one callback, containing failures and panics
pub(crate) fn invoke_callback<E>(callback: &Callback<E>, event: &E, stream: &str) {
    match catch_unwind(AssertUnwindSafe(|| callback(event))) {
        Ok(Ok(())) | Ok(Err(CallbackError::Cancelled)) => {}
        Ok(Err(CallbackError::Failed(reason))) => {
            warn!(stream = %stream, reason = %reason, "Unhandled event handler failure");
        }
        Err(_) => {
            warn!(stream = %stream, "Event handler panicked");
        }
    }
}
