use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::{self, Message, Utf8Bytes};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::domain::MessageSink;
use crate::domain::stream_name::stream_from_path;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Transport is already streaming")]
    AlreadyStreaming,
    #[error("Invalid URI: {0}")]
    InvalidUri(String),
    #[error("Connection error: {0}")]
    Connect(#[source] tungstenite::Error),
    #[error("Receive error: {0}")]
    Receive(#[source] tungstenite::Error),
}

/// Connection lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Open { uri: String },
    Closed { uri: String },
}

/// One WebSocket connection at a time, delivering complete text messages
/// to every registered [`MessageSink`] in arrival order.
pub struct WebSocketTransport {
    streaming: Mutex<bool>,
    sinks: Mutex<Vec<Arc<dyn MessageSink>>>,
    events: broadcast::Sender<TransportEvent>,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketTransport {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            streaming: Mutex::new(false),
            sinks: Mutex::new(Vec::new()),
            events,
        }
    }

    pub fn add_sink(&self, sink: Arc<dyn MessageSink>) {
        self.sinks.lock().push(sink);
    }

    pub fn is_streaming(&self) -> bool {
        *self.streaming.lock()
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<TransportEvent> {
        self.events.subscribe()
    }

    /// Connect to `uri` and receive until cancelled, closed by the peer, or
    /// a connection fault occurs.
    ///
    /// Returns `Ok` on cancellation and on close. A `Closed` event is
    /// published once on every exit after the re-entrancy check.
    pub async fn stream(
        &self,
        uri: &str,
        cancel: &CancellationToken,
    ) -> Result<(), TransportError> {
        let url = Url::parse(uri)
            .map_err(|e| TransportError::InvalidUri(format!("{}: {}", uri, e)))?;
        if cancel.is_cancelled() {
            return Ok(());
        }

        {
            let mut streaming = self.streaming.lock();
            if *streaming {
                return Err(TransportError::AlreadyStreaming);
            }
            *streaming = true;
        }
        let _session = Session {
            transport: self,
            uri: uri.to_string(),
        };

        // Combined streams carry their name in the envelope instead
        let stream_id = stream_from_path(url.path())
            .unwrap_or(url.path())
            .to_string();

        let connected = tokio::select! {
            _ = cancel.cancelled() => return Ok(()),
            result = connect_async(url.as_str()) => result,
        };
        let (ws_stream, _) = match connected {
            Ok(connection) => connection,
            Err(_) if cancel.is_cancelled() => return Ok(()),
            Err(e) => return Err(TransportError::Connect(e)),
        };

        info!(uri = %uri, "WebSocket connected");
        let _ = self.events.send(TransportEvent::Open {
            uri: uri.to_string(),
        });

        let (mut write, mut read) = ws_stream.split();

        loop {
            let frame = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!(uri = %uri, "WebSocket streaming cancelled");
                    break;
                }
                frame = read.next() => frame,
            };

            match frame {
                Some(Ok(Message::Text(text))) => {
                    if text.is_empty() {
                        warn!(uri = %uri, "Received empty message");
                        continue;
                    }
                    self.deliver(&stream_id, text.as_str());
                }
                Some(Ok(Message::Binary(data))) => {
                    warn!(uri = %uri, bytes = data.len(), "Unsupported binary message, closing");
                    let close = Message::Close(Some(CloseFrame {
                        code: CloseCode::Unsupported,
                        reason: Utf8Bytes::from_static("Binary messages are not supported"),
                    }));
                    if let Err(e) = write.send(close).await {
                        debug!(uri = %uri, error = %e, "Close handshake failed");
                    }
                    break;
                }
                Some(Ok(Message::Close(frame))) => {
                    warn!(uri = %uri, frame = ?frame, "Received close frame");
                    if let Err(e) = write.close().await {
                        debug!(uri = %uri, error = %e, "Close handshake failed");
                    }
                    break;
                }
                Some(Ok(Message::Ping(data))) => {
                    trace!(uri = %uri, bytes = data.len(), "Received ping");
                }
                Some(Ok(_)) => {}
                Some(Err(_)) if cancel.is_cancelled() => break,
                Some(Err(e)) => return Err(TransportError::Receive(e)),
                None => {
                    info!(uri = %uri, "WebSocket stream ended");
                    break;
                }
            }
        }

        Ok(())
    }

    fn deliver(&self, stream: &str, message: &str) {
        let sinks = self.sinks.lock().clone();
        for sink in sinks {
            sink.on_message(stream, message);
        }
    }
}

/// Resets the streaming flag and publishes `Closed` on every exit path
struct Session<'a> {
    transport: &'a WebSocketTransport,
    uri: String,
}

impl Drop for Session<'_> {
    fn drop(&mut self) {
        *self.transport.streaming.lock() = false;
        info!(uri = %self.uri, "WebSocket closed");
        let _ = self.transport.events.send(TransportEvent::Closed {
            uri: std::mem::take(&mut self.uri),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_invalid_uri() {
        let transport = WebSocketTransport::new();
        let result = transport.stream("not a uri", &CancellationToken::new()).await;
        assert!(matches!(result, Err(TransportError::InvalidUri(_))));
        assert!(!transport.is_streaming());
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let transport = WebSocketTransport::new();
        let mut events = transport.subscribe_events();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = transport.stream("ws://127.0.0.1:1/ws/btcusdt@trade", &cancel).await;
        assert!(result.is_ok());
        assert!(events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_connect_failure_still_closes() {
        let transport = WebSocketTransport::new();
        let mut events = transport.subscribe_events();

        let result = transport
            .stream("ws://127.0.0.1:1/ws/btcusdt@trade", &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(TransportError::Connect(_))));
        assert!(matches!(events.try_recv(), Ok(TransportEvent::Closed { .. })));
        assert!(!transport.is_streaming());
    }
}
