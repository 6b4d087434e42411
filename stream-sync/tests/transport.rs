//! WebSocket transport against a local server

use futures_util::{SinkExt, StreamExt};
use market_core::AggregateTrade;
use parking_lot::Mutex;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use stream_sync::{
    AggregateTradeClient, AggregateTradeDecoder, MessageSink, TransportError, TransportEvent,
    WebSocketTransport, agg_trade_stream, callback, combined_stream_uri,
};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::time::timeout;
use tokio_tungstenite::WebSocketStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Helpers
// ============================================================================

/// Accept a single WebSocket connection and hand it to `handler`
async fn serve_once<F, Fut>(handler: F) -> SocketAddr
where
    F: FnOnce(WebSocketStream<TcpStream>) -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let ws = tokio_tungstenite::accept_async(tcp).await.unwrap();
        handler(ws).await;
    });
    addr
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<(String, String)>>,
}

impl MessageSink for RecordingSink {
    fn on_message(&self, stream: &str, message: &str) {
        self.messages
            .lock()
            .push((stream.to_string(), message.to_string()));
    }
}

async fn wait_for_open(events: &mut tokio::sync::broadcast::Receiver<TransportEvent>) {
    let event = timeout(Duration::from_secs(2), events.recv())
        .await
        .expect("timed out waiting for open")
        .unwrap();
    assert!(matches!(event, TransportEvent::Open { .. }));
}

fn text(body: &str) -> Message {
    Message::Text(body.to_string().into())
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn test_text_messages_reach_every_sink_in_order() {
    let addr = serve_once(|mut ws| async move {
        ws.send(text("first")).await.unwrap();
        ws.send(text("")).await.unwrap();
        ws.send(text("second")).await.unwrap();
        ws.close(None).await.unwrap();
        while ws.next().await.is_some() {}
    })
    .await;

    let transport = WebSocketTransport::new();
    let a = Arc::new(RecordingSink::default());
    let b = Arc::new(RecordingSink::default());
    transport.add_sink(a.clone());
    transport.add_sink(b.clone());
    let mut events = transport.subscribe_events();

    let uri = format!("ws://{}/ws/btcusdt@trade", addr);
    let result = timeout(
        Duration::from_secs(5),
        transport.stream(&uri, &CancellationToken::new()),
    )
    .await
    .expect("stream did not finish");
    assert!(result.is_ok());
    assert!(!transport.is_streaming());

    let expected = vec![
        ("btcusdt@trade".to_string(), "first".to_string()),
        ("btcusdt@trade".to_string(), "second".to_string()),
    ];
    assert_eq!(*a.messages.lock(), expected);
    assert_eq!(*b.messages.lock(), expected);

    assert_eq!(events.try_recv().unwrap(), TransportEvent::Open { uri: uri.clone() });
    assert_eq!(events.try_recv().unwrap(), TransportEvent::Closed { uri });
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_binary_frame_closes_with_unsupported() {
    let (close_tx, close_rx) = oneshot::channel();
    let addr = serve_once(|mut ws| async move {
        ws.send(Message::Binary(vec![1u8, 2, 3].into())).await.unwrap();
        while let Some(Ok(msg)) = ws.next().await {
            if let Message::Close(frame) = msg {
                let _ = close_tx.send(frame.map(|f| f.code));
                break;
            }
        }
    })
    .await;

    let transport = WebSocketTransport::new();
    let sink = Arc::new(RecordingSink::default());
    transport.add_sink(sink.clone());

    let uri = format!("ws://{}/ws/btcusdt@trade", addr);
    let result = timeout(
        Duration::from_secs(5),
        transport.stream(&uri, &CancellationToken::new()),
    )
    .await
    .expect("stream did not finish");
    assert!(result.is_ok());

    let code = timeout(Duration::from_secs(2), close_rx).await.unwrap().unwrap();
    assert_eq!(code, Some(CloseCode::Unsupported));
    assert!(sink.messages.lock().is_empty());
}

#[tokio::test]
async fn test_cancel_mid_receive_closes_once() {
    let addr = serve_once(|mut ws| async move {
        // Keep the connection open until the client goes away
        while ws.next().await.is_some() {}
    })
    .await;

    let transport = Arc::new(WebSocketTransport::new());
    let mut events = transport.subscribe_events();
    let cancel = CancellationToken::new();
    let uri = format!("ws://{}/ws/btcusdt@depth", addr);

    let task = {
        let transport = transport.clone();
        let cancel = cancel.clone();
        let uri = uri.clone();
        tokio::spawn(async move { transport.stream(&uri, &cancel).await })
    };

    wait_for_open(&mut events).await;
    assert!(transport.is_streaming());

    // A second session is refused while the first one runs
    let second = transport.stream(&uri, &cancel).await;
    assert!(matches!(second, Err(TransportError::AlreadyStreaming)));
    assert!(transport.is_streaming());

    cancel.cancel();
    let result = timeout(Duration::from_secs(2), task).await.unwrap().unwrap();
    assert!(result.is_ok());
    assert!(!transport.is_streaming());

    assert_eq!(events.try_recv().unwrap(), TransportEvent::Closed { uri });
    assert!(events.try_recv().is_err());
}

#[tokio::test]
async fn test_transport_restarts_after_session_ends() {
    let transport = WebSocketTransport::new();
    for round in 0..2 {
        let addr = serve_once(move |mut ws| async move {
            ws.send(text(&format!("round {}", round))).await.unwrap();
            ws.close(None).await.unwrap();
            while ws.next().await.is_some() {}
        })
        .await;
        let uri = format!("ws://{}/ws/ethusdt@trade", addr);
        let result = timeout(
            Duration::from_secs(5),
            transport.stream(&uri, &CancellationToken::new()),
        )
        .await
        .expect("stream did not finish");
        assert!(result.is_ok());
    }
}

#[tokio::test]
async fn test_combined_stream_routes_by_envelope() {
    let first = agg_trade_stream("BTCUSDT");
    let second = agg_trade_stream("ETHUSDT");
    let payload = |stream: &str, symbol: &str, id: u64| {
        format!(
            r#"{{"stream":"{stream}","data":{{"e":"aggTrade","E":1,"s":"{symbol}","a":{id},"p":"10","q":"2","f":{id},"l":{id},"T":1,"m":true,"M":true}}}}"#
        )
    };
    let messages = vec![
        payload(&first, "BTCUSDT", 7),
        payload(&second, "ETHUSDT", 8),
        payload("ignored@trade", "XRPUSDT", 9),
    ];
    let addr = serve_once(move |mut ws| async move {
        for message in messages {
            ws.send(text(&message)).await.unwrap();
        }
        ws.close(None).await.unwrap();
        while ws.next().await.is_some() {}
    })
    .await;

    let client = Arc::new(AggregateTradeClient::new(AggregateTradeDecoder));
    let (tx, mut rx) = mpsc::unbounded_channel();
    for stream in [&first, &second] {
        let tx = tx.clone();
        client.subscribe(
            stream,
            Some(callback(move |event: &stream_sync::AggregateTradeEvent| {
                let trade: &AggregateTrade = &event.trade;
                let _ = tx.send((trade.symbol.clone(), trade.id));
                Ok(())
            })),
        );
    }

    let transport = WebSocketTransport::new();
    transport.add_sink(client.clone());
    let uri = combined_stream_uri(&format!("ws://{}", addr), &[first.clone(), second.clone()]);
    assert!(uri.ends_with("/stream?streams=btcusdt@aggTrade/ethusdt@aggTrade"));

    let result = timeout(
        Duration::from_secs(5),
        transport.stream(&uri, &CancellationToken::new()),
    )
    .await
    .expect("stream did not finish");
    assert!(result.is_ok());

    assert_eq!(rx.recv().await.unwrap(), ("BTCUSDT".to_string(), 7));
    assert_eq!(rx.recv().await.unwrap(), ("ETHUSDT".to_string(), 8));
    assert!(rx.try_recv().is_err());
}
