//! WebSocket Mock Server for the Realtime API
//!
//! Accepts one session at a time, records the handshake headers and every
//! client event, and lets the test push scripted server events.

use base64::Engine;
use base64::prelude::BASE64_STANDARD;
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::{HeaderMap, StatusCode};

use phone_screen::core::realtime::OpenAIRealtimeConfig;

use crate::fixtures::samples_to_bytes;

/// How the mock answers the WebSocket handshake.
#[derive(Debug, Clone, Copy)]
pub enum HandshakeBehavior {
    /// Accept and immediately send `session.created`
    Accept,
    /// Accept but never confirm the session
    AcceptSilently,
    /// Reject the upgrade with this status
    Reject(StatusCode),
}

/// State shared between the server task and the test.
#[derive(Default)]
struct Shared {
    headers: Mutex<Option<HeaderMap>>,
    path: Mutex<Option<String>>,
    connections: Mutex<u32>,
}

/// Mock Realtime API server.
pub struct MockRealtimeServer {
    addr: SocketAddr,
    shared: Arc<Shared>,
    outgoing: mpsc::UnboundedSender<Message>,
    received: AsyncMutex<mpsc::UnboundedReceiver<Value>>,
    task: JoinHandle<()>,
}

impl MockRealtimeServer {
    pub async fn start(behavior: HandshakeBehavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let shared = Arc::new(Shared::default());
        let (outgoing_tx, outgoing_rx) = mpsc::unbounded_channel();
        let (received_tx, received_rx) = mpsc::unbounded_channel();

        let task_shared = shared.clone();
        let task = tokio::spawn(async move {
            let mut outgoing_rx = Some(outgoing_rx);
            while let Ok((stream, _)) = listener.accept().await {
                *task_shared.connections.lock() += 1;
                // Only the first accepted session is scripted
                let Some(outgoing) = outgoing_rx.take() else {
                    continue;
                };
                let result = handle_connection(
                    stream,
                    behavior,
                    task_shared.clone(),
                    outgoing,
                    received_tx.clone(),
                )
                .await;
                if let Err(e) = result {
                    eprintln!("Mock realtime connection ended: {}", e);
                }
            }
        });

        Self {
            addr,
            shared,
            outgoing: outgoing_tx,
            received: AsyncMutex::new(received_rx),
            task,
        }
    }

    /// Client configuration pointing at this server.
    pub fn config(&self) -> OpenAIRealtimeConfig {
        OpenAIRealtimeConfig {
            url: format!("ws://{}/v1/realtime", self.addr),
            ..Default::default()
        }
    }

    /// Handshake headers of the accepted session.
    pub fn headers(&self) -> Option<HeaderMap> {
        self.shared.headers.lock().clone()
    }

    /// Request path and query of the accepted session.
    pub fn path(&self) -> Option<String> {
        self.shared.path.lock().clone()
    }

    pub fn connection_count(&self) -> u32 {
        *self.shared.connections.lock()
    }

    /// Push a server event to the connected client.
    pub fn send(&self, event: Value) {
        self.outgoing
            .send(Message::Text(event.to_string().into()))
            .unwrap();
    }

    /// Close the socket from the server side.
    pub fn close(&self) {
        self.outgoing.send(Message::Close(None)).unwrap();
    }

    /// Next client event of type `event_type`, skipping others.
    pub async fn expect_event(&self, event_type: &str) -> Value {
        let mut received = self.received.lock().await;
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = received.recv().await.expect("mock server stopped");
                if event["type"] == event_type {
                    return event;
                }
            }
        })
        .await
        .unwrap_or_else(|_| panic!("no {} event received", event_type))
    }

    /// Every client event received so far without waiting.
    pub async fn drain_events(&self) -> Vec<Value> {
        let mut received = self.received.lock().await;
        let mut events = Vec::new();
        while let Ok(event) = received.try_recv() {
            events.push(event);
        }
        events
    }
}

impl Drop for MockRealtimeServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Handle a single realtime session
async fn handle_connection(
    stream: TcpStream,
    behavior: HandshakeBehavior,
    shared: Arc<Shared>,
    mut outgoing: mpsc::UnboundedReceiver<Message>,
    received: mpsc::UnboundedSender<Value>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let callback_shared = shared.clone();
    let callback = move |request: &Request, response: Response| {
        *callback_shared.headers.lock() = Some(request.headers().clone());
        *callback_shared.path.lock() = request.uri().path_and_query().map(|p| p.to_string());
        match behavior {
            HandshakeBehavior::Reject(status) => {
                let mut rejection = ErrorResponse::new(Some("rejected".to_string()));
                *rejection.status_mut() = status;
                Err(rejection)
            }
            _ => Ok(response),
        }
    };

    let ws_stream = accept_hdr_async(stream, callback).await?;
    let (mut write, mut read) = ws_stream.split();

    if matches!(behavior, HandshakeBehavior::Accept) {
        write
            .send(Message::Text(session_created("sess_mock").to_string().into()))
            .await?;
    }

    loop {
        tokio::select! {
            next = outgoing.recv() => {
                let Some(message) = next else { break };
                let closing = matches!(message, Message::Close(_));
                write.send(message).await?;
                if closing {
                    break;
                }
            }
            incoming = read.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let event: Value = serde_json::from_str(&text)?;
                        let _ = received.send(event);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => return Err(e.into()),
                }
            }
        }
    }

    Ok(())
}

// =============================================================================
// Scripted server events
// =============================================================================

pub fn session_created(session_id: &str) -> Value {
    json!({
        "type": "session.created",
        "event_id": "event_0",
        "session": { "id": session_id, "model": "gpt-4o-realtime-preview", "voice": "alloy" }
    })
}

/// `response.output_item.added` for an in-progress assistant message.
pub fn assistant_item_added(item_id: &str) -> Value {
    json!({
        "type": "response.output_item.added",
        "response_id": "resp_1",
        "output_index": 0,
        "item": {
            "id": item_id,
            "type": "message",
            "role": "assistant",
            "status": "in_progress",
            "content": []
        }
    })
}

/// `response.content_part.added` announcing audio on `item_id`.
pub fn audio_part_added(item_id: &str) -> Value {
    json!({
        "type": "response.content_part.added",
        "response_id": "resp_1",
        "item_id": item_id,
        "output_index": 0,
        "content_index": 0,
        "part": { "type": "audio", "transcript": "" }
    })
}

pub fn audio_delta(item_id: &str, samples: &[i16]) -> Value {
    json!({
        "type": "response.audio.delta",
        "response_id": "resp_1",
        "item_id": item_id,
        "output_index": 0,
        "content_index": 0,
        "delta": BASE64_STANDARD.encode(samples_to_bytes(samples))
    })
}

pub fn transcript_delta(item_id: &str, text: &str) -> Value {
    json!({
        "type": "response.audio_transcript.delta",
        "response_id": "resp_1",
        "item_id": item_id,
        "output_index": 0,
        "content_index": 0,
        "delta": text
    })
}

pub fn assistant_item_done(item_id: &str) -> Value {
    json!({
        "type": "response.output_item.done",
        "response_id": "resp_1",
        "output_index": 0,
        "item": {
            "id": item_id,
            "type": "message",
            "role": "assistant",
            "status": "completed",
            "content": []
        }
    })
}

pub fn speech_started(item_id: &str) -> Value {
    json!({
        "type": "input_audio_buffer.speech_started",
        "audio_start_ms": 1200,
        "item_id": item_id
    })
}

pub fn api_error(message: &str) -> Value {
    json!({
        "type": "error",
        "event_id": "event_err",
        "error": { "type": "invalid_request_error", "code": "bad_event", "message": message }
    })
}
