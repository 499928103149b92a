//! OpenAI Realtime API client implementation.
//!
//! This module provides the OpenAI Realtime client that implements the `BaseRealtime` trait
//! using OpenAI's WebSocket-based Realtime API.
//!
//! # API Reference
//!
//! - Endpoint: `wss://api.openai.com/v1/realtime?model=<model>`
//! - Protocol: WebSocket with JSON events
//! - Audio: PCM 16-bit, 24kHz, mono, little-endian, base64 encoded
//!
//! # Example
//!
//! ```rust,ignore
//! use phone_screen::core::realtime::{BaseRealtime, EventKind, OpenAIRealtime, SessionOptions};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() {
//!     let mut realtime = OpenAIRealtime::default();
//!     realtime.update_session(SessionOptions {
//!         voice: Some("alloy".to_string()),
//!         ..Default::default()
//!     }).await.unwrap();
//!
//!     realtime.on(EventKind::ConversationUpdated, Arc::new(|event| {
//!         println!("{:?}", event);
//!     }));
//!
//!     realtime.connect("sk-...").await.unwrap();
//!     realtime.wait_for_session_created(Duration::from_secs(10)).await.unwrap();
//!     realtime.append_input_audio(&samples).unwrap();
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use parking_lot::{Mutex, RwLock};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::http::{HeaderValue, StatusCode, header::AUTHORIZATION};
use tokio_tungstenite::tungstenite::{self, Message};

use super::config::{OPENAI_AUDIO_FORMAT, OpenAIRealtimeConfig, samples_to_ms};
use super::conversation::Conversation;
use super::messages::{
    ClientEvent, ConversationItem, InputAudioTranscription, ServerEvent, SessionConfig,
    TurnDetection,
};
use crate::core::realtime::base::{
    BaseRealtime, ConnectionState, EventDispatcher, EventHandler, EventKind, ItemRole,
    RealtimeError, RealtimeEvent, RealtimeResult, SessionOptions, TurnDetectionConfig,
    dispatch_event,
};

// =============================================================================
// OpenAI Realtime Client
// =============================================================================

/// OpenAI Realtime API client implementation.
///
/// Outbound events go through an unbounded channel to a spawned socket task,
/// so appending audio never blocks the caller. The same task parses inbound
/// events, folds them into the [`Conversation`] and dispatches the resulting
/// [`RealtimeEvent`]s to registered handlers in arrival order.
///
/// The connection is not re-established when it drops; handlers receive a
/// fatal `Error` event instead.
pub struct OpenAIRealtime {
    config: OpenAIRealtimeConfig,
    /// Options merged from every `update_session` call
    options: SessionOptions,
    state: Arc<RwLock<ConnectionState>>,
    /// Connected flag shared with the socket task
    connected: Arc<AtomicBool>,
    /// Flips to `true` on `session.created`
    session_ready: Option<watch::Receiver<bool>>,
    ws_sender: Option<mpsc::UnboundedSender<ClientEvent>>,
    connection_handle: Option<JoinHandle<()>>,
    conversation: Arc<Mutex<Conversation>>,
    dispatcher: Arc<RwLock<EventDispatcher>>,
}

impl OpenAIRealtime {
    pub fn new(config: OpenAIRealtimeConfig) -> Self {
        Self {
            config,
            options: SessionOptions::default(),
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            connected: Arc::new(AtomicBool::new(false)),
            session_ready: None,
            ws_sender: None,
            connection_handle: None,
            conversation: Arc::new(Mutex::new(Conversation::new())),
            dispatcher: Arc::new(RwLock::new(EventDispatcher::new())),
        }
    }

    pub fn config(&self) -> &OpenAIRealtimeConfig {
        &self.config
    }

    /// Session options that will be (or were) sent to the server.
    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    /// Build the `session.update` payload from the merged options.
    fn build_session_config(&self) -> SessionConfig {
        SessionConfig {
            modalities: Some(vec!["text".to_string(), "audio".to_string()]),
            instructions: self.options.instructions.clone(),
            voice: self.options.voice.clone(),
            input_audio_format: Some(OPENAI_AUDIO_FORMAT.to_string()),
            output_audio_format: Some(OPENAI_AUDIO_FORMAT.to_string()),
            input_audio_transcription: self.options.input_audio_transcription.as_ref().map(|t| {
                InputAudioTranscription {
                    model: t.model.clone(),
                }
            }),
            turn_detection: self.options.turn_detection.as_ref().map(|td| match td {
                TurnDetectionConfig::ServerVad {
                    threshold,
                    prefix_padding_ms,
                    silence_duration_ms,
                } => Some(TurnDetection::ServerVad {
                    threshold: *threshold,
                    prefix_padding_ms: *prefix_padding_ms,
                    silence_duration_ms: *silence_duration_ms,
                }),
                TurnDetectionConfig::None => None,
            }),
        }
    }

    /// Handle a parsed server event on the socket task.
    fn handle_server_event(
        event: ServerEvent,
        conversation: &Arc<Mutex<Conversation>>,
        dispatcher: &Arc<RwLock<EventDispatcher>>,
        session_ready: &watch::Sender<bool>,
    ) {
        match event {
            ServerEvent::SessionCreated { session } => {
                tracing::info!("OpenAI Realtime session created: {}", session.id);
                session_ready.send_replace(true);
            }

            ServerEvent::SessionUpdated { session } => {
                tracing::debug!("OpenAI Realtime session updated: {}", session.id);
            }

            ServerEvent::Error { error } => {
                tracing::error!(
                    "OpenAI Realtime error: {} - {}",
                    error.error_type,
                    error.message
                );
                dispatch_event(
                    dispatcher,
                    &RealtimeEvent::Error {
                        message: format!("{}: {}", error.error_type, error.message),
                        fatal: false,
                    },
                );
            }

            ServerEvent::Unknown => {
                tracing::trace!("Unhandled server event");
            }

            other => {
                let produced = conversation.lock().process(other);
                if let Some(event) = produced {
                    dispatch_event(dispatcher, &event);
                }
            }
        }
    }

    /// Queue an event for the socket task.
    fn send_event(&self, event: ClientEvent) -> RealtimeResult<()> {
        let sender = self.ws_sender.as_ref().ok_or(RealtimeError::NotConnected)?;
        tracing::trace!("Sending {}", event.event_type());
        sender
            .send(event)
            .map_err(|e| RealtimeError::WebSocketError(e.to_string()))
    }

    fn ensure_connected(&self) -> RealtimeResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(RealtimeError::NotConnected)
        }
    }
}

/// Map a failed WebSocket handshake to the realtime error taxonomy.
fn map_connect_error(err: tungstenite::Error) -> RealtimeError {
    match err {
        tungstenite::Error::Http(response) => {
            let status = response.status();
            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                RealtimeError::AuthenticationFailed(format!("handshake rejected with {}", status))
            } else {
                RealtimeError::ConnectionFailed(format!("handshake rejected with {}", status))
            }
        }
        other => RealtimeError::ConnectionFailed(other.to_string()),
    }
}

#[async_trait]
impl BaseRealtime for OpenAIRealtime {
    async fn update_session(&mut self, options: SessionOptions) -> RealtimeResult<()> {
        self.options.merge(options);
        if self.is_connected() {
            let session = self.build_session_config();
            self.send_event(ClientEvent::SessionUpdate { session })?;
        }
        Ok(())
    }

    async fn connect(&mut self, api_key: &str) -> RealtimeResult<()> {
        if self.is_connected() {
            return Err(RealtimeError::SessionError("Already connected".to_string()));
        }
        if api_key.trim().is_empty() {
            return Err(RealtimeError::AuthenticationFailed(
                "API key is required".to_string(),
            ));
        }

        *self.state.write() = ConnectionState::Connecting;

        let url = self.config.ws_url();
        let mut request = url
            .as_str()
            .into_client_request()
            .map_err(|e| RealtimeError::InvalidConfiguration(e.to_string()))?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", api_key))
            .map_err(|e| RealtimeError::AuthenticationFailed(e.to_string()))?;
        request.headers_mut().insert(AUTHORIZATION, bearer);
        request
            .headers_mut()
            .insert("OpenAI-Beta", HeaderValue::from_static("realtime=v1"));

        let (ws_stream, _response) = match tokio_tungstenite::connect_async(request).await {
            Ok(connected) => connected,
            Err(e) => {
                *self.state.write() = ConnectionState::Disconnected;
                return Err(map_connect_error(e));
            }
        };

        tracing::info!("Connected to OpenAI Realtime API");

        let (mut ws_sink, mut ws_stream) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<ClientEvent>();
        let (ready_tx, ready_rx) = watch::channel(false);

        self.conversation.lock().clear();
        self.ws_sender = Some(tx);
        self.session_ready = Some(ready_rx);

        let conversation = self.conversation.clone();
        let dispatcher = self.dispatcher.clone();
        let connected = self.connected.clone();
        let state = self.state.clone();

        self.connected.store(true, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Connected;

        let handle = tokio::spawn(async move {
            let mut lost: Option<String> = None;

            loop {
                tokio::select! {
                    // Outgoing events, in the order they were queued
                    outgoing = rx.recv() => {
                        let Some(event) = outgoing else { break };
                        let json = match serde_json::to_string(&event) {
                            Ok(j) => j,
                            Err(e) => {
                                tracing::error!("Failed to serialize event: {}", e);
                                continue;
                            }
                        };
                        if let Err(e) = ws_sink.send(Message::Text(json.into())).await {
                            lost = Some(format!("Failed to send WebSocket message: {}", e));
                            break;
                        }
                    }

                    incoming = ws_stream.next() => {
                        match incoming {
                            Some(Ok(Message::Text(text))) => {
                                match serde_json::from_str::<ServerEvent>(&text) {
                                    Ok(event) => Self::handle_server_event(
                                        event,
                                        &conversation,
                                        &dispatcher,
                                        &ready_tx,
                                    ),
                                    Err(e) => {
                                        tracing::warn!("Failed to parse server event: {} - {}", e, text);
                                    }
                                }
                            }
                            Some(Ok(Message::Ping(data))) => {
                                if let Err(e) = ws_sink.send(Message::Pong(data)).await {
                                    tracing::error!("Failed to send pong: {}", e);
                                }
                            }
                            Some(Ok(Message::Close(_))) => {
                                lost = Some("WebSocket closed by server".to_string());
                                break;
                            }
                            Some(Ok(_)) => {}
                            Some(Err(e)) => {
                                lost = Some(format!("WebSocket error: {}", e));
                                break;
                            }
                            None => {
                                lost = Some("WebSocket stream ended".to_string());
                                break;
                            }
                        }
                    }
                }
            }

            connected.store(false, Ordering::SeqCst);
            *state.write() = ConnectionState::Disconnected;

            if let Some(reason) = lost {
                tracing::warn!("OpenAI Realtime connection lost: {}", reason);
                dispatch_event(
                    &dispatcher,
                    &RealtimeEvent::Error {
                        message: reason,
                        fatal: true,
                    },
                );
            }
            tracing::info!("OpenAI Realtime connection task ended");
        });

        self.connection_handle = Some(handle);

        // Options set before connecting are applied now
        let session = self.build_session_config();
        self.send_event(ClientEvent::SessionUpdate { session })?;

        Ok(())
    }

    async fn wait_for_session_created(&mut self, timeout: Duration) -> RealtimeResult<()> {
        let mut ready = self
            .session_ready
            .clone()
            .ok_or(RealtimeError::NotConnected)?;

        match tokio::time::timeout(timeout, ready.wait_for(|created| *created)).await {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(RealtimeError::NotConnected),
            Err(_) => Err(RealtimeError::Timeout(format!(
                "session.created not received within {}ms",
                timeout.as_millis()
            ))),
        }
    }

    fn append_input_audio(&mut self, samples: &[i16]) -> RealtimeResult<()> {
        if samples.is_empty() {
            return Ok(());
        }
        self.ensure_connected()?;
        self.send_event(ClientEvent::audio_append(samples))?;
        self.conversation.lock().append_input_audio(samples);
        Ok(())
    }

    async fn send_text(&mut self, text: &str) -> RealtimeResult<()> {
        self.ensure_connected()?;
        self.send_event(ClientEvent::ConversationItemCreate {
            item: ConversationItem::user_text(text),
            previous_item_id: None,
        })?;
        self.create_response().await
    }

    async fn create_response(&mut self) -> RealtimeResult<()> {
        self.ensure_connected()?;

        if self.options.manual_turns() {
            let commit = {
                let mut conversation = self.conversation.lock();
                if conversation.has_pending_input() {
                    conversation.queue_input_audio();
                    true
                } else {
                    false
                }
            };
            if commit {
                self.send_event(ClientEvent::InputAudioBufferCommit)?;
            }
        }

        self.send_event(ClientEvent::ResponseCreate { response: None })
    }

    async fn cancel_response(
        &mut self,
        track_id: &str,
        sample_offset: usize,
    ) -> RealtimeResult<()> {
        self.ensure_connected()?;

        let content_index = {
            let conversation = self.conversation.lock();
            let item = conversation.get(track_id).ok_or_else(|| {
                RealtimeError::SessionError(format!("Could not find item \"{}\"", track_id))
            })?;
            if item.item_type != "message" || item.role != Some(ItemRole::Assistant) {
                return Err(RealtimeError::SessionError(format!(
                    "Can only cancel assistant messages, \"{}\" is not one",
                    track_id
                )));
            }
            conversation.audio_content_index(track_id).ok_or_else(|| {
                RealtimeError::SessionError(format!(
                    "Could not find audio on item \"{}\" to cancel",
                    track_id
                ))
            })?
        };

        let audio_end_ms = samples_to_ms(sample_offset);
        tracing::debug!(
            "Cancelling response: item={} audio_end_ms={}",
            track_id,
            audio_end_ms
        );

        self.send_event(ClientEvent::ResponseCancel)?;
        self.send_event(ClientEvent::ConversationItemTruncate {
            item_id: track_id.to_string(),
            content_index: content_index as u32,
            audio_end_ms,
        })
    }

    fn on(&mut self, kind: EventKind, handler: EventHandler) {
        self.dispatcher.write().subscribe(kind, handler);
    }

    async fn disconnect(&mut self) -> RealtimeResult<()> {
        // Unsubscribe first so nothing fires while the task winds down
        self.dispatcher.write().clear();
        self.ws_sender = None;
        self.session_ready = None;

        let was_running = self.connection_handle.is_some();
        if let Some(handle) = self.connection_handle.take() {
            handle.abort();
            let _ = handle.await;
        }

        self.connected.store(false, Ordering::SeqCst);
        *self.state.write() = ConnectionState::Disconnected;
        self.conversation.lock().clear();

        if was_running {
            tracing::info!("Disconnected from OpenAI Realtime API");
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn connection_state(&self) -> ConnectionState {
        *self.state.read()
    }
}

impl Default for OpenAIRealtime {
    fn default() -> Self {
        Self::new(OpenAIRealtimeConfig::default())
    }
}

impl Drop for OpenAIRealtime {
    fn drop(&mut self) {
        if let Some(handle) = self.connection_handle.take() {
            handle.abort();
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
