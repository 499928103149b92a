//! Base traits and types for realtime conversation sessions.
//!
//! This module defines the abstraction the session orchestrator drives: a duplex
//! session that accepts streamed microphone audio and injected text, and emits
//! conversation events (item updates, interruptions, errors) back to registered
//! handlers.
//!
//! # Audio Format
//!
//! All audio crossing this boundary is mono PCM 16-bit at 24kHz.

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

// =============================================================================
// Error Types
// =============================================================================

/// Errors that can occur during realtime operations.
#[derive(Debug, Error)]
pub enum RealtimeError {
    /// Connection to the provider failed
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Authentication failed
    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// WebSocket error
    #[error("WebSocket error: {0}")]
    WebSocketError(String),

    /// Operation timeout
    #[error("Operation timed out: {0}")]
    Timeout(String),

    /// Not connected
    #[error("Not connected")]
    NotConnected,

    /// Session error
    #[error("Session error: {0}")]
    SessionError(String),
}

/// Result type for realtime operations.
pub type RealtimeResult<T> = Result<T, RealtimeError>;

// =============================================================================
// Session Options
// =============================================================================

/// Input audio transcription settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputAudioTranscriptionConfig {
    /// Transcription model (e.g., "whisper-1")
    pub model: String,
}

/// Turn detection configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnDetectionConfig {
    /// Server-side voice activity detection decides when the user's turn ends.
    ServerVad {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        threshold: Option<f32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        prefix_padding_ms: Option<u32>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        silence_duration_ms: Option<u32>,
    },
    /// Turns are ended manually by `create_response`.
    None,
}

impl TurnDetectionConfig {
    /// Server VAD with the provider's default tuning.
    pub fn server_vad() -> Self {
        Self::ServerVad {
            threshold: None,
            prefix_padding_ms: None,
            silence_duration_ms: None,
        }
    }
}

/// Options applied to a session with `update_session`.
///
/// Every field is optional; updating merges the fields that are set into the
/// options already stored on the client.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionOptions {
    /// System instructions for the agent
    pub instructions: Option<String>,
    /// Output voice identifier
    pub voice: Option<String>,
    /// Transcription of the user's audio
    pub input_audio_transcription: Option<InputAudioTranscriptionConfig>,
    /// Turn detection mode
    pub turn_detection: Option<TurnDetectionConfig>,
}

impl SessionOptions {
    /// Overlay the fields set in `other` onto `self`.
    pub fn merge(&mut self, other: SessionOptions) {
        if other.instructions.is_some() {
            self.instructions = other.instructions;
        }
        if other.voice.is_some() {
            self.voice = other.voice;
        }
        if other.input_audio_transcription.is_some() {
            self.input_audio_transcription = other.input_audio_transcription;
        }
        if other.turn_detection.is_some() {
            self.turn_detection = other.turn_detection;
        }
    }

    /// Whether turns must be ended explicitly by the client.
    pub fn manual_turns(&self) -> bool {
        matches!(self.turn_detection, Some(TurnDetectionConfig::None))
    }
}

// =============================================================================
// Connection State
// =============================================================================

/// Connection state of a realtime session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionState::Disconnected => write!(f, "disconnected"),
            ConnectionState::Connecting => write!(f, "connecting"),
            ConnectionState::Connected => write!(f, "connected"),
        }
    }
}

// =============================================================================
// Conversation Items
// =============================================================================

/// Speaker of a conversation item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemRole {
    User,
    Assistant,
    System,
}

impl ItemRole {
    /// Parse the wire role, returning `None` for unknown values.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(Self::User),
            "assistant" => Some(Self::Assistant),
            "system" => Some(Self::System),
            _ => None,
        }
    }
}

impl fmt::Display for ItemRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemRole::User => write!(f, "user"),
            ItemRole::Assistant => write!(f, "assistant"),
            ItemRole::System => write!(f, "system"),
        }
    }
}

/// Lifecycle status of a conversation item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    InProgress,
    Completed,
    Incomplete,
}

impl ItemStatus {
    /// Parse the wire status, treating unknown values as in progress.
    pub fn parse(s: &str) -> Self {
        match s {
            "completed" => Self::Completed,
            "incomplete" => Self::Incomplete,
            _ => Self::InProgress,
        }
    }
}

/// Content accumulated on an item from its deltas.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FormattedContent {
    /// Transcript of the item's audio
    pub transcript: String,
    /// Text content
    pub text: String,
    /// PCM16 samples at 24kHz
    pub audio: Vec<i16>,
}

/// One turn of dialogue.
#[derive(Debug, Clone, PartialEq)]
pub struct ConversationItem {
    /// Opaque item identifier, also used as the playback track id
    pub id: String,
    /// Item type (message, function_call, ...)
    pub item_type: String,
    /// Speaker, when the item is a message
    pub role: Option<ItemRole>,
    /// Lifecycle status
    pub status: ItemStatus,
    /// Accumulated content
    pub formatted: FormattedContent,
}

impl ConversationItem {
    /// Whether the item has been finalized.
    pub fn is_completed(&self) -> bool {
        self.status == ItemStatus::Completed
    }

    /// Copy of the item with its accumulated audio left out.
    pub fn without_audio(&self) -> Self {
        Self {
            id: self.id.clone(),
            item_type: self.item_type.clone(),
            role: self.role,
            status: self.status,
            formatted: FormattedContent {
                transcript: self.formatted.transcript.clone(),
                text: self.formatted.text.clone(),
                audio: Vec::new(),
            },
        }
    }
}

/// The incremental change carried by a conversation update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemDelta {
    /// Newly received PCM16 samples
    pub audio: Option<Vec<i16>>,
    /// Newly received transcript text
    pub transcript: Option<String>,
    /// Newly received text
    pub text: Option<String>,
}

// =============================================================================
// Events
// =============================================================================

/// Events emitted by a realtime session.
#[derive(Debug, Clone, PartialEq)]
pub enum RealtimeEvent {
    /// Protocol or transport error. Fatal errors mean the session is gone.
    Error { message: String, fatal: bool },
    /// The user started speaking over the agent.
    ConversationInterrupted,
    /// An item was created or changed. `delta` is `None` for status changes.
    ///
    /// Updates carrying a delta leave `item.formatted.audio` empty; the new
    /// samples are in `delta.audio`. Updates without a delta carry the full
    /// accumulated audio.
    ConversationUpdated {
        item: ConversationItem,
        delta: Option<ItemDelta>,
    },
}

impl RealtimeEvent {
    /// The dispatch key of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            RealtimeEvent::Error { .. } => EventKind::Error,
            RealtimeEvent::ConversationInterrupted => EventKind::ConversationInterrupted,
            RealtimeEvent::ConversationUpdated { .. } => EventKind::ConversationUpdated,
        }
    }
}

/// Event kinds handlers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Error,
    ConversationInterrupted,
    ConversationUpdated,
}

/// Event handler. Handlers run synchronously on the session's event task and
/// must not block.
pub type EventHandler = Arc<dyn Fn(&RealtimeEvent) + Send + Sync>;

/// Dispatch table mapping each event kind to its ordered subscribers.
#[derive(Default, Clone)]
pub struct EventDispatcher {
    handlers: HashMap<EventKind, Vec<EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handler for `kind`.
    pub fn subscribe(&mut self, kind: EventKind, handler: EventHandler) {
        self.handlers.entry(kind).or_default().push(handler);
    }

    /// Number of handlers registered for `kind`.
    pub fn handler_count(&self, kind: EventKind) -> usize {
        self.handlers.get(&kind).map_or(0, Vec::len)
    }

    /// Drop every handler.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Handlers for `kind`, in registration order.
    pub fn handlers_for(&self, kind: EventKind) -> Vec<EventHandler> {
        self.handlers.get(&kind).cloned().unwrap_or_default()
    }
}

/// Dispatch `event` through a shared table.
///
/// The handler list is cloned out of the lock before invoking, so handlers may
/// register further handlers without deadlocking.
pub fn dispatch_event(dispatcher: &Arc<RwLock<EventDispatcher>>, event: &RealtimeEvent) {
    let handlers = dispatcher.read().handlers_for(event.kind());
    for handler in handlers {
        handler(event);
    }
}

// =============================================================================
// Session Trait
// =============================================================================

/// A duplex realtime session with a conversational agent.
#[async_trait]
pub trait BaseRealtime: Send + Sync {
    /// Merge session options. Before `connect` they are stored and sent once
    /// the socket opens; afterwards they are sent immediately.
    async fn update_session(&mut self, options: SessionOptions) -> RealtimeResult<()>;

    /// Open the session with the given credential.
    async fn connect(&mut self, api_key: &str) -> RealtimeResult<()>;

    /// Wait until the remote confirms the session was created.
    async fn wait_for_session_created(&mut self, timeout: Duration) -> RealtimeResult<()>;

    /// Queue one frame of microphone audio. Never blocks.
    fn append_input_audio(&mut self, samples: &[i16]) -> RealtimeResult<()>;

    /// Inject a user text message and ask the agent to respond.
    async fn send_text(&mut self, text: &str) -> RealtimeResult<()>;

    /// Ask the agent to respond now.
    async fn create_response(&mut self) -> RealtimeResult<()>;

    /// Cancel the in-flight response and report that playback of `track_id`
    /// stopped after `sample_offset` samples.
    async fn cancel_response(&mut self, track_id: &str, sample_offset: usize)
    -> RealtimeResult<()>;

    /// Register an event handler.
    fn on(&mut self, kind: EventKind, handler: EventHandler);

    /// Tear down the session. Idempotent.
    async fn disconnect(&mut self) -> RealtimeResult<()>;

    fn is_connected(&self) -> bool;

    fn connection_state(&self) -> ConnectionState;
}

/// Boxed realtime session for dynamic dispatch.
pub type BoxedRealtime = Box<dyn BaseRealtime>;

// =============================================================================
// Tests
// =============================================================================
