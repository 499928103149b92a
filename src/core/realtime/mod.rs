//! Realtime conversation sessions.
//!
//! A session streams microphone audio to a conversational agent and streams
//! the agent's audio, transcripts and text back. Inbound protocol events are
//! folded into conversation items and delivered to handlers registered per
//! [`EventKind`].
//!
//! # Example
//!
//! ```rust,ignore
//! use phone_screen::core::realtime::{BaseRealtime, EventKind, OpenAIRealtime, RealtimeEvent};
//! use std::sync::Arc;
//!
//! let mut session = OpenAIRealtime::default();
//! session.on(EventKind::ConversationUpdated, Arc::new(|event| {
//!     if let RealtimeEvent::ConversationUpdated { item, .. } = event {
//!         println!("{}: {}", item.id, item.formatted.transcript);
//!     }
//! }));
//! session.connect(&api_key).await?;
//! ```

mod base;
pub mod openai;

pub use base::{
    BaseRealtime, BoxedRealtime, ConnectionState, ConversationItem, EventDispatcher,
    EventHandler, EventKind, FormattedContent, InputAudioTranscriptionConfig, ItemDelta,
    ItemRole, ItemStatus, RealtimeError, RealtimeEvent, RealtimeResult, SessionOptions,
    TurnDetectionConfig, dispatch_event,
};
pub use openai::{
    OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL, OpenAIRealtime, OpenAIRealtimeConfig,
    OpenAIRealtimeModel, OpenAIRealtimeVoice,
};
