//! OpenAI Realtime API module.
//!
//! Duplex voice sessions against OpenAI's Realtime API over WebSocket.
//!
//! # Features
//!
//! - Streamed microphone audio with server-side voice activity detection
//! - Streamed agent audio, transcripts and text folded into conversation items
//! - Barge-in: `speech_started` surfaces as an interruption, and
//!   `cancel_response` truncates the agent's item at the sample the user heard
//! - Input audio transcription (whisper-1)
//!
//! # Audio Format
//!
//! Input and output audio is PCM 16-bit signed little-endian at 24kHz.

mod client;
mod config;
mod conversation;
mod messages;

pub use client::OpenAIRealtime;
pub use config::{
    DEFAULT_TRANSCRIPTION_MODEL, OPENAI_REALTIME_SAMPLE_RATE, OPENAI_REALTIME_URL,
    OpenAIRealtimeConfig, OpenAIRealtimeModel, OpenAIRealtimeVoice, ms_to_samples, samples_to_ms,
};
pub use conversation::Conversation;
pub use messages::{ClientEvent, ServerEvent, SessionConfig, TurnDetection};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::realtime::base::{BaseRealtime, ConnectionState};

    #[tokio::test]
    async fn test_openai_realtime_default_creation() {
        let realtime = OpenAIRealtime::default();
        assert!(!realtime.is_connected());
        assert_eq!(realtime.connection_state(), ConnectionState::Disconnected);
        assert_eq!(realtime.config().url, OPENAI_REALTIME_URL);
    }

    #[test]
    fn test_sample_rate() {
        assert_eq!(OPENAI_REALTIME_SAMPLE_RATE, 24000);
    }
}
