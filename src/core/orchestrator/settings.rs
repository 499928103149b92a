//! User-facing settings and session tuning.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroize;

use crate::core::debounce::DEFAULT_DEBOUNCE;
use crate::core::instructions::{Difficulty, build_instructions};
use crate::core::realtime::openai::DEFAULT_TRANSCRIPTION_MODEL;
use crate::core::realtime::{InputAudioTranscriptionConfig, SessionOptions, TurnDetectionConfig};

pub const DEFAULT_CANDIDATE_NAME: &str = "Sam";
pub const DEFAULT_INTERVIEWER_NAME: &str = "Julia";
pub const DEFAULT_VOICE: &str = "alloy";
pub const DEFAULT_SESSION_READY_TIMEOUT: Duration = Duration::from_secs(10);

/// Lifecycle of the interview session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Connecting,
    Active,
    Disconnecting,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Connecting => write!(f, "connecting"),
            SessionState::Active => write!(f, "active"),
            SessionState::Disconnecting => write!(f, "disconnecting"),
        }
    }
}

/// Settings the candidate can change between sessions.
///
/// Read when a session connects. The API key is wiped on drop and never
/// printed by `Debug`.
#[derive(Clone, PartialEq, Eq)]
pub struct Settings {
    pub api_key: String,
    pub candidate_name: String,
    pub difficulty: Difficulty,
    pub interviewer_name: String,
}

impl Settings {
    pub fn new(api_key: impl Into<String>) -> Self {
        let mut settings = Self::default();
        settings.api_key = api_key.into();
        settings
    }

    pub fn has_credential(&self) -> bool {
        !self.api_key.trim().is_empty()
    }

    /// System instructions for these settings.
    pub fn instructions(&self) -> String {
        build_instructions(
            &self.candidate_name,
            self.difficulty,
            &self.interviewer_name,
        )
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            candidate_name: DEFAULT_CANDIDATE_NAME.to_string(),
            difficulty: Difficulty::default(),
            interviewer_name: DEFAULT_INTERVIEWER_NAME.to_string(),
        }
    }
}

impl fmt::Debug for Settings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Settings")
            .field(
                "api_key",
                &if self.api_key.is_empty() {
                    "<unset>"
                } else {
                    "<redacted>"
                },
            )
            .field("candidate_name", &self.candidate_name)
            .field("difficulty", &self.difficulty)
            .field("interviewer_name", &self.interviewer_name)
            .finish()
    }
}

impl Drop for Settings {
    fn drop(&mut self) {
        self.api_key.zeroize();
    }
}

/// Operational knobs that are not part of the interview itself.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTuning {
    pub voice: String,
    pub transcription_model: String,
    /// Quiet interval before a code snapshot is sent
    pub debounce: Duration,
    /// How long to wait for the server to confirm the session
    pub session_ready_timeout: Duration,
    /// Directory receiving a WAV file per completed item
    pub archive_dir: Option<PathBuf>,
}

impl Default for SessionTuning {
    fn default() -> Self {
        Self {
            voice: DEFAULT_VOICE.to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            debounce: DEFAULT_DEBOUNCE,
            session_ready_timeout: DEFAULT_SESSION_READY_TIMEOUT,
            archive_dir: None,
        }
    }
}

/// Session options sent before connecting.
pub fn session_options(settings: &Settings, tuning: &SessionTuning) -> SessionOptions {
    SessionOptions {
        instructions: Some(settings.instructions()),
        voice: Some(tuning.voice.clone()),
        input_audio_transcription: Some(InputAudioTranscriptionConfig {
            model: tuning.transcription_model.clone(),
        }),
        turn_detection: Some(TurnDetectionConfig::server_vad()),
    }
}
