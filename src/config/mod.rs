//! Configuration for the phone screen client
//!
//! Configuration comes from `.env` files, environment variables and an
//! optional YAML file. Priority: YAML > ENV vars > .env values > defaults.
//!
//! # Modules
//! - `yaml`: YAML configuration file loading
//! - `env`: Environment variable loading
//! - `merge`: Layering YAML over the environment
//!
//! # Example
//! ```rust,no_run
//! use phone_screen::config::ScreenConfig;
//! use std::path::PathBuf;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! // Load from environment variables only
//! let config = ScreenConfig::from_env()?;
//!
//! // Load from YAML file with environment variable base
//! let config = ScreenConfig::from_file(&PathBuf::from("config.yaml"))?;
//! println!("Interviewing {}", config.candidate_name);
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use std::time::Duration;

use zeroize::Zeroize;

use crate::core::instructions::Difficulty;
use crate::core::orchestrator::{
    DEFAULT_CANDIDATE_NAME, DEFAULT_INTERVIEWER_NAME, DEFAULT_SESSION_READY_TIMEOUT,
    SessionTuning, Settings,
};
use crate::core::realtime::openai::DEFAULT_TRANSCRIPTION_MODEL;
use crate::core::realtime::{
    OPENAI_REALTIME_URL, OpenAIRealtimeConfig, OpenAIRealtimeModel, OpenAIRealtimeVoice,
};
use crate::utils::validate_realtime_url;

mod env;
mod merge;
mod yaml;

pub use yaml::{AudioYaml, InterviewYaml, OpenAIYaml, YamlConfig};

/// Client configuration
///
/// Covers the realtime endpoint and credential, the interview settings the
/// instructions are built from, and session timing.
#[derive(Debug, Clone)]
pub struct ScreenConfig {
    // Realtime API
    /// OpenAI API key. Required to start a session, not to load config.
    pub openai_api_key: Option<String>,
    pub realtime_model: OpenAIRealtimeModel,
    /// WebSocket base URL
    pub realtime_url: String,
    pub voice: OpenAIRealtimeVoice,

    // Interview
    pub candidate_name: String,
    pub difficulty: Difficulty,
    pub interviewer_name: String,

    // Session timing
    /// Quiet interval before code edits are sent (default: 1000)
    pub debounce_ms: u64,
    /// Wait for `session.created` before giving up (default: 10)
    pub session_ready_timeout_seconds: u64,
    /// Directory for per-item WAV archives. None keeps them in memory only.
    pub archive_dir: Option<PathBuf>,
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            openai_api_key: None,
            realtime_model: OpenAIRealtimeModel::default(),
            realtime_url: OPENAI_REALTIME_URL.to_string(),
            voice: OpenAIRealtimeVoice::default(),
            candidate_name: DEFAULT_CANDIDATE_NAME.to_string(),
            difficulty: Difficulty::default(),
            interviewer_name: DEFAULT_INTERVIEWER_NAME.to_string(),
            debounce_ms: 1000,
            session_ready_timeout_seconds: DEFAULT_SESSION_READY_TIMEOUT.as_secs(),
            archive_dir: None,
        }
    }
}

impl Drop for ScreenConfig {
    fn drop(&mut self) {
        if let Some(ref mut key) = self.openai_api_key {
            key.zeroize();
        }
    }
}

impl ScreenConfig {
    /// Load configuration from environment variables only
    ///
    /// # Errors
    /// Returns an error if a variable has an invalid format or validation fails.
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        let config = merge::merge_config(None)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a YAML file with environment variable base
    ///
    /// Priority order (highest to lowest):
    /// 1. YAML file values
    /// 2. Environment variables (actual ENV vars override .env values)
    /// 3. .env file values
    /// 4. Default values
    ///
    /// The `.env` file is loaded in `main` before this runs.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let yaml_config = yaml::YamlConfig::from_file(path)?;
        let config = merge::merge_config(Some(yaml_config))?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Box<dyn std::error::Error>> {
        validate_realtime_url(&self.realtime_url)?;
        if self.debounce_ms == 0 {
            return Err("debounce_ms must be greater than zero".into());
        }
        if self.session_ready_timeout_seconds == 0 {
            return Err("session_ready_timeout_seconds must be greater than zero".into());
        }
        if self.candidate_name.trim().is_empty() {
            return Err("candidate_name must not be empty".into());
        }
        if self.interviewer_name.trim().is_empty() {
            return Err("interviewer_name must not be empty".into());
        }
        Ok(())
    }

    /// Interview settings for the orchestrator. A missing key yields an
    /// empty credential, which the orchestrator refuses to connect with.
    pub fn settings(&self) -> Settings {
        let mut settings = Settings::new(self.openai_api_key.clone().unwrap_or_default());
        settings.candidate_name = self.candidate_name.clone();
        settings.difficulty = self.difficulty;
        settings.interviewer_name = self.interviewer_name.clone();
        settings
    }

    pub fn tuning(&self) -> SessionTuning {
        SessionTuning {
            voice: self.voice.as_str().to_string(),
            transcription_model: DEFAULT_TRANSCRIPTION_MODEL.to_string(),
            debounce: Duration::from_millis(self.debounce_ms),
            session_ready_timeout: Duration::from_secs(self.session_ready_timeout_seconds),
            archive_dir: self.archive_dir.clone(),
        }
    }

    pub fn realtime_config(&self) -> OpenAIRealtimeConfig {
        OpenAIRealtimeConfig {
            url: self.realtime_url.clone(),
            model: self.realtime_model,
        }
    }
}
