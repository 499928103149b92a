use serde::Deserialize;
use std::path::PathBuf;

/// Complete YAML configuration structure
///
/// Every field is optional so a file can set only what it needs. Values set
/// here win over environment variables.
///
/// # Example YAML structure
/// ```yaml
/// openai:
///   api_key: "sk-..."
///   model: "gpt-4o-realtime-preview"
///   url: "wss://api.openai.com/v1/realtime"
///   voice: "alloy"
///
/// interview:
///   candidate_name: "Sam"
///   difficulty: "medium"
///   interviewer_name: "Julia"
///
/// audio:
///   debounce_ms: 1000
///   session_ready_timeout_seconds: 10
///   archive_dir: "./recordings"
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct YamlConfig {
    pub openai: Option<OpenAIYaml>,
    pub interview: Option<InterviewYaml>,
    pub audio: Option<AudioYaml>,
}

/// Realtime API connection settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct OpenAIYaml {
    pub api_key: Option<String>,
    pub model: Option<String>,
    /// Base WebSocket URL, without the model query parameter
    pub url: Option<String>,
    pub voice: Option<String>,
}

/// Interview settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct InterviewYaml {
    pub candidate_name: Option<String>,
    /// One of easy, medium, hard
    pub difficulty: Option<String>,
    pub interviewer_name: Option<String>,
}

/// Session timing and audio archive settings from YAML
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AudioYaml {
    pub debounce_ms: Option<u64>,
    pub session_ready_timeout_seconds: Option<u64>,
    pub archive_dir: Option<String>,
}

impl YamlConfig {
    /// Load configuration from a YAML file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or the YAML is malformed.
    pub fn from_file(path: &PathBuf) -> Result<Self, Box<dyn std::error::Error>> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read config file {}: {e}", path.display()))?;

        let config: YamlConfig = serde_yaml::from_str(&contents)
            .map_err(|e| format!("Failed to parse YAML config: {e}"))?;

        Ok(config)
    }
}
