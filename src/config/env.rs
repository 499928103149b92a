//! Environment variable loading.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::core::instructions::Difficulty;
use crate::core::realtime::{OpenAIRealtimeModel, OpenAIRealtimeVoice};

use super::ScreenConfig;

/// Read a variable, treating empty values as unset.
fn var(name: &str) -> Option<String> {
    env::var(name).ok().filter(|v| !v.trim().is_empty())
}

fn parse_var<T: FromStr>(name: &str) -> Result<Option<T>, Box<dyn std::error::Error>>
where
    T::Err: std::fmt::Display,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| format!("Invalid {name} value '{raw}': {e}").into()),
        None => Ok(None),
    }
}

/// Overlay environment variables onto `config`.
///
/// `.env` values are already in the process environment by the time this
/// runs, so actual environment variables win over them.
pub(super) fn apply_env(config: &mut ScreenConfig) -> Result<(), Box<dyn std::error::Error>> {
    if let Some(key) = var("OPENAI_API_KEY") {
        config.openai_api_key = Some(key);
    }
    if let Some(model) = var("OPENAI_REALTIME_MODEL") {
        config.realtime_model = OpenAIRealtimeModel::from_str_or_default(&model);
    }
    if let Some(url) = var("OPENAI_REALTIME_URL") {
        config.realtime_url = url;
    }
    if let Some(voice) = var("OPENAI_VOICE") {
        config.voice = OpenAIRealtimeVoice::from_str_or_default(&voice);
    }

    if let Some(name) = var("CANDIDATE_NAME") {
        config.candidate_name = name;
    }
    if let Some(difficulty) = parse_var::<Difficulty>("PROBLEM_DIFFICULTY")? {
        config.difficulty = difficulty;
    }
    if let Some(name) = var("INTERVIEWER_NAME") {
        config.interviewer_name = name;
    }

    if let Some(ms) = parse_var::<u64>("DEBOUNCE_MS")? {
        config.debounce_ms = ms;
    }
    if let Some(secs) = parse_var::<u64>("SESSION_READY_TIMEOUT_SECONDS")? {
        config.session_ready_timeout_seconds = secs;
    }
    if let Some(dir) = var("ARCHIVE_DIR") {
        config.archive_dir = Some(PathBuf::from(dir));
    }

    Ok(())
}
