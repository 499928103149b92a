use std::path::PathBuf;

use crate::core::instructions::Difficulty;
use crate::core::realtime::{OpenAIRealtimeModel, OpenAIRealtimeVoice};

use super::ScreenConfig;
use super::env::apply_env;
use super::yaml::YamlConfig;

/// Build the final configuration: defaults, then environment, then YAML.
pub(super) fn merge_config(
    yaml: Option<YamlConfig>,
) -> Result<ScreenConfig, Box<dyn std::error::Error>> {
    let mut config = ScreenConfig::default();
    apply_env(&mut config)?;

    let Some(yaml) = yaml else {
        return Ok(config);
    };

    if let Some(openai) = yaml.openai {
        if let Some(key) = openai.api_key.filter(|k| !k.trim().is_empty()) {
            config.openai_api_key = Some(key);
        }
        if let Some(model) = openai.model {
            config.realtime_model = OpenAIRealtimeModel::from_str_or_default(&model);
        }
        if let Some(url) = openai.url {
            config.realtime_url = url;
        }
        if let Some(voice) = openai.voice {
            config.voice = OpenAIRealtimeVoice::from_str_or_default(&voice);
        }
    }

    if let Some(interview) = yaml.interview {
        if let Some(name) = interview.candidate_name {
            config.candidate_name = name;
        }
        if let Some(difficulty) = interview.difficulty {
            config.difficulty = difficulty.parse::<Difficulty>()?;
        }
        if let Some(name) = interview.interviewer_name {
            config.interviewer_name = name;
        }
    }

    if let Some(audio) = yaml.audio {
        if let Some(ms) = audio.debounce_ms {
            config.debounce_ms = ms;
        }
        if let Some(secs) = audio.session_ready_timeout_seconds {
            config.session_ready_timeout_seconds = secs;
        }
        if let Some(dir) = audio.archive_dir {
            config.archive_dir = Some(PathBuf::from(dir));
        }
    }

    Ok(config)
}
