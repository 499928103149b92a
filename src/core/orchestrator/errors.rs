use thiserror::Error;

use crate::core::audio::DeviceError;
use crate::core::realtime::RealtimeError;

/// Errors surfaced by the session orchestrator.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// No API key configured
    #[error("Missing credential: set OPENAI_API_KEY or openai.api_key")]
    MissingCredential,

    /// A session is already live or in transition
    #[error("A session is already active")]
    AlreadyActive,

    #[error(transparent)]
    Device(#[from] DeviceError),

    #[error(transparent)]
    Realtime(#[from] RealtimeError),

    /// The orchestrator task has exited
    #[error("Orchestrator stopped")]
    Stopped,
}

pub type OrchestratorResult<T> = Result<T, OrchestratorError>;
