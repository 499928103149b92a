//! Interview session orchestration.
//!
//! [`SessionOrchestrator`] sequences connect and teardown across the realtime
//! client, the capture source and the playback sink, routes session events to
//! the devices, and forwards settled editor snapshots to the agent. Run it on
//! its own task with [`SessionOrchestrator::spawn`] and drive it through the
//! returned [`OrchestratorHandle`].
//!
//! ```text
//! Idle -> Connecting -> Active -> Disconnecting -> Idle
//!            |                          ^
//!            +---- (step failed) -------+--> Idle
//! ```

mod errors;
mod handle;
mod session;
mod settings;

pub use errors::{OrchestratorError, OrchestratorResult};
pub use handle::{Command, OrchestratorHandle};
pub use session::{ELAPSED_TICK, SessionOrchestrator, fence_code};
pub use settings::{
    DEFAULT_CANDIDATE_NAME, DEFAULT_INTERVIEWER_NAME, DEFAULT_SESSION_READY_TIMEOUT,
    DEFAULT_VOICE, SessionState, SessionTuning, Settings, session_options,
};
