pub mod audio;
pub mod debounce;
pub mod instructions;
pub mod orchestrator;
pub mod realtime;

// Re-export commonly used types for convenience
pub use audio::{AudioCaptureSource, AudioPlaybackSink, DeviceError, StreamPlayer};
pub use debounce::Debouncer;
pub use instructions::{Difficulty, build_instructions};
pub use orchestrator::{
    OrchestratorError, OrchestratorHandle, SessionOrchestrator, SessionState, SessionTuning,
    Settings,
};
pub use realtime::{
    BaseRealtime, BoxedRealtime, OpenAIRealtime, OpenAIRealtimeConfig, RealtimeError,
    RealtimeEvent, RealtimeResult,
};
