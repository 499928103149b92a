//! Audio devices for the interview session.
//!
//! Capture produces mono PCM16 frames at 24kHz; playback consumes streamed
//! PCM16 chunks grouped into tracks and reports exactly where it stopped
//! when interrupted.

use thiserror::Error;

pub mod capture;
pub mod pcm;
pub mod playback;

pub use capture::{AudioCaptureSource, ChannelCapture, FrameCallback, PcmFrame, WavFileCapture};
pub use pcm::{AudioBuffer, FRAME_SAMPLES, SAMPLE_RATE, decode};
pub use playback::{
    AudioPlaybackSink, PcmOutput, PlaybackTarget, StreamPlayer, TrackSampleOffset, WavFileOutput,
};

/// Errors raised by audio devices.
#[derive(Debug, Error)]
pub enum DeviceError {
    /// The device could not be acquired
    #[error("Audio device unavailable: {0}")]
    Unavailable(String),

    /// The device was used before it was started
    #[error("Audio device not started")]
    NotStarted,

    /// I/O failure while reading or writing audio
    #[error("Audio I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed or unsupported audio data
    #[error("Audio format error: {0}")]
    Format(String),
}

impl From<hound::Error> for DeviceError {
    fn from(e: hound::Error) -> Self {
        match e {
            hound::Error::IoError(io) => DeviceError::Io(io),
            other => DeviceError::Format(other.to_string()),
        }
    }
}
