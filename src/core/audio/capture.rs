//! Microphone capture sources.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use super::DeviceError;
use super::pcm::{FRAME_SAMPLES, SAMPLE_RATE, downmix, resample};

/// One captured frame of mono PCM16 at 24kHz.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PcmFrame {
    pub mono: Vec<i16>,
}

/// Callback invoked once per captured frame, in capture order.
pub type FrameCallback = Box<dyn FnMut(PcmFrame) + Send>;

/// A capture device producing PCM frames while recording.
#[async_trait]
pub trait AudioCaptureSource: Send {
    /// Acquire the device.
    async fn begin(&mut self) -> Result<(), DeviceError>;

    /// Start delivering frames to `on_frame` until `end` is called.
    async fn record(&mut self, on_frame: FrameCallback) -> Result<(), DeviceError>;

    /// Release the device. Safe to call repeatedly.
    async fn end(&mut self) -> Result<(), DeviceError>;

    /// Whether frames are currently being delivered.
    fn is_recording(&self) -> bool;
}

// =============================================================================
// WAV file capture
// =============================================================================

/// Plays a WAV file as if it were a microphone.
///
/// The file is mixed to mono and resampled to 24kHz on `begin`. Frames of
/// 20ms are delivered in real time, followed by silence once the file is
/// exhausted so server-side turn detection sees the speaker stop.
pub struct WavFileCapture {
    path: PathBuf,
    samples: Option<Arc<Vec<i16>>>,
    task: Option<(JoinHandle<()>, CancellationToken)>,
}

impl WavFileCapture {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            samples: None,
            task: None,
        }
    }

    fn load(&self) -> Result<Vec<i16>, DeviceError> {
        let reader = hound::WavReader::open(&self.path).map_err(|e| {
            DeviceError::Unavailable(format!("{}: {}", self.path.display(), e))
        })?;
        let spec = reader.spec();

        let interleaved: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
            (hound::SampleFormat::Int, 16) => {
                reader.into_samples::<i16>().collect::<Result<_, _>>()?
            }
            (hound::SampleFormat::Float, 32) => reader
                .into_samples::<f32>()
                .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * i16::MAX as f32) as i16))
                .collect::<Result<_, _>>()?,
            (format, bits) => {
                return Err(DeviceError::Format(format!(
                    "unsupported WAV encoding: {:?} {} bit",
                    format, bits
                )));
            }
        };

        let mono = downmix(&interleaved, spec.channels);
        Ok(resample(&mono, spec.sample_rate, SAMPLE_RATE))
    }
}

#[async_trait]
impl AudioCaptureSource for WavFileCapture {
    async fn begin(&mut self) -> Result<(), DeviceError> {
        let samples = self.load()?;
        tracing::info!(
            "Capture source opened: {} ({:.1}s)",
            self.path.display(),
            samples.len() as f64 / SAMPLE_RATE as f64
        );
        self.samples = Some(Arc::new(samples));
        Ok(())
    }

    async fn record(&mut self, mut on_frame: FrameCallback) -> Result<(), DeviceError> {
        let samples = self.samples.clone().ok_or(DeviceError::NotStarted)?;
        if self.task.is_some() {
            return Ok(());
        }

        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(20));
            let mut cursor = 0usize;
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    _ = ticker.tick() => {
                        let mut mono = vec![0i16; FRAME_SAMPLES];
                        if cursor < samples.len() {
                            let end = (cursor + FRAME_SAMPLES).min(samples.len());
                            mono[..end - cursor].copy_from_slice(&samples[cursor..end]);
                            cursor = end;
                        }
                        on_frame(PcmFrame { mono });
                    }
                }
            }
        });
        self.task = Some((handle, token));
        Ok(())
    }

    async fn end(&mut self) -> Result<(), DeviceError> {
        if let Some((handle, token)) = self.task.take() {
            token.cancel();
            let _ = handle.await;
        }
        self.samples = None;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.task.is_some()
    }
}

// =============================================================================
// Channel capture
// =============================================================================

/// Capture source fed from an in-process channel.
///
/// Whatever is sent through the paired sender while recording is delivered
/// to the frame callback. Frames sent while not recording stay queued.
pub struct ChannelCapture {
    frames: Arc<Mutex<mpsc::UnboundedReceiver<Vec<i16>>>>,
    acquired: bool,
    task: Option<(JoinHandle<()>, CancellationToken)>,
}

impl ChannelCapture {
    /// Create the source and the sender that feeds it.
    pub fn new() -> (Self, mpsc::UnboundedSender<Vec<i16>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                frames: Arc::new(Mutex::new(rx)),
                acquired: false,
                task: None,
            },
            tx,
        )
    }
}

#[async_trait]
impl AudioCaptureSource for ChannelCapture {
    async fn begin(&mut self) -> Result<(), DeviceError> {
        self.acquired = true;
        Ok(())
    }

    async fn record(&mut self, mut on_frame: FrameCallback) -> Result<(), DeviceError> {
        if !self.acquired {
            return Err(DeviceError::NotStarted);
        }
        if self.task.is_some() {
            return Ok(());
        }

        let frames = self.frames.clone();
        let token = CancellationToken::new();
        let child = token.clone();
        let handle = tokio::spawn(async move {
            let mut frames = frames.lock().await;
            loop {
                tokio::select! {
                    _ = child.cancelled() => break,
                    frame = frames.recv() => match frame {
                        Some(mono) => on_frame(PcmFrame { mono }),
                        None => break,
                    },
                }
            }
        });
        self.task = Some((handle, token));
        Ok(())
    }

    async fn end(&mut self) -> Result<(), DeviceError> {
        if let Some((handle, token)) = self.task.take() {
            token.cancel();
            let _ = handle.await;
        }
        self.acquired = false;
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.task.is_some()
    }
}
