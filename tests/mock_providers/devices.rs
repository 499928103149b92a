//! Capture and playback doubles.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

use phone_screen::core::audio::{
    AudioCaptureSource, AudioPlaybackSink, DeviceError, FrameCallback, PcmFrame,
    TrackSampleOffset,
};

/// Counters and captured output shared by both doubles.
#[derive(Debug, Default, Clone)]
pub struct DeviceLog {
    pub capture_begins: u32,
    pub capture_records: u32,
    pub capture_ends: u32,
    pub sink_connects: u32,
    pub sink_disconnects: u32,
    pub sink_interrupts: u32,
    /// Every chunk accepted by the sink, in arrival order
    pub chunks: Vec<(String, Vec<i16>)>,
}

impl DeviceLog {
    /// Samples accepted for `track_id`, concatenated.
    pub fn track_samples(&self, track_id: &str) -> Vec<i16> {
        self.chunks
            .iter()
            .filter(|(id, _)| id == track_id)
            .flat_map(|(_, samples)| samples.iter().copied())
            .collect()
    }
}

#[derive(Default)]
struct Shared {
    log: Mutex<DeviceLog>,
    on_frame: Mutex<Option<FrameCallback>>,
    fail_begin: Mutex<bool>,
    fail_record: Mutex<bool>,
    fail_end: Mutex<bool>,
    fail_connect: Mutex<bool>,
    fail_disconnect: Mutex<bool>,
    /// Samples of the current track the sink claims were heard
    heard: Mutex<usize>,
}

/// Capture double. Frames are pushed by the test with [`MockCapture::push_frame`].
#[derive(Clone, Default)]
pub struct MockCapture {
    shared: Arc<Shared>,
}

/// Playback double that records chunks instead of rendering them.
#[derive(Clone, Default)]
pub struct MockSink {
    shared: Arc<Shared>,
    queued: Arc<Mutex<Vec<(String, usize)>>>,
}

/// A capture and sink pair writing to the same [`DeviceLog`].
pub fn mock_devices() -> (MockCapture, MockSink) {
    let shared = Arc::new(Shared::default());
    (
        MockCapture {
            shared: shared.clone(),
        },
        MockSink {
            shared,
            queued: Arc::default(),
        },
    )
}

impl MockCapture {
    pub fn log(&self) -> DeviceLog {
        self.shared.log.lock().clone()
    }

    /// Deliver a frame as the microphone would. Returns false when not recording.
    pub fn push_frame(&self, mono: Vec<i16>) -> bool {
        match self.shared.on_frame.lock().as_mut() {
            Some(on_frame) => {
                on_frame(PcmFrame { mono });
                true
            }
            None => false,
        }
    }

    pub fn fail_begin(&self) {
        *self.shared.fail_begin.lock() = true;
    }

    pub fn fail_record(&self) {
        *self.shared.fail_record.lock() = true;
    }

    pub fn fail_end(&self) {
        *self.shared.fail_end.lock() = true;
    }
}

impl MockSink {
    pub fn log(&self) -> DeviceLog {
        self.shared.log.lock().clone()
    }

    pub fn fail_connect(&self) {
        *self.shared.fail_connect.lock() = true;
    }

    pub fn fail_disconnect(&self) {
        *self.shared.fail_disconnect.lock() = true;
    }

    /// How many samples of the playing track the next interrupt reports.
    pub fn set_heard(&self, samples: usize) {
        *self.shared.heard.lock() = samples;
    }
}

#[async_trait]
impl AudioCaptureSource for MockCapture {
    async fn begin(&mut self) -> Result<(), DeviceError> {
        if *self.shared.fail_begin.lock() {
            return Err(DeviceError::Unavailable("microphone denied".to_string()));
        }
        self.shared.log.lock().capture_begins += 1;
        Ok(())
    }

    async fn record(&mut self, on_frame: FrameCallback) -> Result<(), DeviceError> {
        if *self.shared.fail_record.lock() {
            return Err(DeviceError::NotStarted);
        }
        self.shared.log.lock().capture_records += 1;
        *self.shared.on_frame.lock() = Some(on_frame);
        Ok(())
    }

    async fn end(&mut self) -> Result<(), DeviceError> {
        self.shared.log.lock().capture_ends += 1;
        *self.shared.on_frame.lock() = None;
        if *self.shared.fail_end.lock() {
            return Err(DeviceError::Unavailable("device vanished".to_string()));
        }
        Ok(())
    }

    fn is_recording(&self) -> bool {
        self.shared.on_frame.lock().is_some()
    }
}

#[async_trait]
impl AudioPlaybackSink for MockSink {
    async fn connect(&mut self) -> Result<(), DeviceError> {
        if *self.shared.fail_connect.lock() {
            return Err(DeviceError::Unavailable("no output device".to_string()));
        }
        self.shared.log.lock().sink_connects += 1;
        Ok(())
    }

    fn add_16bit_pcm(&mut self, samples: &[i16], track_id: &str) -> Result<(), DeviceError> {
        self.shared
            .log
            .lock()
            .chunks
            .push((track_id.to_string(), samples.to_vec()));

        let mut queued = self.queued.lock();
        let same_track = queued.last().is_some_and(|(id, _)| id == track_id);
        if same_track && let Some((_, len)) = queued.last_mut() {
            *len += samples.len();
        } else {
            queued.push((track_id.to_string(), samples.len()));
        }
        Ok(())
    }

    fn interrupt(&mut self) -> Option<TrackSampleOffset> {
        self.shared.log.lock().sink_interrupts += 1;
        let mut queued = self.queued.lock();
        let (track_id, len) = queued.first().cloned()?;
        queued.clear();
        let offset = (*self.shared.heard.lock()).min(len);
        Some(TrackSampleOffset { track_id, offset })
    }

    async fn disconnect(&mut self) -> Result<(), DeviceError> {
        self.shared.log.lock().sink_disconnects += 1;
        self.queued.lock().clear();
        if *self.shared.fail_disconnect.lock() {
            return Err(DeviceError::Unavailable("output busy".to_string()));
        }
        Ok(())
    }
}
