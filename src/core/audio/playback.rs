//! Streamed playback of agent audio.
//!
//! [`StreamPlayer`] queues PCM16 chunks per track and renders them back to
//! back. It tracks how many samples of each track have been rendered so an
//! interruption can report exactly how much of the current track was heard.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior, interval};
use tokio_util::sync::CancellationToken;

use super::DeviceError;
use super::pcm::{FRAME_SAMPLES, SAMPLE_RATE};

/// Where playback stopped when it was interrupted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackSampleOffset {
    /// Track that was playing
    pub track_id: String,
    /// Samples of that track already rendered
    pub offset: usize,
}

/// An output for streamed agent audio.
#[async_trait]
pub trait AudioPlaybackSink: Send {
    /// Prepare the output device.
    async fn connect(&mut self) -> Result<(), DeviceError>;

    /// Queue `samples` under `track_id`. Tracks play back to back in arrival
    /// order; chunks for an interrupted track are dropped.
    fn add_16bit_pcm(&mut self, samples: &[i16], track_id: &str) -> Result<(), DeviceError>;

    /// Stop playback and clear the queue.
    ///
    /// Returns the track that was playing and how far it got, or `None`
    /// when nothing was queued.
    fn interrupt(&mut self) -> Option<TrackSampleOffset>;

    /// Release the output device. Safe to call repeatedly.
    async fn disconnect(&mut self) -> Result<(), DeviceError>;
}

// =============================================================================
// Outputs
// =============================================================================

/// Destination for rendered samples.
pub trait PcmOutput: Send {
    fn write(&mut self, samples: &[i16]) -> Result<(), DeviceError>;

    fn finish(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Discards rendered audio.
pub struct NullOutput;

impl PcmOutput for NullOutput {
    fn write(&mut self, _samples: &[i16]) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// Writes rendered audio to a 16-bit mono WAV file.
pub struct WavFileOutput {
    writer: Option<hound::WavWriter<BufWriter<File>>>,
}

impl WavFileOutput {
    pub fn create(path: &std::path::Path) -> Result<Self, DeviceError> {
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let writer = hound::WavWriter::create(path, spec)?;
        Ok(Self {
            writer: Some(writer),
        })
    }
}

impl PcmOutput for WavFileOutput {
    fn write(&mut self, samples: &[i16]) -> Result<(), DeviceError> {
        let writer = self.writer.as_mut().ok_or(DeviceError::NotStarted)?;
        for &sample in samples {
            writer.write_sample(sample)?;
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), DeviceError> {
        if let Some(writer) = self.writer.take() {
            writer.finalize()?;
        }
        Ok(())
    }
}

/// Output selected when the player connects.
#[derive(Debug, Clone, Default)]
pub enum PlaybackTarget {
    /// Render in real time and discard
    #[default]
    Null,
    /// Render in real time into a WAV file
    WavFile(PathBuf),
    /// No clock; samples only advance through [`StreamPlayer::render`]
    Manual,
}

// =============================================================================
// Stream player
// =============================================================================

#[derive(Debug)]
struct Chunk {
    track_id: String,
    samples: Vec<i16>,
    position: usize,
}

#[derive(Debug, Default)]
struct PlayerState {
    connected: bool,
    queue: VecDeque<Chunk>,
    rendered: HashMap<String, usize>,
    interrupted: HashSet<String>,
}

/// Track-aware streaming player.
pub struct StreamPlayer {
    target: PlaybackTarget,
    state: Arc<Mutex<PlayerState>>,
    clock: Option<(JoinHandle<()>, CancellationToken)>,
}

impl StreamPlayer {
    pub fn new(target: PlaybackTarget) -> Self {
        Self {
            target,
            state: Arc::new(Mutex::new(PlayerState::default())),
            clock: None,
        }
    }

    /// A player advanced only by explicit [`render`](Self::render) calls.
    pub fn manual() -> Self {
        Self::new(PlaybackTarget::Manual)
    }

    /// Pull up to `out.len()` samples from the queue, zero-filling the rest.
    ///
    /// Returns how many samples of agent audio were written.
    pub fn render(&self, out: &mut [i16]) -> usize {
        render_into(&mut self.state.lock(), out)
    }

    /// Samples queued but not yet rendered.
    pub fn queued_samples(&self) -> usize {
        self.state
            .lock()
            .queue
            .iter()
            .map(|c| c.samples.len() - c.position)
            .sum()
    }

    pub fn is_connected(&self) -> bool {
        self.state.lock().connected
    }

    fn open_output(&self) -> Result<Option<Box<dyn PcmOutput>>, DeviceError> {
        match &self.target {
            PlaybackTarget::Null => Ok(Some(Box::new(NullOutput))),
            PlaybackTarget::WavFile(path) => Ok(Some(Box::new(WavFileOutput::create(path)?))),
            PlaybackTarget::Manual => Ok(None),
        }
    }
}

fn render_into(state: &mut PlayerState, out: &mut [i16]) -> usize {
    let mut written = 0;
    while written < out.len() {
        let Some(chunk) = state.queue.front_mut() else {
            break;
        };
        let take = (chunk.samples.len() - chunk.position).min(out.len() - written);
        out[written..written + take]
            .copy_from_slice(&chunk.samples[chunk.position..chunk.position + take]);
        chunk.position += take;
        written += take;
        *state.rendered.entry(chunk.track_id.clone()).or_default() += take;
        if chunk.position == chunk.samples.len() {
            state.queue.pop_front();
        }
    }
    out[written..].fill(0);
    written
}

/// One tick per rendered frame. A stalled clock resumes at the normal pace
/// instead of catching up, so rendered samples never run ahead of real time.
fn playback_clock() -> Interval {
    let mut clock = interval(Duration::from_millis(20));
    clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
    clock
}

#[async_trait]
impl AudioPlaybackSink for StreamPlayer {
    async fn connect(&mut self) -> Result<(), DeviceError> {
        if self.clock.is_some() {
            return Ok(());
        }
        let output = self.open_output()?;
        *self.state.lock() = PlayerState {
            connected: true,
            ..Default::default()
        };

        if let Some(mut output) = output {
            let state = self.state.clone();
            let token = CancellationToken::new();
            let child = token.clone();
            let handle = tokio::spawn(async move {
                let mut ticker = playback_clock();
                let mut frame = vec![0i16; FRAME_SAMPLES];
                loop {
                    tokio::select! {
                        _ = child.cancelled() => break,
                        _ = ticker.tick() => {
                            render_into(&mut state.lock(), &mut frame);
                            if let Err(e) = output.write(&frame) {
                                tracing::error!("Failed to write playback audio: {}", e);
                                break;
                            }
                        }
                    }
                }
                if let Err(e) = output.finish() {
                    tracing::warn!("Failed to finalize playback output: {}", e);
                }
            });
            self.clock = Some((handle, token));
        }

        tracing::debug!("Playback connected");
        Ok(())
    }

    fn add_16bit_pcm(&mut self, samples: &[i16], track_id: &str) -> Result<(), DeviceError> {
        let mut state = self.state.lock();
        if !state.connected {
            return Err(DeviceError::NotStarted);
        }
        if state.interrupted.contains(track_id) || samples.is_empty() {
            return Ok(());
        }
        state.queue.push_back(Chunk {
            track_id: track_id.to_string(),
            samples: samples.to_vec(),
            position: 0,
        });
        Ok(())
    }

    fn interrupt(&mut self) -> Option<TrackSampleOffset> {
        let mut state = self.state.lock();
        let track_id = state.queue.front()?.track_id.clone();
        let offset = state.rendered.get(&track_id).copied().unwrap_or(0);

        let dropped: Vec<String> = state.queue.drain(..).map(|c| c.track_id).collect();
        state.interrupted.extend(dropped);

        tracing::debug!("Playback interrupted: track={} offset={}", track_id, offset);
        Some(TrackSampleOffset { track_id, offset })
    }

    async fn disconnect(&mut self) -> Result<(), DeviceError> {
        if let Some((handle, token)) = self.clock.take() {
            token.cancel();
            handle
                .await
                .map_err(|e| DeviceError::Unavailable(format!("playback clock failed: {e}")))?;
        }
        *self.state.lock() = PlayerState::default();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn connected_player() -> StreamPlayer {
        let mut player = StreamPlayer::manual();
        player.connect().await.unwrap();
        player
    }

    #[tokio::test]
    async fn test_add_before_connect_fails() {
        let mut player = StreamPlayer::manual();
        assert!(matches!(
            player.add_16bit_pcm(&[1, 2, 3], "item_a"),
            Err(DeviceError::NotStarted)
        ));
    }

    #[tokio::test]
    async fn test_interrupt_when_idle_returns_none() {
        let mut player = connected_player().await;
        assert_eq!(player.interrupt(), None);
        // Idle interrupt must not poison later tracks
        player.add_16bit_pcm(&[1; 10], "item_a").unwrap();
        assert_eq!(player.queued_samples(), 10);
    }

    #[tokio::test]
    async fn test_tracks_play_back_to_back() {
        let mut player = connected_player().await;
        player.add_16bit_pcm(&[1, 1], "a").unwrap();
        player.add_16bit_pcm(&[2, 2, 2], "b").unwrap();

        let mut out = [0i16; 6];
        assert_eq!(player.render(&mut out), 5);
        assert_eq!(out, [1, 1, 2, 2, 2, 0]);
    }

    #[tokio::test]
    async fn test_interrupt_reports_offset_within_track() {
        let mut player = connected_player().await;
        player.add_16bit_pcm(&[7; 100], "item_a").unwrap();
        player.add_16bit_pcm(&[7; 100], "item_a").unwrap();

        let mut out = [0i16; 150];
        player.render(&mut out);

        let stopped = player.interrupt().unwrap();
        assert_eq!(stopped.track_id, "item_a");
        assert_eq!(stopped.offset, 150);
        assert!(stopped.offset <= 200);
        assert_eq!(player.queued_samples(), 0);
    }

    #[tokio::test]
    async fn test_late_chunks_for_interrupted_track_are_dropped() {
        let mut player = connected_player().await;
        player.add_16bit_pcm(&[1; 10], "item_a").unwrap();
        player.interrupt().unwrap();

        player.add_16bit_pcm(&[1; 10], "item_a").unwrap();
        assert_eq!(player.queued_samples(), 0);

        player.add_16bit_pcm(&[1; 10], "item_b").unwrap();
        assert_eq!(player.queued_samples(), 10);
    }

    #[tokio::test]
    async fn test_interrupt_before_any_render_reports_zero() {
        let mut player = connected_player().await;
        player.add_16bit_pcm(&[3; 48], "item_a").unwrap();
        assert_eq!(
            player.interrupt(),
            Some(TrackSampleOffset {
                track_id: "item_a".to_string(),
                offset: 0
            })
        );
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let mut player = connected_player().await;
        player.disconnect().await.unwrap();
        player.disconnect().await.unwrap();
        assert!(!player.is_connected());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_does_not_burst_after_stall() {
        let mut clock = playback_clock();
        clock.tick().await;

        tokio::time::advance(Duration::from_millis(100)).await;
        clock.tick().await;

        let resumed = tokio::time::Instant::now();
        clock.tick().await;
        assert_eq!(resumed.elapsed(), Duration::from_millis(20));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_renders_into_wav_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("out.wav");

        let mut player = StreamPlayer::new(PlaybackTarget::WavFile(path.clone()));
        player.connect().await.unwrap();
        player.add_16bit_pcm(&[500; FRAME_SAMPLES], "item_a").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        player.disconnect().await.unwrap();

        let reader = hound::WavReader::open(&path).unwrap();
        let samples: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        assert!(samples.len() >= FRAME_SAMPLES);
        assert_eq!(samples.iter().filter(|&&s| s == 500).count(), FRAME_SAMPLES);
    }
}
