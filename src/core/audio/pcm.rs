//! PCM16 conversion, resampling and offline decode.

use std::io::Cursor;

use bytes::Bytes;

use super::DeviceError;

/// Sample rate used for both capture and playback.
pub const SAMPLE_RATE: u32 = 24_000;

/// Samples per 20ms frame at [`SAMPLE_RATE`].
pub const FRAME_SAMPLES: usize = (SAMPLE_RATE as usize) / 50;

/// Encode samples as little-endian bytes.
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

/// Decode little-endian bytes into samples. A trailing odd byte is ignored.
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Linear-interpolation resample of mono PCM16.
pub fn resample(samples: &[i16], source_rate: u32, target_rate: u32) -> Vec<i16> {
    if source_rate == target_rate || samples.is_empty() || source_rate == 0 || target_rate == 0 {
        return samples.to_vec();
    }

    let ratio = source_rate as f64 / target_rate as f64;
    let out_len = ((samples.len() as f64) / ratio).round() as usize;
    let last = samples.len() - 1;

    (0..out_len)
        .map(|i| {
            let pos = i as f64 * ratio;
            let idx = pos.floor() as usize;
            if idx >= last {
                return samples[last];
            }
            let frac = pos - idx as f64;
            let a = samples[idx] as f64;
            let b = samples[idx + 1] as f64;
            (a + (b - a) * frac).round() as i16
        })
        .collect()
}

/// Average interleaved channels down to mono.
pub fn downmix(samples: &[i16], channels: u16) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / frame.len() as i32) as i16
        })
        .collect()
}

/// Decoded audio ready for archival.
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    /// Sample rate of `channel_data` and `wav`
    pub sample_rate: u32,
    /// Mono samples normalized to [-1.0, 1.0)
    pub channel_data: Vec<f32>,
    /// The same audio encoded as a 16-bit mono WAV file
    pub wav: Bytes,
}

impl AudioBuffer {
    /// Length of the buffer in seconds.
    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.channel_data.len() as f64 / self.sample_rate as f64
    }

    /// The samples as PCM16.
    pub fn to_pcm16(&self) -> Vec<i16> {
        self.channel_data
            .iter()
            .map(|&s| (s * 32768.0).clamp(i16::MIN as f32, i16::MAX as f32) as i16)
            .collect()
    }
}

/// Resample `samples` from `source_rate` to `target_rate` and package them
/// as an [`AudioBuffer`].
pub fn decode(
    samples: &[i16],
    source_rate: u32,
    target_rate: u32,
) -> Result<AudioBuffer, DeviceError> {
    let resampled = resample(samples, source_rate, target_rate);

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: target_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::with_capacity(44 + resampled.len() * 2));
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for &sample in &resampled {
            writer.write_sample(sample)?;
        }
        writer.finalize()?;
    }

    Ok(AudioBuffer {
        sample_rate: target_rate,
        channel_data: resampled.iter().map(|&s| s as f32 / 32768.0).collect(),
        wav: Bytes::from(cursor.into_inner()),
    })
}
