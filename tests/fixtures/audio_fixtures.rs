//! Audio Test Fixtures
//!
//! Generated audio keeps inputs reproducible and avoids fixture files.
//!
//! Audio format matches the realtime session:
//! - Sample rate: 24kHz
//! - Bit depth: 16-bit signed PCM, little-endian on the wire
//! - Channels: Mono

use std::f32::consts::PI;

/// Session sample rate (24kHz)
pub const SAMPLE_RATE: u32 = 24000;

/// Duration constants (in samples at 24kHz)
pub const MS_20: usize = 480; // one capture frame
pub const MS_100: usize = 2400;
pub const SECOND: usize = 24000;

/// Generate silence (zeros)
pub fn generate_silence(duration_samples: usize) -> Vec<i16> {
    vec![0i16; duration_samples]
}

/// Generate a sine tone with amplitude in 0.0 - 1.0
pub fn generate_sine_wave(frequency: f32, duration_samples: usize, amplitude: f32) -> Vec<i16> {
    let peak = amplitude * i16::MAX as f32;
    (0..duration_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            (peak * (2.0 * PI * frequency * t).sin()) as i16
        })
        .collect()
}

/// A ramp whose every sample is distinct, so reordering is detectable.
pub fn generate_ramp(start: i16, duration_samples: usize) -> Vec<i16> {
    (0..duration_samples)
        .map(|i| start.wrapping_add(i as i16))
        .collect()
}

/// Convert i16 samples to little-endian bytes
pub fn samples_to_bytes(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

/// Convert little-endian bytes back to i16 samples
pub fn bytes_to_samples(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

