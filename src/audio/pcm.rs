//! PCM sample conversion and transport encoding.
//!
//! The live endpoint speaks 16-bit little-endian mono PCM, base64-encoded per
//! frame. Capture hands us floating-point samples in [-1, 1]; responses arrive
//! as base64 payloads at the output rate.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use crate::error::{FluentifyError, Result};

/// A decoded, playable audio buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioChunk {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
}

impl AudioChunk {
    /// Playback duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

/// Convert one float sample to signed 16-bit, clipping out-of-range input to
/// the boundary instead of wrapping.
///
/// Negative samples scale by 0x8000 and positive by 0x7FFF so that both -1.0
/// and 1.0 map exactly onto the integer range.
pub fn f32_to_i16(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    if clamped < 0.0 {
        (clamped * 32768.0) as i16
    } else {
        (clamped * 32767.0) as i16
    }
}

/// Encode a capture frame as base64 16-bit LE PCM.
pub fn encode_frame(samples: &[f32]) -> String {
    let bytes: Vec<u8> = samples
        .iter()
        .flat_map(|s| f32_to_i16(*s).to_le_bytes())
        .collect();
    STANDARD.encode(bytes)
}

/// Decode a base64 PCM payload into a playable chunk.
///
/// Malformed payloads are decode errors: the caller drops the chunk and the
/// session keeps running.
pub fn decode_chunk(data: &str, sample_rate: u32) -> Result<AudioChunk> {
    let bytes = STANDARD
        .decode(data)
        .map_err(|error| FluentifyError::Decode(format!("invalid base64 audio: {error}")))?;
    if bytes.is_empty() {
        return Err(FluentifyError::Decode("empty audio payload".into()));
    }
    if bytes.len() % 2 != 0 {
        return Err(FluentifyError::Decode(format!(
            "truncated PCM payload: {} bytes",
            bytes.len()
        )));
    }

    let samples = bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();

    Ok(AudioChunk {
        samples,
        sample_rate,
    })
}
