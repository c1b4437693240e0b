//! Microphone capture boundary.
//!
//! Capture adapters push fixed-length float frames through a channel; the
//! conversation dispatcher converts each frame to transport form and forwards
//! it while the session is open. Frames produced while no session is open are
//! dropped, never buffered.

use async_trait::async_trait;
use tokio::sync::mpsc;

use super::pcm;
use crate::error::Result;

/// A source of microphone audio.
///
/// `start` acquires the device and returns the frame channel; a permission
/// denial surfaces as [`crate::error::FluentifyError::PermissionDenied`] and is
/// fatal to session start. `stop` releases the device and closes the channel.
#[async_trait]
pub trait MicrophoneSource: Send {
    async fn start(&mut self) -> Result<mpsc::Receiver<Vec<f32>>>;
    async fn stop(&mut self);
}

/// One capture frame in transport form: base64 16-bit LE PCM plus mime type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaFrame {
    pub data: String,
    pub mime_type: String,
}

impl MediaFrame {
    /// Convert a raw capture frame for transmission.
    pub fn from_samples(samples: &[f32], sample_rate: u32) -> Self {
        Self {
            data: pcm::encode_frame(samples),
            mime_type: format!("audio/pcm;rate={sample_rate}"),
        }
    }
}
