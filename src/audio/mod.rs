//! Audio capture, playback scheduling, and PCM transport encoding.

pub mod capture;
pub mod pcm;
pub mod playback;

pub use capture::{MediaFrame, MicrophoneSource};
pub use pcm::AudioChunk;
pub use playback::{AudioSink, NullSink, OutputClock, PlaybackScheduler, SinkId, SystemClock};
