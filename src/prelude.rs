//! Convenience re-exports for common use.

pub use crate::audio::{AudioChunk, AudioSink, MediaFrame, MicrophoneSource, OutputClock};
pub use crate::coach::{ChatSession, CoachClient, GroundedAnswer};
pub use crate::config::{Language, LiveConfig, Preferences, TutorMode};
pub use crate::conversation::{Conversation, ConversationUpdate};
pub use crate::error::{FluentifyError, Result};
pub use crate::live::{LiveEvent, LiveSession, Phase};
pub use crate::transcript::{Speaker, TranscriptTurn};
