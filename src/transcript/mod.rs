//! Streamed transcript aggregation.
//!
//! The live endpoint streams partial transcription fragments for both sides of
//! the conversation and signals when a turn is complete. Fragments accumulate
//! per speaker in arrival order; a completion signal commits each non-empty
//! buffer as an immutable turn, user first.

/// Who produced a transcript turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Speaker {
    User,
    Assistant,
}

/// One completed utterance. Immutable once committed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptTurn {
    pub speaker: Speaker,
    pub text: String,
}

/// Accumulates partial fragments until the remote endpoint signals turn
/// completion.
#[derive(Debug, Default)]
pub struct TranscriptAggregator {
    pending_user: String,
    pending_assistant: String,
}

impl TranscriptAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a fragment of the user's utterance, verbatim.
    pub fn push_user(&mut self, fragment: &str) {
        self.pending_user.push_str(fragment);
    }

    /// Append a fragment of the assistant's utterance, verbatim.
    pub fn push_assistant(&mut self, fragment: &str) {
        self.pending_assistant.push_str(fragment);
    }

    /// Commit the pending buffers as turns and clear them.
    ///
    /// Buffers are trimmed of surrounding whitespace; a buffer that trims to
    /// empty produces no turn. Order is user then assistant.
    pub fn complete_turn(&mut self) -> Vec<TranscriptTurn> {
        let mut turns = Vec::new();

        let user = self.pending_user.trim();
        if !user.is_empty() {
            turns.push(TranscriptTurn {
                speaker: Speaker::User,
                text: user.to_string(),
            });
        }

        let assistant = self.pending_assistant.trim();
        if !assistant.is_empty() {
            turns.push(TranscriptTurn {
                speaker: Speaker::Assistant,
                text: assistant.to_string(),
            });
        }

        self.clear();
        turns
    }

    /// Drop any pending fragments without committing them.
    pub fn clear(&mut self) {
        self.pending_user.clear();
        self.pending_assistant.clear();
    }
}
