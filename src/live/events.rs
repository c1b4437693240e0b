//! Live event types.

use serde_json::Value;

/// Events in a live conversation session.
///
/// One server message may carry several fields at once (a transcription
/// fragment alongside an audio chunk, for example), so parsing yields a list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveEvent {
    /// The remote stream is ready to accept input.
    SetupComplete,
    /// Partial transcript of the user's speech.
    InputTranscription { text: String },
    /// Partial transcript of the assistant's speech.
    OutputTranscription { text: String },
    /// Both sides of the current exchange are complete.
    TurnComplete,
    /// Base64 PCM audio response chunk.
    Audio { data: String },
    /// The assistant's turn was cut off, typically by user speech.
    Interrupted,
    Error { message: String },
    Closed,
}

impl LiveEvent {
    /// Parse a server payload into typed live events.
    ///
    /// Fields are inspected in a fixed order: output transcription, input
    /// transcription, turn completion, audio, interruption. Unrecognized
    /// payloads produce no events.
    pub fn from_server_payload(payload: &Value) -> Vec<Self> {
        if payload.get("setupComplete").is_some() {
            return vec![Self::SetupComplete];
        }

        let mut events = Vec::new();
        if let Some(content) = payload.get("serverContent") {
            if let Some(text) = string_at(content, &["outputTranscription", "text"]) {
                events.push(Self::OutputTranscription { text });
            }
            if let Some(text) = string_at(content, &["inputTranscription", "text"]) {
                events.push(Self::InputTranscription { text });
            }
            if bool_field(content, "turnComplete") {
                events.push(Self::TurnComplete);
            }
            if let Some(data) = content
                .get("modelTurn")
                .and_then(|turn| turn.get("parts"))
                .and_then(|parts| parts.get(0))
                .and_then(|part| string_at(part, &["inlineData", "data"]))
            {
                events.push(Self::Audio { data });
            }
            if bool_field(content, "interrupted") {
                events.push(Self::Interrupted);
            }
        }

        if let Some(message) = string_at(payload, &["error", "message"]) {
            events.push(Self::Error { message });
        }

        events
    }
}

fn bool_field(value: &Value, field: &str) -> bool {
    value.get(field).and_then(Value::as_bool).unwrap_or(false)
}

fn string_at(value: &Value, path: &[&str]) -> Option<String> {
    let mut current = value;
    for key in path {
        current = current.get(*key)?;
    }
    current.as_str().map(ToString::to_string)
}
