//! One-shot tutoring calls: grammar feedback, grounded cultural Q&A, the chat
//! tutor, and phrase pronunciation synthesis.
//!
//! These are plain request/response flows against the generateContent REST
//! endpoint; all streaming and session state lives in [`crate::conversation`].

use serde_json::{json, Value};
use tracing::debug;

use crate::audio::pcm::{self, AudioChunk};
use crate::config::{resolve_api_key, Language, DEFAULT_REST_URL};
use crate::error::{FluentifyError, Result};

const GRAMMAR_MODEL: &str = "gemini-2.5-pro";
const CHAT_MODEL: &str = "gemini-2.5-flash";
const TTS_MODEL: &str = "gemini-2.5-flash-preview-tts";
const TTS_VOICE: &str = "Kore";
const TTS_SAMPLE_RATE: u32 = 24_000;

/// A web source backing a grounded answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceLink {
    pub title: String,
    pub uri: String,
}

/// Answer to a grounded question, with the sources the model consulted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundedAnswer {
    pub text: String,
    pub sources: Vec<SourceLink>,
}

/// Client for the one-shot generateContent endpoints.
#[derive(Clone)]
pub struct CoachClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl CoachClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_REST_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
        }
    }

    /// Build a client from `GEMINI_API_KEY`/`GOOGLE_API_KEY`.
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(resolve_api_key(None)?))
    }

    /// Grammar and style feedback on a learner-written text.
    pub async fn grammar_feedback(&self, text: &str) -> Result<String> {
        let prompt = format!(
            "You are an expert English grammar and style coach. Analyze the following \
             text and provide constructive feedback. Focus on clarity, tone, grammar, \
             and suggest improvements to make it sound more natural for everyday \
             conversation. Format your response clearly. Text to analyze: \"{text}\""
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });
        let response = self.generate(GRAMMAR_MODEL, &body).await?;
        first_candidate_text(&response)
    }

    /// Answer a cultural question grounded in web search, in the learner's
    /// language, with the consulted sources.
    pub async fn grounded_answer(
        &self,
        question: &str,
        language: Language,
    ) -> Result<GroundedAnswer> {
        let instruction = match language {
            Language::Id => "Jawab pertanyaan berikut dalam Bahasa Indonesia",
            Language::En => "Answer the following question in English",
        };
        let prompt = format!(
            "{instruction} dan format jawabannya sebagai markdown (gunakan **bold** dan \
             *italic* jika perlu): \"{question}\""
        );
        let body = json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }],
            "tools": [{ "googleSearch": {} }]
        });
        let response = self.generate(CHAT_MODEL, &body).await?;
        Ok(GroundedAnswer {
            text: first_candidate_text(&response)?,
            sources: grounding_sources(&response),
        })
    }

    /// Synthesize pronunciation audio for a phrase or vocabulary entry.
    pub async fn synthesize_speech(&self, text: &str) -> Result<AudioChunk> {
        let body = json!({
            "contents": [{ "parts": [{ "text": text }] }],
            "generationConfig": {
                "responseModalities": ["AUDIO"],
                "speechConfig": {
                    "voiceConfig": { "prebuiltVoiceConfig": { "voiceName": TTS_VOICE } }
                }
            }
        });
        let response = self.generate(TTS_MODEL, &body).await?;
        let data = response
            .pointer("/candidates/0/content/parts/0/inlineData/data")
            .and_then(Value::as_str)
            .ok_or_else(|| FluentifyError::api(200, "No audio in TTS response"))?;
        pcm::decode_chunk(data, TTS_SAMPLE_RATE)
    }

    async fn generate(&self, model: &str, body: &Value) -> Result<Value> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, model, self.api_key
        );

        debug!(model, "coach generateContent");

        let response = self.http.post(&url).json(body).send().await?;
        let status = response.status().as_u16();
        if status != 200 {
            let message = response.text().await.unwrap_or_default();
            if matches!(status, 401 | 403) {
                return Err(FluentifyError::Authentication(message));
            }
            return Err(FluentifyError::api(status, message));
        }
        Ok(response.json().await?)
    }
}

/// The chat tutor: a multi-turn text conversation with local history.
pub struct ChatSession {
    client: CoachClient,
    system_instruction: &'static str,
    history: Vec<Value>,
}

impl ChatSession {
    pub fn new(client: CoachClient, language: Language) -> Self {
        let system_instruction = match language {
            Language::Id => {
                "Anda adalah tutor bahasa Inggris yang ramah dan membantu. Jaga agar \
                 jawaban Anda ringkas dan mudah dipahami oleh pembelajar bahasa. Gunakan \
                 format Markdown (seperti **tebal** untuk istilah penting, *miring* untuk \
                 penekanan, dan daftar berpoin untuk contoh) untuk membuat penjelasan \
                 Anda jelas dan mudah dibaca."
            }
            Language::En => {
                "You are a friendly and helpful English language tutor. Keep your answers \
                 concise and easy for a language learner to understand. Use Markdown \
                 formatting (like **bold** for key terms, *italics* for emphasis, and \
                 bulleted lists for examples) to make your explanations clear and \
                 readable."
            }
        };
        Self {
            client,
            system_instruction,
            history: Vec::new(),
        }
    }

    /// Send one learner message and return the tutor's reply. Both are kept in
    /// the local history for subsequent turns.
    pub async fn send(&mut self, text: &str) -> Result<String> {
        self.history
            .push(json!({ "role": "user", "parts": [{ "text": text }] }));

        let body = json!({
            "contents": self.history,
            "systemInstruction": { "parts": [{ "text": self.system_instruction }] }
        });
        let response = self.client.generate(CHAT_MODEL, &body).await?;
        let reply = first_candidate_text(&response)?;

        self.history
            .push(json!({ "role": "model", "parts": [{ "text": reply }] }));
        Ok(reply)
    }
}

fn first_candidate_text(response: &Value) -> Result<String> {
    let parts = response
        .pointer("/candidates/0/content/parts")
        .and_then(Value::as_array)
        .ok_or_else(|| FluentifyError::api(200, "No candidates in response"))?;

    let text: String = parts
        .iter()
        .filter_map(|part| part.get("text").and_then(Value::as_str))
        .collect();
    if text.is_empty() {
        return Err(FluentifyError::api(200, "Response contained no text"));
    }
    Ok(text)
}

fn grounding_sources(response: &Value) -> Vec<SourceLink> {
    response
        .pointer("/candidates/0/groundingMetadata/groundingChunks")
        .and_then(Value::as_array)
        .map(|chunks| {
            chunks
                .iter()
                .filter_map(|chunk| {
                    let web = chunk.get("web")?;
                    Some(SourceLink {
                        title: web.get("title")?.as_str()?.to_string(),
                        uri: web.get("uri")?.as_str()?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}
