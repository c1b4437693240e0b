//! Configuration: live session settings, tutor prompts, and the persisted
//! language preference.

use std::env;
use std::path::PathBuf;

use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::{FluentifyError, Result};

/// Default live endpoint (Gemini bidirectional streaming).
pub const DEFAULT_LIVE_URL: &str = "wss://generativelanguage.googleapis.com/ws/google.ai.generativelanguage.v1alpha.GenerativeService.BidiGenerateContent";

/// Default REST endpoint for one-shot generateContent calls.
pub const DEFAULT_REST_URL: &str = "https://generativelanguage.googleapis.com";

/// Interface language of the learner. The app teaches English; explanations
/// come in either Indonesian or English.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Id,
    En,
}

impl Default for Language {
    fn default() -> Self {
        Self::Id
    }
}

/// Which live practice mode the session runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TutorMode {
    Conversation,
    WordPractice,
}

impl TutorMode {
    /// System instruction for the live tutor, in the learner's language.
    pub fn system_instruction(&self, language: Language) -> &'static str {
        match (self, language) {
            (Self::WordPractice, Language::Id) => {
                "Anda adalah seorang pelatih pengucapan bahasa Inggris. Fokus pada \
                 pengucapan, intonasi, dan penggunaan kata yang benar oleh pengguna. \
                 Berikan koreksi yang jelas dan ringkas. Minta pengguna untuk mengulangi \
                 kata atau frasa jika mereka salah mengucapkannya. Jaga agar giliran \
                 bicara Anda singkat dan fokus pada latihan kata."
            }
            (Self::WordPractice, Language::En) => {
                "You are an English pronunciation coach. Focus on the user's \
                 pronunciation, intonation, and correct word usage. Provide clear and \
                 concise corrections. Ask the user to repeat words or phrases if they \
                 mispronounce them. Keep your turns short and focused on word practice."
            }
            (Self::Conversation, Language::Id) => {
                "Peran Anda adalah sebagai tutor bahasa Inggris yang sangat ramah, sabar, \
                 dan interaktif dari Indonesia. Gunakan Bahasa Indonesia SEPENUHNYA untuk \
                 semua interaksi Anda: sapaan, penjelasan, umpan balik, dan koreksi. Tugas \
                 Anda adalah memandu pengguna dalam percakapan bahasa Inggris. Alur \
                 kerjanya seperti ini: 1. Sapa pengguna dengan hangat dalam Bahasa \
                 Indonesia. 2. Ajukan pertanyaan pembuka yang mudah dalam bahasa Inggris. \
                 3. Dengarkan jawaban pengguna. 4. Berikan umpan balik yang positif dan \
                 membangun dalam Bahasa Indonesia. Jika ada kesalahan, berikan koreksi \
                 dengan lembut. 5. Ajukan pertanyaan lanjutan dalam bahasa Inggris untuk \
                 menjaga agar percakapan tetap mengalir. Buat suasana belajar menjadi \
                 santai dan menyenangkan."
            }
            (Self::Conversation, Language::En) => {
                "Your role is a very friendly, patient, and interactive English tutor. \
                 Use English ONLY for all your interactions: greetings, explanations, \
                 feedback, and corrections. Your task is to guide the user in an English \
                 conversation. The workflow is as follows: 1. Greet the user warmly. \
                 2. Ask an easy opening question in English. 3. Listen to the user's \
                 response. 4. Provide positive and constructive feedback. If there are \
                 mistakes, correct them gently. 5. Ask a follow-up question to keep the \
                 conversation flowing. Make the learning atmosphere relaxed and fun."
            }
        }
    }
}

/// Settings for one live conversation session.
#[derive(Debug, Clone)]
pub struct LiveConfig {
    pub model: String,
    pub base_url: String,
    /// Explicit API key; falls back to the environment when unset.
    pub api_key: Option<String>,
    pub voice: String,
    pub system_instruction: String,
    /// Microphone capture rate (Hz); frames go out as 16-bit LE PCM at this rate.
    pub input_sample_rate: u32,
    /// Rate of inbound audio response chunks (Hz).
    pub output_sample_rate: u32,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            model: "models/gemini-2.5-flash-native-audio-preview-09-2025".to_string(),
            base_url: DEFAULT_LIVE_URL.to_string(),
            api_key: None,
            voice: "Zephyr".to_string(),
            system_instruction: TutorMode::Conversation
                .system_instruction(Language::default())
                .to_string(),
            input_sample_rate: 16_000,
            output_sample_rate: 24_000,
        }
    }
}

impl LiveConfig {
    /// Configure the tutor prompt for a mode and learner language.
    pub fn with_mode(mut self, mode: TutorMode, language: Language) -> Self {
        self.system_instruction = mode.system_instruction(language).to_string();
        self
    }
}

/// Resolve the API key: explicit value first, then `GEMINI_API_KEY`, then
/// `GOOGLE_API_KEY`.
pub fn resolve_api_key(explicit: Option<&str>) -> Result<String> {
    let _ = dotenvy::dotenv();
    explicit
        .map(ToString::to_string)
        .or_else(|| env::var("GEMINI_API_KEY").ok())
        .or_else(|| env::var("GOOGLE_API_KEY").ok())
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| FluentifyError::Authentication("Missing GEMINI_API_KEY".into()))
}

/// Persisted user preferences. Incidental configuration, not session state.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub language: Language,
}

impl Preferences {
    /// Load preferences from the platform config dir; a missing file yields
    /// defaults.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_path()?)
    }

    /// Persist preferences, creating the config dir if needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::default_path()?)
    }

    pub fn load_from(path: &PathBuf) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path)?;
        toml::from_str(&raw).map_err(|error| {
            FluentifyError::Configuration(format!("invalid preferences file: {error}"))
        })
    }

    pub fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self).map_err(|error| {
            FluentifyError::Configuration(format!("failed to serialize preferences: {error}"))
        })?;
        std::fs::write(path, raw)?;
        Ok(())
    }

    fn default_path() -> Result<PathBuf> {
        let dirs = ProjectDirs::from("", "", "fluentify").ok_or_else(|| {
            FluentifyError::Configuration("could not determine config directory".into())
        })?;
        Ok(dirs.config_dir().join("preferences.toml"))
    }
}
