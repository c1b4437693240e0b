//! Fluentify — realtime voice tutoring engine.
//!
//! Core of a language-learning application: the user holds a live spoken
//! conversation with a generative-AI tutor (audio in, audio out, streamed
//! transcripts), and one-shot calls cover grammar feedback, grounded cultural
//! Q&A, chat tutoring, and phrase pronunciation.
//!
//! # Quick Start
//!
//! ```no_run
//! use fluentify::prelude::*;
//! use fluentify::audio::{NullSink, SystemClock};
//!
//! # async fn example(microphone: Box<dyn fluentify::audio::MicrophoneSource>) -> fluentify::error::Result<()> {
//! let config = LiveConfig::default().with_mode(TutorMode::Conversation, Language::Id);
//! let mut conversation = Conversation::new(
//!     config,
//!     microphone,
//!     Box::new(SystemClock::new()),
//!     Box::new(NullSink::new()),
//! );
//! conversation.start().await?;
//! while let Some(update) = conversation.next_update().await {
//!     println!("{update:?}");
//! }
//! # Ok(())
//! # }
//! ```

pub mod audio;
pub mod coach;
pub mod config;
pub mod conversation;
pub mod error;
pub mod live;
pub mod prelude;
pub mod transcript;

pub use error::{FluentifyError, Result};
