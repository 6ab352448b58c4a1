//! Model module: definition lookups and pronunciation scoring.
//!
//! This module provides:
//! * [`ModelBackend`] / [`ModelChat`]: async traits implemented by all
//!   model providers; a chat is one multi-turn session.
//! * [`GeminiBackend`]: Google Gemini REST provider (default backend).
//! * [`ScoringClient`]: word-scoped session management plus the
//!   definition and two-turn scoring flows.
//! * [`DefinitionRecord`] / [`PartOfSpeech`]: the word card.
//! * [`PronunciationScore`]: outcome of scoring one recorded attempt.
//! * [`ResponseSchema`]: structured-output schemas sent with each query.
//! * [`ModelReply`]: lenient parsing of model replies (fences, prose).
//! * [`ModelError`]: error variants for model operations.
//!
//! # Quick start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use phonaify::config::AppConfig;
//! use phonaify::model::{GeminiBackend, ScoringClient};
//!
//! #[tokio::main]
//! async fn main() {
//!     let config = AppConfig::default();
//!     let backend = Arc::new(GeminiBackend::from_config(&config.model));
//!     let mut client = ScoringClient::new(backend, config.scoring.clone());
//!
//!     let card = client.fetch_definition("destruction").await.unwrap();
//!     println!("{} {}", card.phonetic, card.definition);
//! }
//! ```

pub mod backend;
pub mod client;
pub mod definition;
pub mod gemini;
pub mod prompt;
pub mod reply;
pub mod schema;

// ---------------------------------------------------------------------------
// Public re-exports
// ---------------------------------------------------------------------------

pub use backend::{ModelBackend, ModelChat, ModelError, PromptRequest};
pub use client::{ModelSession, PronunciationScore, ScoringClient, UNCLEAR_TRANSCRIPTION};
pub use definition::{DefinitionRecord, PartOfSpeech, PART_OF_SPEECH_TAGS};
pub use gemini::GeminiBackend;
pub use reply::ModelReply;
pub use schema::{FieldKind, ResponseSchema};

// test-only re-export so the session test module can script model replies
// without `use phonaify::model::backend::MockBackend`.
#[cfg(test)]
pub use backend::{MockBackend, RecordedPrompt};
