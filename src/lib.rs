//! Phonaify: pronunciation practice for single words.
//!
//! Select a word, read its card, hear it spoken, record an attempt, and get
//! a per-symbol verdict on how close the attempt came to the reference IPA.
//!
//! # Pipeline
//!
//! ```text
//! Gesture ──▶ PracticeSession ──▶ RecordingController ──▶ AudioPayload
//!                   │                                          │
//!                   ▼                                          ▼
//!            SessionSnapshot ◀── align(reference, heard) ◀── ScoringClient
//! ```
//!
//! The host UI owns a [`session::SharedSnapshot`], feeds
//! [`session::Gesture`]s into [`session::PracticeSession::run`], and renders
//! whatever the snapshot says.  Capture bounds, model sessions, and
//! stale-reply handling all live inside the crate.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use phonaify::audio::CpalDevice;
//! use phonaify::config::AppConfig;
//! use phonaify::model::{GeminiBackend, ScoringClient};
//! use phonaify::session::{new_shared_snapshot, Gesture, PracticeSession};
//! use phonaify::speech::SystemSpeech;
//!
//! # async fn demo() {
//! let config = AppConfig::load().unwrap_or_default();
//! let snapshot = new_shared_snapshot();
//! let client = ScoringClient::new(
//!     Arc::new(GeminiBackend::from_config(&config.model)),
//!     config.scoring.clone(),
//! );
//! let session = PracticeSession::new(
//!     &config,
//!     Arc::clone(&snapshot),
//!     client,
//!     Arc::new(CpalDevice::new()),
//!     Arc::new(SystemSpeech::new()),
//! );
//!
//! let (gestures, gesture_rx) = tokio::sync::mpsc::channel(16);
//! tokio::spawn(session.run(gesture_rx));
//!
//! gestures.send(Gesture::SelectWord("cat".into())).await.unwrap();
//! gestures.send(Gesture::Start).await.unwrap();
//! // ... learner speaks ...
//! gestures.send(Gesture::Stop).await.unwrap();
//! # }
//! ```

pub mod align;
pub mod audio;
pub mod config;
pub mod model;
pub mod session;
pub mod speech;
