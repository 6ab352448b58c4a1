//! Practice session: shared state plus the gesture-driven orchestrator.
//!
//! * [`state`]: the [`SessionSnapshot`] both the session loop and the
//!   surface read, behind an `Arc<Mutex<SessionSnapshot>>`.
//! * [`machine`]: [`PracticeSession`], which turns [`Gesture`]s into
//!   recordings, model queries, and scored verdicts.
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
//! let config = AppConfig::default();
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
//! gestures.send(Gesture::SelectWord("cat".into())).await.unwrap();
//! # }
//! ```

pub mod machine;
pub mod state;

pub use machine::{Gesture, PracticeSession};
pub use state::{
    new_shared_snapshot, Outcome, SessionSnapshot, SessionState, SharedSnapshot,
};
