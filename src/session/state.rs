//! Practice-session state machine and shared snapshot.
//!
//! [`SessionState`] drives the practice loop.  The surface reads it via
//! [`SharedSnapshot`] to render the card, the countdown and the verdict.
//!
//! [`SessionSnapshot`] is the single source of truth for everything the
//! surface needs: the selected word, its card, the current phase, the
//! per-symbol alignment of the last attempt, feedback and any error.
//!
//! [`SharedSnapshot`] is a type alias for `Arc<Mutex<SessionSnapshot>>`,
//! cheap to clone and safe to share across tasks.

use std::sync::{Arc, Mutex};

use crate::align::AlignmentResult;
use crate::model::DefinitionRecord;

// ---------------------------------------------------------------------------
// Outcome / SessionState
// ---------------------------------------------------------------------------

/// Verdict on one scored attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Correct,
    Incorrect,
}

/// States of one practice session.
///
/// The state machine transitions are:
///
/// ```text
/// (any) ──word selected──▶ Idle          card loads in the background
/// Idle / Scored ──start──▶ Listening
/// Listening ──stop────────▶ Analyzing
/// Listening ──time limit──▶ Analyzing
/// Listening ──too short───▶ Idle         error carried in the snapshot
/// Analyzing ──score done──▶ Scored(Correct | Incorrect)
/// Analyzing ──score fail──▶ Idle         error carried in the snapshot
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// A word may be selected; nothing is being recorded or scored.
    Idle,

    /// Microphone is live; the countdown ticks in `elapsed_ms`.
    Listening,

    /// A clip has been captured; the model is transcribing and judging it.
    Analyzing,

    /// The last attempt has been judged.
    Scored(Outcome),
}

impl SessionState {
    /// Returns `true` while an attempt is in flight.
    ///
    /// The surface uses this to grey out the record button.
    ///
    /// ```
    /// use phonaify::session::{Outcome, SessionState};
    ///
    /// assert!(!SessionState::Idle.is_busy());
    /// assert!(SessionState::Listening.is_busy());
    /// assert!(SessionState::Analyzing.is_busy());
    /// assert!(!SessionState::Scored(Outcome::Correct).is_busy());
    /// ```
    pub fn is_busy(&self) -> bool {
        matches!(self, SessionState::Listening | SessionState::Analyzing)
    }

    /// A short human-readable label suitable for the status line.
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Idle => "Ready",
            SessionState::Listening => "Listening…",
            SessionState::Analyzing => "Analyzing…",
            SessionState::Scored(Outcome::Correct) => "Correct!",
            SessionState::Scored(Outcome::Incorrect) => "Try again",
        }
    }
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState::Idle
    }
}

// ---------------------------------------------------------------------------
// SessionSnapshot
// ---------------------------------------------------------------------------

/// Shared session state, the single source of truth for the surface.
///
/// Held behind [`SharedSnapshot`].  The session loop mutates it; the
/// surface reads it whenever it wants to redraw.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    /// The word being practised.  Empty until a word is selected.
    pub target_word: String,

    /// Reference IPA from the card, as the scoring target.
    ///
    /// Empty until the card arrives.
    pub target_phonetic: String,

    /// Current phase of the practice loop.
    pub state: SessionState,

    /// Milliseconds recorded so far.  Ticks while `Listening`, then holds
    /// the final clip length.
    pub elapsed_ms: u64,

    /// Bumped on every word selection.  Replies tagged with an older
    /// generation are stale and must be dropped.
    pub generation: u64,

    /// The word card, once the definition query completes.
    pub definition: Option<DefinitionRecord>,

    /// What the model heard (IPA) in the last scored attempt.
    pub heard: Option<String>,

    /// Per-symbol alignment of the last scored attempt.
    pub alignment: Option<AlignmentResult>,

    /// Coaching feedback for the last scored attempt.
    pub feedback: Option<String>,

    /// Message for the last failure, cleared on the next gesture.
    pub error: Option<String>,
}

impl SessionSnapshot {
    /// An empty snapshot: no word, `Idle`, generation zero.
    pub fn new() -> Self {
        Self {
            target_word: String::new(),
            target_phonetic: String::new(),
            state: SessionState::Idle,
            elapsed_ms: 0,
            generation: 0,
            definition: None,
            heard: None,
            alignment: None,
            feedback: None,
            error: None,
        }
    }

    /// Begin practising `word`: clear every per-word field and start a new
    /// generation.  In-flight replies from the previous word keep the old
    /// generation and will be dropped on arrival.
    pub fn reset_for(&mut self, word: &str) {
        self.target_word = word.to_string();
        self.target_phonetic.clear();
        self.state = SessionState::Idle;
        self.elapsed_ms = 0;
        self.generation += 1;
        self.definition = None;
        self.heard = None;
        self.alignment = None;
        self.feedback = None;
        self.error = None;
    }
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// SharedSnapshot
// ---------------------------------------------------------------------------

/// Thread-safe handle to [`SessionSnapshot`].
///
/// Cheap to clone (`Arc` clone).  Lock with `.lock().unwrap()` for a short
/// critical section; do **not** hold the lock across `.await` points.
pub type SharedSnapshot = Arc<Mutex<SessionSnapshot>>;

/// Construct a new [`SharedSnapshot`] wrapping an empty snapshot.
pub fn new_shared_snapshot() -> SharedSnapshot {
    Arc::new(Mutex::new(SessionSnapshot::new()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
