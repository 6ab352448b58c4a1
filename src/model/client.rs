//! High-level definition and scoring flows over a [`ModelBackend`].
//!
//! # Session lifecycle
//!
//! [`ScoringClient`] keeps at most one [`ModelSession`], scoped to a single
//! word.  The session is created lazily on the first query for a word,
//! reused for every later query on the same word (the scoring turns rely on
//! shared history), and destroyed when:
//!
//! * the word changes (stale context must not leak into the next word),
//! * a send fails (the next attempt starts from a clean session),
//! * the owner calls [`reset`] at teardown.
//!
//! # Scoring
//!
//! Scoring is two turns in one session.  Turn one attaches the recorded
//! clip and asks for an IPA transcription of what was actually said.  Turn
//! two judges that transcription against the reference, either as a 0–100
//! similarity ([`ScoringMode::Similarity`], pass at the configured
//! threshold) or as a model-decided verdict with coaching feedback
//! ([`ScoringMode::Verdict`]).  Unparseable replies degrade: a raw
//! transcription is still a transcription, an unusable judgement becomes a
//! conservative "not matched" rather than a silent pass.
//!
//! [`reset`]: ScoringClient::reset

use std::sync::{Arc, OnceLock};

use regex::Regex;
use serde::Deserialize;

use crate::audio::AudioPayload;
use crate::config::{ScoringConfig, ScoringMode};
use crate::model::backend::{ModelBackend, ModelChat, ModelError, PromptRequest};
use crate::model::definition::DefinitionRecord;
use crate::model::prompt;
use crate::model::reply::{self, ModelReply};
use crate::model::schema::ResponseSchema;

/// Shown in place of a transcription the model could not produce.
pub const UNCLEAR_TRANSCRIPTION: &str = "(unclear)";

// ---------------------------------------------------------------------------
// ModelSession / PronunciationScore
// ---------------------------------------------------------------------------

/// One live chat session, scoped to the word it was opened for.
pub struct ModelSession {
    chat: Box<dyn ModelChat>,
    word: String,
}

impl ModelSession {
    /// The word this session is scoped to.
    pub fn word(&self) -> &str {
        &self.word
    }
}

/// Outcome of scoring one recorded attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct PronunciationScore {
    /// What the model heard, as IPA (or [`UNCLEAR_TRANSCRIPTION`]).
    pub user_phonetic: String,
    /// Whether the attempt counts as a correct pronunciation.
    pub matched: bool,
    /// One line of coaching feedback.
    pub feedback: String,
}

// ---------------------------------------------------------------------------
// Reply shapes
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TranscriptionWire {
    #[serde(default)]
    phonetic: String,
}

#[derive(Debug, Deserialize)]
struct SimilarityWire {
    #[serde(alias = "score")]
    similarity: f64,
}

#[derive(Debug, Deserialize)]
struct VerdictWire {
    #[serde(rename = "match")]
    matched: bool,
    #[serde(default)]
    feedback: String,
}

// ---------------------------------------------------------------------------
// ScoringClient
// ---------------------------------------------------------------------------

/// Definition lookups and pronunciation scoring for one practice surface.
pub struct ScoringClient {
    backend: Arc<dyn ModelBackend>,
    scoring: ScoringConfig,
    session: Option<ModelSession>,
}

impl ScoringClient {
    pub fn new(backend: Arc<dyn ModelBackend>, scoring: ScoringConfig) -> Self {
        Self {
            backend,
            scoring,
            session: None,
        }
    }

    /// `true` while a session is alive.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// The word the live session is scoped to, if any.
    pub fn session_word(&self) -> Option<&str> {
        self.session.as_ref().map(ModelSession::word)
    }

    /// Destroy the live session, if any.  Called at teardown and whenever
    /// the practice surface goes away.
    pub fn reset(&mut self) {
        if self.session.take().is_some() {
            log::debug!("model: session destroyed");
        }
    }

    /// Look up the word card for `word`.
    ///
    /// A structured reply becomes a full card; an unstructured one becomes
    /// a definition-only card carrying the raw text.  Only transport and
    /// session failures are errors.
    pub async fn fetch_definition(&mut self, word: &str) -> Result<DefinitionRecord, ModelError> {
        log::info!("model: fetching definition for \"{word}\"");
        let request = PromptRequest::text(prompt::definition_query(word))
            .with_schema(ResponseSchema::definition());
        let raw = self.send_in_session(word, request).await?;

        match reply::parse::<DefinitionRecord>(&raw) {
            ModelReply::Parsed(record) => Ok(record.sanitized()),
            ModelReply::RawFallback(text) => {
                log::warn!("model: definition reply was not structured, using raw text");
                Ok(DefinitionRecord::from_raw_text(&text))
            }
        }
    }

    /// Score one recorded attempt at `word` against `target_phonetic`.
    ///
    /// Runs the two scoring turns in the word's session.  The returned
    /// score always carries a transcription string, falling back to
    /// [`UNCLEAR_TRANSCRIPTION`] when the model produced nothing usable.
    ///
    /// # Errors
    ///
    /// Transport, session and provider failures abort the attempt; the
    /// session is destroyed so the next attempt starts clean.
    pub async fn score_pronunciation(
        &mut self,
        audio: &AudioPayload,
        word: &str,
        target_phonetic: &str,
    ) -> Result<PronunciationScore, ModelError> {
        log::info!(
            "model: scoring a {} ms clip for \"{word}\"",
            audio.duration_ms
        );

        // Turn one: hear the clip.
        let request = PromptRequest::text(prompt::transcription_query(word))
            .with_audio(audio)
            .with_schema(ResponseSchema::transcription());
        let raw = self.send_in_session(word, request).await?;
        let user_phonetic = match reply::parse::<TranscriptionWire>(&raw) {
            ModelReply::Parsed(wire) if !wire.phonetic.trim().is_empty() => {
                wire.phonetic.trim().to_string()
            }
            ModelReply::RawFallback(text) if !text.is_empty() => text,
            _ => {
                log::warn!("model: transcription unusable, scoring with a placeholder");
                UNCLEAR_TRANSCRIPTION.to_string()
            }
        };

        // Turn two: judge it.
        let (matched, feedback) = match self.scoring.mode {
            ScoringMode::Similarity => {
                let request =
                    PromptRequest::text(prompt::similarity_query(word, target_phonetic, &user_phonetic))
                        .with_schema(ResponseSchema::similarity());
                let raw = self.send_in_session(word, request).await?;
                match reply::parse::<SimilarityWire>(&raw) {
                    ModelReply::Parsed(wire) => {
                        similarity_verdict(wire.similarity, self.scoring.similarity_threshold)
                    }
                    ModelReply::RawFallback(text) => match extract_number(&text) {
                        Some(similarity) => {
                            similarity_verdict(similarity, self.scoring.similarity_threshold)
                        }
                        None => unscored_verdict(),
                    },
                }
            }
            ScoringMode::Verdict => {
                let request =
                    PromptRequest::text(prompt::verdict_query(word, target_phonetic, &user_phonetic))
                        .with_schema(ResponseSchema::verdict());
                let raw = self.send_in_session(word, request).await?;
                match reply::parse::<VerdictWire>(&raw) {
                    ModelReply::Parsed(wire) => {
                        let feedback = if wire.feedback.trim().is_empty() {
                            default_feedback(wire.matched)
                        } else {
                            wire.feedback.trim().to_string()
                        };
                        (wire.matched, feedback)
                    }
                    // Never turn an unreadable judgement into a pass.
                    ModelReply::RawFallback(_) => unscored_verdict(),
                }
            }
        };

        log::info!(
            "model: heard {user_phonetic:?}, matched={matched} (mode {:?})",
            self.scoring.mode
        );
        Ok(PronunciationScore {
            user_phonetic,
            matched,
            feedback,
        })
    }

    // -----------------------------------------------------------------------
    // Private helpers
    // -----------------------------------------------------------------------

    /// Get or create the session for `word`.  A session scoped to a
    /// different word is destroyed first.
    async fn session_for(&mut self, word: &str) -> Result<&mut ModelSession, ModelError> {
        let session = match self.session.take() {
            Some(live) if live.word == word => live,
            stale => {
                if stale.is_some() {
                    log::debug!("model: word changed, discarding previous session");
                }
                drop(stale);
                let chat = self.backend.open(prompt::SYSTEM_PROMPT).await?;
                log::debug!("model: session opened for \"{word}\"");
                ModelSession {
                    chat,
                    word: word.to_string(),
                }
            }
        };
        Ok(self.session.insert(session))
    }

    /// Send one turn in `word`'s session.  A failed send destroys the
    /// session so the next attempt starts clean.
    async fn send_in_session(
        &mut self,
        word: &str,
        request: PromptRequest<'_>,
    ) -> Result<String, ModelError> {
        let session = self.session_for(word).await?;
        match session.chat.send(request).await {
            Ok(raw) => Ok(raw),
            Err(e) => {
                log::warn!("model: query failed, destroying session: {e}");
                self.session = None;
                Err(e)
            }
        }
    }
}

fn similarity_verdict(similarity: f64, threshold: f64) -> (bool, String) {
    let matched = similarity >= threshold;
    let feedback = if matched {
        format!("Great match at {similarity:.0}%.")
    } else {
        format!("Only {similarity:.0}% similar. Give it another go.")
    };
    (matched, feedback)
}

fn unscored_verdict() -> (bool, String) {
    (
        false,
        "Couldn't score that attempt. Try once more.".to_string(),
    )
}

fn default_feedback(matched: bool) -> String {
    if matched {
        "Sounds right. Well done.".to_string()
    } else {
        "Not quite. Listen again and retry.".to_string()
    }
}

/// First number in `text`, for replies like "about 97 percent".
fn extract_number(text: &str) -> Option<f64> {
    static NUMBER: OnceLock<Regex> = OnceLock::new();
    let re = NUMBER.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?").expect("hardcoded regex"));
    re.find(text).and_then(|m| m.as_str().parse().ok())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
