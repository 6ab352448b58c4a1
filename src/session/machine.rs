//! Session orchestrator.  Drives the full select → record → score loop.
//!
//! [`PracticeSession`] owns the [`SharedSnapshot`] and responds to
//! [`Gesture`]s received over a `tokio::sync::mpsc` channel.
//!
//! # Session flow
//!
//! ```text
//! Gesture::SelectWord("Cat!")
//!   └─▶ abort any capture, reset the snapshot (new generation),
//!       queue a definition query                              [Idle]
//!
//! Gesture::Start
//!   └─▶ open the microphone, clear the previous verdict       [Listening]
//!
//! Gesture::Stop  /  RecorderEvent::TimeLimit
//!   └─▶ stop capture
//!         ├─ clip long enough → queue the scoring queries     [Analyzing]
//!         │     └─▶ reply lands → align + verdict             [Scored]
//!         └─ too short → discard with a message               [Idle]
//!
//! Gesture::Speak
//!   └─▶ spawn_blocking(speech.speak)  (no state change)
//! ```
//!
//! Model queries run on a dedicated worker task that owns the
//! [`ScoringClient`], so a slow model call never blocks gesture handling.
//! Every query is tagged with the snapshot generation at submit time; a
//! reply whose generation no longer matches is discarded, which is what
//! keeps a late verdict for "cat" from landing on "dog".

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::align::{align, strip_delimiters};
use crate::audio::{AudioPayload, CaptureDevice, RecorderEvent, RecordingController};
use crate::config::AppConfig;
use crate::model::{DefinitionRecord, ModelError, PronunciationScore, ScoringClient};
use crate::speech::SpeechSynth;

use super::state::{Outcome, SessionState, SharedSnapshot};

// ---------------------------------------------------------------------------
// Gesture
// ---------------------------------------------------------------------------

/// User gestures the session responds to.
#[derive(Debug, Clone, PartialEq)]
pub enum Gesture {
    /// A word (or phrase; only the first word is used) was selected.
    SelectWord(String),
    /// Start recording an attempt.
    Start,
    /// Stop recording and score the attempt.
    Stop,
    /// Speak the target word aloud.
    Speak,
}

// ---------------------------------------------------------------------------
// Model worker
// ---------------------------------------------------------------------------

/// One query for the model worker, tagged with the generation it belongs to.
enum ModelJob {
    Definition {
        generation: u64,
        word: String,
    },
    Score {
        generation: u64,
        word: String,
        target: String,
        audio: AudioPayload,
    },
}

/// A finished query, carrying the generation of the job that produced it.
enum QueryDone {
    Definition {
        generation: u64,
        result: Result<DefinitionRecord, ModelError>,
    },
    Score {
        generation: u64,
        result: Result<PronunciationScore, ModelError>,
    },
}

/// Runs the scoring client on its own task.  Jobs are processed one at a
/// time in arrival order, which keeps the chat session's turn order intact.
async fn run_model_worker(
    mut client: ScoringClient,
    mut jobs: mpsc::Receiver<ModelJob>,
    done: mpsc::UnboundedSender<QueryDone>,
) {
    while let Some(job) = jobs.recv().await {
        let reply = match job {
            ModelJob::Definition { generation, word } => QueryDone::Definition {
                generation,
                result: client.fetch_definition(&word).await,
            },
            ModelJob::Score {
                generation,
                word,
                target,
                audio,
            } => QueryDone::Score {
                generation,
                result: client.score_pronunciation(&audio, &word, &target).await,
            },
        };
        if done.send(reply).is_err() {
            break;
        }
    }
    log::debug!("session: model worker finished");
}

// ---------------------------------------------------------------------------
// PracticeSession
// ---------------------------------------------------------------------------

/// Drives one practice surface end to end.
///
/// Create with [`PracticeSession::new`], then call [`run`](Self::run) inside
/// a tokio task and feed it gestures.
///
/// ```rust,no_run
/// use std::sync::Arc;
/// use phonaify::audio::CpalDevice;
/// use phonaify::config::AppConfig;
/// use phonaify::model::{GeminiBackend, ScoringClient};
/// use phonaify::session::{new_shared_snapshot, Gesture, PracticeSession};
/// use phonaify::speech::SystemSpeech;
///
/// # async fn example() {
/// let config = AppConfig::default();
/// let snapshot = new_shared_snapshot();
/// let backend = Arc::new(GeminiBackend::from_config(&config.model));
/// let client = ScoringClient::new(backend, config.scoring.clone());
///
/// let session = PracticeSession::new(
///     &config,
///     Arc::clone(&snapshot),
///     client,
///     Arc::new(CpalDevice::new()),
///     Arc::new(SystemSpeech::new()),
/// );
///
/// let (gesture_tx, gesture_rx) = tokio::sync::mpsc::channel(16);
/// tokio::spawn(session.run(gesture_rx));
///
/// gesture_tx
///     .send(Gesture::SelectWord("destruction".into()))
///     .await
///     .unwrap();
/// # }
/// ```
pub struct PracticeSession {
    snapshot: SharedSnapshot,
    recorder: RecordingController,
    recorder_events: mpsc::Receiver<RecorderEvent>,
    speech: Arc<dyn SpeechSynth>,
    speech_enabled: bool,
    jobs_tx: mpsc::Sender<ModelJob>,
    done_rx: mpsc::UnboundedReceiver<QueryDone>,
    worker: JoinHandle<()>,
}

impl PracticeSession {
    /// Create a new session and spawn its model worker.
    ///
    /// Must be called from within a tokio runtime.
    ///
    /// # Arguments
    ///
    /// * `config`: recording limits and the speech switch.
    /// * `snapshot`: shared session state (also read by the surface).
    /// * `client`: definition and scoring flows; moved onto the worker.
    /// * `device`: audio capture device (e.g. `CpalDevice`).
    /// * `speech`: spoken playback (e.g. `SystemSpeech`).
    pub fn new(
        config: &AppConfig,
        snapshot: SharedSnapshot,
        client: ScoringClient,
        device: Arc<dyn CaptureDevice>,
        speech: Arc<dyn SpeechSynth>,
    ) -> Self {
        let (recorder, recorder_events) = RecordingController::new(device, config.recording.clone());
        let (jobs_tx, jobs_rx) = mpsc::channel(16);
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let worker = tokio::spawn(run_model_worker(client, jobs_rx, done_tx));

        Self {
            snapshot,
            recorder,
            recorder_events,
            speech,
            speech_enabled: config.speech.enabled,
            jobs_tx,
            done_rx,
            worker,
        }
    }

    // -----------------------------------------------------------------------
    // Main async loop
    // -----------------------------------------------------------------------

    /// Run the session until `gestures` is closed.
    ///
    /// This is an `async fn` and should be spawned as a tokio task.  On
    /// shutdown the microphone is released and the model worker (with its
    /// chat session) is torn down.
    pub async fn run(mut self, mut gestures: mpsc::Receiver<Gesture>) {
        enum Input {
            Gesture(Option<Gesture>),
            Recorder(RecorderEvent),
            Query(QueryDone),
        }

        loop {
            let input = tokio::select! {
                gesture = gestures.recv() => Input::Gesture(gesture),
                Some(event) = self.recorder_events.recv() => Input::Recorder(event),
                Some(done) = self.done_rx.recv() => Input::Query(done),
            };

            match input {
                Input::Gesture(Some(gesture)) => self.handle_gesture(gesture).await,
                Input::Gesture(None) => break,
                Input::Recorder(event) => self.handle_recorder_event(event).await,
                Input::Query(done) => self.handle_query_done(done),
            }
        }

        if self.recorder.is_capturing() {
            self.recorder.abort_capture();
        }
        self.worker.abort();
        log::info!("session: gesture channel closed, shutting down");
    }

    // -----------------------------------------------------------------------
    // Gesture handlers
    // -----------------------------------------------------------------------

    async fn handle_gesture(&mut self, gesture: Gesture) {
        match gesture {
            Gesture::SelectWord(selection) => self.handle_select(&selection).await,
            Gesture::Start => self.handle_start(),
            Gesture::Stop => self.handle_stop().await,
            Gesture::Speak => self.handle_speak().await,
        }
    }

    /// Begin practising the first word of `selection`.  Preempts any capture
    /// in progress and queues the definition query.
    async fn handle_select(&mut self, selection: &str) {
        let Some(word) = first_word(selection) else {
            log::debug!("session: selection had no usable word, ignoring");
            return;
        };

        if self.recorder.is_capturing() {
            self.recorder.abort_capture();
        }

        let generation = {
            let mut snap = self.snapshot.lock().unwrap();
            snap.reset_for(&word);
            snap.generation
        };
        log::info!("session: practising \"{word}\" (generation {generation})");

        self.submit(ModelJob::Definition { generation, word }).await;
    }

    /// Open the microphone for an attempt.  Ignored without a word or while
    /// an attempt is already in flight.
    fn handle_start(&mut self) {
        let allowed = {
            let snap = self.snapshot.lock().unwrap();
            if snap.target_word.is_empty() {
                log::debug!("session: start ignored, no word selected");
                false
            } else if snap.state.is_busy() {
                log::debug!("session: start ignored while busy");
                false
            } else {
                true
            }
        };
        if !allowed {
            return;
        }

        match self.recorder.start_capture() {
            Ok(()) => {
                let mut snap = self.snapshot.lock().unwrap();
                snap.state = SessionState::Listening;
                snap.elapsed_ms = 0;
                snap.heard = None;
                snap.alignment = None;
                snap.feedback = None;
                snap.error = None;
                log::info!("session: listening for \"{}\"", snap.target_word);
            }
            Err(e) => {
                log::error!("session: could not start the microphone: {e}");
                self.snapshot.lock().unwrap().error = Some(e.to_string());
            }
        }
    }

    /// Stop capture and queue the scoring queries.
    async fn handle_stop(&mut self) {
        if !self.recorder.is_capturing() {
            log::debug!("session: stop ignored, not listening");
            return;
        }
        self.finish_attempt().await;
    }

    /// Speak the target word aloud.  A playback failure leaves a notice in
    /// the snapshot but never changes the session state.
    async fn handle_speak(&mut self) {
        if !self.speech_enabled {
            log::debug!("session: speak ignored, playback disabled");
            return;
        }
        let word = {
            let snap = self.snapshot.lock().unwrap();
            snap.target_word.clone()
        };
        if word.is_empty() {
            log::debug!("session: speak ignored, no word selected");
            return;
        }

        let speech = Arc::clone(&self.speech);
        let spoken = tokio::task::spawn_blocking(move || speech.speak(&word)).await;
        match spoken {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                log::warn!("session: playback failed: {e}");
                self.snapshot.lock().unwrap().error = Some(format!("Couldn't play the word: {e}"));
            }
            Err(e) => log::warn!("session: playback task panicked: {e}"),
        }
    }

    // -----------------------------------------------------------------------
    // Recorder events
    // -----------------------------------------------------------------------

    async fn handle_recorder_event(&mut self, event: RecorderEvent) {
        match event {
            RecorderEvent::Tick { elapsed_ms } => {
                let mut snap = self.snapshot.lock().unwrap();
                // A tick can arrive just after capture ended; only count it
                // while we are actually listening.
                if snap.state == SessionState::Listening {
                    snap.elapsed_ms = elapsed_ms;
                }
            }
            RecorderEvent::TimeLimit => {
                if self.recorder.is_capturing() {
                    log::info!("session: time limit reached, scoring the clip");
                    self.finish_attempt().await;
                }
            }
        }
    }

    /// End the capture and either queue the scoring queries or discard a
    /// too-short clip.
    async fn finish_attempt(&mut self) {
        match self.recorder.stop_capture() {
            Some(audio) => {
                let (generation, word, target) = {
                    let mut snap = self.snapshot.lock().unwrap();
                    snap.state = SessionState::Analyzing;
                    snap.elapsed_ms = audio.duration_ms;
                    (
                        snap.generation,
                        snap.target_word.clone(),
                        snap.target_phonetic.clone(),
                    )
                };
                self.submit(ModelJob::Score {
                    generation,
                    word,
                    target,
                    audio,
                })
                .await;
            }
            None => {
                let mut snap = self.snapshot.lock().unwrap();
                snap.state = SessionState::Idle;
                snap.elapsed_ms = 0;
                snap.error = Some("Recording was too short. Hold it a little longer.".to_string());
            }
        }
    }

    // -----------------------------------------------------------------------
    // Query results
    // -----------------------------------------------------------------------

    fn handle_query_done(&mut self, done: QueryDone) {
        match done {
            QueryDone::Definition { generation, result } => {
                let mut snap = self.snapshot.lock().unwrap();
                if generation != snap.generation {
                    log::debug!("session: dropping stale definition reply");
                    return;
                }
                match result {
                    Ok(card) => {
                        log::info!(
                            "session: card ready for \"{}\" ({})",
                            snap.target_word,
                            card.phonetic
                        );
                        snap.target_phonetic = card.phonetic.clone();
                        snap.definition = Some(card);
                    }
                    Err(e) => {
                        log::warn!("session: definition lookup failed: {e}");
                        snap.error = Some(format!("Couldn't load the word card: {e}"));
                    }
                }
            }
            QueryDone::Score { generation, result } => {
                let mut snap = self.snapshot.lock().unwrap();
                if generation != snap.generation {
                    log::debug!("session: dropping stale score reply");
                    return;
                }
                match result {
                    Ok(score) => {
                        let outcome = if score.matched {
                            Outcome::Correct
                        } else {
                            Outcome::Incorrect
                        };
                        let alignment = align(
                            strip_delimiters(&snap.target_phonetic),
                            strip_delimiters(&score.user_phonetic),
                        );
                        snap.alignment = Some(alignment);
                        snap.heard = Some(score.user_phonetic);
                        snap.feedback = Some(score.feedback);
                        snap.state = SessionState::Scored(outcome);
                    }
                    Err(e) => {
                        log::warn!("session: scoring failed: {e}");
                        snap.state = SessionState::Idle;
                        snap.error = Some(format!("Couldn't score that attempt: {e}"));
                    }
                }
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn submit(&mut self, job: ModelJob) {
        if self.jobs_tx.send(job).await.is_err() {
            log::error!("session: model worker is gone, dropping query");
        }
    }
}

/// First usable word of a selection: the first whitespace-separated token,
/// stripped of surrounding punctuation and lowercased.  Interior apostrophes
/// and hyphens survive ("don't", "well-known").
fn first_word(selection: &str) -> Option<String> {
    let token = selection.split_whitespace().next()?;
    let trimmed = token.trim_matches(|c: char| !c.is_alphanumeric());
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_lowercase())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use crate::audio::{CaptureError, MockDevice};
    use crate::config::AppConfig;
    use crate::model::MockBackend;
    use crate::session::state::{new_shared_snapshot, SessionSnapshot};
    use crate::speech::MockSpeech;

    const CAT_CARD: &str =
        r#"{ "definition": "a small mammal", "phoneticAlphabet": "/kæt/", "partsOfSpeech": "noun" }"#;
    const DOG_CARD: &str =
        r#"{ "definition": "a loyal companion", "phoneticAlphabet": "/dɒɡ/", "partsOfSpeech": "noun" }"#;

    // -----------------------------------------------------------------------
    // Harness
    // -----------------------------------------------------------------------

    struct Harness {
        tx: mpsc::Sender<Gesture>,
        snapshot: SharedSnapshot,
        backend: MockBackend,
        device: MockDevice,
        speech: MockSpeech,
        run: JoinHandle<()>,
    }

    fn start_session(config: AppConfig) -> Harness {
        let backend = MockBackend::new();
        let device = MockDevice::new();
        let speech = MockSpeech::new();
        let snapshot = new_shared_snapshot();

        let client = crate::model::ScoringClient::new(
            Arc::new(backend.clone()),
            config.scoring.clone(),
        );
        let session = PracticeSession::new(
            &config,
            Arc::clone(&snapshot),
            client,
            Arc::new(device.clone()),
            Arc::new(speech.clone()),
        );

        let (tx, rx) = mpsc::channel(16);
        let run = tokio::spawn(session.run(rx));
        Harness {
            tx,
            snapshot,
            backend,
            device,
            speech,
            run,
        }
    }

    /// Poll the snapshot until `cond` holds.  Under a paused clock the
    /// sleeps auto-advance, so this is fast and deterministic.
    async fn wait_until(
        snapshot: &SharedSnapshot,
        what: &str,
        cond: impl Fn(&SessionSnapshot) -> bool,
    ) {
        for _ in 0..1000 {
            if cond(&snapshot.lock().unwrap()) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("timed out waiting for {what}");
    }

    async fn select_and_wait_for_card(harness: &Harness, selection: &str) {
        harness
            .tx
            .send(Gesture::SelectWord(selection.into()))
            .await
            .unwrap();
        wait_until(&harness.snapshot, "word card", |s| s.definition.is_some()).await;
    }

    // -----------------------------------------------------------------------
    // Word selection
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn selecting_a_word_loads_its_card() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(CAT_CARD);

        select_and_wait_for_card(&harness, "Cat!").await;

        let snap = harness.snapshot.lock().unwrap();
        assert_eq!(snap.target_word, "cat");
        assert_eq!(snap.target_phonetic, "/kæt/");
        assert_eq!(snap.generation, 1);
        assert_eq!(snap.state, SessionState::Idle);
        drop(snap);
        assert_eq!(harness.backend.opened(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn selection_with_no_letters_is_ignored() {
        let harness = start_session(AppConfig::default());

        harness
            .tx
            .send(Gesture::SelectWord("?!*".into()))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let snap = harness.snapshot.lock().unwrap();
        assert!(snap.target_word.is_empty());
        assert_eq!(snap.generation, 0);
        drop(snap);
        assert_eq!(harness.backend.opened(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn phrase_selection_practises_its_first_word() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(r#"{ "definition": "a greeting" }"#);

        select_and_wait_for_card(&harness, "Hello there, friend").await;

        assert_eq!(harness.snapshot.lock().unwrap().target_word, "hello");
    }

    #[tokio::test(start_paused = true)]
    async fn definition_failure_surfaces_the_error() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_error(ModelError::Timeout);

        harness
            .tx
            .send(Gesture::SelectWord("cat".into()))
            .await
            .unwrap();
        wait_until(&harness.snapshot, "error", |s| s.error.is_some()).await;

        let snap = harness.snapshot.lock().unwrap();
        // The word stays selected so the learner can retry.
        assert_eq!(snap.target_word, "cat");
        assert_eq!(snap.state, SessionState::Idle);
        assert!(snap.definition.is_none());
    }

    // -----------------------------------------------------------------------
    // Recording and scoring
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn start_stop_scores_the_attempt() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(CAT_CARD);
        harness.backend.push_reply(r#"{ "phonetic": "kæt" }"#);
        harness.backend.push_reply(r#"{ "similarity": 100 }"#);

        select_and_wait_for_card(&harness, "cat").await;
        harness.tx.send(Gesture::Start).await.unwrap();
        wait_until(&harness.snapshot, "listening", |s| {
            s.state == SessionState::Listening
        })
        .await;

        tokio::time::advance(Duration::from_millis(300)).await;
        harness.tx.send(Gesture::Stop).await.unwrap();
        wait_until(&harness.snapshot, "verdict", |s| {
            matches!(s.state, SessionState::Scored(_))
        })
        .await;

        let snap = harness.snapshot.lock().unwrap();
        assert_eq!(snap.state, SessionState::Scored(Outcome::Correct));
        assert_eq!(snap.heard.as_deref(), Some("kæt"));
        assert!(snap.alignment.as_ref().unwrap().all_matched());
        assert!(snap.feedback.is_some());
        assert!(snap.elapsed_ms >= 200);
        drop(snap);

        let prompts = harness.backend.prompts();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[1].has_audio, "transcription turn carries the clip");
        assert_eq!(harness.device.live_streams(), 0, "microphone released");
    }

    #[tokio::test(start_paused = true)]
    async fn verdict_accepts_another_attempt() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(CAT_CARD);
        harness.backend.push_reply(r#"{ "phonetic": "kæt" }"#);
        harness.backend.push_reply(r#"{ "similarity": 100 }"#);

        select_and_wait_for_card(&harness, "cat").await;
        harness.tx.send(Gesture::Start).await.unwrap();
        wait_until(&harness.snapshot, "listening", |s| {
            s.state == SessionState::Listening
        })
        .await;
        tokio::time::advance(Duration::from_millis(300)).await;
        harness.tx.send(Gesture::Stop).await.unwrap();
        wait_until(&harness.snapshot, "verdict", |s| {
            matches!(s.state, SessionState::Scored(_))
        })
        .await;

        // A verdict is not terminal; the same word can be practised again.
        harness.tx.send(Gesture::Start).await.unwrap();
        wait_until(&harness.snapshot, "second attempt", |s| {
            s.state == SessionState::Listening
        })
        .await;

        let snap = harness.snapshot.lock().unwrap();
        assert!(snap.heard.is_none(), "previous attempt cleared");
        assert!(snap.alignment.is_none());
        assert_eq!(snap.target_word, "cat");
        drop(snap);
        assert_eq!(harness.device.open_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn mismatched_attempt_flags_the_trouble_spots() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(CAT_CARD);
        harness.backend.push_reply(r#"{ "phonetic": "kɑt" }"#);
        harness.backend.push_reply(r#"{ "similarity": 60 }"#);

        select_and_wait_for_card(&harness, "cat").await;
        harness.tx.send(Gesture::Start).await.unwrap();
        wait_until(&harness.snapshot, "listening", |s| {
            s.state == SessionState::Listening
        })
        .await;
        tokio::time::advance(Duration::from_millis(300)).await;
        harness.tx.send(Gesture::Stop).await.unwrap();
        wait_until(&harness.snapshot, "verdict", |s| {
            matches!(s.state, SessionState::Scored(_))
        })
        .await;

        let snap = harness.snapshot.lock().unwrap();
        assert_eq!(snap.state, SessionState::Scored(Outcome::Incorrect));
        // Reference "kæt" vs heard "kɑt": exactly the vowel is flagged.
        let flagged: Vec<char> = snap
            .alignment
            .as_ref()
            .unwrap()
            .symbols()
            .iter()
            .filter(|s| !s.matched)
            .map(|s| s.symbol)
            .collect();
        assert_eq!(flagged, vec!['æ']);
    }

    #[tokio::test(start_paused = true)]
    async fn too_short_attempt_is_discarded() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(CAT_CARD);

        select_and_wait_for_card(&harness, "cat").await;
        harness.tx.send(Gesture::Start).await.unwrap();
        wait_until(&harness.snapshot, "listening", |s| {
            s.state == SessionState::Listening
        })
        .await;
        harness.tx.send(Gesture::Stop).await.unwrap();
        wait_until(&harness.snapshot, "discard", |s| s.error.is_some()).await;

        let snap = harness.snapshot.lock().unwrap();
        assert_eq!(snap.state, SessionState::Idle);
        assert!(snap.alignment.is_none());
        drop(snap);
        // Only the definition query ran; the clip never went out.
        assert_eq!(harness.backend.prompts().len(), 1);
        assert_eq!(harness.device.live_streams(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn time_limit_scores_without_a_stop_gesture() {
        let mut config = AppConfig::default();
        config.recording.max_ms = 500;
        let harness = start_session(config);
        harness.backend.push_reply(CAT_CARD);
        harness.backend.push_reply(r#"{ "phonetic": "kæt" }"#);
        harness.backend.push_reply(r#"{ "similarity": 97 }"#);

        select_and_wait_for_card(&harness, "cat").await;
        harness.tx.send(Gesture::Start).await.unwrap();
        wait_until(&harness.snapshot, "listening", |s| {
            s.state == SessionState::Listening
        })
        .await;

        tokio::time::advance(Duration::from_millis(600)).await;
        wait_until(&harness.snapshot, "verdict", |s| {
            matches!(s.state, SessionState::Scored(_))
        })
        .await;

        let snap = harness.snapshot.lock().unwrap();
        assert_eq!(snap.state, SessionState::Scored(Outcome::Correct));
        assert!(snap.elapsed_ms >= 500);
    }

    #[tokio::test(start_paused = true)]
    async fn scoring_failure_returns_to_idle_with_the_error() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(CAT_CARD);
        harness.backend.push_error(ModelError::Request("boom".into()));

        select_and_wait_for_card(&harness, "cat").await;
        harness.tx.send(Gesture::Start).await.unwrap();
        wait_until(&harness.snapshot, "listening", |s| {
            s.state == SessionState::Listening
        })
        .await;
        tokio::time::advance(Duration::from_millis(300)).await;
        harness.tx.send(Gesture::Stop).await.unwrap();
        wait_until(&harness.snapshot, "error", |s| s.error.is_some()).await;

        let snap = harness.snapshot.lock().unwrap();
        assert_eq!(snap.state, SessionState::Idle);
        assert!(snap.heard.is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn start_without_a_word_is_ignored() {
        let harness = start_session(AppConfig::default());

        harness.tx.send(Gesture::Start).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(harness.device.open_count(), 0);
        assert_eq!(harness.snapshot.lock().unwrap().state, SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn denied_microphone_leaves_a_notice_and_stays_idle() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(CAT_CARD);
        harness.device.fail_open_with(CaptureError::PermissionDenied);

        select_and_wait_for_card(&harness, "cat").await;
        harness.tx.send(Gesture::Start).await.unwrap();
        wait_until(&harness.snapshot, "denial notice", |s| s.error.is_some()).await;

        let snap = harness.snapshot.lock().unwrap();
        assert_eq!(snap.state, SessionState::Idle);
        assert!(snap.error.as_deref().unwrap().contains("denied"));
        drop(snap);
        assert_eq!(harness.device.live_streams(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_start_while_listening_is_ignored() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(CAT_CARD);

        select_and_wait_for_card(&harness, "cat").await;
        harness.tx.send(Gesture::Start).await.unwrap();
        wait_until(&harness.snapshot, "listening", |s| {
            s.state == SessionState::Listening
        })
        .await;

        harness.tx.send(Gesture::Start).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        assert_eq!(harness.device.open_count(), 1);
        assert_eq!(
            harness.snapshot.lock().unwrap().state,
            SessionState::Listening
        );
    }

    #[tokio::test(start_paused = true)]
    async fn start_while_analyzing_is_ignored() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(CAT_CARD);
        harness.backend.push_reply(r#"{ "phonetic": "kæt" }"#);
        harness.backend.push_reply(r#"{ "similarity": 99 }"#);

        select_and_wait_for_card(&harness, "cat").await;
        // Slow the scoring turns down so Analyzing is observable.
        harness.backend.set_latency(Duration::from_millis(500));

        harness.tx.send(Gesture::Start).await.unwrap();
        wait_until(&harness.snapshot, "listening", |s| {
            s.state == SessionState::Listening
        })
        .await;
        tokio::time::advance(Duration::from_millis(300)).await;
        harness.tx.send(Gesture::Stop).await.unwrap();
        wait_until(&harness.snapshot, "analyzing", |s| {
            s.state == SessionState::Analyzing
        })
        .await;

        harness.tx.send(Gesture::Start).await.unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(harness.device.open_count(), 1, "no second capture");

        wait_until(&harness.snapshot, "verdict", |s| {
            matches!(s.state, SessionState::Scored(_))
        })
        .await;
    }

    // -----------------------------------------------------------------------
    // Stale replies
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn new_word_drops_the_stale_verdict() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(CAT_CARD);
        harness.backend.push_reply(r#"{ "phonetic": "kæt" }"#);
        harness.backend.push_reply(r#"{ "similarity": 100 }"#);
        harness.backend.push_reply(DOG_CARD);

        select_and_wait_for_card(&harness, "cat").await;
        // Slow the model down so the score is still in flight when the
        // learner moves on.
        harness.backend.set_latency(Duration::from_millis(200));

        harness.tx.send(Gesture::Start).await.unwrap();
        wait_until(&harness.snapshot, "listening", |s| {
            s.state == SessionState::Listening
        })
        .await;
        tokio::time::advance(Duration::from_millis(300)).await;
        harness.tx.send(Gesture::Stop).await.unwrap();

        // Move on to "dog" while cat's verdict is still being computed.
        harness
            .tx
            .send(Gesture::SelectWord("dog".into()))
            .await
            .unwrap();
        wait_until(&harness.snapshot, "dog card", |s| {
            s.definition
                .as_ref()
                .is_some_and(|d| d.definition == "a loyal companion")
        })
        .await;

        let snap = harness.snapshot.lock().unwrap();
        assert_eq!(snap.target_word, "dog");
        assert_eq!(snap.generation, 2);
        // Cat's verdict must not have landed on dog.
        assert_eq!(snap.state, SessionState::Idle);
        assert!(snap.heard.is_none());
        assert!(snap.alignment.is_none());
    }

    // -----------------------------------------------------------------------
    // Spoken playback
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn speak_says_the_selected_word() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(CAT_CARD);

        select_and_wait_for_card(&harness, "cat").await;
        harness.tx.send(Gesture::Speak).await.unwrap();

        for _ in 0..1000 {
            if !harness.speech.spoken().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        assert_eq!(harness.speech.spoken(), vec!["cat".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn speak_with_nothing_selected_is_ignored() {
        let harness = start_session(AppConfig::default());

        harness.tx.send(Gesture::Speak).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(harness.speech.spoken().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_playback_leaves_a_notice() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(CAT_CARD);
        harness.speech.fail_with("no synthesizer installed");

        select_and_wait_for_card(&harness, "cat").await;
        harness.tx.send(Gesture::Speak).await.unwrap();
        wait_until(&harness.snapshot, "playback notice", |s| s.error.is_some()).await;

        let snap = harness.snapshot.lock().unwrap();
        assert!(snap.error.as_deref().unwrap().contains("no synthesizer"));
        // The failure never touches the practice flow itself.
        assert_eq!(snap.state, SessionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn speak_respects_the_config_switch() {
        let mut config = AppConfig::default();
        config.speech.enabled = false;
        let harness = start_session(config);
        harness.backend.push_reply(CAT_CARD);

        select_and_wait_for_card(&harness, "cat").await;
        harness.tx.send(Gesture::Speak).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(harness.speech.spoken().is_empty());
    }

    // -----------------------------------------------------------------------
    // Shutdown
    // -----------------------------------------------------------------------

    #[tokio::test(start_paused = true)]
    async fn closing_the_gesture_channel_releases_the_microphone() {
        let harness = start_session(AppConfig::default());
        harness.backend.push_reply(CAT_CARD);

        select_and_wait_for_card(&harness, "cat").await;
        harness.tx.send(Gesture::Start).await.unwrap();
        wait_until(&harness.snapshot, "listening", |s| {
            s.state == SessionState::Listening
        })
        .await;

        let Harness {
            tx, device, run, ..
        } = harness;
        drop(tx);
        run.await.unwrap();

        assert_eq!(device.live_streams(), 0);
    }

    // -----------------------------------------------------------------------
    // first_word
    // -----------------------------------------------------------------------

    #[test]
    fn first_word_extraction() {
        assert_eq!(first_word("Cat!"), Some("cat".to_string()));
        assert_eq!(first_word("  Hello there"), Some("hello".to_string()));
        assert_eq!(first_word("don't"), Some("don't".to_string()));
        assert_eq!(first_word("'quoted'"), Some("quoted".to_string()));
        assert_eq!(first_word("well-known fact"), Some("well-known".to_string()));
        assert_eq!(first_word("?!*"), None);
        assert_eq!(first_word(""), None);
        assert_eq!(first_word("   "), None);
    }
}
