//! Model backend seam: chat sessions, prompt requests, errors.
//!
//! # Overview
//!
//! [`ModelBackend`] creates chat sessions; [`ModelChat`] is one live
//! session with its own accumulated history.  Both are object-safe so the
//! scoring client can hold `Arc<dyn ModelBackend>` / `Box<dyn ModelChat>`
//! and never know which provider is behind them.
//!
//! [`GeminiBackend`](crate::model::GeminiBackend) is the production
//! implementation.  [`MockBackend`] (under `#[cfg(test)]`) replays scripted
//! replies with optional artificial latency, and records every prompt it
//! receives so tests can assert on session traffic.

use async_trait::async_trait;
use thiserror::Error;

use crate::audio::AudioPayload;
use crate::model::schema::ResponseSchema;

// ---------------------------------------------------------------------------
// ModelError
// ---------------------------------------------------------------------------

/// Errors raised by a model backend.
#[derive(Debug, Error)]
pub enum ModelError {
    /// A chat session could not be created.
    #[error("model session could not be created: {0}")]
    SessionCreate(String),

    /// HTTP transport or provider error.
    #[error("model request failed: {0}")]
    Request(String),

    /// The request did not complete within the configured timeout.
    #[error("model request timed out")]
    Timeout,

    /// The provider refused to answer (safety block, quota, and so on).
    #[error("model refused the request: {0}")]
    Blocked(String),

    /// The reply carried no usable text.
    #[error("model returned an empty response")]
    EmptyResponse,
}

impl From<reqwest::Error> for ModelError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            ModelError::Timeout
        } else {
            ModelError::Request(e.to_string())
        }
    }
}

// ---------------------------------------------------------------------------
// PromptRequest
// ---------------------------------------------------------------------------

/// One prompt turn: text, optionally an audio clip and a response schema.
///
/// Audio is borrowed; payloads can run to hundreds of kilobytes and the
/// caller keeps ownership.
#[derive(Debug)]
pub struct PromptRequest<'a> {
    pub text: String,
    pub audio: Option<&'a AudioPayload>,
    pub schema: Option<ResponseSchema>,
}

impl<'a> PromptRequest<'a> {
    /// A plain text turn.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            audio: None,
            schema: None,
        }
    }

    /// Attach an audio clip to this turn.
    pub fn with_audio(mut self, audio: &'a AudioPayload) -> Self {
        self.audio = Some(audio);
        self
    }

    /// Constrain the reply to a schema.
    pub fn with_schema(mut self, schema: ResponseSchema) -> Self {
        self.schema = Some(schema);
        self
    }
}

// ---------------------------------------------------------------------------
// ModelBackend / ModelChat traits
// ---------------------------------------------------------------------------

/// Factory for chat sessions against one model provider.
///
/// Implementors must be `Send + Sync`; the session loop shares the backend
/// behind an `Arc` across spawned query tasks.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    /// Create a fresh session primed with `system_prompt`.
    async fn open(&self, system_prompt: &str) -> Result<Box<dyn ModelChat>, ModelError>;
}

/// One live chat session.  Each [`send`] appends to the session history, so
/// later turns can refer to earlier ones.
///
/// [`send`]: ModelChat::send
#[async_trait]
pub trait ModelChat: Send {
    /// Send one turn and return the model's raw text reply.
    async fn send(&mut self, request: PromptRequest<'_>) -> Result<String, ModelError>;
}

// Tests `unwrap_err()` on `Result<Box<dyn ModelChat>, _>`, which needs the
// success type to be `Debug`.
#[cfg(test)]
impl std::fmt::Debug for dyn ModelChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("dyn ModelChat")
    }
}

// Compile-time assertion: both traits must be object-safe.
const _: fn() = || {
    fn _assert_backend(_: Box<dyn ModelBackend>) {}
    fn _assert_chat(_: Box<dyn ModelChat>) {}
};

// ---------------------------------------------------------------------------
// MockBackend  (test-only)
// ---------------------------------------------------------------------------

/// What one [`MockBackend`] session saw for a single prompt turn.
#[cfg(test)]
#[derive(Debug, Clone)]
pub struct RecordedPrompt {
    pub text: String,
    pub has_audio: bool,
    pub has_schema: bool,
}

/// Scriptable backend for tests: queued replies, optional latency, full
/// prompt recording.  Cloning shares state.
///
/// Unscripted queries answer with an empty JSON object (`{}`), which keeps
/// flows alive without forcing every test to script every turn.
///
/// # Example
///
/// ```rust
/// # use phonaify::model::{MockBackend, ModelBackend, PromptRequest};
/// # async fn demo() {
/// let backend = MockBackend::new();
/// backend.push_reply(r#"{ "similarity": 99 }"#);
///
/// let mut chat = backend.open("system").await.unwrap();
/// let reply = chat.send(PromptRequest::text("score it")).await.unwrap();
/// assert!(reply.contains("99"));
/// assert_eq!(backend.opened(), 1);
/// # }
/// ```
#[cfg(test)]
#[derive(Clone)]
pub struct MockBackend {
    inner: std::sync::Arc<MockModelInner>,
}

#[cfg(test)]
struct MockModelInner {
    replies: std::sync::Mutex<std::collections::VecDeque<Result<String, ModelError>>>,
    prompts: std::sync::Mutex<Vec<RecordedPrompt>>,
    system_prompts: std::sync::Mutex<Vec<String>>,
    fail_open: std::sync::Mutex<Option<String>>,
    latency: std::sync::Mutex<std::time::Duration>,
    opened: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl MockBackend {
    pub fn new() -> Self {
        Self {
            inner: std::sync::Arc::new(MockModelInner {
                replies: std::sync::Mutex::new(std::collections::VecDeque::new()),
                prompts: std::sync::Mutex::new(Vec::new()),
                system_prompts: std::sync::Mutex::new(Vec::new()),
                fail_open: std::sync::Mutex::new(None),
                latency: std::sync::Mutex::new(std::time::Duration::ZERO),
                opened: std::sync::atomic::AtomicUsize::new(0),
            }),
        }
    }

    /// Queue a successful reply; replies are consumed in push order.
    pub fn push_reply(&self, reply: impl Into<String>) {
        self.inner
            .replies
            .lock()
            .unwrap()
            .push_back(Ok(reply.into()));
    }

    /// Queue an error reply.
    pub fn push_error(&self, error: ModelError) {
        self.inner.replies.lock().unwrap().push_back(Err(error));
    }

    /// Make every subsequent `open` fail with [`ModelError::SessionCreate`].
    pub fn fail_open(&self, message: &str) {
        *self.inner.fail_open.lock().unwrap() = Some(message.to_string());
    }

    /// Delay every reply by `latency` (virtual time in paused tests).
    pub fn set_latency(&self, latency: std::time::Duration) {
        *self.inner.latency.lock().unwrap() = latency;
    }

    /// Number of sessions opened so far.
    pub fn opened(&self) -> usize {
        self.inner.opened.load(std::sync::atomic::Ordering::SeqCst)
    }

    /// Every prompt any session received, in send order.
    pub fn prompts(&self) -> Vec<RecordedPrompt> {
        self.inner.prompts.lock().unwrap().clone()
    }

    /// System prompts passed to `open`, in open order.
    pub fn system_prompts(&self) -> Vec<String> {
        self.inner.system_prompts.lock().unwrap().clone()
    }
}

#[cfg(test)]
#[async_trait]
impl ModelBackend for MockBackend {
    async fn open(&self, system_prompt: &str) -> Result<Box<dyn ModelChat>, ModelError> {
        if let Some(message) = self.inner.fail_open.lock().unwrap().clone() {
            return Err(ModelError::SessionCreate(message));
        }
        self.inner
            .opened
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.inner
            .system_prompts
            .lock()
            .unwrap()
            .push(system_prompt.to_string());
        Ok(Box::new(MockChat {
            inner: std::sync::Arc::clone(&self.inner),
        }))
    }
}

#[cfg(test)]
struct MockChat {
    inner: std::sync::Arc<MockModelInner>,
}

#[cfg(test)]
#[async_trait]
impl ModelChat for MockChat {
    async fn send(&mut self, request: PromptRequest<'_>) -> Result<String, ModelError> {
        self.inner.prompts.lock().unwrap().push(RecordedPrompt {
            text: request.text.clone(),
            has_audio: request.audio.is_some(),
            has_schema: request.schema.is_some(),
        });

        let latency = *self.inner.latency.lock().unwrap();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        let reply = self.inner.replies.lock().unwrap().pop_front();
        match reply {
            Some(scripted) => scripted,
            None => Ok("{}".to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
