//! Gemini REST backend (`models/*:generateContent`).
//!
//! The API itself is stateless, so a "session" here is client-side: every
//! [`GeminiChat`] keeps its own transcript and replays it on each call,
//! which is what lets the second scoring turn say "the clip" and mean the
//! audio sent in the first.  Audio rides along as base64 `inline_data`;
//! a [`ResponseSchema`] on the request is forwarded as `response_schema`
//! with the JSON response MIME type so the provider constrains sampling.
//!
//! Failed turns are rolled back out of the transcript, so a session never
//! accumulates a user turn the model did not answer.

use async_trait::async_trait;
use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::ModelConfig;
use crate::model::backend::{ModelBackend, ModelChat, ModelError, PromptRequest};
use crate::model::schema::ResponseSchema;

/// Reply cap; card text and verdicts are all short.
const MAX_OUTPUT_TOKENS: u32 = 1024;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    system_instruction: &'a Content,
    contents: &'a [Content],
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize)]
struct Content {
    /// `"user"` or `"model"`; absent on the system instruction.
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum Part {
    Text { text: String },
    InlineData { inline_data: InlineData },
}

#[derive(Debug, Clone, Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_mime_type: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_schema: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    candidates: Option<Vec<Candidate>>,
    #[serde(rename = "promptFeedback")]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: ResponseContent,
}

#[derive(Debug, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
struct ResponsePart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason")]
    block_reason: Option<String>,
}

// ---------------------------------------------------------------------------
// GeminiBackend
// ---------------------------------------------------------------------------

/// Production [`ModelBackend`] against the Gemini REST API.
///
/// All connection details (`base_url`, `api_key`, `model`, timeout) come
/// from [`ModelConfig`]; nothing is hardcoded.
pub struct GeminiBackend {
    http: reqwest::Client,
    config: ModelConfig,
}

impl GeminiBackend {
    /// Build a backend from application config.
    ///
    /// The HTTP client carries the per-request timeout from
    /// `config.timeout_secs`.  A default (no-timeout) client is used as a
    /// last-resort fallback if the builder fails (should never happen in
    /// practice).
    pub fn from_config(config: &ModelConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            http,
            config: config.clone(),
        }
    }
}

#[async_trait]
impl ModelBackend for GeminiBackend {
    async fn open(&self, system_prompt: &str) -> Result<Box<dyn ModelChat>, ModelError> {
        let api_key = self.config.resolve_api_key().ok_or_else(|| {
            ModelError::SessionCreate(
                "no Gemini API key configured (set model.api_key or GEMINI_API_KEY)".into(),
            )
        })?;

        Ok(Box::new(GeminiChat {
            http: self.http.clone(),
            base_url: self.config.base_url.clone(),
            model: self.config.model.clone(),
            temperature: self.config.temperature,
            api_key,
            system: Content {
                role: None,
                parts: vec![Part::Text {
                    text: system_prompt.to_string(),
                }],
            },
            history: Vec::new(),
        }))
    }
}

// ---------------------------------------------------------------------------
// GeminiChat
// ---------------------------------------------------------------------------

/// One Gemini session: system instruction plus the accumulated transcript.
struct GeminiChat {
    http: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
    api_key: String,
    system: Content,
    history: Vec<Content>,
}

#[async_trait]
impl ModelChat for GeminiChat {
    async fn send(&mut self, request: PromptRequest<'_>) -> Result<String, ModelError> {
        let schema = request.schema.clone();
        self.history.push(user_turn(&request));

        match self.round_trip(schema).await {
            Ok(text) => {
                self.history.push(Content {
                    role: Some("model"),
                    parts: vec![Part::Text { text: text.clone() }],
                });
                Ok(text)
            }
            Err(e) => {
                self.history.pop();
                Err(e)
            }
        }
    }
}

impl GeminiChat {
    async fn round_trip(&self, schema: Option<ResponseSchema>) -> Result<String, ModelError> {
        let generation_config = GenerationConfig {
            temperature: self.temperature,
            max_output_tokens: MAX_OUTPUT_TOKENS,
            response_mime_type: schema.as_ref().map(|_| "application/json"),
            response_schema: schema.as_ref().map(ResponseSchema::to_json),
        };
        let body = GenerateRequest {
            system_instruction: &self.system,
            contents: &self.history,
            generation_config,
        };

        let url = format!(
            "{}/v1beta/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );

        let response = self.http.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let detail = response.text().await.unwrap_or_default();
            return Err(ModelError::Request(format!("status {status}: {detail}")));
        }

        let decoded: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ModelError::Request(format!("malformed response: {e}")))?;

        extract_text(decoded)
    }
}

/// Assemble the user turn for one prompt request.
fn user_turn(request: &PromptRequest<'_>) -> Content {
    let mut parts = vec![Part::Text {
        text: request.text.clone(),
    }];
    if let Some(audio) = request.audio {
        parts.push(Part::InlineData {
            inline_data: InlineData {
                mime_type: audio.codec.mime_type().to_string(),
                data: general_purpose::STANDARD.encode(&audio.bytes),
            },
        });
    }
    Content {
        role: Some("user"),
        parts,
    }
}

/// Pull the reply text out of a decoded response.
fn extract_text(response: GenerateResponse) -> Result<String, ModelError> {
    if let Some(feedback) = response.prompt_feedback {
        if let Some(reason) = feedback.block_reason {
            return Err(ModelError::Blocked(reason));
        }
    }

    let text: String = response
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .map(|candidate| {
            candidate
                .content
                .parts
                .into_iter()
                .map(|part| part.text)
                .collect()
        })
        .unwrap_or_default();

    let text = text.trim().to_string();
    if text.is_empty() {
        return Err(ModelError::EmptyResponse);
    }
    Ok(text)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
