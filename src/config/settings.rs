//! Application settings structs, defaults and TOML persistence.
//!
//! All structs implement `Serialize`, `Deserialize`, `Default` and `Clone`
//! so they can be round-tripped through TOML files and shared across threads.

use anyhow::Result;
use serde::{Deserialize, Serialize};

use crate::audio::{AudioCodec, MAX_RECORDING_MS, MIN_RECORDING_MS, TICK_MS};

use super::AppPaths;

// ---------------------------------------------------------------------------
// ScoringMode
// ---------------------------------------------------------------------------

/// Selects how the judging turn decides pass or fail.
///
/// | Variant    | Judging turn                               | Pass when           |
/// |------------|--------------------------------------------|---------------------|
/// | Similarity | model rates the transcriptions 0 to 100    | rating >= threshold |
/// | Verdict    | model answers yes/no with its own feedback | model says yes      |
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScoringMode {
    /// Numeric similarity rating, judged against `similarity_threshold`.
    Similarity,
    /// The model decides outright and writes the coaching line itself.
    Verdict,
}

impl Default for ScoringMode {
    fn default() -> Self {
        Self::Similarity
    }
}

// ---------------------------------------------------------------------------
// ModelConfig
// ---------------------------------------------------------------------------

/// Settings for the scoring model backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the Gemini API endpoint.
    pub base_url: String,
    /// API key.  `None` falls back to the `GEMINI_API_KEY` environment
    /// variable.
    pub api_key: Option<String>,
    /// Model identifier sent to the API (e.g. `"gemini-2.0-flash"`).
    pub model: String,
    /// Sampling temperature (0.0 to 1.0).  Lower = more deterministic.
    pub temperature: f32,
    /// Maximum seconds to wait for a model response before timing out.
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: "https://generativelanguage.googleapis.com".into(),
            api_key: None,
            model: "gemini-2.0-flash".into(),
            temperature: 0.2,
            timeout_secs: 20,
        }
    }
}

impl ModelConfig {
    /// The API key to use: the configured key when present and non-empty,
    /// otherwise the `GEMINI_API_KEY` environment variable.
    pub fn resolve_api_key(&self) -> Option<String> {
        self.api_key
            .as_ref()
            .filter(|key| !key.is_empty())
            .cloned()
            .or_else(|| {
                std::env::var("GEMINI_API_KEY")
                    .ok()
                    .filter(|key| !key.is_empty())
            })
    }
}

// ---------------------------------------------------------------------------
// RecordingConfig
// ---------------------------------------------------------------------------

/// Settings for pronunciation recording.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordingConfig {
    /// Shortest clip worth scoring, in milliseconds.  Anything shorter is
    /// discarded as an accidental tap.
    pub min_ms: u64,
    /// Hard recording limit in milliseconds; capture stops automatically.
    pub max_ms: u64,
    /// Countdown tick interval in milliseconds.
    pub tick_ms: u64,
    /// Capture codecs in preference order; the first one the device supports
    /// wins.
    pub codec_preferences: Vec<AudioCodec>,
}

impl Default for RecordingConfig {
    fn default() -> Self {
        Self {
            min_ms: MIN_RECORDING_MS,
            max_ms: MAX_RECORDING_MS,
            tick_ms: TICK_MS,
            codec_preferences: vec![AudioCodec::WavPcm16, AudioCodec::RawPcm16],
        }
    }
}

// ---------------------------------------------------------------------------
// ScoringConfig
// ---------------------------------------------------------------------------

/// Settings for judging a recorded attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoringConfig {
    /// How the judging turn decides pass or fail.
    pub mode: ScoringMode,
    /// Pass threshold for [`ScoringMode::Similarity`], in percent.
    pub similarity_threshold: f64,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            mode: ScoringMode::default(),
            similarity_threshold: 95.0,
        }
    }
}

// ---------------------------------------------------------------------------
// SpeechConfig
// ---------------------------------------------------------------------------

/// Settings for spoken playback of the target word.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechConfig {
    /// Whether the speak gesture is offered at all.
    pub enabled: bool,
}

impl Default for SpeechConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

// ---------------------------------------------------------------------------
// AppConfig  (top-level)
// ---------------------------------------------------------------------------

/// Top-level application configuration, serialised as `settings.toml`.
///
/// # Persistence
///
/// ```rust,no_run
/// use phonaify::config::AppConfig;
///
/// // Load (returns Default when file is missing)
/// let config = AppConfig::load().unwrap();
///
/// // Modify and save
/// // config.save().unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Scoring model backend settings.
    pub model: ModelConfig,
    /// Pronunciation recording settings.
    pub recording: RecordingConfig,
    /// Attempt judging settings.
    pub scoring: ScoringConfig,
    /// Spoken playback settings.
    pub speech: SpeechConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            recording: RecordingConfig::default(),
            scoring: ScoringConfig::default(),
            speech: SpeechConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the platform-appropriate `settings.toml`.
    ///
    /// Returns `Ok(AppConfig::default())` when the file does not exist yet
    /// (first-run scenario) so callers never need to special-case a missing
    /// file.
    pub fn load() -> Result<Self> {
        Self::load_from(&AppPaths::new().settings_file)
    }

    /// Load from an explicit path (useful for tests).
    pub fn load_from(path: &std::path::Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to the platform-appropriate `settings.toml`,
    /// creating parent directories as needed.
    pub fn save(&self) -> Result<()> {
        self.save_to(&AppPaths::new().settings_file)
    }

    /// Save to an explicit path (useful for tests).
    pub fn save_to(&self, path: &std::path::Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
