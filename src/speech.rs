//! Spoken playback of the target word via the operating system's own
//! text-to-speech command.
//!
//! No speech engine is bundled.  Each platform already ships one:
//!
//! * **macOS**: `say`
//! * **Windows**: `System.Speech` via PowerShell
//! * **Linux**: `spd-say`, `espeak-ng` or `espeak`, tried in that order
//!
//! [`SystemSpeech`] shells out to whichever is present.  Playback blocks
//! until the word has been spoken (or the daemon has accepted it), so call
//! [`speak`](SpeechSynth::speak) from `tokio::task::spawn_blocking`.

use thiserror::Error;

// ---------------------------------------------------------------------------
// SpeechError
// ---------------------------------------------------------------------------

/// Errors that can surface during spoken playback.
#[derive(Debug, Clone, Error)]
pub enum SpeechError {
    /// No text-to-speech command was found on this system.
    #[error("no speech command available on this system")]
    NoBackend,

    /// The speech command ran but reported failure.
    #[error("speech command failed: {0}")]
    CommandFailed(String),
}

// ---------------------------------------------------------------------------
// SpeechSynth trait
// ---------------------------------------------------------------------------

/// Interface for spoken playback of a single word.
///
/// Object-safe, so the session can hold `Arc<dyn SpeechSynth>` and tests can
/// substitute [`MockSpeech`].
pub trait SpeechSynth: Send + Sync {
    /// Speak `word` aloud, blocking until playback is underway.
    fn speak(&self, word: &str) -> Result<(), SpeechError>;

    /// `true` if a speech command is present on this system.
    fn is_available(&self) -> bool;
}

// Compile-time guard: the trait must stay object-safe.
const _: fn() = || {
    fn assert_object_safe(_: &dyn SpeechSynth) {}
};

// ---------------------------------------------------------------------------
// SystemSpeech
// ---------------------------------------------------------------------------

/// [`SpeechSynth`] backed by the operating system's speech command.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemSpeech;

impl SystemSpeech {
    pub fn new() -> Self {
        Self
    }
}

impl SpeechSynth for SystemSpeech {
    fn speak(&self, word: &str) -> Result<(), SpeechError> {
        log::debug!("speech: speaking {word:?}");
        platform::speak(word)
    }

    fn is_available(&self) -> bool {
        platform::available()
    }
}

// ---------------------------------------------------------------------------
// Platform implementations
// ---------------------------------------------------------------------------

#[cfg(target_os = "macos")]
mod platform {
    use super::SpeechError;
    use std::process::Command;

    pub fn speak(word: &str) -> Result<(), SpeechError> {
        let output = Command::new("say")
            .arg(word)
            .output()
            .map_err(|e| SpeechError::CommandFailed(e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SpeechError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    // `say` ships with every macOS install.
    pub fn available() -> bool {
        true
    }
}

#[cfg(target_os = "windows")]
mod platform {
    use super::SpeechError;
    use std::process::Command;

    pub fn speak(word: &str) -> Result<(), SpeechError> {
        let script = format!(
            "Add-Type -AssemblyName System.Speech; \
             (New-Object System.Speech.Synthesis.SpeechSynthesizer).Speak('{}')",
            super::escape_single_quotes(word)
        );
        let output = Command::new("powershell")
            .args(["-NoProfile", "-Command", &script])
            .output()
            .map_err(|e| SpeechError::CommandFailed(e.to_string()))?;
        if output.status.success() {
            Ok(())
        } else {
            Err(SpeechError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).trim().to_string(),
            ))
        }
    }

    // System.Speech ships with every Windows install.
    pub fn available() -> bool {
        true
    }
}

#[cfg(target_os = "linux")]
mod platform {
    use super::SpeechError;
    use std::process::Command;

    const CANDIDATES: &[&str] = &["spd-say", "espeak-ng", "espeak"];

    pub fn speak(word: &str) -> Result<(), SpeechError> {
        for candidate in CANDIDATES {
            // A spawn error means the binary is missing; move on.
            match Command::new(candidate).arg(word).output() {
                Ok(output) if output.status.success() => return Ok(()),
                Ok(output) => {
                    return Err(SpeechError::CommandFailed(format!(
                        "{candidate}: {}",
                        String::from_utf8_lossy(&output.stderr).trim()
                    )))
                }
                Err(_) => continue,
            }
        }
        Err(SpeechError::NoBackend)
    }

    pub fn available() -> bool {
        CANDIDATES
            .iter()
            .any(|c| Command::new(c).arg("--version").output().is_ok())
    }
}

#[cfg(not(any(target_os = "macos", target_os = "windows", target_os = "linux")))]
mod platform {
    use super::SpeechError;

    pub fn speak(_word: &str) -> Result<(), SpeechError> {
        Err(SpeechError::NoBackend)
    }

    pub fn available() -> bool {
        false
    }
}

/// Escape a string for inclusion inside a PowerShell single-quoted literal.
#[allow(dead_code)]
fn escape_single_quotes(text: &str) -> String {
    text.replace('\'', "''")
}

// ---------------------------------------------------------------------------
// MockSpeech (test double)
// ---------------------------------------------------------------------------

/// Scriptable [`SpeechSynth`] for tests.  Records every spoken word.
#[cfg(test)]
pub struct MockSpeech {
    inner: std::sync::Arc<std::sync::Mutex<MockSpeechInner>>,
}

#[cfg(test)]
struct MockSpeechInner {
    spoken: Vec<String>,
    fail: Option<String>,
    available: bool,
}

#[cfg(test)]
impl MockSpeech {
    pub fn new() -> Self {
        Self {
            inner: std::sync::Arc::new(std::sync::Mutex::new(MockSpeechInner {
                spoken: Vec::new(),
                fail: None,
                available: true,
            })),
        }
    }

    /// Make every `speak` call fail with `message`.
    pub fn fail_with(&self, message: &str) {
        self.inner.lock().unwrap().fail = Some(message.to_string());
    }

    /// Report no speech command present.
    pub fn set_unavailable(&self) {
        self.inner.lock().unwrap().available = false;
    }

    /// Every word spoken so far, in order.
    pub fn spoken(&self) -> Vec<String> {
        self.inner.lock().unwrap().spoken.clone()
    }
}

#[cfg(test)]
impl Clone for MockSpeech {
    fn clone(&self) -> Self {
        Self {
            inner: std::sync::Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
impl SpeechSynth for MockSpeech {
    fn speak(&self, word: &str) -> Result<(), SpeechError> {
        let mut inner = self.inner.lock().unwrap();
        if let Some(message) = &inner.fail {
            return Err(SpeechError::CommandFailed(message.clone()));
        }
        inner.spoken.push(word.to_string());
        Ok(())
    }

    fn is_available(&self) -> bool {
        self.inner.lock().unwrap().available
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_records_spoken_words_in_order() {
        let speech = MockSpeech::new();
        speech.speak("cat").unwrap();
        speech.speak("dog").unwrap();
        assert_eq!(speech.spoken(), vec!["cat".to_string(), "dog".to_string()]);
    }

    #[test]
    fn mock_failure_records_nothing() {
        let speech = MockSpeech::new();
        speech.fail_with("engine busy");
        let err = speech.speak("cat").unwrap_err();
        assert!(matches!(err, SpeechError::CommandFailed(_)));
        assert!(speech.spoken().is_empty());
    }

    #[test]
    fn mock_availability_toggle() {
        let speech = MockSpeech::new();
        assert!(speech.is_available());
        speech.set_unavailable();
        assert!(!speech.is_available());
    }

    #[test]
    fn mock_clones_share_the_record() {
        let speech = MockSpeech::new();
        let observer = speech.clone();
        speech.speak("cat").unwrap();
        assert_eq!(observer.spoken(), vec!["cat".to_string()]);
    }

    #[test]
    fn single_quotes_are_doubled_for_powershell() {
        assert_eq!(escape_single_quotes("don't"), "don''t");
        assert_eq!(escape_single_quotes("plain"), "plain");
    }

    #[test]
    fn error_messages_read_well() {
        assert_eq!(
            SpeechError::NoBackend.to_string(),
            "no speech command available on this system"
        );
        assert_eq!(
            SpeechError::CommandFailed("say: exit 1".into()).to_string(),
            "speech command failed: say: exit 1"
        );
    }

    #[test]
    fn system_speech_probe_does_not_panic() {
        let speech = SystemSpeech::new();
        let _ = speech.is_available();
    }
}
