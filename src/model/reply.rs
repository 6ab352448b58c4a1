//! Lenient decoding of model replies.
//!
//! Schema-constrained queries *usually* come back as clean JSON, but
//! models also wrap objects in code fences, preface them with prose, or
//! ignore the schema entirely.  [`parse`] climbs a ladder instead of
//! failing:
//!
//! 1. the trimmed reply as-is,
//! 2. the reply with a Markdown code fence stripped,
//! 3. the widest `{ ... }` span embedded in the text,
//! 4. give up and hand back the raw text as [`ModelReply::RawFallback`].
//!
//! Callers decide what a raw fallback means: the definition flow renders it
//! as a plain-text card, the scoring flow degrades to a conservative
//! verdict.  A malformed reply is never an error by itself.

use std::sync::OnceLock;

use regex::Regex;
use serde::de::DeserializeOwned;

/// Outcome of decoding one model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelReply<T> {
    /// The reply matched the expected shape.
    Parsed(T),
    /// Nothing parseable; the trimmed reply text, for degraded handling.
    RawFallback(String),
}

/// Decode `raw` into `T`, trying progressively messier shapes.
pub fn parse<T: DeserializeOwned>(raw: &str) -> ModelReply<T> {
    let trimmed = raw.trim();

    if let Ok(value) = serde_json::from_str::<T>(trimmed) {
        return ModelReply::Parsed(value);
    }

    let unfenced = strip_code_fence(trimmed);
    if unfenced != trimmed {
        if let Ok(value) = serde_json::from_str::<T>(unfenced) {
            return ModelReply::Parsed(value);
        }
    }

    if let Some(object) = embedded_object(trimmed) {
        if let Ok(value) = serde_json::from_str::<T>(object) {
            return ModelReply::Parsed(value);
        }
    }

    ModelReply::RawFallback(trimmed.to_string())
}

/// Remove a surrounding Markdown code fence, including any info string on
/// the opening line.  Returns the input unchanged when there is no fence.
fn strip_code_fence(text: &str) -> &str {
    let Some(after_fence) = text.strip_prefix("```") else {
        return text;
    };
    let Some((_, body)) = after_fence.split_once('\n') else {
        return text;
    };
    let body = body.trim_end();
    let body = body.strip_suffix("```").unwrap_or(body);
    body.trim()
}

/// The widest `{ ... }` span in `text`, if any.
fn embedded_object(text: &str) -> Option<&str> {
    static OBJECT: OnceLock<Regex> = OnceLock::new();
    let re = OBJECT.get_or_init(|| Regex::new(r"\{[\s\S]*\}").expect("hardcoded regex"));
    re.find(text).map(|m| m.as_str())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize, PartialEq)]
    struct Score {
        similarity: f64,
    }

    #[test]
    fn clean_json_parses_directly() {
        let reply = parse::<Score>(r#"{ "similarity": 97.5 }"#);
        assert_eq!(reply, ModelReply::Parsed(Score { similarity: 97.5 }));
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        let reply = parse::<Score>("\n  { \"similarity\": 10 }  \n");
        assert_eq!(reply, ModelReply::Parsed(Score { similarity: 10.0 }));
    }

    #[test]
    fn fenced_json_with_info_string_parses() {
        let raw = "```json\n{ \"similarity\": 88 }\n```";
        assert_eq!(
            parse::<Score>(raw),
            ModelReply::Parsed(Score { similarity: 88.0 })
        );
    }

    #[test]
    fn fenced_json_without_info_string_parses() {
        let raw = "```\n{ \"similarity\": 42 }\n```";
        assert_eq!(
            parse::<Score>(raw),
            ModelReply::Parsed(Score { similarity: 42.0 })
        );
    }

    #[test]
    fn object_embedded_in_prose_is_extracted() {
        let raw = "Sure! Here is the score you asked for: { \"similarity\": 61 } Hope that helps.";
        assert_eq!(
            parse::<Score>(raw),
            ModelReply::Parsed(Score { similarity: 61.0 })
        );
    }

    #[test]
    fn wrong_shape_falls_back_to_raw_text() {
        let raw = "the word sounds mostly right";
        assert_eq!(
            parse::<Score>(raw),
            ModelReply::RawFallback("the word sounds mostly right".into())
        );
    }

    #[test]
    fn json_of_wrong_type_falls_back() {
        // Valid JSON, but not the expected object.
        let reply = parse::<Score>(r#"[1, 2, 3]"#);
        assert_eq!(reply, ModelReply::RawFallback("[1, 2, 3]".into()));
    }

    #[test]
    fn fallback_preserves_trimmed_text() {
        let reply = parse::<Score>("   some prose   ");
        assert_eq!(reply, ModelReply::RawFallback("some prose".into()));
    }

    #[test]
    fn empty_reply_falls_back_to_empty_text() {
        assert_eq!(parse::<Score>(""), ModelReply::RawFallback(String::new()));
    }

    // ---- helpers ------------------------------------------------------------

    #[test]
    fn strip_code_fence_leaves_plain_text_alone() {
        assert_eq!(strip_code_fence("no fence here"), "no fence here");
    }

    #[test]
    fn embedded_object_spans_first_to_last_brace() {
        let found = embedded_object("a {x} b {y} c").unwrap();
        assert_eq!(found, "{x} b {y}");
    }
}
