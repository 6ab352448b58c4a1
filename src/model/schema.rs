//! Typed response schemas for constrained model output.
//!
//! Every structured query ships a [`ResponseSchema`] describing the JSON
//! object the model must produce: which fields, their kinds, character
//! caps, and enum choices.  The schema is advisory (it steers sampling
//! on the backend), so replies are still validated client-side by
//! [`crate::model::reply`].
//!
//! [`to_json`] renders the schema in the Gemini `responseSchema` dialect
//! (upper-case OpenAPI type names).  Other backends can render the same
//! structure into their own constraint format.
//!
//! [`to_json`]: ResponseSchema::to_json

use serde_json::{json, Map, Value};

use crate::model::definition::PART_OF_SPEECH_TAGS;

// ---------------------------------------------------------------------------
// FieldKind / ResponseSchema
// ---------------------------------------------------------------------------

/// Kind of a single schema field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Free text, optionally capped at `max_chars` characters.
    Text { max_chars: Option<u32> },
    /// A JSON number.
    Number,
    /// A JSON boolean.
    Boolean,
    /// Text restricted to one of the listed values.
    Choice(&'static [&'static str]),
    /// An array of text values.
    TextArray { max_items: u32, max_chars: Option<u32> },
}

/// An ordered set of required fields describing one JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ResponseSchema {
    fields: Vec<(&'static str, FieldKind)>,
}

impl ResponseSchema {
    /// Start an empty object schema.
    pub fn object() -> Self {
        Self::default()
    }

    /// Add a required field.  Declaration order is preserved.
    pub fn field(mut self, name: &'static str, kind: FieldKind) -> Self {
        self.fields.push((name, kind));
        self
    }

    /// Render into the Gemini `responseSchema` JSON dialect.
    pub fn to_json(&self) -> Value {
        let mut properties = Map::new();
        let mut required = Vec::with_capacity(self.fields.len());
        for (name, kind) in &self.fields {
            properties.insert((*name).to_string(), kind_json(kind));
            required.push(Value::String((*name).to_string()));
        }
        json!({
            "type": "OBJECT",
            "properties": Value::Object(properties),
            "required": Value::Array(required),
        })
    }

    // ---- Presets ----------------------------------------------------------

    /// Word-card fields: definition, example, phonetics, part of speech,
    /// synonym chips.
    pub fn definition() -> Self {
        Self::object()
            .field("definition", FieldKind::Text { max_chars: Some(80) })
            .field("exampleSentence", FieldKind::Text { max_chars: Some(90) })
            .field("phoneticAlphabet", FieldKind::Text { max_chars: Some(40) })
            .field("partsOfSpeech", FieldKind::Choice(PART_OF_SPEECH_TAGS))
            .field(
                "synonyms",
                FieldKind::TextArray {
                    max_items: 3,
                    max_chars: Some(20),
                },
            )
    }

    /// Phonetic transcription of an audio clip.
    pub fn transcription() -> Self {
        Self::object().field("phonetic", FieldKind::Text { max_chars: Some(60) })
    }

    /// Numeric similarity between two transcriptions, 0–100.
    pub fn similarity() -> Self {
        Self::object().field("similarity", FieldKind::Number)
    }

    /// Boolean match verdict plus one line of coaching feedback.
    pub fn verdict() -> Self {
        Self::object()
            .field("match", FieldKind::Boolean)
            .field("feedback", FieldKind::Text { max_chars: Some(90) })
    }
}

fn kind_json(kind: &FieldKind) -> Value {
    match kind {
        FieldKind::Text { max_chars } => {
            let mut obj = Map::new();
            obj.insert("type".into(), json!("STRING"));
            if let Some(max) = max_chars {
                obj.insert("maxLength".into(), json!(max));
            }
            Value::Object(obj)
        }
        FieldKind::Number => json!({ "type": "NUMBER" }),
        FieldKind::Boolean => json!({ "type": "BOOLEAN" }),
        FieldKind::Choice(values) => json!({ "type": "STRING", "enum": values }),
        FieldKind::TextArray {
            max_items,
            max_chars,
        } => json!({
            "type": "ARRAY",
            "items": kind_json(&FieldKind::Text { max_chars: *max_chars }),
            "maxItems": max_items,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rendered_object_lists_every_field_as_required() {
        let schema = ResponseSchema::object()
            .field("a", FieldKind::Number)
            .field("b", FieldKind::Boolean);
        let v = schema.to_json();

        assert_eq!(v["type"], "OBJECT");
        assert_eq!(v["required"], json!(["a", "b"]));
        assert_eq!(v["properties"]["a"]["type"], "NUMBER");
        assert_eq!(v["properties"]["b"]["type"], "BOOLEAN");
    }

    #[test]
    fn text_field_carries_max_length() {
        let v = ResponseSchema::object()
            .field("t", FieldKind::Text { max_chars: Some(12) })
            .to_json();
        assert_eq!(v["properties"]["t"], json!({ "type": "STRING", "maxLength": 12 }));
    }

    #[test]
    fn unbounded_text_has_no_max_length() {
        let v = ResponseSchema::object()
            .field("t", FieldKind::Text { max_chars: None })
            .to_json();
        assert_eq!(v["properties"]["t"], json!({ "type": "STRING" }));
    }

    #[test]
    fn choice_renders_as_string_enum() {
        let v = ResponseSchema::object()
            .field("c", FieldKind::Choice(&["x", "y"]))
            .to_json();
        assert_eq!(v["properties"]["c"]["type"], "STRING");
        assert_eq!(v["properties"]["c"]["enum"], json!(["x", "y"]));
    }

    #[test]
    fn array_nests_item_schema() {
        let v = ResponseSchema::object()
            .field(
                "s",
                FieldKind::TextArray {
                    max_items: 3,
                    max_chars: Some(20),
                },
            )
            .to_json();
        assert_eq!(v["properties"]["s"]["type"], "ARRAY");
        assert_eq!(v["properties"]["s"]["maxItems"], 3);
        assert_eq!(v["properties"]["s"]["items"]["maxLength"], 20);
    }

    // ---- presets ------------------------------------------------------------

    #[test]
    fn definition_preset_matches_card_fields() {
        let v = ResponseSchema::definition().to_json();
        assert_eq!(
            v["required"],
            json!([
                "definition",
                "exampleSentence",
                "phoneticAlphabet",
                "partsOfSpeech",
                "synonyms"
            ])
        );
        let tags = v["properties"]["partsOfSpeech"]["enum"].as_array().unwrap();
        assert!(tags.contains(&json!("noun")));
        assert!(tags.contains(&json!("interjection")));
    }

    #[test]
    fn transcription_preset_is_a_single_text_field() {
        let v = ResponseSchema::transcription().to_json();
        assert_eq!(v["required"], json!(["phonetic"]));
    }

    #[test]
    fn similarity_preset_is_numeric() {
        let v = ResponseSchema::similarity().to_json();
        assert_eq!(v["properties"]["similarity"]["type"], "NUMBER");
    }

    #[test]
    fn verdict_preset_has_match_and_feedback() {
        let v = ResponseSchema::verdict().to_json();
        assert_eq!(v["required"], json!(["match", "feedback"]));
        assert_eq!(v["properties"]["match"]["type"], "BOOLEAN");
    }
}
