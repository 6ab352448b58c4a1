//! The word card: definition, example, phonetics, part of speech, synonyms.
//!
//! [`DefinitionRecord`] doubles as the wire type: field names follow the
//! JSON the model is asked for (`exampleSentence`, `phoneticAlphabet`) and
//! every field is defaulted, so a partial reply still parses.  When the
//! reply is not JSON at all, [`DefinitionRecord::from_raw_text`] turns the
//! raw text into a definition-only card rather than failing the lookup.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Parts of speech the model may pick from, in schema order.
pub const PART_OF_SPEECH_TAGS: &[&str] = &[
    "noun",
    "verb",
    "adjective",
    "adverb",
    "pronoun",
    "preposition",
    "conjunction",
    "interjection",
];

// ---------------------------------------------------------------------------
// PartOfSpeech
// ---------------------------------------------------------------------------

/// Grammatical category of the looked-up word.
///
/// Anything outside the known tags deserialises to [`PartOfSpeech::Other`]
/// instead of failing the whole card.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Pronoun,
    Preposition,
    Conjunction,
    Interjection,
    #[default]
    #[serde(other)]
    Other,
}

impl fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PartOfSpeech::Noun => "noun",
            PartOfSpeech::Verb => "verb",
            PartOfSpeech::Adjective => "adjective",
            PartOfSpeech::Adverb => "adverb",
            PartOfSpeech::Pronoun => "pronoun",
            PartOfSpeech::Preposition => "preposition",
            PartOfSpeech::Conjunction => "conjunction",
            PartOfSpeech::Interjection => "interjection",
            PartOfSpeech::Other => "other",
        };
        f.write_str(label)
    }
}

// ---------------------------------------------------------------------------
// DefinitionRecord
// ---------------------------------------------------------------------------

/// One looked-up word, ready to render as a card.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionRecord {
    /// Short dictionary-style definition.
    #[serde(default)]
    pub definition: String,

    /// One sentence using the word.
    #[serde(default)]
    pub example_sentence: String,

    /// Reference phonetic transcription, e.g. `/dɪˈstrʌk.ʃən/`.
    #[serde(default, rename = "phoneticAlphabet")]
    pub phonetic: String,

    /// Grammatical category.
    #[serde(default, rename = "partsOfSpeech")]
    pub part_of_speech: PartOfSpeech,

    /// Up to three synonym chips.
    #[serde(default)]
    pub synonyms: Vec<String>,
}

impl DefinitionRecord {
    /// Build a definition-only card from an unstructured model reply.
    pub fn from_raw_text(text: &str) -> Self {
        Self {
            definition: text.trim().to_string(),
            ..Self::default()
        }
    }

    /// Trim every field and cap the synonyms at three non-empty entries.
    pub fn sanitized(mut self) -> Self {
        self.definition = self.definition.trim().to_string();
        self.example_sentence = self.example_sentence.trim().to_string();
        self.phonetic = self.phonetic.trim().to_string();
        self.synonyms = self
            .synonyms
            .into_iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .take(3)
            .collect();
        self
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
