//! Prompt text for the pronunciation-practice flows.
//!
//! One shared system instruction pins the model into the coaching role;
//! the `*_query` builders produce the per-turn user text.  The two scoring
//! queries ([`transcription_query`], then [`similarity_query`] or
//! [`verdict_query`]) are written to run in the *same* chat session, so the
//! second turn can refer back to "the clip" without resending anything.
//!
//! Keep instructions terse: every query also carries a
//! [`crate::model::ResponseSchema`], so the JSON shape is enforced there
//! rather than begged for here.

// ---------------------------------------------------------------------------
// System instruction
// ---------------------------------------------------------------------------

/// Shared system instruction for every practice session.
pub const SYSTEM_PROMPT: &str = "\
You are a pronunciation coach for English learners.
You will be asked for word definitions, phonetic (IPA) transcriptions of
short audio clips, and judgements of how closely a learner's pronunciation
matches a reference.

Rules:
1. Use the International Phonetic Alphabet for all transcriptions.
2. Transcribe only what is actually audible; never guess at the intended word.
3. Keep definitions and feedback short and encouraging.
4. Reply with compact JSON matching the requested fields, with no explanation.";

// ---------------------------------------------------------------------------
// Query builders
// ---------------------------------------------------------------------------

/// Look up `word` and return the card fields.
pub fn definition_query(word: &str) -> String {
    format!(
        "Give a learner's dictionary entry for the word \"{word}\": \
         a one-sentence definition, one short example sentence, the IPA \
         transcription wrapped in slashes (like /dɪˈstrʌk.ʃən/), the part \
         of speech, and up to three one-word synonyms."
    )
}

/// First scoring turn: transcribe the attached clip of the learner saying
/// `word`.
pub fn transcription_query(word: &str) -> String {
    format!(
        "The attached audio is a learner attempting to say the word \
         \"{word}\". Transcribe exactly what you hear into IPA symbols. \
         Include only sounds that are audible in the clip."
    )
}

/// Second scoring turn, similarity flavour: rate the transcriptions 0–100.
pub fn similarity_query(word: &str, target_phonetic: &str, user_phonetic: &str) -> String {
    format!(
        "For the word \"{word}\", the reference pronunciation is \
         {target_phonetic} and the learner produced {user_phonetic}. \
         Rate how similar they sound on a scale from 0 to 100, where 100 \
         is indistinguishable."
    )
}

/// Second scoring turn, verdict flavour: yes/no plus one line of coaching.
pub fn verdict_query(word: &str, target_phonetic: &str, user_phonetic: &str) -> String {
    format!(
        "For the word \"{word}\", the reference pronunciation is \
         {target_phonetic} and the learner produced {user_phonetic}. \
         Decide whether the learner's attempt counts as a correct \
         pronunciation, and give one short, encouraging line of feedback \
         naming the sound to work on if it does not."
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_prompt_pins_the_coaching_role() {
        assert!(SYSTEM_PROMPT.contains("pronunciation coach"));
        assert!(
            SYSTEM_PROMPT.contains("International Phonetic Alphabet"),
            "system prompt must demand IPA"
        );
        assert!(
            SYSTEM_PROMPT.contains("JSON"),
            "system prompt must demand JSON replies"
        );
    }

    #[test]
    fn system_prompt_forbids_guessing() {
        assert!(
            SYSTEM_PROMPT.contains("never guess"),
            "transcription must reflect the audio, not the expected word"
        );
    }

    #[test]
    fn definition_query_embeds_the_word() {
        let q = definition_query("destruction");
        assert!(q.contains("\"destruction\""));
        assert!(q.contains("IPA"), "must ask for the phonetic transcription");
        assert!(q.contains("synonyms"));
        assert!(q.contains("part"), "must ask for the part of speech");
    }

    #[test]
    fn transcription_query_points_at_the_audio() {
        let q = transcription_query("cat");
        assert!(q.contains("attached audio"));
        assert!(q.contains("\"cat\""));
        assert!(q.contains("audible"), "must restrict to audible sounds");
    }

    #[test]
    fn similarity_query_carries_both_transcriptions() {
        let q = similarity_query("cat", "/kæt/", "/kɑt/");
        assert!(q.contains("/kæt/"));
        assert!(q.contains("/kɑt/"));
        assert!(q.contains("0 to 100"));
    }

    #[test]
    fn verdict_query_asks_for_feedback() {
        let q = verdict_query("cat", "/kæt/", "/kɑt/");
        assert!(q.contains("/kæt/"));
        assert!(q.contains("/kɑt/"));
        assert!(q.contains("feedback"));
    }
}
