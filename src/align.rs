//! Phonetic alignment between a reference transcription and what the
//! learner actually said.
//!
//! Both inputs are plain strings of phonetic symbols (IPA, usually).  The
//! engine computes a **longest common subsequence** over Unicode scalar
//! values and then classifies every symbol of the *reference* string:
//!
//! * symbols that are part of the LCS are **matched**: the learner produced
//!   them in order;
//! * symbols that are not are **mismatched**: dropped or mangled sounds.
//!
//! The hypothesis string only steers the match; the result always has
//! exactly one entry per reference symbol, in reference order, so callers
//! can render the reference transcription with trouble spots highlighted.
//!
//! Whitespace in the reference is never flagged: a pause is not a
//! pronunciation error.

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// One reference symbol together with the verdict for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SymbolMatch {
    /// The phonetic symbol (one Unicode scalar value).
    pub symbol: char,
    /// `true` if the learner produced this symbol (or it is whitespace).
    pub matched: bool,
}

/// Per-symbol alignment of a reference transcription, in reference order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlignmentResult {
    symbols: Vec<SymbolMatch>,
}

impl AlignmentResult {
    /// All reference symbols with their verdicts, in order.
    pub fn symbols(&self) -> &[SymbolMatch] {
        &self.symbols
    }

    /// Number of reference symbols.
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// `true` when the reference string was empty.
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// `true` when no symbol was flagged (perfect rendition).
    pub fn all_matched(&self) -> bool {
        self.symbols.iter().all(|s| s.matched)
    }

    /// Number of symbols the learner missed.
    pub fn mismatch_count(&self) -> usize {
        self.symbols.iter().filter(|s| !s.matched).count()
    }
}

// ---------------------------------------------------------------------------
// strip_delimiters / align
// ---------------------------------------------------------------------------

/// Strip the `/.../` or `[...]` notation delimiters a transcription usually
/// arrives in, leaving only the phonetic symbols.
///
/// ```rust
/// use phonaify::align::strip_delimiters;
///
/// assert_eq!(strip_delimiters("/kæt/"), "kæt");
/// assert_eq!(strip_delimiters("[ˈwɔ.tɚ] "), "ˈwɔ.tɚ");
/// assert_eq!(strip_delimiters("kæt"), "kæt");
/// ```
pub fn strip_delimiters(ipa: &str) -> &str {
    ipa.trim()
        .trim_matches(|c| matches!(c, '/' | '[' | ']'))
        .trim()
}

/// Align `hypothesis` against `reference` and classify every reference
/// symbol as matched or mismatched.
///
/// * If either side is empty, every reference symbol is reported as matched
///   (nothing to compare against is not the learner's fault).
/// * Whitespace symbols are always reported as matched.
/// * Comparison is per Unicode scalar value, so multi-byte IPA symbols such
///   as `ʃ` or `ʌ` count as single symbols.
///
/// # Example
///
/// ```rust
/// use phonaify::align::align;
///
/// let result = align("kat", "kap");
/// let flagged: Vec<char> = result
///     .symbols()
///     .iter()
///     .filter(|s| !s.matched)
///     .map(|s| s.symbol)
///     .collect();
/// assert_eq!(flagged, vec!['t']);
/// ```
pub fn align(reference: &str, hypothesis: &str) -> AlignmentResult {
    let reference: Vec<char> = reference.chars().collect();
    let hypothesis: Vec<char> = hypothesis.chars().collect();

    if reference.is_empty() || hypothesis.is_empty() {
        let symbols = reference
            .into_iter()
            .map(|symbol| SymbolMatch {
                symbol,
                matched: true,
            })
            .collect();
        return AlignmentResult { symbols };
    }

    let n = reference.len();
    let m = hypothesis.len();

    // LCS length table: table[i][j] = LCS of reference[..i] and hypothesis[..j].
    let mut table = vec![vec![0usize; m + 1]; n + 1];
    for i in 1..=n {
        for j in 1..=m {
            table[i][j] = if reference[i - 1] == hypothesis[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }

    // Backtrack from the bottom-right corner, marking reference symbols that
    // belong to the common subsequence.  On ties we walk the reference axis,
    // which flags the earliest possible occurrence of a dropped symbol.
    let mut matched = vec![false; n];
    let mut i = n;
    let mut j = m;
    while i > 0 && j > 0 {
        if reference[i - 1] == hypothesis[j - 1] {
            matched[i - 1] = true;
            i -= 1;
            j -= 1;
        } else if table[i - 1][j] >= table[i][j - 1] {
            i -= 1;
        } else {
            j -= 1;
        }
    }

    let symbols = reference
        .into_iter()
        .zip(matched)
        .map(|(symbol, hit)| SymbolMatch {
            symbol,
            matched: hit || symbol.is_whitespace(),
        })
        .collect();

    AlignmentResult { symbols }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn flagged(result: &AlignmentResult) -> Vec<char> {
        result
            .symbols()
            .iter()
            .filter(|s| !s.matched)
            .map(|s| s.symbol)
            .collect()
    }

    // ---- identical and disjoint inputs -------------------------------------

    #[test]
    fn identical_strings_fully_match() {
        let result = align("dɪˈstrʌk.ʃən", "dɪˈstrʌk.ʃən");
        assert_eq!(result.len(), "dɪˈstrʌk.ʃən".chars().count());
        assert!(result.all_matched());
    }

    #[test]
    fn disjoint_strings_flag_every_symbol() {
        let result = align("abc", "xyz");
        assert_eq!(result.mismatch_count(), 3);
        assert_eq!(flagged(&result), vec!['a', 'b', 'c']);
    }

    #[test]
    fn single_substitution_flags_only_that_symbol() {
        let result = align("kat", "kap");
        assert_eq!(flagged(&result), vec!['t']);
    }

    #[test]
    fn dropped_middle_symbol_is_flagged() {
        // Learner said "kt" for "kat"; the vowel is missing.
        let result = align("kat", "kt");
        assert_eq!(flagged(&result), vec!['a']);
    }

    #[test]
    fn extra_hypothesis_symbols_do_not_flag_reference() {
        // Learner inserted sounds; every reference symbol was still produced.
        let result = align("kat", "kxaxt");
        assert!(result.all_matched());
    }

    // ---- empty sides --------------------------------------------------------

    #[test]
    fn empty_hypothesis_matches_everything() {
        let result = align("kat", "");
        assert_eq!(result.len(), 3);
        assert!(result.all_matched());
    }

    #[test]
    fn empty_reference_yields_empty_result() {
        let result = align("", "kat");
        assert!(result.is_empty());
        assert!(result.all_matched());
    }

    #[test]
    fn both_empty_yields_empty_result() {
        let result = align("", "");
        assert!(result.is_empty());
    }

    // ---- whitespace ----------------------------------------------------------

    #[test]
    fn whitespace_is_never_flagged() {
        // The space is not in the hypothesis but must not be reported missing.
        let result = align("ka t", "kat");
        assert!(result.all_matched());
    }

    #[test]
    fn whitespace_matched_even_when_everything_else_fails() {
        let result = align("a b", "xyz");
        assert_eq!(flagged(&result), vec!['a', 'b']);
        assert!(result.symbols()[1].matched);
        assert_eq!(result.symbols()[1].symbol, ' ');
    }

    // ---- unicode symbols -----------------------------------------------------

    #[test]
    fn multibyte_ipa_symbols_are_single_units() {
        // "ʃən" vs "ʃun": only the vowel differs.
        let result = align("ʃən", "ʃun");
        assert_eq!(flagged(&result), vec!['ə']);
    }

    #[test]
    fn stress_marks_participate_like_any_symbol() {
        // Missing primary stress mark ˈ is flagged.
        let result = align("ˈkat", "kat");
        assert_eq!(flagged(&result), vec!['ˈ']);
    }

    // ---- ordering -----------------------------------------------------------

    #[test]
    fn out_of_order_symbols_are_not_all_matched() {
        // LCS of "abc" and "cba" has length 1, so two symbols get flagged.
        let result = align("abc", "cba");
        assert_eq!(result.mismatch_count(), 2);
    }

    #[test]
    fn repeated_symbols_resolve_along_reference_axis() {
        // "aab" vs "ab": one of the two 'a's is flagged, the LCS ("ab") keeps
        // the rest matched.
        let result = align("aab", "ab");
        assert_eq!(result.mismatch_count(), 1);
        assert_eq!(flagged(&result), vec!['a']);
    }

    #[test]
    fn result_preserves_reference_order() {
        let result = align("kat", "tak");
        let symbols: Vec<char> = result.symbols().iter().map(|s| s.symbol).collect();
        assert_eq!(symbols, vec!['k', 'a', 't']);
    }

    // ---- strip_delimiters ---------------------------------------------------

    #[test]
    fn slash_and_bracket_delimiters_are_stripped() {
        assert_eq!(strip_delimiters("/dɪˈstɹʌkʃən/"), "dɪˈstɹʌkʃən");
        assert_eq!(strip_delimiters("[kæt]"), "kæt");
        assert_eq!(strip_delimiters("  /kæt/  "), "kæt");
    }

    #[test]
    fn bare_transcriptions_pass_through() {
        assert_eq!(strip_delimiters("kæt"), "kæt");
        assert_eq!(strip_delimiters(""), "");
    }

    #[test]
    fn interior_symbols_survive_stripping() {
        // Syllable dots and stress marks are content, not notation.
        assert_eq!(strip_delimiters("/ˈwɔ.tɚ/"), "ˈwɔ.tɚ");
    }
}
