//! Sentence classification and quote normalization.
//!
//! Everything here is a pure string transform: no I/O and no shared mutable
//! state, so each rule can be checked against literal sentences.

use regex::Regex;
use std::sync::LazyLock;

/// Hard length limit of a composed post.
pub const POST_LENGTH: usize = 140;
/// Length the speaker marker emoji costs in a post.
pub const MARKER_LENGTH: usize = 2;
/// Share of the post budget a single quote may use.
pub const LENGTH_MARGIN: f64 = 0.8;
/// Shortest acceptable quote, measured against this phrase.
pub const MIN_REFERENCE: &str = "\"OK\", she said.";

pub const FEMALE_MARKER: &str = "👩";
pub const MALE_MARKER: &str = "👨";

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static SAID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)said").unwrap());
static FEMALE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bshe\s+said\b").unwrap());
static MALE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bhe\s+said\b").unwrap());

// `"Half one," he said, "half two."` joins the halves around the attribution.
static COMPOUND_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)['"]?[,\s]*\b(?:she|he)\s+said,?\s*['"]"#).unwrap()
});
static TAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)[,\s]*\b(?:she|he)\s+said[.,]?\s*$").unwrap());
static DANGLING_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"(['"])[,. -]+$"#).unwrap());
static LEAD_DOUBLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"^\s*"+\s*"#).unwrap());
static TRAIL_DOUBLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"\s*"*,*"+\s*$"#).unwrap());
static LEAD_SINGLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^\s*'+\s*").unwrap());
static TRAIL_SINGLE_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s*'*,*'+\s*$").unwrap());
static ELLIPSIS_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.{2,3}").unwrap());

/// Post lengths are counted in UTF-16 code units, which is how the emoji
/// markers come to cost two characters each.
pub fn text_length(text: &str) -> usize {
    text.encode_utf16().count()
}

/// Longest quote that still leaves room for a marker and the second line.
pub fn max_quote_length() -> usize {
    ((POST_LENGTH - MARKER_LENGTH) as f64 * LENGTH_MARGIN).floor() as usize
}

/// Which bucket a sentence feeds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Speaker {
    Female,
    Male,
}

impl Speaker {
    pub fn marker(self) -> &'static str {
        match self {
            Speaker::Female => FEMALE_MARKER,
            Speaker::Male => MALE_MARKER,
        }
    }

    /// Whether the sentence attributes speech to this speaker. The two
    /// checks are independent: one sentence may match both.
    pub fn matches(self, sentence: &str) -> bool {
        match self {
            Speaker::Female => FEMALE_RE.is_match(sentence),
            Speaker::Male => MALE_RE.is_match(sentence),
        }
    }
}

/// Cheap pre-filter run before classification.
pub fn mentions_said(sentence: &str) -> bool {
    SAID_RE.is_match(sentence)
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Counts quotation marks of kind `mark`, ignoring ones sitting between two
/// word characters (`don't`, `it's`).
pub fn count_quotes(text: &str, mark: char) -> usize {
    let chars: Vec<char> = text.chars().collect();
    chars
        .iter()
        .enumerate()
        .filter(|&(i, &c)| {
            if c != mark {
                return false;
            }
            let before = i.checked_sub(1).and_then(|j| chars.get(j)).copied();
            let after = chars.get(i + 1).copied();
            !matches!((before, after), (Some(b), Some(a)) if is_word_char(b) && is_word_char(a))
        })
        .count()
}

pub fn has_balanced_quotes(text: &str) -> bool {
    count_quotes(text, '"') % 2 == 0 && count_quotes(text, '\'') % 2 == 0
}

/// Folds typographic quotes to ASCII and collapses whitespace runs.
pub fn clean(sentence: &str) -> String {
    let folded: String = sentence
        .chars()
        .map(|c| match c {
            '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{00AB}' | '\u{00BB}' => '"',
            '\u{2018}' | '\u{2019}' | '\u{201A}' => '\'',
            other => other,
        })
        .collect();
    WHITESPACE_RE.replace_all(&folded, " ").trim().to_string()
}

/// Removes the "she said"/"he said" attribution and the quoting around the
/// spoken words.
pub fn unquote(sentence: &str) -> String {
    let mut modified = if COMPOUND_RE.is_match(sentence) {
        COMPOUND_RE.replacen(sentence, 1, " ").into_owned()
    } else {
        TAIL_RE.replace(sentence, "").into_owned()
    };

    modified = DANGLING_RE.replace(&modified, "${1}").into_owned();

    for mark in ['\'', '"'] {
        modified = unwrap_pair(&modified, mark);
    }

    if count_quotes(&modified, '"') == 1 {
        modified = LEAD_DOUBLE_RE.replace(&modified, "").into_owned();
        modified = TRAIL_DOUBLE_RE.replace(&modified, "").into_owned();
    }

    if count_quotes(&modified, '\'') == 1 {
        modified = LEAD_SINGLE_RE.replace(&modified, "").into_owned();
        modified = TRAIL_SINGLE_RE.replace(&modified, "").into_owned();
    }

    modified
        .trim_matches(|c: char| c == ',' || c.is_whitespace())
        .to_string()
}

/// Strips the outer pair only when no other quote of that kind sits inside.
fn unwrap_pair(text: &str, mark: char) -> String {
    let mut chars = text.chars();
    if chars.next() != Some(mark) || chars.next_back() != Some(mark) {
        return text.to_string();
    }
    let inner = chars.as_str();
    if count_quotes(inner, mark) == 0 {
        inner.to_string()
    } else {
        text.to_string()
    }
}

/// Ellipsis, no final period, leading capital.
pub fn polish(sentence: &str) -> String {
    let compressed = ELLIPSIS_RE.replace_all(sentence, "\u{2026}");
    let trimmed = compressed.strip_suffix('.').unwrap_or(&compressed);
    capitalize(trimmed)
}

fn capitalize(sentence: &str) -> String {
    let mut chars = sentence.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Turns raw sentences into quotes, rejecting ones that break the length or
/// quote-balance rules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Normalizer {
    pub min_length: usize,
    pub max_length: usize,
    pub cosmetic: bool,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self {
            min_length: text_length(MIN_REFERENCE),
            max_length: max_quote_length(),
            cosmetic: false,
        }
    }
}

impl Normalizer {
    pub fn with_cosmetic(mut self, cosmetic: bool) -> Self {
        self.cosmetic = cosmetic;
        self
    }

    pub fn normalize(&self, raw: &str) -> Option<String> {
        let mut quote = unquote(&clean(raw));
        // Polishing shortens the quote, so it happens before the checks
        if self.cosmetic {
            quote = polish(&quote);
        }

        if !has_balanced_quotes(&quote) {
            return None;
        }

        let length = text_length(&quote);
        if length < self.min_length || length > self.max_length {
            return None;
        }

        Some(quote)
    }

    /// Normalizes a batch, keeping survivors in input order.
    pub fn normalize_all<'a, I>(&self, sentences: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a String>,
    {
        sentences
            .into_iter()
            .filter_map(|s| self.normalize(s))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unquote_fixtures() {
        let sentences = [
            (
                "\"I don't know,\" he said, \"maybe it's fate.\"",
                "I don't know, maybe it's fate.",
            ),
            ("\"blah bleh\", she said, \"bluh bloh\".", "blah bleh bluh bloh"),
            ("\"Blah blah blah\", he said.", "Blah blah blah"),
        ];

        for (input, expected) in sentences {
            assert_eq!(unquote(input), expected, "unquoting {}", input);
            assert_eq!(
                Normalizer::default().normalize(input).as_deref(),
                if text_length(expected) >= 15 { Some(expected) } else { None },
            );
        }
    }

    #[test]
    fn test_clean_collapses_every_whitespace_run() {
        assert_eq!(clean("  \"We  will\n\tsee,\"   she said. "), "\"We will see,\" she said.");
    }

    #[test]
    fn test_clean_folds_typographic_quotes() {
        assert_eq!(
            clean("\u{201C}It\u{2019}s over,\u{201D} she said."),
            "\"It's over,\" she said."
        );
    }

    #[test]
    fn test_tail_attribution_without_comma() {
        assert_eq!(unquote("\"We are not going anywhere\" she said"), "We are not going anywhere");
    }

    #[test]
    fn test_dangling_punctuation_after_quote() {
        assert_eq!(unquote("He called it \"a disaster\" ."), "He called it \"a disaster\"");
    }

    #[test]
    fn test_single_quoted_sentence_is_unwrapped() {
        assert_eq!(unquote("'We did everything right,' she said."), "We did everything right");
    }

    #[test]
    fn test_nested_quotes_keep_outer_pair() {
        let text = "\"a\" and \"b\"";
        assert_eq!(unquote(text), text);
    }

    #[test]
    fn test_lone_trailing_double_quote_is_dropped() {
        assert_eq!(
            unquote("The market will recover soon,\" he said."),
            "The market will recover soon"
        );
    }

    #[test]
    fn test_lone_leading_single_quote_is_dropped() {
        assert_eq!(unquote("'We never saw it coming"), "We never saw it coming");
    }

    #[test]
    fn test_apostrophes_are_not_quotes() {
        assert_eq!(count_quotes("don't won't it's", '\''), 0);
        assert_eq!(count_quotes("'quoted' words", '\''), 2);
        assert_eq!(count_quotes("the players' union", '\''), 1);
    }

    #[test]
    fn test_unbalanced_quotes_are_rejected() {
        let normalizer = Normalizer::default();
        assert_eq!(
            normalizer.normalize("He called the plan \"reckless and \"dangerous\" she said."),
            None
        );
    }

    #[test]
    fn test_length_bounds() {
        let normalizer = Normalizer::default();
        assert_eq!(normalizer.min_length, 15);
        assert_eq!(normalizer.max_length, 110);

        assert_eq!(normalizer.normalize("\"Sure,\" she said."), None);

        let long = format!("\"{}\", he said.", "word ".repeat(30).trim());
        assert_eq!(normalizer.normalize(&long), None);

        let fits = format!("\"{}\", he said.", "a".repeat(110));
        assert_eq!(normalizer.normalize(&fits).map(|q| q.len()), Some(110));
    }

    #[test]
    fn test_cosmetic_pass() {
        let normalizer = Normalizer::default().with_cosmetic(true);
        assert_eq!(
            normalizer.normalize("\"well... we will see what happens.\" she said."),
            Some("Well\u{2026} we will see what happens".to_string())
        );
        assert_eq!(polish("wait.. what."), "Wait\u{2026} what");
    }

    #[test]
    fn test_cosmetic_quotes_keep_minimum_length() {
        let normalizer = Normalizer::default().with_cosmetic(true);

        // 15 characters only while the final period is there
        assert_eq!(normalizer.normalize("\"Abcd efgh ijkl.\", she said."), None);

        let once = normalizer
            .normalize("\"Abcd efgh ijklm.\", she said.")
            .expect("first pass");
        assert_eq!(once, "Abcd efgh ijklm");
        assert!(text_length(&once) >= normalizer.min_length);
        assert_eq!(normalizer.normalize(&once).as_deref(), Some(once.as_str()));
    }

    #[test]
    fn test_survivors_have_balanced_quotes() {
        let normalizer = Normalizer::default();
        let sentences = [
            "\"I don't know,\" he said, \"maybe it's fate.\"",
            "She said the \"plan\" was fine and nobody objected to it.",
            "\"Nobody 'really' knows what comes next,\" he said.",
            "\"It's \"complicated\" now, she said.",
            "\"We will rebuild,\" she said, \"and we will be stronger.",
            "He said: 'the vote is tomorrow and we are ready'.",
        ];

        for sentence in sentences {
            if let Some(quote) = normalizer.normalize(sentence) {
                assert_eq!(count_quotes(&quote, '"') % 2, 0, "{}", quote);
                assert_eq!(count_quotes(&quote, '\'') % 2, 0, "{}", quote);
            }
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let normalizer = Normalizer::default();
        let sentences = [
            "\"I don't know,\" he said, \"maybe it's fate.\"",
            "\"blah bleh\", she said, \"bluh bloh\".",
            "\"Nobody 'really' knows what comes next,\" he said.",
            "  \"We  are   staying   right here,\"  she said. ",
        ];

        for sentence in sentences {
            let once = normalizer.normalize(sentence).expect("first pass");
            assert_eq!(normalizer.normalize(&once).as_deref(), Some(once.as_str()));
        }
    }

    #[test]
    fn test_speaker_classification() {
        assert!(Speaker::Female.matches("\"Yes,\" she said."));
        assert!(!Speaker::Male.matches("\"Yes,\" she said."));
        assert!(Speaker::Male.matches("\"No,\" HE SAID."));
        assert!(!Speaker::Male.matches("\"No,\" the said."));
        assert!(!Speaker::Female.matches("\"No,\" she saidx."));
    }

    #[test]
    fn test_sentence_can_match_both_speakers() {
        let sentence = "\"He said no,\" she said.";
        assert!(Speaker::Female.matches(sentence));
        assert!(Speaker::Male.matches(sentence));
    }

    #[test]
    fn test_mentions_said() {
        assert!(mentions_said("They SAID nothing"));
        assert!(!mentions_said("They spoke"));
    }

    #[test]
    fn test_marker_costs_two() {
        assert_eq!(text_length(FEMALE_MARKER), MARKER_LENGTH);
        assert_eq!(text_length(MALE_MARKER), MARKER_LENGTH);
    }
}
