use anyhow::Result;
use regex::Regex;
use std::borrow::Cow;
use std::sync::LazyLock;
use tracing::warn;

/// Splits article text into sentences, in reading order.
pub trait Tokenizer: Send + Sync {
    fn tokenize(&self, text: &str) -> Result<Vec<String>>;
}

static PARAGRAPH_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n\s*\n").unwrap());

/// Words that end in a period without ending the sentence.
const ABBREVIATIONS: &[&str] = &[
    "mr", "mrs", "ms", "dr", "st", "jr", "sr", "gov", "sen", "rep", "gen", "lt", "col", "sgt",
    "capt", "prof", "rev", "hon", "inc", "co", "corp", "ltd", "vs", "no", "mt", "ft", "jan",
    "feb", "mar", "apr", "aug", "sept", "sep", "oct", "nov", "dec", "u.s", "u.k", "u.n", "e.g",
    "i.e", "a.m", "p.m", "etc",
];

/// Punctuation-driven sentence splitter.
///
/// A sentence ends at `.`, `!`, `?` or `…` (plus any closing quotes or
/// brackets) when the next word starts a new sentence: an uppercase letter,
/// a digit or an opening quote. Blank lines always end a sentence. Quoted
/// speech that continues after the attribution (`"Wait," she said, "no."`)
/// stays in one sentence because the attribution starts lowercase.
#[derive(Debug, Clone, Default)]
pub struct SentenceSplitter;

impl Tokenizer for SentenceSplitter {
    fn tokenize(&self, text: &str) -> Result<Vec<String>> {
        let stray = text.chars().filter(|c| is_stray_control(*c)).count();
        let text: Cow<str> = if stray == 0 {
            Cow::Borrowed(text)
        } else {
            warn!(stray, "dropping control characters from article text");
            Cow::Owned(text.chars().filter(|c| !is_stray_control(*c)).collect())
        };

        let mut sentences = Vec::new();
        for paragraph in PARAGRAPH_RE.split(&text) {
            split_paragraph(paragraph, &mut sentences);
        }
        Ok(sentences)
    }
}

fn is_stray_control(c: char) -> bool {
    c.is_control() && !c.is_whitespace()
}

fn is_terminator(c: char) -> bool {
    matches!(c, '.' | '!' | '?' | '\u{2026}')
}

fn is_closer(c: char) -> bool {
    matches!(c, '"' | '\'' | '\u{201D}' | '\u{2019}' | ')' | ']')
}

fn starts_sentence(c: char) -> bool {
    c.is_uppercase() || c.is_numeric() || matches!(c, '"' | '\'' | '\u{201C}' | '\u{2018}' | '(')
}

/// The word right before a period at `end`, e.g. "Mr" in "Mr. Smith".
fn is_abbreviation(chars: &[(usize, char)], end: usize) -> bool {
    let mut start = end;
    while start > 0 {
        let c = chars[start - 1].1;
        if c.is_alphabetic() || c == '.' {
            start -= 1;
        } else {
            break;
        }
    }

    let word: String = chars[start..end]
        .iter()
        .map(|&(_, c)| c)
        .collect::<String>()
        .trim_matches('.')
        .to_lowercase();

    // Initials such as "J. Smith".
    if word.chars().count() == 1 {
        return true;
    }
    ABBREVIATIONS.contains(&word.as_str())
}

fn split_paragraph(paragraph: &str, sentences: &mut Vec<String>) {
    let chars: Vec<(usize, char)> = paragraph.char_indices().collect();
    let byte_at = |i: usize| chars.get(i).map(|&(b, _)| b).unwrap_or(paragraph.len());

    let mut start = 0;
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i].1;
        if !is_terminator(c) {
            i += 1;
            continue;
        }

        let mut end = i + 1;
        while end < chars.len() && is_terminator(chars[end].1) {
            end += 1;
        }
        while end < chars.len() && is_closer(chars[end].1) {
            end += 1;
        }

        let mut next = end;
        while next < chars.len() && chars[next].1.is_whitespace() {
            next += 1;
        }

        let boundary = next > end
            && next < chars.len()
            && starts_sentence(chars[next].1)
            && !(c == '.' && end == i + 1 && is_abbreviation(&chars, i));

        if boundary {
            push_sentence(&paragraph[byte_at(start)..byte_at(end)], sentences);
            start = next;
        }
        i = end.max(i + 1);
    }

    push_sentence(&paragraph[byte_at(start)..], sentences);
}

fn push_sentence(sentence: &str, sentences: &mut Vec<String>) {
    let sentence = sentence.trim();
    if !sentence.is_empty() {
        sentences.push(sentence.to_string());
    }
}
