//! Small prose helpers shared by extractors and enrichment passes.

use once_cell::sync::Lazy;
use regex::Regex;

static INLINE_MARKUP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\*\*|__|~~|`|\*").expect("inline markup pattern"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("whitespace pattern"));
static LEADING_HASHES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*#+\s*").expect("leading hash pattern"));

/// Drop emphasis and code-span markers and collapse whitespace.
pub fn plain_text(text: &str) -> String {
    let stripped = INLINE_MARKUP.replace_all(text, "");
    WHITESPACE.replace_all(stripped.trim(), " ").into_owned()
}

/// Remove residual Markdown heading syntax: leading `#` runs and any `##`.
pub fn strip_heading_markup(text: &str) -> String {
    let mut out = LEADING_HASHES.replace(text, "").into_owned();
    while out.contains("##") {
        out = out.replace("##", "");
    }
    let out = LEADING_HASHES.replace(out.trim(), "");
    WHITESPACE.replace_all(out.trim(), " ").into_owned()
}

/// Split prose into sentences. Terminal punctuation stays with its sentence.
pub fn sentences(text: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        if !matches!(c, '.' | '!' | '?') {
            continue;
        }
        let at_break = match chars.peek() {
            Some((_, next)) => next.is_whitespace(),
            None => true,
        };
        if at_break {
            let end = idx + c.len_utf8();
            let sentence = text[start..end].trim();
            if !sentence.is_empty() {
                out.push(sentence);
            }
            start = end;
        }
    }
    let rest = text[start..].trim();
    if !rest.is_empty() {
        out.push(rest);
    }
    out
}

pub fn first_sentence(text: &str) -> Option<&str> {
    sentences(text).into_iter().next()
}

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Trim surrounding whitespace and trailing clause punctuation.
pub fn trim_clause(text: &str) -> &str {
    text.trim()
        .trim_end_matches([',', ';', ':', '-', '—', '–'])
        .trim()
}
