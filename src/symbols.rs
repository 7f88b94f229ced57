//! Per-compile registry of terms, code symbols and chapter codes.
//!
//! Names are stored under the spelling of their earliest registration. Lookups through
//! [`SymbolTable::resolve`] are case-insensitive, so `Mutex` and `mutex` name the same symbol.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::error::SsmError;

/// Names longer than this are sentences, not symbols.
pub const MAX_SYMBOL_LEN: usize = 80;

/// Shorter names are too noisy to match as mentions in running text.
const MIN_MENTION_LEN: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SymbolKind {
    Term,
    Code,
    Chapter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolInfo {
    pub name: String,
    pub kind: SymbolKind,
    /// Earliest line the symbol was registered from
    pub first_line: usize,
    /// Chapter enclosing `first_line`
    pub first_chapter: u32,
    pub referenced_by: BTreeSet<String>,
}

#[derive(Debug, Clone, Default)]
pub struct SymbolTable {
    symbols: BTreeMap<String, SymbolInfo>,
    folded: HashMap<String, String>,
}

/// Name used for a chapter's entry in the table.
pub fn chapter_symbol(code: u32) -> String {
    format!("chapter:{code}")
}

fn fold(name: &str) -> String {
    name.trim().to_lowercase()
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name`, returning the canonical spelling it is stored under.
    ///
    /// The earliest registration (by line, then spelling) decides the canonical spelling,
    /// kind and location, so the outcome does not depend on registration order. Empty and
    /// over-long names are rejected.
    pub fn register(
        &mut self,
        name: &str,
        kind: SymbolKind,
        line_no: usize,
        chapter: u32,
    ) -> Option<String> {
        let name = name.trim();
        if name.is_empty() || name.chars().count() > MAX_SYMBOL_LEN {
            return None;
        }
        let key = fold(name);
        if let Some(canonical) = self.folded.get(&key).cloned() {
            let Some(info) = self.symbols.get(&canonical) else {
                return Some(canonical);
            };
            if (line_no, name) >= (info.first_line, canonical.as_str()) {
                return Some(canonical);
            }
            let Some(mut info) = self.symbols.remove(&canonical) else {
                return Some(canonical);
            };
            info.name = name.to_string();
            info.kind = kind;
            info.first_line = line_no;
            info.first_chapter = chapter;
            self.symbols.insert(name.to_string(), info);
            self.folded.insert(key, name.to_string());
            return Some(name.to_string());
        }
        self.folded.insert(key, name.to_string());
        self.symbols.insert(
            name.to_string(),
            SymbolInfo {
                name: name.to_string(),
                kind,
                first_line: line_no,
                first_chapter: chapter,
                referenced_by: BTreeSet::new(),
            },
        );
        Some(name.to_string())
    }

    pub fn get(&self, name: &str) -> Option<&SymbolInfo> {
        self.symbols
            .get(name)
            .or_else(|| self.resolve(name).and_then(|canonical| self.symbols.get(canonical)))
    }

    /// Canonical spelling for `name`, ignoring case.
    pub fn resolve(&self, name: &str) -> Option<&str> {
        self.folded.get(&fold(name)).map(|s| s.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.resolve(name).is_some()
    }

    /// Record that `block_id` references `name`. Returns false for unknown names.
    pub fn add_reference(&mut self, name: &str, block_id: &str) -> bool {
        let Some(canonical) = self.resolve(name).map(|s| s.to_string()) else {
            return false;
        };
        match self.symbols.get_mut(&canonical) {
            Some(info) => {
                info.referenced_by.insert(block_id.to_string());
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SymbolInfo> {
        self.symbols.values()
    }

    pub fn of_kind(&self, kind: SymbolKind) -> impl Iterator<Item = &SymbolInfo> {
        self.symbols.values().filter(move |info| info.kind == kind)
    }

    /// Build a matcher over every term and code symbol, or `None` when there is nothing to
    /// match.
    pub fn mention_matcher(&self) -> Result<Option<MentionMatcher>, SsmError> {
        let mut names = self
            .symbols
            .values()
            .filter(|info| info.kind != SymbolKind::Chapter)
            .map(|info| info.name.as_str())
            .filter(|name| name.chars().count() >= MIN_MENTION_LEN)
            .collect::<Vec<_>>();
        if names.is_empty() {
            return Ok(None);
        }
        // Longest first so `Read Lock` wins over `Read`.
        names.sort_by(|a, b| b.len().cmp(&a.len()).then(a.cmp(b)));
        let alternatives = names
            .iter()
            .map(|name| {
                let word_start = name.chars().next().is_some_and(is_word_char);
                let word_end = name.chars().last().is_some_and(is_word_char);
                format!(
                    "{}{}{}",
                    if word_start { r"\b" } else { "" },
                    regex::escape(name),
                    if word_end { r"\b" } else { "" }
                )
            })
            .collect::<Vec<_>>()
            .join("|");
        let regex = RegexBuilder::new(&format!("(?:{alternatives})"))
            .case_insensitive(true)
            .size_limit(64 << 20)
            .build()?;
        let canonical = names
            .iter()
            .map(|name| (fold(name), name.to_string()))
            .collect();
        Ok(Some(MentionMatcher { regex, canonical }))
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Finds mentions of known symbols in free text.
#[derive(Debug, Clone)]
pub struct MentionMatcher {
    regex: Regex,
    canonical: HashMap<String, String>,
}

impl MentionMatcher {
    /// Canonical names mentioned in `text`, in order of first mention, without repeats.
    pub fn mentions(&self, text: &str) -> Vec<String> {
        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for found in self.regex.find_iter(text) {
            if let Some(name) = self.canonical.get(&fold(found.as_str())) {
                if seen.insert(name.clone()) {
                    out.push(name.clone());
                }
            }
        }
        out
    }
}
