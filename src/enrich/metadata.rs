//! Per-block metadata passes: embedding text, audience roles, constraints, difficulty and
//! topic tags.

use enumset::EnumSet;
use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use unicode_normalization::UnicodeNormalization;

use crate::{
    blocks::{Block, BlockBody, BlockKind, Difficulty},
    codec::diagnostic::{DiagnosticCode, ErrorBus},
    enrich::{EnrichmentPass, Field},
    symbols::SymbolTable,
    text::{plain_text, sentences},
};

/// Code beyond this many characters is left out of embedding text.
const EMBEDDED_CODE_CHARS: usize = 1000;

/// Hex characters of the sha-256 digest kept as the vector id.
const VECTOR_ID_LEN: usize = 16;

fn language(block: &Block) -> Option<&str> {
    match &block.body {
        BlockBody::CodePattern(c) => Some(c.language.as_str()),
        BlockBody::Diagram(d) => Some(d.language.as_str()),
        BlockBody::Example(e) => Some(e.language.as_str()),
        _ => None,
    }
}

pub struct EmbeddingMetadata;

impl EmbeddingMetadata {
    pub fn embedding_text(block: &Block) -> String {
        let mut context = Vec::new();
        if block.chapter_code > 0 {
            context.push(format!("Chapter {}", block.chapter_code));
        }
        if let Some(section) = block.section.as_deref() {
            context.push(section.to_string());
        }

        let mut body = plain_text(&block.text());
        if let Some(code) = block.code() {
            let code = code
                .chars()
                .take(EMBEDDED_CODE_CHARS)
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ");
            if !code.is_empty() {
                if !body.is_empty() {
                    body.push(' ');
                }
                body.push_str(&code);
            }
        }
        if body.is_empty() {
            return body;
        }

        let text = match context.is_empty() {
            true => body,
            false => format!("{}: {}", context.join(" / "), body),
        };
        text.nfkc().collect()
    }

    /// Roughly four characters per token.
    pub fn token_estimate(text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }
}

impl EnrichmentPass for EmbeddingMetadata {
    fn name(&self) -> &'static str {
        "embedding_metadata"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::Text | Field::CodeBody | Field::ChapterCode | Field::Section
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::EmbeddingText | Field::TokenEstimate
    }

    fn apply(&self, blocks: &mut Vec<Block>, _symbols: &mut SymbolTable, bus: &ErrorBus) {
        for block in blocks.iter_mut() {
            let text = Self::embedding_text(block);
            if text.is_empty() {
                bus.warn(
                    DiagnosticCode::EnrichSkipped,
                    format!("embedding_metadata: {} has no text to embed", block.id),
                    block.line_no,
                );
                continue;
            }
            block.meta.token_estimate = Some(Self::token_estimate(&text));
            block.meta.embedding_text = Some(text);
        }
    }
}

static ROLE_KEYWORDS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        (
            "developer",
            r"\b(?:function|method|api|implement\w*|librar(?:y|ies)|compile\w*|refactor\w*)\b",
        ),
        (
            "security",
            r"\b(?:secrets?|credentials?|auth\w*|vulnerab\w*|encrypt\w*|permissions?|injection|security|passwords?|tokens?|polic(?:y|ies))\b",
        ),
        (
            "operator",
            r"\b(?:deploy\w*|monitor\w*|logging|metrics|production|incidents?|scal(?:e|ing)|backups?|rollouts?|on-call)\b",
        ),
        (
            "architect",
            r"\b(?:architecture|design|modules?|boundar(?:y|ies)|coupling|interfaces?|layers?|dependenc(?:y|ies))\b",
        ),
        (
            "tester",
            r"\b(?:tests?|testing|assert\w*|coverage|mock\w*|fixtures?|regressions?)\b",
        ),
    ]
    .into_iter()
    .map(|(role, pattern)| {
        let regex = Regex::new(&format!("(?i){pattern}")).expect("role pattern");
        (role, regex)
    })
    .collect()
});

/// Audience roles a block speaks to, in a fixed order. Code and otherwise untargeted prose
/// default to `developer`.
pub struct RoleNotes;

impl RoleNotes {
    pub fn roles(block: &Block) -> Vec<String> {
        let text = block.text();
        let mut roles = ROLE_KEYWORDS
            .iter()
            .filter(|(_, regex)| regex.is_match(&text))
            .map(|(role, _)| role.to_string())
            .collect::<Vec<_>>();
        let wants_developer = block.code().is_some() || roles.is_empty();
        if wants_developer && !roles.iter().any(|role| role == "developer") {
            roles.insert(0, "developer".to_string());
        }
        roles
    }
}

impl EnrichmentPass for RoleNotes {
    fn name(&self) -> &'static str {
        "role_notes"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::Text | Field::CodeBody
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::Roles.into()
    }

    fn apply(&self, blocks: &mut Vec<Block>, _symbols: &mut SymbolTable, _bus: &ErrorBus) {
        for block in blocks.iter_mut() {
            block.meta.roles = Self::roles(block);
        }
    }
}

static MODAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:must(?: not)?|never|always|required|should not|shall)\b")
        .expect("modal pattern")
});

/// Sentences stating an obligation or prohibition.
pub struct Constraints;

impl Constraints {
    pub fn constraints(text: &str) -> Vec<String> {
        let text = plain_text(text);
        let mut out: Vec<String> = Vec::new();
        for sentence in sentences(&text) {
            if MODAL.is_match(sentence) && !out.iter().any(|seen| seen == sentence) {
                out.push(sentence.to_string());
            }
        }
        out
    }
}

impl EnrichmentPass for Constraints {
    fn name(&self) -> &'static str {
        "constraints"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::Text.into()
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::Constraints.into()
    }

    fn apply(&self, blocks: &mut Vec<Block>, _symbols: &mut SymbolTable, _bus: &ErrorBus) {
        for block in blocks.iter_mut() {
            let prose = matches!(
                block.kind(),
                BlockKind::Concept
                    | BlockKind::Fact
                    | BlockKind::Antipattern
                    | BlockKind::Qa
                    | BlockKind::Rationale
                    | BlockKind::Contrast
            );
            if prose {
                block.meta.constraints = Self::constraints(&block.text());
            }
        }
    }
}

static ADVANCED_VOCABULARY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(?:concurren\w*|lock-free|atomics?|unsafe|lifetimes?|generics?|async|memory model|invariants?|variance|monads?|distributed|consensus|linearizab\w*|amortized|complexity|formal\w*)\b",
    )
    .expect("advanced vocabulary pattern")
});

pub struct DifficultyRating;

impl DifficultyRating {
    pub fn rate(block: &Block) -> Difficulty {
        let lines = block.code().map(|code| code.lines().count()).unwrap_or(0);
        let code_score = match lines {
            0..=10 => 0,
            11..=30 => 1,
            _ => 2,
        };
        let symbol_score = match block.symbol_refs.len() {
            0..=2 => 0,
            3..=4 => 1,
            _ => 2,
        };
        let vocabulary_score = ADVANCED_VOCABULARY.find_iter(&block.text()).count().min(2);
        match code_score + symbol_score + vocabulary_score {
            0 => Difficulty::Beginner,
            1..=2 => Difficulty::Intermediate,
            _ => Difficulty::Advanced,
        }
    }
}

impl EnrichmentPass for DifficultyRating {
    fn name(&self) -> &'static str {
        "difficulty"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::Text | Field::CodeBody | Field::SymbolRefs
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::Difficulty.into()
    }

    fn apply(&self, blocks: &mut Vec<Block>, _symbols: &mut SymbolTable, _bus: &ErrorBus) {
        for block in blocks.iter_mut() {
            if block.kind() != BlockKind::ChapterMeta {
                block.difficulty = Some(Self::rate(block));
            }
        }

        // A chapter is as hard as most of its blocks; ties go to the easier level.
        let levels = [
            Difficulty::Beginner,
            Difficulty::Intermediate,
            Difficulty::Advanced,
        ];
        let mut chapter_levels = Vec::new();
        for (idx, block) in blocks.iter().enumerate() {
            if block.kind() != BlockKind::ChapterMeta {
                continue;
            }
            let mut counts = [0usize; 3];
            for member in blocks.iter().filter(|b| b.chapter_code == block.chapter_code) {
                if let Some(level) = member.difficulty {
                    if let Some(slot) = levels.iter().position(|l| *l == level) {
                        counts[slot] += 1;
                    }
                }
            }
            let mut best = 0;
            for slot in 1..counts.len() {
                if counts[slot] > counts[best] {
                    best = slot;
                }
            }
            chapter_levels.push((idx, levels[best]));
        }
        for (idx, level) in chapter_levels {
            blocks[idx].difficulty = Some(level);
        }
    }
}

static TOPICS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        (
            "concurrency",
            r"\b(?:threads?|mutex\w*|locks?|locking|async|await|concurren\w*|race|atomic\w*|channels?)\b",
        ),
        (
            "security",
            r"\b(?:security|secrets?|credentials?|auth\w*|vulnerab\w*|encrypt\w*|injection|passwords?)\b",
        ),
        (
            "testing",
            r"\b(?:tests?|testing|assert\w*|coverage|mock\w*|fixtures?)\b",
        ),
        (
            "performance",
            r"\b(?:performance|latency|throughput|cach(?:e|es|ing)|fast|slow|optimi\w*|allocations?)\b",
        ),
        (
            "error-handling",
            r"\b(?:errors?|panics?|exceptions?|failures?|retr(?:y|ies)|fallible)\b",
        ),
        (
            "policy",
            r"\b(?:polic(?:y|ies)|rules?|rego|allow|deny|violations?|compliance)\b",
        ),
        (
            "architecture",
            r"\b(?:architecture|modules?|coupling|interfaces?|layers?|dependency injection|boundar(?:y|ies))\b",
        ),
        (
            "data",
            r"\b(?:databases?|sql|schemas?|quer(?:y|ies)|storage|serializ\w*|json|yaml)\b",
        ),
    ]
    .into_iter()
    .map(|(topic, pattern)| {
        let regex = Regex::new(&format!("(?i){pattern}")).expect("topic pattern");
        (topic, regex)
    })
    .collect()
});

/// Topic tags and a content-addressed vector id, both derived from the embedding text.
pub struct SemanticTags;

impl SemanticTags {
    pub fn vector_id(embedding_text: &str) -> String {
        let digest = hex::encode(Sha256::digest(embedding_text.as_bytes()));
        digest[..VECTOR_ID_LEN].to_string()
    }

    pub fn tags(block: &Block, embedding_text: &str) -> Vec<String> {
        let mut tags = TOPICS
            .iter()
            .filter(|(_, regex)| regex.is_match(embedding_text))
            .map(|(topic, _)| topic.to_string())
            .collect::<Vec<_>>();
        if let Some(language) = language(block) {
            tags.push(format!("lang:{language}"));
        }
        tags
    }
}

impl EnrichmentPass for SemanticTags {
    fn name(&self) -> &'static str {
        "semantic_tags"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::EmbeddingText | Field::Language
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::Tags | Field::VectorId
    }

    fn apply(&self, blocks: &mut Vec<Block>, _symbols: &mut SymbolTable, bus: &ErrorBus) {
        for block in blocks.iter_mut() {
            // Blocks appended after embedding_metadata ran get their text here.
            let embedding_text = match block.meta.embedding_text.clone() {
                Some(text) => text,
                None => {
                    let text = EmbeddingMetadata::embedding_text(block);
                    if text.is_empty() {
                        bus.warn(
                            DiagnosticCode::EnrichSkipped,
                            format!("semantic_tags: {} has no embedding text", block.id),
                            block.line_no,
                        );
                        continue;
                    }
                    block.meta.token_estimate = Some(EmbeddingMetadata::token_estimate(&text));
                    block.meta.embedding_text = Some(text.clone());
                    text
                }
            };
            block.meta.tags = Self::tags(block, &embedding_text);
            block.meta.vector_id = Some(Self::vector_id(&embedding_text));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{CodePattern, Concept, Fact};
    use test_log::test;

    fn fact(statement: &str) -> Block {
        Block::new(
            BlockBody::Fact(Fact {
                label: "Note".to_string(),
                statement: statement.to_string(),
            }),
            2,
            10,
        )
    }

    fn code(language: &str, body: &str) -> Block {
        Block::new(
            BlockBody::CodePattern(CodePattern {
                language: language.to_string(),
                code_body: body.to_string(),
                line_count: body.lines().count(),
                ..Default::default()
            }),
            2,
            12,
        )
    }

    #[test]
    fn test_embedding_text_is_normalized_and_prefixed() {
        let block = Block::new(
            BlockBody::Concept(Concept {
                term: "Mutex".to_string(),
                definition: "A **lock**\u{FB01}ne for  one holder.".to_string(),
                ..Default::default()
            }),
            2,
            10,
        )
        .with_section(Some("2.1 Locks"));
        let text = EmbeddingMetadata::embedding_text(&block);
        assert_eq!(text, "Chapter 2 / 2.1 Locks: Mutex: A lockfine for one holder.");
        assert_eq!(EmbeddingMetadata::token_estimate("abcde"), 2);
    }

    #[test]
    fn test_empty_block_is_skipped() {
        let mut blocks = vec![code("text", "")];
        blocks[0].chapter_code = 0;
        let bus = ErrorBus::new();
        EmbeddingMetadata.apply(&mut blocks, &mut SymbolTable::new(), &bus);
        assert!(blocks[0].meta.embedding_text.is_none());
        let diagnostics = bus.into_sorted();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::EnrichSkipped);
    }

    #[test]
    fn test_roles() {
        assert_eq!(
            RoleNotes::roles(&fact("Never log the password in production.")),
            vec!["security", "operator"]
        );
        assert_eq!(RoleNotes::roles(&fact("Plain words.")), vec!["developer"]);
        assert_eq!(
            RoleNotes::roles(&code("rust", "fn main() {}")),
            vec!["developer"]
        );
    }

    #[test]
    fn test_constraints() {
        assert_eq!(
            Constraints::constraints("You must hold the lock. Reads are cheap. Never block."),
            vec!["You must hold the lock.", "Never block."]
        );
        assert!(Constraints::constraints("Mustard is a condiment.").is_empty());
    }

    #[test]
    fn test_difficulty() {
        assert_eq!(
            DifficultyRating::rate(&fact("A simple idea.")),
            Difficulty::Beginner
        );
        assert_eq!(
            DifficultyRating::rate(&fact("Atomics need a memory model.")),
            Difficulty::Intermediate
        );
        let long = "let x = 1;\n".repeat(40);
        let mut block = code("rust", &long);
        for name in ["a", "b", "c"] {
            block.add_symbol_ref(name);
        }
        assert_eq!(DifficultyRating::rate(&block), Difficulty::Advanced);
    }

    #[test]
    fn test_chapter_difficulty_is_the_mode() {
        use crate::blocks::ChapterMeta;
        let mut blocks = vec![
            Block::new(
                BlockBody::ChapterMeta(ChapterMeta {
                    code: 2,
                    ..Default::default()
                }),
                2,
                1,
            ),
            fact("Simple."),
            fact("Also simple."),
            fact("Async atomics."),
        ];
        DifficultyRating.apply(&mut blocks, &mut SymbolTable::new(), &ErrorBus::new());
        assert_eq!(blocks[0].difficulty, Some(Difficulty::Beginner));
        assert_eq!(blocks[3].difficulty, Some(Difficulty::Intermediate));
    }

    #[test]
    fn test_tags_and_vector_id() {
        let mut blocks = vec![code("rego", "deny contains msg if { not input.user }")];
        SemanticTags.apply(&mut blocks, &mut SymbolTable::new(), &ErrorBus::new());
        let block = &blocks[0];
        assert!(block.meta.tags.contains(&"policy".to_string()));
        assert!(block.meta.tags.contains(&"lang:rego".to_string()));
        let vector_id = block.meta.vector_id.clone().unwrap();
        assert_eq!(vector_id.len(), VECTOR_ID_LEN);
        assert_eq!(
            vector_id,
            SemanticTags::vector_id(block.meta.embedding_text.as_deref().unwrap())
        );
    }
}
