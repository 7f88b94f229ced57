//! Passes that add explanatory notes to individual blocks or derive new blocks from them.

use enumset::EnumSet;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::{
    blocks::{Block, BlockBody, Confidence, Example, IdAllocator, Qa, Relation},
    codec::diagnostic::{DiagnosticCode, ErrorBus},
    enrich::{EnrichmentPass, Field},
    extract::rationale::causal_split,
    symbols::{MentionMatcher, SymbolTable, MAX_SYMBOL_LEN},
    text::{first_sentence, plain_text, strip_heading_markup, trim_clause},
};

const MAX_EXAMPLES_PER_CONCEPT: usize = 3;
const MAX_TESTED_SYMBOLS: usize = 3;

fn skipped(bus: &ErrorBus, pass: &str, block: &Block, reason: &str) {
    bus.warn(
        DiagnosticCode::EnrichSkipped,
        format!("{pass}: {} {reason}", block.id),
        block.line_no,
    );
}

/// Lowercase the first letter unless the word looks like an acronym.
fn lower_first(text: &str) -> String {
    let mut chars = text.chars();
    match (chars.next(), chars.next()) {
        (Some(first), Some(second)) if first.is_uppercase() && !second.is_uppercase() => {
            first.to_lowercase().chain(text[first.len_utf8()..].chars()).collect()
        }
        _ => text.to_string(),
    }
}

fn upper_first(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn strip_period(text: &str) -> &str {
    text.trim().trim_end_matches(['.', '!', '?']).trim()
}

pub struct IntuitionNotes;

impl IntuitionNotes {
    pub fn intuition(term: &str, definition: &str) -> Option<String> {
        let definition = plain_text(definition);
        let sentence = first_sentence(&definition)?;
        let clause = sentence
            .split([',', ';', ':', '('])
            .next()
            .map(|clause| strip_period(trim_clause(clause)))
            .filter(|clause| !clause.is_empty())?;
        Some(format!("Think of {term} as {}.", lower_first(clause)))
    }
}

impl EnrichmentPass for IntuitionNotes {
    fn name(&self) -> &'static str {
        "intuition_notes"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::Term | Field::Definition
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::Intuition.into()
    }

    fn apply(&self, blocks: &mut Vec<Block>, _symbols: &mut SymbolTable, bus: &ErrorBus) {
        for block in blocks.iter_mut() {
            let BlockBody::Concept(concept) = &mut block.body else {
                continue;
            };
            match Self::intuition(&concept.term, &concept.definition) {
                Some(intuition) => concept.intuition = Some(intuition),
                None => skipped(bus, self.name(), block, "has no usable definition"),
            }
        }
    }
}

static SMELLS: Lazy<Vec<(&'static str, Regex)>> = Lazy::new(|| {
    [
        ("global-state", r"\bglobal (?:state|variables?)\b|\bsingletons?\b"),
        ("tight-coupling", r"\btight(?:ly)?[ -]coupl\w*|\bhard-?cod\w*"),
        (
            "secret-leak",
            r"\b(?:secrets?|credentials?|passwords?|api keys?|tokens?)\b",
        ),
        (
            "error-swallowing",
            r"\bignor\w* (?:the )?errors?\b|\bswallow\w*|\bunwrap\b|\bbare except\b|\bcatch-all\b",
        ),
        ("magic-values", r"\bmagic (?:numbers?|values?|strings?)\b"),
        ("duplication", r"\bduplicat\w*|\bcopy-?past\w*"),
        ("blocking-io", r"\bblocking (?:calls?|io|i/o)\b|\bsleep\w*"),
        ("god-object", r"\bgod (?:objects?|class(?:es)?)\b|\btoo many responsibilities\b"),
        (
            "shared-mutable-state",
            r"\bshared mutable\b|\bdata races?\b|\brace conditions?\b",
        ),
    ]
    .into_iter()
    .map(|(smell, pattern)| {
        let regex = Regex::new(&format!("(?i){pattern}")).expect("smell pattern");
        (smell, regex)
    })
    .collect()
});

/// Smell labels for antipatterns, and example blocks tying concepts to the code that uses
/// them.
pub struct ExamplesSmells;

impl ExamplesSmells {
    pub fn smells(problem: &str) -> Vec<String> {
        SMELLS
            .iter()
            .filter(|(_, regex)| regex.is_match(problem))
            .map(|(smell, _)| smell.to_string())
            .collect()
    }
}

impl EnrichmentPass for ExamplesSmells {
    fn name(&self) -> &'static str {
        "examples_smells"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::Problem | Field::Term | Field::CodeBody | Field::Language | Field::SymbolRefs
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::Smells | Field::Examples
    }

    fn apply(&self, blocks: &mut Vec<Block>, _symbols: &mut SymbolTable, _bus: &ErrorBus) {
        for block in blocks.iter_mut() {
            if let BlockBody::Antipattern(antipattern) = &mut block.body {
                antipattern.smells = Self::smells(&antipattern.problem);
            }
        }

        let code_blocks = blocks
            .iter()
            .enumerate()
            .filter(|(_, b)| matches!(&b.body, BlockBody::CodePattern(c) if !c.code_body.trim().is_empty()))
            .map(|(idx, _)| idx)
            .collect::<Vec<_>>();
        let mut plans: Vec<(usize, Vec<usize>)> = Vec::new();
        let mut seen_terms = HashSet::new();
        for (idx, block) in blocks.iter().enumerate() {
            let BlockBody::Concept(concept) = &block.body else {
                continue;
            };
            let term = concept.term.to_lowercase();
            if !seen_terms.insert(term.clone()) {
                continue;
            }
            let users = code_blocks
                .iter()
                .copied()
                .filter(|code_idx| {
                    blocks[*code_idx]
                        .symbol_refs
                        .iter()
                        .any(|name| name.to_lowercase() == term)
                })
                .take(MAX_EXAMPLES_PER_CONCEPT)
                .collect::<Vec<_>>();
            if !users.is_empty() {
                plans.push((idx, users));
            }
        }

        let mut ids = IdAllocator::from_blocks(blocks);
        for (concept_idx, users) in plans {
            let BlockBody::Concept(concept) = &blocks[concept_idx].body else {
                continue;
            };
            let term = concept.term.clone();
            let mut example_ids = Vec::new();
            for code_idx in users {
                let code = &blocks[code_idx];
                let BlockBody::CodePattern(pattern) = &code.body else {
                    continue;
                };
                let mut example = Block::new(
                    BlockBody::Example(Example {
                        concept: term.clone(),
                        code_ref: code.id.clone(),
                        language: pattern.language.clone(),
                    }),
                    code.chapter_code,
                    code.line_no,
                )
                .with_section(code.section.as_deref())
                .with_confidence(Confidence::Medium);
                example.add_symbol_ref(&term);
                ids.assign(&mut example);
                example_ids.push(example.id.clone());
                blocks.push(example);
            }
            if let BlockBody::Concept(concept) = &mut blocks[concept_idx].body {
                concept.examples.extend(example_ids);
            }
        }
    }
}

static INSTEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*instead\b[\s,:]*").expect("instead pattern"));
static TRAILING_INSTEAD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)[\s,]+instead(?P<end>[.!]?)\s*$").expect("instead pattern"));

/// Imperative `do` / `dont` pairs for antipatterns that carry a fix.
pub struct DoDontPairs;

impl DoDontPairs {
    pub fn pair(problem: &str, fix: &str) -> (String, String) {
        let fix = INSTEAD.replace(fix, "");
        let fix = TRAILING_INSTEAD.replace(&fix, "$end");
        (upper_first(fix.trim()), problem.trim().to_string())
    }
}

impl EnrichmentPass for DoDontPairs {
    fn name(&self) -> &'static str {
        "do_dont_pairs"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::Problem | Field::Fix
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::DoDont.into()
    }

    fn apply(&self, blocks: &mut Vec<Block>, _symbols: &mut SymbolTable, bus: &ErrorBus) {
        for block in blocks.iter_mut() {
            let BlockBody::Antipattern(antipattern) = &mut block.body else {
                continue;
            };
            let Some(fix) = antipattern.fix.as_deref() else {
                skipped(bus, self.name(), block, "has no fix to pair");
                continue;
            };
            let (do_this, dont_this) = Self::pair(&antipattern.problem, fix);
            antipattern.do_this = Some(do_this);
            antipattern.dont_this = Some(dont_this);
        }
    }
}

/// `IF cause THEN claim` rules for rationale, plus relation blocks for rationale, contrast
/// and antipattern/fix pairs.
pub struct InferenceRules;

impl InferenceRules {
    /// Cause and claim of a causal sentence. `Since X, Y` puts the claim after the cause.
    pub fn cause_and_claim(explanation: &str, claim: Option<&str>) -> Option<(String, String)> {
        let (before, _, after) = causal_split(explanation)?;
        let after = strip_period(after);
        let (cause, claim) = match claim {
            Some(claim) => (after, strip_period(claim)),
            None if trim_clause(before).is_empty() => {
                let (cause, claim) = after.split_once(',')?;
                (cause.trim(), strip_period(claim))
            }
            None => return None,
        };
        if cause.is_empty() || claim.is_empty() {
            return None;
        }
        Some((cause.to_string(), claim.to_string()))
    }

    /// The first known symbol a clause mentions, else the clause itself.
    fn endpoint(matcher: Option<&MentionMatcher>, clause: &str) -> Option<String> {
        if let Some(name) = matcher.and_then(|m| m.mentions(clause).into_iter().next()) {
            return Some(name);
        }
        let clause = strip_period(trim_clause(clause));
        if clause.is_empty() {
            return None;
        }
        Some(clause.chars().take(MAX_SYMBOL_LEN).collect::<String>().trim().to_string())
    }
}

impl EnrichmentPass for InferenceRules {
    fn name(&self) -> &'static str {
        "inference_rules"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::Explanation | Field::Claim | Field::ContrastPair | Field::Problem | Field::Fix
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::InferenceRule | Field::Relations
    }

    fn apply(&self, blocks: &mut Vec<Block>, symbols: &mut SymbolTable, bus: &ErrorBus) {
        let matcher = symbols.mention_matcher().unwrap_or_else(|err| {
            bus.warn(
                DiagnosticCode::EnrichSkipped,
                format!("inference_rules: relations fall back to raw clauses: {err}"),
                0,
            );
            None
        });

        let mut pending: Vec<(usize, &'static str, String, String)> = Vec::new();
        for (idx, block) in blocks.iter_mut().enumerate() {
            match &mut block.body {
                BlockBody::Rationale(rationale) => {
                    let Some((cause, claim)) =
                        Self::cause_and_claim(&rationale.explanation, rationale.claim.as_deref())
                    else {
                        skipped(bus, self.name(), block, "has no claim to infer");
                        continue;
                    };
                    rationale.inference_rule = Some(format!("IF {cause} THEN {claim}"));
                    pending.push((idx, "implies", cause, claim));
                }
                BlockBody::Contrast(contrast) => pending.push((
                    idx,
                    "contrasts-with",
                    contrast.concept_a.clone(),
                    contrast.concept_b.clone(),
                )),
                BlockBody::Antipattern(antipattern) => {
                    if let Some(fix) = antipattern.fix.clone() {
                        pending.push((idx, "fixed-by", antipattern.problem.clone(), fix));
                    }
                }
                _ => {}
            }
        }

        let mut ids = IdAllocator::from_blocks(blocks);
        for (origin_idx, relation, source, target) in pending {
            let (Some(source), Some(target)) = (
                Self::endpoint(matcher.as_ref(), &source),
                Self::endpoint(matcher.as_ref(), &target),
            ) else {
                continue;
            };
            let origin = &blocks[origin_idx];
            let mut block = Block::new(
                BlockBody::Relation(Relation {
                    source: source.clone(),
                    relation: relation.to_string(),
                    target: target.clone(),
                    origin: origin.id.clone(),
                }),
                origin.chapter_code,
                origin.line_no,
            )
            .with_section(origin.section.as_deref())
            .with_confidence(Confidence::Medium);
            for endpoint in [source, target] {
                if let Some(canonical) = symbols.resolve(&endpoint) {
                    let canonical = canonical.to_string();
                    block.add_symbol_ref(&canonical);
                }
            }
            ids.assign(&mut block);
            blocks.push(block);
        }
    }
}

/// Synthetic `What is <term>?` questions for concepts nobody asked about.
pub struct QaSynthesis;

impl EnrichmentPass for QaSynthesis {
    fn name(&self) -> &'static str {
        "qa_synthesis"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::Term | Field::Definition | Field::Question | Field::Answer
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::SyntheticQa.into()
    }

    fn apply(&self, blocks: &mut Vec<Block>, _symbols: &mut SymbolTable, bus: &ErrorBus) {
        let mut questions = Vec::new();
        let mut answers = HashSet::new();
        for block in blocks.iter() {
            if let BlockBody::Qa(qa) = &block.body {
                questions.push(qa.question.to_lowercase());
                if let Some(answer) = qa.answer.as_ref() {
                    answers.insert(answer.clone());
                }
            }
        }

        let mut asked = HashSet::new();
        let mut synthesized = Vec::new();
        for block in blocks.iter() {
            let BlockBody::Concept(concept) = &block.body else {
                continue;
            };
            if concept.definition.trim().is_empty() {
                skipped(bus, self.name(), block, "has no definition to answer with");
                continue;
            }
            let term = strip_heading_markup(&concept.term);
            let answer = strip_heading_markup(&concept.definition);
            if term.is_empty() || answer.is_empty() {
                skipped(bus, self.name(), block, "has only heading markup to ask about");
                continue;
            }
            let key = term.to_lowercase();
            if questions.iter().any(|question| question.contains(&key))
                || answers.contains(&answer)
                || !asked.insert(key)
            {
                continue;
            }
            answers.insert(answer.clone());
            let mut qa = Block::new(
                BlockBody::Qa(Qa {
                    question: format!("What is {term}?"),
                    answer: Some(answer),
                    synthetic: true,
                }),
                block.chapter_code,
                block.line_no,
            )
            .with_section(block.section.as_deref())
            .with_confidence(Confidence::Medium);
            qa.add_symbol_ref(&concept.term);
            synthesized.push(qa);
        }

        let mut ids = IdAllocator::from_blocks(blocks);
        for mut qa in synthesized {
            ids.assign(&mut qa);
            blocks.push(qa);
        }
    }
}

/// Test-case descriptions for code patterns, keyed on the pattern shape.
pub struct TestCases;

impl TestCases {
    pub fn cases(language: &str, pattern_kind: Option<&str>, symbols: &[String]) -> Vec<String> {
        let named = symbols.iter().take(MAX_TESTED_SYMBOLS);
        let mut cases = Vec::new();
        match pattern_kind {
            Some("deny-rule" | "violation-rule" | "warn-rule") => {
                for rule in named.filter(|s| matches!(s.as_str(), "deny" | "violation" | "warn")) {
                    cases.push(format!("{rule} fires for input that breaks the policy"));
                    cases.push(format!("{rule} stays empty for compliant input"));
                }
            }
            Some("allow-rule") => {
                cases.push("allow grants a request that meets every condition".to_string());
                cases.push("allow stays false when any condition fails".to_string());
            }
            Some("function-definition") => {
                for name in named {
                    cases.push(format!("{name} returns the expected result for typical input"));
                    cases.push(format!("{name} handles empty and boundary input"));
                }
            }
            Some("type-definition" | "class-definition") => {
                for name in named {
                    cases.push(format!("{name} can be constructed from valid values"));
                    cases.push(format!("{name} rejects or normalizes invalid values"));
                }
            }
            Some("impl-block" | "trait-definition" | "module") => {
                for name in named {
                    cases.push(format!("{name} upholds its documented behavior"));
                }
            }
            _ => {}
        }
        if cases.is_empty() {
            cases.push(format!("{language} sample is well-formed"));
        }
        cases
    }
}

impl EnrichmentPass for TestCases {
    fn name(&self) -> &'static str {
        "test_cases"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::CodeBody | Field::PatternKind | Field::Language
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::TestCases.into()
    }

    fn apply(&self, blocks: &mut Vec<Block>, _symbols: &mut SymbolTable, bus: &ErrorBus) {
        for block in blocks.iter_mut() {
            let BlockBody::CodePattern(pattern) = &mut block.body else {
                continue;
            };
            if pattern.code_body.trim().is_empty() {
                skipped(bus, self.name(), block, "has no code to test");
                continue;
            }
            pattern.test_cases = Self::cases(
                &pattern.language,
                pattern.pattern_kind.as_deref(),
                &pattern.symbols,
            );
        }
    }
}
