//! Enrichment passes decorate extracted blocks with derived metadata.
//!
//! Every pass declares the [`Field`]s it reads and writes. [`EnrichmentPipeline::new`]
//! checks the declared order once, up front: a pass may only read fields that extraction or
//! an earlier pass has written. Passes run strictly in sequence; they may add fields and
//! append new blocks but never remove a block.

use enumset::{EnumSet, EnumSetType};
use serde::{Deserialize, Serialize};

use crate::{
    blocks::Block, codec::diagnostic::ErrorBus, error::SsmError, symbols::SymbolTable,
};

mod metadata;
mod notes;
mod structural;

pub use metadata::{Constraints, DifficultyRating, EmbeddingMetadata, RoleNotes, SemanticTags};
pub use notes::{DoDontPairs, ExamplesSmells, InferenceRules, IntuitionNotes, QaSynthesis, TestCases};
pub use structural::{BidirectionalLinks, ChapterSummaries, ReasoningChains};

/// Block data a pass can depend on or produce.
#[derive(Debug, Serialize, Deserialize, EnumSetType)]
pub enum Field {
    // Written by extraction
    Text,
    Term,
    Definition,
    Problem,
    Fix,
    Explanation,
    Claim,
    Question,
    Answer,
    ContrastPair,
    CodeBody,
    Language,
    PatternKind,
    DiagramSource,
    ChapterInfo,
    ChapterCode,
    Section,
    SymbolRefs,
    // Written by enrichment
    Links,
    EmbeddingText,
    TokenEstimate,
    Intuition,
    Smells,
    Examples,
    Roles,
    DoDont,
    InferenceRule,
    Relations,
    SyntheticQa,
    Constraints,
    Difficulty,
    Summary,
    KeyTerms,
    Prerequisites,
    Pathway,
    Graph,
    Tags,
    VectorId,
    TestCases,
}

impl Field {
    /// Fields extraction provides before any pass runs.
    pub fn extracted() -> EnumSet<Field> {
        Field::Text
            | Field::Term
            | Field::Definition
            | Field::Problem
            | Field::Fix
            | Field::Explanation
            | Field::Claim
            | Field::Question
            | Field::Answer
            | Field::ContrastPair
            | Field::CodeBody
            | Field::Language
            | Field::PatternKind
            | Field::DiagramSource
            | Field::ChapterInfo
            | Field::ChapterCode
            | Field::Section
            | Field::SymbolRefs
    }
}

pub trait EnrichmentPass: Send + Sync {
    fn name(&self) -> &'static str;

    fn reads(&self) -> EnumSet<Field>;

    fn writes(&self) -> EnumSet<Field>;

    fn apply(&self, blocks: &mut Vec<Block>, symbols: &mut SymbolTable, bus: &ErrorBus);
}

/// The built-in passes, in their declared order.
pub fn standard_passes() -> Vec<Box<dyn EnrichmentPass>> {
    vec![
        Box::new(BidirectionalLinks),
        Box::new(EmbeddingMetadata),
        Box::new(IntuitionNotes),
        Box::new(ExamplesSmells),
        Box::new(RoleNotes),
        Box::new(DoDontPairs),
        Box::new(InferenceRules),
        Box::new(QaSynthesis),
        Box::new(Constraints),
        Box::new(DifficultyRating),
        Box::new(ChapterSummaries),
        Box::new(ReasoningChains),
        Box::new(SemanticTags),
        Box::new(TestCases),
    ]
}

pub struct EnrichmentPipeline {
    passes: Vec<Box<dyn EnrichmentPass>>,
}

impl std::fmt::Debug for EnrichmentPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnrichmentPipeline")
            .field("passes", &self.names())
            .finish()
    }
}

impl EnrichmentPipeline {
    /// Build a pipeline, rejecting any order in which a pass reads a field nothing before it
    /// writes.
    pub fn new(passes: Vec<Box<dyn EnrichmentPass>>) -> Result<Self, SsmError> {
        let mut available = Field::extracted();
        for pass in passes.iter() {
            let missing = pass.reads() - available;
            if !missing.is_empty() {
                return Err(SsmError::PassOrder(format!(
                    "pass '{}' reads {:?} before any earlier pass writes them",
                    pass.name(),
                    missing.iter().collect::<Vec<_>>()
                )));
            }
            available |= pass.writes();
        }
        Ok(EnrichmentPipeline { passes })
    }

    /// The standard pipeline without the named passes.
    pub fn standard_without(disabled: &[String]) -> Result<Self, SsmError> {
        let passes = standard_passes()
            .into_iter()
            .filter(|pass| !disabled.iter().any(|name| name == pass.name()))
            .collect();
        Self::new(passes)
    }

    pub fn standard() -> Result<Self, SsmError> {
        Self::new(standard_passes())
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.passes.iter().map(|pass| pass.name()).collect()
    }

    /// Run every pass in order, then restore source-line order (stable, so appended blocks
    /// follow the block they were derived from).
    #[tracing::instrument(skip_all)]
    pub fn run(&self, blocks: &mut Vec<Block>, symbols: &mut SymbolTable, bus: &ErrorBus) {
        for pass in self.passes.iter() {
            let before = blocks.len();
            pass.apply(blocks, symbols, bus);
            debug_assert!(blocks.len() >= before, "{} removed blocks", pass.name());
            tracing::debug!(
                "{} done: {} blocks ({} appended)",
                pass.name(),
                blocks.len(),
                blocks.len().saturating_sub(before)
            );
        }
        blocks.sort_by_key(|block| block.line_no);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    struct Reader;

    impl EnrichmentPass for Reader {
        fn name(&self) -> &'static str {
            "reader"
        }

        fn reads(&self) -> EnumSet<Field> {
            Field::Tags.into()
        }

        fn writes(&self) -> EnumSet<Field> {
            EnumSet::empty()
        }

        fn apply(&self, _: &mut Vec<Block>, _: &mut SymbolTable, _: &ErrorBus) {}
    }

    #[test]
    fn test_standard_order_is_valid() {
        let pipeline = EnrichmentPipeline::standard().unwrap();
        assert_eq!(pipeline.names().len(), 14);
        assert_eq!(pipeline.names()[0], "bidirectional_links");
        assert_eq!(pipeline.names()[13], "test_cases");
    }

    #[test]
    fn test_read_before_write_is_rejected() {
        let err = EnrichmentPipeline::new(vec![Box::new(Reader), Box::new(SemanticTags)])
            .unwrap_err();
        assert!(matches!(err, SsmError::PassOrder(ref msg) if msg.contains("reader")));
        assert!(EnrichmentPipeline::new(vec![
            Box::new(EmbeddingMetadata),
            Box::new(SemanticTags),
            Box::new(Reader)
        ])
        .is_ok());
    }

    #[test]
    fn test_disabling_a_producer_breaks_its_consumers() {
        assert!(EnrichmentPipeline::standard_without(&["test_cases".to_string()]).is_ok());
        assert!(matches!(
            EnrichmentPipeline::standard_without(&["embedding_metadata".to_string()]),
            Err(SsmError::PassOrder(_))
        ));
    }
}
