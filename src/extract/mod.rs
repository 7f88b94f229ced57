//! Extractors turn the document tree into typed [`Block`]s.
//!
//! Each [`Extractor`] reads only the [`AstDocument`] and the shared [`ExtractCtx`]; extractors
//! never see each other's output. That makes them safe to run on scoped worker threads:
//! [`run_extractors`] merges their output into one stable sequence ordered by source line and
//! then by extractor rank, so the merged result is identical however the threads interleave.

use parking_lot::Mutex;

use crate::{
    blocks::{Block, BlockBody, IdAllocator},
    codec::{
        ast::{AstDocument, AstNode, ChapterIndex, NodeKind, SectionIndex},
        diagnostic::ErrorBus,
    },
    symbols::{SymbolKind, SymbolTable},
};

pub mod antipattern;
pub mod code;
pub mod contrast;
pub mod diagram;
pub mod qa;
pub mod rationale;
pub mod structure;
pub mod term;

pub use antipattern::AntipatternExtractor;
pub use code::{CodePatternExtractor, PatternMatcher};
pub use contrast::ContrastExtractor;
pub use diagram::DiagramExtractor;
pub use qa::QaExtractor;
pub use rationale::RationaleExtractor;
pub use structure::StructureExtractor;
pub use term::TermExtractor;

/// Shared, read-mostly state for one extraction run.
pub struct ExtractCtx<'a> {
    pub chapters: &'a ChapterIndex,
    pub sections: &'a SectionIndex,
    pub symbols: &'a Mutex<SymbolTable>,
    pub bus: &'a ErrorBus,
}

impl<'a> ExtractCtx<'a> {
    /// A new block located at `line_no`, with chapter and section filled in from the indexes.
    pub fn block(&self, body: BlockBody, line_no: usize) -> Block {
        Block::new(body, self.chapters.chapter_for_line(line_no), line_no)
            .with_section(self.sections.section_for_line(line_no))
    }

    pub fn register(&self, name: &str, kind: SymbolKind, line_no: usize) -> Option<String> {
        let chapter = self.chapters.chapter_for_line(line_no);
        self.symbols.lock().register(name, kind, line_no, chapter)
    }

    /// Whether two lines share both chapter and section.
    pub fn same_context(&self, a: usize, b: usize) -> bool {
        self.chapters.chapter_for_line(a) == self.chapters.chapter_for_line(b)
            && self.sections.section_for_line(a) == self.sections.section_for_line(b)
    }
}

pub trait Extractor: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, doc: &AstDocument, ctx: &ExtractCtx) -> Vec<Block>;
}

/// The built-in extractors, in merge rank order.
pub fn standard_extractors() -> Vec<Box<dyn Extractor>> {
    vec![
        Box::new(StructureExtractor),
        Box::new(QaExtractor),
        Box::new(TermExtractor),
        Box::new(ContrastExtractor),
        Box::new(AntipatternExtractor),
        Box::new(RationaleExtractor),
        Box::new(CodePatternExtractor),
        Box::new(DiagramExtractor),
    ]
}

/// Run every extractor and merge the results into a stable, id-numbered block sequence.
#[tracing::instrument(skip(extractors, doc, ctx))]
pub fn run_extractors(
    extractors: &[Box<dyn Extractor>],
    doc: &AstDocument,
    ctx: &ExtractCtx,
    parallel: bool,
) -> Vec<Block> {
    let outputs: Vec<Vec<Block>> = if parallel && extractors.len() > 1 {
        std::thread::scope(|scope| {
            let handles = extractors
                .iter()
                .map(|extractor| scope.spawn(move || extractor.extract(doc, ctx)))
                .collect::<Vec<_>>();
            handles
                .into_iter()
                .map(|handle| match handle.join() {
                    Ok(blocks) => blocks,
                    Err(panic) => std::panic::resume_unwind(panic),
                })
                .collect()
        })
    } else {
        extractors
            .iter()
            .map(|extractor| extractor.extract(doc, ctx))
            .collect()
    };

    let mut ranked = Vec::new();
    for (rank, (extractor, blocks)) in extractors.iter().zip(outputs).enumerate() {
        tracing::debug!("{} extracted {} blocks", extractor.name(), blocks.len());
        ranked.extend(blocks.into_iter().map(|block| (rank, block)));
    }
    ranked.sort_by_key(|(rank, block)| (block.line_no, *rank));

    let mut ids = IdAllocator::default();
    ranked
        .into_iter()
        .map(|(_, mut block)| {
            ids.assign(&mut block);
            block
        })
        .collect()
}

/// Visit every prose-bearing node (paragraphs and list items, nested ones included) together
/// with its next content sibling.
pub(crate) fn visit_prose<'d>(
    nodes: &'d [AstNode],
    visit: &mut dyn FnMut(&'d AstNode, Option<&'d AstNode>),
) {
    visit_nodes(nodes, &mut |node, next| {
        if node.kind.is_prose() {
            visit(node, next);
        }
    });
}

/// Visit every node, nested ones included, in source order together with its next content
/// sibling.
pub(crate) fn visit_nodes<'d>(
    nodes: &'d [AstNode],
    visit: &mut dyn FnMut(&'d AstNode, Option<&'d AstNode>),
) {
    for (idx, node) in nodes.iter().enumerate() {
        if node.kind == NodeKind::ChapterBoundaryMarker {
            continue;
        }
        let next = nodes[idx + 1..]
            .iter()
            .find(|n| n.kind != NodeKind::ChapterBoundaryMarker);
        visit(node, next);
        visit_nodes(&node.children, visit);
    }
}
