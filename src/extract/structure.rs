use crate::{
    blocks::{Block, BlockBody, ChapterMeta, Confidence},
    codec::ast::AstDocument,
    extract::{ExtractCtx, Extractor},
    symbols::{chapter_symbol, SymbolKind},
};

/// One chapter-meta block per chapter, in document order.
pub struct StructureExtractor;

impl Extractor for StructureExtractor {
    fn name(&self) -> &'static str {
        "structure"
    }

    fn extract(&self, doc: &AstDocument, ctx: &ExtractCtx) -> Vec<Block> {
        doc.chapters
            .iter()
            .map(|chapter| {
                ctx.register(
                    &chapter_symbol(chapter.code),
                    SymbolKind::Chapter,
                    chapter.start_line,
                );
                let sections = doc
                    .sections
                    .iter()
                    .filter(|s| s.line_no >= chapter.start_line && s.line_no <= chapter.end_line)
                    .map(|s| s.label())
                    .collect();
                let mut block = ctx
                    .block(
                        BlockBody::ChapterMeta(ChapterMeta {
                            code: chapter.code,
                            title: chapter.title.clone(),
                            part: chapter.part.clone(),
                            sections,
                            ..Default::default()
                        }),
                        chapter.start_line,
                    )
                    .with_confidence(Confidence::High);
                // The chapter-meta block describes the chapter itself, not the section above it.
                block.section = None;
                block
            })
            .collect()
    }
}
