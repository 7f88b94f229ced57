use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    blocks::{Block, BlockBody, Concept, Confidence, Fact},
    codec::ast::AstDocument,
    extract::{visit_prose, ExtractCtx, Extractor},
    symbols::SymbolKind,
    text::plain_text,
};

/// `**Term**: definition`, `**Term:** definition`, `**Term** — definition`
static BOLD_TERM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^\*\*(?P<term>[^*\n]+?)(?:\s*:\s*\*\*|\*\*\s*(?::|—|–|--?))\s*(?P<def>\S.*)$",
    )
    .expect("bold term pattern")
});

/// `A term is defined as ...`
static DEFINED_AS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^(?:(?:an?|the)\s+)?(?P<term>\w[\w\-/ ]{0,60}?)\s+(?:is|are)\s+defined\s+as\s+(?P<def>\S.*)$",
    )
    .expect("defined-as pattern")
});

/// `Note: ...`, `**Important:** ...`
static CALLOUT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\**(?P<label>note|important|tip|key point|key takeaway|remember|warning)(?::\**|\**\s*:)\s*(?P<statement>\S.*)$",
    )
    .expect("callout pattern")
});

/// Concepts from definition shapes, facts from callouts.
pub struct TermExtractor;

impl TermExtractor {
    fn definition(text: &str) -> Option<(String, String, Confidence)> {
        if let Some(captures) = BOLD_TERM.captures(text) {
            let term = plain_text(&captures["term"]);
            let def = plain_text(&captures["def"]);
            return Some((term, def, Confidence::High));
        }
        let plain = plain_text(text);
        let captures = DEFINED_AS.captures(&plain)?;
        Some((
            captures["term"].trim().to_string(),
            captures["def"].trim().to_string(),
            Confidence::Medium,
        ))
    }
}

impl Extractor for TermExtractor {
    fn name(&self) -> &'static str {
        "term"
    }

    fn extract(&self, doc: &AstDocument, ctx: &ExtractCtx) -> Vec<Block> {
        let mut blocks = Vec::new();
        visit_prose(&doc.nodes, &mut |node, _| {
            if let Some(captures) = CALLOUT.captures(&node.text) {
                let label = titlecase::titlecase(&captures["label"].to_lowercase());
                blocks.push(
                    ctx.block(
                        BlockBody::Fact(Fact {
                            label,
                            statement: plain_text(&captures["statement"]),
                        }),
                        node.line_no,
                    )
                    .with_confidence(Confidence::High),
                );
                return;
            }

            let Some((term, definition, confidence)) = Self::definition(&node.text) else {
                return;
            };
            if definition.is_empty() || ctx.register(&term, SymbolKind::Term, node.line_no).is_none()
            {
                return;
            }
            let mut block = ctx
                .block(
                    BlockBody::Concept(Concept {
                        term: term.clone(),
                        definition,
                        ..Default::default()
                    }),
                    node.line_no,
                )
                .with_confidence(confidence);
            block.add_symbol_ref(&term);
            blocks.push(block);
        });
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::{diagnostic::ErrorBus, md::parse},
        symbols::SymbolTable,
    };
    use parking_lot::Mutex;
    use test_log::test;

    fn extract(text: &str) -> (Vec<Block>, SymbolTable) {
        let bus = ErrorBus::new();
        let doc = parse(text, &bus);
        let chapters = doc.chapter_index();
        let sections = doc.section_index();
        let symbols = Mutex::new(SymbolTable::new());
        let ctx = ExtractCtx {
            chapters: &chapters,
            sections: &sections,
            symbols: &symbols,
            bus: &bus,
        };
        let blocks = TermExtractor.extract(&doc, &ctx);
        (blocks, symbols.into_inner())
    }

    fn concept(block: &Block) -> &Concept {
        match &block.body {
            BlockBody::Concept(concept) => concept,
            other => panic!("expected concept, got {other:?}"),
        }
    }

    #[test]
    fn test_definition_shapes() {
        let (blocks, symbols) = extract(
            "**Mutex**: A lock that admits one holder.\n\n\
             **Semaphore:** A counter of permits.\n\n\
             **Barrier** — A meeting point for threads.\n\n\
             - **Latch**: A one-shot barrier.\n\n\
             A critical section is defined as code that touches shared state.\n",
        );
        let terms = blocks
            .iter()
            .map(|b| concept(b).term.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            terms,
            vec!["Mutex", "Semaphore", "Barrier", "Latch", "critical section"]
        );
        assert_eq!(concept(&blocks[0]).definition, "A lock that admits one holder.");
        assert_eq!(blocks[0].confidence, Some(Confidence::High));
        assert_eq!(blocks[4].confidence, Some(Confidence::Medium));
        assert_eq!(blocks[0].symbol_refs, vec!["Mutex"]);
        assert!(symbols.contains("latch"));
    }

    #[test]
    fn test_callouts_become_facts() {
        let (blocks, symbols) = extract("**Note:** Locks are not reentrant.\n\nKey point: keep it short.\n");
        assert_eq!(blocks.len(), 2);
        let BlockBody::Fact(fact) = &blocks[1].body else {
            panic!("expected fact");
        };
        assert_eq!(fact.label, "Key Point");
        assert_eq!(fact.statement, "keep it short.");
        assert!(symbols.is_empty());
    }

    #[test]
    fn test_plain_bold_is_not_a_definition() {
        let (blocks, _) = extract("**Bold** text without a separator.\n");
        assert!(blocks.is_empty());
    }
}
