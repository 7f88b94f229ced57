use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    blocks::{Block, BlockBody, Confidence, Contrast},
    codec::ast::{AstDocument, NodeKind},
    extract::{visit_nodes, ExtractCtx, Extractor},
    symbols::SymbolKind,
    text::{first_sentence, plain_text, trim_clause},
};

static VERSUS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?P<a>[\w][\w\-+#]*(?:\.[\w]+)*)\s+(?:vs\.?|versus)\s+(?P<b>[\w][\w\-+#]*(?:\.[\w]+)*)",
    )
    .expect("versus pattern")
});

/// `X vs Y` comparisons in headings and prose; the first per node.
pub struct ContrastExtractor;

impl ContrastExtractor {
    fn contrast(text: &str) -> Option<Contrast> {
        let captures = VERSUS.captures(text)?;
        let whole = captures.get(0)?;
        let rest = text[whole.end()..]
            .trim_start_matches(|c: char| c.is_whitespace() || ":,;-—–.".contains(c));
        let before = trim_clause(&text[..whole.start()]);
        let distinction = if !trim_clause(rest).is_empty() {
            trim_clause(rest).to_string()
        } else {
            before.to_string()
        };
        Some(Contrast {
            concept_a: captures["a"].to_string(),
            concept_b: captures["b"].to_string(),
            distinction,
        })
    }
}

impl Extractor for ContrastExtractor {
    fn name(&self) -> &'static str {
        "contrast"
    }

    fn extract(&self, doc: &AstDocument, ctx: &ExtractCtx) -> Vec<Block> {
        let mut blocks = Vec::new();
        visit_nodes(&doc.nodes, &mut |node, next| {
            if !(node.kind.is_prose() || node.kind == NodeKind::Heading) {
                return;
            }
            let text = plain_text(&node.text);
            let Some(mut contrast) = Self::contrast(&text) else {
                return;
            };
            if contrast.distinction.is_empty() && node.kind == NodeKind::Heading {
                // A bare `A vs B` heading: the paragraph under it draws the distinction.
                if let Some(sibling) = next.filter(|n| n.kind.is_prose()) {
                    let sibling = plain_text(&sibling.text);
                    contrast.distinction =
                        first_sentence(&sibling).unwrap_or_default().to_string();
                }
            }
            let registered = [&contrast.concept_a, &contrast.concept_b]
                .map(|name| ctx.register(name, SymbolKind::Term, node.line_no).is_some());
            let confidence = if contrast.distinction.is_empty() {
                Confidence::Low
            } else {
                Confidence::Medium
            };
            let mut block = ctx
                .block(BlockBody::Contrast(contrast.clone()), node.line_no)
                .with_confidence(confidence);
            for (name, registered) in [&contrast.concept_a, &contrast.concept_b]
                .into_iter()
                .zip(registered)
            {
                if registered {
                    block.add_symbol_ref(name);
                }
            }
            blocks.push(block);
        });
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_versus_shapes() {
        let contrast = ContrastExtractor::contrast("Mutex vs RwLock: exclusive versus shared reads.")
            .unwrap();
        assert_eq!(contrast.concept_a, "Mutex");
        assert_eq!(contrast.concept_b, "RwLock");
        assert_eq!(contrast.distinction, "exclusive versus shared reads.");

        let contrast = ContrastExtractor::contrast("Threads vs. tasks").unwrap();
        assert_eq!(contrast.concept_b, "tasks");
        assert!(contrast.distinction.is_empty());

        let contrast =
            ContrastExtractor::contrast("Pick carefully between TCP versus UDP").unwrap();
        assert_eq!(contrast.concept_a, "TCP");
        assert_eq!(contrast.distinction, "Pick carefully between");
        assert!(ContrastExtractor::contrast("No comparison here.").is_none());
    }
}
