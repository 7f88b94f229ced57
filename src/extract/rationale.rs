use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    blocks::{Block, BlockBody, Confidence, Rationale},
    codec::ast::AstDocument,
    extract::{visit_prose, ExtractCtx, Extractor},
    text::{plain_text, sentences, trim_clause},
};

static CAUSAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:because|since|the reason|ensures?|so that)\b")
        .expect("causal marker pattern")
});

/// Sentences that explain why: one rationale block per causal sentence.
pub struct RationaleExtractor;

/// Split a sentence around its first causal marker: `(before, marker, after)`.
pub(crate) fn causal_split(sentence: &str) -> Option<(&str, &str, &str)> {
    let found = CAUSAL.find(sentence)?;
    Some((
        &sentence[..found.start()],
        found.as_str(),
        &sentence[found.end()..],
    ))
}

impl RationaleExtractor {
    fn rationale(sentence: &str) -> Option<Rationale> {
        let (before, marker, _) = causal_split(sentence)?;
        let claim = trim_clause(before);
        Some(Rationale {
            explanation: sentence.to_string(),
            marker: marker.to_lowercase(),
            claim: (!claim.is_empty()).then(|| claim.to_string()),
            inference_rule: None,
        })
    }
}

impl Extractor for RationaleExtractor {
    fn name(&self) -> &'static str {
        "rationale"
    }

    fn extract(&self, doc: &AstDocument, ctx: &ExtractCtx) -> Vec<Block> {
        let mut blocks = Vec::new();
        visit_prose(&doc.nodes, &mut |node, _| {
            let text = plain_text(&node.text);
            for sentence in sentences(&text) {
                if let Some(rationale) = Self::rationale(sentence) {
                    let confidence = if rationale.claim.is_some() {
                        Confidence::Medium
                    } else {
                        Confidence::Low
                    };
                    blocks.push(
                        ctx.block(BlockBody::Rationale(rationale), node.line_no)
                            .with_confidence(confidence),
                    );
                }
            }
        });
        blocks
    }
}
