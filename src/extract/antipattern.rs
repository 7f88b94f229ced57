use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    blocks::{Antipattern, Block, BlockBody, Confidence, SeverityLevel},
    codec::{ast::AstDocument, diagnostic::DiagnosticCode},
    extract::{visit_prose, ExtractCtx, Extractor},
    text::{plain_text, sentences},
};

static NEGATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:don['’]t|do not|mistakes?|anti-?patterns?|avoid|pitfalls?)\b")
        .expect("negative marker pattern")
});

static CORRECTIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:instead|use|correct|correctly|prefer)\b")
        .expect("corrective marker pattern")
});

static HIGH_SEVERITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:vulnerabilit(?:y|ies)|vulnerable|security|insecure)\b")
        .expect("severity pattern")
});

/// Problems flagged by negative markers, paired with the correction that follows them.
pub struct AntipatternExtractor;

impl AntipatternExtractor {
    /// Problem sentence and, when present in the same paragraph, its fix.
    fn problem_and_fix(text: &str) -> Option<(String, Option<String>)> {
        let sentences = sentences(text);
        let (idx, problem) = sentences
            .iter()
            .enumerate()
            .find(|(_, sentence)| NEGATIVE.is_match(sentence))?;

        // `Avoid X; use Y instead.`
        if let Some((head, tail)) = problem.split_once(';') {
            if CORRECTIVE.is_match(tail) && NEGATIVE.is_match(head) {
                return Some((
                    format!("{}.", head.trim()),
                    Some(tail.trim().to_string()),
                ));
            }
        }

        let fix = sentences[idx + 1..]
            .iter()
            .find(|sentence| CORRECTIVE.is_match(sentence))
            .map(|sentence| sentence.to_string());
        Some((problem.to_string(), fix))
    }
}

impl Extractor for AntipatternExtractor {
    fn name(&self) -> &'static str {
        "antipattern"
    }

    fn extract(&self, doc: &AstDocument, ctx: &ExtractCtx) -> Vec<Block> {
        let mut blocks = Vec::new();
        visit_prose(&doc.nodes, &mut |node, next| {
            let text = plain_text(&node.text);
            let Some((problem, mut fix)) = Self::problem_and_fix(&text) else {
                return;
            };

            if fix.is_none() {
                fix = next
                    .filter(|sibling| sibling.kind.is_prose())
                    .filter(|sibling| ctx.same_context(node.line_no, sibling.line_no))
                    .map(|sibling| plain_text(&sibling.text))
                    .filter(|sibling| {
                        CORRECTIVE.is_match(sibling) && !NEGATIVE.is_match(sibling)
                    });
            }

            let severity = if HIGH_SEVERITY.is_match(&text)
                || fix.as_deref().is_some_and(|f| HIGH_SEVERITY.is_match(f))
            {
                SeverityLevel::High
            } else {
                SeverityLevel::Medium
            };

            let confidence = if fix.is_some() {
                Confidence::High
            } else {
                ctx.bus.warn(
                    DiagnosticCode::ExtAntipatternNoFix,
                    format!("antipattern without a corrective statement: {problem}"),
                    node.line_no,
                );
                Confidence::Low
            };

            blocks.push(
                ctx.block(
                    BlockBody::Antipattern(Antipattern {
                        problem,
                        severity,
                        fix,
                        smells: Vec::new(),
                        do_this: None,
                        dont_this: None,
                    }),
                    node.line_no,
                )
                .with_confidence(confidence),
            );
        });
        blocks
    }
}
