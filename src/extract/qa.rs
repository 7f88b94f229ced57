use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    blocks::{Block, BlockBody, Confidence, Qa},
    codec::{
        ast::{AstDocument, AstNode, NodeKind},
        diagnostic::DiagnosticCode,
    },
    extract::{visit_nodes, ExtractCtx, Extractor},
    text::{plain_text, strip_heading_markup},
};

static QUESTION_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:q|question)\s*[:.]\s*").expect("question prefix"));
static ANSWER_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:a|answer)\s*[:.]\s*").expect("answer prefix"));

/// Interrogative headings and paragraphs paired with the paragraph that answers them.
pub struct QaExtractor;

impl QaExtractor {
    /// Cleaned question text, and whether it was explicitly marked with `Q:`.
    fn question(node: &AstNode) -> Option<(String, bool)> {
        if !(node.kind == NodeKind::Heading || node.kind.is_prose()) {
            return None;
        }
        let text = strip_heading_markup(&plain_text(&node.text));
        if let Some(found) = QUESTION_PREFIX.find(&text) {
            let question = strip_heading_markup(&text[found.end()..]);
            return (!question.is_empty()).then_some((question, true));
        }
        (text.ends_with('?') && text.len() > 1).then_some((text, false))
    }

    fn answer(node: &AstNode) -> String {
        let text = strip_heading_markup(&plain_text(&node.text));
        match ANSWER_PREFIX.find(&text) {
            Some(found) => strip_heading_markup(&text[found.end()..]),
            None => text,
        }
    }
}

impl Extractor for QaExtractor {
    fn name(&self) -> &'static str {
        "qa"
    }

    fn extract(&self, doc: &AstDocument, ctx: &ExtractCtx) -> Vec<Block> {
        let mut blocks = Vec::new();
        visit_nodes(&doc.nodes, &mut |node, next| {
            let Some((question, explicit)) = Self::question(node) else {
                return;
            };
            let answer = next
                .filter(|candidate| candidate.kind.is_prose())
                .filter(|candidate| {
                    ctx.chapters.chapter_for_line(candidate.line_no)
                        == ctx.chapters.chapter_for_line(node.line_no)
                })
                .filter(|candidate| Self::question(candidate).is_none())
                .map(Self::answer)
                .filter(|answer| !answer.is_empty());

            let confidence = match (&answer, explicit) {
                (None, _) => {
                    ctx.bus.warn(
                        DiagnosticCode::ExtQaNoAnswer,
                        format!("question has no answer paragraph: {question}"),
                        node.line_no,
                    );
                    Confidence::Low
                }
                (Some(_), true) => Confidence::High,
                (Some(_), false) => Confidence::Medium,
            };
            blocks.push(
                ctx.block(
                    BlockBody::Qa(Qa {
                        question,
                        answer,
                        synthetic: false,
                    }),
                    node.line_no,
                )
                .with_confidence(confidence),
            );
        });
        blocks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        codec::{
            diagnostic::{Diagnostic, ErrorBus},
            md::parse,
        },
        symbols::SymbolTable,
    };
    use parking_lot::Mutex;
    use test_log::test;

    fn extract(text: &str) -> (Vec<Qa>, Vec<Diagnostic>) {
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
        let blocks = QaExtractor
            .extract(&doc, &ctx)
            .into_iter()
            .filter_map(|b| match b.body {
                BlockBody::Qa(qa) => Some(qa),
                _ => None,
            })
            .collect();
        (blocks, bus.into_sorted())
    }

    #[test]
    fn test_heading_question_with_answer() {
        let (blocks, diagnostics) =
            extract("## What is a mutex?\n\nA lock admitting one holder at a time.\n");
        assert!(diagnostics.is_empty());
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].question, "What is a mutex?");
        assert_eq!(
            blocks[0].answer.as_deref(),
            Some("A lock admitting one holder at a time.")
        );
    }

    #[test]
    fn test_explicit_prefixes_and_residual_markup_are_stripped() {
        let (blocks, _) = extract("Q: ## Why lock?\n\nA: ## Because data races.\n");
        assert_eq!(blocks[0].question, "Why lock?");
        assert_eq!(blocks[0].answer.as_deref(), Some("Because data races."));
        for qa in blocks.iter() {
            assert!(!qa.question.contains("##") && !qa.question.starts_with('#'));
        }
    }

    #[test]
    fn test_answer_never_crosses_chapters() {
        let (blocks, diagnostics) =
            extract("# Chapter 1\n\nWhat comes next?\n\n<!-- CHUNK_BOUNDARY id=\"ch01-end\" -->\n\n# Chapter 2\n\nAnswer text.\n");
        assert_eq!(blocks.len(), 1);
        assert!(blocks[0].answer.is_none());
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::ExtQaNoAnswer);
    }

    #[test]
    fn test_question_not_answered_by_question() {
        let (blocks, _) = extract("Why?\n\nWhy not?\n\nBecause.\n");
        assert_eq!(blocks.len(), 2);
        assert!(blocks[0].answer.is_none());
        assert_eq!(blocks[1].answer.as_deref(), Some("Because."));
    }
}
