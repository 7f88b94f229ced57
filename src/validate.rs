//! Read-only referential-integrity checks over the final block sequence.
//!
//! Broken references are ERRORs; structural oddities that still compile to sensible output
//! are WARNINGs. Nothing here mutates a block.

use std::collections::HashMap;

use crate::{
    blocks::{Block, BlockBody},
    codec::{
        ast::{ChapterIndex, SectionEntry},
        diagnostic::{Diagnostic, DiagnosticCode},
    },
    symbols::SymbolTable,
};

#[tracing::instrument(skip_all)]
pub fn validate(
    blocks: &[Block],
    symbols: &SymbolTable,
    chapters: &ChapterIndex,
    sections: &[SectionEntry],
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    unresolved_symbols(blocks, symbols, &mut diagnostics);
    chapter_mismatches(blocks, chapters, &mut diagnostics);
    duplicate_answers(blocks, &mut diagnostics);
    section_mismatches(sections, chapters, &mut diagnostics);
    chapter_order(chapters, &mut diagnostics);
    tracing::debug!(
        "Validated {} blocks: {} findings",
        blocks.len(),
        diagnostics.len()
    );
    diagnostics
}

fn unresolved_symbols(blocks: &[Block], symbols: &SymbolTable, out: &mut Vec<Diagnostic>) {
    for block in blocks.iter() {
        for name in block.symbol_refs.iter() {
            if !symbols.contains(name) {
                out.push(Diagnostic::error(
                    DiagnosticCode::ValUnresolvedSymbol,
                    format!("{} references unknown symbol '{name}'", block.id),
                    block.line_no,
                ));
            }
        }
    }
}

fn chapter_mismatches(blocks: &[Block], chapters: &ChapterIndex, out: &mut Vec<Diagnostic>) {
    for block in blocks.iter() {
        let expected = chapters.chapter_for_line(block.line_no);
        if block.chapter_code != expected {
            out.push(Diagnostic::error(
                DiagnosticCode::ValChapterMismatch,
                format!(
                    "{} claims chapter {} but line {} lies in chapter {expected}",
                    block.id, block.chapter_code, block.line_no
                ),
                block.line_no,
            ));
        }
    }
}

fn duplicate_answers(blocks: &[Block], out: &mut Vec<Diagnostic>) {
    let mut first_seen: HashMap<&str, &str> = HashMap::new();
    for block in blocks.iter() {
        let BlockBody::Qa(qa) = &block.body else {
            continue;
        };
        let Some(answer) = qa.answer.as_deref() else {
            continue;
        };
        match first_seen.get(answer) {
            Some(first) => out.push(Diagnostic::warning(
                DiagnosticCode::ValDuplicateAnswer,
                format!("{} repeats the answer of {first}", block.id),
                block.line_no,
            )),
            None => {
                first_seen.insert(answer, block.id.as_str());
            }
        }
    }
}

fn section_mismatches(sections: &[SectionEntry], chapters: &ChapterIndex, out: &mut Vec<Diagnostic>) {
    for section in sections.iter() {
        let Some(numbered) = section.number_chapter else {
            continue;
        };
        let chapter = chapters.chapter_for_line(section.line_no);
        if chapter != 0 && chapter != numbered {
            out.push(Diagnostic::warning(
                DiagnosticCode::ValSectionMismatch,
                format!(
                    "section '{}' is numbered for chapter {numbered} but sits in chapter {chapter}",
                    section.label()
                ),
                section.line_no,
            ));
        }
    }
}

fn chapter_order(chapters: &ChapterIndex, out: &mut Vec<Diagnostic>) {
    for pair in chapters.spans().windows(2) {
        if pair[1].code <= pair[0].code {
            out.push(Diagnostic::warning(
                DiagnosticCode::ValChapterOrder,
                format!(
                    "chapter {} follows chapter {} out of order",
                    pair[1].code, pair[0].code
                ),
                pair[1].start_line,
            ));
        }
    }
}
