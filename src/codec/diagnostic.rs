//! Diagnostic types for document compilation.
//!
//! This module provides the structured diagnostics every stage reports into, and the
//! [`ErrorBus`] that collects them. Diagnostics never abort compilation: a malformed chapter
//! yields a warning and a best-effort block, never a lost document.

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// How serious a diagnostic is.
///
/// Callers decide whether `Error` fails a build; the compiler itself always produces output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Error,
    Warning,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Error => write!(f, "ERROR"),
            Severity::Warning => write!(f, "WARNING"),
        }
    }
}

/// Stable machine-readable diagnostic codes.
///
/// The `PARSE_` codes come from the stream parser, `EXT_` from extractors, `ENRICH_` from
/// enrichment passes and `VAL_` from the validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DiagnosticCode {
    #[serde(rename = "PARSE_UNCLOSED_FENCE")]
    ParseUnclosedFence,
    #[serde(rename = "PARSE_CHAPTER_CONFLICT")]
    ParseChapterConflict,
    #[serde(rename = "PARSE_UNMATCHED_END_MARKER")]
    ParseUnmatchedEndMarker,
    #[serde(rename = "EXT_ANTIPATTERN_NO_FIX")]
    ExtAntipatternNoFix,
    #[serde(rename = "EXT_QA_NO_ANSWER")]
    ExtQaNoAnswer,
    #[serde(rename = "EXT_EMPTY_CODE")]
    ExtEmptyCode,
    #[serde(rename = "ENRICH_SKIPPED")]
    EnrichSkipped,
    #[serde(rename = "VAL_UNRESOLVED_SYMBOL")]
    ValUnresolvedSymbol,
    #[serde(rename = "VAL_CHAPTER_MISMATCH")]
    ValChapterMismatch,
    #[serde(rename = "VAL_DUPLICATE_ANSWER")]
    ValDuplicateAnswer,
    #[serde(rename = "VAL_SECTION_MISMATCH")]
    ValSectionMismatch,
    #[serde(rename = "VAL_CHAPTER_ORDER")]
    ValChapterOrder,
}

impl DiagnosticCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DiagnosticCode::ParseUnclosedFence => "PARSE_UNCLOSED_FENCE",
            DiagnosticCode::ParseChapterConflict => "PARSE_CHAPTER_CONFLICT",
            DiagnosticCode::ParseUnmatchedEndMarker => "PARSE_UNMATCHED_END_MARKER",
            DiagnosticCode::ExtAntipatternNoFix => "EXT_ANTIPATTERN_NO_FIX",
            DiagnosticCode::ExtQaNoAnswer => "EXT_QA_NO_ANSWER",
            DiagnosticCode::ExtEmptyCode => "EXT_EMPTY_CODE",
            DiagnosticCode::EnrichSkipped => "ENRICH_SKIPPED",
            DiagnosticCode::ValUnresolvedSymbol => "VAL_UNRESOLVED_SYMBOL",
            DiagnosticCode::ValChapterMismatch => "VAL_CHAPTER_MISMATCH",
            DiagnosticCode::ValDuplicateAnswer => "VAL_DUPLICATE_ANSWER",
            DiagnosticCode::ValSectionMismatch => "VAL_SECTION_MISMATCH",
            DiagnosticCode::ValChapterOrder => "VAL_CHAPTER_ORDER",
        }
    }
}

impl fmt::Display for DiagnosticCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single structured problem report with its source location.
///
/// # Examples
///
/// ```
/// # use ssm_compiler::codec::{Diagnostic, DiagnosticCode, Severity};
/// let diagnostic = Diagnostic::warning(
///     DiagnosticCode::ExtQaNoAnswer,
///     "question has no answer paragraph",
///     42,
/// );
/// assert_eq!(diagnostic.severity, Severity::Warning);
/// assert_eq!(diagnostic.to_string(), "WARNING EXT_QA_NO_ANSWER (line 42): question has no answer paragraph");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: DiagnosticCode,
    pub message: String,
    /// 1-based source line, 0 when the problem has no single location
    pub line_no: usize,
}

impl Diagnostic {
    pub fn new(
        severity: Severity,
        code: DiagnosticCode,
        message: impl Into<String>,
        line_no: usize,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            line_no,
        }
    }

    /// Create an error diagnostic
    pub fn error(code: DiagnosticCode, message: impl Into<String>, line_no: usize) -> Self {
        Self::new(Severity::Error, code, message, line_no)
    }

    /// Create a warning diagnostic
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, line_no: usize) -> Self {
        Self::new(Severity::Warning, code, message, line_no)
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (line {}): {}",
            self.severity, self.code, self.line_no, self.message
        )
    }
}

/// Ordered, append-only collector of diagnostics.
///
/// Every stage holds a shared reference to the bus. Appends are internally locked so the
/// extractors can report from worker threads; the final list is sorted by line number
/// (stable, so same-line diagnostics keep their append order).
#[derive(Debug, Default)]
pub struct ErrorBus(Mutex<Vec<Diagnostic>>);

impl ErrorBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, diagnostic: Diagnostic) {
        self.0.lock().push(diagnostic);
    }

    pub fn warn(&self, code: DiagnosticCode, message: impl Into<String>, line_no: usize) {
        let diagnostic = Diagnostic::warning(code, message, line_no);
        tracing::debug!("{}", diagnostic);
        self.push(diagnostic);
    }

    pub fn error(&self, code: DiagnosticCode, message: impl Into<String>, line_no: usize) {
        let diagnostic = Diagnostic::error(code, message, line_no);
        tracing::debug!("{}", diagnostic);
        self.push(diagnostic);
    }

    pub fn extend(&self, diagnostics: impl IntoIterator<Item = Diagnostic>) {
        self.0.lock().extend(diagnostics);
    }

    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    /// Snapshot of the diagnostics recorded so far, in append order.
    pub fn snapshot(&self) -> Vec<Diagnostic> {
        self.0.lock().clone()
    }

    /// Consume the bus, returning diagnostics sorted by line number.
    pub fn into_sorted(self) -> Vec<Diagnostic> {
        let mut diagnostics = self.0.into_inner();
        diagnostics.sort_by_key(|d| d.line_no);
        diagnostics
    }
}
