//! Reading bible Markdown and writing SSM.
//!
//! ## Key Components
//!
//! - [`PatternSet`] - Compiled chapter, section and boundary-marker patterns
//! - [`md::StreamParser`] - Markdown to [`ast::AstDocument`], with chapter and section tracking
//! - [`ErrorBus`] - Shared diagnostic sink every stage reports into
//! - [`DocumentCompiler`] - Runs parse, extraction, enrichment, redaction and validation
//! - [`ssm`] - SSM serializer and the matching section reader
//!
//! ## Compilation Stages
//!
//! 1. **Parse**: one streaming pass over pulldown-cmark events builds the node tree and the
//!    chapter/section indexes
//! 2. **Extract**: independent extractors turn nodes into typed blocks, registering symbols
//! 3. **Enrich**: ordered passes annotate blocks and append derived ones
//! 4. **Redact**: secret-shaped text is masked unless the namespace is exempt
//! 5. **Validate**: referential checks over the final block sequence
//! 6. **Serialize**: blocks are written as `::: <kind>` sections
//!
//! Problems found along the way never abort a compile; they are collected as [`Diagnostic`]s
//! and returned next to the output.

pub mod ast;
pub mod compiler;
pub mod diagnostic;
pub mod md;
pub mod patterns;
pub mod ssm;

pub use compiler::{CompileOptions, CompileOutput, DocumentCompiler};
pub use diagnostic::{Diagnostic, DiagnosticCode, ErrorBus, Severity};
pub use patterns::{PatternConfig, PatternSet};
pub use ssm::{parse_sections, serialize, SsmSection};
