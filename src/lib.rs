//! # ssm-compiler
//!
//! A multi-pass compiler from long-form Markdown reference documents ("bibles") to
//! Structured Semantic Markup (SSM): a flat sequence of typed, annotated knowledge blocks
//! meant for retrieval and embedding pipelines.
//!
//! ## Overview
//!
//! A bible is a Markdown book: chapters (marked by `Chapter N` headings, explicit
//! `CHUNK_BOUNDARY` comments, or both), numbered sections, definitions, warnings, code
//! listings, Q&A, diagrams. The compiler recovers that structure and emits one SSM section per
//! block:
//!
//! ```text
//! ::: concept
//! id: concept-0001
//! chapter_code: 1
//! line_no: 5
//! term: Mutex
//! definition: A lock that admits one holder at a time.
//! :::
//! ```
//!
//! ### Key Features
//!
//! - **Chapter tracking**: heading and marker signals are reconciled, with conflicts reported
//! - **Typed extraction**: concepts, antipatterns, rationales, contrasts, code patterns,
//!   diagrams and Q&A, each with a confidence level
//! - **Ordered enrichment**: fourteen passes that declare the fields they read and write, so
//!   an invalid order is rejected before any document is touched
//! - **Redaction**: secret-shaped text is masked before serialization
//! - **Error tolerance**: problems become diagnostics; only empty or undecodable input fails
//!
//! ## Architecture
//!
//! - **[`codec`]**: Markdown parsing, diagnostics, the SSM writer/reader and the
//!   [`DocumentCompiler`](codec::DocumentCompiler) driver
//! - **[`blocks`]**: The block model and its field rendering
//! - **[`symbols`]**: Case-insensitive symbol table shared by extraction and enrichment
//! - **[`extract`]**: One extractor per block family
//! - **[`enrich`]**: Enrichment passes and the pipeline that orders them
//! - **[`redact`]**: Secret masking
//! - **[`validate`]**: Referential checks over the finished block sequence
//! - **[`config`]**: TOML/YAML compiler configuration
//!
//! ## Quick Start
//!
//! ```rust
//! use ssm_compiler::{compile, codec::CompileOptions};
//!
//! let source = "\
//! # Chapter 1 — Locks
//!
//! **Mutex**: A lock that admits one holder at a time.
//! ";
//! let output = compile(source, &CompileOptions::default()).unwrap();
//! assert!(output.ssm_text.contains("::: concept\n"));
//! assert!(output.ssm_text.contains("term: Mutex\n"));
//! for diagnostic in output.diagnostics.iter() {
//!     eprintln!("{diagnostic}");
//! }
//! ```
//!
//! ### Configuration
//!
//! ```rust
//! use ssm_compiler::{codec::{CompileOptions, DocumentCompiler}, config::CompilerConfig};
//!
//! let config = CompilerConfig::from_toml_str(
//!     r#"
//!     [enrichment]
//!     disabled = ["test_cases"]
//!
//!     [redaction]
//!     exempt_namespaces = ["internal"]
//!     "#,
//! )
//! .unwrap();
//! let compiler = DocumentCompiler::new(config).unwrap();
//! let output = compiler
//!     .compile("# Chapter 1\n\nNote: set password=hunter2 first.\n", &CompileOptions::new("internal"))
//!     .unwrap();
//! assert!(output.ssm_text.contains("hunter2"));
//! ```

pub mod blocks;
pub mod codec;
pub mod config;
pub mod enrich;
pub mod error;
pub mod extract;
pub mod redact;
pub mod symbols;
pub mod text;
pub mod validate;

pub use error::*;

use codec::{CompileOptions, CompileOutput, DocumentCompiler};

/// Compile `source` with the default configuration.
pub fn compile(source: &str, options: &CompileOptions) -> Result<CompileOutput, SsmError> {
    DocumentCompiler::simple()?.compile(source, options)
}

/// Compile UTF-8 `bytes` with the default configuration.
pub fn compile_bytes(bytes: &[u8], options: &CompileOptions) -> Result<CompileOutput, SsmError> {
    DocumentCompiler::simple()?.compile_bytes(bytes, options)
}
