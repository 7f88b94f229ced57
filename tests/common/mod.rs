//! Shared test utilities for integration tests.
//!
//! Import from integration test files as:
//! ```ignore
//! mod common;
//! ```

use std::path::PathBuf;

use ssm_compiler::{
    blocks::{Block, BlockKind},
    codec::{CompileOptions, CompileOutput, DocumentCompiler},
};

/// Initialize tracing for tests, respecting RUST_LOG env var.
///
/// Safe to call multiple times; subsequent calls are no-ops.
#[allow(dead_code)]
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

#[allow(dead_code)]
pub fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Contents of `tests/fixtures/<name>`.
#[allow(dead_code)]
pub fn fixture(name: &str) -> String {
    std::fs::read_to_string(fixture_path(name)).unwrap()
}

/// Every Markdown fixture, by file name.
#[allow(dead_code)]
pub fn all_fixtures() -> Vec<(String, String)> {
    let mut names = std::fs::read_dir(fixture_path(""))
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .filter(|name| name.ends_with(".md"))
        .collect::<Vec<_>>();
    names.sort();
    names
        .into_iter()
        .map(|name| {
            let content = fixture(&name);
            (name, content)
        })
        .collect()
}

/// Compile with the default configuration under a public namespace.
#[allow(dead_code)]
pub fn compile_str(source: &str) -> CompileOutput {
    DocumentCompiler::simple()
        .unwrap()
        .compile(source, &CompileOptions::new("public"))
        .unwrap()
}

#[allow(dead_code)]
pub fn blocks_of(output: &CompileOutput, kind: BlockKind) -> Vec<&Block> {
    output
        .blocks
        .iter()
        .filter(|block| block.kind() == kind)
        .collect()
}
