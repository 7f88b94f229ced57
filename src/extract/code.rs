//! Code fences become code-pattern blocks.
//!
//! Shape recognition is delegated to a per-language [`PatternMatcher`]. Languages without a
//! matcher still produce a block; it simply carries no `pattern_kind` or symbols.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    blocks::{Block, BlockBody, CodePattern, Confidence},
    codec::{
        ast::{AstDocument, NodeKind},
        diagnostic::DiagnosticCode,
    },
    extract::{visit_nodes, ExtractCtx, Extractor},
    symbols::SymbolKind,
};

/// Classifies code in one language family.
pub trait PatternMatcher: Send + Sync {
    /// Fence language tags this matcher handles (lowercase).
    fn languages(&self) -> &'static [&'static str];

    /// A short name for the dominant shape of `code`, e.g. `deny-rule`.
    fn classify(&self, code: &str) -> Option<String>;

    /// Names `code` defines, in order of definition.
    fn symbols(&self, code: &str) -> Vec<String>;
}

fn captures_in_order(regex: &Regex, code: &str, group: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for captures in regex.captures_iter(code) {
        if let Some(name) = captures.name(group) {
            let name = name.as_str().to_string();
            if !out.contains(&name) {
                out.push(name);
            }
        }
    }
    out
}

pub struct RegoMatcher;

static REGO_PACKAGE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s*package\s+(?P<name>[\w.]+)").expect("rego package"));
static REGO_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^(?:default\s+)?(?P<name>[a-z_][\w]*)\s*(?:\[[^\]\n]*\])?\s*(?:contains\s+[^\s{]+\s*)?(?:if\b\s*)?(?:\{|:=|=[^=])",
    )
    .expect("rego rule")
});

impl PatternMatcher for RegoMatcher {
    fn languages(&self) -> &'static [&'static str] {
        &["rego"]
    }

    fn classify(&self, code: &str) -> Option<String> {
        let rules = self.symbols(code);
        ["deny", "violation", "allow", "warn"]
            .iter()
            .find(|kind| rules.iter().any(|rule| rule == *kind))
            .map(|kind| format!("{kind}-rule"))
            .or_else(|| (!rules.is_empty()).then(|| "rule".to_string()))
            .or_else(|| REGO_PACKAGE.is_match(code).then(|| "package".to_string()))
    }

    fn symbols(&self, code: &str) -> Vec<String> {
        let mut names = captures_in_order(&REGO_RULE, code, "name");
        names.retain(|name| !matches!(name.as_str(), "package" | "import" | "default"));
        names
    }
}

pub struct RustMatcher;

static RUST_ITEM: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(?:pub(?:\([^)]*\))?\s+)?(?:async\s+)?(?:unsafe\s+)?(?:const\s+)?(?P<kind>fn|struct|enum|trait|mod|type|const|static)\s+(?P<name>[A-Za-z_]\w*)",
    )
    .expect("rust item")
});
static RUST_IMPL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*impl(?:<[^>]*>)?\s+(?:[\w:]+(?:<[^>]*>)?\s+for\s+)?(?P<name>[A-Za-z_]\w*)")
        .expect("rust impl")
});

impl PatternMatcher for RustMatcher {
    fn languages(&self) -> &'static [&'static str] {
        &["rust", "rs"]
    }

    fn classify(&self, code: &str) -> Option<String> {
        let item = RUST_ITEM.captures(code);
        let item_start = item.as_ref().and_then(|c| c.get(0)).map(|m| m.start());
        if let Some(impl_start) = RUST_IMPL.find(code).map(|m| m.start()) {
            if item_start.map_or(true, |start| impl_start < start) {
                return Some("impl-block".to_string());
            }
        }
        let kind = match &item?["kind"] {
            "fn" => "function-definition",
            "struct" | "enum" | "type" => "type-definition",
            "trait" => "trait-definition",
            "mod" => "module",
            _ => "constant",
        };
        Some(kind.to_string())
    }

    fn symbols(&self, code: &str) -> Vec<String> {
        captures_in_order(&RUST_ITEM, code, "name")
    }
}

pub struct PythonMatcher;

static PYTHON_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^\s*(?:async\s+)?(?P<kind>def|class)\s+(?P<name>[A-Za-z_]\w*)")
        .expect("python def")
});

impl PatternMatcher for PythonMatcher {
    fn languages(&self) -> &'static [&'static str] {
        &["python", "py"]
    }

    fn classify(&self, code: &str) -> Option<String> {
        let captures = PYTHON_DEF.captures(code)?;
        Some(match &captures["kind"] {
            "class" => "class-definition".to_string(),
            _ => "function-definition".to_string(),
        })
    }

    fn symbols(&self, code: &str) -> Vec<String> {
        captures_in_order(&PYTHON_DEF, code, "name")
    }
}

pub struct JavaScriptMatcher;

static JS_DEF: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(?:export\s+)?(?:default\s+)?(?:async\s+)?(?P<kind>function\*?|class)\s+(?P<name>[A-Za-z_$][\w$]*)",
    )
    .expect("javascript def")
});
static JS_ARROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?m)^\s*(?:export\s+)?(?:const|let|var)\s+(?P<name>[A-Za-z_$][\w$]*)\s*=\s*(?:async\s*)?(?:\([^)]*\)|[A-Za-z_$][\w$]*)\s*=>",
    )
    .expect("javascript arrow")
});

impl PatternMatcher for JavaScriptMatcher {
    fn languages(&self) -> &'static [&'static str] {
        &["javascript", "js", "jsx", "typescript", "ts", "tsx", "mjs"]
    }

    fn classify(&self, code: &str) -> Option<String> {
        if let Some(captures) = JS_DEF.captures(code) {
            return Some(if &captures["kind"] == "class" {
                "class-definition".to_string()
            } else {
                "function-definition".to_string()
            });
        }
        JS_ARROW
            .is_match(code)
            .then(|| "function-definition".to_string())
    }

    fn symbols(&self, code: &str) -> Vec<String> {
        let mut names = captures_in_order(&JS_DEF, code, "name");
        for name in captures_in_order(&JS_ARROW, code, "name") {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }
}

static MATCHERS: Lazy<Vec<Box<dyn PatternMatcher>>> = Lazy::new(|| {
    vec![
        Box::new(RegoMatcher),
        Box::new(RustMatcher),
        Box::new(PythonMatcher),
        Box::new(JavaScriptMatcher),
    ]
});

pub fn matcher_for(language: &str) -> Option<&'static dyn PatternMatcher> {
    MATCHERS
        .iter()
        .find(|matcher| matcher.languages().contains(&language))
        .map(|matcher| matcher.as_ref())
}

/// Every code fence, tagged with its fence language (`text` when absent).
pub struct CodePatternExtractor;

impl Extractor for CodePatternExtractor {
    fn name(&self) -> &'static str {
        "code-pattern"
    }

    fn extract(&self, doc: &AstDocument, ctx: &ExtractCtx) -> Vec<Block> {
        let mut blocks = Vec::new();
        visit_nodes(&doc.nodes, &mut |node, _| {
            if node.kind != NodeKind::CodeFence {
                return;
            }
            let language = node
                .language
                .as_deref()
                .map(|lang| lang.to_lowercase())
                .unwrap_or_else(|| "text".to_string());
            let code_body = node.text.trim_end_matches(['\n', '\r']).to_string();

            if code_body.trim().is_empty() {
                ctx.bus.warn(
                    DiagnosticCode::ExtEmptyCode,
                    format!("empty {language} code fence"),
                    node.line_no,
                );
                blocks.push(
                    ctx.block(
                        BlockBody::CodePattern(CodePattern {
                            language,
                            ..Default::default()
                        }),
                        node.line_no,
                    )
                    .with_confidence(Confidence::Low),
                );
                return;
            }

            let (pattern_kind, symbols) = match matcher_for(&language) {
                Some(matcher) => (matcher.classify(&code_body), matcher.symbols(&code_body)),
                None => (None, Vec::new()),
            };
            let registered = symbols
                .iter()
                .filter(|symbol| ctx.register(symbol, SymbolKind::Code, node.line_no).is_some())
                .cloned()
                .collect::<Vec<_>>();
            let confidence = if pattern_kind.is_some() {
                Confidence::High
            } else {
                Confidence::Medium
            };
            let mut block = ctx
                .block(
                    BlockBody::CodePattern(CodePattern {
                        language,
                        line_count: code_body.lines().count(),
                        code_body,
                        pattern_kind,
                        symbols: symbols.clone(),
                        test_cases: Vec::new(),
                    }),
                    node.line_no,
                )
                .with_confidence(confidence);
            for symbol in registered.iter() {
                block.add_symbol_ref(symbol);
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
    fn test_rego_rules() {
        let code = "package authz\n\ndefault allow := false\n\nallow if {\n  input.user == \"admin\"\n}\n\ndeny contains msg if {\n  not input.user\n  msg := \"anonymous\"\n}\n";
        let matcher = matcher_for("rego").unwrap();
        assert_eq!(matcher.symbols(code), vec!["allow", "deny"]);
        assert_eq!(matcher.classify(code).as_deref(), Some("deny-rule"));
    }

    #[test]
    fn test_rust_items() {
        let code = "pub struct Guard;\n\nimpl Drop for Guard {\n    fn drop(&mut self) {}\n}\n\npub async fn acquire() {}\n";
        let matcher = matcher_for("rust").unwrap();
        assert_eq!(matcher.symbols(code), vec!["Guard", "drop", "acquire"]);
        assert_eq!(matcher.classify(code).as_deref(), Some("type-definition"));
        assert_eq!(
            matcher.classify("impl Guard {\n    fn new() {}\n}\n").as_deref(),
            Some("impl-block")
        );
    }

    #[test]
    fn test_python_and_javascript() {
        let python = matcher_for("py").unwrap();
        assert_eq!(python.symbols("class Pool:\n    def get(self):\n        pass\n"), vec![
            "Pool", "get"
        ]);
        let js = matcher_for("javascript").unwrap();
        assert_eq!(js.symbols("function test(){}"), vec!["test"]);
        assert_eq!(
            js.symbols("export const add = (a, b) => a + b;\n"),
            vec!["add"]
        );
        assert_eq!(
            js.classify("function test(){}").as_deref(),
            Some("function-definition")
        );
        assert!(matcher_for("cobol").is_none());
    }
}
