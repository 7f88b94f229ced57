use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    blocks::{Block, BlockBody, Confidence, Diagram},
    codec::ast::{AstDocument, NodeKind},
    extract::{visit_nodes, ExtractCtx, Extractor},
};

static ARROW: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\s*(?:-\.->|==>|-->>|->>|-->|->|---)\s*(?:\|[^|]*\|\s*)?").expect("arrow pattern")
});
static NODE_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^"?(?P<id>[A-Za-z_][\w]*)"#).expect("node id pattern"));

/// Diagram fences, with Mermaid/Graphviz style edges lifted into `nodes` and `edges`.
pub struct DiagramExtractor;

impl DiagramExtractor {
    fn diagram_type(language: &str, source: &str) -> String {
        source
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with("%%") && !line.starts_with("//"))
            .and_then(|line| line.split_whitespace().next())
            .map(|word| word.trim_start_matches('@').trim_end_matches(['{', ';', ':']))
            .map(|word| match word {
                "startuml" => "uml".to_string(),
                other => other.to_string(),
            })
            .filter(|word| !word.is_empty())
            .unwrap_or_else(|| language.to_string())
    }

    fn graph(source: &str) -> (Vec<String>, Vec<String>) {
        let mut nodes: Vec<String> = Vec::new();
        let mut edges: Vec<String> = Vec::new();
        for line in source.lines() {
            let parts = ARROW.split(line.trim()).collect::<Vec<_>>();
            if parts.len() < 2 {
                continue;
            }
            let ids = parts
                .iter()
                .filter_map(|part| NODE_ID.captures(part.trim()))
                .map(|captures| captures["id"].to_string())
                .collect::<Vec<_>>();
            if ids.len() != parts.len() {
                continue;
            }
            for id in ids.iter() {
                if !nodes.contains(id) {
                    nodes.push(id.clone());
                }
            }
            for pair in ids.windows(2) {
                let edge = format!("{} -> {}", pair[0], pair[1]);
                if !edges.contains(&edge) {
                    edges.push(edge);
                }
            }
        }
        (nodes, edges)
    }
}

impl Extractor for DiagramExtractor {
    fn name(&self) -> &'static str {
        "diagram"
    }

    fn extract(&self, doc: &AstDocument, ctx: &ExtractCtx) -> Vec<Block> {
        let mut blocks = Vec::new();
        visit_nodes(&doc.nodes, &mut |node, _| {
            if node.kind != NodeKind::DiagramFence {
                return;
            }
            let language = node
                .language
                .as_deref()
                .map(|lang| lang.to_lowercase())
                .unwrap_or_else(|| "text".to_string());
            let source = node.text.trim_end_matches(['\n', '\r']).to_string();
            let (nodes, edges) = Self::graph(&source);
            let confidence = if edges.is_empty() {
                Confidence::Medium
            } else {
                Confidence::High
            };
            blocks.push(
                ctx.block(
                    BlockBody::Diagram(Diagram {
                        diagram_type: Self::diagram_type(&language, &source),
                        language,
                        source,
                        nodes,
                        edges,
                    }),
                    node.line_no,
                )
                .with_confidence(confidence),
            );
        });
        blocks
    }
}
