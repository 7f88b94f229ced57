//! Passes that relate blocks to each other: symbol links, chapter summaries and reasoning
//! chains.

use enumset::EnumSet;
use petgraph::{
    graph::{DiGraph, NodeIndex},
    visit::EdgeRef,
    Direction,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};

use crate::{
    blocks::{Block, BlockBody, BlockKind, Confidence, Graph, IdAllocator},
    codec::diagnostic::{DiagnosticCode, ErrorBus},
    enrich::{EnrichmentPass, Field},
    symbols::{SymbolKind, SymbolTable},
    text::{first_sentence, plain_text},
};

/// Symbols shared by more blocks than this say nothing about how two blocks relate.
const UBIQUITOUS_SYMBOL: usize = 24;

const MAX_KEY_TERMS: usize = 10;
const MAX_CHAINS: usize = 64;
const MAX_CHAIN_LEN: usize = 12;
/// Edge expansions allowed per reasoning-chain search.
const MAX_CHAIN_STEPS: usize = 4096;

/// Kinds produced by enrichment rather than read from the source.
fn is_derived(block: &Block) -> bool {
    match &block.body {
        BlockBody::Relation(_) | BlockBody::Graph(_) | BlockBody::Example(_) => true,
        BlockBody::Qa(qa) => qa.synthetic,
        _ => false,
    }
}

pub struct BidirectionalLinks;

impl EnrichmentPass for BidirectionalLinks {
    fn name(&self) -> &'static str {
        "bidirectional_links"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::Text | Field::CodeBody | Field::SymbolRefs
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::SymbolRefs | Field::Links
    }

    fn apply(&self, blocks: &mut Vec<Block>, symbols: &mut SymbolTable, bus: &ErrorBus) {
        let matcher = match symbols.mention_matcher() {
            Ok(matcher) => matcher,
            Err(err) => {
                bus.warn(
                    DiagnosticCode::EnrichSkipped,
                    format!("bidirectional_links: cannot build symbol matcher: {err}"),
                    0,
                );
                None
            }
        };

        for block in blocks.iter_mut() {
            let mut canonical: Vec<String> = Vec::new();
            for name in block.symbol_refs.iter() {
                let name = symbols.resolve(name).unwrap_or(name).to_string();
                if !canonical.contains(&name) {
                    canonical.push(name);
                }
            }
            block.symbol_refs = canonical;
        }

        if let Some(matcher) = matcher.as_ref() {
            for block in blocks.iter_mut() {
                let mut text = block.text();
                if let Some(code) = block.code() {
                    text.push('\n');
                    text.push_str(code);
                }
                for name in matcher.mentions(&text) {
                    block.add_symbol_ref(&name);
                }
            }
        }

        let mut holders: BTreeMap<String, BTreeSet<usize>> = BTreeMap::new();
        for (idx, block) in blocks.iter().enumerate() {
            for name in block.symbol_refs.iter() {
                symbols.add_reference(name, &block.id);
                if let Some(canonical) = symbols.resolve(name) {
                    holders.entry(canonical.to_string()).or_default().insert(idx);
                }
            }
        }

        let mut links: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); blocks.len()];
        for holding in holders.values() {
            if holding.len() < 2 || holding.len() > UBIQUITOUS_SYMBOL {
                continue;
            }
            for a in holding.iter() {
                for b in holding.iter() {
                    if a != b {
                        links[*a].insert(*b);
                    }
                }
            }
        }
        let ids = blocks.iter().map(|b| b.id.clone()).collect::<Vec<_>>();
        for (block, linked) in blocks.iter_mut().zip(links) {
            for idx in linked {
                if !block.meta.links.contains(&ids[idx]) {
                    block.meta.links.push(ids[idx].clone());
                }
            }
        }
    }
}

pub struct ChapterSummaries;

impl ChapterSummaries {
    fn summary(title: Option<&str>, members: &[&Block]) -> Option<String> {
        let sentences = members
            .iter()
            .filter(|b| {
                matches!(
                    b.kind(),
                    BlockKind::Concept | BlockKind::Fact | BlockKind::Rationale | BlockKind::Antipattern
                )
            })
            .filter_map(|b| {
                let text = plain_text(&b.text());
                first_sentence(&text).map(|s| s.to_string())
            })
            .take(3)
            .collect::<Vec<_>>();
        match (sentences.is_empty(), title) {
            (false, _) => Some(sentences.join(" ")),
            (true, Some(title)) => Some(format!("Covers {title}.")),
            (true, None) => None,
        }
    }
}

impl EnrichmentPass for ChapterSummaries {
    fn name(&self) -> &'static str {
        "chapter_summaries"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::ChapterInfo | Field::ChapterCode | Field::SymbolRefs | Field::Text | Field::Term
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::Summary | Field::KeyTerms | Field::Prerequisites | Field::Pathway
    }

    fn apply(&self, blocks: &mut Vec<Block>, symbols: &mut SymbolTable, bus: &ErrorBus) {
        // Document order of chapters
        let order = blocks
            .iter()
            .filter_map(|b| match &b.body {
                BlockBody::ChapterMeta(meta) => Some(meta.code),
                _ => None,
            })
            .collect::<Vec<_>>();
        let position = |code: u32| order.iter().position(|c| *c == code);

        let mut computed: Vec<(usize, Option<String>, Vec<String>, Vec<u32>)> = Vec::new();
        for (idx, block) in blocks.iter().enumerate() {
            let BlockBody::ChapterMeta(meta) = &block.body else {
                continue;
            };
            let Some(own_position) = position(meta.code) else {
                continue;
            };
            let members = blocks
                .iter()
                .filter(|b| b.chapter_code == meta.code && b.kind() != BlockKind::ChapterMeta)
                .filter(|b| !is_derived(b))
                .collect::<Vec<_>>();

            let summary = Self::summary(meta.title.as_deref(), &members);
            if summary.is_none() {
                bus.warn(
                    DiagnosticCode::EnrichSkipped,
                    format!(
                        "chapter_summaries: chapter {} has neither title nor summarizable content",
                        meta.code
                    ),
                    block.line_no,
                );
            }

            let mut key_terms: Vec<String> = Vec::new();
            for member in members.iter() {
                let terms: Vec<&str> = match &member.body {
                    BlockBody::Concept(concept) => vec![concept.term.as_str()],
                    BlockBody::Contrast(contrast) => {
                        vec![contrast.concept_a.as_str(), contrast.concept_b.as_str()]
                    }
                    _ => Vec::new(),
                };
                for term in terms {
                    let term = symbols.resolve(term).unwrap_or(term).to_string();
                    if !key_terms.contains(&term) {
                        key_terms.push(term);
                    }
                }
            }
            let mut introduced = symbols
                .of_kind(SymbolKind::Term)
                .filter(|info| info.first_chapter == meta.code)
                .collect::<Vec<_>>();
            introduced.sort_by_key(|info| info.first_line);
            for info in introduced {
                if !key_terms.contains(&info.name) {
                    key_terms.push(info.name.clone());
                }
            }
            key_terms.truncate(MAX_KEY_TERMS);

            let mut prerequisites = members
                .iter()
                .flat_map(|member| member.symbol_refs.iter())
                .filter_map(|name| symbols.get(name))
                .filter(|info| info.kind != SymbolKind::Chapter)
                .map(|info| info.first_chapter)
                .filter(|code| position(*code).is_some_and(|p| p < own_position))
                .collect::<Vec<_>>();
            prerequisites.sort_by_key(|code| position(*code));
            prerequisites.dedup();

            computed.push((idx, summary, key_terms, prerequisites));
        }

        let direct: HashMap<u32, Vec<u32>> = computed
            .iter()
            .filter_map(|(idx, _, _, prerequisites)| match &blocks[*idx].body {
                BlockBody::ChapterMeta(meta) => Some((meta.code, prerequisites.clone())),
                _ => None,
            })
            .collect();

        for (idx, summary, key_terms, prerequisites) in computed {
            let BlockBody::ChapterMeta(meta) = &mut blocks[idx].body else {
                continue;
            };
            // Transitive prerequisites, then the chapter itself.
            let mut reached = BTreeSet::new();
            let mut stack = prerequisites.clone();
            while let Some(code) = stack.pop() {
                if reached.insert(code) {
                    stack.extend(direct.get(&code).into_iter().flatten().copied());
                }
            }
            let mut pathway = reached.into_iter().collect::<Vec<_>>();
            pathway.sort_by_key(|code| position(*code));
            pathway.push(meta.code);

            meta.summary = summary;
            meta.key_terms = key_terms;
            meta.prerequisites = prerequisites;
            meta.pathway = pathway;
        }
    }
}

/// Outgoing edges of `node` as `(relation index, target)`, in document order.
fn outgoing(graph: &DiGraph<String, usize>, node: NodeIndex) -> Vec<(usize, NodeIndex)> {
    let mut edges = graph
        .edges_directed(node, Direction::Outgoing)
        .map(|edge| (*edge.weight(), edge.target()))
        .collect::<Vec<_>>();
    edges.sort();
    edges
}

/// Simple paths of at least three nodes from a source (no incoming edge) to a sink (no
/// outgoing edge), found depth-first in document order.
///
/// The search stops after `MAX_CHAINS` paths or `MAX_CHAIN_STEPS` edge expansions, so dense
/// relation graphs cost the same bounded amount of work as sparse ones.
fn chain_paths(graph: &DiGraph<String, usize>) -> Vec<Vec<NodeIndex>> {
    let mut starts = graph
        .node_indices()
        .filter(|n| graph.neighbors_directed(*n, Direction::Incoming).next().is_none())
        .filter_map(|n| outgoing(graph, n).first().map(|(relation, _)| (*relation, n)))
        .collect::<Vec<_>>();
    starts.sort();

    let mut paths = Vec::new();
    let mut steps = 0;
    for (_, start) in starts {
        let mut path = vec![start];
        let mut stack = vec![outgoing(graph, start).into_iter()];
        loop {
            if paths.len() >= MAX_CHAINS || steps >= MAX_CHAIN_STEPS {
                return paths;
            }
            let next = match stack.last_mut() {
                Some(children) => children.next(),
                None => break,
            };
            let Some((_, next)) = next else {
                stack.pop();
                path.pop();
                continue;
            };
            steps += 1;
            if path.contains(&next) {
                continue;
            }
            let children = outgoing(graph, next);
            if children.is_empty() {
                if path.len() >= 2 {
                    let mut found = path.clone();
                    found.push(next);
                    paths.push(found);
                }
            } else if path.len() + 1 < MAX_CHAIN_LEN {
                path.push(next);
                stack.push(children.into_iter());
            }
        }
    }
    paths
}

pub struct ReasoningChains;

impl EnrichmentPass for ReasoningChains {
    fn name(&self) -> &'static str {
        "reasoning_chains"
    }

    fn reads(&self) -> EnumSet<Field> {
        Field::Relations.into()
    }

    fn writes(&self) -> EnumSet<Field> {
        Field::Graph.into()
    }

    fn apply(&self, blocks: &mut Vec<Block>, symbols: &mut SymbolTable, _bus: &ErrorBus) {
        let mut graph: DiGraph<String, usize> = DiGraph::new();
        let mut nodes: HashMap<String, NodeIndex> = HashMap::new();
        let mut node_for = |graph: &mut DiGraph<String, usize>, label: &str| {
            let key = label.to_lowercase();
            *nodes
                .entry(key)
                .or_insert_with(|| graph.add_node(label.to_string()))
        };

        for (idx, block) in blocks.iter().enumerate() {
            let BlockBody::Relation(relation) = &block.body else {
                continue;
            };
            if relation.relation == "contrasts-with" {
                continue;
            }
            let source = node_for(&mut graph, &relation.source);
            let target = node_for(&mut graph, &relation.target);
            if source != target && graph.find_edge(source, target).is_none() {
                graph.add_edge(source, target, idx);
            }
        }
        if graph.edge_count() < 2 {
            return;
        }

        let mut chains = chain_paths(&graph)
            .into_iter()
            .map(|path| {
                let first_relation = graph
                    .find_edge(path[0], path[1])
                    .and_then(|edge| graph.edge_weight(edge))
                    .copied()
                    .unwrap_or(usize::MAX);
                (first_relation, path)
            })
            .collect::<Vec<_>>();
        chains.sort_by(|a, b| {
            (blocks.get(a.0).map(|b| b.line_no), a.0, &a.1)
                .cmp(&(blocks.get(b.0).map(|b| b.line_no), b.0, &b.1))
        });
        chains.truncate(MAX_CHAINS);

        let mut ids = IdAllocator::from_blocks(blocks);
        for (first_relation, path) in chains {
            let Some(anchor) = blocks.get(first_relation) else {
                continue;
            };
            let relation_ids = path
                .windows(2)
                .filter_map(|pair| graph.find_edge(pair[0], pair[1]))
                .filter_map(|edge| graph.edge_weight(edge))
                .filter_map(|idx| blocks.get(*idx).map(|b| b.id.clone()))
                .collect::<Vec<_>>();
            let chain = path
                .iter()
                .map(|n| graph[*n].clone())
                .collect::<Vec<_>>();
            let mut block = Block::new(
                BlockBody::Graph(Graph {
                    chain: chain.clone(),
                    relations: relation_ids,
                }),
                anchor.chapter_code,
                anchor.line_no,
            )
            .with_section(anchor.section.as_deref())
            .with_confidence(Confidence::Low);
            for label in chain.iter() {
                if let Some(canonical) = symbols.resolve(label) {
                    let canonical = canonical.to_string();
                    block.add_symbol_ref(&canonical);
                }
            }
            ids.assign(&mut block);
            blocks.push(block);
        }
    }
}
