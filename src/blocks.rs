//! [crate::blocks] contains the typed knowledge blocks that extraction produces, enrichment
//! decorates, and the serializer writes out as SSM sections.
//!
//! Every block shares a small set of common fields ([`Block`]) and carries exactly one
//! kind-specific payload ([`BlockBody`]). There are no free-form attribute bags: a field that
//! a block kind does not declare cannot be set on it.

use serde::{Deserialize, Serialize};
use std::{
    collections::{HashMap, HashSet},
    fmt::{Display, Formatter},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BlockKind {
    Concept,
    Fact,
    Example,
    Antipattern,
    CodePattern,
    Diagram,
    Qa,
    Relation,
    Graph,
    ChapterMeta,
    Rationale,
    Contrast,
}

impl BlockKind {
    pub const ALL: [BlockKind; 12] = [
        BlockKind::Concept,
        BlockKind::Fact,
        BlockKind::Example,
        BlockKind::Antipattern,
        BlockKind::CodePattern,
        BlockKind::Diagram,
        BlockKind::Qa,
        BlockKind::Relation,
        BlockKind::Graph,
        BlockKind::ChapterMeta,
        BlockKind::Rationale,
        BlockKind::Contrast,
    ];

    /// The SSM section tag (`::: <tag>`).
    pub fn tag(&self) -> &'static str {
        match self {
            BlockKind::Concept => "concept",
            BlockKind::Fact => "fact",
            BlockKind::Example => "example",
            BlockKind::Antipattern => "antipattern",
            BlockKind::CodePattern => "code-pattern",
            BlockKind::Diagram => "diagram",
            BlockKind::Qa => "qa",
            BlockKind::Relation => "relation",
            BlockKind::Graph => "graph",
            BlockKind::ChapterMeta => "chapter-meta",
            BlockKind::Rationale => "rationale",
            BlockKind::Contrast => "contrast",
        }
    }

    pub fn from_tag(tag: &str) -> Option<BlockKind> {
        BlockKind::ALL.iter().copied().find(|kind| kind.tag() == tag)
    }
}

impl Display for BlockKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Beginner => "beginner",
            Difficulty::Intermediate => "intermediate",
            Difficulty::Advanced => "advanced",
        }
    }
}

/// How harmful an antipattern is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeverityLevel {
    Medium,
    High,
}

impl SeverityLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SeverityLevel::Medium => "medium",
            SeverityLevel::High => "high",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Concept {
    pub term: String,
    pub definition: String,
    pub intuition: Option<String>,
    /// Ids of example blocks illustrating the concept
    pub examples: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fact {
    pub label: String,
    pub statement: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub concept: String,
    /// Id of the code-pattern block that illustrates `concept`
    pub code_ref: String,
    pub language: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Antipattern {
    pub problem: String,
    pub severity: SeverityLevel,
    pub fix: Option<String>,
    pub smells: Vec<String>,
    pub do_this: Option<String>,
    pub dont_this: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodePattern {
    pub language: String,
    pub code_body: String,
    pub line_count: usize,
    pub pattern_kind: Option<String>,
    pub symbols: Vec<String>,
    pub test_cases: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagram {
    pub language: String,
    pub diagram_type: String,
    pub source: String,
    pub nodes: Vec<String>,
    /// Edges rendered as `from -> to`
    pub edges: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Qa {
    pub question: String,
    pub answer: Option<String>,
    /// Generated by enrichment rather than found in the source
    pub synthetic: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    pub source: String,
    pub relation: String,
    pub target: String,
    /// Id of the block the relation was derived from
    pub origin: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Graph {
    pub chain: Vec<String>,
    /// Ids of the relation blocks along the chain
    pub relations: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterMeta {
    pub code: u32,
    pub title: Option<String>,
    pub part: Option<String>,
    pub sections: Vec<String>,
    pub summary: Option<String>,
    pub key_terms: Vec<String>,
    pub prerequisites: Vec<u32>,
    pub pathway: Vec<u32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rationale {
    pub explanation: String,
    pub marker: String,
    pub claim: Option<String>,
    pub inference_rule: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contrast {
    pub concept_a: String,
    pub concept_b: String,
    pub distinction: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum BlockBody {
    Concept(Concept),
    Fact(Fact),
    Example(Example),
    Antipattern(Antipattern),
    CodePattern(CodePattern),
    Diagram(Diagram),
    Qa(Qa),
    Relation(Relation),
    Graph(Graph),
    ChapterMeta(ChapterMeta),
    Rationale(Rationale),
    Contrast(Contrast),
}

impl BlockBody {
    pub fn kind(&self) -> BlockKind {
        match self {
            BlockBody::Concept(_) => BlockKind::Concept,
            BlockBody::Fact(_) => BlockKind::Fact,
            BlockBody::Example(_) => BlockKind::Example,
            BlockBody::Antipattern(_) => BlockKind::Antipattern,
            BlockBody::CodePattern(_) => BlockKind::CodePattern,
            BlockBody::Diagram(_) => BlockKind::Diagram,
            BlockBody::Qa(_) => BlockKind::Qa,
            BlockBody::Relation(_) => BlockKind::Relation,
            BlockBody::Graph(_) => BlockKind::Graph,
            BlockBody::ChapterMeta(_) => BlockKind::ChapterMeta,
            BlockBody::Rationale(_) => BlockKind::Rationale,
            BlockBody::Contrast(_) => BlockKind::Contrast,
        }
    }
}

/// Metadata any block may carry once enrichment has run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrichment {
    /// Ids of blocks sharing a symbol with this one (symmetric)
    pub links: Vec<String>,
    pub embedding_text: Option<String>,
    pub token_estimate: Option<usize>,
    pub roles: Vec<String>,
    pub constraints: Vec<String>,
    pub tags: Vec<String>,
    pub vector_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub chapter_code: u32,
    pub line_no: usize,
    pub section: Option<String>,
    pub symbol_refs: Vec<String>,
    pub confidence: Option<Confidence>,
    pub difficulty: Option<Difficulty>,
    pub meta: Enrichment,
    pub body: BlockBody,
}

/// A serialized metadata value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldValue {
    Scalar(String),
    List(Vec<String>),
}

impl FieldValue {
    pub fn scalar(value: impl ToString) -> Self {
        FieldValue::Scalar(value.to_string())
    }

    pub fn list<I, T>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: ToString,
    {
        FieldValue::List(values.into_iter().map(|v| v.to_string()).collect())
    }
}

struct FieldWriter(Vec<(&'static str, FieldValue)>);

impl FieldWriter {
    fn scalar(&mut self, key: &'static str, value: impl ToString) {
        self.0.push((key, FieldValue::scalar(value)));
    }

    fn opt<T: ToString>(&mut self, key: &'static str, value: &Option<T>) {
        if let Some(value) = value {
            self.scalar(key, value.to_string());
        }
    }

    fn list<T: ToString>(&mut self, key: &'static str, values: &[T]) {
        if !values.is_empty() {
            self.0.push((
                key,
                FieldValue::List(values.iter().map(|v| v.to_string()).collect()),
            ));
        }
    }
}

impl Block {
    pub fn new(body: BlockBody, chapter_code: u32, line_no: usize) -> Self {
        Block {
            id: String::new(),
            chapter_code,
            line_no,
            section: None,
            symbol_refs: Vec::new(),
            confidence: None,
            difficulty: None,
            meta: Enrichment::default(),
            body,
        }
    }

    pub fn with_confidence(mut self, confidence: Confidence) -> Self {
        self.confidence = Some(confidence);
        self
    }

    pub fn with_section(mut self, section: Option<&str>) -> Self {
        self.section = section.map(|s| s.to_string());
        self
    }

    pub fn kind(&self) -> BlockKind {
        self.body.kind()
    }

    /// Add a symbol reference unless it is already present.
    pub fn add_symbol_ref(&mut self, name: &str) -> bool {
        if self.symbol_refs.iter().any(|existing| existing == name) {
            return false;
        }
        self.symbol_refs.push(name.to_string());
        true
    }

    /// The prose a block is about, for lexical scanning by enrichment passes.
    pub fn text(&self) -> String {
        match &self.body {
            BlockBody::Concept(c) => format!("{}: {}", c.term, c.definition),
            BlockBody::Fact(f) => f.statement.clone(),
            BlockBody::Example(e) => e.concept.clone(),
            BlockBody::Antipattern(a) => match &a.fix {
                Some(fix) => format!("{} {}", a.problem, fix),
                None => a.problem.clone(),
            },
            BlockBody::CodePattern(c) => c.pattern_kind.clone().unwrap_or_default(),
            BlockBody::Diagram(d) => format!("{} {}", d.diagram_type, d.nodes.join(" ")),
            BlockBody::Qa(q) => match &q.answer {
                Some(answer) => format!("{} {}", q.question, answer),
                None => q.question.clone(),
            },
            BlockBody::Relation(r) => format!("{} {} {}", r.source, r.relation, r.target),
            BlockBody::Graph(g) => g.chain.join(" -> "),
            BlockBody::ChapterMeta(m) => m.title.clone().unwrap_or_default(),
            BlockBody::Rationale(r) => r.explanation.clone(),
            BlockBody::Contrast(c) => {
                format!("{} vs {}: {}", c.concept_a, c.concept_b, c.distinction)
            }
        }
    }

    /// Code payload, for blocks that carry one.
    pub fn code(&self) -> Option<&str> {
        match &self.body {
            BlockBody::CodePattern(c) => Some(c.code_body.as_str()),
            BlockBody::Diagram(d) => Some(d.source.as_str()),
            _ => None,
        }
    }

    /// Rewrite every free-text field: `prose` for prose, `code` for code payloads and the
    /// names parsed out of them. Ids, enum-valued fields and `symbol_refs` are left alone.
    pub fn map_text(&mut self, prose: &dyn Fn(&str) -> String, code: &dyn Fn(&str) -> String) {
        fn apply(value: &mut String, f: &dyn Fn(&str) -> String) {
            *value = f(value);
        }
        fn apply_opt(value: &mut Option<String>, f: &dyn Fn(&str) -> String) {
            if let Some(value) = value.as_mut() {
                apply(value, f);
            }
        }
        fn apply_all(values: &mut [String], f: &dyn Fn(&str) -> String) {
            values.iter_mut().for_each(|value| apply(value, f));
        }

        apply_opt(&mut self.section, prose);
        apply_opt(&mut self.meta.embedding_text, prose);
        apply_all(&mut self.meta.roles, prose);
        apply_all(&mut self.meta.constraints, prose);
        apply_all(&mut self.meta.tags, prose);
        match &mut self.body {
            BlockBody::Concept(c) => {
                apply(&mut c.term, prose);
                apply(&mut c.definition, prose);
                apply_opt(&mut c.intuition, prose);
                apply_all(&mut c.examples, prose);
            }
            BlockBody::Fact(f) => {
                apply(&mut f.label, prose);
                apply(&mut f.statement, prose);
            }
            BlockBody::Example(e) => apply(&mut e.concept, prose),
            BlockBody::Antipattern(a) => {
                apply(&mut a.problem, prose);
                apply_opt(&mut a.fix, prose);
                apply_all(&mut a.smells, prose);
                apply_opt(&mut a.do_this, prose);
                apply_opt(&mut a.dont_this, prose);
            }
            BlockBody::CodePattern(c) => {
                apply(&mut c.code_body, code);
                apply_all(&mut c.symbols, code);
                apply_all(&mut c.test_cases, prose);
            }
            BlockBody::Diagram(d) => {
                apply(&mut d.source, code);
                apply_all(&mut d.nodes, code);
                apply_all(&mut d.edges, code);
            }
            BlockBody::Qa(q) => {
                apply(&mut q.question, prose);
                apply_opt(&mut q.answer, prose);
            }
            BlockBody::Relation(r) => {
                apply(&mut r.source, prose);
                apply(&mut r.target, prose);
            }
            BlockBody::Graph(g) => apply_all(&mut g.chain, prose),
            BlockBody::ChapterMeta(m) => {
                apply_opt(&mut m.title, prose);
                apply_opt(&mut m.part, prose);
                apply_all(&mut m.sections, prose);
                apply_opt(&mut m.summary, prose);
                apply_all(&mut m.key_terms, prose);
            }
            BlockBody::Rationale(r) => {
                apply(&mut r.explanation, prose);
                apply_opt(&mut r.claim, prose);
                apply_opt(&mut r.inference_rule, prose);
            }
            BlockBody::Contrast(c) => {
                apply(&mut c.concept_a, prose);
                apply(&mut c.concept_b, prose);
                apply(&mut c.distinction, prose);
            }
        }
    }

    /// Ordered metadata fields as written to SSM. Empty lists and absent values are omitted.
    pub fn fields(&self) -> Vec<(&'static str, FieldValue)> {
        let mut w = FieldWriter(Vec::new());
        w.scalar("id", &self.id);
        w.scalar("chapter_code", self.chapter_code);
        w.scalar("line_no", self.line_no);
        w.opt("section", &self.section);

        match &self.body {
            BlockBody::Concept(c) => {
                w.scalar("term", &c.term);
                w.scalar("definition", &c.definition);
                w.opt("intuition", &c.intuition);
                w.list("examples", &c.examples);
            }
            BlockBody::Fact(f) => {
                w.scalar("label", &f.label);
                w.scalar("statement", &f.statement);
            }
            BlockBody::Example(e) => {
                w.scalar("concept", &e.concept);
                w.scalar("code_ref", &e.code_ref);
                w.scalar("language", &e.language);
            }
            BlockBody::Antipattern(a) => {
                w.scalar("problem", &a.problem);
                w.scalar("severity", a.severity.as_str());
                w.opt("fix", &a.fix);
                w.list("smells", &a.smells);
                w.opt("do", &a.do_this);
                w.opt("dont", &a.dont_this);
            }
            BlockBody::CodePattern(c) => {
                w.scalar("language", &c.language);
                w.scalar("line_count", c.line_count);
                w.opt("pattern_kind", &c.pattern_kind);
                w.list("symbols", &c.symbols);
                w.scalar("code_body", &c.code_body);
                w.list("test_cases", &c.test_cases);
            }
            BlockBody::Diagram(d) => {
                w.scalar("language", &d.language);
                w.scalar("diagram_type", &d.diagram_type);
                w.list("nodes", &d.nodes);
                w.list("edges", &d.edges);
                w.scalar("source", &d.source);
            }
            BlockBody::Qa(q) => {
                w.scalar("question", &q.question);
                w.opt("answer", &q.answer);
                if q.synthetic {
                    w.scalar("synthetic", true);
                }
            }
            BlockBody::Relation(r) => {
                w.scalar("source", &r.source);
                w.scalar("relation", &r.relation);
                w.scalar("target", &r.target);
                w.scalar("origin", &r.origin);
            }
            BlockBody::Graph(g) => {
                w.list("chain", &g.chain);
                w.list("relations", &g.relations);
            }
            BlockBody::ChapterMeta(m) => {
                w.scalar("code", m.code);
                w.opt("title", &m.title);
                w.opt("part", &m.part);
                w.list("sections", &m.sections);
                w.opt("summary", &m.summary);
                w.list("key_terms", &m.key_terms);
                w.list("prerequisites", &m.prerequisites);
                w.list("pathway", &m.pathway);
            }
            BlockBody::Rationale(r) => {
                w.opt("claim", &r.claim);
                w.scalar("marker", &r.marker);
                w.scalar("explanation", &r.explanation);
                w.opt("inference_rule", &r.inference_rule);
            }
            BlockBody::Contrast(c) => {
                w.scalar("concept_a", &c.concept_a);
                w.scalar("concept_b", &c.concept_b);
                w.scalar("distinction", &c.distinction);
            }
        }

        w.list("symbol_refs", &self.symbol_refs);
        w.opt("confidence", &self.confidence.map(|c| c.as_str()));
        w.opt("difficulty", &self.difficulty.map(|d| d.as_str()));
        w.list("links", &self.meta.links);
        w.list("roles", &self.meta.roles);
        w.list("constraints", &self.meta.constraints);
        w.list("tags", &self.meta.tags);
        w.opt("vector_id", &self.meta.vector_id);
        w.opt("token_estimate", &self.meta.token_estimate);
        w.opt("embedding_text", &self.meta.embedding_text);
        w.0
    }
}

/// Hands out block ids: `<kind>-<seq>` with a per-kind counter, `chapter-<code>` for chapter
/// metadata.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    counters: HashMap<BlockKind, usize>,
    used: HashSet<String>,
}

impl IdAllocator {
    /// Continue numbering after the ids already present in `blocks`.
    pub fn from_blocks(blocks: &[Block]) -> Self {
        let mut allocator = IdAllocator::default();
        for block in blocks.iter() {
            let kind = block.kind();
            let seq = block
                .id
                .strip_prefix(kind.tag())
                .and_then(|rest| rest.strip_prefix('-'))
                .and_then(|seq| seq.parse::<usize>().ok())
                .unwrap_or(0);
            let counter = allocator.counters.entry(kind).or_default();
            *counter = (*counter).max(seq);
            allocator.used.insert(block.id.clone());
        }
        allocator
    }

    pub fn next(&mut self, body: &BlockBody) -> String {
        if let BlockBody::ChapterMeta(meta) = body {
            let base = format!("chapter-{}", meta.code);
            let mut id = base.clone();
            let mut repeat = 1;
            while self.used.contains(&id) {
                repeat += 1;
                id = format!("{base}-{repeat}");
            }
            self.used.insert(id.clone());
            return id;
        }
        let kind = body.kind();
        let counter = self.counters.entry(kind).or_default();
        *counter += 1;
        let id = format!("{}-{:04}", kind.tag(), counter);
        self.used.insert(id.clone());
        id
    }

    /// Give `block` an id if it has none yet.
    pub fn assign(&mut self, block: &mut Block) {
        if block.id.is_empty() {
            block.id = self.next(&block.body);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_tags_round_trip() {
        for kind in BlockKind::ALL {
            assert_eq!(BlockKind::from_tag(kind.tag()), Some(kind));
        }
        assert_eq!(BlockKind::from_tag("unknown"), None);
    }

    #[test]
    fn test_id_allocation() {
        let mut ids = IdAllocator::default();
        let fact = BlockBody::Fact(Fact::default());
        let meta = BlockBody::ChapterMeta(ChapterMeta {
            code: 3,
            ..Default::default()
        });
        assert_eq!(ids.next(&fact), "fact-0001");
        assert_eq!(ids.next(&fact), "fact-0002");
        assert_eq!(ids.next(&meta), "chapter-3");
        assert_eq!(ids.next(&meta), "chapter-3-2");

        let mut block = Block::new(fact.clone(), 1, 1);
        block.id = "fact-0007".to_string();
        let mut ids = IdAllocator::from_blocks(&[block]);
        assert_eq!(ids.next(&fact), "fact-0008");
    }

    #[test]
    fn test_symbol_refs_are_deduplicated() {
        let mut block = Block::new(BlockBody::Fact(Fact::default()), 1, 1);
        assert!(block.add_symbol_ref("mutex"));
        assert!(!block.add_symbol_ref("mutex"));
        assert!(block.add_symbol_ref("rwlock"));
        assert_eq!(block.symbol_refs, vec!["mutex", "rwlock"]);
    }

    #[test]
    fn test_fields_omit_absent_values() {
        let mut block = Block::new(
            BlockBody::Qa(Qa {
                question: "What is a mutex?".to_string(),
                answer: None,
                synthetic: false,
            }),
            2,
            14,
        );
        block.id = "qa-0001".to_string();
        let keys = block
            .fields()
            .into_iter()
            .map(|(key, _)| key)
            .collect::<Vec<_>>();
        assert_eq!(keys, vec!["id", "chapter_code", "line_no", "question"]);
    }

    #[test]
    fn test_map_text_separates_prose_and_code() {
        let mut block = Block::new(
            BlockBody::CodePattern(CodePattern {
                language: "rust".to_string(),
                code_body: "let x = 1;".to_string(),
                line_count: 1,
                test_cases: vec!["case".to_string()],
                ..Default::default()
            }),
            1,
            3,
        );
        block.map_text(&|s| s.to_uppercase(), &|s| format!("// {s}"));
        let BlockBody::CodePattern(code) = &block.body else {
            panic!("kind changed");
        };
        assert_eq!(code.code_body, "// let x = 1;");
        assert_eq!(code.test_cases, vec!["CASE"]);
        assert_eq!(code.language, "rust");
    }

    #[test]
    fn test_map_text_reaches_names_and_headings() {
        let upper = |s: &str| s.to_uppercase();
        let mut meta = Block::new(
            BlockBody::ChapterMeta(ChapterMeta {
                code: 2,
                title: Some("locks".to_string()),
                sections: vec!["2.1 spin".to_string()],
                key_terms: vec!["mutex".to_string()],
                prerequisites: vec![1],
                ..Default::default()
            }),
            2,
            10,
        );
        meta.section = Some("2.1 spin".to_string());
        meta.map_text(&upper, &upper);
        assert_eq!(meta.section.as_deref(), Some("2.1 SPIN"));
        let BlockBody::ChapterMeta(m) = &meta.body else {
            panic!("kind changed");
        };
        assert_eq!(m.title.as_deref(), Some("LOCKS"));
        assert_eq!(m.sections, vec!["2.1 SPIN"]);
        assert_eq!(m.key_terms, vec!["MUTEX"]);
        assert_eq!(m.prerequisites, vec![1]);
        assert!(meta.fields().contains(&(
            "prerequisites",
            FieldValue::List(vec!["1".to_string()])
        )));

        let mut diagram = Block::new(
            BlockBody::Diagram(Diagram {
                language: "mermaid".to_string(),
                diagram_type: "flowchart".to_string(),
                source: "a --> b".to_string(),
                nodes: vec!["a".to_string(), "b".to_string()],
                edges: vec!["a -> b".to_string()],
            }),
            1,
            4,
        );
        diagram.map_text(&|s| s.to_string(), &upper);
        let BlockBody::Diagram(d) = &diagram.body else {
            panic!("kind changed");
        };
        assert_eq!(d.nodes, vec!["A", "B"]);
        assert_eq!(d.edges, vec!["A -> B"]);
        assert_eq!(d.language, "mermaid");

        let mut relation = Block::new(
            BlockBody::Relation(Relation {
                source: "lock".to_string(),
                relation: "implies".to_string(),
                target: "wait".to_string(),
                origin: "rationale-0001".to_string(),
            }),
            1,
            6,
        );
        relation.map_text(&upper, &upper);
        let BlockBody::Relation(r) = &relation.body else {
            panic!("kind changed");
        };
        assert_eq!((r.source.as_str(), r.target.as_str()), ("LOCK", "WAIT"));
        assert_eq!(r.relation, "implies");
        assert_eq!(r.origin, "rationale-0001");
    }
}
