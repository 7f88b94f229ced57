//! The document tree produced by the stream parser.
//!
//! An [`AstDocument`] owns the top-level node sequence plus the flattened chapter and section
//! lists. Chapter assignment never relies on parse-time state: the [`ChapterIndex`] is
//! computed once from the chapter list and every later stage asks it which chapter encloses a
//! source line.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NodeKind {
    Heading,
    Paragraph,
    CodeFence,
    DiagramFence,
    ListItem,
    ChapterBoundaryMarker,
}

impl NodeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeKind::Heading => "heading",
            NodeKind::Paragraph => "paragraph",
            NodeKind::CodeFence => "code-fence",
            NodeKind::DiagramFence => "diagram-fence",
            NodeKind::ListItem => "list-item",
            NodeKind::ChapterBoundaryMarker => "chapter-boundary-marker",
        }
    }

    /// Prose-bearing nodes that extractors scan for lexical markers.
    pub fn is_prose(&self) -> bool {
        matches!(self, NodeKind::Paragraph | NodeKind::ListItem)
    }

    pub fn is_fence(&self) -> bool {
        matches!(self, NodeKind::CodeFence | NodeKind::DiagramFence)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstNode {
    pub kind: NodeKind,
    /// Raw text content: inline markup flattened for prose, verbatim body for fences.
    /// Boundary markers carry their labels (`ch01-end ch02-start`), one node per line.
    pub text: String,
    /// Heading depth, 0 for everything else
    pub level: u8,
    /// 1-based source line of the node's first line
    pub line_no: usize,
    /// 1-based source line of the node's last line
    pub end_line: usize,
    /// Declared fence language (fences only)
    pub language: Option<String>,
    pub children: Vec<AstNode>,
}

impl AstNode {
    pub fn new(kind: NodeKind, text: impl Into<String>, line_no: usize) -> Self {
        AstNode {
            kind,
            text: text.into(),
            level: 0,
            line_no,
            end_line: line_no,
            language: None,
            children: Vec::new(),
        }
    }

    pub fn heading(level: u8, text: impl Into<String>, line_no: usize) -> Self {
        AstNode {
            level,
            ..AstNode::new(NodeKind::Heading, text, line_no)
        }
    }

    /// Depth-first iterator over this node and its descendants.
    pub fn walk(&self) -> Vec<&AstNode> {
        let mut out = vec![self];
        for child in self.children.iter() {
            out.extend(child.walk());
        }
        out
    }
}

/// Which structural signal(s) opened a chapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoundarySource {
    Marker,
    Heading,
    Both,
}

impl BoundarySource {
    pub fn merge(self, other: BoundarySource) -> BoundarySource {
        if self == other {
            self
        } else {
            BoundarySource::Both
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterEntry {
    pub code: u32,
    pub title: Option<String>,
    pub part: Option<String>,
    /// Index into [`AstDocument::nodes`] of the node that opened the chapter
    pub node_index: usize,
    pub start_line: usize,
    /// Last line belonging to the chapter (inclusive)
    pub end_line: usize,
    /// Whether an explicit end marker closed the chapter
    pub explicitly_closed: bool,
    pub source: BoundarySource,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SectionEntry {
    pub line_no: usize,
    pub level: u8,
    pub title: String,
    /// Dotted number (`1.2`) when the heading is numbered
    pub number: Option<String>,
    /// Chapter part of the dotted number
    pub number_chapter: Option<u32>,
}

impl SectionEntry {
    /// Label used on blocks: the dotted number and title when numbered, else the title.
    pub fn label(&self) -> String {
        match &self.number {
            Some(number) => format!("{number} {}", self.title),
            None => self.title.clone(),
        }
    }
}

/// Ownership root for one parsed document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AstDocument {
    pub nodes: Vec<AstNode>,
    pub chapters: Vec<ChapterEntry>,
    pub sections: Vec<SectionEntry>,
    pub line_count: usize,
}

impl AstDocument {
    pub fn chapter_index(&self) -> ChapterIndex {
        ChapterIndex::from_chapters(&self.chapters)
    }

    pub fn section_index(&self) -> SectionIndex {
        SectionIndex::from_sections(&self.sections)
    }

    /// Index of the next node after `index` that is not a boundary marker.
    pub fn next_content(&self, index: usize) -> Option<usize> {
        (index + 1..self.nodes.len())
            .find(|i| self.nodes[*i].kind != NodeKind::ChapterBoundaryMarker)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChapterSpan {
    pub start_line: usize,
    pub end_line: usize,
    pub code: u32,
}

/// Sorted chapter spans for `O(log n)` line-to-chapter lookup.
///
/// Lines that fall outside every span (front matter, text after an explicit end marker)
/// belong to chapter `0`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterIndex {
    spans: Vec<ChapterSpan>,
}

impl ChapterIndex {
    pub fn from_chapters(chapters: &[ChapterEntry]) -> Self {
        let mut spans = chapters
            .iter()
            .map(|c| ChapterSpan {
                start_line: c.start_line,
                end_line: c.end_line,
                code: c.code,
            })
            .collect::<Vec<_>>();
        spans.sort_by_key(|s| s.start_line);
        ChapterIndex { spans }
    }

    pub fn spans(&self) -> &[ChapterSpan] {
        &self.spans
    }

    pub fn chapter_for_line(&self, line_no: usize) -> u32 {
        let idx = self.spans.partition_point(|s| s.start_line <= line_no);
        if idx == 0 {
            return 0;
        }
        let span = &self.spans[idx - 1];
        if line_no <= span.end_line {
            span.code
        } else {
            0
        }
    }

    pub fn span_for_code(&self, code: u32) -> Option<&ChapterSpan> {
        self.spans.iter().find(|s| s.code == code)
    }
}

/// Sorted section headings for `O(log n)` line-to-section lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionIndex {
    starts: Vec<(usize, String)>,
}

impl SectionIndex {
    pub fn from_sections(sections: &[SectionEntry]) -> Self {
        let mut starts = sections
            .iter()
            .map(|s| (s.line_no, s.label()))
            .collect::<Vec<_>>();
        starts.sort_by_key(|(line, _)| *line);
        SectionIndex { starts }
    }

    pub fn section_for_line(&self, line_no: usize) -> Option<&str> {
        let idx = self.starts.partition_point(|(start, _)| *start <= line_no);
        if idx == 0 {
            None
        } else {
            Some(self.starts[idx - 1].1.as_str())
        }
    }
}
