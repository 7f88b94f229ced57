// Single-pass Markdown stream parser producing the document tree
use pulldown_cmark::{
    CodeBlockKind, Event as MdEvent, HeadingLevel, Options, Parser as MdParser, Tag as MdTag,
    TagEnd as MdTagEnd,
};
use std::ops::Range;

use crate::codec::{
    ast::{AstDocument, AstNode, BoundarySource, ChapterEntry, NodeKind, SectionEntry},
    diagnostic::{DiagnosticCode, ErrorBus},
    patterns::{MarkerKind, PatternSet},
};

pub use pulldown_cmark;

pub fn ssm_md_options() -> Options {
    let mut md_options = Options::empty();
    // Enabled explicitly rather than via Options::all() for reproducibility. Math is left off
    // on purpose: reference documents quote prices and shell variables with `$`.
    md_options.insert(Options::ENABLE_DEFINITION_LIST);
    md_options.insert(Options::ENABLE_FOOTNOTES);
    md_options.insert(Options::ENABLE_GFM);
    md_options.insert(Options::ENABLE_STRIKETHROUGH);
    md_options.insert(Options::ENABLE_TABLES);
    md_options.insert(Options::ENABLE_TASKLISTS);
    md_options.insert(Options::ENABLE_YAML_STYLE_METADATA_BLOCKS);
    md_options
}

/// Byte offset → 1-based line lookup.
#[derive(Debug, Clone)]
pub struct LineIndex {
    starts: Vec<usize>,
    len: usize,
}

impl LineIndex {
    pub fn new(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(newline_offsets(text).map(|idx| idx + 1));
        LineIndex {
            starts,
            len: text.len(),
        }
    }

    pub fn line_of(&self, offset: usize) -> usize {
        self.starts.partition_point(|start| *start <= offset.min(self.len))
    }

    /// Number of lines, not counting an empty line after a trailing newline.
    pub fn line_count(&self) -> usize {
        match self.starts.last() {
            Some(last) if *last == self.len && self.starts.len() > 1 => self.starts.len() - 1,
            _ => self.starts.len(),
        }
    }

    /// Line of the last byte in `range`.
    pub fn end_line_of(&self, range: &Range<usize>) -> usize {
        let last = if range.end > range.start {
            range.end - 1
        } else {
            range.start
        };
        self.line_of(last)
    }
}

fn newline_offsets(text: &str) -> impl Iterator<Item = usize> + '_ {
    text.bytes()
        .enumerate()
        .filter(|(_, b)| *b == b'\n')
        .map(|(idx, _)| idx)
}

/// Whether a raw fenced block (opening fence through end of its range) is closed.
fn fence_is_closed(raw: &str) -> bool {
    let mut lines = raw.lines();
    let Some(opening) = lines.next() else {
        return true;
    };
    let opening = opening.trim_start();
    let fence_char = match opening.chars().next() {
        Some(c @ ('`' | '~')) => c,
        // Fences nested in block quotes carry a `>` prefix; trust the Markdown parser there.
        _ => return true,
    };
    let fence_len = opening.chars().take_while(|c| *c == fence_char).count();
    lines
        .filter(|line| !line.trim().is_empty())
        .last()
        .map(|last| {
            let last = last.trim();
            last.chars().all(|c| c == fence_char)
                && last.chars().take_while(|c| *c == fence_char).count() >= fence_len
        })
        .unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FrameRole {
    /// Produces an [`AstNode`] when closed
    Node(NodeKind),
    /// Text flows into the nearest enclosing `Node` frame
    Transparent,
    /// Holds other blocks but no text of its own
    Container,
}

#[derive(Debug)]
struct Frame {
    role: FrameRole,
    text: String,
    level: u8,
    start: usize,
    language: Option<String>,
    children: Vec<AstNode>,
    definition_title: bool,
}

impl Frame {
    fn new(role: FrameRole, start: usize) -> Self {
        Frame {
            role,
            text: String::new(),
            level: 0,
            start,
            language: None,
            children: Vec::new(),
            definition_title: false,
        }
    }
}

/// Tracks chapter context while nodes stream past.
///
/// Two independent signals open a chapter: explicit boundary markers and `Chapter N`
/// headings. A signal repeating the open chapter's code reinforces it. A disagreeing signal
/// that arrives before the open chapter has any content is a conflict: the later signal wins
/// and a warning is recorded.
struct ChapterTracker<'a> {
    bus: &'a ErrorBus,
    chapters: Vec<ChapterEntry>,
    open: Option<usize>,
    pending: bool,
    part: Option<String>,
}

impl<'a> ChapterTracker<'a> {
    fn new(bus: &'a ErrorBus) -> Self {
        ChapterTracker {
            bus,
            chapters: Vec::new(),
            open: None,
            pending: false,
            part: None,
        }
    }

    fn signal(
        &mut self,
        code: u32,
        title: Option<String>,
        source: BoundarySource,
        node_index: usize,
        line_no: usize,
    ) {
        if let Some(open) = self.open {
            let pending = self.pending;
            let chapter = &mut self.chapters[open];
            if chapter.code == code {
                chapter.source = chapter.source.merge(source);
                if chapter.title.is_none() {
                    chapter.title = title;
                }
                return;
            }
            if pending {
                let message = format!(
                    "chapter context conflict: chapter {} opened by {:?} at line {} but {:?} at \
                     line {} says chapter {}; using chapter {}",
                    chapter.code, chapter.source, chapter.start_line, source, line_no, code, code
                );
                tracing::warn!("{}", message);
                self.bus
                    .warn(DiagnosticCode::ParseChapterConflict, message, line_no);
                chapter.code = code;
                chapter.source = source;
                if source == BoundarySource::Heading {
                    chapter.title = title;
                } else if chapter.title.is_some() {
                    // The earlier heading's title named a different chapter.
                    chapter.title = None;
                }
                return;
            }
        }
        self.chapters.push(ChapterEntry {
            code,
            title,
            part: self.part.clone(),
            node_index,
            start_line: line_no,
            end_line: line_no,
            explicitly_closed: false,
            source,
        });
        self.open = Some(self.chapters.len() - 1);
        self.pending = true;
    }

    fn end_marker(&mut self, code: u32, line_no: usize) {
        match self.open {
            Some(open) if self.chapters[open].code == code => {
                let chapter = &mut self.chapters[open];
                chapter.end_line = line_no;
                chapter.explicitly_closed = true;
                self.open = None;
                self.pending = false;
            }
            _ => {
                let open_code = self.open.map(|open| self.chapters[open].code);
                self.bus.warn(
                    DiagnosticCode::ParseUnmatchedEndMarker,
                    format!(
                        "end marker for chapter {code} does not match the open chapter \
                         ({open_code:?}); ignored"
                    ),
                    line_no,
                );
            }
        }
    }

    fn content(&mut self) {
        self.pending = false;
    }

    fn finish(mut self, line_count: usize) -> Vec<ChapterEntry> {
        let next_starts = self
            .chapters
            .iter()
            .skip(1)
            .map(|c| Some(c.start_line))
            .chain(std::iter::once(None))
            .collect::<Vec<_>>();
        for (chapter, next_start) in self.chapters.iter_mut().zip(next_starts) {
            let limit = next_start
                .map(|start| start.saturating_sub(1))
                .unwrap_or(line_count.max(chapter.start_line));
            chapter.end_line = if chapter.explicitly_closed {
                chapter.end_line.min(limit)
            } else {
                limit
            };
            chapter.end_line = chapter.end_line.max(chapter.start_line);
        }
        self.chapters
    }
}

/// Single forward pass over a Markdown document.
///
/// Parsing never fails: anything the Markdown grammar cannot give structure to becomes a
/// paragraph, and structural anomalies are reported to the [`ErrorBus`].
pub struct StreamParser<'a> {
    patterns: &'a PatternSet,
}

impl<'a> StreamParser<'a> {
    pub fn new(patterns: &'a PatternSet) -> Self {
        StreamParser { patterns }
    }

    #[tracing::instrument(skip_all)]
    pub fn parse(&self, text: &str, bus: &ErrorBus) -> AstDocument {
        let lines = LineIndex::new(text);
        let mut state = ParseState {
            patterns: self.patterns,
            lines: &lines,
            bus,
            text,
            stack: Vec::new(),
            nodes: Vec::new(),
            sections: Vec::new(),
            tracker: ChapterTracker::new(bus),
            definition_term: None,
        };

        for (event, range) in MdParser::new_ext(text, ssm_md_options()).into_offset_iter() {
            state.event(event, range);
        }

        let ParseState {
            mut nodes,
            sections,
            tracker,
            ..
        } = state;

        if nodes.is_empty() && !text.trim().is_empty() {
            // Nothing the grammar recognized as a block: keep the text as one paragraph.
            nodes.push(AstNode {
                end_line: lines.line_count(),
                ..AstNode::new(NodeKind::Paragraph, text.trim(), 1)
            });
        }

        let line_count = lines.line_count();
        let chapters = tracker.finish(line_count);
        tracing::debug!(
            "Parsed {} top-level nodes, {} chapters, {} sections over {} lines",
            nodes.len(),
            chapters.len(),
            sections.len(),
            line_count
        );
        AstDocument {
            nodes,
            chapters,
            sections,
            line_count,
        }
    }
}

/// Parse with the built-in boundary patterns.
pub fn parse(text: &str, bus: &ErrorBus) -> AstDocument {
    let patterns = PatternSet::default();
    StreamParser::new(&patterns).parse(text, bus)
}

struct ParseState<'a, 'b> {
    patterns: &'a PatternSet,
    lines: &'b LineIndex,
    bus: &'b ErrorBus,
    text: &'b str,
    stack: Vec<Frame>,
    nodes: Vec<AstNode>,
    sections: Vec<SectionEntry>,
    tracker: ChapterTracker<'b>,
    definition_term: Option<(String, usize)>,
}

impl ParseState<'_, '_> {
    fn owner(&mut self) -> Option<&mut Frame> {
        self.stack
            .iter_mut()
            .rev()
            .find(|f| matches!(f.role, FrameRole::Node(_)))
    }

    fn owner_kind(&self) -> Option<NodeKind> {
        self.stack.iter().rev().find_map(|f| match f.role {
            FrameRole::Node(kind) => Some(kind),
            _ => None,
        })
    }

    fn push_text(&mut self, text: &str) {
        if let Some(owner) = self.owner() {
            owner.text.push_str(text);
        }
    }

    /// Separate a new block from text already collected by the owner frame.
    fn separate(&mut self, separator: &str) {
        if let Some(owner) = self.owner() {
            if !owner.text.is_empty() && !owner.text.ends_with(char::is_whitespace) {
                owner.text.push_str(separator);
            }
        }
    }

    fn event(&mut self, event: MdEvent<'_>, range: Range<usize>) {
        match event {
            MdEvent::Start(tag) => self.start(tag, range),
            MdEvent::End(tag_end) => self.end(tag_end, range),
            MdEvent::Text(text) => self.push_text(&text),
            MdEvent::Code(code) => {
                let code = format!("`{code}`");
                self.push_text(&code);
            }
            MdEvent::InlineMath(math) | MdEvent::DisplayMath(math) => {
                let math = format!("${math}$");
                self.push_text(&math);
            }
            MdEvent::SoftBreak | MdEvent::HardBreak => self.push_text(" "),
            MdEvent::Html(html) => self.html(&html, range),
            MdEvent::InlineHtml(_) | MdEvent::FootnoteReference(_) => {}
            MdEvent::TaskListMarker(done) => {
                self.push_text(if done { "[x] " } else { "[ ] " });
            }
            MdEvent::Rule => {}
        }
    }

    fn start(&mut self, tag: MdTag<'_>, range: Range<usize>) {
        let start = range.start;
        let in_owner = self.owner_kind();
        let role = match tag {
            MdTag::Heading { level, .. } => {
                if in_owner.is_some() {
                    FrameRole::Transparent
                } else {
                    let mut frame = Frame::new(FrameRole::Node(NodeKind::Heading), start);
                    frame.level = heading_depth(level);
                    self.stack.push(frame);
                    return;
                }
            }
            MdTag::Paragraph => match in_owner {
                Some(_) => {
                    self.separate(" ");
                    FrameRole::Transparent
                }
                None => FrameRole::Node(NodeKind::Paragraph),
            },
            MdTag::CodeBlock(kind) => {
                let language = match kind {
                    CodeBlockKind::Fenced(info) => info
                        .split(|c: char| c.is_whitespace() || c == ',' || c == '{')
                        .next()
                        .map(|lang| lang.trim().to_string())
                        .filter(|lang| !lang.is_empty()),
                    CodeBlockKind::Indented => None,
                };
                let kind = match &language {
                    Some(lang) if self.patterns.is_diagram_language(lang) => {
                        NodeKind::DiagramFence
                    }
                    _ => NodeKind::CodeFence,
                };
                let mut frame = Frame::new(FrameRole::Node(kind), start);
                frame.language = language;
                self.stack.push(frame);
                return;
            }
            MdTag::Item => match in_owner {
                Some(NodeKind::ListItem) | None => FrameRole::Node(NodeKind::ListItem),
                Some(_) => FrameRole::Transparent,
            },
            MdTag::DefinitionListTitle => {
                let mut frame = Frame::new(FrameRole::Node(NodeKind::ListItem), start);
                frame.definition_title = true;
                self.stack.push(frame);
                return;
            }
            MdTag::DefinitionListDefinition => FrameRole::Node(NodeKind::ListItem),
            MdTag::Table(_) => match in_owner {
                Some(_) => FrameRole::Transparent,
                None => FrameRole::Node(NodeKind::Paragraph),
            },
            MdTag::TableRow | MdTag::TableHead => {
                self.separate("; ");
                FrameRole::Transparent
            }
            MdTag::TableCell => {
                self.separate(" | ");
                FrameRole::Transparent
            }
            MdTag::Emphasis => {
                self.push_text("*");
                return;
            }
            MdTag::Strong => {
                self.push_text("**");
                return;
            }
            MdTag::Strikethrough => {
                self.push_text("~~");
                return;
            }
            MdTag::Link { .. }
            | MdTag::Image { .. }
            | MdTag::Superscript
            | MdTag::Subscript => return,
            MdTag::BlockQuote(_)
            | MdTag::HtmlBlock
            | MdTag::List(_)
            | MdTag::FootnoteDefinition(_)
            | MdTag::DefinitionList
            | MdTag::MetadataBlock(_) => FrameRole::Container,
        };
        self.stack.push(Frame::new(role, start));
    }

    fn end(&mut self, tag_end: MdTagEnd, range: Range<usize>) {
        match tag_end {
            MdTagEnd::Emphasis => {
                self.push_text("*");
                return;
            }
            MdTagEnd::Strong => {
                self.push_text("**");
                return;
            }
            MdTagEnd::Strikethrough => {
                self.push_text("~~");
                return;
            }
            MdTagEnd::Link | MdTagEnd::Image | MdTagEnd::Superscript | MdTagEnd::Subscript => {
                return
            }
            _ => {}
        }

        let Some(frame) = self.stack.pop() else {
            tracing::warn!("Unbalanced end tag {:?}; ignoring", tag_end);
            return;
        };
        let FrameRole::Node(kind) = frame.role else {
            return;
        };

        let line_no = self.lines.line_of(frame.start);
        let end_line = self.lines.end_line_of(&(frame.start..range.end));

        if frame.definition_title {
            self.definition_term = Some((frame.text.trim().to_string(), line_no));
            return;
        }

        let mut node = AstNode {
            kind,
            text: match kind {
                NodeKind::CodeFence | NodeKind::DiagramFence => frame.text,
                _ => frame.text.trim().to_string(),
            },
            level: frame.level,
            line_no,
            end_line,
            language: frame.language,
            children: frame.children,
        };

        if matches!(tag_end, MdTagEnd::DefinitionListDefinition) {
            if let Some((term, term_line)) = self.definition_term.take() {
                node.text = format!("**{term}**: {}", node.text);
                node.line_no = term_line;
            }
        }

        if kind.is_fence() {
            let raw = &self.text[frame.start..range.end.min(self.text.len())];
            if !fence_is_closed(raw) {
                let message = format!(
                    "code fence opened at line {} is never closed; treating the rest of the \
                     document as its body",
                    node.line_no
                );
                tracing::warn!("{}", message);
                self.bus
                    .warn(DiagnosticCode::ParseUnclosedFence, message, node.line_no);
            }
        } else if node.text.is_empty() && node.children.is_empty() {
            return;
        }

        // Nested nodes attach to the enclosing list item rather than the top level.
        if let Some(parent) = self
            .stack
            .iter_mut()
            .rev()
            .find(|f| f.role == FrameRole::Node(NodeKind::ListItem))
        {
            parent.children.push(node);
            return;
        }
        self.emit(node);
    }

    fn emit(&mut self, node: AstNode) {
        let node_index = self.nodes.len();
        if node.kind == NodeKind::Heading {
            if let Some(chapter) = self.patterns.chapter_heading(node.level, &node.text) {
                self.tracker.signal(
                    chapter.code,
                    chapter.title,
                    BoundarySource::Heading,
                    node_index,
                    node.line_no,
                );
                self.nodes.push(node);
                return;
            }
            if let Some((label, title)) = self.patterns.part_heading(&node.text) {
                self.tracker.part = Some(match title {
                    Some(title) => format!("{label}: {title}"),
                    None => label,
                });
                self.nodes.push(node);
                return;
            }
            let number = self.patterns.section_number(&node.text);
            self.sections.push(SectionEntry {
                line_no: node.line_no,
                level: node.level,
                title: number
                    .as_ref()
                    .map(|n| n.title.clone())
                    .unwrap_or_else(|| node.text.clone()),
                number: number.as_ref().map(|n| n.dotted()),
                number_chapter: number.as_ref().map(|n| n.chapter),
            });
        }
        self.tracker.content();
        self.nodes.push(node);
    }

    fn html(&mut self, html: &str, range: Range<usize>) {
        let in_html_block = self
            .stack
            .last()
            .map(|f| f.role == FrameRole::Container)
            .unwrap_or(false)
            && self.owner_kind().is_none();
        if !in_html_block {
            return;
        }
        // Markers sharing a line become one node so line numbers stay strictly increasing.
        let mut labels: Vec<(usize, Vec<String>)> = Vec::new();
        for marker in self.patterns.boundary_markers(html) {
            let line_no = self.lines.line_of(range.start + marker.offset);
            let node_index = self.nodes.len()
                + match labels.last() {
                    Some((last, _)) if *last == line_no => labels.len() - 1,
                    _ => labels.len(),
                };
            let label = match marker.kind {
                MarkerKind::Start => format!("ch{:02}-start", marker.code),
                MarkerKind::End => format!("ch{:02}-end", marker.code),
            };
            match marker.kind {
                MarkerKind::Start => self.tracker.signal(
                    marker.code,
                    None,
                    BoundarySource::Marker,
                    node_index,
                    line_no,
                ),
                MarkerKind::End => self.tracker.end_marker(marker.code, line_no),
            }
            match labels.last_mut() {
                Some((last, same_line)) if *last == line_no => same_line.push(label),
                _ => labels.push((line_no, vec![label])),
            }
        }
        for (line_no, same_line) in labels {
            self.nodes.push(AstNode::new(
                NodeKind::ChapterBoundaryMarker,
                same_line.join(" "),
                line_no,
            ));
        }
    }
}

fn heading_depth(level: HeadingLevel) -> u8 {
    match level {
        HeadingLevel::H1 => 1,
        HeadingLevel::H2 => 2,
        HeadingLevel::H3 => 3,
        HeadingLevel::H4 => 4,
        HeadingLevel::H5 => 5,
        HeadingLevel::H6 => 6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::diagnostic::Diagnostic;
    use test_log::test;

    fn parse_with_diagnostics(text: &str) -> (AstDocument, Vec<Diagnostic>) {
        let bus = ErrorBus::new();
        let doc = parse(text, &bus);
        (doc, bus.into_sorted())
    }

    fn kinds(doc: &AstDocument) -> Vec<NodeKind> {
        doc.nodes.iter().map(|n| n.kind).collect()
    }

    #[test]
    fn test_line_index() {
        let lines = LineIndex::new("a\nbc\n\nd");
        assert_eq!(lines.line_of(0), 1);
        assert_eq!(lines.line_of(2), 2);
        assert_eq!(lines.line_of(5), 3);
        assert_eq!(lines.line_of(6), 4);
        assert_eq!(lines.line_count(), 4);
        assert_eq!(LineIndex::new("a\n").line_count(), 1);
    }

    #[test]
    fn test_fence_is_closed() {
        assert!(fence_is_closed("```rust\nfn a() {}\n```\n"));
        assert!(fence_is_closed("````\n```\n````"));
        assert!(!fence_is_closed("```rust\nfn a() {}\n"));
        assert!(!fence_is_closed("````\ncode\n```\n"));
        assert!(!fence_is_closed("```"));
    }

    #[test]
    fn test_basic_node_sequence() {
        let (doc, diagnostics) = parse_with_diagnostics(
            "# Chapter 1 — Intro\n\nSome text.\n\n### 1.1 Basics\n\n- one\n- two\n\n```rust\nfn main() {}\n```\n",
        );
        assert!(diagnostics.is_empty());
        assert_eq!(
            kinds(&doc),
            vec![
                NodeKind::Heading,
                NodeKind::Paragraph,
                NodeKind::Heading,
                NodeKind::ListItem,
                NodeKind::ListItem,
                NodeKind::CodeFence
            ]
        );
        let lines = doc.nodes.iter().map(|n| n.line_no).collect::<Vec<_>>();
        assert_eq!(lines, vec![1, 3, 5, 7, 8, 10]);
        assert_eq!(doc.nodes[0].level, 1);
        assert_eq!(doc.nodes[5].language.as_deref(), Some("rust"));
        assert_eq!(doc.nodes[5].text, "fn main() {}\n");
        assert_eq!(doc.nodes[5].end_line, 12);

        assert_eq!(doc.chapters.len(), 1);
        assert_eq!(doc.chapters[0].code, 1);
        assert_eq!(doc.chapters[0].title.as_deref(), Some("Intro"));
        assert_eq!(doc.chapters[0].end_line, 12);
        assert_eq!(doc.sections.len(), 1);
        assert_eq!(doc.sections[0].number.as_deref(), Some("1.1"));
        assert_eq!(doc.sections[0].title, "Basics");
    }

    #[test]
    fn test_heading_inside_fence_is_not_structural() {
        let (doc, _) = parse_with_diagnostics(
            "# Chapter 1\n\ntext\n\n```markdown\n# Chapter 2\n<!-- CHUNK_BOUNDARY id=\"ch02-start\" -->\n```\n",
        );
        assert_eq!(doc.chapters.len(), 1);
        assert!(doc
            .nodes
            .iter()
            .all(|n| n.kind != NodeKind::ChapterBoundaryMarker));
    }

    #[test]
    fn test_marker_and_heading_reinforce() {
        let (doc, diagnostics) = parse_with_diagnostics(
            "<!-- CHUNK_BOUNDARY id=\"ch01-start\" -->\n# Chapter 1: Foundations\n\nBody.\n\n<!-- CHUNK_BOUNDARY id=\"ch01-end\" -->\n",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(doc.chapters.len(), 1);
        let chapter = &doc.chapters[0];
        assert_eq!(chapter.source, BoundarySource::Both);
        assert_eq!(chapter.title.as_deref(), Some("Foundations"));
        assert_eq!(chapter.start_line, 1);
        assert!(chapter.explicitly_closed);
        assert_eq!(chapter.end_line, 6);
        assert_eq!(doc.nodes[0].kind, NodeKind::ChapterBoundaryMarker);
        assert_eq!(doc.nodes[0].text, "ch01-start");
    }

    #[test]
    fn test_marker_heading_conflict_later_wins() {
        let (doc, diagnostics) = parse_with_diagnostics(
            "<!-- CHUNK_BOUNDARY id=\"ch05-start\" -->\n# Chapter 6 — Later\n\nBody.\n",
        );
        assert_eq!(doc.chapters.len(), 1);
        assert_eq!(doc.chapters[0].code, 6);
        assert_eq!(doc.chapters[0].title.as_deref(), Some("Later"));
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::ParseChapterConflict);
        assert!(diagnostics[0].message.contains("chapter context conflict"));
    }

    #[test]
    fn test_marker_after_content_opens_new_chapter() {
        let (doc, diagnostics) = parse_with_diagnostics(
            "# Chapter 1\n\nBody one.\n\n<!-- CHUNK_BOUNDARY id=\"ch02-start\" -->\n\nBody two.\n\n# Chapter 2 — Two\n\nMore.\n",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(
            doc.chapters.iter().map(|c| c.code).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert_eq!(doc.chapters[0].end_line, 4);
        assert_eq!(doc.chapters[1].title.as_deref(), Some("Two"));
        assert_eq!(doc.chapters[1].source, BoundarySource::Both);
    }

    #[test]
    fn test_unmatched_end_marker_warns() {
        let (doc, diagnostics) = parse_with_diagnostics(
            "# Chapter 1\n\nBody.\n\n<!-- CHUNK_BOUNDARY id=\"ch03-end\" -->\n",
        );
        assert_eq!(doc.chapters.len(), 1);
        assert!(!doc.chapters[0].explicitly_closed);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::ParseUnmatchedEndMarker);
    }

    #[test]
    fn test_unclosed_fence_warns_and_keeps_node() {
        let (doc, diagnostics) =
            parse_with_diagnostics("# Chapter 1\n\n```python\ndef f():\n    return 1\n");
        assert_eq!(doc.nodes.last().unwrap().kind, NodeKind::CodeFence);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].code, DiagnosticCode::ParseUnclosedFence);
        assert_eq!(diagnostics[0].line_no, 3);
    }

    #[test]
    fn test_diagram_fence_kind() {
        let (doc, _) = parse_with_diagnostics("```mermaid\ngraph TD\n  A --> B\n```\n");
        assert_eq!(kinds(&doc), vec![NodeKind::DiagramFence]);
        assert_eq!(doc.nodes[0].language.as_deref(), Some("mermaid"));
    }

    #[test]
    fn test_inline_markup_is_kept_lightly() {
        let (doc, _) = parse_with_diagnostics("**Mutex**: a lock with `lock()` and *care*.\n");
        assert_eq!(doc.nodes[0].text, "**Mutex**: a lock with `lock()` and *care*.");
    }

    #[test]
    fn test_nested_list_items_become_children() {
        let (doc, _) = parse_with_diagnostics("- parent\n  - child one\n  - child two\n- sibling\n");
        assert_eq!(kinds(&doc), vec![NodeKind::ListItem, NodeKind::ListItem]);
        let parent = &doc.nodes[0];
        assert_eq!(parent.text, "parent");
        assert_eq!(parent.children.len(), 2);
        assert_eq!(parent.children[0].text, "child one");
        assert!(parent
            .children
            .iter()
            .all(|c| c.line_no > parent.line_no && c.line_no <= parent.end_line));
        assert_eq!(doc.nodes[1].line_no, 4);
    }

    #[test]
    fn test_definition_list_becomes_term_item() {
        let (doc, _) = parse_with_diagnostics("Idempotence\n: Applying twice equals applying once.\n");
        assert_eq!(kinds(&doc), vec![NodeKind::ListItem]);
        assert_eq!(
            doc.nodes[0].text,
            "**Idempotence**: Applying twice equals applying once."
        );
        assert_eq!(doc.nodes[0].line_no, 1);
    }

    #[test]
    fn test_part_headings_tag_chapters() {
        let (doc, _) = parse_with_diagnostics(
            "# Part II: Enforcement\n\n## Chapter 3 — Gates\n\nBody.\n",
        );
        assert_eq!(doc.chapters[0].part.as_deref(), Some("II: Enforcement"));
        assert!(doc.sections.is_empty());
    }

    #[test]
    fn test_line_numbers_strictly_increase() {
        let text = "# Chapter 1\n\nA paragraph\nspanning lines.\n\n> quoted\n\n| a | b |\n|---|---|\n| 1 | 2 |\n\n1. first\n2. second\n\n```\nplain\n```\n";
        let (doc, _) = parse_with_diagnostics(text);
        assert!(doc
            .nodes
            .windows(2)
            .all(|pair| pair[0].line_no < pair[1].line_no));
        let table = doc.nodes.iter().find(|n| n.text.contains('|')).unwrap();
        assert_eq!(table.text, "a | b; 1 | 2");
    }

    #[test]
    fn test_markers_on_one_line_share_a_node() {
        let (doc, diagnostics) = parse_with_diagnostics(
            "# Chapter 1

Body one.

<!-- CHUNK_BOUNDARY id=\"ch01-end\" --><!-- CHUNK_BOUNDARY id=\"ch02-start\" -->

Body two.
",
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert!(doc
            .nodes
            .windows(2)
            .all(|pair| pair[0].line_no < pair[1].line_no));
        let markers = doc
            .nodes
            .iter()
            .filter(|n| n.kind == NodeKind::ChapterBoundaryMarker)
            .collect::<Vec<_>>();
        assert_eq!(markers.len(), 1);
        assert_eq!(markers[0].text, "ch01-end ch02-start");
        assert_eq!(markers[0].line_no, 5);
        assert_eq!(
            doc.chapters.iter().map(|c| c.code).collect::<Vec<_>>(),
            vec![1, 2]
        );
        assert!(doc.chapters[0].explicitly_closed);
        assert_eq!(doc.chapters[1].start_line, 5);
        assert_eq!(doc.nodes[doc.chapters[1].node_index].text, "ch01-end ch02-start");
    }

    #[test]
    fn test_unstructured_text_degrades_to_paragraph() {
        let (doc, _) = parse_with_diagnostics("<div>\nraw html only\n</div>\n");
        assert_eq!(kinds(&doc), vec![NodeKind::Paragraph]);
        assert!(doc.nodes[0].text.contains("raw html only"));
    }
}
