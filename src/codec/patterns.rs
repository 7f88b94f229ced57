// Boundary recognition rules for the stream parser.
//
// Patterns are declared as plain strings in a serde-friendly `PatternConfig` (so they can
// live in TOML or YAML configuration) and compiled once into a `PatternSet`. After
// construction a `PatternSet` is a pure lookup table shared read-only across a compile.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::SsmError;

/// Default chapter heading shape: `Chapter 3 — Title`, `Chapter 3: Title`, `CHAPTER 3`.
pub const DEFAULT_CHAPTER_HEADING: &str =
    r"(?i)^\s*chapter\s+(\d+)\b\s*(?:[:.\-–—]+\s*)?(.*)$";

/// Default explicit boundary marker: `<!-- CHUNK_BOUNDARY id="ch05-start" -->`.
pub const DEFAULT_BOUNDARY_MARKER: &str =
    r#"CHUNK_BOUNDARY\s+id\s*=\s*["']ch(\d+)-(start|end)["']"#;

/// Default numbered section header: `1.2 Title`, `1.2.3 Title`.
pub const DEFAULT_SECTION_HEADER: &str = r"^\s*(\d+)\.(\d+)(?:\.(\d+))?\.?\s+(.+)$";

/// Default part heading: `Part II: Title`, `Part 2 — Title`.
pub const DEFAULT_PART_HEADING: &str =
    r"(?i)^\s*part\s+([ivxlc]+|\d+)\b\s*(?:[:.\-–—]+\s*)?(.*)$";

pub const DEFAULT_DIAGRAM_LANGUAGES: &[&str] =
    &["mermaid", "plantuml", "puml", "dot", "graphviz", "ditaa", "ascii-diagram"];

/// Serializable description of the boundary rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PatternConfig {
    pub chapter_heading: String,
    /// Headings deeper than this are never chapter boundaries
    pub chapter_heading_max_level: u8,
    pub boundary_marker: String,
    pub section_header: String,
    pub part_heading: String,
    pub diagram_languages: Vec<String>,
}

impl Default for PatternConfig {
    fn default() -> Self {
        PatternConfig {
            chapter_heading: DEFAULT_CHAPTER_HEADING.to_string(),
            chapter_heading_max_level: 3,
            boundary_marker: DEFAULT_BOUNDARY_MARKER.to_string(),
            section_header: DEFAULT_SECTION_HEADER.to_string(),
            part_heading: DEFAULT_PART_HEADING.to_string(),
            diagram_languages: DEFAULT_DIAGRAM_LANGUAGES
                .iter()
                .map(|lang| lang.to_string())
                .collect(),
        }
    }
}

/// What a boundary marker comment asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    Start,
    End,
}

/// A boundary marker found inside an HTML fragment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundaryMarker {
    pub code: u32,
    pub kind: MarkerKind,
    /// Byte offset of the match within the scanned fragment
    pub offset: usize,
}

/// A recognized `Chapter N` heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterHeading {
    pub code: u32,
    pub title: Option<String>,
}

/// A recognized numbered section heading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionNumber {
    pub chapter: u32,
    pub section: u32,
    pub subsection: Option<u32>,
    pub title: String,
}

impl SectionNumber {
    pub fn dotted(&self) -> String {
        match self.subsection {
            Some(sub) => format!("{}.{}.{}", self.chapter, self.section, sub),
            None => format!("{}.{}", self.chapter, self.section),
        }
    }
}

/// Compiled boundary rules.
#[derive(Debug, Clone)]
pub struct PatternSet {
    chapter_heading: Regex,
    chapter_heading_max_level: u8,
    boundary_marker: Regex,
    section_header: Regex,
    part_heading: Regex,
    diagram_languages: Vec<String>,
}

impl Default for PatternSet {
    fn default() -> Self {
        // The built-in patterns are constants covered by tests; failing to compile them is a
        // programming error, not a runtime condition.
        PatternSet::from_config(&PatternConfig::default())
            .expect("built-in boundary patterns compile")
    }
}

impl PatternSet {
    pub fn from_config(config: &PatternConfig) -> Result<Self, SsmError> {
        Ok(PatternSet {
            chapter_heading: Regex::new(&config.chapter_heading)?,
            chapter_heading_max_level: config.chapter_heading_max_level,
            boundary_marker: Regex::new(&config.boundary_marker)?,
            section_header: Regex::new(&config.section_header)?,
            part_heading: Regex::new(&config.part_heading)?,
            diagram_languages: config
                .diagram_languages
                .iter()
                .map(|lang| lang.to_lowercase())
                .collect(),
        })
    }

    pub fn from_toml_str(content: &str) -> Result<Self, SsmError> {
        let config: PatternConfig = toml::from_str(content)?;
        Self::from_config(&config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, SsmError> {
        let config: PatternConfig = serde_yaml::from_str(content)?;
        Self::from_config(&config)
    }

    /// Match a heading against the chapter pattern. `level` is the heading depth.
    pub fn chapter_heading(&self, level: u8, text: &str) -> Option<ChapterHeading> {
        if level == 0 || level > self.chapter_heading_max_level {
            return None;
        }
        let captures = self.chapter_heading.captures(text)?;
        let code = captures.get(1)?.as_str().parse::<u32>().ok()?;
        let title = captures
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty());
        Some(ChapterHeading { code, title })
    }

    /// Find every boundary marker in an HTML fragment, in source order.
    pub fn boundary_markers(&self, html: &str) -> Vec<BoundaryMarker> {
        self.boundary_marker
            .captures_iter(html)
            .filter_map(|captures| {
                let whole = captures.get(0)?;
                let code = captures.get(1)?.as_str().parse::<u32>().ok()?;
                let kind = match captures.get(2)?.as_str() {
                    "end" => MarkerKind::End,
                    _ => MarkerKind::Start,
                };
                Some(BoundaryMarker {
                    code,
                    kind,
                    offset: whole.start(),
                })
            })
            .collect()
    }

    pub fn section_number(&self, text: &str) -> Option<SectionNumber> {
        let captures = self.section_header.captures(text)?;
        Some(SectionNumber {
            chapter: captures.get(1)?.as_str().parse().ok()?,
            section: captures.get(2)?.as_str().parse().ok()?,
            subsection: captures.get(3).and_then(|m| m.as_str().parse().ok()),
            title: captures.get(4)?.as_str().trim().to_string(),
        })
    }

    /// Returns the part label (`II`, `2`) and its optional title.
    pub fn part_heading(&self, text: &str) -> Option<(String, Option<String>)> {
        let captures = self.part_heading.captures(text)?;
        let label = captures.get(1)?.as_str().to_uppercase();
        let title = captures
            .get(2)
            .map(|m| m.as_str().trim().to_string())
            .filter(|t| !t.is_empty());
        Some((label, title))
    }

    pub fn is_diagram_language(&self, language: &str) -> bool {
        let language = language.to_lowercase();
        self.diagram_languages.iter().any(|l| *l == language)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn test_chapter_heading_variants() {
        let patterns = PatternSet::default();
        assert_eq!(
            patterns.chapter_heading(1, "Chapter 1 — Intro"),
            Some(ChapterHeading {
                code: 1,
                title: Some("Intro".to_string())
            })
        );
        assert_eq!(
            patterns.chapter_heading(2, "CHAPTER 12: Policies as Code"),
            Some(ChapterHeading {
                code: 12,
                title: Some("Policies as Code".to_string())
            })
        );
        assert_eq!(
            patterns.chapter_heading(1, "Chapter 4"),
            Some(ChapterHeading {
                code: 4,
                title: None
            })
        );
        assert!(patterns.chapter_heading(1, "Chapters of history").is_none());
        assert!(patterns.chapter_heading(4, "Chapter 1 — Too Deep").is_none());
    }

    #[test]
    fn test_boundary_markers() {
        let patterns = PatternSet::default();
        let html = r#"<!-- CHUNK_BOUNDARY id="ch04-end" --> <!-- CHUNK_BOUNDARY id="ch05-start" -->"#;
        let markers = patterns.boundary_markers(html);
        assert_eq!(
            markers
                .iter()
                .map(|m| (m.code, m.kind))
                .collect::<Vec<_>>(),
            vec![(4, MarkerKind::End), (5, MarkerKind::Start)]
        );
        assert_eq!(markers[0].offset, 5);
        assert!(patterns.boundary_markers("<!-- just a comment -->").is_empty());
    }

    #[test]
    fn test_section_number() {
        let patterns = PatternSet::default();
        let section = patterns.section_number("1.1 Basics").unwrap();
        assert_eq!(section.dotted(), "1.1");
        assert_eq!(section.title, "Basics");
        let section = patterns.section_number("3.2.7. Deep Dive").unwrap();
        assert_eq!(section.dotted(), "3.2.7");
        assert!(patterns.section_number("Basics").is_none());
    }

    #[test]
    fn test_part_heading() {
        let patterns = PatternSet::default();
        assert_eq!(
            patterns.part_heading("Part II: Enforcement"),
            Some(("II".to_string(), Some("Enforcement".to_string())))
        );
        assert!(patterns.part_heading("Partial results").is_none());
    }

    #[test]
    fn test_load_from_toml_overrides_defaults() {
        let patterns = PatternSet::from_toml_str(
            r#"
            chapter_heading = '^Kapitel\s+(\d+)\s*(.*)$'
            diagram_languages = ["Mermaid"]
            "#,
        )
        .unwrap();
        assert_eq!(patterns.chapter_heading(1, "Kapitel 7 Anfang").unwrap().code, 7);
        assert!(patterns.chapter_heading(1, "Chapter 7").is_none());
        assert!(patterns.is_diagram_language("mermaid"));
        assert!(!patterns.is_diagram_language("dot"));
        // Fields that were not overridden keep their defaults
        assert!(patterns.section_number("7.1 Anfang").is_some());
    }

    #[test]
    fn test_load_from_yaml() {
        let patterns = PatternSet::from_yaml_str("chapter_heading_max_level: 1\n").unwrap();
        assert!(patterns.chapter_heading(1, "Chapter 2").is_some());
        assert!(patterns.chapter_heading(2, "Chapter 2").is_none());
    }

    #[test]
    fn test_invalid_pattern_is_config_error() {
        let err = PatternSet::from_toml_str("section_header = '(unclosed'").unwrap_err();
        assert!(matches!(err, SsmError::Config(_)));
    }
}
