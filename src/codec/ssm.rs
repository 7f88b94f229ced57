//! SSM text: one `::: <kind>` section per block, `key: value` lines, closing `:::`.
//!
//! Values that would not read back unambiguously (empty, multi-line, surrounding
//! whitespace, a leading `[` or `"`, list delimiters inside a list item) are written as JSON
//! strings, so [`parse_sections`] reproduces every field exactly.

use serde::{Deserialize, Serialize};

use crate::{
    blocks::{Block, BlockKind, FieldValue},
    error::SsmError,
};

pub const SECTION_OPEN: &str = ":::";
pub const SECTION_CLOSE: &str = ":::";

fn needs_quotes(value: &str, in_list: bool) -> bool {
    value.is_empty()
        || value.starts_with(char::is_whitespace)
        || value.ends_with(char::is_whitespace)
        || value.starts_with(['[', '"'])
        || value.contains(['\n', '\r'])
        || (in_list && value.contains([',', '[', ']', '"']))
}

fn quote(value: &str, in_list: bool) -> String {
    if needs_quotes(value, in_list) {
        // Serializing a str to JSON cannot fail.
        serde_json::to_string(value).unwrap_or_else(|_| format!("{value:?}"))
    } else {
        value.to_string()
    }
}

fn render_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Scalar(scalar) => quote(scalar, false),
        FieldValue::List(items) => format!(
            "[{}]",
            items
                .iter()
                .map(|item| quote(item, true))
                .collect::<Vec<_>>()
                .join(", ")
        ),
    }
}

/// Render one block as an SSM section (without the separating blank line).
pub fn serialize_block(block: &Block) -> String {
    let mut out = format!("{SECTION_OPEN} {}\n", block.kind().tag());
    for (key, value) in block.fields() {
        out.push_str(key);
        out.push_str(": ");
        out.push_str(&render_value(&value));
        out.push('\n');
    }
    out.push_str(SECTION_CLOSE);
    out.push('\n');
    out
}

/// Render blocks in the given order, separated by blank lines.
#[tracing::instrument(skip_all)]
pub fn serialize(blocks: &[Block]) -> String {
    let sections = blocks.iter().map(serialize_block).collect::<Vec<_>>();
    tracing::debug!("Serialized {} SSM sections", sections.len());
    sections.join("\n")
}

/// One section read back from SSM text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SsmSection {
    pub kind: BlockKind,
    pub fields: Vec<(String, FieldValue)>,
}

impl SsmSection {
    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn scalar(&self, key: &str) -> Option<&str> {
        match self.get(key)? {
            FieldValue::Scalar(value) => Some(value.as_str()),
            FieldValue::List(_) => None,
        }
    }

    pub fn list(&self, key: &str) -> Option<&[String]> {
        match self.get(key)? {
            FieldValue::List(items) => Some(items.as_slice()),
            FieldValue::Scalar(_) => None,
        }
    }
}

/// Byte length of the JSON string literal at the start of `text`.
fn json_string_len(text: &str) -> Option<usize> {
    let mut escaped = false;
    for (idx, c) in text.char_indices().skip(1) {
        match c {
            _ if escaped => escaped = false,
            '\\' => escaped = true,
            '"' => return Some(idx + 1),
            _ => {}
        }
    }
    None
}

fn parse_json_string(literal: &str, line_no: usize) -> Result<String, SsmError> {
    serde_json::from_str::<String>(literal)
        .map_err(|err| SsmError::Codec(format!("line {line_no}: bad quoted value: {err}")))
}

fn parse_list(inner: &str, line_no: usize) -> Result<Vec<String>, SsmError> {
    let mut items = Vec::new();
    let mut rest = inner;
    while !rest.is_empty() {
        let (item, tail) = if rest.starts_with('"') {
            let len = json_string_len(rest).ok_or_else(|| {
                SsmError::Codec(format!("line {line_no}: unterminated quoted list item"))
            })?;
            (parse_json_string(&rest[..len], line_no)?, &rest[len..])
        } else {
            let end = rest.find(',').unwrap_or(rest.len());
            (rest[..end].to_string(), &rest[end..])
        };
        items.push(item);
        rest = match tail.strip_prefix(", ") {
            Some(next) => next,
            None if tail.is_empty() => tail,
            None => {
                return Err(SsmError::Codec(format!(
                    "line {line_no}: expected ', ' between list items"
                )))
            }
        };
    }
    Ok(items)
}

fn parse_value(raw: &str, line_no: usize) -> Result<FieldValue, SsmError> {
    if raw.starts_with('"') {
        return Ok(FieldValue::Scalar(parse_json_string(raw, line_no)?));
    }
    if let Some(inner) = raw.strip_prefix('[') {
        let inner = inner.strip_suffix(']').ok_or_else(|| {
            SsmError::Codec(format!("line {line_no}: list value is missing its closing ']'"))
        })?;
        return Ok(FieldValue::List(parse_list(inner, line_no)?));
    }
    Ok(FieldValue::Scalar(raw.to_string()))
}

/// Parse SSM text back into its sections.
pub fn parse_sections(text: &str) -> Result<Vec<SsmSection>, SsmError> {
    let mut sections = Vec::new();
    let mut open: Option<SsmSection> = None;
    for (idx, line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let Some(section) = open.as_mut() else {
            if line.trim().is_empty() {
                continue;
            }
            let tag = line
                .strip_prefix(SECTION_OPEN)
                .map(str::trim)
                .filter(|tag| !tag.is_empty())
                .ok_or_else(|| SsmError::Codec(format!("line {line_no}: expected '::: <kind>'")))?;
            let kind = BlockKind::from_tag(tag).ok_or_else(|| {
                SsmError::Codec(format!("line {line_no}: unknown block kind '{tag}'"))
            })?;
            open = Some(SsmSection {
                kind,
                fields: Vec::new(),
            });
            continue;
        };
        if line == SECTION_CLOSE {
            sections.extend(open.take());
            continue;
        }
        let (key, raw) = line
            .split_once(": ")
            .ok_or_else(|| SsmError::Codec(format!("line {line_no}: expected 'key: value'")))?;
        section
            .fields
            .push((key.to_string(), parse_value(raw, line_no)?));
    }
    match open {
        Some(section) => Err(SsmError::Codec(format!(
            "unterminated '{}' section at end of input",
            section.kind
        ))),
        None => Ok(sections),
    }
}
