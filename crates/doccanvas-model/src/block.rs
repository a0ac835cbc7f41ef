//! Extracted content blocks
//!
//! A block is a lightweight record pointing at a structural path inside one
//! part of a document package. Its id is derived from that path, never from
//! its text, so text edits keep the id while structural edits may not.

use serde::{Deserialize, Serialize};

/// Block identifier (`blk_` followed by 16 hex characters)
pub type BlockId = String;

/// Structural unit a block was built from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockKind {
    /// A paragraph directly inside the body, header or footer
    Paragraph,
    /// A table cell (its direct paragraphs joined with newlines)
    TableCell,
}

/// A drawing anchor found inside a block
///
/// Drawings never contribute text; they are recorded so that importers can
/// link canvas entities to embedded media.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingRef {
    /// Relationship ID of the embedded image (`r:embed`), if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rel_id: Option<String>,
    /// Name from `wp:docPr`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Description (alt text) from `wp:docPr`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Width in EMUs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width_emu: Option<i64>,
    /// Height in EMUs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height_emu: Option<i64>,
}

/// A stably identified content unit extracted from a document part
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    /// Deterministic id derived from `part` and `path`
    pub id: BlockId,
    /// Position in document order (body first, then headers and footers)
    pub position: usize,
    /// Structural kind
    pub kind: BlockKind,
    /// Flattened display text
    pub text: String,
    /// Placeholder token names present in `text`, sorted and deduplicated
    #[serde(default)]
    pub placeholders: Vec<String>,
    /// Archive path of the owning part (e.g. `word/document.xml`)
    pub part: String,
    /// Chain of element indices from the part root down to the block node
    pub path: Vec<usize>,
    /// Paragraph style of the (first) paragraph
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style_id: Option<String>,
    /// Drawings anchored inside the block
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub drawings: Vec<DrawingRef>,
}

impl Block {
    /// Check whether the block carries any text
    pub fn has_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Check whether the block contains the given placeholder token
    pub fn has_placeholder(&self, token: &str) -> bool {
        self.placeholders.iter().any(|t| t == token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(text: &str) -> Block {
        Block {
            id: "blk_0000000000000000".to_string(),
            position: 0,
            kind: BlockKind::Paragraph,
            text: text.to_string(),
            placeholders: vec!["CEO_NAME".to_string()],
            part: "word/document.xml".to_string(),
            path: vec![0, 0, 1],
            style_id: None,
            drawings: Vec::new(),
        }
    }

    #[test]
    fn test_has_text() {
        assert!(block("Hello").has_text());
        assert!(!block("  \t").has_text());
    }

    #[test]
    fn test_has_placeholder() {
        let b = block("{{CEO_NAME}}");
        assert!(b.has_placeholder("CEO_NAME"));
        assert!(!b.has_placeholder("ceo_name"));
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&BlockKind::TableCell).unwrap();
        assert_eq!(json, "\"table_cell\"");
    }

    #[test]
    fn test_empty_drawings_are_omitted() {
        let json = serde_json::to_value(block("x")).unwrap();
        assert!(json.get("drawings").is_none());
        assert!(json.get("style_id").is_none());
    }
}
