//! Completion query content model.
//!
//! A completion query is an ordered sequence of typed segments. Text
//! segments hold raw UTF-8; image segments hold a data URL. Exactly
//! one text segment in a well-formed query contains the insertion
//! marker (see [`MarkerKind`]), which downstream compaction treats as
//! an opaque anchor.

use serde::{Deserialize, Serialize};

/// Regex source matching the insertion marker, e.g. `<input words here>`.
pub const MARKER_PATTERN: &str = r"<input\s+\S+\s+here>";

/// What kind of completion the marker asks for.
///
/// `Lines` is chosen when the cursor line is entirely whitespace and
/// asks for whole sentences; `Words` asks for an in-sentence
/// continuation. The distinction only affects generation semantics,
/// never compaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerKind {
    /// Short in-sentence completion.
    Words,
    /// Multi-sentence insertion on a blank line.
    Lines,
}

impl MarkerKind {
    /// The sentinel substring embedded into the cursor line.
    pub fn token(&self) -> &'static str {
        match self {
            MarkerKind::Words => "<input words here>",
            MarkerKind::Lines => "<input lines here>",
        }
    }
}

/// Segment type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Raw UTF-8 text, possibly containing the marker.
    Text,
    /// Image reference (data URL).
    Image,
}

/// One typed segment of a completion query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionContent {
    /// Segment type; serialized as `type` to match the wire format.
    #[serde(rename = "type")]
    pub kind: ContentKind,
    /// Text, or the encoded image reference.
    pub value: String,
}

impl CompletionContent {
    /// Create a text segment.
    pub fn text(value: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Text,
            value: value.into(),
        }
    }

    /// Create an image segment from a data URL.
    pub fn image(value: impl Into<String>) -> Self {
        Self {
            kind: ContentKind::Image,
            value: value.into(),
        }
    }

    /// Whether this segment is an image.
    pub fn is_image(&self) -> bool {
        self.kind == ContentKind::Image
    }

    /// Segment length in budget units: characters for text, raw
    /// length of the encoded value for images (both are `char` counts;
    /// data URLs are ASCII so the two coincide for images).
    pub fn char_len(&self) -> usize {
        self.value.chars().count()
    }
}

/// Ordered segments forming one provider-agnostic completion request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionQuery {
    /// Segments in document order.
    pub content: Vec<CompletionContent>,
}

impl CompletionQuery {
    /// True if any segment is an image.
    pub fn has_images(&self) -> bool {
        self.content.iter().any(CompletionContent::is_image)
    }
}

/// A caret position, serialized as the historical `[line, column]` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "(usize, usize)", into = "(usize, usize)")]
pub struct CursorPosition {
    /// Zero-based line index.
    pub line: usize,
    /// Zero-based character column within the line.
    pub column: usize,
}

impl CursorPosition {
    /// Create a cursor position.
    pub fn new(line: usize, column: usize) -> Self {
        Self { line, column }
    }
}

impl From<(usize, usize)> for CursorPosition {
    fn from((line, column): (usize, usize)) -> Self {
        Self { line, column }
    }
}

impl From<CursorPosition> for (usize, usize) {
    fn from(cursor: CursorPosition) -> Self {
        (cursor.line, cursor.column)
    }
}

/// An extracted completion query plus the caret it was extracted at.
///
/// Structural equality over this type is the debounce rule: two
/// extractions are "the same" iff every segment and the cursor match
/// field for field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletionContext {
    /// The marker-annotated query.
    pub query: CompletionQuery,
    /// Caret position the query was built around.
    pub cursor: CursorPosition,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_tokens() {
        assert_eq!(MarkerKind::Words.token(), "<input words here>");
        assert_eq!(MarkerKind::Lines.token(), "<input lines here>");
    }

    #[test]
    fn test_content_wire_shape() {
        let content = CompletionContent::text("hello");
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json, serde_json::json!({"type": "text", "value": "hello"}));

        let content = CompletionContent::image("data:image/png;base64,AAAA");
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["type"], "image");
    }

    #[test]
    fn test_cursor_wire_shape() {
        let cursor = CursorPosition::new(3, 14);
        let json = serde_json::to_value(cursor).unwrap();
        assert_eq!(json, serde_json::json!([3, 14]));
        let back: CursorPosition = serde_json::from_value(json).unwrap();
        assert_eq!(back, cursor);
    }

    #[test]
    fn test_context_json_roundtrip() {
        let context = CompletionContext {
            query: CompletionQuery {
                content: vec![
                    CompletionContent::text("A: <input lines here>\n"),
                    CompletionContent::image("data:image/png;base64,AAAA"),
                ],
            },
            cursor: CursorPosition::new(0, 0),
        };
        let json = serde_json::to_string(&context).unwrap();
        let parsed: CompletionContext = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, context);
    }

    #[test]
    fn test_structural_equality() {
        let a = CompletionContext {
            query: CompletionQuery {
                content: vec![CompletionContent::text("x")],
            },
            cursor: CursorPosition::new(0, 1),
        };
        let mut b = a.clone();
        assert_eq!(a, b);
        b.cursor.column = 2;
        assert_ne!(a, b);
    }

    #[test]
    fn test_has_images() {
        let query = CompletionQuery {
            content: vec![CompletionContent::text("x")],
        };
        assert!(!query.has_images());
        let query = CompletionQuery {
            content: vec![
                CompletionContent::text("x"),
                CompletionContent::image("data:,"),
            ],
        };
        assert!(query.has_images());
    }
}
