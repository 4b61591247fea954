//! Completion context extraction from pad document state.
//!
//! [`analyze_lines`] is a pure function of a [`PadSnapshot`]: it either
//! produces a [`CompletionContext`] whose query embeds exactly one
//! insertion marker, or decides completion does not apply (range
//! selection, caret mid-word) and returns `None`.

use std::collections::HashMap;

use regex::Regex;
use tracing::warn;

use kodama_types::{
    CompletionContent, CompletionContext, CompletionQuery, CompletionSettings, CursorPosition,
    MarkerKind, DEFAULT_PREVIOUS_SEPARATOR,
};

use crate::text::byte_at_char;

/// Attribute key carrying a line's author.
const AUTHOR_ATTRIB: &str = "author";
/// Attribute key carrying an inline image reference.
const IMAGE_ATTRIB: &str = "img";

/// Snapshot of the document state the host editor exposes per edit
/// event: full text, per-line attribute strings, the selection, and
/// the attribute-number lookup pool.
#[derive(Debug, Clone)]
pub struct PadSnapshot {
    /// Full document text; lines are `\n`-separated.
    pub all_text: String,
    /// Per-line attribute strings of the form `*N*M...|...`.
    pub attrib_lines: Vec<String>,
    /// Selection start as `(line, column)`.
    pub sel_start: CursorPosition,
    /// Selection end; completion applies only when equal to the start.
    pub sel_end: CursorPosition,
    /// Attribute number → `(key, value)` pool.
    pub pool: HashMap<u32, (String, String)>,
}

/// Compile the configured separator pattern, falling back to the
/// default when the user-supplied regex is invalid.
fn separator_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|err| {
        warn!(pattern, %err, "invalid previousSeparator pattern, using default");
        Regex::new(DEFAULT_PREVIOUS_SEPARATOR).expect("default separator pattern compiles")
    })
}

/// Whether the caret sits inside text that is actively being typed.
///
/// Not editing iff the line is whitespace-only, or the text before the
/// caret is blank / ends in whitespace / ends in a separator character,
/// and the text after the caret is blank.
fn is_currently_editing(line: &str, column: usize, separator: &Regex) -> bool {
    if line.trim().is_empty() {
        return false;
    }
    let (previous, next) = line.split_at(byte_at_char(line, column));
    if !previous.trim().is_empty()
        && !previous.ends_with(|c: char| c.is_whitespace())
        && !separator.is_match(previous)
    {
        return true;
    }
    !next.trim().is_empty()
}

/// Resolve a line's attribute pairs through the pool.
///
/// The attribute run before the first `|` is a `*`-joined list of
/// base-10 attribute numbers. A piece may carry a trailing op length
/// (`"0+b"`), so only its leading digit run is parsed.
fn resolve_attribs<'a>(snapshot: &'a PadSnapshot, index: usize) -> Vec<&'a (String, String)> {
    let Some(aline) = snapshot.attrib_lines.get(index) else {
        return Vec::new();
    };
    let attrib = aline.split('|').next().unwrap_or("");
    attrib
        .split('*')
        .filter_map(|piece| {
            let digits = piece
                .find(|c: char| !c.is_ascii_digit())
                .map_or(piece, |end| &piece[..end]);
            digits.parse::<u32>().ok()
        })
        .filter_map(|num| snapshot.pool.get(&num))
        .collect()
}

/// Convert per-line document state into a marker-annotated completion
/// context, or `None` when completion does not apply.
///
/// Every non-cursor line is prefixed with its resolved author label
/// when one exists; an inline image forces a segment boundary so an
/// image never lands mid-string inside a text segment. The cursor line
/// is always prefixed with `current_author` and split at the caret
/// around the marker.
pub fn analyze_lines(
    current_author: &str,
    settings: &CompletionSettings,
    snapshot: &PadSnapshot,
) -> Option<CompletionContext> {
    if snapshot.sel_start != snapshot.sel_end {
        // Range selection: completion only supports a single caret.
        return None;
    }
    let cursor = snapshot.sel_start;
    let lines: Vec<&str> = snapshot.all_text.split('\n').collect();
    if cursor.line >= lines.len() {
        // A stale cursor would yield a marker-less query downstream.
        return None;
    }
    let separator = separator_regex(&settings.previous_separator);

    let mut text = String::new();
    let mut content: Vec<CompletionContent> = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if index == cursor.line {
            if is_currently_editing(line, cursor.column, &separator) {
                return None;
            }
            let (before, after) = line.split_at(byte_at_char(line, cursor.column));
            let kind = if line.trim().is_empty() {
                MarkerKind::Lines
            } else {
                MarkerKind::Words
            };
            text.push_str(current_author);
            text.push_str(": ");
            text.push_str(before);
            text.push_str(kind.token());
            text.push_str(after);
            text.push('\n');
            continue;
        }

        let attribs = resolve_attribs(snapshot, index);
        match attribs.iter().find(|(key, _)| key == AUTHOR_ATTRIB) {
            Some((_, author)) => {
                text.push_str(author);
                text.push_str(": ");
                text.push_str(line);
                text.push('\n');
            }
            None => {
                text.push_str(line);
                text.push('\n');
            }
        }
        if let Some((_, img)) = attribs.iter().find(|(key, _)| key == IMAGE_ATTRIB) {
            // Flush the buffer so the image never splits a text segment.
            content.push(CompletionContent::text(std::mem::take(&mut text)));
            content.push(CompletionContent::image(img.clone()));
        }
    }
    content.push(CompletionContent::text(text));

    Some(CompletionContext {
        query: CompletionQuery { content },
        cursor,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use kodama_types::ContentKind;

    fn snapshot(all_text: &str, sel_start: (usize, usize), sel_end: (usize, usize)) -> PadSnapshot {
        PadSnapshot {
            all_text: all_text.to_string(),
            attrib_lines: Vec::new(),
            sel_start: sel_start.into(),
            sel_end: sel_end.into(),
            pool: HashMap::new(),
        }
    }

    fn settings() -> CompletionSettings {
        CompletionSettings::default()
    }

    fn texts(context: &CompletionContext) -> Vec<String> {
        context
            .query
            .content
            .iter()
            .map(|c| c.value.clone())
            .collect()
    }

    #[test]
    fn test_empty_document() {
        let snap = snapshot("", (0, 0), (0, 0));
        let context = analyze_lines("A", &settings(), &snap).unwrap();
        assert_eq!(texts(&context), vec!["A: <input lines here>\n"]);
        assert_eq!(context.cursor, CursorPosition::new(0, 0));
    }

    #[test]
    fn test_whitespace_line() {
        let snap = snapshot("    ", (0, 0), (0, 0));
        let context = analyze_lines("A", &settings(), &snap).unwrap();
        assert_eq!(texts(&context), vec!["A: <input lines here>    \n"]);
    }

    #[test]
    fn test_caret_mid_word_aborts() {
        let snap = snapshot(" A", (0, 2), (0, 2));
        assert!(analyze_lines("A", &settings(), &snap).is_none());
    }

    #[test]
    fn test_range_selection_aborts() {
        let snap = snapshot(" ", (0, 0), (0, 1));
        assert!(analyze_lines("A", &settings(), &snap).is_none());
    }

    #[test]
    fn test_cursor_after_separator() {
        // Caret at column 13, right after the period.
        let snap = snapshot("This is test.    ", (0, 13), (0, 13));
        let context = analyze_lines("A", &settings(), &snap).unwrap();
        assert_eq!(
            texts(&context),
            vec!["A: This is test.<input words here>    \n"]
        );
    }

    #[test]
    fn test_cursor_mid_sentence_aborts() {
        // The caret follows a plain word: still typing.
        let snap = snapshot("This is test", (0, 12), (0, 12));
        assert!(analyze_lines("A", &settings(), &snap).is_none());
    }

    #[test]
    fn test_trailing_text_aborts() {
        // Non-blank text after the caret.
        let snap = snapshot("This is test. more", (0, 13), (0, 13));
        assert!(analyze_lines("A", &settings(), &snap).is_none());
    }

    #[test]
    fn test_author_attribution() {
        let mut snap = snapshot("first line\n", (1, 0), (1, 0));
        snap.pool
            .insert(0, ("author".to_string(), "a.123".to_string()));
        snap.attrib_lines = vec!["*0|1+b".to_string()];
        let context = analyze_lines("A", &settings(), &snap).unwrap();
        assert_eq!(
            texts(&context),
            vec!["a.123: first line\nA: <input lines here>\n"]
        );
    }

    #[test]
    fn test_author_attribution_with_op_lengths() {
        // Attribute numbers arrive glued to op lengths, as in "*0+b".
        let mut snap = snapshot("first line\n", (1, 0), (1, 0));
        snap.pool
            .insert(0, ("author".to_string(), "a.123".to_string()));
        snap.attrib_lines = vec!["*0+b|1+b".to_string()];
        let context = analyze_lines("A", &settings(), &snap).unwrap();
        assert_eq!(
            texts(&context),
            vec!["a.123: first line\nA: <input lines here>\n"]
        );
    }

    #[test]
    fn test_image_attrib_with_op_lengths() {
        let mut snap = snapshot("look at this\n", (1, 0), (1, 0));
        snap.pool
            .insert(7, ("img".to_string(), "data:image/png;base64,AAAA".to_string()));
        snap.attrib_lines = vec!["*7+c|1+c".to_string()];
        let context = analyze_lines("A", &settings(), &snap).unwrap();
        let content = &context.query.content;
        assert_eq!(content.len(), 3);
        assert_eq!(content[1].kind, ContentKind::Image);
    }

    #[test]
    fn test_unattributed_line_kept_raw() {
        let snap = snapshot("first line\n", (1, 0), (1, 0));
        let context = analyze_lines("A", &settings(), &snap).unwrap();
        assert_eq!(
            texts(&context),
            vec!["first line\nA: <input lines here>\n"]
        );
    }

    #[test]
    fn test_image_forces_segment_boundary() {
        let mut snap = snapshot("look at this\n", (1, 0), (1, 0));
        snap.pool
            .insert(0, ("author".to_string(), "a.1".to_string()));
        snap.pool
            .insert(1, ("img".to_string(), "data:image/png;base64,AAAA".to_string()));
        snap.attrib_lines = vec!["*0*1|1+c".to_string()];
        let context = analyze_lines("A", &settings(), &snap).unwrap();
        let content = &context.query.content;
        assert_eq!(content.len(), 3);
        assert_eq!(content[0].kind, ContentKind::Text);
        assert_eq!(content[0].value, "a.1: look at this\n");
        assert_eq!(content[1].kind, ContentKind::Image);
        assert_eq!(content[1].value, "data:image/png;base64,AAAA");
        assert_eq!(content[2].value, "A: <input lines here>\n");
    }

    #[test]
    fn test_exactly_one_marker() {
        let snap = snapshot("one.\ntwo.\n ", (2, 0), (2, 0));
        let context = analyze_lines("A", &settings(), &snap).unwrap();
        let joined: String = texts(&context).concat();
        assert_eq!(joined.matches("<input").count(), 1);
    }

    #[test]
    fn test_cursor_line_out_of_range() {
        let snap = snapshot("one", (5, 0), (5, 0));
        assert!(analyze_lines("A", &settings(), &snap).is_none());
    }

    #[test]
    fn test_invalid_separator_falls_back() {
        let mut settings = settings();
        settings.previous_separator = "[".to_string();
        let snap = snapshot("This is test.", (0, 13), (0, 13));
        let context = analyze_lines("A", &settings, &snap).unwrap();
        assert_eq!(texts(&context), vec!["A: This is test.<input words here>\n"]);
    }

    #[test]
    fn test_multibyte_cursor_column() {
        let snap = snapshot("これはテスト.", (0, 7), (0, 7));
        let context = analyze_lines("A", &settings(), &snap).unwrap();
        assert_eq!(
            texts(&context),
            vec!["A: これはテスト.<input words here>\n"]
        );
    }
}
