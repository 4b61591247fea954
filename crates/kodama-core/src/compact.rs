//! Budget-aware compaction of completion queries.
//!
//! Two independent sub-algorithms bound a query's footprint before it
//! leaves the process: marker-relative text trimming and
//! aspect-ratio-preserving image downscaling. Both treat the insertion
//! marker as an opaque anchor: compaction never removes, splits, or
//! duplicates it. An image segment is either kept whole or dropped
//! entirely; it is never partially truncated.

use std::io::Cursor;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use base64::prelude::{Engine, BASE64_STANDARD};
use image::{imageops::FilterType, ImageFormat};
use regex::Regex;
use tracing::{debug, warn};

use kodama_types::{
    CompactionSettings, CompletionContent, CompletionQuery, MaxImageSize, PluginSettings,
    MARKER_PATTERN,
};

use crate::llm::{CompletionError, CompletionService};
use crate::text::{byte_at_char, char_len, head_chars, tail_chars};

/// Compaction invariant violation: the extractor guarantees exactly
/// one marker, so this is a programming error upstream.
#[derive(Debug, thiserror::Error)]
pub enum CompactionError {
    #[error("no marker found in completion query")]
    MarkerNotFound,
}

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MARKER_PATTERN).expect("marker pattern compiles"))
}

/// Where the marker sits: segment index plus char-measured offsets
/// within that segment.
struct MarkerLocation {
    index: usize,
    char_pos: usize,
    char_len: usize,
}

fn locate_marker(contents: &[CompletionContent]) -> Result<MarkerLocation, CompactionError> {
    for (index, content) in contents.iter().enumerate() {
        if content.is_image() {
            continue;
        }
        if let Some(found) = marker_regex().find(&content.value) {
            return Ok(MarkerLocation {
                index,
                char_pos: char_len(&content.value[..found.start()]),
                char_len: char_len(found.as_str()),
            });
        }
    }
    Err(CompactionError::MarkerNotFound)
}

/// Keep the trailing `remaining` budget units of `contents`, walking
/// backward from the end. A text segment on the boundary is truncated
/// to its trailing characters; an image segment that does not fully
/// fit is dropped along with everything before it.
fn tail(contents: &[CompletionContent], mut remaining: usize) -> Vec<CompletionContent> {
    let mut kept: Vec<CompletionContent> = Vec::new();
    for content in contents.iter().rev() {
        let len = content.char_len();
        if len > remaining {
            if !content.is_image() {
                kept.push(CompletionContent::text(
                    tail_chars(&content.value, remaining).to_string(),
                ));
            }
            break;
        }
        kept.push(content.clone());
        remaining -= len;
    }
    kept.reverse();
    kept
}

/// Forward counterpart of [`tail`]: keep the leading `remaining`
/// budget units of `contents`.
fn head(contents: &[CompletionContent], mut remaining: usize) -> Vec<CompletionContent> {
    let mut kept: Vec<CompletionContent> = Vec::new();
    for content in contents {
        let len = content.char_len();
        if len > remaining {
            if !content.is_image() {
                kept.push(CompletionContent::text(
                    head_chars(&content.value, remaining).to_string(),
                ));
            }
            break;
        }
        kept.push(content.clone());
        remaining -= len;
    }
    kept
}

/// Trim content before the marker down to `before_length` budget units.
///
/// When the marker's own segment already holds more than the budget
/// before the marker, that segment is truncated to the window ending
/// at the marker start and all preceding segments are dropped.
/// Otherwise preceding segments are trimmed from their far end until
/// the combined length plus the in-segment offset fits the budget.
pub fn trim_before(
    contents: Vec<CompletionContent>,
    before_length: usize,
) -> Result<Vec<CompletionContent>, CompactionError> {
    let marker = locate_marker(&contents)?;
    let marker_text = &contents[marker.index].value;
    if marker.char_pos > before_length {
        let start = byte_at_char(marker_text, marker.char_pos - before_length);
        let mut result = vec![CompletionContent::text(marker_text[start..].to_string())];
        result.extend(contents.into_iter().skip(marker.index + 1));
        return Ok(result);
    }
    let remaining = before_length - marker.char_pos;
    let mut result = tail(&contents[..marker.index], remaining);
    result.extend_from_slice(&contents[marker.index..]);
    Ok(result)
}

/// Symmetric to [`trim_before`], operating forward from the end of the
/// marker match.
pub fn trim_after(
    contents: Vec<CompletionContent>,
    after_length: usize,
) -> Result<Vec<CompletionContent>, CompactionError> {
    let marker = locate_marker(&contents)?;
    let marker_text = &contents[marker.index].value;
    let total = char_len(marker_text);
    let marker_end = marker.char_pos + marker.char_len;
    if total - marker_end > after_length {
        let kept = head_chars(marker_text, marker_end + after_length).to_string();
        let mut result = contents[..marker.index].to_vec();
        result.push(CompletionContent::text(kept));
        return Ok(result);
    }
    let remaining = after_length - (total - marker_end);
    let mut result = contents[..=marker.index].to_vec();
    result.extend(head(&contents[marker.index + 1..], remaining));
    Ok(result)
}

/// Apply the configured trim budgets; `beforeLength` first, then
/// `afterLength`, each only when present.
pub fn trim_content(
    settings: &CompactionSettings,
    contents: Vec<CompletionContent>,
) -> Result<Vec<CompletionContent>, CompactionError> {
    let Some(length) = settings.max_content_length else {
        return Ok(contents);
    };
    let mut result = contents;
    if let Some(before) = length.before_length {
        result = trim_before(result, before)?;
    }
    if let Some(after) = length.after_length {
        result = trim_after(result, after)?;
    }
    Ok(result)
}

#[derive(Debug, thiserror::Error)]
enum ResizeError {
    #[error("image value is not a data URL")]
    NotADataUrl,
    #[error("base64 decode failed: {0}")]
    Decode(#[from] base64::DecodeError),
    #[error("image processing failed: {0}")]
    Image(#[from] image::ImageError),
}

/// Decode, downscale, and re-encode a data URL. `Ok(None)` means the
/// image already fits the bounding box and is passed through
/// byte-identical.
fn resize_data_url(data_url: &str, max: MaxImageSize) -> Result<Option<String>, ResizeError> {
    let (_, payload) = data_url.split_once(',').ok_or(ResizeError::NotADataUrl)?;
    let bytes = BASE64_STANDARD.decode(payload)?;
    let img = image::load_from_memory(&bytes)?;
    if img.width() <= max.width && img.height() <= max.height {
        return Ok(None);
    }
    // Fits inside the box, aspect ratio preserved, never upscaled.
    let resized = img.resize(max.width, max.height, FilterType::Lanczos3);
    let mut encoded = Vec::new();
    resized.write_to(&mut Cursor::new(&mut encoded), ImageFormat::Png)?;
    Ok(Some(format!(
        "data:image/png;base64,{}",
        BASE64_STANDARD.encode(&encoded)
    )))
}

/// Downscale an image segment to the configured bounding box.
///
/// A failure to decode or re-encode is a soft degradation: the
/// original segment passes through unresized.
pub fn resize_image(
    settings: &CompactionSettings,
    content: &CompletionContent,
) -> CompletionContent {
    let Some(max) = settings.max_image_size else {
        return content.clone();
    };
    match resize_data_url(&content.value, max) {
        Ok(Some(resized)) => CompletionContent::image(resized),
        Ok(None) => content.clone(),
        Err(err) => {
            warn!(%err, "image compaction skipped, passing image through");
            content.clone()
        }
    }
}

/// Resize one segment off the event loop; text passes straight through.
async fn compact_content(
    settings: &CompactionSettings,
    content: &CompletionContent,
) -> CompletionContent {
    if !content.is_image() || settings.max_image_size.is_none() {
        return content.clone();
    }
    let settings = settings.clone();
    let input = content.clone();
    match tokio::task::spawn_blocking(move || resize_image(&settings, &input)).await {
        Ok(resized) => resized,
        Err(err) => {
            warn!(%err, "image compaction task failed, passing image through");
            content.clone()
        }
    }
}

/// Decorator that compacts every query before delegating to the inner
/// backend. Built with the host's budgets, or the built-in fallback
/// when none are configured, so unbounded queries are never sent out.
pub struct CompactingService {
    settings: CompactionSettings,
    inner: Arc<dyn CompletionService>,
}

impl CompactingService {
    pub fn new(settings: &PluginSettings, inner: Arc<dyn CompletionService>) -> Self {
        Self {
            settings: settings
                .compaction
                .clone()
                .unwrap_or_else(CompactionSettings::fallback),
            inner,
        }
    }
}

#[async_trait]
impl CompletionService for CompactingService {
    async fn completion(&self, query: &CompletionQuery) -> Result<String, CompletionError> {
        let mut content = Vec::with_capacity(query.content.len());
        for segment in &query.content {
            content.push(compact_content(&self.settings, segment).await);
        }
        debug!(segments = content.len(), "image compaction applied");
        let content = trim_content(&self.settings, content)?;
        let trimmed = CompletionQuery { content };
        debug!(segments = trimmed.content.len(), "query trimmed");
        self.inner.completion(&trimmed).await
    }
}
