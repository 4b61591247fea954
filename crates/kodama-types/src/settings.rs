//! Host-supplied plugin settings.
//!
//! The host editor hands kodama one JSON settings object. Field names
//! stay camelCase on the wire; everything is optional so a partial
//! settings block degrades to defaults rather than failing to parse.

use serde::{Deserialize, Serialize};

/// Default separator pattern: the character right before the caret
/// that makes a completion request acceptable mid-line.
pub const DEFAULT_PREVIOUS_SEPARATOR: &str = r#"[.,!?"';:]$"#;

/// Default debounce delay before a completion request is issued.
pub const DEFAULT_WAIT_SECONDS: f64 = 0.5;

/// Model selection: either one identifier for everything, or a
/// `{default, forImage}` pair where the image-capable variant is used
/// only when the query actually carries an image segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiModel {
    /// Single model used for all requests; assumed image-capable.
    Name(String),
    /// Split text/image model pair.
    Split {
        /// Model for text-only queries (assumed not image-capable).
        default: String,
        /// Model to use when the query contains images.
        #[serde(
            rename = "forImage",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        for_image: Option<String>,
    },
}

impl ApiModel {
    /// Pick the model for a query, returning `(name, accepts_images)`.
    ///
    /// When the selected model does not accept images the adapter must
    /// filter image segments out of the outgoing payload.
    pub fn select(&self, has_images: bool) -> (&str, bool) {
        match self {
            ApiModel::Name(name) => (name, true),
            ApiModel::Split { default, for_image } => match for_image {
                Some(image_model) if has_images => (image_model, true),
                _ => (default, false),
            },
        }
    }
}

/// Bounding box for image compaction, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxImageSize {
    pub width: u32,
    pub height: u32,
}

/// Character budgets for text trimming, measured from the marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaxContentLength {
    /// Budget for content before the marker; absent disables that side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before_length: Option<usize>,
    /// Budget for content after the marker; absent disables that side.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after_length: Option<usize>,
}

/// Compaction budgets. An absent half disables that sub-algorithm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionSettings {
    /// Image bounding box; absent disables resizing.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_image_size: Option<MaxImageSize>,
    /// Text trim budgets; absent disables trimming.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_content_length: Option<MaxContentLength>,
}

impl CompactionSettings {
    /// Built-in budget applied when the host configures none.
    /// Unbounded queries are never sent to a backend.
    pub fn fallback() -> Self {
        Self {
            max_image_size: Some(MaxImageSize {
                width: 512,
                height: 512,
            }),
            max_content_length: Some(MaxContentLength {
                before_length: Some(1024 * 20),
                after_length: Some(1024),
            }),
        }
    }
}

/// Presentation-side completion settings served to the editor client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionSettings {
    /// Regex a cursor-preceding character must match for mid-line
    /// completion to apply.
    #[serde(default = "default_previous_separator")]
    pub previous_separator: String,
    /// Debounce delay in seconds.
    #[serde(default = "default_wait_seconds")]
    pub wait_seconds: f64,
}

fn default_previous_separator() -> String {
    DEFAULT_PREVIOUS_SEPARATOR.to_string()
}

fn default_wait_seconds() -> f64 {
    DEFAULT_WAIT_SECONDS
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self {
            previous_separator: default_previous_separator(),
            wait_seconds: default_wait_seconds(),
        }
    }
}

/// The full kodama settings block from the host settings object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginSettings {
    /// Backend selector ("openai", "gemini").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api: Option<String>,
    /// Backend API key.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    /// Model identifier or text/image pair.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_model: Option<ApiModel>,
    /// Compaction budgets; absent means the built-in fallback.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compaction: Option<CompactionSettings>,
    /// Presentation-side settings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completion: Option<CompletionSettings>,
}

impl PluginSettings {
    /// Presentation settings with defaults filled in.
    pub fn completion_settings(&self) -> CompletionSettings {
        self.completion.clone().unwrap_or_default()
    }
}
