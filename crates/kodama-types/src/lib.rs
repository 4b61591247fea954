//! Shared vocabulary types for kodama.
//!
//! This crate is the leaf of the workspace: the completion content
//! model (typed segments with a single insertion marker), the cursor
//! and context types used for debounce equality, and the settings
//! object the host supplies. It has **no internal kodama
//! dependencies**; other crates build on it.
//!
//! # Key Types
//!
//! |-----------------------|------------------------------------------|
//! | Type                  | Purpose                                  |
//! |-----------------------|------------------------------------------|
//! | [`CompletionContent`] | One typed segment (text or image)        |
//! | [`CompletionQuery`]   | Ordered segments sent to a backend       |
//! | [`CompletionContext`] | Query + cursor, the debounce key         |
//! | [`MarkerKind`]        | Words vs. lines insertion semantics      |
//! | [`PluginSettings`]    | Host-supplied configuration              |
//! |-----------------------|------------------------------------------|

pub mod content;
pub mod settings;

pub use content::{
    CompletionContent, CompletionContext, CompletionQuery, ContentKind, CursorPosition,
    MarkerKind, MARKER_PATTERN,
};
pub use settings::{
    ApiModel, CompactionSettings, CompletionSettings, MaxContentLength, MaxImageSize,
    PluginSettings, DEFAULT_PREVIOUS_SEPARATOR, DEFAULT_WAIT_SECONDS,
};
