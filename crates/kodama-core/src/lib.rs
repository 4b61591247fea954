//! Completion pipeline for kodama.
//!
//! This crate turns raw per-line pad state into a marker-annotated,
//! size-bounded completion query and routes it to a pluggable backend:
//!
//! ```text
//! pad snapshot → extract::analyze_lines → CompletionQuery
//!     → compact::CompactingService (trim + image resize)
//!     → llm::CompletionService (OpenAI / Gemini)
//!     → track::ChangeTracker (debounce + staleness gating)
//!     → CompletionPresenter
//! ```
//!
//! Extraction and trimming are pure and synchronous; the backend call,
//! the debounce timer, and image re-encoding are the only suspension
//! points.

pub mod compact;
pub mod extract;
pub mod llm;
pub mod track;

mod text;

pub use compact::{CompactingService, CompactionError};
pub use extract::{analyze_lines, PadSnapshot};
pub use llm::{create_service, CompletionError, CompletionService};
pub use track::{apply_completion, ChangeTracker, CompletionPresenter};
