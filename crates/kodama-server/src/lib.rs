//! HTTP surface for the kodama completion pipeline.
//!
//! Serves the two routes the editor client talks to:
//!
//! - `GET /kodama/settings`: presentation-side completion settings.
//! - `POST /kodama/completion`: run a JSON-encoded query through the
//!   compaction pipeline and the configured backend.

pub mod routes;
pub mod settings;

pub use routes::{router, AppState};
pub use settings::load_settings;
