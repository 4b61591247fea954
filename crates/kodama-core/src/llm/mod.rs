//! Completion backend abstraction.
//!
//! This module provides a unified interface over the pluggable
//! completion providers (OpenAI, Gemini). New backends are added by
//! implementing [`CompletionService`]; the extractor and compactor
//! never change.

mod gemini;
mod openai;

pub use gemini::GeminiService;
pub use openai::OpenAiService;

use std::sync::Arc;

use async_trait::async_trait;

use kodama_types::{ApiModel, CompletionQuery, PluginSettings};

use crate::compact::{CompactingService, CompactionError};

/// Error type for completion backend operations.
#[derive(Debug, thiserror::Error)]
pub enum CompletionError {
    /// Missing or unusable configuration (API key, model, selector).
    #[error("configuration error: {0}")]
    Config(String),

    /// Provider returned an error payload.
    #[error("{provider} api error: {message}")]
    Api {
        provider: &'static str,
        status: u16,
        code: Option<String>,
        message: String,
    },

    /// Transport-level failure.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Provider returned no usable text.
    #[error("empty response from {0}")]
    EmptyResponse(&'static str),

    /// The query violated a compaction invariant (no marker).
    #[error("invalid completion query: {0}")]
    InvalidQuery(#[from] CompactionError),
}

/// Result type for completion backend operations.
pub type CompletionResult<T> = Result<T, CompletionError>;

/// A pluggable completion provider.
///
/// Takes a marker-annotated, compacted query and returns the generated
/// string that belongs at the marker.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn completion(&self, query: &CompletionQuery) -> CompletionResult<String>;
}

/// Resolve the configured model for a query, falling back to the
/// adapter's default when none is set.
///
/// Returns `(model, accepts_images)`; when the selected model does not
/// accept images the adapter filters image segments from the payload.
pub(crate) fn select_model(
    api_model: Option<&ApiModel>,
    default: &'static str,
    query: &CompletionQuery,
) -> (String, bool) {
    match api_model {
        Some(model) => {
            let (name, accepts_images) = model.select(query.has_images());
            (name.to_string(), accepts_images)
        }
        None => (default.to_string(), true),
    }
}

/// Build the configured backend, wrapped in the compaction decorator.
pub fn create_service(
    settings: &PluginSettings,
) -> CompletionResult<Arc<dyn CompletionService>> {
    let inner: Arc<dyn CompletionService> = match settings.api.as_deref() {
        Some("openai") => Arc::new(OpenAiService::new(settings.clone())),
        Some("gemini") => Arc::new(GeminiService::new(settings.clone())),
        Some(other) => {
            return Err(CompletionError::Config(format!("unknown api: {other}")));
        }
        None => {
            return Err(CompletionError::Config("api is not configured".into()));
        }
    };
    Ok(Arc::new(CompactingService::new(settings, inner)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_service_requires_api() {
        let Err(err) = create_service(&PluginSettings::default()) else {
            panic!("unconfigured api must not build a service");
        };
        assert!(matches!(err, CompletionError::Config(_)));
    }

    #[test]
    fn test_create_service_rejects_unknown_api() {
        let settings = PluginSettings {
            api: Some("acme".into()),
            ..Default::default()
        };
        let Err(err) = create_service(&settings) else {
            panic!("unknown api must not build a service");
        };
        assert!(err.to_string().contains("unknown api: acme"));
    }

    #[test]
    fn test_create_service_known_backends() {
        for api in ["openai", "gemini"] {
            let settings = PluginSettings {
                api: Some(api.into()),
                api_key: Some("k".into()),
                api_model: Some(ApiModel::Name("m".into())),
                ..Default::default()
            };
            assert!(create_service(&settings).is_ok());
        }
    }

    #[test]
    fn test_select_model_defaults() {
        let query = CompletionQuery { content: vec![] };
        let (model, accepts_images) = select_model(None, "fallback-model", &query);
        assert_eq!(model, "fallback-model");
        assert!(accepts_images);
    }
}
