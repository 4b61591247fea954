//! Google Gemini backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use kodama_types::{CompletionContent, CompletionQuery, PluginSettings};

use super::{CompletionError, CompletionResult, CompletionService};

const GENERATE_CONTENT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

/// Fixed instruction describing the marker-completion task, prepended
/// as the first content part (Gemini has no system role here).
const PROMPT: &str = "\
You are a writing assistance agent. You take as input a text in the process of being written \
and suggest appropriate words to be written.
The text contains a single marker <input (words|lines) here>. Follow the rules below to \
generate the string that should be placed there with consideration of the context before and \
after and return only that string.

- <input words here>: Generate a string that should be placed in this marker. Generate text \
that makes sense together with the preceding text and the text in the marker to make a single \
sentence.
- <input lines here>: Generate about 1-3 sentences of lines that should be inserted in this \
marker.

Note that a.XXX means the author of the statement.
The language should be selected appropriately for the text entered.
If an image is attached as part of the input, please consider the content of that image in \
your suggestion.
The result text should not include any preceding or following text, and should not be \
highlighted in Markdown.";

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<RequestContent>,
}

#[derive(Serialize)]
struct RequestContent {
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

/// Convert one segment into a Gemini content part.
///
/// Data URLs are unpacked into `inline_data`; an image reference that
/// is not a data URL is passed along as text.
fn convert_part(content: &CompletionContent) -> Part {
    if !content.is_image() || !content.value.starts_with("data:") {
        return Part::Text {
            text: content.value.clone(),
        };
    }
    match content.value.split_once(',') {
        Some((header, payload)) => {
            let mime_type = header
                .strip_prefix("data:")
                .unwrap_or(header)
                .split(';')
                .next()
                .unwrap_or("")
                .to_string();
            Part::InlineData {
                inline_data: InlineData {
                    mime_type,
                    // Data URL payloads are already base64.
                    data: payload.to_string(),
                },
            }
        }
        None => Part::Text {
            text: content.value.clone(),
        },
    }
}

/// Completion backend calling the Gemini generateContent API.
pub struct GeminiService {
    settings: PluginSettings,
    client: reqwest::Client,
}

impl GeminiService {
    pub fn new(settings: PluginSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CompletionService for GeminiService {
    async fn completion(&self, query: &CompletionQuery) -> CompletionResult<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| CompletionError::Config("apiKey is required".into()))?;
        let api_model = self
            .settings
            .api_model
            .as_ref()
            .ok_or_else(|| CompletionError::Config("apiModel is required".into()))?;
        let (model, accepts_images) = api_model.select(query.has_images());
        debug!(model, "gemini completion request");

        let mut parts = vec![Part::Text {
            text: PROMPT.to_string(),
        }];
        let mut dropped = 0usize;
        for content in &query.content {
            if content.is_image() && !accepts_images {
                dropped += 1;
                continue;
            }
            parts.push(convert_part(content));
        }
        if dropped > 0 {
            info!(dropped, "selected model does not accept images, dropping image segments");
        }

        let url = format!("{GENERATE_CONTENT_BASE_URL}/{model}:generateContent");
        let response = self
            .client
            .post(&url)
            .query(&[("key", api_key)])
            .json(&GenerateRequest {
                contents: vec![RequestContent { parts }],
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(parsed) => (
                    parsed.error.status,
                    parsed
                        .error
                        .message
                        .unwrap_or_else(|| format!("status code: {status}")),
                ),
                Err(_) => (None, format!("status code: {status}")),
            };
            return Err(CompletionError::Api {
                provider: "gemini",
                status: status.as_u16(),
                code,
                message,
            });
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .map(|candidate| {
                candidate
                    .content
                    .parts
                    .into_iter()
                    .filter_map(|part| part.text)
                    .collect()
            })
            .unwrap_or_default();
        if text.is_empty() {
            return Err(CompletionError::EmptyResponse("gemini"));
        }
        debug!(text, "gemini response");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kodama_types::ApiModel;

    #[test]
    fn test_convert_text_part() {
        let part = convert_part(&CompletionContent::text("hello"));
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json, serde_json::json!({"text": "hello"}));
    }

    #[test]
    fn test_convert_data_url_part() {
        let part = convert_part(&CompletionContent::image("data:image/png;base64,AAAA"));
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["inline_data"]["mime_type"], "image/png");
        assert_eq!(json["inline_data"]["data"], "AAAA");
    }

    #[test]
    fn test_non_data_url_image_passes_as_text() {
        let part = convert_part(&CompletionContent::image("https://example.com/cat.png"));
        let json = serde_json::to_value(&part).unwrap();
        assert_eq!(json["text"], "https://example.com/cat.png");
    }

    #[tokio::test]
    async fn test_missing_model_is_config_error() {
        let service = GeminiService::new(PluginSettings {
            api: Some("gemini".into()),
            api_key: Some("k".into()),
            ..Default::default()
        });
        let query = CompletionQuery {
            content: vec![CompletionContent::text("<input words here>")],
        };
        let err = service.completion(&query).await.unwrap_err();
        assert!(matches!(err, CompletionError::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_key_is_config_error() {
        let service = GeminiService::new(PluginSettings {
            api: Some("gemini".into()),
            api_model: Some(ApiModel::Name("gemini-pro".into())),
            ..Default::default()
        });
        let query = CompletionQuery {
            content: vec![CompletionContent::text("<input words here>")],
        };
        let err = service.completion(&query).await.unwrap_err();
        assert!(matches!(err, CompletionError::Config(_)));
    }
}
