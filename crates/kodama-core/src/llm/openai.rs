//! OpenAI chat-completion backend.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use kodama_types::{CompletionQuery, PluginSettings};

use super::{select_model, CompletionError, CompletionResult, CompletionService};

const CHAT_COMPLETIONS_URL: &str = "https://api.openai.com/v1/chat/completions";

/// Model used when the host configures none.
pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";

/// Fixed instruction describing the marker-completion task.
const SYSTEM_PROMPT: &str = "\
You are a writing assistance agent. You take as input a text in the process of being written \
and suggest appropriate words to be written.
The text contains a single marker <input (words|lines) here>. Follow the rules below to \
generate the string that should be placed there with consideration of the context before and \
after and return only that string.

- <input words here>: Generate a string that should be placed in this marker section. Include \
the part before the marker so that it becomes one sentence.
- <input lines here>: Generate about 1-3 sentences of lines that should be inserted in this \
marker section.

Note that a.XXX means the author of the statement.";

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: ChatMessageContent,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ChatMessageContent {
    Text(String),
    Parts(Vec<ChatPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ChatPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
}

/// Convert query segments into chat content parts, dropping images
/// when the selected model cannot take them.
fn convert_parts(query: &CompletionQuery, accepts_images: bool) -> Vec<ChatPart> {
    let mut dropped = 0usize;
    let parts = query
        .content
        .iter()
        .filter_map(|content| {
            if !content.is_image() {
                Some(ChatPart::Text {
                    text: content.value.clone(),
                })
            } else if accepts_images {
                Some(ChatPart::ImageUrl {
                    image_url: ImageUrl {
                        url: content.value.clone(),
                    },
                })
            } else {
                dropped += 1;
                None
            }
        })
        .collect();
    if dropped > 0 {
        info!(dropped, "selected model does not accept images, dropping image segments");
    }
    parts
}

/// Completion backend calling the OpenAI chat completions API.
pub struct OpenAiService {
    settings: PluginSettings,
    client: reqwest::Client,
}

impl OpenAiService {
    pub fn new(settings: PluginSettings) -> Self {
        Self {
            settings,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl CompletionService for OpenAiService {
    async fn completion(&self, query: &CompletionQuery) -> CompletionResult<String> {
        let api_key = self
            .settings
            .api_key
            .as_deref()
            .ok_or_else(|| CompletionError::Config("apiKey is required".into()))?;
        let (model, accepts_images) =
            select_model(self.settings.api_model.as_ref(), DEFAULT_MODEL, query);
        debug!(model, "openai completion request");

        let request = ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: ChatMessageContent::Text(SYSTEM_PROMPT.to_string()),
                },
                ChatMessage {
                    role: "user",
                    content: ChatMessageContent::Parts(convert_parts(query, accepts_images)),
                },
            ],
        };

        let response = self
            .client
            .post(CHAT_COMPLETIONS_URL)
            .bearer_auth(api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let (code, message) = match serde_json::from_str::<ErrorResponse>(&body) {
                Ok(parsed) => (
                    parsed.error.code,
                    parsed
                        .error
                        .message
                        .unwrap_or_else(|| format!("status code: {status}")),
                ),
                Err(_) => (None, format!("status code: {status}")),
            };
            return Err(CompletionError::Api {
                provider: "openai",
                status: status.as_u16(),
                code,
                message,
            });
        }

        let parsed: ChatResponse = response.json().await?;
        let result = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(CompletionError::EmptyResponse("openai"))?;
        debug!(result, "openai response");
        Ok(result)
    }
}
