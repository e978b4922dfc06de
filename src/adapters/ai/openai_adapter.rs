//! OpenAI-compatible chat completions adapter.
//!
//! Serves OpenAI itself and Groq (same wire format, different base URL).
//! Vision is sent as an `image_url` content part with a base64 data URL.

use crate::adapters::http;
use crate::domain::{DomainError, Role};
use crate::ports::{AiPort, CompletionRequest, ImageInput};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// OpenAI-compatible AI adapter.
///
/// Can be configured to work with:
/// - OpenAI API (api.openai.com)
/// - Groq (api.groq.com/openai)
/// - Any OpenAI-compatible API
pub struct OpenAiAdapter {
    client: reqwest::Client,
    name: &'static str,
    base_url: String,
    api_key: String,
    model: String,
    vision: bool,
}

impl OpenAiAdapter {
    /// Create a new adapter.
    ///
    /// # Arguments
    /// * `name` - provider name used in logs and errors ("openai", "groq")
    /// * `base_url` - API root (e.g., "https://api.openai.com/v1")
    /// * `api_key` - empty key fails every call without a network request
    /// * `model` - Model name (e.g., "gpt-4.1-mini", "llama-3.3-70b-versatile")
    /// * `vision` - whether image requests are accepted
    pub fn new(
        name: &'static str,
        base_url: String,
        api_key: String,
        model: String,
        vision: bool,
        timeout: Duration,
    ) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            name,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
            vision,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request(&self, request: &CompletionRequest, image: Option<&ImageInput>) -> ChatRequest {
        let mut messages = Vec::with_capacity(request.turns.len() + 1);
        if !request.system.is_empty() {
            messages.push(ChatMessage {
                role: "system".to_string(),
                content: MessageBody::Text(request.system.clone()),
            });
        }
        let last = request.turns.len().saturating_sub(1);
        for (i, turn) in request.turns.iter().enumerate() {
            let role = match turn.role {
                Role::User => "user",
                Role::Assistant => "assistant",
            };
            let content = match image {
                Some(image) if i == last && turn.role == Role::User => MessageBody::Parts(vec![
                    ContentPart::Text {
                        text: turn.text.clone(),
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!(
                                "data:{};base64,{}",
                                image.mime_type,
                                BASE64.encode(&image.bytes)
                            ),
                        },
                    },
                ]),
                _ => MessageBody::Text(turn.text.clone()),
            };
            messages.push(ChatMessage {
                role: role.to_string(),
                content,
            });
        }
        ChatRequest {
            model: self.model.clone(),
            messages,
            temperature: request.temperature,
            max_tokens: request.max_tokens,
        }
    }

    async fn send(&self, body: &ChatRequest) -> Result<String, DomainError> {
        if self.api_key.is_empty() {
            return Err(DomainError::Ai(format!(
                "missing key: {} API key is not configured",
                self.name
            )));
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::Ai(http::request_failed(e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(provider = self.name, status = %status, body = %text, "AI API returned error");
            return Err(DomainError::Ai(format!(
                "API error {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| {
                DomainError::Ai(format!(
                    "Failed to parse API response: {}",
                    e.without_url()
                ))
            })?;

        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err(DomainError::Ai(format!(
                "empty response from {}",
                self.name
            )));
        }
        Ok(content)
    }
}

/// OpenAI API request structure.
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: MessageBody,
}

#[derive(Serialize)]
#[serde(untagged)]
enum MessageBody {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
}

/// OpenAI API response structure.
#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: MessageContent,
}

#[derive(Deserialize)]
struct MessageContent {
    #[serde(default)]
    content: Option<String>,
}

#[async_trait::async_trait]
impl AiPort for OpenAiAdapter {
    fn name(&self) -> &str {
        self.name
    }

    fn supports_vision(&self) -> bool {
        self.vision
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, DomainError> {
        debug!(
            provider = self.name,
            model = %self.model,
            turns = request.turns.len(),
            "sending chat completion"
        );
        let reply = self.send(&self.build_request(request, None)).await?;
        info!(provider = self.name, model = %self.model, reply_len = reply.len(), "AI reply received");
        Ok(reply)
    }

    async fn complete_with_image(
        &self,
        request: &CompletionRequest,
        image: &ImageInput,
    ) -> Result<String, DomainError> {
        if !self.vision {
            return Err(DomainError::Ai(format!(
                "{} model {} does not accept images",
                self.name, self.model
            )));
        }
        let reply = self.send(&self.build_request(request, Some(image))).await?;
        info!(provider = self.name, model = %self.model, reply_len = reply.len(), "image analysis received");
        Ok(reply)
    }
}
