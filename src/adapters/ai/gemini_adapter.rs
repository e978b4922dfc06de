//! Google Gemini adapter (`generateContent`, non-streaming).
//!
//! Text chat and vision. The system prompt goes into `systemInstruction`,
//! assistant turns are sent with the `model` role.

use crate::adapters::http;
use crate::domain::{DomainError, Role};
use crate::ports::{AiPort, ChatTurn, CompletionRequest, ImageInput};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini adapter. One model per adapter.
pub struct GeminiAdapter {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl GeminiAdapter {
    /// * `base_url` - API root without path (e.g. "https://generativelanguage.googleapis.com")
    /// * `api_key` - empty key fails every call without a network request
    /// * `model` - model id (e.g. "gemini-2.5-flash")
    pub fn new(base_url: String, api_key: String, model: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            model,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model
        )
    }

    /// Gemini requires the first content to be a user turn.
    fn contents(turns: &[ChatTurn]) -> Vec<Content> {
        turns
            .iter()
            .skip_while(|t| t.role == Role::Assistant)
            .map(|t| Content {
                role: match t.role {
                    Role::User => "user",
                    Role::Assistant => "model",
                }
                .to_string(),
                parts: vec![Part::Text {
                    text: t.text.clone(),
                }],
            })
            .collect()
    }

    fn build_request(request: &CompletionRequest, image: Option<&ImageInput>) -> GenerateRequest {
        let mut contents = Self::contents(&request.turns);
        if let (Some(image), Some(last)) = (image, contents.last_mut()) {
            last.parts.push(Part::InlineData {
                inline_data: InlineData {
                    mime_type: image.mime_type.clone(),
                    data: BASE64.encode(&image.bytes),
                },
            });
        }
        GenerateRequest {
            system_instruction: (!request.system.is_empty()).then(|| SystemInstruction {
                parts: vec![Part::Text {
                    text: request.system.clone(),
                }],
            }),
            contents,
            generation_config: GenerationConfig {
                temperature: request.temperature,
                max_output_tokens: request.max_tokens,
            },
        }
    }

    async fn generate(&self, body: &GenerateRequest) -> Result<String, DomainError> {
        if self.api_key.is_empty() {
            return Err(DomainError::Ai(
                "missing key: Gemini API key is not configured".to_string(),
            ));
        }

        let response = self
            .client
            .post(self.endpoint())
            .query(&[("key", self.api_key.as_str())])
            .json(body)
            .send()
            .await
            .map_err(|e| DomainError::Ai(http::request_failed(e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %text, "Gemini API returned error");
            return Err(DomainError::Ai(format!(
                "API error {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| {
                DomainError::Ai(format!(
                    "Failed to parse API response: {}",
                    e.without_url()
                ))
            })?;

        Self::extract_text(parsed)
    }

    fn extract_text(parsed: GenerateResponse) -> Result<String, DomainError> {
        if let Some(reason) = parsed.prompt_feedback.and_then(|f| f.block_reason) {
            return Err(DomainError::Ai(format!(
                "prompt blocked by safety filter: {}",
                reason
            )));
        }
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| DomainError::Ai("empty response: no candidates".to_string()))?;
        let text: String = candidate
            .content
            .map(|c| {
                c.parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();
        if text.trim().is_empty() {
            return match candidate.finish_reason.as_deref() {
                Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") => Err(
                    DomainError::Ai("response blocked by safety filter".to_string()),
                ),
                other => Err(DomainError::Ai(format!(
                    "empty response (finish reason: {})",
                    other.unwrap_or("unknown")
                ))),
            };
        }
        Ok(text)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<SystemInstruction>,
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[async_trait::async_trait]
impl AiPort for GeminiAdapter {
    fn name(&self) -> &str {
        "gemini"
    }

    fn supports_vision(&self) -> bool {
        true
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, DomainError> {
        debug!(model = %self.model, turns = request.turns.len(), "sending Gemini request");
        let text = self.generate(&Self::build_request(request, None)).await?;
        info!(model = %self.model, reply_len = text.len(), "Gemini reply received");
        Ok(text)
    }

    async fn complete_with_image(
        &self,
        request: &CompletionRequest,
        image: &ImageInput,
    ) -> Result<String, DomainError> {
        debug!(
            model = %self.model,
            mime = %image.mime_type,
            bytes = image.bytes.len(),
            "sending Gemini vision request"
        );
        let text = self
            .generate(&Self::build_request(request, Some(image)))
            .await?;
        info!(model = %self.model, reply_len = text.len(), "Gemini image analysis received");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::provider_error::{ProviderErrorKind, classify};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(turns: Vec<ChatTurn>) -> CompletionRequest {
        CompletionRequest {
            system: "be brief".into(),
            turns,
            temperature: 0.7,
            max_tokens: 1024,
        }
    }

    fn adapter(server: &MockServer, key: &str) -> GeminiAdapter {
        GeminiAdapter::new(
            server.uri(),
            key.into(),
            "gemini-2.5-flash".into(),
            Duration::from_secs(5),
        )
    }

    #[test]
    fn test_contents_skip_leading_model_turns() {
        let contents = GeminiAdapter::contents(&[
            ChatTurn::assistant("hello!"),
            ChatTurn::user("hi"),
            ChatTurn::assistant("how can I help"),
            ChatTurn::user("price?"),
        ]);
        let roles: Vec<&str> = contents.iter().map(|c| c.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "model", "user"]);
    }

    #[tokio::test]
    async fn test_complete_sends_system_instruction_and_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1beta/models/gemini-2.5-flash:generateContent"))
            .and(query_param("key", "secret"))
            .and(body_partial_json(serde_json::json!({
                "systemInstruction": {"parts": [{"text": "be brief"}]},
                "generationConfig": {"maxOutputTokens": 1024}
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{
                    "content": {"role": "model", "parts": [{"text": "Hi there"}]},
                    "finishReason": "STOP"
                }]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let reply = adapter(&server, "secret")
            .complete(&request(vec![ChatTurn::user("hello")]))
            .await
            .unwrap();
        assert_eq!(reply, "Hi there");
    }

    #[tokio::test]
    async fn test_image_is_sent_inline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(body_partial_json(serde_json::json!({
                "contents": [{
                    "role": "user",
                    "parts": [
                        {"text": "what is this"},
                        {"inlineData": {"mimeType": "image/png", "data": "AQID"}}
                    ]
                }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": [{"text": "A screenshot"}]}}]
            })))
            .mount(&server)
            .await;

        let image = ImageInput {
            bytes: vec![1, 2, 3],
            mime_type: "image/png".into(),
        };
        let reply = adapter(&server, "k")
            .complete_with_image(&request(vec![ChatTurn::user("what is this")]), &image)
            .await
            .unwrap();
        assert_eq!(reply, "A screenshot");
    }

    #[tokio::test]
    async fn test_http_error_carries_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(429).set_body_string("{\"error\":{\"status\":\"RESOURCE_EXHAUSTED\"}}"),
            )
            .mount(&server)
            .await;

        let err = adapter(&server, "k")
            .complete(&request(vec![ChatTurn::user("hi")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("429"));
    }

    #[tokio::test]
    async fn test_safety_block_and_empty_reply_are_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "candidates": [{"content": {"parts": []}, "finishReason": "SAFETY"}]
            })))
            .mount(&server)
            .await;
        let err = adapter(&server, "k")
            .complete(&request(vec![ChatTurn::user("hi")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("safety"));

        let empty = GeminiAdapter::extract_text(GenerateResponse {
            candidates: vec![],
            prompt_feedback: None,
        })
        .unwrap_err();
        assert!(empty.to_string().contains("empty response"));
    }

    #[tokio::test]
    async fn test_timeout_classifies_without_leaking_key() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .mount(&server)
            .await;
        let gemini = GeminiAdapter::new(
            server.uri(),
            "AIzaSECRETKEY123".into(),
            "gemini-2.5-flash".into(),
            Duration::from_millis(300),
        );

        let err = gemini
            .complete(&request(vec![ChatTurn::user("hi")]))
            .await
            .unwrap_err();
        let DomainError::Ai(raw) = err else {
            panic!("expected an AI error, got {err:?}");
        };
        assert!(!raw.contains("AIzaSECRETKEY123"));
        let kind = classify(&raw);
        assert_eq!(kind, ProviderErrorKind::Timeout);
        assert!(!kind.user_message().contains("AIzaSECRETKEY123"));
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let err = adapter(&server, "")
            .complete(&request(vec![ChatTurn::user("hi")]))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("missing key"));
    }
}
