//! Provider-agnostic reply generation.
//!
//! Builds the completion request from the history window, calls the configured
//! provider and rejects empty replies. Image requests fall back to a text-only
//! notice when the provider has no vision.

use crate::domain::{DomainError, Message, Role};
use crate::ports::{AiPort, ChatTurn, CompletionRequest, ImageInput};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

pub const MAX_OUTPUT_TOKENS: u32 = 1024;

pub const NO_REPEAT_GREETING: &str = "IMPORTANT: if greetings already happened in the dialog history, do NOT greet again. Continue the conversation naturally.";

pub const DEFAULT_IMAGE_PROMPT: &str = "User sent a screenshot. Analyze it and help.";

const VISION_UNSUPPORTED_NOTE: &str = "[The user sent a screenshot, but the current model cannot view images. Reply that they should describe the problem in text.]";

pub struct ResponseGenerator {
    ai: Arc<dyn AiPort>,
}

impl ResponseGenerator {
    pub fn new(ai: Arc<dyn AiPort>) -> Self {
        Self { ai }
    }

    pub fn provider_name(&self) -> &str {
        self.ai.name()
    }

    /// Reply to `user_text` given the recent `history` (oldest first).
    ///
    /// A trailing user turn equal to `user_text` is the current message already
    /// persisted by the caller and is not repeated as context.
    pub async fn generate(
        &self,
        history: &[Message],
        system_prompt: &str,
        user_text: &str,
        temperature: f32,
    ) -> Result<String, DomainError> {
        let request = build_request(history, system_prompt, user_text, temperature);
        debug!(
            provider = self.ai.name(),
            turns = request.turns.len(),
            "requesting completion"
        );
        let reply = self.ai.complete(&request).await?;
        validate(reply)
    }

    /// Reply to an image. Uses the caption, or a generic request when there is none.
    pub async fn analyze_image(
        &self,
        image_path: &Path,
        system_prompt: &str,
        caption: Option<&str>,
        temperature: f32,
    ) -> Result<String, DomainError> {
        let user_text = caption
            .map(str::trim)
            .filter(|c| !c.is_empty())
            .unwrap_or(DEFAULT_IMAGE_PROMPT);

        if !self.ai.supports_vision() {
            info!(provider = self.ai.name(), "provider has no vision, asking for a text description");
            let text = format!("{}\n{}", user_text, VISION_UNSUPPORTED_NOTE);
            let request = build_request(&[], system_prompt, &text, temperature);
            return validate(self.ai.complete(&request).await?);
        }

        let bytes = tokio::fs::read(image_path)
            .await
            .map_err(|e| DomainError::Media(format!("read image {}: {}", image_path.display(), e)))?;
        let image = ImageInput {
            bytes,
            mime_type: mime_for_image(image_path).to_string(),
        };
        let request = build_request(&[], system_prompt, user_text, temperature);
        let reply = self.ai.complete_with_image(&request, &image).await?;
        validate(reply)
    }
}

fn validate(reply: String) -> Result<String, DomainError> {
    let trimmed = reply.trim();
    if trimmed.is_empty() {
        return Err(DomainError::Ai("empty response from provider".into()));
    }
    Ok(trimmed.to_string())
}

pub fn mime_for_image(path: &Path) -> &'static str {
    match path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "image/jpeg",
    }
}

pub fn build_request(
    history: &[Message],
    system_prompt: &str,
    user_text: &str,
    temperature: f32,
) -> CompletionRequest {
    let context = match history.split_last() {
        Some((last, rest)) if last.role == Role::User && last.text == user_text => rest,
        _ => history,
    };

    let system = if context.is_empty() {
        system_prompt.to_string()
    } else {
        format!("{}\n\n{}", system_prompt, NO_REPEAT_GREETING)
    };

    let mut turns: Vec<ChatTurn> = Vec::with_capacity(context.len() + 1);
    let entries = context
        .iter()
        .map(|m| (m.role, m.text.as_str()))
        .chain(std::iter::once((Role::User, user_text)));
    for (role, text) in entries {
        if text.trim().is_empty() {
            continue;
        }
        match turns.last_mut() {
            Some(prev) if prev.role == role => {
                prev.text.push('\n');
                prev.text.push_str(text);
            }
            _ => turns.push(ChatTurn {
                role,
                text: text.to_string(),
            }),
        }
    }

    CompletionRequest {
        system,
        turns,
        temperature: temperature.clamp(0.0, 1.0),
        max_tokens: MAX_OUTPUT_TOKENS,
    }
}
