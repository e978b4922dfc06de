//! Mock AI adapter for testing without API calls.
//!
//! Returns scripted replies (or a scripted error) and records every request.

use crate::domain::DomainError;
use crate::ports::{AiPort, CompletionRequest, ImageInput};
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::info;

/// A request seen by the mock.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub request: CompletionRequest,
    pub image_mime: Option<String>,
}

/// Mock AI adapter for testing.
///
/// Pops scripted replies in order; when the script is empty it returns the
/// default reply. Simulates network latency with configurable delay.
pub struct MockAiAdapter {
    /// Simulated network delay in milliseconds.
    delay_ms: u64,
    vision: bool,
    default_reply: String,
    script: Mutex<VecDeque<Result<String, String>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl MockAiAdapter {
    /// Create a new mock adapter with no delay.
    pub fn new() -> Self {
        Self {
            delay_ms: 0,
            vision: true,
            default_reply: "[MOCK] Thanks for the message, I'll get back to you soon.".to_string(),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock adapter with custom delay.
    pub fn with_delay(delay_ms: u64) -> Self {
        Self {
            delay_ms,
            ..Self::new()
        }
    }

    /// Every call returns `reply` unless scripted otherwise.
    pub fn replying(reply: impl Into<String>) -> Self {
        Self {
            default_reply: reply.into(),
            ..Self::new()
        }
    }

    pub fn without_vision(mut self) -> Self {
        self.vision = false;
        self
    }

    /// Queue a reply for the next call.
    pub async fn push_reply(&self, reply: impl Into<String>) {
        self.script.lock().await.push_back(Ok(reply.into()));
    }

    /// Queue a failure (raw provider error text) for the next call.
    pub async fn push_error(&self, raw: impl Into<String>) {
        self.script.lock().await.push_back(Err(raw.into()));
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    async fn respond(&self, call: RecordedCall) -> Result<String, DomainError> {
        info!(
            turns = call.request.turns.len(),
            image = call.image_mime.is_some(),
            "[MOCK] Simulating AI completion"
        );
        self.calls.lock().await.push(call);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
        match self.script.lock().await.pop_front() {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(raw)) => Err(DomainError::Ai(raw)),
            None => Ok(self.default_reply.clone()),
        }
    }
}

impl Default for MockAiAdapter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl AiPort for MockAiAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    fn supports_vision(&self) -> bool {
        self.vision
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<String, DomainError> {
        self.respond(RecordedCall {
            request: request.clone(),
            image_mime: None,
        })
        .await
    }

    async fn complete_with_image(
        &self,
        request: &CompletionRequest,
        image: &ImageInput,
    ) -> Result<String, DomainError> {
        self.respond(RecordedCall {
            request: request.clone(),
            image_mime: Some(image.mime_type.clone()),
        })
        .await
    }
}
