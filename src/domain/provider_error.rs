//! Classification of provider failures into user-facing categories.
//!
//! Providers return unstructured error text, so classification is a single
//! ordered table of case-insensitive substring patterns. The first matching
//! row wins; anything unmatched lands in [`ProviderErrorKind::Other`].

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderErrorKind {
    RateLimited,
    InvalidCredential,
    Unauthenticated,
    Forbidden,
    ModelNotFound,
    Timeout,
    SafetyBlocked,
    EmptyResponse,
    UpstreamInternal,
    /// Unmatched error, carrying sanitized and truncated raw text.
    Other(String),
}

/// Ordered pattern table. Order matters: "429 ... unavailable" is a rate limit,
/// "invalid api key ... 401" is a credential problem.
const PATTERNS: &[(&[&str], ProviderErrorKind)] = &[
    (
        &[
            "429",
            "quota",
            "rate limit",
            "rate_limit",
            "ratelimit",
            "resource_exhausted",
            "too many requests",
        ],
        ProviderErrorKind::RateLimited,
    ),
    (
        &["api key", "api_key", "apikey", "invalid key", "missing key"],
        ProviderErrorKind::InvalidCredential,
    ),
    (
        &["401", "unauthenticated", "unauthorized"],
        ProviderErrorKind::Unauthenticated,
    ),
    (
        &["403", "forbidden", "permission_denied", "permission denied"],
        ProviderErrorKind::Forbidden,
    ),
    (
        &["404", "not found", "not_found", "does not exist"],
        ProviderErrorKind::ModelNotFound,
    ),
    (
        &["timeout", "timed out", "deadline"],
        ProviderErrorKind::Timeout,
    ),
    (&["safety", "blocked"], ProviderErrorKind::SafetyBlocked),
    (
        &["empty response", "empty reply", "no content"],
        ProviderErrorKind::EmptyResponse,
    ),
    (
        &["500", "502", "503", "internal", "unavailable", "overloaded"],
        ProviderErrorKind::UpstreamInternal,
    ),
];

const MAX_RAW_CHARS: usize = 200;

/// Classify raw provider error text. Pure and total.
pub fn classify(raw: &str) -> ProviderErrorKind {
    let lower = raw.to_lowercase();
    PATTERNS
        .iter()
        .find(|(needles, _)| needles.iter().any(|n| lower.contains(n)))
        .map(|(_, kind)| kind.clone())
        .unwrap_or_else(|| ProviderErrorKind::Other(sanitize(raw)))
}

/// Strip characters that break message formatting and cap the length.
pub fn sanitize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !matches!(c, '<' | '>' | '&') && (!c.is_control() || *c == '\n'))
        .take(MAX_RAW_CHARS)
        .collect::<String>()
        .trim()
        .to_string()
}

impl ProviderErrorKind {
    /// Short label for logs.
    pub fn label(&self) -> &'static str {
        match self {
            ProviderErrorKind::RateLimited => "rate_limited",
            ProviderErrorKind::InvalidCredential => "invalid_credential",
            ProviderErrorKind::Unauthenticated => "unauthenticated",
            ProviderErrorKind::Forbidden => "forbidden",
            ProviderErrorKind::ModelNotFound => "model_not_found",
            ProviderErrorKind::Timeout => "timeout",
            ProviderErrorKind::SafetyBlocked => "safety_blocked",
            ProviderErrorKind::EmptyResponse => "empty_response",
            ProviderErrorKind::UpstreamInternal => "upstream_internal",
            ProviderErrorKind::Other(_) => "other",
        }
    }

    /// Message sent to the counterpart in place of a reply.
    pub fn user_message(&self) -> String {
        match self {
            ProviderErrorKind::RateLimited => {
                "⏳ The AI is temporarily overloaded. Please try again in a minute.".to_string()
            }
            ProviderErrorKind::InvalidCredential => {
                "🔑 AI API key problem. Please check the provider settings.".to_string()
            }
            ProviderErrorKind::Unauthenticated => {
                "🔒 The AI provider rejected the credentials. Please re-check the key.".to_string()
            }
            ProviderErrorKind::Forbidden => {
                "🚫 Access to the selected AI model is denied.".to_string()
            }
            ProviderErrorKind::ModelNotFound => {
                "⚙️ The selected AI model is unavailable. Try another model.".to_string()
            }
            ProviderErrorKind::Timeout => {
                "⏱️ The AI took too long to answer. Please try again.".to_string()
            }
            ProviderErrorKind::SafetyBlocked => {
                "🛡️ The message was blocked by safety filters.".to_string()
            }
            ProviderErrorKind::EmptyResponse => {
                "🤔 The AI could not come up with an answer. Try rephrasing the question."
                    .to_string()
            }
            ProviderErrorKind::UpstreamInternal => {
                "🛠️ The AI provider is having problems right now. Please try again later."
                    .to_string()
            }
            ProviderErrorKind::Other(detail) if detail.is_empty() => {
                "⚠️ Something went wrong while processing the message.".to_string()
            }
            ProviderErrorKind::Other(detail) => format!("⚠️ Error: {}", detail),
        }
    }
}
