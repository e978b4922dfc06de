//! Domain errors. Used by ports and use cases.
//!
//! Adapters map infrastructure errors into these.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Telegram error: {0}")]
    Telegram(String),

    #[error("Repository error: {0}")]
    Repo(String),

    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Media error: {0}")]
    Media(String),

    /// Provider failure. The text is the raw provider error, classified later.
    #[error("AI provider error: {0}")]
    Ai(String),

    #[error("Voice error: {0}")]
    Voice(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid value: {0}")]
    Validation(String),

    /// FloodWait error: caller should retry after `seconds` seconds.
    #[error("FloodWait: retry after {seconds} seconds")]
    FloodWait { seconds: u64 },
}
