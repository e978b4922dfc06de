//! Outbound ports. Application calls into infrastructure.
//!
//! Implemented by adapters.

use crate::domain::{
    Account, ActivityEntry, AuthSession, BotStats, Chat, ChatAction, DomainError, MediaReference,
    MediaTemplate, Message, OutgoingFile, RemoteMessage, ResolvedMedia, Role, RuntimeSettings,
    SignInResult, SilenceTimer, StyleProfile, SynthesizedAudio, TrainingPair, VoiceSettings,
};
use crate::ports::inbound::EventHandler;
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// ─────────────────────────────────────────────────────────────────────────────
// Telegram
// ─────────────────────────────────────────────────────────────────────────────

/// Login transport. Owns the connection lifecycle of the MTProto client.
#[async_trait::async_trait]
pub trait AuthPort: Send + Sync {
    /// Drop any existing connection and open a new one on the persisted session file.
    async fn connect_fresh(&self) -> Result<(), DomainError>;

    /// Open a connection if none is held.
    async fn ensure_connected(&self) -> Result<(), DomainError>;

    /// Close the connection. Never fails.
    async fn disconnect(&self);

    /// Whether the session file on disk is present.
    fn has_session_file(&self) -> bool;

    /// Replace the app id/hash pair used for new connections.
    async fn set_credentials(&self, api_id: i32, api_hash: &str);

    /// Whether the connected session is logged in.
    async fn is_authorized(&self) -> Result<bool, DomainError>;

    /// Request a login code. Returns the opaque phone code hash.
    async fn send_code(&self, phone: &str) -> Result<String, DomainError>;

    /// Sign in with a login code.
    async fn sign_in(
        &self,
        phone: &str,
        phone_code_hash: &str,
        code: &str,
    ) -> Result<SignInResult, DomainError>;

    /// Complete a two-step verification login.
    async fn check_password(&self, password: &str) -> Result<String, DomainError>;
}

/// Messaging gateway. Dialogs, history, outgoing messages and media.
#[async_trait::async_trait]
pub trait MessengerPort: Send + Sync {
    /// The logged-in account.
    async fn get_me(&self) -> Result<Account, DomainError>;

    /// Up to `limit` dialogs, most recent first.
    async fn get_dialogs(&self, limit: usize) -> Result<Vec<Chat>, DomainError>;

    /// Up to `limit` most recent messages of a chat, oldest first.
    async fn get_messages(
        &self,
        chat_id: i64,
        limit: usize,
    ) -> Result<Vec<RemoteMessage>, DomainError>;

    /// Show a "composing" indicator to the counterpart.
    async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> Result<(), DomainError>;

    /// Send a plain text message, optionally as a reply.
    async fn send_text(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<i32>,
    ) -> Result<(), DomainError>;

    /// Upload and send a local file.
    async fn send_file(
        &self,
        chat_id: i64,
        path: &Path,
        kind: OutgoingFile,
    ) -> Result<(), DomainError>;

    /// Download media file to the given path.
    async fn download_media(
        &self,
        media_ref: &MediaReference,
        dest_path: &Path,
    ) -> Result<(), DomainError>;
}

/// Live update stream. Delivers events to the handler until cancelled.
#[async_trait::async_trait]
pub trait UpdateSource: Send + Sync {
    async fn listen(
        &self,
        handler: Arc<dyn EventHandler>,
        cancel: CancellationToken,
    ) -> Result<(), DomainError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// AI provider
// ─────────────────────────────────────────────────────────────────────────────

/// One turn of conversation context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurn {
    pub role: Role,
    pub text: String,
}

impl ChatTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
        }
    }
}

/// Provider-agnostic completion request. `turns` ends with the new user turn.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub turns: Vec<ChatTurn>,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Image attached to the last user turn.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    pub mime_type: String,
}

/// AI provider port. Chat completion with optional vision.
///
/// Errors are `DomainError::Ai` carrying the raw provider text.
#[async_trait::async_trait]
pub trait AiPort: Send + Sync {
    /// Provider name for logs.
    fn name(&self) -> &str;

    /// Whether `complete_with_image` is supported.
    fn supports_vision(&self) -> bool;

    async fn complete(&self, request: &CompletionRequest) -> Result<String, DomainError>;

    async fn complete_with_image(
        &self,
        request: &CompletionRequest,
        image: &ImageInput,
    ) -> Result<String, DomainError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Voice and media
// ─────────────────────────────────────────────────────────────────────────────

/// Speech-to-text and text-to-speech.
#[async_trait::async_trait]
pub trait VoicePort: Send + Sync {
    /// False when no API key is configured.
    fn is_configured(&self) -> bool;

    async fn transcribe(&self, audio_path: &Path, model_id: &str) -> Result<String, DomainError>;

    /// Synthesize speech into a temporary file. Caller removes the file.
    async fn synthesize(
        &self,
        text: &str,
        settings: &VoiceSettings,
    ) -> Result<SynthesizedAudio, DomainError>;
}

/// Media template directory.
#[async_trait::async_trait]
pub trait MediaPort: Send + Sync {
    /// Find `{tag}.{ext}` trying each kind and extension in fixed order.
    async fn resolve(&self, tag: &str) -> Result<Option<ResolvedMedia>, DomainError>;

    /// All templates available for prompts.
    async fn list(&self) -> Result<Vec<MediaTemplate>, DomainError>;
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

/// Append-only conversation history.
#[async_trait::async_trait]
pub trait HistoryPort: Send + Sync {
    async fn append(&self, message: &Message) -> Result<(), DomainError>;

    /// At most `limit` most recent messages of one chat, oldest first.
    async fn recent(&self, chat_id: i64, limit: usize) -> Result<Vec<Message>, DomainError>;
}

/// Append-only audit trail.
#[async_trait::async_trait]
pub trait ActivityLogPort: Send + Sync {
    async fn log(&self, entry: &ActivityEntry) -> Result<(), DomainError>;

    /// Most recent entries, newest first.
    async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>, DomainError>;
}

/// Per-chat silence timers. Upsert semantics, one row per chat.
#[async_trait::async_trait]
pub trait SilencePort: Send + Sync {
    async fn upsert_silence(&self, timer: &SilenceTimer) -> Result<(), DomainError>;

    async fn get_silence(&self, chat_id: i64) -> Result<Option<SilenceTimer>, DomainError>;
}

/// Singleton auth and run state.
#[async_trait::async_trait]
pub trait AuthStatePort: Send + Sync {
    /// Returns the default session when nothing was stored.
    async fn load_auth_session(&self) -> Result<AuthSession, DomainError>;

    async fn save_auth_session(&self, session: &AuthSession) -> Result<(), DomainError>;
}

/// Training pairs and the learned style profile.
#[async_trait::async_trait]
pub trait StylePort: Send + Sync {
    /// Delete every stored pair, then insert `pairs`.
    async fn replace_training_pairs(&self, pairs: &[TrainingPair]) -> Result<(), DomainError>;

    async fn count_training_pairs(&self) -> Result<u64, DomainError>;

    async fn load_style_profile(&self) -> Result<Option<StyleProfile>, DomainError>;

    async fn save_style_profile(&self, profile: &StyleProfile) -> Result<(), DomainError>;

    /// Delete all pairs and the profile.
    async fn clear_training(&self) -> Result<(), DomainError>;
}

/// Runtime settings and per-tag media rules.
#[async_trait::async_trait]
pub trait SettingsPort: Send + Sync {
    /// `None` when settings were never saved.
    async fn load_settings(&self) -> Result<Option<RuntimeSettings>, DomainError>;

    async fn save_settings(&self, settings: &RuntimeSettings) -> Result<(), DomainError>;

    /// Tag → "when to send" description.
    async fn media_rules(&self) -> Result<HashMap<String, String>, DomainError>;

    async fn set_media_rule(&self, tag: &str, description: &str) -> Result<(), DomainError>;
}

/// Aggregate counters over the stored collections.
#[async_trait::async_trait]
pub trait StatsPort: Send + Sync {
    async fn stats(&self) -> Result<BotStats, DomainError>;
}

/// Everything the core persists. Implemented by the SQLite and in-memory stores.
pub trait Store:
    HistoryPort + ActivityLogPort + SilencePort + AuthStatePort + StylePort + SettingsPort + StatsPort
{
}

impl<T> Store for T where
    T: HistoryPort
        + ActivityLogPort
        + SilencePort
        + AuthStatePort
        + StylePort
        + SettingsPort
        + StatsPort
{
}
