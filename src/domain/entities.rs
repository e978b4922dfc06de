//! Domain entities. Pure data structures for the core business.
//!
//! No Telegram or IO types here; adapters map into these.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Represents a Telegram chat (user, group, or channel).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
    pub id: i64,
    pub title: String,
    pub username: Option<String>,
    #[serde(rename = "type")]
    pub kind: ChatType,
    /// Automated account (bot). Only meaningful for `ChatType::Private`.
    #[serde(default)]
    pub is_bot: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    Private,
    Group,
    Supergroup,
    Channel,
}

/// A message as fetched from Telegram history (used by the style scan).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub id: i32,
    pub chat_id: i64,
    pub date: i64,
    pub text: String,
    pub media: Option<MediaReference>,
    pub from_user_id: Option<i64>,
    /// Sent from this account.
    #[serde(default)]
    pub outgoing: bool,
}

/// Reference to downloadable media attached to a Telegram message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaReference {
    pub message_id: i32,
    pub chat_id: i64,
    pub media_type: MediaType,
    /// Mime type reported by Telegram, when known.
    #[serde(default)]
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    Sticker,
    Other,
}

/// Input modality of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Photo,
    /// Voice notes and audio files.
    Voice,
}

/// One update from the messaging transport, already narrowed to private chats.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub chat_id: i64,
    pub message_id: i32,
    pub sender_id: Option<i64>,
    pub username: Option<String>,
    /// Authored by the account owner (sent from this account).
    pub outgoing: bool,
    pub modality: Modality,
    /// Message text, or the caption for media.
    pub text: String,
    pub media: Option<MediaReference>,
}

/// Account the session is logged in as.
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub first_name: String,
    pub username: Option<String>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Conversation history
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }

    pub fn parse(s: &str) -> Self {
        if s == "assistant" {
            Role::Assistant
        } else {
            Role::User
        }
    }
}

/// A persisted conversation turn. Append-only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub chat_id: i64,
    pub role: Role,
    pub text: String,
    pub username: Option<String>,
    pub has_image: bool,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn user(chat_id: i64, text: impl Into<String>, username: Option<String>) -> Self {
        Self {
            chat_id,
            role: Role::User,
            text: text.into(),
            username,
            has_image: false,
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            role: Role::Assistant,
            text: text.into(),
            username: None,
            has_image: false,
            timestamp: Utc::now(),
        }
    }

    pub fn with_image(mut self) -> Self {
        self.has_image = true;
        self
    }
}

/// Per-chat mute. At most one per chat; later activations supersede earlier ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SilenceTimer {
    pub chat_id: i64,
    pub expires_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Activity log
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityKind {
    BotStarted,
    BotStopped,
    MessageReceived,
    VoiceReceived,
    ImageAnalyzed,
    ResponseSent,
    VoiceSent,
    MediaSent,
    SilenceActivated,
    ScanStarted,
    ScanCompleted,
    TrainingToggled,
    TrainingReset,
}

impl ActivityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityKind::BotStarted => "bot_started",
            ActivityKind::BotStopped => "bot_stopped",
            ActivityKind::MessageReceived => "message_received",
            ActivityKind::VoiceReceived => "voice_received",
            ActivityKind::ImageAnalyzed => "image_analyzed",
            ActivityKind::ResponseSent => "response_sent",
            ActivityKind::VoiceSent => "voice_sent",
            ActivityKind::MediaSent => "media_sent",
            ActivityKind::SilenceActivated => "silence_activated",
            ActivityKind::ScanStarted => "scan_started",
            ActivityKind::ScanCompleted => "scan_completed",
            ActivityKind::TrainingToggled => "training_toggled",
            ActivityKind::TrainingReset => "training_reset",
        }
    }
}

impl std::fmt::Display for ActivityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Audit trail entry. Written by the core, read only by observers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub event_type: String,
    pub chat_id: Option<i64>,
    pub username: Option<String>,
    pub details: String,
}

impl ActivityEntry {
    pub fn new(
        kind: ActivityKind,
        chat_id: Option<i64>,
        username: Option<String>,
        details: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            event_type: kind.as_str().to_string(),
            chat_id,
            username,
            details: details.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Auth
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuthState {
    #[default]
    None,
    CodeSent,
    Authorized,
}

impl AuthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthState::None => "none",
            AuthState::CodeSent => "code_sent",
            AuthState::Authorized => "authorized",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "code_sent" => AuthState::CodeSent,
            "authorized" => AuthState::Authorized,
            _ => AuthState::None,
        }
    }
}

/// Singleton login/run state.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthSession {
    pub auth_state: AuthState,
    pub phone_code_hash: Option<String>,
    pub auth_phone: Option<String>,
    pub is_running: bool,
    pub started_at: Option<DateTime<Utc>>,
}

/// Result of a sign-in attempt with a login code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignInResult {
    Success { user: String },
    PasswordRequired { hint: Option<String> },
}

/// Explicit outcome of a login step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum AuthStatus {
    CodeSent,
    #[serde(rename = "2fa_required")]
    TwoFactorRequired {
        hint: Option<String>,
    },
    Authorized {
        user: String,
    },
    /// App id/hash pair not configured.
    MissingCredentials,
    /// No phone code hash in memory or in the store; request a new code.
    CodeHashMissing,
}

// ─────────────────────────────────────────────────────────────────────────────
// Style learning
// ─────────────────────────────────────────────────────────────────────────────

/// One (incoming, owner reply) pair mined from a private chat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrainingPair {
    pub user_message: String,
    pub admin_response: String,
    pub chat_id: i64,
    pub username: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FewShotExample {
    pub user: String,
    pub admin: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleProfile {
    pub profile: String,
    pub few_shot_examples: Vec<FewShotExample>,
    pub total_examples: usize,
    pub scanned_chats: usize,
    pub training_enabled: bool,
    pub scanned_at: Option<DateTime<Utc>>,
}

impl Default for StyleProfile {
    fn default() -> Self {
        Self {
            profile: String::new(),
            few_shot_examples: Vec::new(),
            total_examples: 0,
            scanned_chats: 0,
            training_enabled: true,
            scanned_at: None,
        }
    }
}

/// Summary returned by a dialog scan.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ScanReport {
    pub scanned_chats: usize,
    pub total_pairs: usize,
    pub total_messages: usize,
    pub skipped_non_private: usize,
    pub style_profile: String,
    pub few_shot_count: usize,
}

// ─────────────────────────────────────────────────────────────────────────────
// Media templates
// ─────────────────────────────────────────────────────────────────────────────

/// Kind of a media template. Declaration order is the resolution priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum MediaKind {
    Video,
    Image,
    Document,
}

impl MediaKind {
    /// Fixed resolution order.
    pub const ALL: [MediaKind; 3] = [MediaKind::Video, MediaKind::Image, MediaKind::Document];

    pub fn extensions(&self) -> &'static [&'static str] {
        match self {
            MediaKind::Video => &["mp4", "mov", "avi", "mkv"],
            MediaKind::Image => &["jpg", "jpeg", "png", "gif", "webp"],
            MediaKind::Document => &["pdf", "doc", "docx", "txt", "zip"],
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MediaKind::Video => "VIDEO",
            MediaKind::Image => "IMAGE",
            MediaKind::Document => "DOCUMENT",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "VIDEO" => Some(MediaKind::Video),
            "IMAGE" => Some(MediaKind::Image),
            "DOCUMENT" => Some(MediaKind::Document),
            _ => None,
        }
    }

    /// Kind for a file extension (case-insensitive, without the dot).
    pub fn from_extension(ext: &str) -> Option<Self> {
        let ext = ext.to_lowercase();
        Self::ALL
            .into_iter()
            .find(|k| k.extensions().contains(&ext.as_str()))
    }
}

impl std::fmt::Display for MediaKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file in the media directory that generated replies may reference by tag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaTemplate {
    pub tag: String,
    pub filename: String,
    /// `None` when the extension is not in any known list.
    pub media_kind: Option<MediaKind>,
    pub size_bytes: u64,
}

/// A tag file resolved for dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMedia {
    pub path: std::path::PathBuf,
    pub kind: MediaKind,
}

// ─────────────────────────────────────────────────────────────────────────────
// Outgoing transport signals
// ─────────────────────────────────────────────────────────────────────────────

/// "Composing" indicator shown to the counterpart.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatAction {
    Typing,
    RecordVoice,
    UploadVideo,
    UploadPhoto,
    UploadDocument,
}

impl ChatAction {
    pub fn for_upload(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => ChatAction::UploadVideo,
            MediaKind::Image => ChatAction::UploadPhoto,
            MediaKind::Document => ChatAction::UploadDocument,
        }
    }
}

/// How an outgoing file is presented in the chat.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutgoingFile {
    Voice,
    Audio,
    Video,
    Photo,
    Document,
}

impl From<MediaKind> for OutgoingFile {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Video => OutgoingFile::Video,
            MediaKind::Image => OutgoingFile::Photo,
            MediaKind::Document => OutgoingFile::Document,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Voice
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum VoiceMode {
    Always,
    #[default]
    VoiceOnly,
    Off,
}

impl VoiceMode {
    /// Unknown values behave as `Off`.
    pub fn parse(s: &str) -> Self {
        match s {
            "always" => VoiceMode::Always,
            "voice_only" => VoiceMode::VoiceOnly,
            _ => VoiceMode::Off,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioFormat {
    /// OGG/Opus, sendable as a voice note.
    Ogg,
    /// Raw provider output when transcoding is unavailable.
    Mp3,
}

#[derive(Debug, Clone)]
pub struct SynthesizedAudio {
    pub path: std::path::PathBuf,
    pub format: AudioFormat,
}

// ─────────────────────────────────────────────────────────────────────────────
// Runtime settings (persisted, read fresh on every event)
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VoiceSettings {
    pub enabled: bool,
    pub mode: VoiceMode,
    pub voice_id: String,
    pub tts_model: String,
    pub stt_model: String,
    pub language: String,
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: VoiceMode::VoiceOnly,
            voice_id: "pNInz6obpgDQGcFmaJgB".to_string(),
            tts_model: "eleven_multilingual_v2".to_string(),
            stt_model: "scribe_v2".to_string(),
            language: "ru".to_string(),
        }
    }
}

/// Longest accepted silence after an owner message: one year.
pub const MAX_SILENCE_MINUTES: i64 = 365 * 24 * 60;

/// Accepts silence durations in `1..=MAX_SILENCE_MINUTES`.
pub fn validate_silence_minutes(minutes: i64) -> Result<(), String> {
    if (1..=MAX_SILENCE_MINUTES).contains(&minutes) {
        Ok(())
    } else {
        Err(format!(
            "silence must be between 1 and {} minutes, got {}",
            MAX_SILENCE_MINUTES, minutes
        ))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeSettings {
    pub auto_reply: bool,
    pub silence_duration_min: i64,
    pub history_limit: usize,
    pub temperature: f32,
    pub custom_prompt: Option<String>,
    pub voice: VoiceSettings,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            auto_reply: true,
            silence_duration_min: 30,
            history_limit: 20,
            temperature: 0.7,
            custom_prompt: None,
            voice: VoiceSettings::default(),
        }
    }
}

/// Aggregate counters for the status screen.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BotStats {
    pub total_messages: u64,
    pub total_chats: u64,
    pub total_images_analyzed: u64,
    pub total_media_sent: u64,
    pub silenced_chats: u64,
}
