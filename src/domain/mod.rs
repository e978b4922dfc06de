//! Core domain layer. No external I/O dependencies.
//!
//! Entities and business rules live here. Dependencies flow inward.

pub mod entities;
pub mod errors;
pub mod media_tags;
pub mod provider_error;

pub use entities::{
    Account, ActivityEntry, ActivityKind, AudioFormat, AuthSession, AuthState, AuthStatus,
    BotStats, Chat, ChatAction, ChatType, FewShotExample, InboundEvent, MediaKind,
    MediaReference, MediaTemplate, MediaType, Message, Modality, OutgoingFile, RemoteMessage,
    ResolvedMedia, Role, RuntimeSettings, ScanReport, SignInResult, SilenceTimer, StyleProfile,
    SynthesizedAudio, TrainingPair, VoiceMode, VoiceSettings, MAX_SILENCE_MINUTES,
    validate_silence_minutes,
};
pub use errors::DomainError;
pub use media_tags::MediaTag;
pub use provider_error::ProviderErrorKind;
