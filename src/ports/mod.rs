//! Port traits. API boundaries for the hexagon.
//!
//! - Inbound: Called by UI/adapter into the application
//! - Outbound: Called by application into infrastructure

pub mod inbound;
pub mod outbound;

pub use inbound::{EventHandler, InputPort};
pub use outbound::{
    ActivityLogPort, AiPort, AuthPort, AuthStatePort, ChatTurn, CompletionRequest,
    HistoryPort, ImageInput, MediaPort, MessengerPort, SettingsPort, SilencePort, StatsPort,
    Store, StylePort, UpdateSource, VoicePort,
};
