//! Infrastructure adapters. Implement outbound ports.
//!
//! Telegram, SQLite, AI providers, speech services, media directory and the
//! operator console. Map errors to DomainError.

pub mod ai;
pub(crate) mod http;
pub mod media;
pub mod persistence;
pub mod telegram;
pub mod ui;
pub mod voice;
