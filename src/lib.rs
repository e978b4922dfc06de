//! tg-persona: Telegram userbot that answers private chats in the owner's style,
//! with Hexagonal Architecture.

pub mod adapters;
pub mod domain;
pub mod ports;
pub mod shared;
pub mod usecases;
