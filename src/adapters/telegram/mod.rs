//! Telegram MTProto adapters built on grammers.

pub mod auth_adapter;
pub mod client;
pub mod listener;
pub mod mapper;
pub mod session;

pub use auth_adapter::GrammersAuthAdapter;
pub use client::GrammersMessenger;
pub use listener::UpdateListener;
pub use session::TelegramConnector;
