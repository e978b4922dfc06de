//! Application use cases. Orchestrate domain logic via ports.

pub mod auth_service;
pub mod bot_runner;
pub mod message_router;
pub mod prompt_builder;
pub mod response_generator;
pub mod silence;
pub mod style_learner;

pub use auth_service::AuthService;
pub use bot_runner::BotRunner;
pub use message_router::{MessageRouter, RouterDeps};
pub use prompt_builder::PromptBuilder;
pub use response_generator::ResponseGenerator;
pub use silence::SilenceController;
pub use style_learner::{StyleLearner, TrainingStatus};
