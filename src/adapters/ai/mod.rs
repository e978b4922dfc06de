//! AI adapter module. Implements AiPort for the supported providers.
//!
//! Gemini and OpenAI-compatible (OpenAI, Groq) adapters, the provider
//! selector, and a mock adapter for testing.

pub mod gemini_adapter;
pub mod mock_adapter;
pub mod openai_adapter;
pub mod provider;

pub use gemini_adapter::GeminiAdapter;
pub use mock_adapter::MockAiAdapter;
pub use openai_adapter::OpenAiAdapter;
pub use provider::{ProviderClient, ProviderKind};
