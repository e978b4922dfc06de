//! Application configuration. API credentials, paths, provider keys.
//!
//! Static values only. Settings that change while the bot runs live in the
//! store (`RuntimeSettings`) and are seeded from here on first start.

use crate::domain::{MAX_SILENCE_MINUTES, RuntimeSettings};
use serde::Deserialize;
use std::path::PathBuf;

/// Default silence window after the owner writes in a chat.
pub const DEFAULT_SILENCE_MINUTES: i64 = 30;

/// Default number of history messages sent to the provider.
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

#[derive(Debug, Deserialize, Default)]
pub struct AppConfig {
    pub api_id: Option<i32>,
    pub api_hash: Option<String>,
    /// Phone number offered as the default at the login prompt.
    #[serde(default)]
    pub phone: Option<String>,
    /// Owner chat id. Falls back to the logged-in account id.
    #[serde(default)]
    pub owner_id: Option<i64>,
    pub data_dir: Option<String>,
    pub session_path: Option<String>,
    /// Directory with media templates. Read from TG_PERSONA_MEDIA_DIR.
    #[serde(default)]
    pub media_dir: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // AI provider
    // ─────────────────────────────────────────────────────────────────────────
    /// `gemini` (default), `openai` or `groq`. Read from TG_PERSONA_AI_PROVIDER.
    #[serde(default)]
    pub ai_provider: Option<String>,

    /// Model id. Provider default when unset.
    #[serde(default)]
    pub ai_model: Option<String>,

    /// Override of the provider endpoint base URL.
    #[serde(default)]
    pub ai_base_url: Option<String>,

    #[serde(default)]
    pub gemini_api_key: Option<String>,

    #[serde(default)]
    pub openai_api_key: Option<String>,

    #[serde(default)]
    pub groq_api_key: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Voice
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub elevenlabs_api_key: Option<String>,

    /// ffmpeg binary used for MP3 → OGG/Opus. Defaults to `ffmpeg` on PATH.
    #[serde(default)]
    pub ffmpeg_path: Option<String>,

    // ─────────────────────────────────────────────────────────────────────────
    // Runtime defaults (seed values for the stored settings)
    // ─────────────────────────────────────────────────────────────────────────
    #[serde(default)]
    pub silence_duration_min: Option<i64>,

    #[serde(default)]
    pub history_limit: Option<usize>,

    #[serde(default)]
    pub temperature: Option<f32>,

    /// Show "typing" for a length-dependent delay before text replies. Default true.
    #[serde(default)]
    pub simulate_typing: Option<bool>,
}

impl AppConfig {
    pub fn load() -> Result<Self, config::ConfigError> {
        dotenv::dotenv().ok();
        let mut c = config::Config::builder();
        c = c.add_source(config::Environment::with_prefix("TG_PERSONA"));
        if let Ok(path) = std::env::var("TG_PERSONA_CONFIG") {
            c = c.add_source(config::File::with_name(&path));
        }
        let mut cfg: Self = c.build()?.try_deserialize()?;
        // Provider keys are also accepted without prefix so an existing .env keeps working.
        fill_from_env(&mut cfg.gemini_api_key, "GEMINI_API_KEY");
        fill_from_env(&mut cfg.openai_api_key, "OPENAI_API_KEY");
        fill_from_env(&mut cfg.groq_api_key, "GROQ_API_KEY");
        fill_from_env(&mut cfg.elevenlabs_api_key, "ELEVENLABS_API_KEY");
        Ok(cfg)
    }

    /// Returns the app id, or None when unset or zero.
    pub fn api_id(&self) -> Option<i32> {
        self.api_id.filter(|id| *id != 0)
    }

    /// Returns the app hash, or None when unset or empty.
    pub fn api_hash(&self) -> Option<String> {
        self.api_hash.clone().filter(|h| !h.is_empty())
    }

    pub fn data_dir_or_default(&self) -> PathBuf {
        PathBuf::from(self.data_dir.as_deref().unwrap_or("./data"))
    }

    pub fn session_path_or_default(&self) -> PathBuf {
        self.session_path
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir_or_default().join("persona.session"))
    }

    pub fn media_dir_or_default(&self) -> PathBuf {
        self.media_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.data_dir_or_default().join("media"))
    }

    pub fn ffmpeg_path_or_default(&self) -> String {
        self.ffmpeg_path
            .clone()
            .unwrap_or_else(|| "ffmpeg".to_string())
    }

    pub fn simulate_typing_or_default(&self) -> bool {
        self.simulate_typing.unwrap_or(true)
    }

    /// Seed values for the stored runtime settings.
    pub fn default_runtime_settings(&self) -> RuntimeSettings {
        let mut settings = RuntimeSettings::default();
        settings.silence_duration_min = self
            .silence_duration_min
            .unwrap_or(DEFAULT_SILENCE_MINUTES)
            .clamp(1, MAX_SILENCE_MINUTES);
        settings.history_limit = self.history_limit.unwrap_or(DEFAULT_HISTORY_LIMIT);
        if let Some(t) = self.temperature {
            settings.temperature = t.clamp(0.0, 1.0);
        }
        settings.voice.enabled = self.elevenlabs_api_key.is_some();
        settings
    }
}

fn fill_from_env(slot: &mut Option<String>, var: &str) {
    if slot.is_none() {
        if let Ok(v) = std::env::var(var) {
            if !v.is_empty() {
                *slot = Some(v);
            }
        }
    }
}
