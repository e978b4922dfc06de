//! In-memory store. Implements every persistence port; used by tests and dry runs.

use crate::domain::{
    ActivityEntry, ActivityKind, AuthSession, BotStats, DomainError, Message, RuntimeSettings,
    SilenceTimer, StyleProfile, TrainingPair,
};
use crate::ports::{
    ActivityLogPort, AuthStatePort, HistoryPort, SettingsPort, SilencePort, StatsPort, StylePort,
};
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    messages: Vec<Message>,
    activity: Vec<ActivityEntry>,
    silence: HashMap<i64, SilenceTimer>,
    auth: Option<AuthSession>,
    training: Vec<TrainingPair>,
    profile: Option<StyleProfile>,
    settings: Option<RuntimeSettings>,
    media_rules: HashMap<String, String>,
}

/// Store kept entirely in process memory. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryRepo {
    inner: Mutex<Inner>,
}

impl MemoryRepo {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every stored message, in insertion order.
    pub async fn all_messages(&self) -> Vec<Message> {
        self.inner.lock().await.messages.clone()
    }

    /// Every activity entry, in insertion order.
    pub async fn all_activity(&self) -> Vec<ActivityEntry> {
        self.inner.lock().await.activity.clone()
    }

    /// Number of activity entries of one kind.
    pub async fn count_activity(&self, kind: ActivityKind) -> usize {
        self.inner
            .lock()
            .await
            .activity
            .iter()
            .filter(|e| e.event_type == kind.as_str())
            .count()
    }

    pub async fn training_pairs(&self) -> Vec<TrainingPair> {
        self.inner.lock().await.training.clone()
    }
}

#[async_trait::async_trait]
impl HistoryPort for MemoryRepo {
    async fn append(&self, message: &Message) -> Result<(), DomainError> {
        self.inner.lock().await.messages.push(message.clone());
        Ok(())
    }

    async fn recent(&self, chat_id: i64, limit: usize) -> Result<Vec<Message>, DomainError> {
        let inner = self.inner.lock().await;
        let mut chat: Vec<Message> = inner
            .messages
            .iter()
            .filter(|m| m.chat_id == chat_id)
            .cloned()
            .collect();
        // Stable: equal timestamps keep insertion order.
        chat.sort_by_key(|m| m.timestamp);
        let skip = chat.len().saturating_sub(limit);
        Ok(chat.into_iter().skip(skip).collect())
    }
}

#[async_trait::async_trait]
impl ActivityLogPort for MemoryRepo {
    async fn log(&self, entry: &ActivityEntry) -> Result<(), DomainError> {
        self.inner.lock().await.activity.push(entry.clone());
        Ok(())
    }

    async fn recent_activity(&self, limit: usize) -> Result<Vec<ActivityEntry>, DomainError> {
        let inner = self.inner.lock().await;
        Ok(inner.activity.iter().rev().take(limit).cloned().collect())
    }
}

#[async_trait::async_trait]
impl SilencePort for MemoryRepo {
    async fn upsert_silence(&self, timer: &SilenceTimer) -> Result<(), DomainError> {
        self.inner
            .lock()
            .await
            .silence
            .insert(timer.chat_id, timer.clone());
        Ok(())
    }

    async fn get_silence(&self, chat_id: i64) -> Result<Option<SilenceTimer>, DomainError> {
        Ok(self.inner.lock().await.silence.get(&chat_id).cloned())
    }
}

#[async_trait::async_trait]
impl AuthStatePort for MemoryRepo {
    async fn load_auth_session(&self) -> Result<AuthSession, DomainError> {
        Ok(self.inner.lock().await.auth.clone().unwrap_or_default())
    }

    async fn save_auth_session(&self, session: &AuthSession) -> Result<(), DomainError> {
        self.inner.lock().await.auth = Some(session.clone());
        Ok(())
    }
}

#[async_trait::async_trait]
impl StylePort for MemoryRepo {
    async fn replace_training_pairs(&self, pairs: &[TrainingPair]) -> Result<(), DomainError> {
        self.inner.lock().await.training = pairs.to_vec();
        Ok(())
    }

    async fn count_training_pairs(&self) -> Result<u64, DomainError> {
        Ok(self.inner.lock().await.training.len() as u64)
    }

    async fn load_style_profile(&self) -> Result<Option<StyleProfile>, DomainError> {
        Ok(self.inner.lock().await.profile.clone())
    }

    async fn save_style_profile(&self, profile: &StyleProfile) -> Result<(), DomainError> {
        self.inner.lock().await.profile = Some(profile.clone());
        Ok(())
    }

    async fn clear_training(&self) -> Result<(), DomainError> {
        let mut inner = self.inner.lock().await;
        inner.training.clear();
        inner.profile = None;
        Ok(())
    }
}

#[async_trait::async_trait]
impl SettingsPort for MemoryRepo {
    async fn load_settings(&self) -> Result<Option<RuntimeSettings>, DomainError> {
        Ok(self.inner.lock().await.settings.clone())
    }

    async fn save_settings(&self, settings: &RuntimeSettings) -> Result<(), DomainError> {
        self.inner.lock().await.settings = Some(settings.clone());
        Ok(())
    }

    async fn media_rules(&self) -> Result<HashMap<String, String>, DomainError> {
        Ok(self.inner.lock().await.media_rules.clone())
    }

    async fn set_media_rule(&self, tag: &str, description: &str) -> Result<(), DomainError> {
        self.inner
            .lock()
            .await
            .media_rules
            .insert(tag.to_string(), description.to_string());
        Ok(())
    }
}

#[async_trait::async_trait]
impl StatsPort for MemoryRepo {
    async fn stats(&self) -> Result<BotStats, DomainError> {
        let inner = self.inner.lock().await;
        let now = Utc::now();
        let chats: HashSet<i64> = inner.messages.iter().map(|m| m.chat_id).collect();
        Ok(BotStats {
            total_messages: inner.messages.len() as u64,
            total_chats: chats.len() as u64,
            total_images_analyzed: inner.messages.iter().filter(|m| m.has_image).count() as u64,
            total_media_sent: inner
                .activity
                .iter()
                .filter(|e| e.event_type == ActivityKind::MediaSent.as_str())
                .count() as u64,
            silenced_chats: inner
                .silence
                .values()
                .filter(|t| t.expires_at > now)
                .count() as u64,
        })
    }
}
