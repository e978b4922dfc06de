//! Per-chat mute timers armed by owner activity.
//!
//! Expiry is evaluated lazily at read time; timers are only ever superseded.

use crate::domain::{
    DomainError, Modality, SilenceTimer, VoiceMode, VoiceSettings, validate_silence_minutes,
};
use crate::ports::{SilencePort, Store};
use chrono::{Duration, Utc};
use std::sync::Arc;
use tracing::debug;

pub struct SilenceController {
    store: Arc<dyn Store>,
}

impl SilenceController {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn is_silenced(&self, chat_id: i64) -> Result<bool, DomainError> {
        Ok(self
            .store
            .get_silence(chat_id)
            .await?
            .is_some_and(|t| t.expires_at > Utc::now()))
    }

    /// Mute `chat_id` for `minutes` from now, replacing any earlier timer.
    pub async fn activate(&self, chat_id: i64, minutes: i64) -> Result<SilenceTimer, DomainError> {
        validate_silence_minutes(minutes).map_err(DomainError::Validation)?;
        let expires_at = Duration::try_minutes(minutes)
            .and_then(|d| Utc::now().checked_add_signed(d))
            .ok_or_else(|| {
                DomainError::Validation(format!("silence of {} minutes overflows", minutes))
            })?;
        let timer = SilenceTimer {
            chat_id,
            expires_at,
        };
        self.store.upsert_silence(&timer).await?;
        debug!(chat_id, minutes, expires_at = %timer.expires_at, "silence armed");
        Ok(timer)
    }
}

/// Whether a reply to an input of `modality` goes out as a voice note.
pub fn should_send_voice(voice: &VoiceSettings, configured: bool, modality: Modality) -> bool {
    if !voice.enabled || !configured {
        return false;
    }
    match voice.mode {
        VoiceMode::Always => true,
        VoiceMode::VoiceOnly => modality == Modality::Voice,
        VoiceMode::Off => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::persistence::MemoryRepo;
    use crate::domain::MAX_SILENCE_MINUTES;

    fn controller() -> (SilenceController, Arc<MemoryRepo>) {
        let repo = Arc::new(MemoryRepo::new());
        (SilenceController::new(repo.clone()), repo)
    }

    #[tokio::test]
    async fn test_unknown_chat_is_not_silenced() {
        let (silence, _) = controller();
        assert!(!silence.is_silenced(7).await.unwrap());
    }

    #[tokio::test]
    async fn test_activate_sets_expiry_from_now() {
        let (silence, _) = controller();
        let before = Utc::now();
        let timer = silence.activate(7, 30).await.unwrap();
        let expected = before + Duration::minutes(30);
        assert!((timer.expires_at - expected).num_seconds().abs() <= 2);
        assert!(silence.is_silenced(7).await.unwrap());
        assert!(!silence.is_silenced(8).await.unwrap());
    }

    #[tokio::test]
    async fn test_second_activation_replaces_expiry() {
        let (silence, repo) = controller();
        silence.activate(7, 60).await.unwrap();
        let second = silence.activate(7, 5).await.unwrap();
        let stored = repo.get_silence(7).await.unwrap().unwrap();
        assert_eq!(stored.expires_at, second.expires_at);
    }

    #[tokio::test]
    async fn test_out_of_range_duration_is_rejected() {
        let (silence, repo) = controller();
        for minutes in [i64::MAX / 120, i64::MAX, 0, -5] {
            let err = silence.activate(7, minutes).await.unwrap_err();
            assert!(matches!(err, DomainError::Validation(_)), "{minutes}");
        }
        assert!(repo.get_silence(7).await.unwrap().is_none());

        let year = silence.activate(7, MAX_SILENCE_MINUTES).await.unwrap();
        assert!(year.expires_at > Utc::now() + Duration::days(364));
    }

    #[tokio::test]
    async fn test_expired_timer_is_ignored() {
        let (silence, repo) = controller();
        repo.upsert_silence(&SilenceTimer {
            chat_id: 7,
            expires_at: Utc::now() - Duration::seconds(1),
        })
        .await
        .unwrap();
        assert!(!silence.is_silenced(7).await.unwrap());
    }

    #[test]
    fn test_voice_modes() {
        let mut voice = VoiceSettings {
            enabled: true,
            ..Default::default()
        };
        assert!(should_send_voice(&voice, true, Modality::Voice));
        assert!(!should_send_voice(&voice, true, Modality::Text));
        assert!(!should_send_voice(&voice, false, Modality::Voice));

        voice.mode = VoiceMode::Always;
        assert!(should_send_voice(&voice, true, Modality::Photo));

        voice.mode = VoiceMode::parse("sometimes");
        assert!(!should_send_voice(&voice, true, Modality::Voice));

        voice.mode = VoiceMode::Always;
        voice.enabled = false;
        assert!(!should_send_voice(&voice, true, Modality::Text));
    }
}
