//! Per-message pipeline: gates, intake by modality, generation, dispatch.
//!
//! Inbound messages from counterparts get an AI reply unless automation is off
//! or the chat is muted. Outgoing messages written by the owner mute the chat.
//! Every failure ends in a short apology to the counterpart, never in silence.

use crate::domain::media_tags::{self, MediaTag};
use crate::domain::provider_error::{self, ProviderErrorKind};
use crate::domain::{
    ActivityEntry, ActivityKind, AudioFormat, ChatAction, DomainError, InboundEvent, Message,
    Modality, OutgoingFile, RuntimeSettings, VoiceSettings,
};
use crate::ports::{
    ActivityLogPort, EventHandler, HistoryPort, MediaPort, MessengerPort, SettingsPort, Store,
    VoicePort,
};
use crate::usecases::prompt_builder::PromptBuilder;
use crate::usecases::response_generator::ResponseGenerator;
use crate::usecases::silence::{SilenceController, should_send_voice};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const VOICE_NOT_CONFIGURED: &str = "[voice message: recognition not configured]";
pub const VOICE_FAILED: &str = "[voice message: recognition failed]";
pub const VOICE_UNRECOGNIZED: &str = "[voice message: could not recognize speech]";
pub const SCREENSHOT_PLACEHOLDER: &str = "[screenshot]";

const LOG_PREVIEW_CHARS: usize = 80;

/// How long to show "typing" before a text reply of this length.
pub fn typing_delay(text: &str) -> Duration {
    let secs = (text.chars().count() as f64 / 40.0).clamp(1.5, 8.0);
    Duration::from_secs_f64(secs)
}

fn preview(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Collaborators of the router.
pub struct RouterDeps {
    pub store: Arc<dyn Store>,
    pub messenger: Arc<dyn MessengerPort>,
    pub voice: Arc<dyn VoicePort>,
    pub media: Arc<dyn MediaPort>,
    pub generator: Arc<ResponseGenerator>,
}

pub struct MessageRouter {
    store: Arc<dyn Store>,
    messenger: Arc<dyn MessengerPort>,
    voice: Arc<dyn VoicePort>,
    media: Arc<dyn MediaPort>,
    generator: Arc<ResponseGenerator>,
    prompts: PromptBuilder,
    silence: SilenceController,
    /// Used when no settings were persisted yet.
    defaults: RuntimeSettings,
    /// Where inbound voice and photos are downloaded.
    download_dir: PathBuf,
    simulate_typing: bool,
    /// 0 until the bot is started.
    owner_id: AtomicI64,
}

impl MessageRouter {
    pub fn new(
        deps: RouterDeps,
        defaults: RuntimeSettings,
        download_dir: PathBuf,
        simulate_typing: bool,
    ) -> Self {
        Self {
            prompts: PromptBuilder::new(deps.store.clone(), deps.media.clone()),
            silence: SilenceController::new(deps.store.clone()),
            store: deps.store,
            messenger: deps.messenger,
            voice: deps.voice,
            media: deps.media,
            generator: deps.generator,
            defaults,
            download_dir,
            simulate_typing,
            owner_id: AtomicI64::new(0),
        }
    }

    pub fn set_owner(&self, owner_id: i64) {
        self.owner_id.store(owner_id, Ordering::SeqCst);
    }

    fn owner_id(&self) -> Option<i64> {
        match self.owner_id.load(Ordering::SeqCst) {
            0 => None,
            id => Some(id),
        }
    }

    /// Settings are read on every event so console changes apply immediately.
    async fn settings(&self) -> Result<RuntimeSettings, DomainError> {
        Ok(self
            .store
            .load_settings()
            .await?
            .unwrap_or_else(|| self.defaults.clone()))
    }

    async fn log(
        &self,
        kind: ActivityKind,
        chat_id: i64,
        username: Option<&str>,
        details: impl Into<String>,
    ) {
        let entry = ActivityEntry::new(kind, Some(chat_id), username.map(String::from), details);
        if let Err(e) = self.store.log(&entry).await {
            warn!(chat_id, event = %kind, error = %e, "failed to write activity");
        }
    }

    async fn chat_action(&self, chat_id: i64, action: ChatAction) {
        if let Err(e) = self.messenger.send_chat_action(chat_id, action).await {
            warn!(chat_id, ?action, error = %e, "failed to send chat action");
        }
    }

    /// Owner wrote in a chat: mute automation there.
    pub async fn handle_owner_message(&self, event: &InboundEvent) -> Result<(), DomainError> {
        if self.owner_id() == Some(event.chat_id) {
            return Ok(());
        }
        let minutes = self.settings().await?.silence_duration_min;
        self.silence.activate(event.chat_id, minutes).await?;
        self.log(
            ActivityKind::SilenceActivated,
            event.chat_id,
            event.username.as_deref(),
            format!("Owner is writing, silence for {} min", minutes),
        )
        .await;
        info!(chat_id = event.chat_id, minutes, "silence activated");
        Ok(())
    }

    /// Counterpart wrote: reply unless gated. Failures are answered in the chat.
    pub async fn handle_incoming(&self, event: &InboundEvent) {
        if let Err(e) = self.process_incoming(event).await {
            self.report_failure(event, e).await;
        }
    }

    async fn process_incoming(&self, event: &InboundEvent) -> Result<(), DomainError> {
        let chat_id = event.chat_id;
        if event.modality == Modality::Text && event.text.trim().is_empty() {
            debug!(chat_id, "skipping message without text");
            return Ok(());
        }

        let settings = self.settings().await?;
        if !settings.auto_reply {
            info!(chat_id, "auto-reply is off, skipping");
            return Ok(());
        }
        if self.silence.is_silenced(chat_id).await? {
            info!(chat_id, "chat is silenced, skipping");
            return Ok(());
        }

        let voice_reply =
            should_send_voice(&settings.voice, self.voice.is_configured(), event.modality);
        let composing = if voice_reply {
            ChatAction::RecordVoice
        } else {
            ChatAction::Typing
        };
        self.chat_action(chat_id, composing).await;

        let system_prompt = self
            .prompts
            .build(settings.custom_prompt.as_deref())
            .await?;

        let raw_reply = match event.modality {
            Modality::Voice => {
                let text = self.intake_voice(event, &settings.voice).await?;
                self.chat_action(chat_id, composing).await;
                self.generate(event, &settings, &system_prompt, &text).await?
            }
            Modality::Photo => {
                self.intake_photo(event, &settings, &system_prompt, composing)
                    .await?
            }
            Modality::Text => {
                self.store
                    .append(&Message::user(chat_id, &event.text, event.username.clone()))
                    .await?;
                self.log(
                    ActivityKind::MessageReceived,
                    chat_id,
                    event.username.as_deref(),
                    preview(&event.text, LOG_PREVIEW_CHARS),
                )
                .await;
                self.generate(event, &settings, &system_prompt, &event.text)
                    .await?
            }
        };

        self.dispatch(event, &settings, voice_reply, &raw_reply).await
    }

    async fn generate(
        &self,
        event: &InboundEvent,
        settings: &RuntimeSettings,
        system_prompt: &str,
        user_text: &str,
    ) -> Result<String, DomainError> {
        let history = self
            .store
            .recent(event.chat_id, settings.history_limit)
            .await?;
        self.generator
            .generate(&history, system_prompt, user_text, settings.temperature)
            .await
    }

    fn download_path(&self, event: &InboundEvent, ext: &str) -> PathBuf {
        self.download_dir
            .join(format!("{}_{}.{}", event.chat_id, event.message_id, ext))
    }

    /// Download, transcribe and persist a voice message. Returns the text to answer.
    async fn intake_voice(
        &self,
        event: &InboundEvent,
        voice: &VoiceSettings,
    ) -> Result<String, DomainError> {
        let media = event
            .media
            .as_ref()
            .ok_or_else(|| DomainError::Media("voice message without media".into()))?;
        let path = self.download_path(event, "ogg");
        self.messenger.download_media(media, &path).await?;

        let text = if !self.voice.is_configured() {
            VOICE_NOT_CONFIGURED.to_string()
        } else {
            match self.voice.transcribe(&path, &voice.stt_model).await {
                Ok(t) if t.trim().is_empty() => VOICE_UNRECOGNIZED.to_string(),
                Ok(t) => t,
                Err(e) => {
                    warn!(chat_id = event.chat_id, error = %e, "voice transcription failed");
                    VOICE_FAILED.to_string()
                }
            }
        };

        let stored = self
            .store
            .append(&Message::user(event.chat_id, &text, event.username.clone()))
            .await;
        self.log(
            ActivityKind::VoiceReceived,
            event.chat_id,
            event.username.as_deref(),
            format!("Voice: {}", preview(&text, LOG_PREVIEW_CHARS)),
        )
        .await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            debug!(path = %path.display(), error = %e, "could not remove voice file");
        }
        stored?;
        Ok(text)
    }

    /// Download, persist and analyze a photo. Returns the reply.
    async fn intake_photo(
        &self,
        event: &InboundEvent,
        settings: &RuntimeSettings,
        system_prompt: &str,
        composing: ChatAction,
    ) -> Result<String, DomainError> {
        let media = event
            .media
            .as_ref()
            .ok_or_else(|| DomainError::Media("photo message without media".into()))?;
        let path = self.download_path(event, "jpg");
        self.messenger.download_media(media, &path).await?;

        let caption = Some(event.text.trim()).filter(|c| !c.is_empty());
        let persisted = caption.unwrap_or(SCREENSHOT_PLACEHOLDER);
        self.store
            .append(&Message::user(event.chat_id, persisted, event.username.clone()).with_image())
            .await?;
        self.log(
            ActivityKind::MessageReceived,
            event.chat_id,
            event.username.as_deref(),
            "Screenshot received",
        )
        .await;
        self.chat_action(event.chat_id, composing).await;

        let reply = self
            .generator
            .analyze_image(&path, system_prompt, caption, settings.temperature)
            .await;
        if let Err(e) = tokio::fs::remove_file(&path).await {
            debug!(path = %path.display(), error = %e, "could not remove photo file");
        }
        let reply = reply?;
        self.log(
            ActivityKind::ImageAnalyzed,
            event.chat_id,
            event.username.as_deref(),
            "Screenshot analyzed",
        )
        .await;
        Ok(reply)
    }

    async fn dispatch(
        &self,
        event: &InboundEvent,
        settings: &RuntimeSettings,
        voice_reply: bool,
        raw_reply: &str,
    ) -> Result<(), DomainError> {
        let chat_id = event.chat_id;
        let (text, tags) = media_tags::parse(raw_reply);

        if !text.is_empty() {
            if voice_reply {
                self.chat_action(chat_id, ChatAction::RecordVoice).await;
            } else if self.simulate_typing {
                self.chat_action(chat_id, ChatAction::Typing).await;
                tokio::time::sleep(typing_delay(&text)).await;
            }

            let sent_voice = voice_reply && self.send_voice(event, &text, &settings.voice).await;
            if !sent_voice {
                self.messenger
                    .send_text(chat_id, &text, Some(event.message_id))
                    .await?;
            }

            self.store.append(&Message::assistant(chat_id, &text)).await?;
            self.log(
                ActivityKind::ResponseSent,
                chat_id,
                event.username.as_deref(),
                preview(&text, LOG_PREVIEW_CHARS),
            )
            .await;
        }

        for tag in &tags {
            self.send_media(event, tag).await;
        }
        Ok(())
    }

    /// Synthesize and send a voice reply. False means the caller sends text instead.
    async fn send_voice(&self, event: &InboundEvent, text: &str, voice: &VoiceSettings) -> bool {
        let audio = match self.voice.synthesize(text, voice).await {
            Ok(audio) => audio,
            Err(e) => {
                warn!(chat_id = event.chat_id, error = %e, "voice synthesis failed, sending text");
                return false;
            }
        };
        let kind = match audio.format {
            AudioFormat::Ogg => OutgoingFile::Voice,
            AudioFormat::Mp3 => OutgoingFile::Audio,
        };
        let sent = self
            .messenger
            .send_file(event.chat_id, &audio.path, kind)
            .await;
        if let Err(e) = tokio::fs::remove_file(&audio.path).await {
            debug!(path = %audio.path.display(), error = %e, "could not remove synthesized audio");
        }
        match sent {
            Ok(()) => {
                self.log(
                    ActivityKind::VoiceSent,
                    event.chat_id,
                    event.username.as_deref(),
                    format!("Voice reply: {}", preview(text, 60)),
                )
                .await;
                true
            }
            Err(e) => {
                warn!(chat_id = event.chat_id, error = %e, "voice upload failed, sending text");
                false
            }
        }
    }

    async fn send_media(&self, event: &InboundEvent, tag: &MediaTag) {
        let chat_id = event.chat_id;
        let resolved = match self.media.resolve(&tag.name).await {
            Ok(Some(resolved)) => resolved,
            Ok(None) => {
                warn!(chat_id, tag = %tag.name, kind = %tag.kind, "media template not found");
                return;
            }
            Err(e) => {
                warn!(chat_id, tag = %tag.name, error = %e, "media lookup failed");
                return;
            }
        };
        self.chat_action(chat_id, ChatAction::for_upload(resolved.kind))
            .await;
        match self
            .messenger
            .send_file(chat_id, &resolved.path, resolved.kind.into())
            .await
        {
            Ok(()) => {
                self.log(
                    ActivityKind::MediaSent,
                    chat_id,
                    event.username.as_deref(),
                    format!("Sent {}: {}", resolved.kind, tag.name),
                )
                .await;
            }
            Err(e) => warn!(chat_id, tag = %tag.name, error = %e, "failed to send media"),
        }
    }

    async fn report_failure(&self, event: &InboundEvent, err: DomainError) {
        let raw = match &err {
            DomainError::Ai(raw) => raw.clone(),
            other => other.to_string(),
        };
        let kind = provider_error::classify(&raw);
        error!(
            chat_id = event.chat_id,
            category = kind.label(),
            error = %err,
            "failed to answer message"
        );
        let apology = kind.user_message();
        if let Err(e) = self
            .messenger
            .send_text(event.chat_id, &apology, Some(event.message_id))
            .await
        {
            warn!(chat_id = event.chat_id, error = %e, "failed to send error message");
            let generic = ProviderErrorKind::Other(String::new()).user_message();
            if let Err(e) = self
                .messenger
                .send_text(event.chat_id, &generic, Some(event.message_id))
                .await
            {
                warn!(chat_id = event.chat_id, error = %e, "failed to send fallback error message");
            }
        }
    }
}

#[async_trait::async_trait]
impl EventHandler for MessageRouter {
    async fn handle(&self, event: InboundEvent) {
        if event.outgoing {
            if let Err(e) = self.handle_owner_message(&event).await {
                warn!(chat_id = event.chat_id, error = %e, "failed to arm silence");
            }
        } else {
            self.handle_incoming(&event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::ai::MockAiAdapter;
    use crate::adapters::media::MediaLibrary;
    use crate::adapters::persistence::MemoryRepo;
    use crate::domain::{
        Account, Chat, MediaReference, MediaType, RemoteMessage, Role, SynthesizedAudio,
    };
    use crate::ports::{ChatTurn, SilencePort};
    use chrono::Utc;
    use std::path::Path;
    use tokio::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    enum Sent {
        Text(String),
        File(PathBuf, OutgoingFile),
    }

    /// Records everything the router sends.
    #[derive(Default)]
    struct RecordingMessenger {
        sent: Mutex<Vec<Sent>>,
        actions: Mutex<Vec<ChatAction>>,
        fail_text: Mutex<usize>,
    }

    impl RecordingMessenger {
        async fn sent(&self) -> Vec<Sent> {
            self.sent.lock().await.clone()
        }

        async fn texts(&self) -> Vec<String> {
            self.sent()
                .await
                .into_iter()
                .filter_map(|s| match s {
                    Sent::Text(t) => Some(t),
                    Sent::File(..) => None,
                })
                .collect()
        }
    }

    #[async_trait::async_trait]
    impl MessengerPort for RecordingMessenger {
        async fn get_me(&self) -> Result<Account, DomainError> {
            Ok(Account {
                id: OWNER,
                first_name: "Owner".into(),
                username: None,
            })
        }

        async fn get_dialogs(&self, _: usize) -> Result<Vec<Chat>, DomainError> {
            Ok(vec![])
        }

        async fn get_messages(&self, _: i64, _: usize) -> Result<Vec<RemoteMessage>, DomainError> {
            Ok(vec![])
        }

        async fn send_chat_action(&self, _: i64, action: ChatAction) -> Result<(), DomainError> {
            self.actions.lock().await.push(action);
            Ok(())
        }

        async fn send_text(
            &self,
            _: i64,
            text: &str,
            _: Option<i32>,
        ) -> Result<(), DomainError> {
            let mut failures = self.fail_text.lock().await;
            if *failures > 0 {
                *failures -= 1;
                return Err(DomainError::Telegram("MESSAGE_TOO_LONG".into()));
            }
            self.sent.lock().await.push(Sent::Text(text.to_string()));
            Ok(())
        }

        async fn send_file(
            &self,
            _: i64,
            path: &Path,
            kind: OutgoingFile,
        ) -> Result<(), DomainError> {
            self.sent
                .lock()
                .await
                .push(Sent::File(path.to_path_buf(), kind));
            Ok(())
        }

        async fn download_media(
            &self,
            _: &MediaReference,
            dest_path: &Path,
        ) -> Result<(), DomainError> {
            tokio::fs::write(dest_path, b"media")
                .await
                .map_err(|e| DomainError::Media(e.to_string()))
        }
    }

    /// Speech service with a fixed transcript and MP3 output. `None` fails transcription.
    struct FakeVoice {
        configured: bool,
        transcript: Option<String>,
        tmp: PathBuf,
    }

    #[async_trait::async_trait]
    impl VoicePort for FakeVoice {
        fn is_configured(&self) -> bool {
            self.configured
        }

        async fn transcribe(&self, _: &Path, _: &str) -> Result<String, DomainError> {
            self.transcript
                .clone()
                .ok_or_else(|| DomainError::Voice("HTTP request timed out".into()))
        }

        async fn synthesize(
            &self,
            _: &str,
            _: &VoiceSettings,
        ) -> Result<SynthesizedAudio, DomainError> {
            let path = self.tmp.join("reply.mp3");
            tokio::fs::write(&path, b"ID3")
                .await
                .map_err(|e| DomainError::Voice(e.to_string()))?;
            Ok(SynthesizedAudio {
                path,
                format: AudioFormat::Mp3,
            })
        }
    }

    const OWNER: i64 = 1;
    const CLIENT: i64 = 500;

    struct Harness {
        router: MessageRouter,
        repo: Arc<MemoryRepo>,
        ai: Arc<MockAiAdapter>,
        messenger: Arc<RecordingMessenger>,
        media_dir: tempfile::TempDir,
        _tmp: tempfile::TempDir,
    }

    fn harness(ai: MockAiAdapter, voice_configured: bool) -> Harness {
        harness_with_transcript(ai, voice_configured, Some("what is the price"))
    }

    fn harness_with_transcript(
        ai: MockAiAdapter,
        voice_configured: bool,
        transcript: Option<&str>,
    ) -> Harness {
        let repo = Arc::new(MemoryRepo::new());
        let ai = Arc::new(ai);
        let messenger = Arc::new(RecordingMessenger::default());
        let media_dir = tempfile::tempdir().unwrap();
        let tmp = tempfile::tempdir().unwrap();
        let voice = Arc::new(FakeVoice {
            configured: voice_configured,
            transcript: transcript.map(String::from),
            tmp: tmp.path().to_path_buf(),
        });
        let router = MessageRouter::new(
            RouterDeps {
                store: repo.clone(),
                messenger: messenger.clone(),
                voice,
                media: Arc::new(MediaLibrary::new(media_dir.path())),
                generator: Arc::new(ResponseGenerator::new(ai.clone())),
            },
            RuntimeSettings::default(),
            tmp.path().to_path_buf(),
            false,
        );
        router.set_owner(OWNER);
        Harness {
            router,
            repo,
            ai,
            messenger,
            media_dir,
            _tmp: tmp,
        }
    }

    fn text_event(text: &str) -> InboundEvent {
        InboundEvent {
            chat_id: CLIENT,
            message_id: 77,
            sender_id: Some(CLIENT),
            username: Some("client".into()),
            outgoing: false,
            modality: Modality::Text,
            text: text.into(),
            media: None,
        }
    }

    fn media_event(modality: Modality, media_type: MediaType, caption: &str) -> InboundEvent {
        InboundEvent {
            modality,
            text: caption.into(),
            media: Some(MediaReference {
                message_id: 77,
                chat_id: CLIENT,
                media_type,
                mime_type: None,
            }),
            ..text_event("")
        }
    }

    fn owner_event(chat_id: i64) -> InboundEvent {
        InboundEvent {
            chat_id,
            sender_id: Some(OWNER),
            outgoing: true,
            ..text_event("I'll handle this one")
        }
    }

    #[test]
    fn test_typing_delay_bounds() {
        assert_eq!(typing_delay("hi"), Duration::from_secs_f64(1.5));
        assert_eq!(typing_delay(&"x".repeat(200)), Duration::from_secs(5));
        assert_eq!(typing_delay(&"x".repeat(2000)), Duration::from_secs(8));
    }

    #[tokio::test]
    async fn test_text_reply_round_trip() {
        let h = harness(MockAiAdapter::replying("Привет! Чем помочь?"), false);
        h.router.handle(text_event("Привет")).await;

        let messages = h.repo.all_messages().await;
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].text, "Привет");
        assert_eq!(messages[0].username.as_deref(), Some("client"));
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].text, "Привет! Чем помочь?");

        let calls = h.ai.calls().await;
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].request.turns, vec![ChatTurn::user("Привет")]);
        assert_eq!(h.repo.count_activity(ActivityKind::ResponseSent).await, 1);
        assert_eq!(h.repo.count_activity(ActivityKind::MessageReceived).await, 1);
        let activity = h.repo.all_activity().await;
        assert!(activity.iter().all(|e| e.username.as_deref() == Some("client")));
        assert_eq!(h.messenger.texts().await, vec!["Привет! Чем помочь?"]);
        assert_eq!(h.messenger.actions.lock().await[0], ChatAction::Typing);
    }

    #[tokio::test]
    async fn test_owner_message_silences_chat() {
        let h = harness(MockAiAdapter::new(), false);
        let before = Utc::now();
        h.router.handle(owner_event(CLIENT)).await;

        let timer = h.repo.get_silence(CLIENT).await.unwrap().unwrap();
        let expected = before + chrono::Duration::minutes(30);
        assert!((timer.expires_at - expected).num_seconds().abs() <= 2);
        assert_eq!(h.repo.count_activity(ActivityKind::SilenceActivated).await, 1);

        h.router.handle(text_event("hello?")).await;
        assert_eq!(h.ai.call_count().await, 0);
        assert!(h.repo.all_messages().await.is_empty());
        assert!(h.messenger.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_owner_duration_is_read_fresh() {
        let h = harness(MockAiAdapter::new(), false);
        h.repo
            .save_settings(&RuntimeSettings {
                silence_duration_min: 5,
                ..Default::default()
            })
            .await
            .unwrap();
        h.router.handle(owner_event(CLIENT)).await;
        let timer = h.repo.get_silence(CLIENT).await.unwrap().unwrap();
        assert!(timer.expires_at <= Utc::now() + chrono::Duration::minutes(5));
    }

    #[tokio::test]
    async fn test_owner_own_chat_is_never_silenced() {
        let h = harness(MockAiAdapter::new(), false);
        h.router.handle(owner_event(OWNER)).await;
        assert!(h.repo.get_silence(OWNER).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_auto_reply_off_skips() {
        let h = harness(MockAiAdapter::new(), false);
        h.repo
            .save_settings(&RuntimeSettings {
                auto_reply: false,
                ..Default::default()
            })
            .await
            .unwrap();
        h.router.handle(text_event("hi")).await;
        assert_eq!(h.ai.call_count().await, 0);
        assert!(h.messenger.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_quota_error_gets_specific_template() {
        let h = harness(MockAiAdapter::new(), false);
        h.ai.push_error("API error 429 Too Many Requests: quota exceeded")
            .await;
        h.router.handle(text_event("hi")).await;

        assert_eq!(
            h.messenger.texts().await,
            vec![ProviderErrorKind::RateLimited.user_message()]
        );
        assert_eq!(h.repo.count_activity(ActivityKind::ResponseSent).await, 0);
    }

    #[tokio::test]
    async fn test_failed_apology_falls_back_to_generic() {
        let h = harness(MockAiAdapter::new(), false);
        h.ai.push_error("deadline exceeded").await;
        *h.messenger.fail_text.lock().await = 1;
        h.router.handle(text_event("hi")).await;
        assert_eq!(
            h.messenger.texts().await,
            vec!["⚠️ Something went wrong while processing the message.".to_string()]
        );
    }

    #[tokio::test]
    async fn test_media_tag_is_dispatched() {
        let h = harness(MockAiAdapter::replying("Here you go [VIDEO:demo]"), false);
        let video = h.media_dir.path().join("demo.mp4");
        tokio::fs::write(&video, b"mp4").await.unwrap();
        h.router.handle(text_event("show me a demo")).await;

        assert_eq!(
            h.messenger.sent().await,
            vec![
                Sent::Text("Here you go".into()),
                Sent::File(video, OutgoingFile::Video),
            ]
        );
        assert_eq!(h.repo.count_activity(ActivityKind::MediaSent).await, 1);
        assert!(
            h.messenger
                .actions
                .lock()
                .await
                .contains(&ChatAction::UploadVideo)
        );
    }

    #[tokio::test]
    async fn test_missing_media_is_skipped() {
        let h = harness(MockAiAdapter::replying("Here you go [VIDEO:demo]"), false);
        h.router.handle(text_event("show me a demo")).await;
        assert_eq!(
            h.messenger.sent().await,
            vec![Sent::Text("Here you go".into())]
        );
        assert_eq!(h.repo.count_activity(ActivityKind::MediaSent).await, 0);
        assert_eq!(h.repo.count_activity(ActivityKind::ResponseSent).await, 1);
    }

    #[tokio::test]
    async fn test_voice_without_stt_uses_placeholder() {
        let h = harness(MockAiAdapter::replying("Could you type it?"), false);
        h.router
            .handle(media_event(Modality::Voice, MediaType::Voice, ""))
            .await;
        let messages = h.repo.all_messages().await;
        assert_eq!(messages[0].text, VOICE_NOT_CONFIGURED);
        assert_eq!(h.repo.count_activity(ActivityKind::VoiceReceived).await, 1);
        assert!(!h._tmp.path().join(format!("{}_77.ogg", CLIENT)).exists());
    }

    #[tokio::test]
    async fn test_failed_transcription_still_gets_a_text_reply() {
        let h = harness_with_transcript(
            MockAiAdapter::replying("Sorry, can you type it?"),
            true,
            None,
        );
        h.router
            .handle(media_event(Modality::Voice, MediaType::Voice, ""))
            .await;

        let messages = h.repo.all_messages().await;
        assert_eq!(messages[0].text, VOICE_FAILED);
        let calls = h.ai.calls().await;
        let last = calls[0].request.turns.last().unwrap();
        assert_eq!(last.text, VOICE_FAILED);
        let sent = h.messenger.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Sent::Text(t) if t == "Sorry, can you type it?"));
    }

    #[tokio::test]
    async fn test_empty_transcript_uses_unrecognized_placeholder() {
        let h = harness_with_transcript(MockAiAdapter::replying("Hm?"), true, Some("  "));
        h.router
            .handle(media_event(Modality::Voice, MediaType::Voice, ""))
            .await;
        assert_eq!(h.repo.all_messages().await[0].text, VOICE_UNRECOGNIZED);
    }

    #[tokio::test]
    async fn test_voice_reply_sent_as_audio_when_not_ogg() {
        let h = harness(MockAiAdapter::replying("It costs 10"), true);
        h.repo
            .save_settings(&RuntimeSettings {
                voice: VoiceSettings {
                    enabled: true,
                    ..Default::default()
                },
                ..Default::default()
            })
            .await
            .unwrap();
        h.router
            .handle(media_event(Modality::Voice, MediaType::Voice, ""))
            .await;

        let sent = h.messenger.sent().await;
        assert_eq!(sent.len(), 1);
        assert!(matches!(&sent[0], Sent::File(_, OutgoingFile::Audio)));
        assert_eq!(h.repo.all_messages().await[0].text, "what is the price");
        assert_eq!(h.repo.count_activity(ActivityKind::VoiceSent).await, 1);
        assert_eq!(h.messenger.actions.lock().await[0], ChatAction::RecordVoice);
    }

    #[tokio::test]
    async fn test_photo_is_analyzed_with_placeholder() {
        let h = harness(MockAiAdapter::replying("That error means the cache is stale"), false);
        h.router
            .handle(media_event(Modality::Photo, MediaType::Photo, ""))
            .await;

        let messages = h.repo.all_messages().await;
        assert_eq!(messages[0].text, SCREENSHOT_PLACEHOLDER);
        assert!(messages[0].has_image);
        let calls = h.ai.calls().await;
        assert_eq!(calls[0].image_mime.as_deref(), Some("image/jpeg"));
        assert_eq!(h.repo.count_activity(ActivityKind::ImageAnalyzed).await, 1);
    }
}
