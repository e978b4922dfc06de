//! Auto-responder lifecycle: start listening for updates, stop on request.

use crate::domain::{ActivityEntry, ActivityKind, DomainError};
use crate::ports::{ActivityLogPort, MessengerPort, Store, UpdateSource};
use crate::usecases::auth_service::AuthService;
use crate::usecases::message_router::MessageRouter;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

struct Running {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

pub struct BotRunner {
    auth: Arc<AuthService>,
    store: Arc<dyn Store>,
    messenger: Arc<dyn MessengerPort>,
    source: Arc<dyn UpdateSource>,
    router: Arc<MessageRouter>,
    /// Configured owner id. The logged-in account is used when unset.
    owner_id: Option<i64>,
    running: Mutex<Option<Running>>,
}

impl BotRunner {
    pub fn new(
        auth: Arc<AuthService>,
        store: Arc<dyn Store>,
        messenger: Arc<dyn MessengerPort>,
        source: Arc<dyn UpdateSource>,
        router: Arc<MessageRouter>,
        owner_id: Option<i64>,
    ) -> Self {
        Self {
            auth,
            store,
            messenger,
            source,
            router,
            owner_id,
            running: Mutex::new(None),
        }
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    /// Start listening. A second start while running is a no-op.
    pub async fn start(&self) -> Result<(), DomainError> {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            info!("bot already running");
            return Ok(());
        }

        let owner_id = match self.owner_id {
            Some(id) => id,
            None => self.messenger.get_me().await?.id,
        };
        self.router.set_owner(owner_id);

        let cancel = CancellationToken::new();
        let source = self.source.clone();
        let handler = self.router.clone();
        let token = cancel.clone();
        let task = tokio::spawn(async move {
            if let Err(e) = source.listen(handler, token).await {
                error!(error = %e, "update listener stopped");
            }
        });
        *running = Some(Running { cancel, task });

        self.auth.mark_running(true).await?;
        self.log(ActivityKind::BotStarted, "Bot started").await;
        info!(owner_id, "auto-responder started");
        Ok(())
    }

    /// Stop listening. In-flight message handlers finish on their own.
    pub async fn stop(&self) -> Result<(), DomainError> {
        let Some(running) = self.running.lock().await.take() else {
            return Ok(());
        };
        running.cancel.cancel();
        if let Err(e) = running.task.await {
            warn!(error = %e, "listener task ended abnormally");
        }
        self.auth.mark_running(false).await?;
        self.log(ActivityKind::BotStopped, "Bot stopped").await;
        info!("auto-responder stopped");
        Ok(())
    }

    async fn log(&self, kind: ActivityKind, details: &str) {
        if let Err(e) = self
            .store
            .log(&ActivityEntry::new(kind, None, None, details))
            .await
        {
            warn!(event = %kind, error = %e, "failed to write activity");
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
        Account, Chat, ChatAction, InboundEvent, MediaReference, Modality, OutgoingFile,
        RemoteMessage, RuntimeSettings, SignInResult, SynthesizedAudio, VoiceSettings,
    };
    use crate::ports::{AuthPort, AuthStatePort, EventHandler, VoicePort};
    use crate::usecases::message_router::RouterDeps;
    use crate::usecases::response_generator::ResponseGenerator;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct NoAuth;

    #[async_trait::async_trait]
    impl AuthPort for NoAuth {
        async fn connect_fresh(&self) -> Result<(), DomainError> {
            Ok(())
        }
        async fn ensure_connected(&self) -> Result<(), DomainError> {
            Ok(())
        }
        async fn disconnect(&self) {}
        fn has_session_file(&self) -> bool {
            true
        }
        async fn set_credentials(&self, _: i32, _: &str) {}
        async fn is_authorized(&self) -> Result<bool, DomainError> {
            Ok(true)
        }
        async fn send_code(&self, _: &str) -> Result<String, DomainError> {
            Ok("hash".into())
        }
        async fn sign_in(&self, _: &str, _: &str, _: &str) -> Result<SignInResult, DomainError> {
            Ok(SignInResult::Success { user: "me".into() })
        }
        async fn check_password(&self, _: &str) -> Result<String, DomainError> {
            Ok("me".into())
        }
    }

    /// Counts sent texts and reports a fixed account.
    #[derive(Default)]
    struct CountingMessenger {
        texts: AtomicUsize,
        get_me_calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl MessengerPort for CountingMessenger {
        async fn get_me(&self) -> Result<Account, DomainError> {
            self.get_me_calls.fetch_add(1, Ordering::SeqCst);
            Ok(Account {
                id: 42,
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
        async fn send_chat_action(&self, _: i64, _: ChatAction) -> Result<(), DomainError> {
            Ok(())
        }
        async fn send_text(&self, _: i64, _: &str, _: Option<i32>) -> Result<(), DomainError> {
            self.texts.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        async fn send_file(&self, _: i64, _: &Path, _: OutgoingFile) -> Result<(), DomainError> {
            Ok(())
        }
        async fn download_media(&self, _: &MediaReference, _: &Path) -> Result<(), DomainError> {
            Ok(())
        }
    }

    struct NoVoice;

    #[async_trait::async_trait]
    impl VoicePort for NoVoice {
        fn is_configured(&self) -> bool {
            false
        }
        async fn transcribe(&self, _: &Path, _: &str) -> Result<String, DomainError> {
            Err(DomainError::Voice("not configured".into()))
        }
        async fn synthesize(
            &self,
            _: &str,
            _: &VoiceSettings,
        ) -> Result<SynthesizedAudio, DomainError> {
            Err(DomainError::Voice("not configured".into()))
        }
    }

    /// Delivers one scripted event, then waits for cancellation.
    struct OneShotSource {
        event: InboundEvent,
    }

    #[async_trait::async_trait]
    impl UpdateSource for OneShotSource {
        async fn listen(
            &self,
            handler: Arc<dyn EventHandler>,
            cancel: CancellationToken,
        ) -> Result<(), DomainError> {
            handler.handle(self.event.clone()).await;
            cancel.cancelled().await;
            Ok(())
        }
    }

    struct Fixture {
        runner: BotRunner,
        repo: Arc<MemoryRepo>,
        messenger: Arc<CountingMessenger>,
        _media: tempfile::TempDir,
    }

    fn fixture(owner_id: Option<i64>) -> Fixture {
        let repo = Arc::new(MemoryRepo::new());
        let messenger = Arc::new(CountingMessenger::default());
        let media = tempfile::tempdir().unwrap();
        let router = Arc::new(MessageRouter::new(
            RouterDeps {
                store: repo.clone(),
                messenger: messenger.clone(),
                voice: Arc::new(NoVoice),
                media: Arc::new(MediaLibrary::new(media.path())),
                generator: Arc::new(ResponseGenerator::new(Arc::new(MockAiAdapter::new()))),
            },
            RuntimeSettings::default(),
            media.path().to_path_buf(),
            false,
        ));
        let source = Arc::new(OneShotSource {
            event: InboundEvent {
                chat_id: 500,
                message_id: 1,
                sender_id: Some(500),
                username: None,
                outgoing: false,
                modality: Modality::Text,
                text: "hello".into(),
                media: None,
            },
        });
        let auth = Arc::new(AuthService::new(Arc::new(NoAuth), repo.clone(), true));
        let runner = BotRunner::new(
            auth,
            repo.clone(),
            messenger.clone(),
            source,
            router,
            owner_id,
        );
        Fixture {
            runner,
            repo,
            messenger,
            _media: media,
        }
    }

    #[tokio::test]
    async fn test_start_and_stop_record_state() {
        let f = fixture(None);
        f.runner.start().await.unwrap();
        assert!(f.runner.is_running().await);
        let session = f.repo.load_auth_session().await.unwrap();
        assert!(session.is_running);
        assert!(session.started_at.is_some());
        assert_eq!(f.messenger.get_me_calls.load(Ordering::SeqCst), 1);

        f.runner.stop().await.unwrap();
        assert!(!f.runner.is_running().await);
        let session = f.repo.load_auth_session().await.unwrap();
        assert!(!session.is_running);
        assert_eq!(f.repo.count_activity(ActivityKind::BotStarted).await, 1);
        assert_eq!(f.repo.count_activity(ActivityKind::BotStopped).await, 1);
    }

    #[tokio::test]
    async fn test_listener_events_reach_router() {
        let f = fixture(Some(7));
        f.runner.start().await.unwrap();
        for _ in 0..50 {
            if f.messenger.texts.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        f.runner.stop().await.unwrap();
        assert_eq!(f.messenger.texts.load(Ordering::SeqCst), 1);
        assert_eq!(f.messenger.get_me_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_double_start_and_idle_stop() {
        let f = fixture(Some(7));
        f.runner.stop().await.unwrap();
        assert_eq!(f.repo.count_activity(ActivityKind::BotStopped).await, 0);

        f.runner.start().await.unwrap();
        f.runner.start().await.unwrap();
        assert_eq!(f.repo.count_activity(ActivityKind::BotStarted).await, 1);
        f.runner.stop().await.unwrap();
    }
}
