//! Wiring & DI. Entry point: bootstrap adapters, inject into services, run UI.
//! No business logic here; login is delegated to AuthService.

use dotenv::dotenv;
use std::path::PathBuf;
use std::sync::Arc;
use tg_persona::adapters::ai::ProviderClient;
use tg_persona::adapters::ai::provider::PROVIDER_TIMEOUT;
use tg_persona::adapters::media::MediaLibrary;
use tg_persona::adapters::persistence::SqliteRepo;
use tg_persona::adapters::telegram::{
    GrammersAuthAdapter, GrammersMessenger, TelegramConnector, UpdateListener,
};
use tg_persona::adapters::ui::tui::TuiInputPort;
use tg_persona::adapters::voice::elevenlabs::ELEVENLABS_BASE_URL;
use tg_persona::adapters::voice::transcoder::TRANSCODE_TIMEOUT;
use tg_persona::adapters::voice::{ElevenLabsAdapter, OpusTranscoder};
use tg_persona::ports::{
    AiPort, AuthPort, InputPort, MediaPort, MessengerPort, SettingsPort, Store, UpdateSource,
    VoicePort,
};
use tg_persona::shared::config::AppConfig;
use tg_persona::usecases::{
    AuthService, BotRunner, MessageRouter, ResponseGenerator, RouterDeps, StyleLearner,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let env_loaded = dotenv();
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    match &env_loaded {
        Ok(path) => info!(path = %path.display(), "loaded .env"),
        Err(_) => info!(cwd = %cwd.display(), "no .env found (check CWD)"),
    }

    let cfg = AppConfig::load().unwrap_or_else(|e| {
        warn!(error = %e, "invalid configuration, using defaults");
        AppConfig::default()
    });

    let data_dir = cfg.data_dir_or_default();
    let media_dir = cfg.media_dir_or_default();
    let tmp_dir = data_dir.join("tmp");
    for dir in [&data_dir, &media_dir, &tmp_dir] {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| anyhow::anyhow!("create {}: {}", dir.display(), e))?;
    }
    info!(
        data_dir = %data_dir.display(),
        media_dir = %media_dir.display(),
        "directories ready"
    );

    // --- Store; runtime settings are seeded once and edited from the console afterwards ---
    let store: Arc<dyn Store> = Arc::new(
        SqliteRepo::connect(&data_dir)
            .await
            .map_err(|e| anyhow::anyhow!("SQLite connect failed: {}", e))?,
    );
    let defaults = cfg.default_runtime_settings();
    if store.load_settings().await?.is_none() {
        store.save_settings(&defaults).await?;
        info!("runtime settings seeded from configuration");
    }

    // --- AI provider ---
    let provider = ProviderClient::from_config(&cfg);
    let provider_name = provider.kind().name();
    tg_persona::adapters::ui::init_ui(provider_name);
    let ai: Arc<dyn AiPort> = Arc::new(provider);
    let generator = Arc::new(ResponseGenerator::new(ai));

    // --- Voice and media ---
    let voice: Arc<dyn VoicePort> = Arc::new(ElevenLabsAdapter::new(
        ELEVENLABS_BASE_URL.to_string(),
        cfg.elevenlabs_api_key.clone(),
        tmp_dir.clone(),
        OpusTranscoder::new(cfg.ffmpeg_path_or_default(), TRANSCODE_TIMEOUT),
        PROVIDER_TIMEOUT,
    ));
    if !voice.is_configured() {
        info!("ElevenLabs key not set; voice input is not transcribed and replies are text");
    }
    let media: Arc<dyn MediaPort> = Arc::new(MediaLibrary::new(&media_dir));

    // --- Telegram: one connector shared by login, messaging and updates ---
    let api_id = cfg.api_id().unwrap_or(0);
    let api_hash = cfg.api_hash().unwrap_or_default();
    let has_credentials = api_id != 0 && !api_hash.is_empty();
    if !has_credentials {
        warn!("TG_PERSONA_API_ID / TG_PERSONA_API_HASH not set; they will be asked at login");
    }
    let connector = TelegramConnector::new(api_id, api_hash, cfg.session_path_or_default());
    let auth_port: Arc<dyn AuthPort> = Arc::new(GrammersAuthAdapter::new(Arc::clone(&connector)));
    let messenger: Arc<dyn MessengerPort> =
        Arc::new(GrammersMessenger::new(Arc::clone(&connector)));
    let updates: Arc<dyn UpdateSource> = Arc::new(UpdateListener::new(Arc::clone(&connector)));

    // --- Services ---
    let auth_service = Arc::new(AuthService::new(
        auth_port,
        Arc::clone(&store),
        has_credentials,
    ));
    let router = Arc::new(MessageRouter::new(
        RouterDeps {
            store: Arc::clone(&store),
            messenger: Arc::clone(&messenger),
            voice,
            media,
            generator: Arc::clone(&generator),
        },
        defaults.clone(),
        tmp_dir,
        cfg.simulate_typing_or_default(),
    ));
    let runner = Arc::new(BotRunner::new(
        Arc::clone(&auth_service),
        Arc::clone(&store),
        Arc::clone(&messenger),
        updates,
        router,
        cfg.owner_id,
    ));
    let learner = Arc::new(StyleLearner::new(
        Arc::clone(&messenger),
        generator,
        Arc::clone(&store),
    ));

    let input_port: Arc<dyn InputPort> = Arc::new(TuiInputPort::new(
        auth_service,
        runner,
        learner,
        store,
        defaults,
        cfg.phone.clone(),
    ));

    // --- Run: login, then the console menu ---
    input_port
        .run_auth()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;
    input_port
        .run()
        .await
        .map_err(|e| anyhow::anyhow!("{}", e))?;

    connector.disconnect().await;
    Ok(())
}
