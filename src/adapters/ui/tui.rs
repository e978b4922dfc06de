//! Implements InputPort. Inquire-based operator console.
//!
//! Login prompts, then a menu to run the auto-responder, learn the owner's
//! style and adjust runtime settings.

use crate::adapters::ui::progress;
use crate::domain::{AuthStatus, DomainError, RuntimeSettings, validate_silence_minutes};
use crate::ports::{ActivityLogPort, InputPort, SettingsPort, StatsPort, Store};
use crate::usecases::style_learner::{DEFAULT_MAX_CHATS, DEFAULT_MESSAGES_PER_CHAT};
use crate::usecases::{AuthService, BotRunner, StyleLearner};
use async_trait::async_trait;
use inquire::error::InquireError;
use inquire::ui::{Color, RenderConfig, StyleSheet, Styled};
use inquire::{Confirm, CustomType, Password, PasswordDisplayMode, Select, Text};
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

const RECENT_ACTIVITY: usize = 10;

const PROMPT_CANCELLED: &str = "prompt cancelled";

/// Prompt colors for every inquire prompt in the process.
pub fn apply_theme() {
    let accent = Color::rgb(0x22, 0x9e, 0xd9);
    let config = RenderConfig::default()
        .with_prompt_prefix(Styled::new("›").with_fg(accent))
        .with_highlighted_option_prefix(Styled::new("➤").with_fg(accent))
        .with_selected_option(Some(StyleSheet::new().with_fg(accent)))
        .with_answer(StyleSheet::new().with_fg(Color::rgb(0x7c, 0xf5, 0xc4)));
    inquire::set_global_render_config(config);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MenuItem {
    Start,
    Scan,
    ToggleTraining,
    ResetTraining,
    ToggleAutoReply,
    SilenceDuration,
    Status,
    Exit,
}

impl MenuItem {
    const ALL: [MenuItem; 8] = [
        MenuItem::Start,
        MenuItem::Scan,
        MenuItem::ToggleTraining,
        MenuItem::ResetTraining,
        MenuItem::ToggleAutoReply,
        MenuItem::SilenceDuration,
        MenuItem::Status,
        MenuItem::Exit,
    ];
}

impl fmt::Display for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MenuItem::Start => "Start auto-responder",
            MenuItem::Scan => "Scan dialogs and learn style",
            MenuItem::ToggleTraining => "Toggle learned style",
            MenuItem::ResetTraining => "Reset training data",
            MenuItem::ToggleAutoReply => "Toggle auto-reply",
            MenuItem::SilenceDuration => "Set silence duration",
            MenuItem::Status => "Status",
            MenuItem::Exit => "Exit",
        };
        f.write_str(label)
    }
}

fn prompt_error(e: InquireError) -> DomainError {
    if is_cancel(&e) {
        DomainError::Auth(PROMPT_CANCELLED.into())
    } else {
        DomainError::Auth(e.to_string())
    }
}

fn is_cancel(e: &InquireError) -> bool {
    matches!(
        e,
        InquireError::OperationCanceled | InquireError::OperationInterrupted
    )
}

fn on_off(value: bool) -> &'static str {
    if value { "on" } else { "off" }
}

/// TUI adapter. Inquire prompts.
pub struct TuiInputPort {
    auth: Arc<AuthService>,
    runner: Arc<BotRunner>,
    learner: Arc<StyleLearner>,
    store: Arc<dyn Store>,
    defaults: RuntimeSettings,
    default_phone: Option<String>,
}

impl TuiInputPort {
    pub fn new(
        auth: Arc<AuthService>,
        runner: Arc<BotRunner>,
        learner: Arc<StyleLearner>,
        store: Arc<dyn Store>,
        defaults: RuntimeSettings,
        default_phone: Option<String>,
    ) -> Self {
        Self {
            auth,
            runner,
            learner,
            store,
            defaults,
            default_phone,
        }
    }

    async fn settings(&self) -> Result<RuntimeSettings, DomainError> {
        Ok(self
            .store
            .load_settings()
            .await?
            .unwrap_or_else(|| self.defaults.clone()))
    }

    fn ask_phone(&self) -> Result<String, DomainError> {
        let mut prompt =
            Text::new("Phone number:").with_help_message("International format, e.g. +15551234567");
        if let Some(phone) = self.default_phone.as_deref() {
            prompt = prompt.with_default(phone);
        }
        prompt.prompt().map_err(prompt_error)
    }

    async fn ask_credentials(&self) -> Result<(), DomainError> {
        println!("App credentials are missing. Get them at https://my.telegram.org");
        let api_id = CustomType::<i32>::new("API id:")
            .with_error_message("Enter a number")
            .prompt()
            .map_err(prompt_error)?;
        let api_hash = Text::new("API hash:").prompt().map_err(prompt_error)?;
        self.auth.reset_credentials(api_id, api_hash.trim()).await
    }

    /// One phone → code → password round. `Ok(true)` when authorized.
    async fn login_round(&self) -> Result<bool, DomainError> {
        let phone = self.ask_phone()?;
        match self.auth.send_code(phone.trim()).await? {
            AuthStatus::CodeSent => {}
            AuthStatus::MissingCredentials => {
                self.ask_credentials().await?;
                return Ok(false);
            }
            other => {
                warn!(?other, "unexpected status after requesting a code");
                return Ok(false);
            }
        }

        let code = Text::new("Login code:")
            .with_help_message("Sent to your Telegram app")
            .prompt()
            .map_err(prompt_error)?;
        match self.auth.verify_code(Some(phone.trim()), &code).await? {
            AuthStatus::Authorized { user } => {
                println!("Signed in as {}", user);
                Ok(true)
            }
            AuthStatus::TwoFactorRequired { hint } => self.ask_password(hint).await,
            AuthStatus::CodeHashMissing => {
                println!("The login code expired, requesting a new one.");
                Ok(false)
            }
            other => {
                warn!(?other, "unexpected status after sign in");
                Ok(false)
            }
        }
    }

    async fn ask_password(&self, hint: Option<String>) -> Result<bool, DomainError> {
        let help = hint
            .map(|h| format!("Hint: {}", h))
            .unwrap_or_else(|| "Two-step verification is on".to_string());
        let password = Password::new("Cloud password:")
            .with_display_mode(PasswordDisplayMode::Masked)
            .without_confirmation()
            .with_help_message(&help)
            .prompt()
            .map_err(prompt_error)?;
        match self.auth.verify_2fa(&password).await? {
            AuthStatus::Authorized { user } => {
                println!("Signed in as {}", user);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn run_bot(&self) -> Result<(), DomainError> {
        self.runner.start().await?;
        println!("Auto-responder is running. Press Ctrl-C to stop.");
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "failed to wait for Ctrl-C");
        }
        self.runner.stop().await?;
        println!("Auto-responder stopped.");
        Ok(())
    }

    async fn scan(&self) -> Result<(), DomainError> {
        let max_chats = CustomType::<usize>::new("Chats to scan:")
            .with_default(DEFAULT_MAX_CHATS)
            .prompt()
            .map_err(prompt_error)?;
        let per_chat = CustomType::<usize>::new("Messages per chat:")
            .with_default(DEFAULT_MESSAGES_PER_CHAT)
            .prompt()
            .map_err(prompt_error)?;

        let bar = progress::spinner("Scanning private dialogs...");
        let result = self.learner.scan(max_chats, per_chat).await;
        match result {
            Ok(report) => {
                bar.finish_with_message(format!(
                    "Scanned {} chats: {} pairs from {} messages ({} non-private skipped)",
                    report.scanned_chats,
                    report.total_pairs,
                    report.total_messages,
                    report.skipped_non_private
                ));
                if !report.style_profile.is_empty() {
                    println!("\nStyle profile:\n{}\n", report.style_profile);
                }
                println!("Few-shot examples kept: {}", report.few_shot_count);
                Ok(())
            }
            Err(e) => {
                bar.abandon_with_message("Scan failed");
                Err(e)
            }
        }
    }

    async fn toggle_training(&self) -> Result<(), DomainError> {
        let enabled = self.learner.toggle_training().await?;
        println!("Learned style is now {}", on_off(enabled));
        Ok(())
    }

    async fn reset_training(&self) -> Result<(), DomainError> {
        let confirmed = Confirm::new("Delete all training pairs and the style profile?")
            .with_default(false)
            .prompt()
            .map_err(prompt_error)?;
        if confirmed {
            self.learner.reset_training().await?;
            println!("Training data cleared.");
        }
        Ok(())
    }

    async fn toggle_auto_reply(&self) -> Result<(), DomainError> {
        let mut settings = self.settings().await?;
        settings.auto_reply = !settings.auto_reply;
        self.store.save_settings(&settings).await?;
        info!(auto_reply = settings.auto_reply, "auto-reply toggled");
        println!("Auto-reply is now {}", on_off(settings.auto_reply));
        Ok(())
    }

    async fn set_silence_duration(&self) -> Result<(), DomainError> {
        let mut settings = self.settings().await?;
        let minutes = CustomType::<i64>::new("Silence after owner message (minutes):")
            .with_default(settings.silence_duration_min)
            .with_validator(|m: &i64| {
                Ok(match validate_silence_minutes(*m) {
                    Ok(()) => inquire::validator::Validation::Valid,
                    Err(msg) => inquire::validator::Validation::Invalid(msg.into()),
                })
            })
            .prompt()
            .map_err(prompt_error)?;
        settings.silence_duration_min = minutes;
        self.store.save_settings(&settings).await?;
        println!("Silence duration set to {} min", minutes);
        Ok(())
    }

    async fn show_status(&self) -> Result<(), DomainError> {
        let session = self.auth.auth_session().await?;
        let settings = self.settings().await?;
        let training = self.learner.training_status().await?;
        let stats = self.store.stats().await?;

        println!();
        println!("Auth state:      {}", session.auth_state.as_str());
        println!("Bot running:     {}", self.runner.is_running().await);
        if let Some(started) = session.started_at {
            println!("Started at:      {}", started.format("%Y-%m-%d %H:%M:%S UTC"));
        }
        println!("Auto-reply:      {}", on_off(settings.auto_reply));
        println!("Silence:         {} min", settings.silence_duration_min);
        println!(
            "Voice replies:   {} ({:?})",
            on_off(settings.voice.enabled),
            settings.voice.mode
        );
        println!("Learned style:   {}", on_off(training.training_enabled));
        println!("Training pairs:  {}", training.total_pairs);
        if let Some(profile) = training.profile.as_ref().filter(|_| training.has_training_data()) {
            println!(
                "Style profile:   {} examples from {} chats",
                profile.total_examples, profile.scanned_chats
            );
        }
        println!(
            "Messages: {}  Chats: {}  Images: {}  Media sent: {}  Silenced now: {}",
            stats.total_messages,
            stats.total_chats,
            stats.total_images_analyzed,
            stats.total_media_sent,
            stats.silenced_chats
        );

        let recent = self.store.recent_activity(RECENT_ACTIVITY).await?;
        if !recent.is_empty() {
            println!("\nRecent activity:");
            for entry in recent {
                let chat = entry.chat_id.map(|c| format!(" [{}]", c)).unwrap_or_default();
                println!(
                    "  {} {}{} {}",
                    entry.timestamp.format("%m-%d %H:%M:%S"),
                    entry.event_type,
                    chat,
                    entry.details
                );
            }
        }
        println!();
        Ok(())
    }

    async fn dispatch(&self, item: MenuItem) -> Result<(), DomainError> {
        match item {
            MenuItem::Start => self.run_bot().await,
            MenuItem::Scan => self.scan().await,
            MenuItem::ToggleTraining => self.toggle_training().await,
            MenuItem::ResetTraining => self.reset_training().await,
            MenuItem::ToggleAutoReply => self.toggle_auto_reply().await,
            MenuItem::SilenceDuration => self.set_silence_duration().await,
            MenuItem::Status => self.show_status().await,
            MenuItem::Exit => Ok(()),
        }
    }
}

#[async_trait]
impl InputPort for TuiInputPort {
    async fn run_auth(&self) -> Result<(), DomainError> {
        if self.auth.restore().await? {
            return Ok(());
        }
        println!("Log in to your Telegram account.");
        loop {
            match self.login_round().await {
                Ok(true) => return Ok(()),
                Ok(false) => continue,
                Err(DomainError::Auth(msg)) if msg == PROMPT_CANCELLED => {
                    return Err(DomainError::Auth("login cancelled".into()));
                }
                Err(e) => {
                    println!("Login failed: {}", e);
                    let retry = Confirm::new("Try again?")
                        .with_default(true)
                        .prompt()
                        .map_err(prompt_error)?;
                    if !retry {
                        return Err(e);
                    }
                }
            }
        }
    }

    async fn run(&self) -> Result<(), DomainError> {
        loop {
            let choice = Select::new("What next?", MenuItem::ALL.to_vec())
                .with_page_size(MenuItem::ALL.len())
                .prompt();
            let item = match choice {
                Ok(item) => item,
                Err(e) if is_cancel(&e) => MenuItem::Exit,
                Err(e) => return Err(prompt_error(e)),
            };
            if item == MenuItem::Exit {
                if self.runner.is_running().await {
                    self.runner.stop().await?;
                }
                return Ok(());
            }
            if let Err(e) = self.dispatch(item).await {
                warn!(action = %item, error = %e, "menu action failed");
                println!("Error: {}", e);
            }
        }
    }
}
