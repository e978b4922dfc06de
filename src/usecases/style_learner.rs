//! Learns the owner's writing style from existing private chats.
//!
//! A scan mines (user run, owner run) pairs, replaces the stored training set,
//! asks the provider for a style profile (with a statistical fallback) and
//! picks few-shot exemplars for the system prompt.

use crate::domain::{
    ActivityEntry, ActivityKind, ChatType, DomainError, FewShotExample, RemoteMessage,
    ScanReport, StyleProfile, TrainingPair,
};
use crate::ports::{ActivityLogPort, MessengerPort, Store, StylePort};
use crate::usecases::response_generator::ResponseGenerator;
use chrono::Utc;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{info, warn};

pub const DEFAULT_MAX_CHATS: usize = 50;
pub const DEFAULT_MESSAGES_PER_CHAT: usize = 100;
pub const FEW_SHOT_CAP: usize = 25;
pub const ANALYSIS_SAMPLE_CAP: usize = 60;
const SELECTION_SEED: u64 = 42;
const ANALYSIS_TEMPERATURE: f32 = 0.7;

const ANALYSIS_PROMPT: &str = "\
You are an expert in communication analysis. Analyze the communication style of a support \
operator based on their real replies to clients.

Create a DETAILED communication style profile. Include:

1. TONE: formal/informal/friendly/business-like, emotionality
2. GREETINGS: how they open a conversation, which forms they use
3. FAREWELLS: how they close a conversation
4. CHARACTERISTIC PHRASES: typical expressions, turns of phrase, filler words
5. EMOJI AND SYMBOLS: whether they use them, which ones, how often
6. RESPONSE LENGTH: short/medium/long, tendency to go into detail
7. RESPONSE STRUCTURE: whether they use lists, steps, paragraphs
8. REACTION TO PROBLEMS: how they react to complaints, errors, difficult questions
9. UNIQUE TRAITS: what sets this style apart from the usual
10. LANGUAGE: which language they use (Russian, English, mixed)

Write the answer as clear instructions for an AI that will IMITATE this style.
Do NOT write example dialogs, only style instructions.
Be brief and to the point, 500 words at most.";

const INFORMAL_WORDS: &[&str] = &["бро", "братан", "чел", "го", "норм", "кста", "братуха", "ахах"];
const FORMAL_PHRASES: &[&str] = &["уважаемый", "обращаем ваше внимание", "рады сообщить"];

/// Stored training state for display.
#[derive(Debug, Clone, Default)]
pub struct TrainingStatus {
    pub training_enabled: bool,
    pub total_pairs: u64,
    pub profile: Option<StyleProfile>,
}

impl TrainingStatus {
    pub fn has_training_data(&self) -> bool {
        self.total_pairs > 0
    }
}

pub struct StyleLearner {
    messenger: Arc<dyn MessengerPort>,
    generator: Arc<ResponseGenerator>,
    store: Arc<dyn Store>,
}

impl StyleLearner {
    pub fn new(
        messenger: Arc<dyn MessengerPort>,
        generator: Arc<ResponseGenerator>,
        store: Arc<dyn Store>,
    ) -> Self {
        Self {
            messenger,
            generator,
            store,
        }
    }

    async fn log(&self, kind: ActivityKind, details: String) {
        let entry = ActivityEntry::new(kind, None, None, details);
        if let Err(e) = self.store.log(&entry).await {
            warn!(error = %e, event = %kind, "failed to write activity");
        }
    }

    /// Scan up to `max_chats` private chats, `messages_per_chat` messages each.
    pub async fn scan(
        &self,
        max_chats: usize,
        messages_per_chat: usize,
    ) -> Result<ScanReport, DomainError> {
        let me = self.messenger.get_me().await?;
        self.log(
            ActivityKind::ScanStarted,
            format!("Scanning private dialogs (up to {} chats)", max_chats),
        )
        .await;

        let dialogs = self.messenger.get_dialogs(max_chats.saturating_mul(3)).await?;
        let mut report = ScanReport::default();
        let mut all_pairs = Vec::new();

        for chat in dialogs {
            if chat.kind != ChatType::Private || chat.is_bot {
                report.skipped_non_private += 1;
                continue;
            }
            if chat.id == me.id {
                continue;
            }
            if report.scanned_chats >= max_chats {
                break;
            }
            let messages = match self.messenger.get_messages(chat.id, messages_per_chat).await {
                Ok(messages) => messages,
                Err(e) => {
                    warn!(chat_id = chat.id, error = %e, "failed to scan chat");
                    continue;
                }
            };
            let username = chat.username.clone().unwrap_or_default();
            let (pairs, used) = extract_pairs(&messages, me.id, chat.id, &username);
            if pairs.is_empty() {
                continue;
            }
            report.scanned_chats += 1;
            report.total_messages += used;
            all_pairs.extend(pairs);
        }

        self.store.replace_training_pairs(&all_pairs).await?;

        let style_profile = self.build_profile(&all_pairs).await;
        let few_shot = select_few_shot(&all_pairs, FEW_SHOT_CAP);
        let training_enabled = self
            .store
            .load_style_profile()
            .await?
            .map(|p| p.training_enabled)
            .unwrap_or(true);
        self.store
            .save_style_profile(&StyleProfile {
                profile: style_profile.clone(),
                few_shot_examples: few_shot.clone(),
                total_examples: all_pairs.len(),
                scanned_chats: report.scanned_chats,
                training_enabled,
                scanned_at: Some(Utc::now()),
            })
            .await?;

        report.total_pairs = all_pairs.len();
        report.style_profile = style_profile;
        report.few_shot_count = few_shot.len();
        self.log(
            ActivityKind::ScanCompleted,
            format!(
                "Scanned {} private chats, {} message pairs, skipped {} non-private",
                report.scanned_chats, report.total_pairs, report.skipped_non_private
            ),
        )
        .await;
        info!(
            scanned_chats = report.scanned_chats,
            pairs = report.total_pairs,
            skipped = report.skipped_non_private,
            "scan complete"
        );
        Ok(report)
    }

    /// Provider-written profile, or the statistical one if the call fails.
    async fn build_profile(&self, pairs: &[TrainingPair]) -> String {
        if pairs.is_empty() {
            return String::new();
        }
        let sample = select_diverse(pairs, ANALYSIS_SAMPLE_CAP);
        let mut dialogs = String::new();
        for (i, pair) in sample.iter().enumerate() {
            dialogs.push_str(&format!(
                "--- Dialog {} ---\nClient: {}\nOperator: {}\n\n",
                i + 1,
                pair.user_message,
                pair.admin_response
            ));
        }
        let user_text = format!(
            "Here are {} real dialogs between the operator and clients:\n\n{}",
            sample.len(),
            dialogs
        );
        match self
            .generator
            .generate(&[], ANALYSIS_PROMPT, &user_text, ANALYSIS_TEMPERATURE)
            .await
        {
            Ok(profile) => {
                info!(chars = profile.chars().count(), "style analysis complete");
                profile
            }
            Err(e) => {
                warn!(error = %e, "style analysis failed, using basic profile");
                let responses: Vec<&str> =
                    pairs.iter().map(|p| p.admin_response.as_str()).collect();
                basic_profile(&responses)
            }
        }
    }

    /// Flip whether the learned style is used in prompts. Returns the new value.
    pub async fn toggle_training(&self) -> Result<bool, DomainError> {
        let mut profile = self.store.load_style_profile().await?.unwrap_or_default();
        profile.training_enabled = !profile.training_enabled;
        self.store.save_style_profile(&profile).await?;
        let state = if profile.training_enabled { "on" } else { "off" };
        self.log(ActivityKind::TrainingToggled, format!("Training: {}", state))
            .await;
        Ok(profile.training_enabled)
    }

    pub async fn reset_training(&self) -> Result<(), DomainError> {
        self.store.clear_training().await?;
        self.log(ActivityKind::TrainingReset, "Training data cleared".to_string())
            .await;
        Ok(())
    }

    pub async fn training_status(&self) -> Result<TrainingStatus, DomainError> {
        let profile = self.store.load_style_profile().await?;
        Ok(TrainingStatus {
            training_enabled: profile.as_ref().map(|p| p.training_enabled).unwrap_or(true),
            total_pairs: self.store.count_training_pairs().await?,
            profile,
        })
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

/// Segment a chronological chat into (user run, owner run) pairs.
///
/// Only plain text messages count. Returns the pairs and how many messages they use.
pub fn extract_pairs(
    messages: &[RemoteMessage],
    owner_id: i64,
    chat_id: i64,
    username: &str,
) -> (Vec<TrainingPair>, usize) {
    let texts: Vec<(bool, &str)> = messages
        .iter()
        .filter(|m| m.media.is_none() && !m.text.trim().is_empty())
        .map(|m| (m.outgoing || m.from_user_id == Some(owner_id), m.text.as_str()))
        .collect();

    let mut pairs = Vec::new();
    let mut used = 0;
    let mut i = 0;
    while i < texts.len() {
        if texts[i].0 {
            i += 1;
            continue;
        }
        let mut j = i;
        let mut user_run = Vec::new();
        while j < texts.len() && !texts[j].0 {
            user_run.push(texts[j].1);
            j += 1;
        }
        let mut owner_run = Vec::new();
        while j < texts.len() && texts[j].0 {
            owner_run.push(texts[j].1);
            j += 1;
        }
        if !owner_run.is_empty() {
            used += user_run.len() + owner_run.len();
            pairs.push(TrainingPair {
                user_message: user_run.join("\n"),
                admin_response: owner_run.join("\n"),
                chat_id,
                username: username.to_string(),
            });
        }
        i = j;
    }
    (pairs, used)
}

/// Concise exemplars for the prompt. Deterministic for a given input.
pub fn select_few_shot(pairs: &[TrainingPair], cap: usize) -> Vec<FewShotExample> {
    let mut good: Vec<&TrainingPair> = pairs
        .iter()
        .filter(|p| {
            let admin = char_len(&p.admin_response);
            let user = char_len(&p.user_message);
            admin > 20 && admin < 600 && user > 5 && user < 300
        })
        .collect();
    if good.is_empty() {
        good = pairs
            .iter()
            .filter(|p| char_len(&p.admin_response) > 10)
            .collect();
    }

    let mut seen = HashSet::new();
    let mut unique: Vec<&TrainingPair> = good
        .into_iter()
        .filter(|p| {
            let start: String = p.admin_response.chars().take(40).collect();
            seen.insert(start.to_lowercase().trim().to_string())
        })
        .collect();
    unique.sort_by_key(|p| char_len(&p.admin_response));
    let step = (unique.len() / cap.max(1)).max(1);
    let selected: Vec<&TrainingPair> = unique.into_iter().step_by(step).take(cap).collect();

    selected
        .into_iter()
        .map(|p| FewShotExample {
            user: p.user_message.clone(),
            admin: p.admin_response.clone(),
        })
        .collect()
}

/// Representative sample for style analysis, spread across response lengths.
pub fn select_diverse(pairs: &[TrainingPair], cap: usize) -> Vec<&TrainingPair> {
    let mut good: Vec<&TrainingPair> = pairs
        .iter()
        .filter(|p| {
            let admin = char_len(&p.admin_response);
            admin > 5 && admin < 1500 && char_len(&p.user_message) > 2
        })
        .collect();
    if good.is_empty() {
        good = pairs.iter().collect();
    }
    if good.len() <= cap {
        return good;
    }

    let mut order: Vec<usize> = (0..good.len()).collect();
    order.sort_by_key(|&i| char_len(&good[i].admin_response));
    let step = (order.len() / cap).max(1);
    let picked: Vec<usize> = order.into_iter().step_by(step).take(cap).collect();

    let mut selected: Vec<&TrainingPair> = picked.iter().map(|&i| good[i]).collect();
    if selected.len() < cap {
        let taken: HashSet<usize> = picked.into_iter().collect();
        let mut remaining: Vec<&TrainingPair> = (0..good.len())
            .filter(|i| !taken.contains(i))
            .map(|i| good[i])
            .collect();
        remaining.shuffle(&mut StdRng::seed_from_u64(SELECTION_SEED));
        let missing = cap - selected.len();
        selected.extend(remaining.into_iter().take(missing));
    }
    selected
}

/// Statistical profile used when the provider is unavailable.
pub fn basic_profile(responses: &[&str]) -> String {
    if responses.is_empty() {
        return String::new();
    }
    let avg_len = responses.iter().map(|r| char_len(r)).sum::<usize>() / responses.len();
    let head = &responses[..responses.len().min(50)];
    let joined = head.join(" ").to_lowercase();
    let informal = INFORMAL_WORDS.iter().any(|w| joined.contains(w));
    let formal = FORMAL_PHRASES.iter().any(|w| joined.contains(w));
    let emoji = head.iter().any(|r| r.chars().any(|c| c as u32 > 0x1F600));

    let mut parts = vec![format!("Average response length: ~{} characters.", avg_len)];
    parts.push(
        if informal {
            "Style: informal, friendly, slang is fine."
        } else if formal {
            "Style: formal, polite, business-like."
        } else {
            "Style: neutral, friendly."
        }
        .to_string(),
    );
    parts.push(
        if emoji {
            "Emoji are fine."
        } else {
            "No emoji."
        }
        .to_string(),
    );
    let mut profile = parts.join(" ");

    let examples: Vec<&&str> = responses
        .iter()
        .filter(|r| {
            let len = char_len(r);
            len > 20 && len < 500
        })
        .take(15)
        .collect();
    if !examples.is_empty() {
        profile.push_str("\n\nREAL OPERATOR REPLIES (imitate this style):\n");
        for (i, ex) in examples.iter().enumerate() {
            profile.push_str(&format!("{}. \"{}\"\n", i + 1, ex));
        }
    }
    profile
}
