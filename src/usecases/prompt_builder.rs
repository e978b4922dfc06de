//! System prompt assembly: persona template, media templates and learned style.

use crate::domain::{DomainError, MediaTemplate, StyleProfile};
use crate::ports::{MediaPort, SettingsPort, Store, StylePort};
use std::collections::HashMap;
use std::sync::Arc;

/// Few-shot exemplars rendered into the prompt.
pub const PROMPT_FEW_SHOT_LIMIT: usize = 15;

const NO_MEDIA_TEMPLATES: &str = "No media templates available.";

const DEFAULT_PROMPT: &str = "\
You are the owner of this Telegram account, replying to private messages yourself. \
Never reveal that you are an AI, a bot or an assistant. Write the way a person writes \
in a messenger: short, natural, no lists or headings unless the other side asks for details. \
Answer in the language the other person uses.

If the person sends a screenshot, look at it carefully and help with what it shows. \
If you do not know something, say you will check and get back later.

You can attach a prepared file to your reply by writing its tag on a separate line, \
for example [VIDEO:demo] or [IMAGE:price]. Only use tags from the list below and only \
when the file really helps.

AVAILABLE MEDIA TEMPLATES:
{media_templates}";

pub struct PromptBuilder {
    store: Arc<dyn Store>,
    media: Arc<dyn MediaPort>,
}

impl PromptBuilder {
    pub fn new(store: Arc<dyn Store>, media: Arc<dyn MediaPort>) -> Self {
        Self { store, media }
    }

    /// Build the system prompt from current settings, media and style profile.
    pub async fn build(&self, custom_prompt: Option<&str>) -> Result<String, DomainError> {
        let templates = self.media.list().await?;
        let rules = self.store.media_rules().await?;
        let profile = self.store.load_style_profile().await?;
        Ok(compose(
            custom_prompt,
            &render_templates(&templates, &rules),
            &render_style(profile.as_ref()),
        ))
    }
}

pub fn compose(custom_prompt: Option<&str>, templates: &str, style: &str) -> String {
    match custom_prompt.map(str::trim).filter(|p| !p.is_empty()) {
        Some(custom) => format!(
            "{}{}\n\nAVAILABLE MEDIA TEMPLATES:\n{}",
            custom, style, templates
        ),
        None => DEFAULT_PROMPT.replace("{media_templates}", templates) + style,
    }
}

/// One line per template, with its "when to send" rule when one is set.
pub fn render_templates(templates: &[MediaTemplate], rules: &HashMap<String, String>) -> String {
    let lines: Vec<String> = templates
        .iter()
        .filter_map(|t| {
            let kind = t.media_kind?;
            let mut line = format!("- [{}:{}] - {}", kind, t.tag, t.filename);
            if let Some(rule) = rules.get(&t.tag) {
                line.push_str(&format!(" - When to send: {}", rule));
            }
            Some(line)
        })
        .collect();
    if lines.is_empty() {
        NO_MEDIA_TEMPLATES.to_string()
    } else {
        lines.join("\n")
    }
}

/// Style section, or empty when training is off or no profile was learned.
pub fn render_style(profile: Option<&StyleProfile>) -> String {
    let Some(p) = profile.filter(|p| p.training_enabled && !p.profile.trim().is_empty()) else {
        return String::new();
    };
    let mut out = format!(
        "\n\nCOMMUNICATION STYLE (learned from {} examples across {} private chats):\n{}",
        p.total_examples, p.scanned_chats, p.profile
    );
    if !p.few_shot_examples.is_empty() {
        out.push_str("\n\nREAL DIALOG EXAMPLES (imitate this style):\n");
        for (i, ex) in p.few_shot_examples.iter().take(PROMPT_FEW_SHOT_LIMIT).enumerate() {
            out.push_str(&format!(
                "\nExample {}:\n  Client: {}\n  Operator: {}\n",
                i + 1,
                ex.user,
                ex.admin
            ));
        }
    }
    out
}
