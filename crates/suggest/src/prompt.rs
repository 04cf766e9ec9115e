//! Prompt construction for suggestion and sentence queries.

use std::collections::BTreeSet;

use milim_config::AppConfig;
use milim_core::{ConversationEntry, Message, Origin, ProviderRequest, ResponseFormat};

/// Built-in instruction for word suggestions.
pub const DEFAULT_SUGGESTION_PROMPT: &str = "\
אתם עוזרים למשתמש בתקשורת תומכת וחליפית (תת\"ח) לבנות משפטים בעברית.
על סמך השיחה, הציעו קטגוריות של מילים שהמשתמש עשוי לרצות לומר בהמשך.
כל קטגוריה מכילה שם קצר ורשימה של 4 עד 8 מילים או צירופים קצרים.
החזירו אך ורק אובייקט JSON במבנה הבא, ללא טקסט נוסף:
{\"categories\": [{\"category\": \"שם הקטגוריה\", \"words\": [\"מילה\", \"מילה\"]}]}";

/// Built-in instruction for composing a sentence from selected words.
pub const DEFAULT_SENTENCE_PROMPT: &str = "\
אתם עוזרים למשתמש בתקשורת תומכת וחליפית (תת\"ח).
המשתמש בחר מילים בודדות. חברו מהן משפט אחד תקין, טבעי וקצר בעברית,
בגוף ראשון, שמבטא את כוונת המשתמש. החזירו את המשפט בלבד.";

/// Everything needed to turn a conversation into a model request.
#[derive(Debug, Clone)]
pub struct PromptSettings {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: Option<u32>,
    pub system_prompt: String,
    pub sentence_prompt: String,
}

impl PromptSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: Some(config.max_tokens),
            system_prompt: config
                .suggestions
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SUGGESTION_PROMPT.to_string()),
            sentence_prompt: config
                .suggestions
                .sentence_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SENTENCE_PROMPT.to_string()),
        }
    }

    /// Replace the suggestion instruction (e.g. from user preferences).
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }
}

impl Default for PromptSettings {
    fn default() -> Self {
        Self::from_config(&AppConfig::default())
    }
}

/// One line per entry, in order, labelled by origin.
pub fn render_transcript(entries: &[ConversationEntry]) -> String {
    entries
        .iter()
        .map(|e| {
            let label = match e.origin {
                Origin::User => "משתמש",
                Origin::System => "מערכת",
            };
            format!("{label}: {}", e.text)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// The explicit "do not suggest these" instruction, if any words are used.
pub fn exclusion_instruction(used_words: &BTreeSet<String>) -> Option<String> {
    if used_words.is_empty() {
        return None;
    }
    let list = used_words.iter().map(String::as_str).collect::<Vec<_>>().join(", ");
    Some(format!("אל תציעו את המילים שכבר נבחרו: {list}"))
}

/// Streamed JSON-object request for suggestions.
pub fn suggestion_request(
    settings: &PromptSettings,
    transcript: &[ConversationEntry],
    used_words: &BTreeSet<String>,
) -> ProviderRequest {
    let mut user_turn = render_transcript(transcript);
    if let Some(exclusion) = exclusion_instruction(used_words) {
        if !user_turn.is_empty() {
            user_turn.push_str("\n\n");
        }
        user_turn.push_str(&exclusion);
    }

    ProviderRequest {
        model: settings.model.clone(),
        messages: vec![
            Message::system(settings.system_prompt.clone()),
            Message::user(user_turn),
        ],
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
        stream: true,
        response_format: ResponseFormat::JsonObject,
    }
}

/// Plain-text request turning selected words into one sentence.
pub fn sentence_request(
    settings: &PromptSettings,
    words: &[String],
    transcript: &[ConversationEntry],
) -> ProviderRequest {
    let mut user_turn = String::new();
    if !transcript.is_empty() {
        user_turn.push_str("השיחה עד כה:\n");
        user_turn.push_str(&render_transcript(transcript));
        user_turn.push_str("\n\n");
    }
    user_turn.push_str("המילים שנבחרו: ");
    user_turn.push_str(&words.join(" "));

    ProviderRequest {
        model: settings.model.clone(),
        messages: vec![
            Message::system(settings.sentence_prompt.clone()),
            Message::user(user_turn),
        ],
        temperature: settings.temperature,
        max_tokens: settings.max_tokens,
        stream: false,
        response_format: ResponseFormat::Text,
    }
}
