//! Telegram front end: relays questions to the QA service and renders answers.
//!
//! Each user action makes exactly one call to the service. Failures are shown
//! inline in the chat; nothing is retried.

use anyhow::{bail, Result};
use std::time::Duration;

use crate::client::{PredictReply, QaBackend, QaClient, StatsReply};
use crate::config::Config;
use crate::telegram::{stats_keyboard, Message, TelegramBot};

pub const STATS_BUTTON: &str = "📊 Stats";
pub const SEARCHING_PLACEHOLDER: &str = "🤔 Searching UPM database...";
pub const GREETING: &str = "👋 Hello! I am the Axiomus UPM Bot.\n\n\
     I know everything about Universidad Politécnica de Madrid.\n\
     Ask me anything!";

const BAR_CELLS: usize = 10;
const MARKDOWN: &str = "Markdown";

/// What the user sent.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Start,
    Stats,
    Question(String),
}

impl Command {
    pub fn parse(text: &str) -> Self {
        let trimmed = text.trim();
        // Commands may carry a bot suffix in groups: /stats@axiomus_bot
        let head = trimmed.split('@').next().unwrap_or(trimmed);
        match head {
            "/start" => Command::Start,
            "/stats" => Command::Stats,
            _ if trimmed == STATS_BUTTON => Command::Stats,
            _ => Command::Question(text.to_string()),
        }
    }
}

/// Message text together with the parse mode it was written for.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatText {
    pub text: String,
    pub parse_mode: Option<&'static str>,
}

impl ChatText {
    pub fn markdown(text: String) -> Self {
        Self {
            text,
            parse_mode: Some(MARKDOWN),
        }
    }

    pub fn plain(text: String) -> Self {
        Self {
            text,
            parse_mode: None,
        }
    }
}

/// Plain text replies are sent without a parse mode.
#[derive(Debug, Clone, PartialEq)]
pub enum BotReply {
    Text(String),
    Photo { png: Vec<u8>, caption: String },
}

/// Ten-cell bar with `floor(score * 10)` filled cells, then the percentage.
pub fn confidence_bar(score: f32) -> String {
    let score = if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 };
    let filled = ((score * BAR_CELLS as f32).floor() as usize).min(BAR_CELLS);
    format!(
        "{}{} {}%",
        "█".repeat(filled),
        "░".repeat(BAR_CELLS - filled),
        (score * 100.0).round() as u32
    )
}

/// Backslash-escape the characters legacy Telegram Markdown treats as markup.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '_' | '*' | '`' | '[') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Markdown answer block. Service text is escaped.
pub fn format_answer(reply: &PredictReply) -> String {
    let mut text = format!(
        "*Answer:* {}\n\n*Confidence:* {}",
        escape_markdown(&reply.answer),
        confidence_bar(reply.score)
    );
    if let Some(context) = reply.context.as_deref().filter(|c| !c.is_empty()) {
        text.push_str(&format!("\n\n_Context:_ {}", escape_markdown(context)));
    }
    text
}

pub fn format_error(err: &anyhow::Error) -> String {
    format!("❌ Connection Error: {}", err)
}

/// Relay one question; the result is always something to show the user.
/// Errors come back as plain text.
pub async fn answer_text(backend: &dyn QaBackend, question: &str) -> ChatText {
    match backend.predict(question).await {
        Ok(reply) => ChatText::markdown(format_answer(&reply)),
        Err(e) => {
            tracing::warn!("predict relay failed: {:#}", e);
            ChatText::plain(format_error(&e))
        }
    }
}

pub async fn stats_reply(backend: &dyn QaBackend) -> BotReply {
    match backend.stats().await {
        Ok(StatsReply::Image(png)) => BotReply::Photo {
            png,
            caption: "Confidence analytics".to_string(),
        },
        Ok(StatsReply::Message(message)) => BotReply::Text(format!("ℹ️ {}", message)),
        Err(e) => {
            tracing::warn!("stats relay failed: {:#}", e);
            BotReply::Text(format_error(&e))
        }
    }
}

/// Run the long-polling loop until the process is stopped.
pub async fn run_bot(config: &Config) -> Result<()> {
    let token = match std::env::var("TELEGRAM_TOKEN") {
        Ok(t) if !t.trim().is_empty() => t,
        _ => bail!("TELEGRAM_TOKEN is not set"),
    };
    let backend = QaClient::from_config(&config.bot)?;
    let mut bot = TelegramBot::new(token, config.bot.poll_timeout_secs)?;

    tracing::info!(api = backend.base_url(), "Telegram polling loop started");

    loop {
        let updates = match bot.get_updates().await {
            Ok(updates) => updates,
            Err(e) => {
                tracing::error!("Telegram polling error: {:#}", e);
                tokio::time::sleep(Duration::from_secs(5)).await;
                continue;
            }
        };

        for message in updates.into_iter().filter_map(|u| u.message) {
            if let Err(e) = handle_message(&bot, &backend, &message).await {
                tracing::warn!(chat = message.chat.id, "failed to reply: {:#}", e);
            }
        }
    }
}

async fn handle_message(bot: &TelegramBot, backend: &dyn QaBackend, message: &Message) -> Result<()> {
    let Some(text) = message.text.as_deref() else {
        return Ok(());
    };
    let chat_id = message.chat.id;

    match Command::parse(text) {
        Command::Start => {
            bot.send_message(
                chat_id,
                GREETING,
                Some(MARKDOWN),
                Some(stats_keyboard(STATS_BUTTON)),
            )
            .await?;
        }
        Command::Stats => match stats_reply(backend).await {
            BotReply::Photo { png, caption } => bot.send_photo(chat_id, png, &caption).await?,
            BotReply::Text(text) => {
                bot.send_message(chat_id, &text, None, None).await?;
            }
        },
        Command::Question(question) => {
            let placeholder = bot
                .send_message(chat_id, SEARCHING_PLACEHOLDER, None, None)
                .await?;
            let reply = answer_text(backend, &question).await;
            bot.edit_message_text(
                chat_id,
                placeholder.message_id,
                &reply.text,
                reply.parse_mode,
            )
            .await?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeBackend {
        predict: Option<PredictReply>,
        stats: Option<StatsReply>,
    }

    #[async_trait]
    impl QaBackend for FakeBackend {
        async fn predict(&self, _question: &str) -> Result<PredictReply> {
            self.predict
                .clone()
                .ok_or_else(|| anyhow::anyhow!("connection refused"))
        }
        async fn stats(&self) -> Result<StatsReply> {
            self.stats
                .clone()
                .ok_or_else(|| anyhow::anyhow!("timed out"))
        }
    }

    #[test]
    fn test_confidence_bar() {
        assert_eq!(confidence_bar(0.0), "░░░░░░░░░░ 0%");
        assert_eq!(confidence_bar(1.0), "██████████ 100%");
        assert_eq!(confidence_bar(0.55), "█████░░░░░ 55%");
        assert_eq!(confidence_bar(1.7), "██████████ 100%");
        assert_eq!(confidence_bar(f32::NAN), "░░░░░░░░░░ 0%");
    }

    #[test]
    fn test_parse_commands() {
        assert_eq!(Command::parse("/start"), Command::Start);
        assert_eq!(Command::parse("/stats"), Command::Stats);
        assert_eq!(Command::parse("/stats@axiomus_bot"), Command::Stats);
        assert_eq!(Command::parse(STATS_BUTTON), Command::Stats);
        assert_eq!(
            Command::parse("Where is ETSII?"),
            Command::Question("Where is ETSII?".to_string())
        );
    }

    #[test]
    fn test_format_answer_with_and_without_context() {
        let mut reply = PredictReply {
            answer: "Madrid".to_string(),
            score: 0.9,
            context: Some("The ETSII is located in Madrid.".to_string()),
        };
        let text = format_answer(&reply);
        assert!(text.contains("Madrid"));
        assert!(text.contains("█████████░ 90%"));
        assert!(text.contains("The ETSII is located in Madrid."));

        reply.context = None;
        assert!(!format_answer(&reply).contains("Context"));
    }

    /// Every markup character must be preceded by a backslash.
    fn has_bare_markup(text: &str) -> bool {
        let mut escaped = false;
        for c in text.chars() {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if matches!(c, '_' | '*' | '`' | '[') {
                return true;
            }
        }
        false
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("snake_case"), "snake\\_case");
        assert_eq!(escape_markdown("a*b`c[d]"), "a\\*b\\`c\\[d]");
        assert_eq!(escape_markdown("Madrid"), "Madrid");
    }

    #[test]
    fn test_format_answer_escapes_service_text() {
        let reply = PredictReply {
            answer: "snake_case".to_string(),
            score: 0.5,
            context: Some("We use snake_case names.".to_string()),
        };
        let text = format_answer(&reply);
        assert!(text.contains("*Answer:* snake\\_case"));
        assert!(text.contains("_Context:_ We use snake\\_case names."));

        // Only the label markup stays bare.
        let body = text
            .replace("*Answer:*", "")
            .replace("*Confidence:*", "")
            .replace("_Context:_", "");
        assert!(!has_bare_markup(&body), "unescaped markup in {:?}", body);
    }

    #[tokio::test]
    async fn test_unreachable_host_error_is_plain_text() {
        let backend = QaClient::new("http://ml_service:8000", Duration::from_secs(3)).unwrap();
        let reply = answer_text(&backend, "Where?").await;
        assert!(reply.text.starts_with("❌ Connection Error"));
        assert!(reply.text.contains("ml_service"));
        assert_eq!(reply.parse_mode, None);
    }

    #[tokio::test]
    async fn test_answer_is_markdown() {
        let backend = FakeBackend {
            predict: Some(PredictReply {
                answer: "Madrid".to_string(),
                score: 0.9,
                context: None,
            }),
            stats: None,
        };
        let reply = answer_text(&backend, "Where is ETSII?").await;
        assert_eq!(reply.parse_mode, Some("Markdown"));
        assert!(reply.text.starts_with("*Answer:* Madrid"));
    }

    #[tokio::test]
    async fn test_relay_failure_is_inline_error() {
        let backend = FakeBackend {
            predict: None,
            stats: None,
        };
        let reply = answer_text(&backend, "hi").await;
        assert!(reply.text.starts_with("❌ Connection Error"));
        assert!(reply.text.contains("connection refused"));
        assert_eq!(reply.parse_mode, None);
        assert!(matches!(stats_reply(&backend).await, BotReply::Text(t) if t.contains("timed out")));
    }

    #[tokio::test]
    async fn test_stats_reply_variants() {
        let backend = FakeBackend {
            predict: None,
            stats: Some(StatsReply::Image(vec![1, 2, 3])),
        };
        assert!(matches!(stats_reply(&backend).await, BotReply::Photo { png, .. } if png == vec![1, 2, 3]));

        let backend = FakeBackend {
            predict: None,
            stats: Some(StatsReply::Message("Not enough data".to_string())),
        };
        assert_eq!(
            stats_reply(&backend).await,
            BotReply::Text("ℹ️ Not enough data".to_string())
        );
    }
}
