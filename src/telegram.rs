//! Telegram Bot API client.
//!
//! A thin reqwest wrapper over the two methods this service needs:
//! `sendMessage` for outbound delivery and `getUpdates` for the /start
//! long-polling loop. Delivery failures are terminal; there is no retry.

use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;

const DEFAULT_API_URL: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub token: String,
    pub web_app_url: Option<String>,
    pub api_url: String,
}

impl TelegramConfig {
    /// Reads `TELEGRAM_BOT_TOKEN` (required), `TELEGRAM_WEB_APP_URL` and
    /// `TELEGRAM_API_URL` (optional) from the environment.
    pub fn from_env() -> anyhow::Result<Self> {
        let token = std::env::var("TELEGRAM_BOT_TOKEN").context("Missing TELEGRAM_BOT_TOKEN")?;
        let web_app_url = std::env::var("TELEGRAM_WEB_APP_URL").ok();
        let api_url =
            std::env::var("TELEGRAM_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        Ok(Self {
            token,
            web_app_url,
            api_url,
        })
    }
}

/// Failure modes of `sendMessage`. The first three are classified from the
/// Bot API error description and are not retryable.
#[derive(Debug, Error)]
pub enum SendMessageError {
    #[error("chat not found")]
    ChatNotFound,
    #[error("bot was blocked by the user")]
    BotBlocked,
    #[error("user is deactivated")]
    UserDeactivated,
    #[error("telegram api error: {0}")]
    Api(String),
    #[error("telegram transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

impl SendMessageError {
    fn classify(description: String) -> Self {
        let lower = description.to_lowercase();
        if lower.contains("chat not found") {
            Self::ChatNotFound
        } else if lower.contains("bot was blocked") {
            Self::BotBlocked
        } else if lower.contains("user is deactivated") {
            Self::UserDeactivated
        } else {
            Self::Api(description)
        }
    }
}

/// One outbound message. `reply_markup` takes the Bot API JSON shape as-is.
#[derive(Debug, Clone, Serialize)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<serde_json::Value>,
}

impl OutgoingMessage {
    pub fn plain(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            chat_id,
            text: text.into(),
            parse_mode: None,
            reply_markup: None,
        }
    }

    pub fn markdown(chat_id: i64, text: impl Into<String>) -> Self {
        Self {
            parse_mode: Some("Markdown".to_string()),
            ..Self::plain(chat_id, text)
        }
    }

    pub fn with_reply_markup(mut self, markup: serde_json::Value) -> Self {
        self.reply_markup = Some(markup);
        self
    }
}

/// Outbound delivery seam; the HTTP handlers and the bot loop depend on
/// this rather than on the concrete client.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait MessageSender: Send + Sync {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), SendMessageError>;
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub message_id: i64,
    pub text: Option<String>,
    pub chat: Chat,
    pub from: Option<User>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub first_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    description: Option<String>,
    result: Option<T>,
}

pub struct TelegramClient {
    client: reqwest::Client,
    api_url: String,
    token: String,
}

impl TelegramClient {
    pub fn new(config: &TelegramConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{}", self.api_url, self.token, method)
    }

    /// Long-polls `getUpdates`. `offset` must be one past the last handled
    /// update id.
    pub async fn get_updates(
        &self,
        offset: Option<i64>,
        timeout_secs: u64,
    ) -> Result<Vec<Update>, SendMessageError> {
        let mut body = json!({
            "timeout": timeout_secs,
            "allowed_updates": ["message"],
        });
        if let Some(offset) = offset {
            body["offset"] = json!(offset);
        }

        let response: ApiResponse<Vec<Update>> = self
            .client
            .post(self.method_url("getUpdates"))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(SendMessageError::classify(
                response.description.unwrap_or_else(|| "getUpdates failed".to_string()),
            ));
        }
        Ok(response.result.unwrap_or_default())
    }
}

#[async_trait]
impl MessageSender for TelegramClient {
    async fn send_message(&self, message: &OutgoingMessage) -> Result<(), SendMessageError> {
        let response: ApiResponse<serde_json::Value> = self
            .client
            .post(self.method_url("sendMessage"))
            .json(message)
            .send()
            .await?
            .json()
            .await?;

        if !response.ok {
            return Err(SendMessageError::classify(
                response.description.unwrap_or_else(|| "sendMessage failed".to_string()),
            ));
        }
        Ok(())
    }
}

/// Win notification with the promo code in a Markdown code span.
pub fn win_message(code: &str) -> String {
    format!(
        "🎉 Congratulations on your win!\n\n🎁 Your promo code:\n`{code}`\n\nUse it to claim your discount!"
    )
}

/// Consolation message for the lose path.
pub fn lose_message() -> String {
    "😔 Sorry, you lost this round.\n\nDon't give up — play again and win a promo code!".to_string()
}

/// Greeting sent in reply to /start, with a "Play" web-app button when a
/// web-app URL is configured.
pub fn start_greeting(first_name: Option<&str>) -> String {
    format!(
        "👋 Welcome to tic-tac-toe, {}!\n\nPress the button below to start playing:",
        first_name.unwrap_or("friend")
    )
}

pub fn play_keyboard(web_app_url: &str) -> serde_json::Value {
    json!({
        "keyboard": [[{ "text": "🎮 Play", "web_app": { "url": web_app_url } }]],
        "resize_keyboard": true,
    })
}
