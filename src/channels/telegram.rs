//! Telegram Bot API client.
//!
//! Thin `reqwest` wrapper around the three methods the relay needs:
//! `getMe`, `getUpdates` and `sendMessage`. Also the production `Delivery` port.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::ChannelError;
use crate::poller::ports::Delivery;

/// Telegram's maximum message length in characters.
pub const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

const CHANNEL_NAME: &str = "telegram";

/// Slack added on top of the long-poll timeout for the HTTP request itself.
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Identity returned by `getMe`.
#[derive(Debug, Clone, Deserialize)]
pub struct BotIdentity {
    pub id: i64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub first_name: String,
}

/// Bot API client bound to one bot token.
pub struct TelegramBot {
    bot_token: SecretString,
    api_base: String,
    client: reqwest::Client,
}

impl TelegramBot {
    pub fn new(bot_token: SecretString, api_base: impl Into<String>) -> Self {
        Self {
            bot_token,
            api_base: api_base.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{}",
            self.api_base,
            self.bot_token.expose_secret(),
            method
        )
    }

    /// POST a Bot API method and unwrap the `result` field of the envelope.
    async fn call(
        &self,
        method: &str,
        body: &serde_json::Value,
        timeout: Duration,
    ) -> Result<serde_json::Value, ChannelError> {
        let resp = self
            .client
            .post(self.api_url(method))
            .timeout(timeout)
            .json(body)
            .send()
            .await
            .map_err(|e| ChannelError::Http(format!("{method}: {}", e.without_url())))?;

        let status = resp.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(ChannelError::AuthFailed {
                name: CHANNEL_NAME.into(),
                reason: format!("{method} rejected the bot token (HTTP 401)"),
            });
        }

        let data: serde_json::Value = resp.json().await.map_err(|e| {
            ChannelError::InvalidResponse {
                name: CHANNEL_NAME.into(),
                reason: format!("{method} (HTTP {status}): {}", e.without_url()),
            }
        })?;

        if data.get("ok").and_then(serde_json::Value::as_bool) != Some(true) {
            let description = data
                .get("description")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("no description");
            return Err(ChannelError::SendFailed {
                name: CHANNEL_NAME.into(),
                reason: format!("{method} failed (HTTP {status}): {description}"),
            });
        }

        Ok(data
            .get("result")
            .cloned()
            .unwrap_or(serde_json::Value::Null))
    }

    /// Verify the token and fetch the bot's identity.
    pub async fn get_me(&self) -> Result<BotIdentity, ChannelError> {
        let result = self
            .call("getMe", &serde_json::json!({}), DEFAULT_REQUEST_TIMEOUT)
            .await?;
        serde_json::from_value(result).map_err(|e| ChannelError::InvalidResponse {
            name: CHANNEL_NAME.into(),
            reason: format!("getMe: {e}"),
        })
    }

    /// Long-poll for updates with `update_id >= offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_secs: u64,
    ) -> Result<Vec<serde_json::Value>, ChannelError> {
        let body = serde_json::json!({
            "offset": offset,
            "timeout": timeout_secs,
            "allowed_updates": ["message", "channel_post"]
        });
        let result = self
            .call(
                "getUpdates",
                &body,
                Duration::from_secs(timeout_secs) + REQUEST_TIMEOUT_SLACK,
            )
            .await?;

        match result {
            serde_json::Value::Array(updates) => Ok(updates),
            other => Err(ChannelError::InvalidResponse {
                name: CHANNEL_NAME.into(),
                reason: format!("getUpdates: expected an array, got {other}"),
            }),
        }
    }

    /// Send plain text with link previews disabled, split into ≤4096-char chunks.
    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), ChannelError> {
        for chunk in split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH) {
            let body = serde_json::json!({
                "chat_id": chat_id,
                "text": chunk,
                "disable_web_page_preview": true
            });
            self.call("sendMessage", &body, DEFAULT_REQUEST_TIMEOUT)
                .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl Delivery for TelegramBot {
    async fn deliver(&self, recipient: i64, payload: &str) -> Result<(), ChannelError> {
        self.send_message(recipient, payload).await
    }
}

/// Split a message into chunks of at most `max_len` characters,
/// preferring newline, then space boundaries.
pub fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.chars().count() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        // Byte offset of the first char past the limit.
        let hard_end = match remaining.char_indices().nth(max_len) {
            Some((idx, _)) => idx,
            None => {
                chunks.push(remaining.to_string());
                break;
            }
        };

        let window = &remaining[..hard_end];
        let split_at = window
            .rfind('\n')
            .or_else(|| window.rfind(' '))
            .filter(|&idx| idx > 0)
            .unwrap_or(hard_end);

        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}
