//! Bot update listener.
//!
//! A single `getUpdates` long-poll loop serves two flows:
//! - channel posts are captured into the `channel_posts` inbox for the poller
//! - commands, from a private chat or posted in a channel, manage that chat's
//!   subscription
//!
//! An update is confirmed to Telegram (by moving the offset past it) only
//! once it has been applied to the store.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::Notify;

use crate::channels::telegram::TelegramBot;
use crate::error::{ChannelError, DatabaseError};
use crate::store::{ChannelPost, Database};

/// Long-poll timeout passed to `getUpdates`.
const LONG_POLL_TIMEOUT_SECS: u64 = 30;

/// Pause after a failed `getUpdates` call or a failed store write.
const RETRY_DELAY: Duration = Duration::from_secs(5);

pub const REPLY_STARTED: &str = "Идёт поиск событий. Чтобы остановить — /stop.";
pub const REPLY_STOPPED: &str = "Поиск закончен. Чтобы возобновить — /start.";
pub const REPLY_REFRESH: &str = "Обновление запущено, проверяю новые посты.";

/// Bot commands understood in private chats and channel posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Start,
    Stop,
    Status,
    Refresh,
}

impl Command {
    /// Parse `/cmd`, `/cmd@botname` or `/cmd args`.
    pub fn parse(text: &str) -> Option<Self> {
        let word = text.split_whitespace().next()?;
        let name = word.strip_prefix('/')?;
        let name = name.split('@').next().unwrap_or(name);
        match name.to_lowercase().as_str() {
            "start" => Some(Command::Start),
            "stop" => Some(Command::Stop),
            "status" => Some(Command::Status),
            "refresh" => Some(Command::Refresh),
            _ => None,
        }
    }
}

/// The parts of a Bot API update the relay acts on.
#[derive(Debug, Clone, PartialEq)]
pub enum IncomingUpdate {
    ChannelPost(ChannelPost),
    Command { chat_id: i64, command: Command },
}

/// Extract a channel post or a command from a raw update.
///
/// A channel post whose text is a command applies to the channel itself and
/// is not captured.
pub fn parse_update(update: &serde_json::Value) -> Option<IncomingUpdate> {
    if let Some(post) = update.get("channel_post") {
        let post = parse_channel_post(post)?;
        if let Some(command) = Command::parse(&post.text) {
            return Some(IncomingUpdate::Command {
                chat_id: post.chat_id,
                command,
            });
        }
        return Some(IncomingUpdate::ChannelPost(post));
    }

    let message = update.get("message")?;
    let chat_id = message
        .get("chat")
        .and_then(|c| c.get("id"))
        .and_then(serde_json::Value::as_i64)?;
    let text = message.get("text").and_then(serde_json::Value::as_str)?;
    let command = Command::parse(text)?;
    Some(IncomingUpdate::Command { chat_id, command })
}

fn parse_channel_post(post: &serde_json::Value) -> Option<ChannelPost> {
    let chat = post.get("chat")?;
    let chat_id = chat.get("id").and_then(serde_json::Value::as_i64)?;
    let message_id = post.get("message_id").and_then(serde_json::Value::as_i64)?;

    // Media posts carry their text in the caption.
    let text = post
        .get("text")
        .or_else(|| post.get("caption"))
        .and_then(serde_json::Value::as_str)
        .unwrap_or_default()
        .to_string();

    let posted_at = post
        .get("date")
        .and_then(serde_json::Value::as_i64)
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0));

    Some(ChannelPost {
        chat_id,
        message_id,
        username: chat
            .get("username")
            .and_then(serde_json::Value::as_str)
            .map(str::to_lowercase),
        title: chat
            .get("title")
            .and_then(serde_json::Value::as_str)
            .map(String::from),
        text,
        posted_at,
    })
}

/// Owns the bot's update stream.
pub struct UpdateListener {
    bot: Arc<TelegramBot>,
    db: Arc<dyn Database>,
    refresh: Arc<Notify>,
    revoked: Arc<AtomicBool>,
    retry_delay: Duration,
}

impl UpdateListener {
    /// `revoked` is raised when the bot token is rejected; the inbox reads it.
    pub fn new(
        bot: Arc<TelegramBot>,
        db: Arc<dyn Database>,
        refresh: Arc<Notify>,
        revoked: Arc<AtomicBool>,
    ) -> Self {
        Self {
            bot,
            db,
            refresh,
            revoked,
            retry_delay: RETRY_DELAY,
        }
    }

    /// Override the pause between failed attempts.
    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    /// Poll updates until the token is rejected.
    pub async fn run(self) -> Result<(), ChannelError> {
        let mut offset: i64 = 0;
        tracing::info!("Telegram update listener started");

        loop {
            let updates = match self.bot.get_updates(offset, LONG_POLL_TIMEOUT_SECS).await {
                Ok(updates) => updates,
                Err(e) if e.is_auth_failure() => {
                    tracing::error!(reason = %e, "Bot token rejected; update listener stopping");
                    self.revoked.store(true, Ordering::SeqCst);
                    // Wake the scheduler so it observes the revocation now.
                    self.refresh.notify_one();
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(reason = %e, "Telegram poll error");
                    tokio::time::sleep(self.retry_delay).await;
                    continue;
                }
            };

            offset = self.apply_batch(&updates, offset).await;
        }
    }

    /// Apply updates in order and return the next offset to request.
    ///
    /// Stops at the first update the store rejects and returns its id, so the
    /// next `getUpdates` delivers it again.
    async fn apply_batch(&self, updates: &[serde_json::Value], mut offset: i64) -> i64 {
        for update in updates {
            let Some(uid) = update.get("update_id").and_then(serde_json::Value::as_i64) else {
                continue;
            };
            let Some(parsed) = parse_update(update) else {
                offset = uid + 1;
                continue;
            };

            let chat_id = match &parsed {
                IncomingUpdate::Command { chat_id, .. } => Some(*chat_id),
                IncomingUpdate::ChannelPost(_) => None,
            };

            match self.handle_update(parsed).await {
                Ok(reply) => {
                    offset = uid + 1;
                    if let (Some(chat_id), Some(reply)) = (chat_id, reply)
                        && let Err(e) = self.bot.send_message(chat_id, &reply).await
                    {
                        tracing::warn!(recipient = chat_id, reason = %e, "Failed to send command reply");
                    }
                }
                Err(e) => {
                    tracing::warn!(update_id = uid, reason = %e, "Failed to store update; will retry");
                    tokio::time::sleep(self.retry_delay).await;
                    return uid;
                }
            }
        }
        offset
    }

    /// Apply one update. Returns the reply text for commands.
    pub async fn handle_update(
        &self,
        update: IncomingUpdate,
    ) -> Result<Option<String>, DatabaseError> {
        match update {
            IncomingUpdate::ChannelPost(post) => {
                if self.db.insert_channel_post(&post).await? {
                    tracing::debug!(
                        chat_id = post.chat_id,
                        message_id = post.message_id,
                        source = post.username.as_deref().unwrap_or("-"),
                        "Channel post captured"
                    );
                }
                Ok(None)
            }
            IncomingUpdate::Command { chat_id, command } => {
                let reply = self.handle_command(chat_id, command).await?;
                Ok(Some(reply))
            }
        }
    }

    async fn handle_command(&self, chat_id: i64, command: Command) -> Result<String, DatabaseError> {
        tracing::info!(chat_id, ?command, "Command received");
        match command {
            Command::Start => {
                self.db.set_subscription(chat_id, true).await?;
                Ok(REPLY_STARTED.to_string())
            }
            Command::Stop => {
                self.db.set_subscription(chat_id, false).await?;
                Ok(REPLY_STOPPED.to_string())
            }
            Command::Status => {
                let status = if self.db.is_subscribed(chat_id).await? {
                    "включен"
                } else {
                    "выключен"
                };
                Ok(format!("Статус поиска: {status}"))
            }
            Command::Refresh => {
                self.refresh.notify_one();
                Ok(REPLY_REFRESH.to_string())
            }
        }
    }
}
