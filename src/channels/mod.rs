//! Telegram transport: Bot API client, update listener and post inbox.

pub mod commands;
pub mod inbox;
pub mod telegram;

pub use commands::{Command, UpdateListener};
pub use inbox::TelegramInbox;
pub use telegram::TelegramBot;
