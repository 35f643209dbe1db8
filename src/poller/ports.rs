//! Collaborator ports consumed by the poller.
//!
//! The poller knows nothing about Telegram or SQL; it only talks to these
//! traits. Production wiring uses `TelegramInbox`, `LibSqlBackend` and
//! `TelegramBot`; tests plug in in-memory stubs.

use async_trait::async_trait;

use crate::error::{ChannelError, DatabaseError, PollError};
use crate::pipeline::types::Message;

/// Lists unseen messages of a source.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Messages with `id > since_id`, ascending by id.
    async fn list_new_messages(
        &self,
        source: &str,
        since_id: i64,
    ) -> Result<Vec<Message>, PollError>;
}

/// Durable per-source ingestion checkpoint.
#[async_trait]
pub trait OffsetStore: Send + Sync {
    /// Last processed id, or 0 for an unknown source.
    async fn get_last_id(&self, source: &str) -> Result<i64, DatabaseError>;

    async fn set_last_id(&self, source: &str, last_id: i64) -> Result<(), DatabaseError>;
}

/// Current subscriber list. Read fresh for every forwarded message.
#[async_trait]
pub trait RecipientStore: Send + Sync {
    async fn list_active_recipients(&self) -> Result<Vec<i64>, DatabaseError>;
}

/// Sends a formatted payload to one recipient.
#[async_trait]
pub trait Delivery: Send + Sync {
    async fn deliver(&self, recipient: i64, payload: &str) -> Result<(), ChannelError>;
}
