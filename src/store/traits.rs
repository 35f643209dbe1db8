//! Unified `Database` trait — single async interface for all persistence.
//!
//! The poller-facing halves (`OffsetStore`, `RecipientStore`) are supertraits,
//! so one backend serves both the poller and the command listener.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::DatabaseError;
use crate::pipeline::types::{Message, SourceRef};
use crate::poller::ports::{OffsetStore, RecipientStore};

/// A channel post captured from the Bot API, waiting to be polled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelPost {
    pub chat_id: i64,
    pub message_id: i64,
    /// Lower-cased channel username, if public.
    pub username: Option<String>,
    pub title: Option<String>,
    pub text: String,
    pub posted_at: Option<DateTime<Utc>>,
}

impl ChannelPost {
    /// Convert into the pipeline's message type.
    pub fn into_message(self) -> Message {
        Message {
            id: self.message_id,
            text: self.text,
            timestamp: self.posted_at,
            source: SourceRef {
                username: self.username,
                chat_id: Some(self.chat_id),
                title: self.title,
            },
        }
    }
}

/// Backend-agnostic database trait.
#[async_trait]
pub trait Database: OffsetStore + RecipientStore + Send + Sync {
    /// Run all pending schema migrations.
    async fn init_schema(&self) -> Result<(), DatabaseError>;

    // ── Subscriptions ───────────────────────────────────────────────

    /// Enable or disable delivery to a chat.
    async fn set_subscription(&self, chat_id: i64, enabled: bool) -> Result<(), DatabaseError>;

    /// Whether a chat currently receives posts.
    async fn is_subscribed(&self, chat_id: i64) -> Result<bool, DatabaseError>;

    // ── Channel post inbox ──────────────────────────────────────────

    /// Store a captured post. Returns `false` if it was already stored.
    async fn insert_channel_post(&self, post: &ChannelPost) -> Result<bool, DatabaseError>;

    /// Posts of a source (username or numeric chat id) with id > `since_id`, ascending.
    async fn list_channel_posts(
        &self,
        source: &str,
        since_id: i64,
    ) -> Result<Vec<ChannelPost>, DatabaseError>;

    /// Delete posts of a source with id ≤ `through_id`. Returns the number deleted.
    async fn prune_channel_posts(
        &self,
        source: &str,
        through_id: i64,
    ) -> Result<usize, DatabaseError>;
}
