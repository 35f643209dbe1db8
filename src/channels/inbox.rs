//! `MessageSource` backed by the captured channel-post inbox.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;

use crate::error::PollError;
use crate::pipeline::types::Message;
use crate::poller::ports::MessageSource;
use crate::store::Database;

/// Serves posts captured by the update listener to the poller.
pub struct TelegramInbox {
    db: Arc<dyn Database>,
    revoked: Arc<AtomicBool>,
}

impl TelegramInbox {
    pub fn new(db: Arc<dyn Database>, revoked: Arc<AtomicBool>) -> Self {
        Self { db, revoked }
    }
}

#[async_trait]
impl MessageSource for TelegramInbox {
    async fn list_new_messages(
        &self,
        source: &str,
        since_id: i64,
    ) -> Result<Vec<Message>, PollError> {
        if self.revoked.load(Ordering::SeqCst) {
            return Err(PollError::IdentityRevoked {
                reason: "bot token rejected by Telegram".into(),
            });
        }

        // Everything at or below the checkpoint has been processed already.
        match self.db.prune_channel_posts(source, since_id).await {
            Ok(0) => {}
            Ok(pruned) => tracing::debug!(source, pruned, "Pruned processed channel posts"),
            Err(e) => tracing::warn!(source, reason = %e, "Failed to prune channel posts"),
        }

        let posts = self
            .db
            .list_channel_posts(source, since_id)
            .await
            .map_err(|e| PollError::Fetch {
                source_id: source.to_string(),
                reason: e.to_string(),
            })?;

        Ok(posts.into_iter().map(|p| p.into_message()).collect())
    }
}
