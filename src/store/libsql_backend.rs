//! libSQL backend — async `Database` trait implementation.
//!
//! Supports local file and in-memory databases.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use libsql::{Connection, Database as LibSqlDatabase, params};
use tracing::{debug, info};

use crate::error::DatabaseError;
use crate::poller::ports::{OffsetStore, RecipientStore};
use crate::store::migrations;
use crate::store::traits::{ChannelPost, Database};

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;

        let backend = Self {
            db: Arc::new(db),
            conn,
        };
        backend.init_schema().await?;
        Ok(backend)
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }
}

// ── Helper functions ────────────────────────────────────────────────

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
        .ok()
        .map(|ndt| ndt.and_utc())
}

/// Convert `Option<&str>` to libsql Value.
fn opt_text(s: Option<&str>) -> libsql::Value {
    match s {
        Some(s) => libsql::Value::Text(s.to_string()),
        None => libsql::Value::Null,
    }
}

fn row_to_post(row: &libsql::Row) -> Result<ChannelPost, DatabaseError> {
    let posted_at: Option<String> = row.get(5).ok();
    Ok(ChannelPost {
        chat_id: row
            .get(0)
            .map_err(|e| DatabaseError::Query(format!("channel_posts.chat_id: {e}")))?,
        message_id: row
            .get(1)
            .map_err(|e| DatabaseError::Query(format!("channel_posts.message_id: {e}")))?,
        username: row.get(2).ok(),
        title: row.get(3).ok(),
        text: row
            .get(4)
            .map_err(|e| DatabaseError::Query(format!("channel_posts.text: {e}")))?,
        posted_at: posted_at.as_deref().and_then(parse_datetime),
    })
}

// ── Trait implementations ───────────────────────────────────────────

const POST_COLUMNS: &str = "chat_id, message_id, username, title, text, posted_at";

/// Matches a canonical source key against either the username or the numeric chat id.
const SOURCE_FILTER: &str = "(username = ?1 OR CAST(chat_id AS TEXT) = ?1)";

#[async_trait]
impl OffsetStore for LibSqlBackend {
    async fn get_last_id(&self, source: &str) -> Result<i64, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT last_id FROM offsets WHERE source = ?1",
                params![source],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("get_last_id: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("get_last_id: {e}")))?
        {
            Some(row) => row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("get_last_id: {e}"))),
            None => Ok(0),
        }
    }

    async fn set_last_id(&self, source: &str, last_id: i64) -> Result<(), DatabaseError> {
        // MAX() keeps the checkpoint monotonic even if a stale value is written.
        self.conn()
            .execute(
                "INSERT INTO offsets (source, last_id) VALUES (?1, ?2)
                 ON CONFLICT(source) DO UPDATE SET
                    last_id = MAX(offsets.last_id, excluded.last_id),
                    updated_at = datetime('now')",
                params![source, last_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_last_id: {e}")))?;
        debug!(source, last_id, "Offset saved");
        Ok(())
    }
}

#[async_trait]
impl RecipientStore for LibSqlBackend {
    async fn list_active_recipients(&self) -> Result<Vec<i64>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT chat_id FROM subscriptions WHERE enabled = 1 ORDER BY chat_id",
                (),
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("list_active_recipients: {e}")))?;

        let mut recipients = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_active_recipients: {e}")))?
        {
            recipients.push(
                row.get::<i64>(0)
                    .map_err(|e| DatabaseError::Query(format!("list_active_recipients: {e}")))?,
            );
        }
        Ok(recipients)
    }
}

#[async_trait]
impl Database for LibSqlBackend {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn set_subscription(&self, chat_id: i64, enabled: bool) -> Result<(), DatabaseError> {
        self.conn()
            .execute(
                "INSERT INTO subscriptions (chat_id, enabled) VALUES (?1, ?2)
                 ON CONFLICT(chat_id) DO UPDATE SET
                    enabled = excluded.enabled,
                    updated_at = datetime('now')",
                params![chat_id, enabled as i64],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("set_subscription: {e}")))?;
        debug!(chat_id, enabled, "Subscription updated");
        Ok(())
    }

    async fn is_subscribed(&self, chat_id: i64) -> Result<bool, DatabaseError> {
        let mut rows = self
            .conn()
            .query(
                "SELECT enabled FROM subscriptions WHERE chat_id = ?1",
                params![chat_id],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("is_subscribed: {e}")))?;

        match rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("is_subscribed: {e}")))?
        {
            Some(row) => Ok(row
                .get::<i64>(0)
                .map_err(|e| DatabaseError::Query(format!("is_subscribed: {e}")))?
                != 0),
            None => Ok(false),
        }
    }

    async fn insert_channel_post(&self, post: &ChannelPost) -> Result<bool, DatabaseError> {
        let posted_at = post.posted_at.map(|ts| ts.to_rfc3339());
        let changed = self
            .conn()
            .execute(
                "INSERT OR IGNORE INTO channel_posts
                    (chat_id, message_id, username, title, text, posted_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    post.chat_id,
                    post.message_id,
                    opt_text(post.username.as_deref()),
                    opt_text(post.title.as_deref()),
                    post.text.as_str(),
                    opt_text(posted_at.as_deref()),
                ],
            )
            .await
            .map_err(|e| DatabaseError::Query(format!("insert_channel_post: {e}")))?;
        Ok(changed > 0)
    }

    async fn list_channel_posts(
        &self,
        source: &str,
        since_id: i64,
    ) -> Result<Vec<ChannelPost>, DatabaseError> {
        let sql = format!(
            "SELECT {POST_COLUMNS} FROM channel_posts
             WHERE {SOURCE_FILTER} AND message_id > ?2
             ORDER BY message_id ASC"
        );
        let mut rows = self
            .conn()
            .query(&sql, params![source, since_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("list_channel_posts: {e}")))?;

        let mut posts = Vec::new();
        while let Some(row) = rows
            .next()
            .await
            .map_err(|e| DatabaseError::Query(format!("list_channel_posts: {e}")))?
        {
            posts.push(row_to_post(&row)?);
        }
        Ok(posts)
    }

    async fn prune_channel_posts(
        &self,
        source: &str,
        through_id: i64,
    ) -> Result<usize, DatabaseError> {
        let sql = format!("DELETE FROM channel_posts WHERE {SOURCE_FILTER} AND message_id <= ?2");
        let deleted = self
            .conn()
            .execute(&sql, params![source, through_id])
            .await
            .map_err(|e| DatabaseError::Query(format!("prune_channel_posts: {e}")))?;
        Ok(deleted as usize)
    }
}
