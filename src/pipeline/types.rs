//! Shared types for the classification pipeline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ── Messages ────────────────────────────────────────────────────────

/// Where a message came from, as far as the fetch collaborator knows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    /// Public username of the channel (without `@`).
    pub username: Option<String>,
    /// Numeric chat id as reported by the Bot API (`-100…` for channels).
    pub chat_id: Option<i64>,
    /// Human-readable channel title.
    pub title: Option<String>,
}

/// A post fetched from a source. Ids are monotonic per source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: i64,
    pub text: String,
    pub timestamp: Option<DateTime<Utc>>,
    pub source: SourceRef,
}

impl Message {
    pub fn new(id: i64, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
            timestamp: None,
            source: SourceRef::default(),
        }
    }

    pub fn with_timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn with_source(mut self, source: SourceRef) -> Self {
        self.source = source;
        self
    }
}

// ── Source identifiers ──────────────────────────────────────────────

/// Canonicalize a configured source identifier.
///
/// Accepts `@name`, `name`, `t.me/name`, `https://t.me/name` and numeric chat
/// ids. Usernames are lower-cased since Telegram treats them case-insensitively.
pub fn canonical_source(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let without_host = without_scheme
        .strip_prefix("t.me/")
        .or_else(|| without_scheme.strip_prefix("telegram.me/"))
        .unwrap_or(without_scheme);
    let name = without_host.trim_start_matches('@').trim_end_matches('/');

    if name.parse::<i64>().is_ok() {
        name.to_string()
    } else {
        name.to_lowercase()
    }
}

// ── Classification ──────────────────────────────────────────────────

/// Per-message classification. Computed, never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClassificationResult {
    /// First matching city rule.
    pub city: Option<String>,
    /// Every matching category rule, in configured order.
    pub categories: Vec<String>,
    /// Generic event keyword hit (vacuously true with no event keywords).
    pub is_event: bool,
    pub hard_excluded: bool,
    pub soft_excluded: bool,
}

/// Why a message was not forwarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    HardExcluded,
    SoftExcluded,
    NoCity,
    NoCategory,
}

impl SkipReason {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::HardExcluded => "hard_excluded",
            Self::SoftExcluded => "soft_excluded",
            Self::NoCity => "no_city",
            Self::NoCategory => "no_category",
        }
    }
}

/// Forward/skip outcome of the decision engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Forward,
    Skip(SkipReason),
}

impl Decision {
    pub fn is_forward(&self) -> bool {
        matches!(self, Decision::Forward)
    }

    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Forward => "forward",
            Self::Skip(reason) => reason.label(),
        }
    }
}
