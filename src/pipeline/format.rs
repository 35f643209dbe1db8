//! Outbound payload formatting: hashtags, timestamp line, source locator.

use chrono::{DateTime, FixedOffset, Local, Utc};

use crate::pipeline::normalize::is_target_letter;
use crate::pipeline::types::{Message, SourceRef};

/// Line separating the header block from the original post.
pub const SEPARATOR_LINE: &str = "------------------------------";

/// Label used when a channel has neither title nor username.
pub const FALLBACK_CHANNEL_LABEL: &str = "Источник";

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M %Z";

/// Timezone for the human-readable timestamp line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisplayZone {
    /// The host's local timezone.
    Local,
    Utc,
    Fixed(FixedOffset),
}

impl DisplayZone {
    /// Parse `local`, `utc` or a fixed offset such as `+03:00`, `-0530`, `+3`.
    pub fn parse(value: &str) -> Option<Self> {
        let value = value.trim();
        if value.eq_ignore_ascii_case("local") {
            return Some(Self::Local);
        }
        if value.eq_ignore_ascii_case("utc") || value.eq_ignore_ascii_case("z") {
            return Some(Self::Utc);
        }

        let (sign, rest) = match value.chars().next()? {
            '+' => (1, &value[1..]),
            '-' => (-1, &value[1..]),
            _ => return None,
        };
        if !rest.chars().all(|c| c.is_ascii_digit() || c == ':') {
            return None;
        }
        let (hours, minutes) = match rest.split_once(':') {
            Some((h, m)) => (h, m),
            None if rest.len() == 4 => rest.split_at(2),
            None => (rest, "0"),
        };
        let hours: i32 = hours.parse().ok()?;
        let minutes: i32 = minutes.parse().ok()?;
        if !(0..=14).contains(&hours) || !(0..60).contains(&minutes) {
            return None;
        }
        FixedOffset::east_opt(sign * (hours * 3600 + minutes * 60)).map(Self::Fixed)
    }

    /// Render `YYYY-MM-DD HH:MM TZ`.
    pub fn format(&self, ts: DateTime<Utc>) -> String {
        match self {
            Self::Local => ts.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string(),
            Self::Utc => ts.format(TIMESTAMP_FORMAT).to_string(),
            Self::Fixed(offset) if offset.local_minus_utc() == 0 => {
                ts.format(TIMESTAMP_FORMAT).to_string()
            }
            Self::Fixed(offset) => ts.with_timezone(offset).format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

/// Turn a category name into a hashtag, or `None` if nothing survives.
///
/// Lower-cases, replaces whitespace runs with `_`, drops everything outside
/// `[a-z0-9_]` and Cyrillic letters.
pub fn hashtag(category: &str) -> Option<String> {
    let lowered = category.to_lowercase();
    let mut slug = String::with_capacity(lowered.len());
    let mut in_whitespace = false;

    for c in lowered.chars() {
        if c.is_whitespace() {
            if !in_whitespace {
                slug.push('_');
            }
            in_whitespace = true;
            continue;
        }
        in_whitespace = false;
        if c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || is_target_letter(c) {
            slug.push(c);
        }
    }

    if slug.is_empty() {
        None
    } else {
        Some(format!("#{slug}"))
    }
}

/// Hashtags for all matched categories, preserving order.
pub fn hashtags(categories: &[String]) -> Vec<String> {
    categories.iter().filter_map(|c| hashtag(c)).collect()
}

/// `t.me` permalink for a post, if the channel is addressable.
pub fn permalink(source: &SourceRef, message_id: i64) -> Option<String> {
    if let Some(username) = source.username.as_deref().filter(|u| !u.is_empty()) {
        return Some(format!("https://t.me/{username}/{message_id}"));
    }
    source
        .chat_id
        .map(|chat_id| format!("https://t.me/c/{}/{message_id}", internal_channel_id(chat_id)))
}

/// Strip the Bot API `-100` channel prefix to get the id used in `t.me/c/` links.
fn internal_channel_id(chat_id: i64) -> String {
    let digits = chat_id.unsigned_abs().to_string();
    if chat_id < 0
        && let Some(rest) = digits.strip_prefix("100").filter(|r| !r.is_empty())
    {
        return rest.to_string();
    }
    digits
}

/// Human-readable channel label: title, then username, then a fallback.
pub fn channel_label(source: &SourceRef) -> String {
    source
        .title
        .as_deref()
        .filter(|t| !t.trim().is_empty())
        .or(source.username.as_deref().filter(|u| !u.is_empty()))
        .unwrap_or(FALLBACK_CHANNEL_LABEL)
        .to_string()
}

/// Assemble the forwarded text for a matched message.
pub fn build_payload(
    message: &Message,
    categories: &[String],
    zone: DisplayZone,
    with_link: bool,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    let tags = hashtags(categories);
    if !tags.is_empty() {
        parts.push(tags.join(" "));
    }
    if let Some(ts) = message.timestamp {
        parts.push(zone.format(ts));
    }

    let link = if with_link {
        permalink(&message.source, message.id)
    } else {
        None
    };
    parts.push(link.unwrap_or_else(|| channel_label(&message.source)));

    parts.push(String::new());
    parts.push(SEPARATOR_LINE.to_string());
    parts.push(String::new());
    parts.push(message.text.trim().to_string());

    parts.join("\n").trim().to_string()
}
