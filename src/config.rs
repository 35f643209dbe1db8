//! Configuration loading.
//!
//! The service reads a YAML file (`$CONFIG_PATH`, default `config.yaml`).
//! A handful of deployment settings can be overridden from the environment:
//! `TELEGRAM_BOT_TOKEN`, `EVENT_RELAY_DB_PATH`, `EVENT_RELAY_POLL_INTERVAL`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use secrecy::SecretString;
use serde::Deserialize;

use crate::error::ConfigError;
use crate::pipeline::format::DisplayZone;
use crate::pipeline::types::canonical_source;

pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";
pub const DEFAULT_API_BASE: &str = "https://api.telegram.org";
const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
const DEFAULT_DB_PATH: &str = "data.db";

/// Event keywords used when the config provides none.
pub const DEFAULT_EVENT_KEYWORDS: &[&str] = &[
    "турнир",
    "матч",
    "игра",
    "забег",
    "марафон",
    "чемпионат",
    "соревнования",
    "кубок",
    "регистрация",
    "дистанция",
    "старт",
    "финиш",
];

// ── Raw (file) representation ───────────────────────────────────────

/// Keywords as written in the config: a YAML list or one comma-joined string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum KeywordList {
    Joined(String),
    List(Vec<String>),
}

impl Default for KeywordList {
    fn default() -> Self {
        KeywordList::List(Vec::new())
    }
}

impl KeywordList {
    /// Trimmed, non-blank keywords. Only the joined form is split on commas.
    pub fn keywords(&self) -> Vec<String> {
        let raw: Vec<&str> = match self {
            KeywordList::Joined(s) => s.split(',').collect(),
            KeywordList::List(items) => items.iter().map(String::as_str).collect(),
        };
        raw.into_iter()
            .map(str::trim)
            .filter(|kw| !kw.is_empty())
            .map(String::from)
            .collect()
    }
}

/// One named rule (`{name, keywords}`) as configured.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub keywords: Option<KeywordList>,
}

impl RuleConfig {
    pub fn new(name: &str, keywords: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            keywords: Some(KeywordList::List(
                keywords.iter().map(|k| k.to_string()).collect(),
            )),
        }
    }
}

/// The YAML document, before validation. Every key is optional.
#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    bot_token: Option<String>,
    api_base: Option<String>,
    poll_interval: Option<u64>,
    db_path: Option<String>,
    forward_with_link: Option<bool>,
    channels: Option<Vec<String>>,
    cities: Option<Vec<RuleConfig>>,
    categories: Option<Vec<RuleConfig>>,
    event_keywords: Option<KeywordList>,
    exclude_keywords: Option<KeywordList>,
    hard_exclude_keywords: Option<KeywordList>,
    start_date: Option<String>,
    timezone: Option<String>,
}

// ── Validated configuration ─────────────────────────────────────────

/// Rule configuration handed to the classifier.
#[derive(Debug, Clone, Default)]
pub struct RulesConfig {
    pub cities: Vec<RuleConfig>,
    pub categories: Vec<RuleConfig>,
    pub event_keywords: Vec<String>,
    pub exclude_keywords: Vec<String>,
    pub hard_exclude_keywords: Vec<String>,
}

/// Poller settings that shape forwarded payloads and the cutoff.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Prefer a `t.me` permalink over the channel label.
    pub forward_with_link: bool,
    /// Messages dated before this instant are skipped.
    pub start_date: Option<DateTime<Utc>>,
    /// Timezone used for the timestamp line.
    pub display_zone: DisplayZone,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            forward_with_link: true,
            start_date: None,
            display_zone: DisplayZone::Utc,
        }
    }
}

/// Fully validated service configuration.
#[derive(Debug)]
pub struct AppConfig {
    pub bot_token: SecretString,
    pub api_base: String,
    pub poll_interval: Duration,
    pub db_path: PathBuf,
    /// Canonical source identifiers, in sweep order.
    pub channels: Vec<String>,
    pub rules: RulesConfig,
    pub poller: PollerConfig,
}

impl AppConfig {
    /// Load from a YAML file, applying environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.display().to_string()));
        }
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text, |key| std::env::var(key).ok())
    }

    /// Parse YAML text. `env` resolves environment overrides.
    pub fn from_yaml_str(
        text: &str,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw: RawConfig = if text.trim().is_empty() {
            RawConfig::default()
        } else {
            serde_yaml::from_str(text).map_err(|e| ConfigError::ParseError(e.to_string()))?
        };
        Self::from_raw(raw, env)
    }

    fn from_raw(
        raw: RawConfig,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let bot_token = env("TELEGRAM_BOT_TOKEN")
            .or(raw.bot_token)
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingRequired {
                key: "bot_token".into(),
                hint: "Set bot_token in the config file or TELEGRAM_BOT_TOKEN.".into(),
            })?;

        let poll_interval_secs = match env("EVENT_RELAY_POLL_INTERVAL") {
            Some(v) => v.trim().parse::<u64>().map_err(|e| ConfigError::InvalidValue {
                key: "EVENT_RELAY_POLL_INTERVAL".into(),
                message: e.to_string(),
            })?,
            None => raw.poll_interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        };
        if poll_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                key: "poll_interval".into(),
                message: "must be at least 1 second".into(),
            });
        }

        let db_path = env("EVENT_RELAY_DB_PATH")
            .or(raw.db_path)
            .unwrap_or_else(|| DEFAULT_DB_PATH.to_string());

        let channels: Vec<String> = raw
            .channels
            .unwrap_or_default()
            .iter()
            .map(|c| canonical_source(c))
            .filter(|c| !c.is_empty())
            .collect();

        let mut event_keywords = raw.event_keywords.unwrap_or_default().keywords();
        if event_keywords.is_empty() {
            event_keywords = DEFAULT_EVENT_KEYWORDS.iter().map(|k| k.to_string()).collect();
        }

        let start_date = raw.start_date.as_deref().map(parse_start_date).transpose()?;

        let display_zone = match raw.timezone.as_deref() {
            Some(tz) => DisplayZone::parse(tz).ok_or_else(|| ConfigError::InvalidValue {
                key: "timezone".into(),
                message: format!("{tz:?} (use local, UTC or an offset like +03:00)"),
            })?,
            None => DisplayZone::Local,
        };

        Ok(Self {
            bot_token: SecretString::from(bot_token),
            api_base: raw
                .api_base
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string())
                .trim_end_matches('/')
                .to_string(),
            poll_interval: Duration::from_secs(poll_interval_secs),
            db_path: PathBuf::from(db_path),
            channels,
            rules: RulesConfig {
                cities: raw.cities.unwrap_or_default(),
                categories: raw.categories.unwrap_or_default(),
                event_keywords,
                exclude_keywords: raw.exclude_keywords.unwrap_or_default().keywords(),
                hard_exclude_keywords: raw.hard_exclude_keywords.unwrap_or_default().keywords(),
            },
            poller: PollerConfig {
                forward_with_link: raw.forward_with_link.unwrap_or(true),
                start_date,
                display_zone,
            },
        })
    }
}

/// Parse `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM[:SS]` as a UTC instant.
pub fn parse_start_date(value: &str) -> Result<DateTime<Utc>, ConfigError> {
    let value = value.trim();
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN).and_utc());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M"] {
        if let Ok(ndt) = NaiveDateTime::parse_from_str(value, fmt) {
            return Ok(ndt.and_utc());
        }
    }
    Err(ConfigError::InvalidValue {
        key: "start_date".into(),
        message: format!("{value:?} (use YYYY-MM-DD)"),
    })
}
