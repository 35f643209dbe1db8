//! Named keyword rules and keyword sets.
//!
//! Rules are compiled once at startup from [`RuleConfig`] and never change
//! afterwards. A rule matches when any of its patterns matches; a rule whose
//! keywords are all blank is dropped from its set.

use tracing::debug;

use crate::config::RuleConfig;
use crate::error::ConfigError;
use crate::pipeline::pattern::CompiledPattern;

/// A named group of compiled patterns (one city, one category).
#[derive(Debug, Clone)]
pub struct ClassificationRule {
    pub name: String,
    pub patterns: Vec<CompiledPattern>,
}

impl ClassificationRule {
    /// Compile a rule from its name and raw keywords.
    ///
    /// Returns `Ok(None)` when no keyword survives trimming. An empty name falls
    /// back to the first keyword.
    pub fn compile(name: &str, keywords: &[String]) -> Result<Option<Self>, ConfigError> {
        let keywords: Vec<&str> = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .collect();
        let Some(first) = keywords.first() else {
            return Ok(None);
        };

        let name = if name.trim().is_empty() {
            first.to_string()
        } else {
            name.trim().to_string()
        };
        let patterns = keywords
            .iter()
            .map(|kw| CompiledPattern::compile(kw))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(Self { name, patterns }))
    }

    /// Match against normalized text.
    pub fn is_match(&self, normalized: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(normalized))
    }
}

/// Ordered rules for one classification axis.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<ClassificationRule>,
}

impl RuleSet {
    /// Compile every configured rule, dropping rules without keywords.
    pub fn from_config(kind: &str, configs: &[RuleConfig]) -> Result<Self, ConfigError> {
        let mut rules = Vec::with_capacity(configs.len());
        for cfg in configs {
            let keywords = cfg.keywords.clone().unwrap_or_default().keywords();
            match ClassificationRule::compile(&cfg.name, &keywords)? {
                Some(rule) => rules.push(rule),
                None => debug!(kind, rule = %cfg.name, "Dropping rule without keywords"),
            }
        }
        Ok(Self { rules })
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ClassificationRule> {
        self.rules.iter()
    }
}

/// An unnamed list of patterns (event keywords, exclusion lists).
#[derive(Debug, Clone, Default)]
pub struct KeywordSet {
    patterns: Vec<CompiledPattern>,
}

impl KeywordSet {
    /// Compile keywords, skipping blank entries.
    pub fn compile(keywords: &[String]) -> Result<Self, ConfigError> {
        let patterns = keywords
            .iter()
            .map(|k| k.trim())
            .filter(|k| !k.is_empty())
            .map(CompiledPattern::compile)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    /// Match against normalized text. An empty set never matches.
    pub fn is_match(&self, normalized: &str) -> bool {
        self.patterns.iter().any(|p| p.is_match(normalized))
    }
}
