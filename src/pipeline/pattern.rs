//! Keyword → regex compiler.
//!
//! A keyword phrase is normalized, split on whitespace/hyphens, and each token
//! becomes a sub-pattern:
//! - Cyrillic tokens match their stem followed by any Cyrillic letters, so
//!   `Москва` also catches `в Москве` or `из Москвы`
//! - everything else matches literally
//!
//! Sub-patterns are joined by `[\s\-]+` and anchored at word boundaries.

use regex::{Regex, RegexBuilder};

use crate::error::ConfigError;
use crate::pipeline::normalize::{has_target_letters, normalize, stem};

/// Character class absorbing inflectional endings after a stem.
const TARGET_LETTER_CLASS: &str = "[а-яё]*";

/// Separator accepted between the tokens of a multi-word keyword.
const TOKEN_SEPARATOR: &str = r"[\s\-]+";

/// A compiled keyword matcher, applied to normalized text.
#[derive(Debug, Clone)]
pub struct CompiledPattern {
    /// The keyword as configured.
    pub keyword: String,
    regex: Regex,
}

impl CompiledPattern {
    /// Compile a keyword phrase into a matcher.
    pub fn compile(keyword: &str) -> Result<Self, ConfigError> {
        let source = pattern_source(keyword);
        let regex = RegexBuilder::new(&source)
            .case_insensitive(true)
            .build()
            .map_err(|e| ConfigError::InvalidKeyword {
                keyword: keyword.to_string(),
                reason: e.to_string(),
            })?;

        Ok(Self {
            keyword: keyword.to_string(),
            regex,
        })
    }

    /// Match against text that has already gone through [`normalize`].
    pub fn is_match(&self, normalized: &str) -> bool {
        self.regex.is_match(normalized)
    }

    /// The generated regular expression.
    pub fn as_str(&self) -> &str {
        self.regex.as_str()
    }
}

/// Build the regex source for a keyword. Pure: same keyword, same source.
fn pattern_source(keyword: &str) -> String {
    let normalized = normalize(keyword);
    let token_patterns: Vec<String> = normalized
        .split(|c: char| c.is_whitespace() || c == '-')
        .filter(|t| !t.is_empty())
        .map(|token| {
            if has_target_letters(token) {
                format!("{}{TARGET_LETTER_CLASS}", regex::escape(&stem(token)))
            } else {
                regex::escape(token)
            }
        })
        .collect();

    let body = if token_patterns.is_empty() {
        regex::escape(&normalized)
    } else {
        token_patterns.join(TOKEN_SEPARATOR)
    };

    format!(r"\b{body}\b")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn matches(keyword: &str, text: &str) -> bool {
        CompiledPattern::compile(keyword)
            .unwrap()
            .is_match(&normalize(text))
    }

    #[test]
    fn compile_is_deterministic() {
        for kw in ["Москва", "Нижний Новгород", "parkrun", "Санкт-Петербург", "-"] {
            let a = CompiledPattern::compile(kw).unwrap();
            let b = CompiledPattern::compile(kw).unwrap();
            assert_eq!(a.as_str(), b.as_str());
        }
    }

    #[test]
    fn cyrillic_keyword_matches_inflected_forms() {
        assert!(matches("Москва", "Забег в Москве"));
        assert!(matches("Москва", "Гости из Москвы"));
        assert!(matches("Москва", "МОСКВА"));
        assert!(matches("Казань", "Старт в Казани"));
    }

    #[test]
    fn keyword_is_word_boundary_anchored() {
        // "москв" stem must start at a word boundary
        assert!(!matches("Москва", "подмосковье"));
        assert!(!matches("run", "running"));
        assert!(matches("run", "Sunday run at 9"));
    }

    #[test]
    fn multi_word_keyword_tolerates_whitespace_and_hyphens() {
        assert!(matches("Нижний Новгород", "в Нижнем Новгороде"));
        assert!(matches("Нижний Новгород", "в Нижнем-Новгороде"));
        assert!(matches("Санкт-Петербург", "Санкт Петербург"));
        assert!(matches("Санкт-Петербург", "в Санкт  -  Петербурге"));
    }

    #[test]
    fn yo_is_folded_on_both_sides() {
        assert!(matches("перенесён", "Забег перенесен"));
        assert!(matches("перенесен", "Забег ПЕРЕНЕСЁН"));
    }

    #[test]
    fn latin_tokens_match_literally() {
        assert!(matches("Trail 50K", "registration for trail 50k is open"));
        assert!(!matches("Trail 50K", "trail 50km"));
    }

    #[test]
    fn regex_metacharacters_are_escaped() {
        assert!(matches("10.5", "дистанция 10.5 км"));
        assert!(!matches("10.5", "дистанция 1005 км"));
        assert!(!matches("a.b", "axb"));
    }

    #[test]
    fn separator_only_keyword_compiles_literally() {
        let p = CompiledPattern::compile("-").unwrap();
        assert_eq!(p.as_str(), r"\b\-\b");
    }
}
