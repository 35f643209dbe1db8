//! Multi-axis keyword classifier.
//!
//! Every evaluation runs against the same normalized text:
//! - city: first matching rule in configured order wins
//! - categories: every matching rule
//! - generic event: any event keyword, vacuously true when none are configured
//! - hard/soft exclusion: any keyword of the respective list

use crate::config::RulesConfig;
use crate::error::ConfigError;
use crate::pipeline::normalize::normalize;
use crate::pipeline::rules::{KeywordSet, RuleSet};
use crate::pipeline::types::ClassificationResult;

/// Name of the first rule matching `normalized`, in configured order.
pub fn match_first(normalized: &str, rules: &RuleSet) -> Option<String> {
    rules
        .iter()
        .find(|rule| rule.is_match(normalized))
        .map(|rule| rule.name.clone())
}

/// Names of every rule matching `normalized`.
pub fn match_all(normalized: &str, rules: &RuleSet) -> Vec<String> {
    rules
        .iter()
        .filter(|rule| rule.is_match(normalized))
        .map(|rule| rule.name.clone())
        .collect()
}

/// True if any event keyword matches, or if no event keywords exist at all.
pub fn is_generic_event(normalized: &str, event_keywords: &KeywordSet) -> bool {
    event_keywords.is_empty() || event_keywords.is_match(normalized)
}

/// Exclusion test. An empty list excludes nothing.
pub fn matches_any(normalized: &str, keywords: &KeywordSet) -> bool {
    keywords.is_match(normalized)
}

/// Immutable, shareable set of compiled rules.
#[derive(Debug, Clone, Default)]
pub struct Classifier {
    pub cities: RuleSet,
    pub categories: RuleSet,
    pub event_keywords: KeywordSet,
    pub soft_exclude: KeywordSet,
    pub hard_exclude: KeywordSet,
}

impl Classifier {
    /// Compile all rule sets. Any unusable keyword is a configuration error.
    pub fn from_config(rules: &RulesConfig) -> Result<Self, ConfigError> {
        Ok(Self {
            cities: RuleSet::from_config("city", &rules.cities)?,
            categories: RuleSet::from_config("category", &rules.categories)?,
            event_keywords: KeywordSet::compile(&rules.event_keywords)?,
            soft_exclude: KeywordSet::compile(&rules.exclude_keywords)?,
            hard_exclude: KeywordSet::compile(&rules.hard_exclude_keywords)?,
        })
    }

    /// Whether category rules drive the "relevant" decision (vs. event keywords).
    pub fn has_category_rules(&self) -> bool {
        !self.categories.is_empty()
    }

    /// Normalize once and evaluate every axis.
    pub fn classify(&self, text: &str) -> ClassificationResult {
        let normalized = normalize(text);
        ClassificationResult {
            city: match_first(&normalized, &self.cities),
            categories: match_all(&normalized, &self.categories),
            is_event: is_generic_event(&normalized, &self.event_keywords),
            hard_excluded: matches_any(&normalized, &self.hard_exclude),
            soft_excluded: matches_any(&normalized, &self.soft_exclude),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RuleConfig;

    fn classifier(cities: Vec<RuleConfig>, categories: Vec<RuleConfig>) -> Classifier {
        let rules = RulesConfig {
            cities,
            categories,
            ..Default::default()
        };
        Classifier::from_config(&rules).unwrap()
    }

    #[test]
    fn city_is_first_match_not_best_match() {
        let c = classifier(
            vec![
                RuleConfig::new("Region", &["область"]),
                RuleConfig::new("Moscow", &["Москва"]),
            ],
            vec![],
        );
        let result = c.classify("Забег в Москве и Московской области");
        assert_eq!(result.city.as_deref(), Some("Region"));
    }

    #[test]
    fn city_none_without_rules_or_match() {
        let empty = Classifier::default();
        assert_eq!(empty.classify("Забег в Москве").city, None);

        let c = classifier(vec![RuleConfig::new("Moscow", &["Москва"])], vec![]);
        assert_eq!(c.classify("Забег в Казани").city, None);
    }

    #[test]
    fn categories_are_inclusive() {
        let c = classifier(
            vec![],
            vec![
                RuleConfig::new("Running", &["забег"]),
                RuleConfig::new("Cycling", &["велогонка"]),
                RuleConfig::new("Charity", &["благотворительный"]),
            ],
        );
        let result = c.classify("Благотворительный забег и велогонка");
        assert_eq!(result.categories, vec!["Running", "Cycling", "Charity"]);
    }

    #[test]
    fn empty_event_keywords_are_vacuously_true() {
        let c = Classifier::default();
        assert!(c.classify("что угодно").is_event);
        assert!(is_generic_event("", &KeywordSet::default()));
    }

    #[test]
    fn event_keywords_must_match_when_configured() {
        let events = KeywordSet::compile(&["марафон".to_string()]).unwrap();
        assert!(is_generic_event(&normalize("Марафон в субботу"), &events));
        assert!(!is_generic_event(&normalize("Лекция в субботу"), &events));
    }

    #[test]
    fn exclusions_are_independent() {
        let rules = RulesConfig {
            exclude_keywords: vec!["отменен".into()],
            hard_exclude_keywords: vec!["реклама".into()],
            ..Default::default()
        };
        let c = Classifier::from_config(&rules).unwrap();
        let soft = c.classify("Забег отменён");
        assert!(soft.soft_excluded && !soft.hard_excluded);
        let hard = c.classify("Реклама забега");
        assert!(hard.hard_excluded && !hard.soft_excluded);
    }

    #[test]
    fn matches_any_on_empty_list_is_false() {
        assert!(!matches_any("реклама", &KeywordSet::default()));
    }
}
