//! End-to-end classification scenarios: YAML rules in, forward/skip out.

use event_relay::config::{AppConfig, RuleConfig, RulesConfig};
use event_relay::pipeline::normalize::normalize;
use event_relay::pipeline::pattern::CompiledPattern;
use event_relay::pipeline::{Classifier, Decision, DecisionEngine, SkipReason};

fn decide(classifier: &Classifier, text: &str) -> Decision {
    let engine = DecisionEngine::new(classifier.has_category_rules());
    engine.decide(&classifier.classify(text))
}

fn moscow_running(rules: RulesConfig) -> Classifier {
    Classifier::from_config(&RulesConfig {
        cities: vec![RuleConfig::new("Moscow", &["Москва"])],
        categories: vec![RuleConfig::new("Running", &["забег"])],
        ..rules
    })
    .unwrap()
}

#[test]
fn scenario_a_city_and_category_forward() {
    let classifier = moscow_running(RulesConfig::default());
    let result = classifier.classify("Открыта регистрация на забег в Москве");

    assert_eq!(result.city.as_deref(), Some("Moscow"));
    assert_eq!(result.categories, vec!["Running".to_string()]);
    assert_eq!(
        decide(&classifier, "Открыта регистрация на забег в Москве"),
        Decision::Forward
    );
}

#[test]
fn scenario_b_missing_city_skips() {
    let classifier = moscow_running(RulesConfig::default());
    assert_eq!(
        decide(&classifier, "Забег перенесён"),
        Decision::Skip(SkipReason::NoCity)
    );
}

#[test]
fn scenario_c_hard_exclusion_skips() {
    let classifier = moscow_running(RulesConfig {
        hard_exclude_keywords: vec!["реклама".into()],
        ..Default::default()
    });
    assert_eq!(
        decide(&classifier, "Реклама: забег в Москве"),
        Decision::Skip(SkipReason::HardExcluded)
    );
}

#[test]
fn scenario_d_category_overrides_soft_exclusion() {
    let classifier = moscow_running(RulesConfig {
        exclude_keywords: vec!["отменен".into()],
        ..Default::default()
    });
    let text = "Забег в Москве отменен, новый старт скоро";
    assert!(classifier.classify(text).soft_excluded);
    assert_eq!(decide(&classifier, text), Decision::Forward);
}

#[test]
fn scenario_e_no_category_rules_no_event_keywords() {
    let classifier = Classifier::from_config(&RulesConfig {
        cities: vec![RuleConfig::new("Moscow", &["Москва"])],
        ..Default::default()
    })
    .unwrap();

    assert!(!classifier.has_category_rules());
    assert_eq!(
        decide(&classifier, "В Москве сегодня солнечно"),
        Decision::Forward
    );
    assert_eq!(
        decide(&classifier, "В Питере сегодня солнечно"),
        Decision::Skip(SkipReason::NoCity)
    );
}

#[test]
fn yaml_rules_drive_the_decision() {
    let yaml = r#"
bot_token: "123:ABC"
timezone: "+03:00"
channels: ["@Moscow_Runs", "https://t.me/trail_news"]
cities:
  - name: Moscow
    keywords: "Москва, МСК"
  - name: ""
    keywords: ["Санкт-Петербург"]
categories:
  - name: Running
    keywords: [забег, марафон]
  - name: Cycling
    keywords: []
hard_exclude_keywords: [реклама]
"#;
    let config = AppConfig::from_yaml_str(yaml, |_| None).unwrap();
    assert_eq!(config.channels, vec!["moscow_runs", "trail_news"]);

    let classifier = Classifier::from_config(&config.rules).unwrap();
    // The keyword-less Cycling rule is dropped.
    assert_eq!(classifier.categories.len(), 1);

    let result = classifier.classify("Марафон в Санкт-Петербурге");
    assert_eq!(result.city.as_deref(), Some("Санкт-Петербург"));
    assert_eq!(result.categories, vec!["Running".to_string()]);

    assert_eq!(
        decide(&classifier, "Ночной забег по МСК"),
        Decision::Forward
    );
    assert_eq!(
        decide(&classifier, "Реклама марафона в Москве"),
        Decision::Skip(SkipReason::HardExcluded)
    );
}

#[test]
fn default_event_keywords_apply_without_categories() {
    let yaml = r#"
bot_token: "123:ABC"
cities:
  - name: Moscow
    keywords: [Москва]
"#;
    let config = AppConfig::from_yaml_str(yaml, |_| None).unwrap();
    let classifier = Classifier::from_config(&config.rules).unwrap();

    assert_eq!(
        decide(&classifier, "Регистрация на забег в Москве открыта"),
        Decision::Forward
    );
    assert_eq!(
        decide(&classifier, "В Москве открылась новая кофейня"),
        Decision::Skip(SkipReason::NoCategory)
    );
}

#[test]
fn patterns_are_deterministic_and_normalization_is_idempotent() {
    for keyword in ["Москва", "трейл-забег", "Ёлка", "10K"] {
        let a = CompiledPattern::compile(keyword).unwrap();
        let b = CompiledPattern::compile(keyword).unwrap();
        assert_eq!(a.as_str(), b.as_str());
    }

    let text = "Ёлочный ЗАБЕГ в Москве";
    assert_eq!(normalize(&normalize(text)), normalize(text));
}

#[test]
fn stemmed_patterns_match_inflections() {
    let pattern = CompiledPattern::compile("Москва").unwrap();
    for text in ["москва", "в москве", "из москвы", "по москву"] {
        assert!(pattern.is_match(&normalize(text)), "{text}");
    }
    assert!(!pattern.is_match(&normalize("подмосковье")));
}
