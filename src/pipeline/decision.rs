//! Forward/skip decision over a classification result.
//!
//! Precedence, highest first:
//! 1. hard exclusion: always skip
//! 2. category (or generic event) match: overrides soft exclusion
//! 3. soft exclusion: skip when nothing rescued the message
//! 4. geography: forward only with a city and a category

use crate::pipeline::types::{ClassificationResult, Decision, SkipReason};

/// Stateless decision rule, parameterized by whether category rules exist.
#[derive(Debug, Clone, Copy)]
pub struct DecisionEngine {
    has_category_rules: bool,
}

impl DecisionEngine {
    pub fn new(has_category_rules: bool) -> Self {
        Self { has_category_rules }
    }

    pub fn decide(&self, result: &ClassificationResult) -> Decision {
        if result.hard_excluded {
            return Decision::Skip(SkipReason::HardExcluded);
        }

        let has_category = if self.has_category_rules {
            !result.categories.is_empty()
        } else {
            result.is_event
        };

        if result.soft_excluded && !has_category {
            return Decision::Skip(SkipReason::SoftExcluded);
        }
        if result.city.is_none() {
            return Decision::Skip(SkipReason::NoCity);
        }
        if !has_category {
            return Decision::Skip(SkipReason::NoCategory);
        }
        Decision::Forward
    }
}
