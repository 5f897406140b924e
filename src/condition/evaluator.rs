//! Evaluation of a single attribute condition against user attributes.

use super::tree::Verdict;
use super::{ConditionLeaf, CUSTOM_ATTRIBUTE_TYPE};
use crate::logging::{messages, DecisionLogger};
use crate::models::{AttributeValue, UserAttributes};

const MATCH_EXACT: &str = "exact";
const MATCH_EXISTS: &str = "exists";
const MATCH_SUBSTRING: &str = "substring";
const MATCH_GREATER_THAN: &str = "gt";
const MATCH_LESS_THAN: &str = "lt";

/// How a leaf with no `match` field is interpreted.
///
/// Configurations written before the `match` field existed rely on
/// `Exact`; `Unknown` is the strict reading that refuses to guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchDefault {
    #[default]
    Exact,
    Unknown,
}

/// Evaluates condition-list entries for one audience against one user's
/// attributes.
///
/// The evaluator is a per-decision view over borrowed data; it keeps no
/// state of its own and may be discarded after the audience is evaluated.
pub struct AttributeConditionEvaluator<'a, L: DecisionLogger> {
    condition_list: &'a [ConditionLeaf],
    attributes: &'a UserAttributes,
    logger: &'a L,
    match_default: MatchDefault,
}

impl<'a, L: DecisionLogger> AttributeConditionEvaluator<'a, L> {
    pub fn new(
        condition_list: &'a [ConditionLeaf],
        attributes: &'a UserAttributes,
        logger: &'a L,
    ) -> Self {
        Self {
            condition_list,
            attributes,
            logger,
            match_default: MatchDefault::default(),
        }
    }

    pub fn with_match_default(mut self, match_default: MatchDefault) -> Self {
        self.match_default = match_default;
        self
    }

    /// Evaluate the condition at `index`.
    ///
    /// Yields `Unknown` for anything the evaluator does not understand: an
    /// out-of-range index, a condition type other than `custom_attribute`,
    /// an unrecognized match operator, or a user value of the wrong kind.
    pub fn evaluate(&self, index: usize) -> Verdict {
        let Some(leaf) = self.condition_list.get(index) else {
            return Verdict::Unknown;
        };
        if leaf.kind.as_deref() != Some(CUSTOM_ATTRIBUTE_TYPE) {
            return Verdict::Unknown;
        }

        let match_kind = match leaf.match_kind.as_deref() {
            Some(match_kind) => match_kind,
            None => match self.match_default {
                MatchDefault::Exact => MATCH_EXACT,
                MatchDefault::Unknown => return Verdict::Unknown,
            },
        };

        match match_kind {
            MATCH_EXISTS => self.exists(leaf),
            MATCH_EXACT => self.exact(leaf),
            MATCH_SUBSTRING => self.substring(leaf),
            MATCH_GREATER_THAN => self.compare(leaf, |user, condition| user > condition),
            MATCH_LESS_THAN => self.compare(leaf, |user, condition| user < condition),
            _ => Verdict::Unknown,
        }
    }

    fn exists(&self, leaf: &ConditionLeaf) -> Verdict {
        let user_value = leaf
            .name
            .as_deref()
            .and_then(|name| self.attributes.get(name));
        match user_value {
            Some(value) if !value.is_null() => Verdict::True,
            _ => Verdict::False,
        }
    }

    fn exact(&self, leaf: &ConditionLeaf) -> Verdict {
        let Some(name) = leaf.name.as_deref() else {
            return Verdict::Unknown;
        };
        // Absent, null, and non-finite condition values cannot be
        // compared; warnings cover user values only.
        let condition_value = match leaf.value.as_ref() {
            Some(value) => match value {
                AttributeValue::String(_) | AttributeValue::Bool(_) => value,
                _ if value.as_finite_number().is_some() => value,
                _ => return Verdict::Unknown,
            },
            None => return Verdict::Unknown,
        };
        let Some(user_value) = self.attributes.get(name) else {
            self.warn_missing(leaf, name);
            return Verdict::Unknown;
        };

        match (condition_value, user_value) {
            (AttributeValue::String(expected), AttributeValue::String(actual)) => {
                Verdict::from(expected == actual)
            }
            (AttributeValue::Bool(expected), AttributeValue::Bool(actual)) => {
                Verdict::from(expected == actual)
            }
            _ => match (
                condition_value.as_finite_number(),
                user_value.as_finite_number(),
            ) {
                (Some(expected), Some(actual)) => Verdict::from(expected == actual),
                _ => {
                    self.warn_unexpected(leaf, name, user_value);
                    Verdict::Unknown
                }
            },
        }
    }

    fn substring(&self, leaf: &ConditionLeaf) -> Verdict {
        let Some(name) = leaf.name.as_deref() else {
            return Verdict::Unknown;
        };
        let Some(substring) = leaf.value.as_ref().and_then(AttributeValue::as_str) else {
            return Verdict::Unknown;
        };
        let Some(user_value) = self.attributes.get(name) else {
            self.warn_missing(leaf, name);
            return Verdict::Unknown;
        };

        match user_value.as_str() {
            Some(actual) => Verdict::from(actual.contains(substring)),
            None => {
                self.warn_unexpected(leaf, name, user_value);
                Verdict::Unknown
            }
        }
    }

    fn compare(&self, leaf: &ConditionLeaf, ordering: impl Fn(f64, f64) -> bool) -> Verdict {
        let Some(name) = leaf.name.as_deref() else {
            return Verdict::Unknown;
        };
        let Some(condition_value) = leaf.value.as_ref().and_then(AttributeValue::as_finite_number)
        else {
            return Verdict::Unknown;
        };
        let Some(user_value) = self.attributes.get(name) else {
            self.warn_missing(leaf, name);
            return Verdict::Unknown;
        };

        match user_value.as_finite_number() {
            Some(actual) => Verdict::from(ordering(actual, condition_value)),
            None => {
                self.warn_unexpected(leaf, name, user_value);
                Verdict::Unknown
            }
        }
    }

    fn warn_missing(&self, leaf: &ConditionLeaf, name: &str) {
        self.logger
            .warning(&messages::missing_attribute_value(&leaf.to_json(), name));
    }

    fn warn_unexpected(&self, leaf: &ConditionLeaf, name: &str, value: &AttributeValue) {
        self.logger
            .warning(&messages::unexpected_type(&leaf.to_json(), name, value));
    }
}
