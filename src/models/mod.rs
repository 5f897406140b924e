//! Configuration entities consumed by the decision engine.
//!
//! All entities are deserialized from the project configuration wire
//! format (camelCase keys) by an external loader and are read-only for
//! the lifetime of a [`ProjectConfig`]. Condition payloads arrive as raw
//! JSON and are decoded exactly once, when the config is built; decisions
//! never re-parse them.

use std::collections::{BTreeMap, HashMap};
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::condition::{ConditionLeaf, ConditionNode};
use crate::errors::ConditionDecodeError;

/// A scalar attribute or condition value.
///
/// Integral and floating literals are kept apart so log output preserves
/// how a value was written; numeric comparison promotes both to `f64`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Null,
}

impl AttributeValue {
    /// The value as a finite number, if it is one. Booleans are not
    /// numbers, and non-finite floats are rejected.
    pub fn as_finite_number(&self) -> Option<f64> {
        match self {
            AttributeValue::Int(value) => Some(*value as f64),
            AttributeValue::Float(value) if value.is_finite() => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, AttributeValue::Null)
    }
}

impl fmt::Display for AttributeValue {
    /// JSON-style rendering for log lines. `Float` always shows a decimal
    /// point so `9000` and `9000.0` stay distinguishable.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttributeValue::Bool(value) => write!(f, "{value}"),
            AttributeValue::Int(value) => write!(f, "{value}"),
            AttributeValue::Float(value) => write!(f, "{value:?}"),
            AttributeValue::String(value) => write!(f, "{}", Value::String(value.clone())),
            AttributeValue::Null => write!(f, "null"),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::String(value.to_string())
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        AttributeValue::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        AttributeValue::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        AttributeValue::Float(value)
    }
}

/// User attributes handed to a decision.
///
/// Ordered map so attribute logging serializes identically across
/// processes.
pub type UserAttributes = BTreeMap<String, AttributeValue>;

/// A variation of an experiment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variation {
    pub id: String,
    pub key: String,
}

/// One entry of a traffic allocation: `entity_id` owns the bucket range
/// ending just below `end_of_range`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrafficAllocation {
    pub entity_id: String,
    pub end_of_range: u32,
}

/// How a group combines its member experiments.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GroupPolicy {
    /// Mutually exclusive: the group's traffic allocation picks at most
    /// one member experiment per user.
    #[serde(rename = "random")]
    Random,
    /// Members run independently; the group does not gate bucketing.
    #[serde(rename = "overlapping")]
    Overlapping,
}

impl fmt::Display for GroupPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GroupPolicy::Random => write!(f, "random"),
            GroupPolicy::Overlapping => write!(f, "overlapping"),
        }
    }
}

/// An experiment group.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Group {
    pub id: String,
    pub policy: GroupPolicy,
    #[serde(default)]
    pub traffic_allocation: Vec<TrafficAllocation>,
}

/// Audience conditions of an experiment, decoded: a condition tree whose
/// leaves index into `audience_ids`.
#[derive(Debug, Clone)]
pub struct AudienceConditionSet {
    pub structure: ConditionNode,
    pub audience_ids: Vec<String>,
}

/// An experiment record.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Experiment {
    pub id: String,
    pub key: String,
    #[serde(default)]
    pub audience_ids: Vec<String>,
    /// Raw audience-conditions tree; preferred over `audience_ids` when
    /// present. Decoded into `audience_condition_set` at config build.
    #[serde(default)]
    pub audience_conditions: Option<Value>,
    #[serde(default)]
    pub variations: Vec<Variation>,
    #[serde(default)]
    pub forced_variations: BTreeMap<String, String>,
    #[serde(default)]
    pub traffic_allocation: Vec<TrafficAllocation>,
    #[serde(default)]
    pub group_id: Option<String>,
    #[serde(skip)]
    audience_condition_set: Option<AudienceConditionSet>,
}

impl Experiment {
    /// Decode `audience_conditions`, if any. Called once per experiment
    /// when the project config is built.
    pub fn decode_conditions(&mut self) -> Result<(), ConditionDecodeError> {
        if let Some(raw) = &self.audience_conditions {
            let (structure, audience_ids) = crate::condition::decode_audience_conditions(raw)?;
            self.audience_condition_set = Some(AudienceConditionSet {
                structure,
                audience_ids,
            });
        }
        Ok(())
    }

    /// The decoded audience-conditions tree, when one was configured.
    pub fn audience_condition_set(&self) -> Option<&AudienceConditionSet> {
        self.audience_condition_set.as_ref()
    }

    pub fn variation_by_key(&self, key: &str) -> Option<&Variation> {
        self.variations.iter().find(|variation| variation.key == key)
    }

    pub fn variation_by_id(&self, id: &str) -> Option<&Variation> {
        self.variations.iter().find(|variation| variation.id == id)
    }
}

/// Attribute conditions of an audience, decoded: a condition tree whose
/// leaves index into `condition_list`.
#[derive(Debug, Clone)]
pub struct DecodedConditions {
    pub structure: ConditionNode,
    pub condition_list: Vec<ConditionLeaf>,
}

/// A named predicate over user attributes.
#[derive(Debug, Clone, Deserialize)]
pub struct Audience {
    pub id: String,
    pub name: String,
    /// Raw conditions tree as configured; kept for logging.
    pub conditions: Value,
    #[serde(skip)]
    decoded: Option<DecodedConditions>,
}

impl Audience {
    /// Build an audience and decode its conditions eagerly.
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        conditions: Value,
    ) -> Result<Self, ConditionDecodeError> {
        let mut audience = Self {
            id: id.into(),
            name: name.into(),
            conditions,
            decoded: None,
        };
        audience.decode_conditions()?;
        Ok(audience)
    }

    /// Decode the raw conditions. Called once at config build for
    /// audiences that arrived through deserialization.
    pub fn decode_conditions(&mut self) -> Result<(), ConditionDecodeError> {
        let (structure, condition_list) =
            crate::condition::decode_attribute_conditions(&self.conditions)?;
        self.decoded = Some(DecodedConditions {
            structure,
            condition_list,
        });
        Ok(())
    }

    pub fn condition_structure(&self) -> Option<&ConditionNode> {
        self.decoded.as_ref().map(|decoded| &decoded.structure)
    }

    pub fn condition_list(&self) -> &[ConditionLeaf] {
        self.decoded
            .as_ref()
            .map(|decoded| decoded.condition_list.as_slice())
            .unwrap_or_default()
    }
}

/// Read-only view of a project configuration, indexed for decisions.
///
/// Building the config is the one fallible step: every audience's
/// conditions and every experiment's `audienceConditions` are decoded
/// here, so malformed trees are rejected before any decision runs.
#[derive(Debug, Clone, Default)]
pub struct ProjectConfig {
    audiences: HashMap<String, Audience>,
    experiments: HashMap<String, Experiment>,
    groups: HashMap<String, Group>,
}

impl ProjectConfig {
    pub fn new(
        audiences: Vec<Audience>,
        experiments: Vec<Experiment>,
        groups: Vec<Group>,
    ) -> Result<Self, ConditionDecodeError> {
        let mut audience_map = HashMap::with_capacity(audiences.len());
        for mut audience in audiences {
            if audience.decoded.is_none() {
                audience.decode_conditions()?;
            }
            audience_map.insert(audience.id.clone(), audience);
        }

        let mut experiment_map = HashMap::with_capacity(experiments.len());
        for mut experiment in experiments {
            experiment.decode_conditions()?;
            experiment_map.insert(experiment.key.clone(), experiment);
        }

        let group_map = groups
            .into_iter()
            .map(|group| (group.id.clone(), group))
            .collect();

        Ok(Self {
            audiences: audience_map,
            experiments: experiment_map,
            groups: group_map,
        })
    }

    pub fn audience(&self, audience_id: &str) -> Option<&Audience> {
        self.audiences.get(audience_id)
    }

    pub fn experiment(&self, experiment_key: &str) -> Option<&Experiment> {
        self.experiments.get(experiment_key)
    }

    pub fn group(&self, group_id: &str) -> Option<&Group> {
        self.groups.get(group_id)
    }
}
