//! Condition trees: wire decoding and the types shared by the evaluators.
//!
//! A raw conditions payload is a recursive JSON value: operator arrays
//! (`["and" | "or" | "not", ...children]`) over leaves. Decoding splits it
//! into two parallel structures: a flat *condition list* holding the
//! leaves in input order, and a *condition structure* whose leaf nodes are
//! indices into that list. Audience definitions use condition-object
//! leaves; experiment-level `audienceConditions` use audience-id string
//! leaves. Both shapes share one tree walker.

pub mod evaluator;
pub mod tree;

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::ConditionDecodeError;
use crate::models::AttributeValue;

/// The only condition type the leaf evaluator understands; any other
/// value makes a leaf evaluate to unknown.
pub const CUSTOM_ATTRIBUTE_TYPE: &str = "custom_attribute";

/// A single attribute condition, immutable after decode.
///
/// Every field may be absent on the wire; absence is preserved (an absent
/// `match` is interpreted by the evaluator, see
/// [`evaluator::MatchDefault`]).
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ConditionLeaf {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(
        default,
        deserialize_with = "deserialize_leaf_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<AttributeValue>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(rename = "match", default, skip_serializing_if = "Option::is_none")]
    pub match_kind: Option<String>,
}

impl ConditionLeaf {
    /// The leaf in its wire form, for warning messages.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| String::from("{}"))
    }
}

// A present `null` is an explicit value (`exists` conditions carry one)
// and must survive re-encoding; only a missing field decodes to `None`.
fn deserialize_leaf_value<'de, D>(deserializer: D) -> Result<Option<AttributeValue>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    AttributeValue::deserialize(deserializer).map(Some)
}

/// Boolean operator of a condition-tree group node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConditionOperator {
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,
    #[serde(rename = "not")]
    Not,
}

impl ConditionOperator {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionOperator::And => "and",
            ConditionOperator::Or => "or",
            ConditionOperator::Not => "not",
        }
    }

    fn from_token(token: &str) -> Option<Self> {
        match token {
            "and" => Some(ConditionOperator::And),
            "or" => Some(ConditionOperator::Or),
            "not" => Some(ConditionOperator::Not),
            _ => None,
        }
    }
}

impl fmt::Display for ConditionOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Decoded condition structure.
///
/// Leaf indices are stable: they follow the input order of the raw
/// payload, so a given leaf can be referenced by position.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionNode {
    Leaf(usize),
    Group {
        operator: ConditionOperator,
        children: Vec<ConditionNode>,
    },
}

impl ConditionNode {
    /// Number of leaf references in this structure.
    pub fn leaf_count(&self) -> usize {
        match self {
            ConditionNode::Leaf(_) => 1,
            ConditionNode::Group { children, .. } => {
                children.iter().map(ConditionNode::leaf_count).sum()
            }
        }
    }
}

/// Decode an audience's attribute conditions.
///
/// Leaves are condition objects; anything else in leaf position is a
/// decode error.
pub fn decode_attribute_conditions(
    raw: &Value,
) -> Result<(ConditionNode, Vec<ConditionLeaf>), ConditionDecodeError> {
    let mut leaves = Vec::new();
    let structure = decode_node(raw, &mut |value| match value {
        Value::Object(_) => {
            let leaf: ConditionLeaf = serde_json::from_value(value.clone())?;
            leaves.push(leaf);
            Ok(leaves.len() - 1)
        }
        other => Err(ConditionDecodeError::InvalidConditionLeaf {
            found: json_kind(other),
        }),
    })?;
    Ok((structure, leaves))
}

/// Decode an experiment's audience-level conditions.
///
/// Leaves are bare audience-id strings; a lone id at the top level is
/// accepted and decodes as a single-leaf structure.
pub fn decode_audience_conditions(
    raw: &Value,
) -> Result<(ConditionNode, Vec<String>), ConditionDecodeError> {
    let mut audience_ids = Vec::new();
    let structure = decode_node(raw, &mut |value| match value {
        Value::String(id) => {
            audience_ids.push(id.clone());
            Ok(audience_ids.len() - 1)
        }
        other => Err(ConditionDecodeError::InvalidAudienceReference {
            found: json_kind(other),
        }),
    })?;
    Ok((structure, audience_ids))
}

fn decode_node<F>(raw: &Value, decode_leaf: &mut F) -> Result<ConditionNode, ConditionDecodeError>
where
    F: FnMut(&Value) -> Result<usize, ConditionDecodeError>,
{
    match raw {
        Value::Array(items) => {
            let operator = items
                .first()
                .and_then(Value::as_str)
                .and_then(ConditionOperator::from_token);
            // A list that does not begin with an operator is the legacy
            // implicit-or form: every element is an operand.
            let operands = match operator {
                Some(_) => &items[1..],
                None => &items[..],
            };
            let children = operands
                .iter()
                .map(|child| decode_node(child, decode_leaf))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(ConditionNode::Group {
                operator: operator.unwrap_or(ConditionOperator::Or),
                children,
            })
        }
        leaf => decode_leaf(leaf).map(ConditionNode::Leaf),
    }
}

/// Re-encode a decoded structure to its wire form, resolving leaf indices
/// against `leaves`. Implicit-or groups re-encode with the operator made
/// explicit.
pub fn encode_conditions<T: Serialize>(structure: &ConditionNode, leaves: &[T]) -> Value {
    match structure {
        ConditionNode::Leaf(index) => leaves
            .get(*index)
            .and_then(|leaf| serde_json::to_value(leaf).ok())
            .unwrap_or(Value::Null),
        ConditionNode::Group { operator, children } => {
            let mut items = Vec::with_capacity(children.len() + 1);
            items.push(Value::String(operator.as_str().to_string()));
            items.extend(children.iter().map(|child| encode_conditions(child, leaves)));
            Value::Array(items)
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_decode_nested_structure_and_list() {
        let raw = json!(["and", ["or", ["or", {
            "name": "test_attribute",
            "type": "custom_attribute",
            "value": "test_value_1"
        }]]]);

        let (structure, leaves) = decode_attribute_conditions(&raw).unwrap();

        // and(or(or(leaf 0)))
        assert_eq!(
            structure,
            ConditionNode::Group {
                operator: ConditionOperator::And,
                children: vec![ConditionNode::Group {
                    operator: ConditionOperator::Or,
                    children: vec![ConditionNode::Group {
                        operator: ConditionOperator::Or,
                        children: vec![ConditionNode::Leaf(0)],
                    }],
                }],
            }
        );
        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0].name.as_deref(), Some("test_attribute"));
        assert_eq!(leaves[0].kind.as_deref(), Some(CUSTOM_ATTRIBUTE_TYPE));
        assert_eq!(
            leaves[0].value,
            Some(AttributeValue::String("test_value_1".into()))
        );
        assert_eq!(leaves[0].match_kind, None);
    }

    #[test]
    fn test_decode_leaf_defaults_to_absent_fields() {
        let (_, leaves) = decode_attribute_conditions(&json!({})).unwrap();

        assert_eq!(leaves.len(), 1);
        assert_eq!(leaves[0], ConditionLeaf::default());
    }

    #[test]
    fn test_decode_preserves_leaf_order() {
        let raw = json!(["and",
            {"name": "first", "type": "custom_attribute", "value": 1},
            ["or",
                {"name": "second", "type": "custom_attribute", "value": 2},
                {"name": "third", "type": "custom_attribute", "value": 3}
            ]
        ]);

        let (_, leaves) = decode_attribute_conditions(&raw).unwrap();

        let names: Vec<_> = leaves.iter().map(|l| l.name.as_deref().unwrap()).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }

    #[test]
    fn test_decode_implicit_or_list() {
        let (structure, ids) =
            decode_audience_conditions(&json!(["11154", "11155"])).unwrap();

        assert_eq!(
            structure,
            ConditionNode::Group {
                operator: ConditionOperator::Or,
                children: vec![ConditionNode::Leaf(0), ConditionNode::Leaf(1)],
            }
        );
        assert_eq!(ids, vec!["11154", "11155"]);
    }

    #[test]
    fn test_decode_bare_audience_id() {
        let (structure, ids) = decode_audience_conditions(&json!("11154")).unwrap();

        assert_eq!(structure, ConditionNode::Leaf(0));
        assert_eq!(ids, vec!["11154"]);
    }

    #[test]
    fn test_decode_combined_audience_tree() {
        let raw = json!(["and", ["or", "1", "2"], ["or", "3", "4", "5", "6", "7"]]);

        let (structure, ids) = decode_audience_conditions(&raw).unwrap();

        assert_eq!(ids.len(), 7);
        assert_eq!(structure.leaf_count(), 7);
        match &structure {
            ConditionNode::Group { operator, children } => {
                assert_eq!(*operator, ConditionOperator::And);
                assert_eq!(children.len(), 2);
            }
            _ => panic!("expected a group at the root"),
        }
    }

    #[test]
    fn test_decode_rejects_wrong_leaf_shapes() {
        assert!(matches!(
            decode_attribute_conditions(&json!(["and", 42])),
            Err(ConditionDecodeError::InvalidConditionLeaf { found: "number" })
        ));
        assert!(matches!(
            decode_attribute_conditions(&json!("custom_attribute")),
            Err(ConditionDecodeError::InvalidConditionLeaf { found: "string" })
        ));
        assert!(matches!(
            decode_audience_conditions(&json!(["or", {"name": "x"}])),
            Err(ConditionDecodeError::InvalidAudienceReference { found: "object" })
        ));
        assert!(matches!(
            decode_audience_conditions(&json!(["or", null])),
            Err(ConditionDecodeError::InvalidAudienceReference { found: "null" })
        ));
    }

    #[test]
    fn test_operator_with_no_operands_decodes_empty_group() {
        let (structure, leaves) = decode_attribute_conditions(&json!(["and"])).unwrap();

        assert_eq!(
            structure,
            ConditionNode::Group {
                operator: ConditionOperator::And,
                children: vec![],
            }
        );
        assert!(leaves.is_empty());
    }

    #[test]
    fn test_round_trip_preserves_leaf_fields() {
        let raw = json!(["not", {
            "name": "input_value",
            "value": null,
            "type": "custom_attribute",
            "match": "exists"
        }]);

        let (structure, leaves) = decode_attribute_conditions(&raw).unwrap();
        let encoded = encode_conditions(&structure, &leaves);

        // The explicit null value is kept apart from an absent field.
        assert_eq!(leaves[0].value, Some(AttributeValue::Null));
        assert_eq!(encoded, raw);
    }

    #[test]
    fn test_round_trip_omits_absent_fields() {
        let raw = json!({"name": "browser_type", "value": "safari"});

        let (structure, leaves) = decode_attribute_conditions(&raw).unwrap();
        let encoded = encode_conditions(&structure, &leaves);

        assert_eq!(encoded, raw);
        assert_eq!(leaves[0].to_json(), r#"{"name":"browser_type","value":"safari"}"#);
    }

    #[test]
    fn test_encode_audience_tree() {
        let raw = json!(["and", ["or", "1", "2"], "3"]);
        let (structure, ids) = decode_audience_conditions(&raw).unwrap();

        assert_eq!(encode_conditions(&structure, &ids), raw);
    }
}
