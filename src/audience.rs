//! Audience resolution: does a user satisfy an experiment's audiences?

use serde::Serialize;
use serde_json::Value;

use crate::condition::evaluator::AttributeConditionEvaluator;
use crate::condition::tree::{self, Verdict};
use crate::condition::{ConditionNode, ConditionOperator};
use crate::logging::{messages, DecisionLogger};
use crate::models::{Experiment, ProjectConfig, UserAttributes};

/// Determine whether `attributes` satisfy the audiences attached to
/// `experiment`.
///
/// The experiment's `audienceConditions` tree is preferred; when absent,
/// the `audienceIds` list is evaluated as an implicit `or`. An experiment
/// with no audiences at all admits every user. The combined three-valued
/// result is coerced to a boolean at this boundary: `Unknown` rejects.
pub fn is_user_in_experiment<L: DecisionLogger>(
    config: &ProjectConfig,
    experiment: &Experiment,
    attributes: &UserAttributes,
    logger: &L,
) -> bool {
    let fallback_structure;
    let (structure, audience_ids, conditions_json) = match experiment.audience_condition_set() {
        Some(set) => (
            &set.structure,
            set.audience_ids.as_slice(),
            experiment
                .audience_conditions
                .as_ref()
                .map(to_json_string)
                .unwrap_or_else(|| String::from("null")),
        ),
        None => {
            fallback_structure = ConditionNode::Group {
                operator: ConditionOperator::Or,
                children: (0..experiment.audience_ids.len())
                    .map(ConditionNode::Leaf)
                    .collect(),
            };
            (
                &fallback_structure,
                experiment.audience_ids.as_slice(),
                to_json_string(&experiment.audience_ids),
            )
        }
    };

    if audience_ids.is_empty() {
        logger.info(&messages::no_audience_attached(&experiment.key));
        return true;
    }

    logger.debug(&messages::evaluating_audiences_combined(
        &experiment.key,
        &conditions_json,
    ));
    logger.debug(&messages::user_attributes(&to_json_string(attributes)));

    let result = tree::evaluate(structure, |index| {
        evaluate_audience(config, audience_ids, index, attributes, logger)
    });

    logger.info(&messages::audience_evaluation_result_combined(
        &experiment.key,
        result,
    ));

    result.as_bool()
}

/// Evaluate one audience referenced from the experiment-level tree.
///
/// A leaf index that resolves to no configured audience yields `Unknown`
/// and is folded by the caller's three-valued logic.
fn evaluate_audience<L: DecisionLogger>(
    config: &ProjectConfig,
    audience_ids: &[String],
    index: usize,
    attributes: &UserAttributes,
    logger: &L,
) -> Verdict {
    let Some(audience_id) = audience_ids.get(index) else {
        return Verdict::Unknown;
    };
    let Some(audience) = config.audience(audience_id) else {
        return Verdict::Unknown;
    };
    let Some(structure) = audience.condition_structure() else {
        return Verdict::Unknown;
    };

    logger.debug(&messages::evaluating_audience(
        audience_id,
        &to_json_string(&audience.conditions),
    ));

    let evaluator = AttributeConditionEvaluator::new(audience.condition_list(), attributes, logger);
    let result = tree::evaluate(structure, |leaf_index| evaluator.evaluate(leaf_index));

    logger.debug(&messages::audience_evaluation_result(audience_id, result));

    result
}

fn to_json_string<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| Value::Null.to_string())
}
