//! Logging surface of the decision core.
//!
//! The core never talks to a global logger. Every evaluation entry point
//! takes a [`DecisionLogger`], so embedders can route decision logs into
//! whatever sink their application uses and tests can capture exact
//! output. [`TracingLogger`] is the default production implementation and
//! forwards to the `tracing` macros.
//!
//! All user-facing message text is built by the functions in [`messages`];
//! the wording there is a compatibility contract shared with the other
//! client implementations, so call sites never format decision messages
//! themselves.

use std::sync::Mutex;

/// Severity of a decision log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Debug,
    Info,
    Warning,
}

/// Sink for decision log lines.
///
/// Implementations must be safe to call from concurrent decisions; the
/// core imposes no ordering between lines emitted by different calls.
pub trait DecisionLogger {
    fn debug(&self, message: &str);
    fn info(&self, message: &str);
    fn warning(&self, message: &str);
}

/// Forwards decision logs to the `tracing` macros.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl DecisionLogger for TracingLogger {
    fn debug(&self, message: &str) {
        tracing::debug!("{}", message);
    }

    fn info(&self, message: &str) {
        tracing::info!("{}", message);
    }

    fn warning(&self, message: &str) {
        tracing::warn!("{}", message);
    }
}

/// Discards all decision logs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopLogger;

impl DecisionLogger for NoopLogger {
    fn debug(&self, _message: &str) {}
    fn info(&self, _message: &str) {}
    fn warning(&self, _message: &str) {}
}

/// Records decision logs in memory, in emission order.
///
/// Primarily a test double: identical decisions must produce identical
/// log output, and asserting that needs a capturing sink.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    entries: Mutex<Vec<(LogLevel, String)>>,
}

impl MemoryLogger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything logged so far.
    pub fn entries(&self) -> Vec<(LogLevel, String)> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .unwrap_or_default()
    }

    /// Messages logged at `level`, in order.
    pub fn messages_at(&self, level: LogLevel) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|(entry_level, _)| *entry_level == level)
            .map(|(_, message)| message)
            .collect()
    }

    fn push(&self, level: LogLevel, message: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.push((level, message.to_string()));
        }
    }
}

impl DecisionLogger for MemoryLogger {
    fn debug(&self, message: &str) {
        self.push(LogLevel::Debug, message);
    }

    fn info(&self, message: &str) {
        self.push(LogLevel::Info, message);
    }

    fn warning(&self, message: &str) {
        self.push(LogLevel::Warning, message);
    }
}

/// Builders for the decision log lines.
///
/// One function per message id; the names mirror the ids used across
/// client implementations (`NO_AUDIENCE_ATTACHED`, `UNEXPECTED_TYPE`, ...).
pub mod messages {
    use crate::condition::tree::Verdict;
    use crate::models::AttributeValue;

    /// `NO_AUDIENCE_ATTACHED` (info).
    pub fn no_audience_attached(experiment_key: &str) -> String {
        format!("No audiences attached to experiment \"{experiment_key}\". Evaluated as True.")
    }

    /// `EVALUATING_AUDIENCES_COMBINED` (debug).
    pub fn evaluating_audiences_combined(experiment_key: &str, conditions_json: &str) -> String {
        format!("Evaluating audiences for experiment \"{experiment_key}\": {conditions_json}.")
    }

    /// `USER_ATTRIBUTES` (debug).
    pub fn user_attributes(attributes_json: &str) -> String {
        format!("User attributes: {attributes_json}.")
    }

    /// `EVALUATING_AUDIENCE` (debug).
    pub fn evaluating_audience(audience_id: &str, conditions_json: &str) -> String {
        format!("Starting to evaluate audience \"{audience_id}\" with conditions: {conditions_json}.")
    }

    /// `AUDIENCE_EVALUATION_RESULT` (debug).
    pub fn audience_evaluation_result(audience_id: &str, result: Verdict) -> String {
        format!("Audience \"{audience_id}\" evaluated to {result}.")
    }

    /// `AUDIENCE_EVALUATION_RESULT_COMBINED` (info).
    pub fn audience_evaluation_result_combined(experiment_key: &str, result: Verdict) -> String {
        format!("Audiences for experiment \"{experiment_key}\" collectively evaluated to {result}.")
    }

    /// `MISSING_ATTRIBUTE_VALUE` (warning).
    pub fn missing_attribute_value(leaf_json: &str, attribute_name: &str) -> String {
        format!(
            "Audience condition {leaf_json} evaluated to UNKNOWN because no value was passed for user attribute \"{attribute_name}\"."
        )
    }

    /// `UNEXPECTED_TYPE` (warning).
    pub fn unexpected_type(leaf_json: &str, attribute_name: &str, value: &AttributeValue) -> String {
        format!(
            "Audience condition {leaf_json} evaluated to UNKNOWN because user attribute \"{attribute_name}\" has an unexpected value {value}."
        )
    }

    /// Bucketer (debug).
    pub fn assigned_bucket(bucket_value: u32, user_id: &str) -> String {
        format!("Assigned bucket {bucket_value} to user \"{user_id}\".")
    }

    /// Bucketer (info).
    pub fn user_in_variation(user_id: &str, variation_key: &str, experiment_key: &str) -> String {
        format!("User \"{user_id}\" is in variation \"{variation_key}\" of experiment {experiment_key}.")
    }

    /// Bucketer (info).
    pub fn user_in_no_variation(user_id: &str) -> String {
        format!("User \"{user_id}\" is in no variation.")
    }

    /// Bucketer (info).
    pub fn user_forced_in_variation(user_id: &str, variation_key: &str) -> String {
        format!("User \"{user_id}\" is forced in variation \"{variation_key}\".")
    }

    /// Bucketer (info).
    pub fn user_in_experiment_of_group(user_id: &str, experiment_key: &str, group_id: &str) -> String {
        format!("User \"{user_id}\" is in experiment {experiment_key} of group {group_id}.")
    }

    /// Bucketer (info).
    pub fn user_not_in_experiment_of_group(
        user_id: &str,
        experiment_key: &str,
        group_id: &str,
    ) -> String {
        format!("User \"{user_id}\" is not in experiment \"{experiment_key}\" of group {group_id}.")
    }

    /// Bucketer (info).
    pub fn user_in_no_experiment(user_id: &str) -> String {
        format!("User \"{user_id}\" is in no experiment.")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_logger_records_in_order() {
        let logger = MemoryLogger::new();
        logger.debug("first");
        logger.info("second");
        logger.warning("third");

        assert_eq!(
            logger.entries(),
            vec![
                (LogLevel::Debug, "first".to_string()),
                (LogLevel::Info, "second".to_string()),
                (LogLevel::Warning, "third".to_string()),
            ]
        );
        assert_eq!(logger.messages_at(LogLevel::Info), vec!["second"]);
    }

    #[test]
    fn test_bucket_messages_match_contract() {
        assert_eq!(
            messages::assigned_bucket(42, "test_user"),
            "Assigned bucket 42 to user \"test_user\"."
        );
        assert_eq!(
            messages::user_in_variation("test_user", "control", "test_experiment"),
            "User \"test_user\" is in variation \"control\" of experiment test_experiment."
        );
        assert_eq!(
            messages::user_not_in_experiment_of_group("test_user", "group_exp_2", "19228"),
            "User \"test_user\" is not in experiment \"group_exp_2\" of group 19228."
        );
    }
}
