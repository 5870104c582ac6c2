//! Agent result type with an explicit tri-state outcome.

use crate::errors::AgentError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// How an agent's execution ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentOutcome {
    /// The agent completed its work.
    Success,
    /// The agent failed.
    Failure,
    /// The agent cannot continue without operator input.
    NeedsClarification,
}

impl fmt::Display for AgentOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Failure => write!(f, "failure"),
            Self::NeedsClarification => write!(f, "needs_clarification"),
        }
    }
}

/// The outcome of one agent's execution.
///
/// `AgentResult` is immutable once created; the `with_*` builders consume
/// the value and return a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    /// Outcome tag.
    pub outcome: AgentOutcome,
    /// Payload produced by the agent. For clarification outcomes this is the
    /// clarification payload handed to the operator.
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Structured errors.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<AgentError>,
    /// Additional metadata.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl AgentResult {
    /// Creates a successful result with data.
    #[must_use]
    pub fn success(data: Map<String, Value>) -> Self {
        Self {
            outcome: AgentOutcome::Success,
            data,
            errors: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Creates a successful result with no data.
    #[must_use]
    pub fn success_empty() -> Self {
        Self::success(Map::new())
    }

    /// Creates a failed result with a single error.
    #[must_use]
    pub fn failure(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self::failure_with_errors(vec![AgentError::new(agent, message)])
    }

    /// Creates a failed result from a list of errors.
    #[must_use]
    pub fn failure_with_errors(errors: Vec<AgentError>) -> Self {
        Self {
            outcome: AgentOutcome::Failure,
            data: Map::new(),
            errors,
            metadata: Map::new(),
        }
    }

    /// Creates a result asking the operator for clarification.
    #[must_use]
    pub fn needs_clarification(payload: Map<String, Value>) -> Self {
        Self {
            outcome: AgentOutcome::NeedsClarification,
            data: payload,
            errors: Vec::new(),
            metadata: Map::new(),
        }
    }

    /// Adds a single data entry.
    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: Value) -> Self {
        self.data.insert(key.into(), value);
        self
    }

    /// Adds a single metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Appends an error record without changing the outcome.
    #[must_use]
    pub fn with_error(mut self, error: AgentError) -> Self {
        self.errors.push(error);
        self
    }

    /// Returns true only for [`AgentOutcome::Success`].
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.outcome == AgentOutcome::Success
    }

    /// Returns true for a hard failure.
    #[must_use]
    pub fn is_failure(&self) -> bool {
        self.outcome == AgentOutcome::Failure
    }

    /// Returns true when the agent needs operator input.
    #[must_use]
    pub fn is_partial(&self) -> bool {
        self.outcome == AgentOutcome::NeedsClarification
    }

    /// Gets a value from the data.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.get(key)
    }

    /// Gets a string value from the data.
    #[must_use]
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// Joins all error messages, or `None` when there are none.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }
        Some(
            self.errors
                .iter()
                .map(|e| e.message.as_str())
                .collect::<Vec<_>>()
                .join("; "),
        )
    }

    /// Converts the result to its JSON form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "success": self.is_success(),
            "status": self.outcome.to_string(),
            "data": self.data,
            "errors": self.errors,
            "metadata": self.metadata,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_success_result() {
        let result = AgentResult::success(data(json!({"title": "x"})));
        assert!(result.is_success());
        assert!(!result.is_failure());
        assert!(!result.is_partial());
        assert_eq!(result.get_str("title"), Some("x"));
        assert!(result.error_message().is_none());
    }

    #[test]
    fn test_failure_result() {
        let result = AgentResult::failure("AnalysisAgent", "LLM unavailable");
        assert!(result.is_failure());
        assert!(!result.is_success());
        assert_eq!(result.errors[0].agent, "AnalysisAgent");
        assert_eq!(result.error_message().as_deref(), Some("LLM unavailable"));
    }

    #[test]
    fn test_clarification_is_not_failure() {
        let result = AgentResult::needs_clarification(data(json!({"style_options": ["a"]})));
        assert!(result.is_partial());
        assert!(!result.is_success());
        assert!(!result.is_failure());
        assert_eq!(result.get("style_options"), Some(&json!(["a"])));
    }

    #[test]
    fn test_builders_do_not_change_outcome() {
        let result = AgentResult::success_empty()
            .with_data("k", json!(1))
            .with_metadata("model", json!("m"))
            .with_error(AgentError::new("X", "warning"));
        assert!(result.is_success());
        assert_eq!(result.data["k"], 1);
        assert_eq!(result.metadata["model"], "m");
        assert_eq!(result.errors.len(), 1);
    }

    #[test]
    fn test_to_json() {
        let json = AgentResult::failure("A", "boom").to_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["status"], "failure");
        assert_eq!(json["errors"][0]["message"], "boom");

        let json = AgentResult::needs_clarification(Map::new()).to_json();
        assert_eq!(json["status"], "needs_clarification");
    }

    #[test]
    fn test_error_message_joins() {
        let result = AgentResult::failure_with_errors(vec![
            AgentError::new("A", "first"),
            AgentError::new("A", "second"),
        ]);
        assert_eq!(result.error_message().as_deref(), Some("first; second"));
    }
}
