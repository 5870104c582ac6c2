//! Terminal record of a pipeline run.

use crate::agents::AgentRole;
use crate::context::PipelineContext;
use crate::core::AgentResult;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use std::fmt;

/// How a pipeline run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStatus {
    /// Every agent ran without a halting condition.
    Completed,
    /// A hard failure halted the run.
    Failed,
    /// An agent asked for operator input.
    NeedsClarification,
}

impl fmt::Display for PipelineStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::NeedsClarification => write!(f, "needs_clarification"),
        }
    }
}

/// One agent's entry in a run, in execution order.
#[derive(Debug, Clone)]
pub struct AgentRun {
    /// Agent name.
    pub name: String,
    /// What the agent contributes.
    pub role: AgentRole,
    /// The agent's result.
    pub result: AgentResult,
}

/// The outcome of a full pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineResult {
    status: PipelineStatus,
    runs: Vec<AgentRun>,
    error: Option<String>,
    clarification_data: Option<Map<String, Value>>,
    duration_ms: u64,
    context: PipelineContext,
}

impl PipelineResult {
    /// A run that reached the end without a halting condition.
    #[must_use]
    pub fn completed(runs: Vec<AgentRun>, duration_ms: u64, context: PipelineContext) -> Self {
        Self {
            status: PipelineStatus::Completed,
            runs,
            error: None,
            clarification_data: None,
            duration_ms,
            context,
        }
    }

    /// A run halted by a failure.
    #[must_use]
    pub fn failed(
        runs: Vec<AgentRun>,
        error: impl Into<String>,
        duration_ms: u64,
        context: PipelineContext,
    ) -> Self {
        Self {
            status: PipelineStatus::Failed,
            runs,
            error: Some(error.into()),
            clarification_data: None,
            duration_ms,
            context,
        }
    }

    /// A run halted for clarification.
    #[must_use]
    pub fn needs_clarification(
        runs: Vec<AgentRun>,
        payload: Map<String, Value>,
        duration_ms: u64,
        context: PipelineContext,
    ) -> Self {
        Self {
            status: PipelineStatus::NeedsClarification,
            runs,
            error: None,
            clarification_data: Some(payload),
            duration_ms,
            context,
        }
    }

    /// How the run ended.
    #[must_use]
    pub fn status(&self) -> PipelineStatus {
        self.status
    }

    /// True only for a completed run.
    #[must_use]
    pub fn success(&self) -> bool {
        self.status == PipelineStatus::Completed
    }

    /// True if the run halted for clarification.
    #[must_use]
    pub fn needs_clarification_flag(&self) -> bool {
        self.status == PipelineStatus::NeedsClarification
    }

    /// The triggering error, if any.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// The clarification payload, if any.
    #[must_use]
    pub fn clarification_data(&self) -> Option<&Map<String, Value>> {
        self.clarification_data.as_ref()
    }

    /// Wall-clock duration of the run.
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    /// The final context.
    #[must_use]
    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    /// Agent entries in execution order.
    #[must_use]
    pub fn runs(&self) -> &[AgentRun] {
        &self.runs
    }

    /// Names of the agents that produced a result, in execution order.
    #[must_use]
    pub fn agent_names(&self) -> Vec<&str> {
        self.runs.iter().map(|r| r.name.as_str()).collect()
    }

    /// The result of one agent, if it ran.
    #[must_use]
    pub fn agent_result(&self, name: &str) -> Option<&AgentResult> {
        self.runs
            .iter()
            .find(|r| r.name == name)
            .map(|r| &r.result)
    }

    /// Number of agent results.
    #[must_use]
    pub fn len(&self) -> usize {
        self.runs.len()
    }

    /// True if any agent failed, including failures tolerated with
    /// stop-on-failure disabled.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.runs.iter().any(|r| r.result.is_failure())
    }

    /// True if no agent produced a result.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.runs.is_empty()
    }

    fn successful(&self, role: AgentRole) -> Option<&AgentResult> {
        self.runs
            .iter()
            .find(|r| r.role == role && r.result.is_success())
            .map(|r| &r.result)
    }

    /// The analysis output if present, else the styled or original text
    /// from the learning agent.
    #[must_use]
    pub fn final_analysis(&self) -> Option<Value> {
        if let Some(analysis) = self.successful(AgentRole::Analysis) {
            if !analysis.data.is_empty() {
                return Some(Value::Object(analysis.data.clone()));
            }
        }
        let learning = self.successful(AgentRole::Learning)?;
        learning
            .get("styled_analysis")
            .or_else(|| learning.get("original_analysis"))
            .cloned()
    }

    /// Converts the result to its JSON form.
    #[must_use]
    pub fn to_json(&self) -> Value {
        let results: Map<String, Value> = self
            .runs
            .iter()
            .map(|r| (r.name.clone(), r.result.to_json()))
            .collect();
        json!({
            "success": self.success(),
            "status": self.status.to_string(),
            "error": self.error,
            "needs_clarification": self.needs_clarification_flag(),
            "clarification_data": self.clarification_data,
            "duration_ms": self.duration_ms,
            "agents": self.agent_names(),
            "results": results,
            "final_analysis": self.final_analysis(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(name: &str, role: AgentRole, result: AgentResult) -> AgentRun {
        AgentRun {
            name: name.to_string(),
            role,
            result,
        }
    }

    fn data(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => Map::new(),
        }
    }

    fn ctx() -> PipelineContext {
        PipelineContext::new("https://example.com/a")
    }

    #[test]
    fn test_final_analysis_prefers_analysis_agent() {
        let result = PipelineResult::completed(
            vec![
                run(
                    "AnalysisAgent",
                    AgentRole::Analysis,
                    AgentResult::success(data(json!({"translation_summary": "S"}))),
                ),
                run(
                    "LearningAgent",
                    AgentRole::Learning,
                    AgentResult::success(data(json!({"styled_analysis": "styled"}))),
                ),
            ],
            5,
            ctx(),
        );

        assert!(result.success());
        assert!(!result.has_failures());

        assert_eq!(result.final_analysis(), Some(json!({"translation_summary": "S"})));
    }

    #[test]
    fn test_final_analysis_falls_back_to_learning() {
        let result = PipelineResult::completed(
            vec![
                run("AnalysisAgent", AgentRole::Analysis, AgentResult::failure("AnalysisAgent", "x")),
                run(
                    "LearningAgent",
                    AgentRole::Learning,
                    AgentResult::success(data(json!({"original_analysis": "orig"}))),
                ),
            ],
            5,
            ctx(),
        );

        assert_eq!(result.final_analysis(), Some(json!("orig")));
        assert!(result.has_failures());
    }

    #[test]
    fn test_to_json_shape_and_order() {
        let result = PipelineResult::needs_clarification(
            vec![
                run("ValidationAgent", AgentRole::Validation, AgentResult::success_empty()),
                run(
                    "LearningAgent",
                    AgentRole::Learning,
                    AgentResult::needs_clarification(data(json!({"style_options": ["a"]}))),
                ),
            ],
            data(json!({"style_options": ["a"]})),
            12,
            ctx(),
        );

        let json = result.to_json();
        assert_eq!(json["success"], false);
        assert_eq!(json["needs_clarification"], true);
        assert_eq!(json["clarification_data"], json!({"style_options": ["a"]}));
        assert_eq!(json["duration_ms"], 12);
        assert_eq!(json["agents"], json!(["ValidationAgent", "LearningAgent"]));
        let keys: Vec<_> = json["results"].as_object().unwrap().keys().cloned().collect();
        assert_eq!(keys, vec!["ValidationAgent", "LearningAgent"]);
        assert_eq!(json["final_analysis"], Value::Null);
    }

    #[test]
    fn test_agent_result_lookup() {
        let result = PipelineResult::failed(
            vec![run("ValidationAgent", AgentRole::Validation, AgentResult::failure("ValidationAgent", "bad"))],
            "ValidationAgent: bad",
            1,
            ctx(),
        );

        assert!(result.agent_result("ValidationAgent").unwrap().is_failure());
        assert!(result.agent_result("AnalysisAgent").is_none());
        assert_eq!(result.error(), Some("ValidationAgent: bad"));
        assert_eq!(result.len(), 1);
    }
}
