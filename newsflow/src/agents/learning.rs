//! Restyles the analysis in a house voice, asking for a style when unsure.

use super::{Agent, AgentBase, AgentConfig, AgentRole, PromptTemplate, LEARNING_AGENT};
use crate::context::PipelineContext;
use crate::core::AgentResult;
use crate::errors::{NewsflowError, Result};
use crate::events::SharedEventSink;
use crate::services::ChatService;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const SYSTEM_PROMPT: &str = "You rewrite news analyses in a publication's house style. Reply \
with a JSON object: {\"styled_text\": string, \"confidence\": number between 0 and 1 for how \
well the requested style fits, \"style_options\": array of short style names an editor could \
choose from}.";

const USER_PROMPT: &str = "{{analysis}}\n\nRequested style: {{style}}\n\nStyle examples:\n{{examples}}";

/// Context metadata key holding an operator's style choice.
pub const SELECTED_STYLE_KEY: &str = "selected_style";

#[derive(Debug, Deserialize)]
struct StyledReply {
    styled_text: String,
    confidence: f64,
    #[serde(default)]
    style_options: Vec<String>,
}

/// Rewrites the analysis in a learned style.
///
/// When the model's confidence is below `extra.confidence_threshold`
/// (default 0.6) and the operator has not picked a style, the agent returns
/// a clarification result listing style options instead of guessing.
pub struct LearningAgent {
    base: AgentBase,
    chat: Arc<dyn ChatService>,
}

impl fmt::Debug for LearningAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LearningAgent")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl LearningAgent {
    /// Default configuration.
    #[must_use]
    pub fn default_config() -> AgentConfig {
        AgentConfig {
            timeout_secs: 45,
            max_attempts: 2,
            temperature: 0.6,
            max_tokens: 1200,
            ..AgentConfig::default()
        }
        .with_extra("confidence_threshold", json!(0.6))
        .with_extra("style_name", json!("house"))
        .with_extra("style_examples", json!([]))
    }

    /// Creates the agent.
    #[must_use]
    pub fn new(config: AgentConfig, chat: Arc<dyn ChatService>, events: SharedEventSink) -> Self {
        Self {
            base: AgentBase::new(LEARNING_AGENT, config, events),
            chat,
        }
    }

    /// Reads prompt overrides from `dir`.
    #[must_use]
    pub fn with_prompts_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.base = self.base.with_prompts_dir(dir);
        self
    }
}

fn parse_styled_reply(reply: &str) -> Result<StyledReply> {
    let start = reply.find('{');
    let end = reply.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &reply[s..=e],
        _ => return Err(NewsflowError::Parse("no JSON object in reply".to_string())),
    };
    let parsed: StyledReply = serde_json::from_str(json)
        .map_err(|e| NewsflowError::Parse(format!("invalid style JSON: {e}")))?;
    if parsed.styled_text.trim().is_empty() {
        return Err(NewsflowError::Parse("styled_text is empty".to_string()));
    }
    Ok(parsed)
}

#[async_trait]
impl Agent for LearningAgent {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn role(&self) -> AgentRole {
        AgentRole::Learning
    }

    fn config(&self) -> &AgentConfig {
        self.base.config()
    }

    async fn initialize(&self) -> Result<()> {
        self.base
            .initialize(PromptTemplate::new(SYSTEM_PROMPT, USER_PROMPT))
            .await
    }

    fn is_ready(&self) -> bool {
        self.base.is_initialized() && self.chat.is_configured()
    }

    fn validate(&self, ctx: &PipelineContext) -> bool {
        ctx.analysis_result()
            .is_some_and(|a| !a.summary_text().trim().is_empty())
    }

    async fn process(&self, ctx: &PipelineContext) -> Result<AgentResult> {
        if !self.validate(ctx) {
            return Ok(self.base.failure("No analysis available for style learning"));
        }
        let original = ctx
            .analysis_result()
            .map(|a| a.summary_text())
            .unwrap_or_default();
        let selected = ctx
            .get_metadata(SELECTED_STYLE_KEY)
            .and_then(Value::as_str)
            .map(str::to_string);

        let examples = self.config().extra_str_list("style_examples");
        let examples = if examples.is_empty() {
            "(none)".to_string()
        } else {
            examples.join("\n---\n")
        };
        let style = selected
            .clone()
            .or_else(|| self.config().extra_str("style_name").map(str::to_string))
            .unwrap_or_else(|| "house".to_string());

        let prompt = self.base.prompt()?;
        let user = prompt.render_user(&[
            ("analysis", &original),
            ("style", &style),
            ("examples", &examples),
        ]);
        let options = self.base.chat_options("learning");

        let (system, user, options) = (prompt.system(), user.as_str(), &options);
        let policy = self.config().retry_policy()?;
        let reply = match policy
            .run_if(
                "style",
                || async move {
                    self.chat
                        .chat(system, user, options)
                        .await
                        .map_err(NewsflowError::from)
                },
                NewsflowError::is_transient,
            )
            .await
        {
            Ok(reply) => reply,
            Err(e) => return Ok(self.base.failure(format!("Style request failed: {e}"))),
        };
        let styled = match parse_styled_reply(&reply) {
            Ok(styled) => styled,
            Err(e) => return Ok(self.base.failure(format!("Could not parse styled text: {e}"))),
        };

        let threshold = self.config().extra_f64("confidence_threshold", 0.6);
        if selected.is_none() && styled.confidence < threshold {
            info!(
                agent = self.name(),
                confidence = styled.confidence,
                threshold,
                "Style confidence low, asking for a choice"
            );
            self.base
                .emit(
                    "learning.low_confidence",
                    json!({ "confidence": styled.confidence, "threshold": threshold }),
                )
                .await;

            let mut payload = Map::new();
            payload.insert("style_options".to_string(), json!(styled.style_options));
            payload.insert("confidence".to_string(), json!(styled.confidence));
            payload.insert(
                "reason".to_string(),
                json!(format!(
                    "style confidence {:.2} is below {threshold:.2}; choose a style and resume",
                    styled.confidence
                )),
            );
            payload.insert("original_analysis".to_string(), json!(original));
            return Ok(AgentResult::needs_clarification(payload));
        }

        let mut data = Map::new();
        data.insert("styled_analysis".to_string(), json!(styled.styled_text));
        data.insert("original_analysis".to_string(), json!(original));
        data.insert("confidence".to_string(), json!(styled.confidence));
        data.insert("style".to_string(), json!(style));
        Ok(AgentResult::success(data))
    }
}
