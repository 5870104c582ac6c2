//! State and helpers shared by the built-in agents.

use super::{AgentConfig, PromptTemplate};
use crate::core::AgentResult;
use crate::errors::{NewsflowError, Result};
use crate::events::SharedEventSink;
use crate::services::ChatOptions;
use serde_json::{json, Value};
use std::fmt;
use std::path::PathBuf;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

/// Name, configuration, prompt and event sink of one agent.
pub struct AgentBase {
    name: &'static str,
    config: AgentConfig,
    events: SharedEventSink,
    prompts_dir: Option<PathBuf>,
    prompt: OnceCell<PromptTemplate>,
}

impl fmt::Debug for AgentBase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AgentBase")
            .field("name", &self.name)
            .field("config", &self.config)
            .field("prompts_dir", &self.prompts_dir)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

impl AgentBase {
    /// Creates the shared state.
    #[must_use]
    pub fn new(name: &'static str, config: AgentConfig, events: SharedEventSink) -> Self {
        Self {
            name,
            config,
            events,
            prompts_dir: None,
            prompt: OnceCell::new(),
        }
    }

    /// Sets the directory prompt overrides are read from.
    #[must_use]
    pub fn with_prompts_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.prompts_dir = dir;
        self
    }

    /// The agent name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// The effective configuration.
    #[must_use]
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// Loads the prompt once. Concurrent and repeated calls share the result.
    pub async fn initialize(&self, default: PromptTemplate) -> Result<()> {
        self.prompt
            .get_or_try_init(|| async move {
                debug!(agent = self.name, "Initializing agent");
                PromptTemplate::load(self.prompts_dir.as_deref(), self.name, default)
                    .await
                    .map_err(|e| NewsflowError::Initialization {
                        agent: self.name.to_string(),
                        message: e.to_string(),
                    })
            })
            .await?;
        Ok(())
    }

    /// Returns true once the prompt is loaded.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.prompt.initialized()
    }

    /// The loaded prompt.
    pub fn prompt(&self) -> Result<&PromptTemplate> {
        self.prompt.get().ok_or_else(|| NewsflowError::Initialization {
            agent: self.name.to_string(),
            message: "agent used before initialize()".to_string(),
        })
    }

    /// Chat options carrying this agent's model settings.
    #[must_use]
    pub fn chat_options(&self, tag: &str) -> ChatOptions {
        let options = ChatOptions::tagged(tag)
            .with_temperature(self.config.temperature)
            .with_max_tokens(self.config.max_tokens);
        match self.config.model {
            Some(ref model) => options.with_model(model.clone()),
            None => options,
        }
    }

    /// A failure result attributed to this agent.
    #[must_use]
    pub fn failure(&self, message: impl Into<String>) -> AgentResult {
        let message = message.into();
        warn!(agent = self.name, error = %message, "Agent failed");
        AgentResult::failure(self.name, message)
    }

    /// Emits an event tagged with the agent name.
    pub async fn emit(&self, event_type: &str, data: Value) {
        let payload = match data {
            Value::Object(mut map) => {
                map.insert("agent".to_string(), json!(self.name));
                Value::Object(map)
            }
            Value::Null => json!({ "agent": self.name }),
            other => json!({ "agent": self.name, "data": other }),
        };
        self.events.emit(event_type, Some(payload)).await;
    }
}
