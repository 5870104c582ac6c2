//! Agent trait and the built-in news analysis agents.
//!
//! Agents are the units of work in a newsflow pipeline. Each one reads the
//! context it is handed, calls its injected services, and reports a tri-state
//! [`AgentResult`]. Agents never mutate the context; the sequencer derives the
//! next context from their result.

mod analysis;
mod base;
mod config;
mod interpret;
mod learning;
mod prompt;
mod thumbnail;
mod validation;

pub use analysis::{parse_analysis_reply, AnalysisAgent};
pub use base::AgentBase;
pub use config::{AgentConfig, AgentConfigOverrides};
pub use interpret::InterpretAgent;
pub use learning::{LearningAgent, SELECTED_STYLE_KEY};
pub use prompt::PromptTemplate;
pub use thumbnail::ThumbnailAgent;
pub use validation::ValidationAgent;

use crate::context::PipelineContext;
use crate::core::AgentResult;
use crate::errors::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt::Debug;

/// Name of the URL validation and extraction agent.
pub const VALIDATION_AGENT: &str = "ValidationAgent";
/// Name of the thumbnail agent.
pub const THUMBNAIL_AGENT: &str = "ThumbnailAgent";
/// Name of the analysis agent.
pub const ANALYSIS_AGENT: &str = "AnalysisAgent";
/// Name of the interpretation agent.
pub const INTERPRET_AGENT: &str = "InterpretAgent";
/// Name of the style learning agent.
pub const LEARNING_AGENT: &str = "LearningAgent";

/// What an agent contributes, used by the sequencer to merge its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentRole {
    /// Validates the URL and extracts the article.
    Validation,
    /// Produces a thumbnail image.
    Thumbnail,
    /// Produces the structured analysis.
    Analysis,
    /// Enriches the analysis with retrieved context.
    Interpret,
    /// Restyles the analysis.
    Learning,
    /// Anything else.
    #[default]
    Custom,
}

/// Trait for pipeline agents.
#[async_trait]
pub trait Agent: Send + Sync + Debug {
    /// Returns the unique name of the agent.
    fn name(&self) -> &str;

    /// Returns what the agent contributes.
    fn role(&self) -> AgentRole {
        AgentRole::Custom
    }

    /// Returns the effective configuration.
    fn config(&self) -> &AgentConfig;

    /// Performs one-time setup such as loading prompts.
    ///
    /// Calling this again after success is a no-op.
    async fn initialize(&self) -> Result<()>;

    /// Returns true once initialized and able to call its services.
    fn is_ready(&self) -> bool;

    /// Returns true if the context carries what [`Agent::process`] needs.
    fn validate(&self, ctx: &PipelineContext) -> bool;

    /// Runs the agent against a context.
    ///
    /// Expected failures are reported as a failure [`AgentResult`]; an `Err`
    /// means the agent hit something it could not classify.
    async fn process(&self, ctx: &PipelineContext) -> Result<AgentResult>;

    /// Returns the effective configuration as JSON.
    fn config_map(&self) -> Map<String, Value> {
        self.config().to_map()
    }
}
