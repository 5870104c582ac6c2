//! Interpretation of the analysis against previously seen coverage.

use super::{Agent, AgentBase, AgentConfig, AgentRole, PromptTemplate, INTERPRET_AGENT};
use crate::context::PipelineContext;
use crate::core::AgentResult;
use crate::errors::{NewsflowError, Result};
use crate::events::SharedEventSink;
use crate::services::{ChatService, EmbeddingService, SearchHit, VectorSearch};
use async_trait::async_trait;
use serde_json::{json, Map};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

const SYSTEM_PROMPT: &str = "You help readers place a news story in context. Using the \
related coverage provided, explain in a short paragraph what this story means and how it \
connects to earlier events. If no related coverage is given, interpret the story on its own.";

const USER_PROMPT: &str = "Story:\n{{analysis}}\n\nRelated coverage:\n{{related}}";

/// Retrieves similar stories and asks for an interpretation in their light.
///
/// After a successful run the story is added to the index so later runs can
/// find it.
pub struct InterpretAgent {
    base: AgentBase,
    chat: Arc<dyn ChatService>,
    embeddings: Arc<dyn EmbeddingService>,
    index: Arc<dyn VectorSearch>,
}

impl fmt::Debug for InterpretAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpretAgent")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl InterpretAgent {
    /// Default configuration.
    #[must_use]
    pub fn default_config() -> AgentConfig {
        AgentConfig {
            max_attempts: 2,
            temperature: 0.5,
            max_tokens: 800,
            ..AgentConfig::default()
        }
        .with_extra("top_k", json!(3))
        .with_extra("min_score", json!(0.0))
        .with_extra("index_results", json!(true))
    }

    /// Creates the agent.
    #[must_use]
    pub fn new(
        config: AgentConfig,
        chat: Arc<dyn ChatService>,
        embeddings: Arc<dyn EmbeddingService>,
        index: Arc<dyn VectorSearch>,
        events: SharedEventSink,
    ) -> Self {
        Self {
            base: AgentBase::new(INTERPRET_AGENT, config, events),
            chat,
            embeddings,
            index,
        }
    }

    /// Reads prompt overrides from `dir`.
    #[must_use]
    pub fn with_prompts_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.base = self.base.with_prompts_dir(dir);
        self
    }

    fn story_text(ctx: &PipelineContext) -> Option<String> {
        if let Some(analysis) = ctx.analysis_result() {
            let text = analysis.summary_text();
            if !text.trim().is_empty() {
                return Some(text);
            }
        }
        ctx.article_data().map(|a| {
            let excerpt: String = a.content.chars().take(1000).collect();
            format!("{}\n{excerpt}", a.title)
        })
    }

    /// Searches the index, skipping the story's own entry from earlier runs.
    async fn retrieve(&self, embedding: &[f32], own_id: &str) -> Result<Vec<SearchHit>> {
        let top_k = self.config().extra_usize("top_k", 3);
        #[allow(clippy::cast_possible_truncation)]
        let min_score = self.config().extra_f64("min_score", 0.0) as f32;
        let hits = self.index.search(embedding, top_k.saturating_add(1)).await?;
        Ok(hits
            .into_iter()
            .filter(|h| h.source_id != own_id && h.score >= min_score)
            .take(top_k)
            .collect())
    }
}

#[async_trait]
impl Agent for InterpretAgent {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn role(&self) -> AgentRole {
        AgentRole::Interpret
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
        Self::story_text(ctx).is_some()
    }

    async fn process(&self, ctx: &PipelineContext) -> Result<AgentResult> {
        let Some(story) = Self::story_text(ctx) else {
            return Ok(self.base.failure("No analysis or article available to interpret"));
        };
        let policy = self.config().retry_policy()?;
        let text = story.as_str();

        let embedding = match policy
            .run_if(
                "embedding",
                || async move {
                    self.embeddings
                        .create_embedding(text)
                        .await
                        .map_err(NewsflowError::from)
                },
                NewsflowError::is_transient,
            )
            .await
        {
            Ok(embedding) => embedding,
            Err(e) => return Ok(self.base.failure(format!("Embedding failed: {e}"))),
        };

        let hits = match self.retrieve(&embedding, ctx.url()).await {
            Ok(hits) => hits,
            Err(e) => return Ok(self.base.failure(format!("Similarity search failed: {e}"))),
        };
        debug!(agent = self.name(), hits = hits.len(), "Retrieved related coverage");

        let related = if hits.is_empty() {
            "(none)".to_string()
        } else {
            hits.iter()
                .map(|h| format!("- [{:.2}] {}", h.score, h.text))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let prompt = self.base.prompt()?;
        let user = prompt.render_user(&[("analysis", text), ("related", &related)]);
        let options = self.base.chat_options("interpret");

        let (system, user, options) = (prompt.system(), user.as_str(), &options);
        let interpretation = match policy
            .run_if(
                "interpret",
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
            Ok(reply) => reply.trim().to_string(),
            Err(e) => return Ok(self.base.failure(format!("Interpretation failed: {e}"))),
        };

        if self.config().extra_bool("index_results", true) {
            if let Err(e) = self.index.upsert(ctx.url(), text, embedding).await {
                warn!(agent = self.name(), error = %e, "Could not index story");
            }
        }

        let mut data = Map::new();
        data.insert("interpretation".to_string(), json!(interpretation));
        data.insert("similar_items".to_string(), json!(hits));
        data.insert("enriched".to_string(), json!(!hits.is_empty()));
        Ok(AgentResult::success(data))
    }
}
