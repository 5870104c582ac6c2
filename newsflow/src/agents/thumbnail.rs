//! Thumbnail generation with a fallback to the article's own image.

use super::{Agent, AgentBase, AgentConfig, AgentRole, PromptTemplate, THUMBNAIL_AGENT};
use crate::context::PipelineContext;
use crate::core::AgentResult;
use crate::errors::{NewsflowError, Result};
use crate::events::SharedEventSink;
use crate::services::{canned, ChatService};
use async_trait::async_trait;
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

const SYSTEM_PROMPT: &str = "You write prompts for an image generator that produces news \
thumbnails. Reply with a single prompt: one scene, no text, no logos, no real people's faces.";

const USER_PROMPT: &str = "Headline: {{title}}\n\nSummary: {{summary}}\n\n\
Write the image prompt.";

const DEFAULT_BASE_URL: &str = "https://thumbnails.newsflow.local";

/// Builds an image prompt for the article and derives a thumbnail URL.
///
/// If the chat call fails the agent still succeeds, keeping the article's
/// original image (`source = "original"`).
pub struct ThumbnailAgent {
    base: AgentBase,
    chat: Arc<dyn ChatService>,
}

impl fmt::Debug for ThumbnailAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThumbnailAgent")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl ThumbnailAgent {
    /// Default configuration.
    #[must_use]
    pub fn default_config() -> AgentConfig {
        AgentConfig {
            max_attempts: 2,
            temperature: 0.7,
            max_tokens: 200,
            ..AgentConfig::default()
        }
        .with_extra("thumbnail_base_url", json!(DEFAULT_BASE_URL))
    }

    /// Creates the agent.
    #[must_use]
    pub fn new(config: AgentConfig, chat: Arc<dyn ChatService>, events: SharedEventSink) -> Self {
        Self {
            base: AgentBase::new(THUMBNAIL_AGENT, config, events),
            chat,
        }
    }

    /// Reads prompt overrides from `dir`.
    #[must_use]
    pub fn with_prompts_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.base = self.base.with_prompts_dir(dir);
        self
    }

    fn thumbnail_url(&self, article_url: &str) -> String {
        let base = self
            .config()
            .extra_str("thumbnail_base_url")
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/');
        format!("{base}/{}.png", canned::digest(article_url, 16))
    }
}

#[async_trait]
impl Agent for ThumbnailAgent {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn role(&self) -> AgentRole {
        AgentRole::Thumbnail
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
        ctx.article_data().is_some()
    }

    async fn process(&self, ctx: &PipelineContext) -> Result<AgentResult> {
        let Some(article) = ctx.article_data() else {
            return Ok(self
                .base
                .failure("No article data available for thumbnail generation"));
        };

        let summary = article
            .description
            .clone()
            .unwrap_or_else(|| article.content.chars().take(500).collect());
        let prompt = self.base.prompt()?;
        let user = prompt.render_user(&[("title", &article.title), ("summary", &summary)]);
        let options = self.base.chat_options("thumbnail");
        let original = article.image_url.clone();

        let (system, user, options) = (prompt.system(), user.as_str(), &options);
        let policy = self.config().retry_policy()?;
        let reply = policy
            .run_if(
                "thumbnail_prompt",
                || async move {
                    self.chat
                        .chat(system, user, options)
                        .await
                        .map_err(NewsflowError::from)
                },
                NewsflowError::is_transient,
            )
            .await;

        match reply {
            Ok(image_prompt) => {
                let thumbnail_url = self.thumbnail_url(&article.url);
                info!(agent = self.name(), thumbnail_url = %thumbnail_url, "Thumbnail generated");
                let updated = article
                    .clone()
                    .with_image_url(thumbnail_url.clone())
                    .with_metadata("original_image_url", json!(original));

                let mut data = Map::new();
                data.insert("article".to_string(), updated.to_value());
                data.insert("thumbnail_url".to_string(), json!(thumbnail_url));
                data.insert("original_image_url".to_string(), json!(original));
                data.insert("image_prompt".to_string(), json!(image_prompt.trim()));
                data.insert("source".to_string(), json!("generated"));
                Ok(AgentResult::success(data))
            }
            Err(e) => {
                self.base
                    .emit(
                        "thumbnail.fallback",
                        json!({ "error": e.to_string(), "original_image_url": original }),
                    )
                    .await;

                let mut data = Map::new();
                data.insert("article".to_string(), article.to_value());
                data.insert("thumbnail_url".to_string(), json!(original));
                data.insert("original_image_url".to_string(), json!(original));
                data.insert("image_prompt".to_string(), Value::Null);
                data.insert("source".to_string(), json!("original"));
                Ok(AgentResult::success(data).with_metadata("fallback_reason", json!(e.to_string())))
            }
        }
    }
}
