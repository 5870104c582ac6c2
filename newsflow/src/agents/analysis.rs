//! Structured analysis of the article, with optional narration audio.

use super::{Agent, AgentBase, AgentConfig, AgentRole, PromptTemplate, ANALYSIS_AGENT};
use crate::context::PipelineContext;
use crate::core::AgentResult;
use crate::errors::{NewsflowError, Result};
use crate::events::SharedEventSink;
use crate::services::{ChatService, TtsOptions, TtsService};
use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Map, Value};
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use tracing::{info, warn};

static CODE_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:json|JSON)?\s*(.*?)\s*```").expect("static regex is valid")
});

const MAX_CONTENT_CHARS: usize = 12_000;

const SYSTEM_PROMPT: &str = "You are a senior news analyst. Read the article and reply with a \
single JSON object, no prose, with these keys: \"title\" (string), \"translation_summary\" \
(string, written in {{language}}), \"key_points\" (array of strings), \"critical_analysis\" \
(object with \"why_important\" and \"future_prediction\"), \"narration\" (a short script to be \
read aloud) and \"content_summary\" (one sentence).";

const USER_PROMPT: &str = "Title: {{title}}\nSource: {{url}}\n\n{{content}}";

/// Parses a chat reply into analysis data.
///
/// Accepts a bare JSON object, one wrapped in a Markdown code fence, or one
/// embedded in surrounding prose. The object must carry
/// `translation_summary` or `key_points`.
pub fn parse_analysis_reply(reply: &str) -> Result<Map<String, Value>> {
    let candidate = match CODE_FENCE.captures(reply).and_then(|c| c.get(1)) {
        Some(inner) => inner.as_str(),
        None => match (reply.find('{'), reply.rfind('}')) {
            (Some(start), Some(end)) if start < end => &reply[start..=end],
            _ => return Err(NewsflowError::Parse("no JSON object in reply".to_string())),
        },
    };

    let Value::Object(mut data) = serde_json::from_str::<Value>(candidate)
        .map_err(|e| NewsflowError::Parse(format!("invalid analysis JSON: {e}")))?
    else {
        return Err(NewsflowError::Parse("analysis reply is not an object".to_string()));
    };

    if !data.contains_key("translation_summary") && !data.contains_key("key_points") {
        return Err(NewsflowError::Parse(
            "analysis has neither translation_summary nor key_points".to_string(),
        ));
    }

    let key_points: Vec<Value> = match data.remove("key_points") {
        Some(Value::Array(points)) => points
            .into_iter()
            .map(|p| match p {
                Value::String(s) => Value::String(s),
                other => Value::String(other.to_string()),
            })
            .collect(),
        Some(Value::String(single)) => vec![Value::String(single)],
        _ => Vec::new(),
    };
    data.insert("key_points".to_string(), Value::Array(key_points));
    let summary = match data.remove("translation_summary") {
        Some(Value::String(summary)) => summary,
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    };
    data.insert("translation_summary".to_string(), Value::String(summary));
    if !data.get("critical_analysis").is_some_and(Value::is_object) {
        data.insert("critical_analysis".to_string(), json!({}));
    }
    Ok(data)
}

/// Produces the structured analysis and, when enabled, narration audio.
///
/// Settings under `extra`:
/// - `min_text_length` (default 100)
/// - `enable_tts` (default true); speech failures are logged, not fatal
/// - `target_language` (default "English")
/// - `tts_voice`
pub struct AnalysisAgent {
    base: AgentBase,
    chat: Arc<dyn ChatService>,
    tts: Arc<dyn TtsService>,
}

impl fmt::Debug for AnalysisAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnalysisAgent")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

impl AnalysisAgent {
    /// Default configuration.
    #[must_use]
    pub fn default_config() -> AgentConfig {
        AgentConfig {
            timeout_secs: 60,
            max_tokens: 2000,
            ..AgentConfig::default()
        }
        .with_extra("min_text_length", json!(100))
        .with_extra("enable_tts", json!(true))
        .with_extra("target_language", json!("English"))
    }

    /// Creates the agent.
    #[must_use]
    pub fn new(
        config: AgentConfig,
        chat: Arc<dyn ChatService>,
        tts: Arc<dyn TtsService>,
        events: SharedEventSink,
    ) -> Self {
        Self {
            base: AgentBase::new(ANALYSIS_AGENT, config, events),
            chat,
            tts,
        }
    }

    /// Reads prompt overrides from `dir`.
    #[must_use]
    pub fn with_prompts_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.base = self.base.with_prompts_dir(dir);
        self
    }

    fn min_text_length(&self) -> usize {
        self.config().extra_usize("min_text_length", 100)
    }

    async fn narrate(&self, data: &mut Map<String, Value>) -> Option<String> {
        let text = ["narration", "translation_summary"]
            .iter()
            .filter_map(|key| data.get(*key).and_then(Value::as_str))
            .find(|t| !t.trim().is_empty())?
            .to_string();

        let options = TtsOptions {
            voice: self.config().extra_str("tts_voice").map(str::to_string),
            ..TtsOptions::default()
        };
        let (text, options) = (text.as_str(), &options);
        let policy = match self.config().retry_policy() {
            Ok(policy) => policy,
            Err(e) => return Some(e.to_string()),
        };
        let spoken = policy
            .run_if(
                "tts",
                || async move {
                    self.tts
                        .text_to_speech(text, options)
                        .await
                        .map_err(NewsflowError::from)
                },
                NewsflowError::is_transient,
            )
            .await;

        match spoken {
            Ok(audio_url) => {
                data.insert("audio_url".to_string(), json!(audio_url));
                None
            }
            Err(e) => {
                warn!(agent = self.name(), error = %e, "Narration audio failed");
                self.base
                    .emit("analysis.tts_failed", json!({ "error": e.to_string() }))
                    .await;
                Some(e.to_string())
            }
        }
    }
}

#[async_trait]
impl Agent for AnalysisAgent {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn role(&self) -> AgentRole {
        AgentRole::Analysis
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
        ctx.article_data()
            .is_some_and(|a| a.content_length() >= self.min_text_length())
    }

    async fn process(&self, ctx: &PipelineContext) -> Result<AgentResult> {
        let Some(article) = ctx.article_data() else {
            return Ok(self.base.failure("No article data available for analysis"));
        };
        let length = article.content_length();
        if length < self.min_text_length() {
            return Ok(self.base.failure(format!(
                "Article content too short for analysis: {length} characters (minimum {})",
                self.min_text_length()
            )));
        }

        let prompt = self.base.prompt()?;
        let language = self
            .config()
            .extra_str("target_language")
            .unwrap_or("English");
        let system = prompt.system().replace("{{language}}", language);
        let content: String = article.content.chars().take(MAX_CONTENT_CHARS).collect();
        let user = prompt.render_user(&[
            ("title", &article.title),
            ("url", &article.url),
            ("content", &content),
        ]);
        let options = self.base.chat_options("analysis");

        let (system, user, options) = (system.as_str(), user.as_str(), &options);
        let policy = self.config().retry_policy()?;
        let reply = policy
            .run_if(
                "analysis",
                || async move {
                    self.chat
                        .chat(system, user, options)
                        .await
                        .map_err(NewsflowError::from)
                },
                NewsflowError::is_transient,
            )
            .await;
        let reply = match reply {
            Ok(reply) => reply,
            Err(e) => return Ok(self.base.failure(format!("Analysis request failed: {e}"))),
        };

        let mut data = match parse_analysis_reply(&reply) {
            Ok(data) => data,
            Err(e) => return Ok(self.base.failure(format!("Could not parse analysis: {e}"))),
        };
        data.entry("title")
            .or_insert_with(|| Value::String(article.title.clone()));

        let tts_error = if self.config().extra_bool("enable_tts", true) {
            self.narrate(&mut data).await
        } else {
            None
        };

        info!(
            agent = self.name(),
            key_points = data["key_points"].as_array().map_or(0, Vec::len),
            audio = data.contains_key("audio_url"),
            "Analysis complete"
        );

        let mut result = AgentResult::success(data);
        if let Some(model) = options.model.as_ref() {
            result = result.with_metadata("model", json!(model));
        }
        if let Some(e) = tts_error {
            result = result.with_metadata("tts_error", json!(e));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{AnalysisResult, ArticleData};
    use crate::events::{default_sink, CollectingEventSink};
    use crate::services::Services;
    use crate::testing::{FailingTtsService, MockChatService};
    use pretty_assertions::assert_eq;

    const REPLY: &str = r#"{"title":"T","translation_summary":"Summary.","key_points":["a","b"],"critical_analysis":{"why_important":"x","future_prediction":"y"},"narration":"Listen."}"#;

    fn context(content: &str) -> PipelineContext {
        PipelineContext::new("https://example.com/a")
            .with_article_data(ArticleData::new("https://example.com/a", "Headline", content))
    }

    fn mock_agent(sink: SharedEventSink) -> AnalysisAgent {
        let services = Services::mock().unwrap();
        AnalysisAgent::new(AnalysisAgent::default_config(), services.chat, services.tts, sink)
    }

    #[test]
    fn test_parse_bare_json() {
        let data = parse_analysis_reply(REPLY).unwrap();
        assert_eq!(data["translation_summary"], "Summary.");
        assert_eq!(data["key_points"], json!(["a", "b"]));
    }

    #[test]
    fn test_parse_fenced_json() {
        let reply = format!("Here you go:\n```json\n{REPLY}\n```\nThanks!");
        let data = parse_analysis_reply(&reply).unwrap();
        assert_eq!(data["title"], "T");
    }

    #[test]
    fn test_parse_embedded_json_and_normalizes() {
        let reply = r#"Sure. {"key_points": [1, "two"]} Done."#;
        let data = parse_analysis_reply(reply).unwrap();
        assert_eq!(data["key_points"], json!(["1", "two"]));
        assert_eq!(data["translation_summary"], "");
        assert_eq!(data["critical_analysis"], json!({}));
    }

    #[test]
    fn test_parse_replaces_null_summary() {
        let data = parse_analysis_reply(r#"{"translation_summary": null, "key_points": ["a"]}"#)
            .unwrap();
        assert_eq!(data["translation_summary"], "");

        let data = parse_analysis_reply(r#"{"translation_summary": 42}"#).unwrap();
        assert_eq!(data["translation_summary"], "42");
    }

    #[test]
    fn test_parse_rejects_unusable_replies() {
        assert!(parse_analysis_reply("no json here").is_err());
        assert!(parse_analysis_reply("{not json}").is_err());
        assert!(parse_analysis_reply(r#"{"title": "only"}"#).is_err());
    }

    #[tokio::test]
    async fn test_mock_analysis_with_audio() {
        let agent = mock_agent(default_sink());
        agent.initialize().await.unwrap();

        let result = agent.process(&context(&"news ".repeat(40))).await.unwrap();

        assert!(result.is_success(), "{:?}", result.error_message());
        assert_eq!(result.get("key_points").unwrap().as_array().unwrap().len(), 3);
        assert!(result.get_str("audio_url").unwrap().starts_with("mock://audio/"));
        let analysis = AnalysisResult::from_agent_data(&result.data).unwrap();
        assert_eq!(analysis.key_points.len(), 3);
    }

    #[tokio::test]
    async fn test_short_content_fails_without_calling_chat() {
        let chat = Arc::new(MockChatService::new());
        let agent = AnalysisAgent::new(
            AnalysisAgent::default_config(),
            chat.clone(),
            Arc::new(FailingTtsService),
            default_sink(),
        );
        agent.initialize().await.unwrap();

        let ctx = context("short");
        assert!(!agent.validate(&ctx));
        let result = agent.process(&ctx).await.unwrap();

        assert!(result.is_failure());
        assert_eq!(chat.call_count(), 0);
    }

    #[tokio::test]
    async fn test_tts_failure_is_not_fatal() {
        let chat = Arc::new(MockChatService::new().with_reply("analysis", REPLY));
        let sink = Arc::new(CollectingEventSink::new());
        let config = AgentConfig {
            max_attempts: 1,
            ..AnalysisAgent::default_config()
        };
        let agent = AnalysisAgent::new(config, chat, Arc::new(FailingTtsService), sink.clone());
        agent.initialize().await.unwrap();

        let result = agent.process(&context(&"news ".repeat(40))).await.unwrap();

        assert!(result.is_success());
        assert!(result.get("audio_url").is_none());
        assert!(result.metadata.contains_key("tts_error"));
        assert_eq!(sink.events_of_type("analysis.tts_failed").len(), 1);
    }

    #[tokio::test]
    async fn test_tts_disabled() {
        let chat = Arc::new(MockChatService::new().with_reply("analysis", REPLY));
        let config = AnalysisAgent::default_config().with_extra("enable_tts", json!(false));
        let agent = AnalysisAgent::new(config, chat, Arc::new(FailingTtsService), default_sink());
        agent.initialize().await.unwrap();

        let result = agent.process(&context(&"news ".repeat(40))).await.unwrap();

        assert!(result.is_success());
        assert!(result.metadata.get("tts_error").is_none());
    }

    #[tokio::test]
    async fn test_unparseable_reply_fails() {
        let chat = Arc::new(MockChatService::new().with_reply("analysis", "I cannot help."));
        let agent = AnalysisAgent::new(
            AnalysisAgent::default_config(),
            chat,
            Arc::new(FailingTtsService),
            default_sink(),
        );
        agent.initialize().await.unwrap();

        let result = agent.process(&context(&"news ".repeat(40))).await.unwrap();

        assert!(result.is_failure());
        assert!(result.error_message().unwrap().contains("Could not parse"));
    }
}
