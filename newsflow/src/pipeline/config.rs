//! Pipeline configuration.

use crate::agents::AgentConfigOverrides;
use crate::errors::{NewsflowError, Result};
use crate::services::{OpenAiConfig, ScraperConfig};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human-readable output.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl FromStr for LogFormat {
    type Err = NewsflowError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(NewsflowError::Config(format!("unknown log format '{other}'"))),
        }
    }
}

/// Configuration for a pipeline and the default agents.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Serve canned data instead of calling external services.
    pub mock_mode: bool,
    /// Halt on the first hard failure.
    pub stop_on_failure: bool,
    /// Register the thumbnail agent.
    pub enable_thumbnail: bool,
    /// Register the interpretation agent.
    pub enable_interpret: bool,
    /// Register the style learning agent.
    pub enable_learning: bool,
    /// Directory of per-agent prompt overrides.
    pub prompts_dir: Option<PathBuf>,
    /// Log output format.
    pub log_format: LogFormat,
    /// OpenAI-compatible API settings.
    pub openai: OpenAiConfig,
    /// Scraper settings.
    pub scraper: ScraperConfig,
    /// Per-agent overrides keyed by agent name.
    pub agents: HashMap<String, AgentConfigOverrides>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            mock_mode: false,
            stop_on_failure: true,
            enable_thumbnail: true,
            enable_interpret: true,
            enable_learning: true,
            prompts_dir: None,
            log_format: LogFormat::default(),
            openai: OpenAiConfig::default(),
            scraper: ScraperConfig::default(),
            agents: HashMap::new(),
        }
    }
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" | "" => Ok(false),
        other => Err(NewsflowError::Config(format!(
            "{name} must be a boolean, got '{other}'"
        ))),
    }
}

impl PipelineConfig {
    /// Configuration for network-free runs.
    #[must_use]
    pub fn mock() -> Self {
        Self {
            mock_mode: true,
            ..Self::default()
        }
    }

    /// Loads `.env` (if present) and reads configuration from the
    /// environment, starting from the defaults.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads configuration through `lookup`, starting from the defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        let flags: [(&str, &mut bool); 5] = [
            ("NEWSFLOW_MOCK_MODE", &mut config.mock_mode),
            ("NEWSFLOW_STOP_ON_FAILURE", &mut config.stop_on_failure),
            ("NEWSFLOW_ENABLE_THUMBNAIL", &mut config.enable_thumbnail),
            ("NEWSFLOW_ENABLE_INTERPRET", &mut config.enable_interpret),
            ("NEWSFLOW_ENABLE_LEARNING", &mut config.enable_learning),
        ];
        for (name, slot) in flags {
            if let Some(value) = lookup(name) {
                *slot = parse_bool(name, &value)?;
            }
        }

        if let Some(dir) = lookup("NEWSFLOW_PROMPTS_DIR").filter(|d| !d.is_empty()) {
            config.prompts_dir = Some(PathBuf::from(dir));
        }
        if let Some(format) = lookup("NEWSFLOW_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }
        if let Some(key) = lookup("OPENAI_API_KEY").filter(|k| !k.is_empty()) {
            config.openai.api_key = Some(key);
        }
        if let Some(url) = lookup("OPENAI_BASE_URL").filter(|u| !u.is_empty()) {
            config.openai.base_url = url;
        }
        if let Some(model) = lookup("OPENAI_CHAT_MODEL").filter(|m| !m.is_empty()) {
            config.openai.chat_model = model;
        }

        Ok(config)
    }

    /// Parses configuration from a JSON document. Missing fields keep their
    /// defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| NewsflowError::Config(format!("invalid config: {e}")))
    }

    /// Overrides for one agent, if any.
    #[must_use]
    pub fn agent_overrides(&self, agent: &str) -> Option<&AgentConfigOverrides> {
        self.agents.get(agent)
    }

    /// Sets overrides for one agent.
    #[must_use]
    pub fn with_agent_overrides(
        mut self,
        agent: impl Into<String>,
        overrides: AgentConfigOverrides,
    ) -> Self {
        self.agents.insert(agent.into(), overrides);
        self
    }

    /// Sets the stop-on-failure policy.
    #[must_use]
    pub fn with_stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }
}
