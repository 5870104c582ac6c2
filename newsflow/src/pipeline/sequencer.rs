//! Linear agent sequencer.
//!
//! Runs registered agents strictly in order, threading an immutable
//! [`PipelineContext`] through them. A hard failure halts the run when
//! `stop_on_failure` is set; a clarification result always halts it.

use super::{AgentRun, PipelineConfig, PipelineResult};
use crate::agents::{
    Agent, AgentConfig, AgentRole, AnalysisAgent, InterpretAgent, LearningAgent, ThumbnailAgent,
    ValidationAgent, ANALYSIS_AGENT, INTERPRET_AGENT, LEARNING_AGENT, THUMBNAIL_AGENT,
    VALIDATION_AGENT,
};
use crate::context::PipelineContext;
use crate::core::{AgentOutcome, AgentResult, AnalysisResult, ArticleData};
use crate::errors::{NewsflowError, Result};
use crate::events::{default_sink, SharedEventSink};
use crate::services::Services;
use futures::FutureExt;
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::any::Any;
use std::collections::HashSet;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Context metadata key for the run identifier.
pub const RUN_ID_KEY: &str = "run_id";
/// Context metadata key naming the agent that asked for clarification.
pub const PENDING_AGENT_KEY: &str = "pending_agent";

/// An ordered sequence of agents.
pub struct Pipeline {
    agents: Vec<Arc<dyn Agent>>,
    config: PipelineConfig,
    events: SharedEventSink,
    initialized: Mutex<HashSet<usize>>,
    last_run: Mutex<Option<PipelineResult>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("agents", &self.agent_names())
            .field("stop_on_failure", &self.config.stop_on_failure)
            .field("mock_mode", &self.config.mock_mode)
            .finish_non_exhaustive()
    }
}

fn elapsed_ms(start: Instant) -> u64 {
    u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

impl Pipeline {
    /// Creates an empty pipeline.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            agents: Vec::new(),
            config,
            events: default_sink(),
            initialized: Mutex::new(HashSet::new()),
            last_run: Mutex::new(None),
        }
    }

    /// Replaces the event sink used for pipeline events.
    #[must_use]
    pub fn with_event_sink(mut self, events: SharedEventSink) -> Self {
        self.events = events;
        self
    }

    /// Builds services from `config` and registers the default agents.
    pub fn with_default_agents(config: PipelineConfig) -> Result<Self> {
        let services = Services::build(
            config.openai.clone(),
            config.scraper.clone(),
            config.mock_mode,
        )?;
        Ok(Self::with_services(config, services))
    }

    /// Registers the default agents over the given services.
    #[must_use]
    pub fn with_services(config: PipelineConfig, services: Services) -> Self {
        Self::with_services_and_events(config, services, default_sink())
    }

    /// Registers the default agents over the given services, sharing one
    /// event sink between the pipeline and every agent.
    ///
    /// Validation and Analysis always run; Thumbnail, Interpret and
    /// Learning follow the enable flags.
    #[must_use]
    pub fn with_services_and_events(
        config: PipelineConfig,
        services: Services,
        events: SharedEventSink,
    ) -> Self {
        let prompts = config.prompts_dir.clone();
        let settings = |name: &str, defaults: AgentConfig| {
            defaults.merged(config.agent_overrides(name))
        };

        let mut agents: Vec<Arc<dyn Agent>> = vec![Arc::new(ValidationAgent::new(
            settings(VALIDATION_AGENT, ValidationAgent::default_config()),
            services.scraper.clone(),
            events.clone(),
        ))];
        if config.enable_thumbnail {
            agents.push(Arc::new(
                ThumbnailAgent::new(
                    settings(THUMBNAIL_AGENT, ThumbnailAgent::default_config()),
                    services.chat.clone(),
                    events.clone(),
                )
                .with_prompts_dir(prompts.clone()),
            ));
        }
        agents.push(Arc::new(
            AnalysisAgent::new(
                settings(ANALYSIS_AGENT, AnalysisAgent::default_config()),
                services.chat.clone(),
                services.tts.clone(),
                events.clone(),
            )
            .with_prompts_dir(prompts.clone()),
        ));
        if config.enable_interpret {
            agents.push(Arc::new(
                InterpretAgent::new(
                    settings(INTERPRET_AGENT, InterpretAgent::default_config()),
                    services.chat.clone(),
                    services.embeddings.clone(),
                    services.vector_search.clone(),
                    events.clone(),
                )
                .with_prompts_dir(prompts.clone()),
            ));
        }
        if config.enable_learning {
            agents.push(Arc::new(
                LearningAgent::new(
                    settings(LEARNING_AGENT, LearningAgent::default_config()),
                    services.chat.clone(),
                    events.clone(),
                )
                .with_prompts_dir(prompts),
            ));
        }

        let mut pipeline = Self::new(config).with_event_sink(events);
        pipeline.agents = agents;
        pipeline
    }

    /// Appends an agent.
    #[must_use]
    pub fn with_agent(mut self, agent: impl Agent + 'static) -> Self {
        self.agents.push(Arc::new(agent));
        self
    }

    /// Appends a shared agent.
    pub fn add_agent(&mut self, agent: Arc<dyn Agent>) -> &mut Self {
        self.agents.push(agent);
        self
    }

    /// The configuration.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// True if external calls return canned data.
    #[must_use]
    pub fn is_mock_mode(&self) -> bool {
        self.config.mock_mode
    }

    /// Registered agent names in execution order.
    #[must_use]
    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name()).collect()
    }

    /// Looks up an agent by name (first match).
    #[must_use]
    pub fn agent(&self, name: &str) -> Option<&Arc<dyn Agent>> {
        self.agents.iter().find(|a| a.name() == name)
    }

    fn position(&self, name: &str) -> Result<usize> {
        self.agents
            .iter()
            .position(|a| a.name() == name)
            .ok_or_else(|| NewsflowError::AgentNotFound(name.to_string()))
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// True if no agent is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    /// Per-agent results of the last run, in execution order.
    #[must_use]
    pub fn results(&self) -> Vec<AgentRun> {
        self.last_run
            .lock()
            .as_ref()
            .map(|r| r.runs().to_vec())
            .unwrap_or_default()
    }

    /// The result of the last run.
    #[must_use]
    pub fn final_result(&self) -> Option<PipelineResult> {
        self.last_run.lock().clone()
    }

    /// Runs every agent against a fresh context for `url`.
    ///
    /// Never fails: errors and panics inside agents become failure results.
    pub async fn run(&self, url: &str) -> PipelineResult {
        let run_id = Uuid::new_v4();
        let ctx = PipelineContext::new(url).with_metadata(RUN_ID_KEY, json!(run_id.to_string()));
        self.execute(ctx, 0)
            .instrument(info_span!("pipeline", %run_id))
            .await
    }

    /// Re-enters the pipeline from a saved context, starting at `agent_name`.
    pub async fn resume(&self, context: PipelineContext, agent_name: &str) -> Result<PipelineResult> {
        let start = self.position(agent_name)?;
        let run_id = context
            .get_metadata(RUN_ID_KEY)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        info!(agent = agent_name, run_id = %run_id, "Resuming pipeline");
        Ok(self
            .execute(context, start)
            .instrument(info_span!("pipeline", run_id = %run_id, resumed = true))
            .await)
    }

    /// Initializes and runs a single agent.
    pub async fn run_agent(&self, name: &str, context: &PipelineContext) -> Result<AgentResult> {
        let index = self.position(name)?;
        let agent = &self.agents[index];
        self.initialize_once(index, agent.as_ref()).await?;
        Ok(match Self::invoke(agent.as_ref(), context).await {
            Ok(result) => result,
            Err(message) => AgentResult::failure(name, format!("{name}: {message}")),
        })
    }

    /// Initializes the agent at `index` unless an earlier call succeeded.
    async fn initialize_once(&self, index: usize, agent: &dyn Agent) -> Result<()> {
        if self.initialized.lock().contains(&index) {
            return Ok(());
        }
        agent.initialize().await?;
        self.initialized.lock().insert(index);
        Ok(())
    }

    async fn initialize_all(&self) -> std::result::Result<(), AgentRun> {
        for (index, agent) in self.agents.iter().enumerate() {
            if let Err(e) = self.initialize_once(index, agent.as_ref()).await {
                return Err(AgentRun {
                    name: agent.name().to_string(),
                    role: agent.role(),
                    result: AgentResult::failure(
                        agent.name(),
                        format!("{} initialization failed: {e}", agent.name()),
                    ),
                });
            }
        }
        Ok(())
    }

    /// Runs `process`, turning an error or a panic into a message.
    async fn invoke(agent: &dyn Agent, ctx: &PipelineContext) -> std::result::Result<AgentResult, String> {
        match AssertUnwindSafe(agent.process(ctx)).catch_unwind().await {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(e.to_string()),
            Err(payload) => Err(format!("panicked: {}", panic_message(payload.as_ref()))),
        }
    }

    fn merge(agent: &dyn Agent, result: &AgentResult, ctx: PipelineContext) -> PipelineContext {
        let mut next = ctx;
        if let Some(article) = result.get("article") {
            match ArticleData::from_value(article) {
                Ok(article) => next = next.with_article_data(article),
                Err(e) => warn!(agent = agent.name(), error = %e, "Ignoring malformed article payload"),
            }
        }
        if agent.role() == AgentRole::Analysis {
            match AnalysisResult::from_agent_data(&result.data) {
                Some(analysis) => next = next.with_analysis_result(analysis),
                None => warn!(
                    agent = agent.name(),
                    "Analysis result carries no summary or key points, context left unchanged"
                ),
            }
        }
        next
    }

    async fn finish(&self, result: PipelineResult) -> PipelineResult {
        let summary = json!({
            "status": result.status().to_string(),
            "duration_ms": result.duration_ms(),
            "agents": result.agent_names(),
            "error": result.error(),
        });
        let event = match result.status() {
            super::PipelineStatus::Completed => "pipeline.completed",
            super::PipelineStatus::Failed => "pipeline.failed",
            super::PipelineStatus::NeedsClarification => "pipeline.needs_clarification",
        };
        info!(
            status = %result.status(),
            duration_ms = result.duration_ms(),
            agents = result.len(),
            "Pipeline finished"
        );
        self.events.emit(event, Some(summary)).await;
        *self.last_run.lock() = Some(result.clone());
        result
    }

    async fn execute(&self, mut ctx: PipelineContext, start: usize) -> PipelineResult {
        let started = Instant::now();
        let mut runs: Vec<AgentRun> = Vec::new();

        info!(url = ctx.url(), agents = self.agents.len(), start, "Pipeline started");
        self.events
            .emit(
                "pipeline.started",
                Some(json!({ "url": ctx.url(), "agents": self.agent_names(), "start": start })),
            )
            .await;

        if let Err(failed) = self.initialize_all().await {
            let message = failed.result.error_message().unwrap_or_default();
            error!(agent = %failed.name, error = %message, "Agent initialization failed");
            runs.push(failed);
            return self
                .finish(PipelineResult::failed(runs, message, elapsed_ms(started), ctx))
                .await;
        }

        for agent in self.agents.iter().skip(start) {
            let name = agent.name().to_string();
            let agent_started = Instant::now();
            self.events
                .emit("agent.started", Some(json!({ "agent": name })))
                .await;

            let outcome = Self::invoke(agent.as_ref(), &ctx)
                .instrument(info_span!("agent", agent = %name))
                .await;
            let duration_ms = elapsed_ms(agent_started);

            let result = match outcome {
                Ok(result) => result,
                Err(message) => {
                    let message = format!("{name}: {message}");
                    error!(agent = %name, error = %message, "Agent raised an error");
                    self.events
                        .emit(
                            "agent.failed",
                            Some(json!({ "agent": name, "error": message, "duration_ms": duration_ms })),
                        )
                        .await;
                    runs.push(AgentRun {
                        name: name.clone(),
                        role: agent.role(),
                        result: AgentResult::failure(&name, &message),
                    });
                    if self.config.stop_on_failure {
                        return self
                            .finish(PipelineResult::failed(runs, message, elapsed_ms(started), ctx))
                            .await;
                    }
                    continue;
                }
            };

            match result.outcome {
                AgentOutcome::Success => {
                    ctx = Self::merge(agent.as_ref(), &result, ctx).mark_processed(&name);
                    info!(agent = %name, duration_ms, "Agent completed");
                    self.events
                        .emit(
                            "agent.completed",
                            Some(json!({ "agent": name, "duration_ms": duration_ms })),
                        )
                        .await;
                    runs.push(AgentRun {
                        name,
                        role: agent.role(),
                        result,
                    });
                }
                AgentOutcome::Failure => {
                    let message = result
                        .error_message()
                        .unwrap_or_else(|| format!("{name} failed"));
                    warn!(agent = %name, error = %message, duration_ms, "Agent failed");
                    self.events
                        .emit(
                            "agent.failed",
                            Some(json!({ "agent": name, "error": message, "duration_ms": duration_ms })),
                        )
                        .await;
                    ctx = ctx.with_errors(result.errors.clone());
                    runs.push(AgentRun {
                        name,
                        role: agent.role(),
                        result,
                    });
                    if self.config.stop_on_failure {
                        return self
                            .finish(PipelineResult::failed(runs, message, elapsed_ms(started), ctx))
                            .await;
                    }
                }
                AgentOutcome::NeedsClarification => {
                    info!(agent = %name, duration_ms, "Agent needs clarification");
                    self.events
                        .emit(
                            "agent.clarification",
                            Some(json!({ "agent": name, "data": result.data })),
                        )
                        .await;
                    let payload = result.data.clone();
                    ctx = ctx.with_metadata(PENDING_AGENT_KEY, json!(name));
                    runs.push(AgentRun {
                        name,
                        role: agent.role(),
                        result,
                    });
                    return self
                        .finish(PipelineResult::needs_clarification(
                            runs,
                            payload,
                            elapsed_ms(started),
                            ctx,
                        ))
                        .await;
                }
            }
        }

        self.finish(PipelineResult::completed(runs, elapsed_ms(started), ctx))
            .await
    }
}
