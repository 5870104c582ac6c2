//! Mock services and agents for testing.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::agents::{Agent, AgentConfig, AgentRole};
use crate::context::PipelineContext;
use crate::core::AgentResult;
use crate::errors::{NewsflowError, Result, ServiceError};
use crate::services::{canned, ChatOptions, ChatService, TtsOptions, TtsService};

/// A recorded chat call.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatCall {
    /// Task tag from the options.
    pub tag: Option<String>,
    /// System prompt.
    pub system_prompt: String,
    /// User prompt.
    pub user_prompt: String,
}

/// A chat service with scripted replies per task tag.
///
/// Tags without a scripted reply get the canned mock-mode response.
#[derive(Debug, Default)]
pub struct MockChatService {
    replies: HashMap<String, String>,
    always_fail: bool,
    transient_failures: AtomicUsize,
    calls: Mutex<Vec<ChatCall>>,
}

impl MockChatService {
    /// Creates a service that answers every tag with canned data.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a service whose every call fails with a non-retryable error.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            always_fail: true,
            ..Self::default()
        }
    }

    /// Scripts the reply for one tag.
    #[must_use]
    pub fn with_reply(mut self, tag: impl Into<String>, reply: impl Into<String>) -> Self {
        self.replies.insert(tag.into(), reply.into());
        self
    }

    /// Makes the first `count` calls fail with a retryable 503.
    #[must_use]
    pub fn with_transient_failures(self, count: usize) -> Self {
        self.transient_failures.store(count, Ordering::SeqCst);
        self
    }

    /// Number of calls received, failed ones included.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// All recorded calls.
    #[must_use]
    pub fn calls(&self) -> Vec<ChatCall> {
        self.calls.lock().clone()
    }

    /// Recorded calls for one tag.
    #[must_use]
    pub fn calls_tagged(&self, tag: &str) -> Vec<ChatCall> {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.tag.as_deref() == Some(tag))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl ChatService for MockChatService {
    async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &ChatOptions,
    ) -> std::result::Result<String, ServiceError> {
        self.calls.lock().push(ChatCall {
            tag: options.tag.clone(),
            system_prompt: system_prompt.to_string(),
            user_prompt: user_prompt.to_string(),
        });

        if self.always_fail {
            return Err(ServiceError::InvalidResponse("scripted failure".to_string()));
        }
        let pending = self
            .transient_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if pending.is_ok() {
            return Err(ServiceError::Status {
                status: 503,
                body: "scripted outage".to_string(),
            });
        }

        let tag = options.tag.as_deref();
        Ok(tag
            .and_then(|t| self.replies.get(t).cloned())
            .unwrap_or_else(|| canned::chat_response(tag, user_prompt)))
    }

    fn is_configured(&self) -> bool {
        true
    }

    fn is_mock_mode(&self) -> bool {
        true
    }
}

/// A speech service that always fails.
#[derive(Debug, Default, Clone, Copy)]
pub struct FailingTtsService;

#[async_trait]
impl TtsService for FailingTtsService {
    async fn text_to_speech(
        &self,
        _text: &str,
        _options: &TtsOptions,
    ) -> std::result::Result<String, ServiceError> {
        Err(ServiceError::InvalidResponse("speech unavailable".to_string()))
    }
}

/// What a [`ScriptedAgent`] does when processed.
#[derive(Debug, Clone)]
pub enum Script {
    /// Return this result.
    Result(AgentResult),
    /// Return `Err` with this message.
    Error(String),
    /// Panic with this message.
    Panic(String),
}

/// An agent that plays back scripted behaviour.
///
/// Scripts are consumed in order; the last one repeats once the queue is
/// down to a single entry.
#[derive(Debug)]
pub struct ScriptedAgent {
    name: String,
    role: AgentRole,
    config: AgentConfig,
    scripts: Mutex<VecDeque<Script>>,
    init_error: Option<String>,
    init_count: AtomicUsize,
    contexts: Mutex<Vec<PipelineContext>>,
}

impl ScriptedAgent {
    fn scripted(name: impl Into<String>, script: Script) -> Self {
        Self {
            name: name.into(),
            role: AgentRole::Custom,
            config: AgentConfig::default(),
            scripts: Mutex::new(VecDeque::from([script])),
            init_error: None,
            init_count: AtomicUsize::new(0),
            contexts: Mutex::new(Vec::new()),
        }
    }

    /// An agent that succeeds with no data.
    #[must_use]
    pub fn succeeding(name: impl Into<String>) -> Self {
        Self::scripted(name, Script::Result(AgentResult::success_empty()))
    }

    /// An agent that succeeds with `data`.
    #[must_use]
    pub fn returning(name: impl Into<String>, data: Map<String, Value>) -> Self {
        Self::scripted(name, Script::Result(AgentResult::success(data)))
    }

    /// An agent that reports a failure result.
    #[must_use]
    pub fn failing(name: impl Into<String>, message: impl Into<String>) -> Self {
        let name = name.into();
        let result = AgentResult::failure(&name, message);
        Self::scripted(name, Script::Result(result))
    }

    /// An agent that asks for clarification with `payload`.
    #[must_use]
    pub fn clarifying(name: impl Into<String>, payload: Map<String, Value>) -> Self {
        Self::scripted(name, Script::Result(AgentResult::needs_clarification(payload)))
    }

    /// An agent whose `process` returns `Err`.
    #[must_use]
    pub fn erroring(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::scripted(name, Script::Error(message.into()))
    }

    /// An agent whose `process` panics.
    #[must_use]
    pub fn panicking(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::scripted(name, Script::Panic(message.into()))
    }

    /// Sets the role.
    #[must_use]
    pub fn with_role(mut self, role: AgentRole) -> Self {
        self.role = role;
        self
    }

    /// Queues another script after the current ones.
    #[must_use]
    pub fn then(self, script: Script) -> Self {
        self.scripts.lock().push_back(script);
        self
    }

    /// Makes `initialize` fail with `message`.
    #[must_use]
    pub fn with_init_error(mut self, message: impl Into<String>) -> Self {
        self.init_error = Some(message.into());
        self
    }

    /// Number of `initialize` calls.
    #[must_use]
    pub fn init_count(&self) -> usize {
        self.init_count.load(Ordering::SeqCst)
    }

    /// Number of `process` calls.
    #[must_use]
    pub fn call_count(&self) -> usize {
        self.contexts.lock().len()
    }

    /// Contexts received by `process`, in call order.
    #[must_use]
    pub fn seen_contexts(&self) -> Vec<PipelineContext> {
        self.contexts.lock().clone()
    }

    fn next_script(&self) -> Script {
        let mut scripts = self.scripts.lock();
        if scripts.len() > 1 {
            scripts.pop_front().unwrap_or(Script::Error("empty script".to_string()))
        } else {
            scripts
                .front()
                .cloned()
                .unwrap_or(Script::Error("empty script".to_string()))
        }
    }
}

#[async_trait]
impl Agent for ScriptedAgent {
    fn name(&self) -> &str {
        &self.name
    }

    fn role(&self) -> AgentRole {
        self.role
    }

    fn config(&self) -> &AgentConfig {
        &self.config
    }

    async fn initialize(&self) -> Result<()> {
        self.init_count.fetch_add(1, Ordering::SeqCst);
        match &self.init_error {
            Some(message) => Err(NewsflowError::Initialization {
                agent: self.name.clone(),
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    fn is_ready(&self) -> bool {
        self.init_error.is_none() && self.init_count() > 0
    }

    fn validate(&self, _ctx: &PipelineContext) -> bool {
        true
    }

    async fn process(&self, ctx: &PipelineContext) -> Result<AgentResult> {
        self.contexts.lock().push(ctx.clone());
        match self.next_script() {
            Script::Result(result) => Ok(result),
            Script::Error(message) => Err(NewsflowError::Internal(message)),
            Script::Panic(message) => panic!("{message}"),
        }
    }
}
