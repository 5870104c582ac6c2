//! Error types for the newsflow pipeline.
//!
//! Two layers of errors live here:
//! - [`NewsflowError`] / [`ServiceError`]: Rust errors returned from fallible
//!   operations (agents "throwing", external collaborators failing).
//! - [`AgentError`]: the structured, serializable error record accumulated in
//!   results and contexts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The main error type for newsflow operations.
#[derive(Debug, Error)]
pub enum NewsflowError {
    /// Input failed an agent's validation rule.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// An external collaborator failed.
    #[error("{0}")]
    Service(#[from] ServiceError),

    /// Invalid configuration.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No agent with the requested name is registered.
    #[error("Agent not found: {0}")]
    AgentNotFound(String),

    /// An agent failed its one-time setup.
    #[error("Initialization of {agent} failed: {message}")]
    Initialization {
        /// Agent that failed to initialize.
        agent: String,
        /// Failure description.
        message: String,
    },

    /// A model response could not be interpreted.
    #[error("Parse error: {0}")]
    Parse(String),

    /// An operation exceeded its time budget.
    #[error("Operation timed out after {0} ms")]
    Timeout(u64),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl NewsflowError {
    /// Returns true if retrying the failed operation may succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Service(e) => e.is_transient(),
            Self::Timeout(_) => true,
            _ => false,
        }
    }
}

/// Failure of an external collaborator (LLM, TTS, scraper, vector search).
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The service has no credentials or endpoint configured.
    #[error("Service not configured: {0}")]
    NotConfigured(String),

    /// Transport-level failure.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("Service returned status {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body (possibly truncated).
        body: String,
    },

    /// The call did not finish in time.
    #[error("Service call timed out")]
    Timeout,

    /// The response did not have the expected shape.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A page could not be turned into an article.
    #[error("Scrape failed: {0}")]
    Scrape(String),
}

impl ServiceError {
    /// Returns true for timeouts, rate limits, server errors and transport
    /// failures.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout => true,
            Self::Status { status, .. } => *status == 429 || *status >= 500,
            Self::Http(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::NotConfigured(_) | Self::InvalidResponse(_) | Self::Scrape(_) => false,
        }
    }
}

/// A structured error record carried by results and contexts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentError {
    /// Human-readable message.
    pub message: String,
    /// Agent that produced the error.
    pub agent: String,
    /// When the error was recorded.
    pub timestamp: DateTime<Utc>,
}

impl AgentError {
    /// Creates a new error record stamped with the current time.
    #[must_use]
    pub fn new(agent: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            agent: agent.into(),
            timestamp: Utc::now(),
        }
    }
}

impl std::fmt::Display for AgentError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.agent, self.message)
    }
}

/// Result type alias for newsflow operations.
pub type Result<T, E = NewsflowError> = std::result::Result<T, E>;
