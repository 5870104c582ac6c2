//! Pipeline building and execution.
//!
//! This module provides:
//! - Pipeline configuration
//! - The linear agent sequencer
//! - The terminal pipeline result
//! - Retry with backoff for agents' external calls

mod config;
#[cfg(test)]
mod integration_tests;
mod result;
mod retry;
mod sequencer;

pub use config::{LogFormat, PipelineConfig};
pub use result::{AgentRun, PipelineResult, PipelineStatus};
pub use retry::{BackoffStrategy, Jitter, RetryPolicy};
pub use sequencer::{Pipeline, PENDING_AGENT_KEY, RUN_ID_KEY};
