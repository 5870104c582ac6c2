//! Testing utilities for newsflow pipelines.
//!
//! This module provides:
//! - Scripted chat and speech services
//! - Scripted agents for driving the sequencer
//! - Sample articles, analyses and contexts

mod fixtures;
mod mocks;

pub use fixtures::{
    context_with_analysis, context_with_article, object, sample_analysis, sample_article,
    SAMPLE_URL,
};
pub use mocks::{ChatCall, FailingTtsService, MockChatService, Script, ScriptedAgent};
