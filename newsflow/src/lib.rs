//! # Newsflow
//!
//! An agent pipeline that turns a news article URL into a structured AI
//! analysis.
//!
//! A run threads an immutable context through a fixed sequence of agents:
//!
//! - **Validation**: checks the URL and extracts the article
//! - **Thumbnail**: generates a preview image for the article
//! - **Analysis**: summarizes the article, lists key points and narrates it
//! - **Interpret**: places the story next to related coverage
//! - **Learning**: restyles the analysis, asking the operator when unsure
//!
//! Every agent reports a tri-state result (success, failure or a request for
//! clarification). A clarification request halts the run; the saved context
//! can be resumed once the operator answers.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use newsflow::prelude::*;
//!
//! let pipeline = Pipeline::with_default_agents(PipelineConfig::mock())?;
//! let result = pipeline.run("https://news.example.com/story").await;
//!
//! if let Some(analysis) = result.final_analysis() {
//!     println!("{analysis:#}");
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod agents;
pub mod context;
pub mod core;
pub mod errors;
pub mod events;
pub mod observability;
pub mod pipeline;
pub mod services;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::agents::{
        Agent, AgentConfig, AgentConfigOverrides, AgentRole, AnalysisAgent, InterpretAgent,
        LearningAgent, ThumbnailAgent, ValidationAgent, SELECTED_STYLE_KEY,
    };
    pub use crate::context::PipelineContext;
    pub use crate::core::{AgentOutcome, AgentResult, AnalysisResult, ArticleData};
    pub use crate::errors::{AgentError, NewsflowError, Result, ServiceError};
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::init_tracing;
    pub use crate::pipeline::{
        LogFormat, Pipeline, PipelineConfig, PipelineResult, PipelineStatus, RetryPolicy,
    };
    pub use crate::services::{
        ChatService, EmbeddingService, Services, TtsService, VectorSearch, WebScraper,
    };
}
