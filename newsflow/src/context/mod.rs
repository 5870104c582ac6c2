//! Immutable context threaded through the pipeline.
//!
//! Every `with_*` method returns a new [`PipelineContext`] and leaves the
//! receiver untouched, so a saved snapshot can be re-entered later without
//! observing writes made by other branches.

mod record;

pub use record::ProcessingRecord;

use crate::core::{AnalysisResult, ArticleData};
use crate::errors::AgentError;
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::Instant;

/// Progressively enriched state handed from agent to agent.
#[derive(Debug, Clone)]
pub struct PipelineContext {
    url: String,
    article_data: Option<Arc<ArticleData>>,
    analysis_result: Option<Arc<AnalysisResult>>,
    metadata: Map<String, Value>,
    errors: Vec<AgentError>,
    is_valid: bool,
    processed_by: Vec<ProcessingRecord>,
    created_at: DateTime<Utc>,
    start_time: Instant,
}

impl PipelineContext {
    /// Creates a fresh context for a URL.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        let created_at = Utc::now();
        let mut metadata = Map::new();
        metadata.insert("created_at".to_string(), json!(created_at.to_rfc3339()));

        Self {
            url: url.into(),
            article_data: None,
            analysis_result: None,
            metadata,
            errors: Vec::new(),
            is_valid: true,
            processed_by: Vec::new(),
            created_at,
            start_time: Instant::now(),
        }
    }

    /// The subject URL.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Article data, once extracted.
    #[must_use]
    pub fn article_data(&self) -> Option<&ArticleData> {
        self.article_data.as_deref()
    }

    /// Analysis result, once the analysis agent succeeded.
    #[must_use]
    pub fn analysis_result(&self) -> Option<&AnalysisResult> {
        self.analysis_result.as_deref()
    }

    /// Free-form annotations.
    #[must_use]
    pub fn metadata(&self) -> &Map<String, Value> {
        &self.metadata
    }

    /// Gets a single metadata value.
    #[must_use]
    pub fn get_metadata(&self, key: &str) -> Option<&Value> {
        self.metadata.get(key)
    }

    /// Accumulated errors.
    #[must_use]
    pub fn errors(&self) -> &[AgentError] {
        &self.errors
    }

    /// False once any error has been recorded.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.is_valid
    }

    /// Audit trail of agents that completed on this context.
    #[must_use]
    pub fn processed_by(&self) -> &[ProcessingRecord] {
        &self.processed_by
    }

    /// Returns true if the named agent already completed on this context.
    #[must_use]
    pub fn was_processed_by(&self, agent: &str) -> bool {
        self.processed_by.iter().any(|r| r.agent == agent)
    }

    /// When the context was created.
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// Milliseconds since the context was created.
    #[must_use]
    pub fn elapsed_ms(&self) -> u64 {
        u64::try_from(self.start_time.elapsed().as_millis()).unwrap_or(u64::MAX)
    }

    /// Returns a context with article data attached (or replaced).
    #[must_use]
    pub fn with_article_data(&self, article: ArticleData) -> Self {
        Self {
            article_data: Some(Arc::new(article)),
            ..self.clone()
        }
    }

    /// Returns a context with the analysis result attached.
    #[must_use]
    pub fn with_analysis_result(&self, analysis: AnalysisResult) -> Self {
        Self {
            analysis_result: Some(Arc::new(analysis)),
            ..self.clone()
        }
    }

    /// Returns a context with one more metadata entry.
    #[must_use]
    pub fn with_metadata(&self, key: impl Into<String>, value: Value) -> Self {
        let mut next = self.clone();
        next.metadata.insert(key.into(), value);
        next
    }

    /// Returns a context with an error recorded. The result is never valid.
    #[must_use]
    pub fn with_error(&self, agent: impl Into<String>, message: impl Into<String>) -> Self {
        self.with_errors(vec![AgentError::new(agent, message)])
    }

    /// Returns a context with several error records appended.
    #[must_use]
    pub fn with_errors(&self, errors: Vec<AgentError>) -> Self {
        let mut next = self.clone();
        if !errors.is_empty() {
            next.errors.extend(errors);
            next.is_valid = false;
        }
        next
    }

    /// Returns a context with an audit entry for `agent` appended.
    #[must_use]
    pub fn mark_processed(&self, agent: impl Into<String>) -> Self {
        let mut next = self.clone();
        next.processed_by
            .push(ProcessingRecord::new(agent, self.elapsed_ms()));
        next
    }

    /// Converts the context to a JSON summary.
    #[must_use]
    pub fn to_json(&self) -> Value {
        json!({
            "url": self.url,
            "article": self.article_data.as_deref().map(ArticleData::to_value),
            "analysis": self.analysis_result.as_deref().map(AnalysisResult::to_value),
            "metadata": self.metadata,
            "errors": self.errors,
            "is_valid": self.is_valid,
            "processed_by": self.processed_by,
            "elapsed_ms": self.elapsed_ms(),
        })
    }
}
