//! Sample data for tests.

use serde_json::{Map, Value};

use crate::context::PipelineContext;
use crate::core::{AnalysisResult, ArticleData, CriticalAnalysis};

/// URL used by the fixtures.
pub const SAMPLE_URL: &str = "https://news.example.com/2024/05/transit-vote";

/// An article long enough to pass every length check.
#[must_use]
pub fn sample_article(url: &str) -> ArticleData {
    ArticleData::new(
        url,
        "Transit package clears final vote",
        "Lawmakers approved a ten-year transit package on Tuesday. ".repeat(12),
    )
    .with_author("City Desk")
    .with_language("en")
}

/// A complete analysis.
#[must_use]
pub fn sample_analysis() -> AnalysisResult {
    AnalysisResult::new(
        "Lawmakers approved a ten-year transit plan.",
        vec![
            "Rail upgrades are funded".to_string(),
            "Critics cite cost overruns".to_string(),
        ],
    )
    .with_critical_analysis(CriticalAnalysis {
        why_important: Some("Shapes regional growth for a decade.".to_string()),
        ..CriticalAnalysis::default()
    })
}

/// A context holding [`sample_article`].
#[must_use]
pub fn context_with_article(url: &str) -> PipelineContext {
    PipelineContext::new(url).with_article_data(sample_article(url))
}

/// A context holding [`sample_article`] and [`sample_analysis`].
#[must_use]
pub fn context_with_analysis(url: &str) -> PipelineContext {
    context_with_article(url).with_analysis_result(sample_analysis())
}

/// Converts a JSON object literal into a map; anything else gives an empty map.
#[must_use]
pub fn object(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}
