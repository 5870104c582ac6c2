//! Analysis output attached to the context after the analysis agent.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Critical commentary on an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CriticalAnalysis {
    /// Why the story matters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub why_important: Option<String>,
    /// Where the story is likely to go next.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub future_prediction: Option<String>,
    /// Any further commentary keys the model produced.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CriticalAnalysis {
    /// Reads commentary leniently: an object keeps unknown keys in `extra`,
    /// bare text becomes `why_important`.
    #[must_use]
    pub fn from_value(value: &Value) -> Self {
        match value {
            Value::Object(fields) => {
                let mut extra = fields.clone();
                let why_important = extra.remove("why_important").as_ref().and_then(prose);
                let future_prediction = extra.remove("future_prediction").as_ref().and_then(prose);
                Self {
                    why_important,
                    future_prediction,
                    extra,
                }
            }
            other => Self {
                why_important: prose(other),
                ..Self::default()
            },
        }
    }
}

/// Renders a JSON value as readable text; `None` for null or empty input.
fn prose(value: &Value) -> Option<String> {
    let text = match value {
        Value::Null => return None,
        Value::String(s) => s.trim().to_string(),
        Value::Array(items) => items.iter().filter_map(prose).collect::<Vec<_>>().join("; "),
        Value::Object(fields) => fields
            .iter()
            .filter_map(|(key, v)| prose(v).map(|text| format!("{key}: {text}")))
            .collect::<Vec<_>>()
            .join("; "),
        other => other.to_string(),
    };
    (!text.is_empty()).then_some(text)
}

/// The structured analysis of an article.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Summary in the reader's language.
    #[serde(default)]
    pub translation_summary: String,
    /// Ordered key points.
    #[serde(default)]
    pub key_points: Vec<String>,
    /// Critical commentary.
    #[serde(default)]
    pub critical_analysis: CriticalAnalysis,
    /// Narration audio location.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    /// Narration script.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narration: Option<String>,
    /// Short summary of the original content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_summary: Option<String>,
    /// Title suggested by the analysis.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Free-form annotations.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl AnalysisResult {
    /// Creates an analysis with a summary and key points.
    #[must_use]
    pub fn new(translation_summary: impl Into<String>, key_points: Vec<String>) -> Self {
        Self {
            translation_summary: translation_summary.into(),
            key_points,
            ..Self::default()
        }
    }

    /// Builds an analysis from an analysis agent's result data.
    ///
    /// Returns `None` unless the data carries `key_points` or
    /// `translation_summary`.
    /// Fields are read one at a time: structured values where text is
    /// expected are flattened to prose, and unknown fields are ignored.
    #[must_use]
    pub fn from_agent_data(data: &Map<String, Value>) -> Option<Self> {
        if !data.contains_key("key_points") && !data.contains_key("translation_summary") {
            return None;
        }
        let key_points = match data.get("key_points") {
            Some(Value::Array(points)) => points.iter().filter_map(prose).collect(),
            Some(other) => prose(other).into_iter().collect(),
            None => Vec::new(),
        };
        Some(Self {
            translation_summary: data
                .get("translation_summary")
                .and_then(prose)
                .unwrap_or_default(),
            key_points,
            critical_analysis: data
                .get("critical_analysis")
                .map(CriticalAnalysis::from_value)
                .unwrap_or_default(),
            audio_url: data.get("audio_url").and_then(prose),
            narration: data.get("narration").and_then(prose),
            content_summary: data.get("content_summary").and_then(prose),
            title: data.get("title").and_then(prose),
            metadata: data
                .get("metadata")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
        })
    }

    /// Sets the critical commentary.
    #[must_use]
    pub fn with_critical_analysis(mut self, critical: CriticalAnalysis) -> Self {
        self.critical_analysis = critical;
        self
    }

    /// Sets the narration script.
    #[must_use]
    pub fn with_narration(mut self, narration: impl Into<String>) -> Self {
        self.narration = Some(narration.into());
        self
    }

    /// Returns a copy with the narration audio location set.
    #[must_use]
    pub fn with_audio_url(self, audio_url: impl Into<String>) -> Self {
        Self {
            audio_url: Some(audio_url.into()),
            ..self
        }
    }

    /// Returns a copy with one more metadata entry.
    #[must_use]
    pub fn with_metadata(self, key: impl Into<String>, value: Value) -> Self {
        let mut metadata = self.metadata.clone();
        metadata.insert(key.into(), value);
        Self { metadata, ..self }
    }

    /// Text used to represent the analysis downstream (embeddings, styling).
    #[must_use]
    pub fn summary_text(&self) -> String {
        let mut text = self.translation_summary.clone();
        for point in &self.key_points {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str("- ");
            text.push_str(point);
        }
        text
    }

    /// Converts to a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
