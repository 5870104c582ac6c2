//! Extracted article data.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// An article extracted from a news page.
///
/// `ArticleData` is immutable once created. The only supported "mutation",
/// [`ArticleData::with_image_url`], consumes the value and returns a rebuilt one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleData {
    /// Canonical URL of the article.
    pub url: String,
    /// Headline.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Short description / standfirst.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Byline.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    /// Publication time as reported by the page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<String>,
    /// Lead image.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    /// Content language (BCP 47 tag).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// Free-form annotations.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl ArticleData {
    /// Creates a new article with the required fields.
    #[must_use]
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            description: None,
            author: None,
            published_at: None,
            image_url: None,
            language: None,
            metadata: Map::new(),
        }
    }

    /// Parses an article from an agent's `article` payload.
    pub fn from_value(value: &Value) -> crate::errors::Result<Self> {
        Ok(serde_json::from_value(value.clone())?)
    }

    /// Converts the article into the JSON payload agents exchange.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the author.
    #[must_use]
    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }

    /// Sets the publication time.
    #[must_use]
    pub fn with_published_at(mut self, published_at: impl Into<String>) -> Self {
        self.published_at = Some(published_at.into());
        self
    }

    /// Sets the language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Adds a single metadata entry.
    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Returns a copy of the article with a different lead image.
    #[must_use]
    pub fn with_image_url(self, image_url: impl Into<String>) -> Self {
        Self {
            image_url: Some(image_url.into()),
            ..self
        }
    }

    /// Content length in characters.
    #[must_use]
    pub fn content_length(&self) -> usize {
        self.content.chars().count()
    }

    /// Number of whitespace-separated words in the content.
    #[must_use]
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }
}
