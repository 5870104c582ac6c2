//! External collaborators the agents call through narrow interfaces.
//!
//! The sequencer never touches these; they are injected into agents at
//! construction. Every trait is object safe so implementations can be swapped
//! for scripted doubles in tests.

pub(crate) mod canned;
mod openai;
mod vector;
mod web;

pub use openai::{OpenAiClient, OpenAiConfig};
pub use vector::{cosine_similarity, InMemoryVectorIndex};
pub use web::{extract_article, HttpScraper, ScraperConfig};

use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Options for a chat completion.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatOptions {
    /// Model override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    /// Completion token limit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    /// Label of the calling task ("analysis", "learning", ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl ChatOptions {
    /// Creates options labelled with a task tag.
    #[must_use]
    pub fn tagged(tag: impl Into<String>) -> Self {
        Self {
            tag: Some(tag.into()),
            ..Self::default()
        }
    }

    /// Sets the model.
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets the temperature.
    #[must_use]
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    /// Sets the token limit.
    #[must_use]
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Chat/completion service.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Sends a system + user prompt pair and returns the reply text.
    async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &ChatOptions,
    ) -> Result<String, ServiceError>;

    /// Returns true if the service can be called.
    fn is_configured(&self) -> bool;

    /// Returns true if calls return canned data without network I/O.
    fn is_mock_mode(&self) -> bool;
}

/// Options for speech synthesis.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TtsOptions {
    /// Voice name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,
    /// Model override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Audio format (mp3, wav, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

/// Text-to-speech service.
#[async_trait]
pub trait TtsService: Send + Sync {
    /// Synthesizes speech and returns a URL or identifier for the audio.
    async fn text_to_speech(&self, text: &str, options: &TtsOptions)
        -> Result<String, ServiceError>;
}

/// Embedding service.
#[async_trait]
pub trait EmbeddingService: Send + Sync {
    /// Embeds text into a vector.
    async fn create_embedding(&self, text: &str) -> Result<Vec<f32>, ServiceError>;
}

/// Article fields returned by a scraper.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapedArticle {
    /// Headline.
    pub title: String,
    /// Body text.
    pub content: String,
    /// Description.
    pub description: Option<String>,
    /// Byline.
    pub author: Option<String>,
    /// Publication time as reported by the page.
    pub published_at: Option<String>,
    /// Lead image.
    pub image_url: Option<String>,
    /// Page language.
    pub language: Option<String>,
}

/// Web page fetcher that extracts article fields.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait WebScraper: Send + Sync {
    /// Fetches and extracts the article at `url`.
    async fn fetch(&self, url: &str) -> Result<ScrapedArticle, ServiceError>;
}

/// One retrieved document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Stored text.
    pub text: String,
    /// Similarity score (higher is closer).
    pub score: f32,
    /// Identifier of the stored document.
    pub source_id: String,
}

/// Vector-search / RAG backend.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Returns the `top_k` closest documents to `query`.
    async fn search(&self, query: &[f32], top_k: usize) -> Result<Vec<SearchHit>, ServiceError>;

    /// Inserts or replaces a document.
    async fn upsert(
        &self,
        source_id: &str,
        text: &str,
        vector: Vec<f32>,
    ) -> Result<(), ServiceError>;
}

/// The set of collaborators injected into the default agents.
#[derive(Clone)]
pub struct Services {
    /// Chat/completion service.
    pub chat: Arc<dyn ChatService>,
    /// Speech synthesis.
    pub tts: Arc<dyn TtsService>,
    /// Embeddings.
    pub embeddings: Arc<dyn EmbeddingService>,
    /// Article scraper.
    pub scraper: Arc<dyn WebScraper>,
    /// Vector search backend.
    pub vector_search: Arc<dyn VectorSearch>,
}

impl Services {
    /// Builds the HTTP-backed services.
    ///
    /// With `mock_mode` set, the OpenAI client and the scraper return canned
    /// data and never touch the network.
    pub fn build(
        openai: OpenAiConfig,
        scraper: ScraperConfig,
        mock_mode: bool,
    ) -> Result<Self, ServiceError> {
        let client = Arc::new(OpenAiClient::new(openai, mock_mode)?);
        Ok(Self {
            chat: client.clone(),
            tts: client.clone(),
            embeddings: client,
            scraper: Arc::new(HttpScraper::new(scraper, mock_mode)?),
            vector_search: Arc::new(InMemoryVectorIndex::new()),
        })
    }

    /// Network-free services returning canned data.
    pub fn mock() -> Result<Self, ServiceError> {
        Self::build(OpenAiConfig::default(), ScraperConfig::default(), true)
    }

    /// Replaces the chat service.
    #[must_use]
    pub fn with_chat(mut self, chat: Arc<dyn ChatService>) -> Self {
        self.chat = chat;
        self
    }

    /// Replaces the scraper.
    #[must_use]
    pub fn with_scraper(mut self, scraper: Arc<dyn WebScraper>) -> Self {
        self.scraper = scraper;
        self
    }

    /// Replaces the vector search backend.
    #[must_use]
    pub fn with_vector_search(mut self, vector_search: Arc<dyn VectorSearch>) -> Self {
        self.vector_search = vector_search;
        self
    }
}

impl fmt::Debug for Services {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Services")
            .field("chat_configured", &self.chat.is_configured())
            .field("mock_mode", &self.chat.is_mock_mode())
            .finish_non_exhaustive()
    }
}
