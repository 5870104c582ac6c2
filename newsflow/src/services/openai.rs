//! OpenAI-compatible chat, speech and embedding client.

use super::{canned, ChatOptions, ChatService, EmbeddingService, TtsOptions, TtsService};
use crate::errors::ServiceError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::path::PathBuf;
use std::time::Duration;
use tracing::debug;

/// Connection settings for an OpenAI-compatible API.
#[derive(Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    /// API key. Without one (and outside mock mode) the client is unconfigured.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// API root.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Default chat model.
    #[serde(default = "default_chat_model")]
    pub chat_model: String,
    /// Speech model.
    #[serde(default = "default_tts_model")]
    pub tts_model: String,
    /// Speech voice.
    #[serde(default = "default_tts_voice")]
    pub tts_voice: String,
    /// Embedding model.
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Directory synthesized audio is written to.
    #[serde(default = "default_audio_dir")]
    pub audio_dir: PathBuf,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_chat_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_tts_model() -> String {
    "tts-1".to_string()
}

fn default_tts_voice() -> String {
    "alloy".to_string()
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_timeout_secs() -> u64 {
    60
}

fn default_audio_dir() -> PathBuf {
    PathBuf::from("audio")
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            chat_model: default_chat_model(),
            tts_model: default_tts_model(),
            tts_voice: default_tts_voice(),
            embedding_model: default_embedding_model(),
            timeout_secs: default_timeout_secs(),
            audio_dir: default_audio_dir(),
        }
    }
}

impl std::fmt::Debug for OpenAiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "***"))
            .field("base_url", &self.base_url)
            .field("chat_model", &self.chat_model)
            .field("tts_model", &self.tts_model)
            .field("embedding_model", &self.embedding_model)
            .field("timeout_secs", &self.timeout_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    embedding: Vec<f32>,
}

/// Client for an OpenAI-compatible API.
///
/// In mock mode no request is ever sent; every call returns canned,
/// deterministic data.
#[derive(Debug)]
pub struct OpenAiClient {
    config: OpenAiConfig,
    http: reqwest::Client,
    mock_mode: bool,
}

impl OpenAiClient {
    /// Creates a client.
    pub fn new(config: OpenAiConfig, mock_mode: bool) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            config,
            http,
            mock_mode,
        })
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &OpenAiConfig {
        &self.config
    }

    fn api_key(&self) -> Result<&str, ServiceError> {
        self.config
            .api_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| ServiceError::NotConfigured("OPENAI_API_KEY is not set".to_string()))
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    async fn post(&self, path: &str, body: serde_json::Value) -> Result<reqwest::Response, ServiceError> {
        let response = self
            .http
            .post(self.endpoint(path))
            .bearer_auth(self.api_key()?)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    ServiceError::Timeout
                } else {
                    ServiceError::Http(e)
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let mut body = response.text().await.unwrap_or_default();
            body.truncate(500);
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl ChatService for OpenAiClient {
    async fn chat(
        &self,
        system_prompt: &str,
        user_prompt: &str,
        options: &ChatOptions,
    ) -> Result<String, ServiceError> {
        if self.mock_mode {
            return Ok(canned::chat_response(options.tag.as_deref(), user_prompt));
        }

        let model = options.model.as_deref().unwrap_or(&self.config.chat_model);
        let mut body = json!({
            "model": model,
            "messages": [
                ChatMessage { role: "system", content: system_prompt },
                ChatMessage { role: "user", content: user_prompt },
            ],
        });
        if let Some(temperature) = options.temperature {
            body["temperature"] = json!(temperature);
        }
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }

        debug!(model, tag = ?options.tag, "Sending chat completion");
        let completion: ChatCompletion = self.post("chat/completions", body).await?.json().await?;
        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| ServiceError::InvalidResponse("empty chat completion".to_string()))
    }

    fn is_configured(&self) -> bool {
        self.mock_mode || self.api_key().is_ok()
    }

    fn is_mock_mode(&self) -> bool {
        self.mock_mode
    }
}

#[async_trait]
impl TtsService for OpenAiClient {
    async fn text_to_speech(
        &self,
        text: &str,
        options: &TtsOptions,
    ) -> Result<String, ServiceError> {
        let format = options.format.as_deref().unwrap_or("mp3");
        if self.mock_mode {
            return Ok(canned::audio_identifier(text, format));
        }

        let body = json!({
            "model": options.model.as_deref().unwrap_or(&self.config.tts_model),
            "voice": options.voice.as_deref().unwrap_or(&self.config.tts_voice),
            "input": text,
            "response_format": format,
        });
        let audio = self.post("audio/speech", body).await?.bytes().await?;
        if audio.is_empty() {
            return Err(ServiceError::InvalidResponse("empty audio".to_string()));
        }

        let path = self
            .config
            .audio_dir
            .join(format!("{}.{format}", canned::digest(text, 16)));
        tokio::fs::create_dir_all(&self.config.audio_dir)
            .await
            .map_err(|e| ServiceError::InvalidResponse(format!("cannot create audio dir: {e}")))?;
        tokio::fs::write(&path, &audio)
            .await
            .map_err(|e| ServiceError::InvalidResponse(format!("cannot store audio: {e}")))?;
        Ok(path.display().to_string())
    }
}

#[async_trait]
impl EmbeddingService for OpenAiClient {
    async fn create_embedding(&self, text: &str) -> Result<Vec<f32>, ServiceError> {
        if self.mock_mode {
            return Ok(canned::embedding(text));
        }

        let body = json!({
            "model": self.config.embedding_model,
            "input": text,
        });
        let response: EmbeddingResponse = self.post("embeddings", body).await?.json().await?;
        response
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .filter(|e| !e.is_empty())
            .ok_or_else(|| ServiceError::InvalidResponse("empty embedding".to_string()))
    }
}
