//! HTTP article scraper.

use super::{canned, ScrapedArticle, WebScraper};
use crate::errors::ServiceError;
use async_trait::async_trait;
use regex::Regex;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use std::time::Duration;
use tracing::debug;

static WHITESPACE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("static regex is valid"));

/// Configuration for page fetching.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScraperConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
    /// User agent string.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Maximum response size in bytes.
    #[serde(default = "default_max_size")]
    pub max_response_bytes: usize,
}

fn default_timeout() -> u64 {
    20
}

fn default_user_agent() -> String {
    format!("newsflow/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_size() -> usize {
    5 * 1024 * 1024
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout(),
            user_agent: default_user_agent(),
            max_response_bytes: default_max_size(),
        }
    }
}

/// Fetches pages over HTTP and extracts article fields from the HTML.
#[derive(Debug)]
pub struct HttpScraper {
    config: ScraperConfig,
    http: reqwest::Client,
    mock_mode: bool,
}

impl HttpScraper {
    /// Creates a scraper.
    pub fn new(config: ScraperConfig, mock_mode: bool) -> Result<Self, ServiceError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self {
            config,
            http,
            mock_mode,
        })
    }
}

#[async_trait]
impl WebScraper for HttpScraper {
    async fn fetch(&self, url: &str) -> Result<ScrapedArticle, ServiceError> {
        if self.mock_mode {
            return Ok(canned::article(url));
        }

        let response = self.http.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                ServiceError::Timeout
            } else {
                ServiceError::Http(e)
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status {
                status: status.as_u16(),
                body: String::new(),
            });
        }
        if response
            .content_length()
            .is_some_and(|len| len > self.config.max_response_bytes as u64)
        {
            return Err(ServiceError::Scrape("page too large".to_string()));
        }

        let html = response.text().await?;
        if html.len() > self.config.max_response_bytes {
            return Err(ServiceError::Scrape("page too large".to_string()));
        }
        debug!(url, bytes = html.len(), "Fetched page");
        extract_article(&html)
    }
}

fn selector(css: &str) -> Result<Selector, ServiceError> {
    Selector::parse(css).map_err(|e| ServiceError::Scrape(format!("bad selector {css}: {e}")))
}

fn normalize(text: &str) -> String {
    WHITESPACE.replace_all(text, " ").trim().to_string()
}

fn meta_content(document: &Html, selectors: &[&str]) -> Result<Option<String>, ServiceError> {
    for css in selectors {
        let sel = selector(css)?;
        let found = document
            .select(&sel)
            .filter_map(|el| el.value().attr("content").or_else(|| el.value().attr("datetime")))
            .map(normalize)
            .find(|v| !v.is_empty());
        if found.is_some() {
            return Ok(found);
        }
    }
    Ok(None)
}

fn paragraphs(document: &Html, css: &str) -> Result<Vec<String>, ServiceError> {
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .map(|el| normalize(&el.text().collect::<String>()))
        .filter(|p| !p.is_empty())
        .collect())
}

/// Extracts article fields from an HTML document.
///
/// Fails when the page has neither a title nor any paragraph text.
pub fn extract_article(html: &str) -> Result<ScrapedArticle, ServiceError> {
    let document = Html::parse_document(html);

    let title = match meta_content(&document, &[r#"meta[property="og:title"]"#])? {
        Some(title) => title,
        None => {
            let sel = selector("title")?;
            document
                .select(&sel)
                .next()
                .map(|el| normalize(&el.text().collect::<String>()))
                .unwrap_or_default()
        }
    };

    let mut body = paragraphs(&document, "article p")?;
    if body.is_empty() {
        body = paragraphs(&document, "p")?;
    }
    let content = body.join("\n\n");

    if title.is_empty() && content.is_empty() {
        return Err(ServiceError::Scrape("no article content found".to_string()));
    }

    let language = {
        let sel = selector("html")?;
        document
            .select(&sel)
            .next()
            .and_then(|el| el.value().attr("lang"))
            .map(str::to_string)
    };

    Ok(ScrapedArticle {
        title,
        content,
        description: meta_content(
            &document,
            &[r#"meta[property="og:description"]"#, r#"meta[name="description"]"#],
        )?,
        author: meta_content(
            &document,
            &[r#"meta[name="author"]"#, r#"meta[property="article:author"]"#],
        )?,
        published_at: meta_content(
            &document,
            &[r#"meta[property="article:published_time"]"#, "time[datetime]"],
        )?,
        image_url: meta_content(&document, &[r#"meta[property="og:image"]"#])?,
        language,
    })
}
