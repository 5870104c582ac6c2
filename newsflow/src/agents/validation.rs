//! URL validation and article extraction.

use super::{Agent, AgentBase, AgentConfig, AgentRole, PromptTemplate, VALIDATION_AGENT};
use crate::context::PipelineContext;
use crate::core::{AgentResult, ArticleData};
use crate::errors::{NewsflowError, Result};
use crate::events::SharedEventSink;
use crate::services::{ScrapedArticle, WebScraper};
use async_trait::async_trait;
use reqwest::Url;
use serde_json::{json, Map};
use std::fmt;
use std::sync::Arc;
use tracing::info;

const DEFAULT_BLOCKED: [&str; 3] = ["localhost", "127.0.0.1", "0.0.0.0"];

/// Checks the URL, fetches the page and extracts the article.
///
/// Settings under `extra`:
/// - `min_content_length` (default 200): shortest accepted body, in characters
/// - `blocked_domains`: added to the built-in loopback block list
/// - `allowed_domains`: if non-empty, only these domains (and subdomains) pass
pub struct ValidationAgent {
    base: AgentBase,
    scraper: Arc<dyn WebScraper>,
    blocked: Vec<String>,
    allowed: Vec<String>,
    min_content_length: usize,
}

impl fmt::Debug for ValidationAgent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValidationAgent")
            .field("base", &self.base)
            .field("blocked", &self.blocked)
            .field("allowed", &self.allowed)
            .field("min_content_length", &self.min_content_length)
            .finish_non_exhaustive()
    }
}

impl ValidationAgent {
    /// Default configuration.
    #[must_use]
    pub fn default_config() -> AgentConfig {
        AgentConfig {
            timeout_secs: 20,
            ..AgentConfig::default()
        }
        .with_extra("min_content_length", json!(200))
    }

    /// Creates the agent.
    #[must_use]
    pub fn new(config: AgentConfig, scraper: Arc<dyn WebScraper>, events: SharedEventSink) -> Self {
        let mut blocked: Vec<String> = DEFAULT_BLOCKED.iter().map(|d| (*d).to_string()).collect();
        blocked.extend(
            config
                .extra_str_list("blocked_domains")
                .into_iter()
                .map(|d| d.to_lowercase()),
        );
        let allowed = config
            .extra_str_list("allowed_domains")
            .into_iter()
            .map(|d| d.to_lowercase())
            .collect();
        let min_content_length = config.extra_usize("min_content_length", 200);

        Self {
            base: AgentBase::new(VALIDATION_AGENT, config, events),
            scraper,
            blocked,
            allowed,
            min_content_length,
        }
    }

    /// Checks a URL and returns its host, or the reason it is rejected.
    pub fn check_url(&self, url: &str) -> std::result::Result<String, String> {
        let parsed = Url::parse(url.trim()).map_err(|e| format!("not a valid URL: {e}"))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(format!("unsupported scheme '{}'", parsed.scheme()));
        }
        let host = parsed
            .host_str()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| "URL has no host".to_string())?
            .to_lowercase();

        if self.blocked.iter().any(|d| domain_matches(&host, d)) {
            return Err(format!("domain '{host}' is blocked"));
        }
        if !self.allowed.is_empty() && !self.allowed.iter().any(|d| domain_matches(&host, d)) {
            return Err(format!("domain '{host}' is not in the allow list"));
        }
        Ok(host)
    }
}

fn domain_matches(host: &str, domain: &str) -> bool {
    host == domain
        || host
            .strip_suffix(domain)
            .is_some_and(|prefix| prefix.ends_with('.'))
}

fn to_article(url: &str, scraped: ScrapedArticle) -> ArticleData {
    let mut article = ArticleData::new(url, scraped.title, scraped.content);
    article.description = scraped.description;
    article.author = scraped.author;
    article.published_at = scraped.published_at;
    article.image_url = scraped.image_url;
    article.language = scraped.language;
    article
}

#[async_trait]
impl Agent for ValidationAgent {
    fn name(&self) -> &str {
        self.base.name()
    }

    fn role(&self) -> AgentRole {
        AgentRole::Validation
    }

    fn config(&self) -> &AgentConfig {
        self.base.config()
    }

    async fn initialize(&self) -> Result<()> {
        // No prompt; initialization only marks the agent ready.
        self.base.initialize(PromptTemplate::default()).await
    }

    fn is_ready(&self) -> bool {
        self.base.is_initialized()
    }

    fn validate(&self, ctx: &PipelineContext) -> bool {
        self.check_url(ctx.url()).is_ok()
    }

    async fn process(&self, ctx: &PipelineContext) -> Result<AgentResult> {
        let url = ctx.url().trim();
        let domain = match self.check_url(url) {
            Ok(host) => host,
            Err(reason) => return Ok(self.base.failure(format!("Invalid URL {url}: {reason}"))),
        };

        let policy = self.config().retry_policy()?;
        let fetched = policy
            .run_if(
                "scrape",
                || async move { self.scraper.fetch(url).await.map_err(NewsflowError::from) },
                NewsflowError::is_transient,
            )
            .await;
        let scraped = match fetched {
            Ok(scraped) => scraped,
            Err(e) => return Ok(self.base.failure(format!("Failed to fetch article: {e}"))),
        };

        let article = to_article(url, scraped);
        let length = article.content_length();
        if length < self.min_content_length {
            return Ok(self.base.failure(format!(
                "Article content too short: {length} characters (minimum {})",
                self.min_content_length
            )));
        }

        info!(
            agent = self.name(),
            domain = %domain,
            chars = length,
            words = article.word_count(),
            "Article extracted"
        );

        let mut data = Map::new();
        data.insert("article".to_string(), article.to_value());
        data.insert("url".to_string(), json!(url));
        data.insert("domain".to_string(), json!(domain));
        Ok(AgentResult::success(data))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::ServiceError;
    use crate::events::default_sink;
    use crate::services::MockWebScraper;
    use pretty_assertions::assert_eq;

    fn long_article() -> ScrapedArticle {
        ScrapedArticle {
            title: "Headline".to_string(),
            content: "word ".repeat(60),
            image_url: Some("https://img.example.com/a.jpg".to_string()),
            ..ScrapedArticle::default()
        }
    }

    fn fast_config() -> AgentConfig {
        AgentConfig {
            retry_base_delay_ms: 0,
            ..ValidationAgent::default_config()
        }
    }

    fn agent_with(scraper: MockWebScraper, config: AgentConfig) -> ValidationAgent {
        ValidationAgent::new(config, Arc::new(scraper), default_sink())
    }

    #[test]
    fn test_check_url_rules() {
        let agent = agent_with(MockWebScraper::new(), fast_config());

        assert_eq!(agent.check_url("https://News.Example.com/a").unwrap(), "news.example.com");
        assert!(agent.check_url("not a url").is_err());
        assert!(agent.check_url("ftp://example.com/file").is_err());
        assert!(agent.check_url("http://localhost:8080/").is_err());
        assert!(agent.check_url("http://127.0.0.1/").is_err());
    }

    #[test]
    fn test_blocked_and_allowed_domains() {
        let config = fast_config()
            .with_extra("blocked_domains", json!(["spam.com"]))
            .with_extra("allowed_domains", json!(["example.com", "spam.com"]));
        let agent = agent_with(MockWebScraper::new(), config);

        assert!(agent.check_url("https://www.example.com/story").is_ok());
        assert!(agent.check_url("https://cdn.spam.com/x").is_err());
        assert!(agent.check_url("https://other.org/").is_err());
        assert!(agent.check_url("https://notexample.com/").is_err());
    }

    #[tokio::test]
    async fn test_process_extracts_article() {
        let mut scraper = MockWebScraper::new();
        scraper
            .expect_fetch()
            .times(1)
            .returning(|_| Ok(long_article()));
        let agent = agent_with(scraper, fast_config());
        agent.initialize().await.unwrap();

        let ctx = PipelineContext::new("https://example.com/news/1");
        let result = agent.process(&ctx).await.unwrap();

        assert!(result.is_success());
        assert_eq!(result.get_str("domain"), Some("example.com"));
        let article = ArticleData::from_value(result.get("article").unwrap()).unwrap();
        assert_eq!(article.url, "https://example.com/news/1");
        assert_eq!(article.title, "Headline");
    }

    #[tokio::test]
    async fn test_invalid_url_fails_without_fetching() {
        let mut scraper = MockWebScraper::new();
        scraper.expect_fetch().never();
        let agent = agent_with(scraper, fast_config());

        let ctx = PipelineContext::new("not a url");
        assert!(!agent.validate(&ctx));
        let result = agent.process(&ctx).await.unwrap();

        assert!(result.is_failure());
        assert!(result.error_message().unwrap().contains("Invalid URL"));
    }

    #[tokio::test]
    async fn test_short_content_fails() {
        let mut scraper = MockWebScraper::new();
        scraper.expect_fetch().returning(|_| {
            Ok(ScrapedArticle {
                title: "Tiny".to_string(),
                content: "Too short.".to_string(),
                ..ScrapedArticle::default()
            })
        });
        let agent = agent_with(scraper, fast_config());

        let result = agent
            .process(&PipelineContext::new("https://example.com/x"))
            .await
            .unwrap();

        assert!(result.is_failure());
        assert!(result.error_message().unwrap().contains("too short"));
    }

    #[tokio::test]
    async fn test_transient_fetch_errors_are_retried() {
        let mut scraper = MockWebScraper::new();
        scraper
            .expect_fetch()
            .times(3)
            .returning(|_| Err(ServiceError::Timeout));
        let agent = agent_with(scraper, fast_config());

        let result = agent
            .process(&PipelineContext::new("https://example.com/x"))
            .await
            .unwrap();

        assert!(result.is_failure());
        assert!(result
            .error_message()
            .unwrap()
            .starts_with("Failed to fetch article"));
    }

    #[tokio::test]
    async fn test_permanent_fetch_errors_are_not_retried() {
        let mut scraper = MockWebScraper::new();
        scraper.expect_fetch().times(1).returning(|_| {
            Err(ServiceError::Status {
                status: 404,
                body: String::new(),
            })
        });
        let agent = agent_with(scraper, fast_config());

        let result = agent
            .process(&PipelineContext::new("https://example.com/missing"))
            .await
            .unwrap();
        assert!(result.is_failure());
    }

    #[tokio::test]
    async fn test_ready_after_initialize() {
        let agent = agent_with(MockWebScraper::new(), fast_config());
        assert!(!agent.is_ready());
        agent.initialize().await.unwrap();
        agent.initialize().await.unwrap();
        assert!(agent.is_ready());
    }
}
