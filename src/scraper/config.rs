use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::sources::SourceDefinition;
use crate::fetcher::default_user_agent;

/// How hard a source is to scrape; decides which scraper variant it needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapingDifficulty {
    /// RSS feed or JSON API
    Easy,
    /// Static HTML
    Medium,
    /// JavaScript-rendered, needs a browser
    Hard,
}

/// Configuration for scraping one source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScrapingConfig {
    pub source_id: String,
    pub base_url: String,
    pub difficulty: ScrapingDifficulty,

    /// Minimum seconds between requests (default: 1.0)
    #[serde(default = "default_rate_limit_seconds")]
    pub rate_limit_seconds: f64,

    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u64,

    /// Explicit user agent; the transparent default is used when unset
    #[serde(default)]
    pub user_agent: Option<String>,

    /// Feed URL when it differs from `base_url`
    #[serde(default)]
    pub rss_feed_url: Option<String>,

    #[serde(default)]
    pub requires_browser: bool,
}

fn default_rate_limit_seconds() -> f64 {
    1.0
}

fn default_timeout_seconds() -> u64 {
    30
}

impl ScrapingConfig {
    pub fn new(
        source_id: impl Into<String>,
        base_url: impl Into<String>,
        difficulty: ScrapingDifficulty,
    ) -> Self {
        Self {
            source_id: source_id.into(),
            base_url: base_url.into(),
            difficulty,
            rate_limit_seconds: default_rate_limit_seconds(),
            timeout_seconds: default_timeout_seconds(),
            user_agent: None,
            rss_feed_url: None,
            requires_browser: difficulty == ScrapingDifficulty::Hard,
        }
    }

    /// Build the config for a registered source.
    pub fn from_source(source: &SourceDefinition) -> Self {
        let mut config = Self::new(source.id, source.base_url, source.difficulty);
        config.rate_limit_seconds = source.rate_limit_seconds;
        config.rss_feed_url = source.feed_url.map(String::from);
        config.requires_browser = source.requires_browser();
        config
    }

    pub fn with_rss_feed_url(mut self, url: impl Into<String>) -> Self {
        self.rss_feed_url = Some(url.into());
        self
    }

    pub fn with_rate_limit(mut self, seconds: f64) -> Self {
        self.rate_limit_seconds = seconds;
        self
    }

    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// RSS override, else the base URL.
    pub fn feed_url(&self) -> &str {
        self.rss_feed_url.as_deref().unwrap_or(&self.base_url)
    }

    /// Explicit user agent, else the transparent default.
    pub fn user_agent(&self) -> &str {
        self.user_agent.as_deref().unwrap_or(default_user_agent())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }

    pub fn rate_limit(&self) -> Duration {
        Duration::from_secs_f64(self.rate_limit_seconds.max(0.0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sources;

    #[test]
    fn test_defaults() {
        let config = ScrapingConfig::new("dexerto", "https://dexerto.com", ScrapingDifficulty::Easy);
        assert_eq!(config.rate_limit_seconds, 1.0);
        assert_eq!(config.timeout_seconds, 30);
        assert!(config.user_agent.is_none());
        assert!(config.rss_feed_url.is_none());
        assert!(!config.requires_browser);
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.rate_limit(), Duration::from_secs(1));
    }

    #[test]
    fn test_feed_url_falls_back_to_base() {
        let config = ScrapingConfig::new("dexerto", "https://dexerto.com", ScrapingDifficulty::Easy);
        assert_eq!(config.feed_url(), "https://dexerto.com");

        let config = config.with_rss_feed_url("https://dexerto.com/feed/");
        assert_eq!(config.feed_url(), "https://dexerto.com/feed/");
    }

    #[test]
    fn test_user_agent_default_and_override() {
        let config = ScrapingConfig::new("x", "https://x.com", ScrapingDifficulty::Medium);
        assert!(config.user_agent().contains("RiftFeed/1.0"));

        let config = config.with_user_agent("CustomBot/2.0");
        assert_eq!(config.user_agent(), "CustomBot/2.0");
    }

    #[test]
    fn test_hard_requires_browser() {
        let config = ScrapingConfig::new("reddit", "https://reddit.com", ScrapingDifficulty::Hard);
        assert!(config.requires_browser);
    }

    #[test]
    fn test_from_source() {
        let source = sources::find("dexerto").unwrap();
        let config = ScrapingConfig::from_source(source);
        assert_eq!(config.source_id, "dexerto");
        assert_eq!(config.feed_url(), source.feed_url.unwrap());
        assert_eq!(config.difficulty, ScrapingDifficulty::Easy);

        let browser = ScrapingConfig::from_source(sources::find("lolesports").unwrap());
        assert!(browser.requires_browser);
    }

    #[test]
    fn test_difficulty_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ScrapingDifficulty::Medium).unwrap(),
            "\"medium\""
        );
        let config: ScrapingConfig = serde_json::from_str(
            r#"{"source_id":"a","base_url":"https://a.com","difficulty":"hard"}"#,
        )
        .unwrap();
        assert_eq!(config.difficulty, ScrapingDifficulty::Hard);
        assert_eq!(config.rate_limit_seconds, 1.0);
    }
}
