//! Client for the official Riot news sites.
//!
//! The sites are Next.js apps: the news listing HTML embeds a `buildId` in
//! `__NEXT_DATA__`, and the page data lives at
//! `/_next/data/{buildId}/{locale}/news.json`. The build id changes on every
//! deploy, so a 404 on the data URL means the cached id went stale.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::app::{Result, RiftError};
use crate::config::sources;
use crate::domain::{Article, ArticleSource};
use crate::scraper::base::{clean_text, parse_date, resolve_url, ScraperCore, ScraperResources};
use crate::scraper::rss::MAX_FEED_ITEMS;
use crate::scraper::{ParseArticle, Scraper, ScrapingConfig};
use crate::service::NewsClient;

/// How long a discovered build id is trusted.
pub const BUILD_ID_TTL: Duration = Duration::from_secs(24 * 60 * 60);

static BUILD_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""buildId"\s*:\s*"([^"]+)""#).expect("valid regex"));

pub struct OfficialApiClient {
    core: ScraperCore,
    category: Option<String>,
    build_id: Mutex<Option<(String, Instant)>>,
}

impl OfficialApiClient {
    pub fn new(config: ScrapingConfig, locale: &str, resources: &ScraperResources) -> Self {
        Self::from_core(ScraperCore::new(config, locale, resources))
    }

    pub fn from_core(core: ScraperCore) -> Self {
        Self {
            core,
            category: None,
            build_id: Mutex::new(None),
        }
    }

    /// Narrow [`Scraper::fetch_articles`] to one news category slug.
    pub fn with_category(mut self, category: Option<&str>) -> Self {
        self.category = category.map(String::from);
        self
    }

    fn base_url(&self) -> &str {
        self.core.config().base_url.trim_end_matches('/')
    }

    pub fn news_page_url(&self, locale: &str) -> String {
        format!("{}/{}/news/", self.base_url(), locale)
    }

    pub fn data_url(&self, build_id: &str, locale: &str, category: Option<&str>) -> String {
        match category {
            Some(category) => format!(
                "{}/_next/data/{}/{}/news/{}.json",
                self.base_url(),
                build_id,
                locale,
                category
            ),
            None => format!("{}/_next/data/{}/{}/news.json", self.base_url(), build_id, locale),
        }
    }

    fn cached_build_id(&self) -> Option<String> {
        self.build_id
            .lock()
            .as_ref()
            .filter(|(_, at)| at.elapsed() < BUILD_ID_TTL)
            .map(|(id, _)| id.clone())
    }

    pub fn invalidate_build_id(&self) {
        *self.build_id.lock() = None;
    }

    async fn build_id(&self, locale: &str) -> Result<String> {
        if let Some(id) = self.cached_build_id() {
            return Ok(id);
        }

        let url = self.news_page_url(locale);
        let html = self.core.fetch_text_in(&url, locale).await?;
        let id = BUILD_ID_RE
            .captures(&html)
            .map(|caps| caps[1].to_string())
            .ok_or_else(|| RiftError::FeedParse(format!("no Next.js buildId on {}", url)))?;

        debug!(source_id = %self.core.source_id(), build_id = %id, "Discovered build id");
        *self.build_id.lock() = Some((id.clone(), Instant::now()));
        Ok(id)
    }

    async fn fetch_page_data(&self, locale: &str, category: Option<&str>) -> Result<Value> {
        let build_id = self.build_id(locale).await?;
        let url = self.data_url(&build_id, locale, category);

        match self.core.fetch_json_in(&url, locale).await {
            Err(e) if e.status() == Some(404) => {
                warn!(
                    source_id = %self.core.source_id(),
                    build_id = %build_id,
                    "Stale build id, rediscovering"
                );
                self.invalidate_build_id();
                let build_id = self.build_id(locale).await?;
                self.core
                    .fetch_json_in(&self.data_url(&build_id, locale, category), locale)
                    .await
            }
            other => other,
        }
    }

    /// Articles from every blade of a page-data document, in page order,
    /// without repeats.
    pub fn parse_page(&self, data: &Value, locale: &str, category: Option<&str>) -> Vec<Article> {
        let Some(blades) = data
            .pointer("/pageProps/page/blades")
            .and_then(Value::as_array)
        else {
            warn!(source_id = %self.core.source_id(), "Page data has no blades");
            return Vec::new();
        };

        let tag = category.map(|slug| sources::category_display(slug).unwrap_or(slug));
        let mut seen = HashSet::new();

        blades
            .iter()
            .filter_map(|blade| blade.get("items").and_then(Value::as_array))
            .flatten()
            .filter_map(|item| self.parse_item(item, locale, tag))
            .filter(|article| seen.insert(article.guid().to_string()))
            .take(MAX_FEED_ITEMS)
            .collect()
    }

    fn parse_item(&self, item: &Value, locale: &str, tag: Option<&str>) -> Option<Article> {
        let title = item.get("title").and_then(Value::as_str)?;
        let href = item.pointer("/action/payload/url").and_then(Value::as_str)?;
        let url = resolve_url(self.base_url(), href)?;

        let description = item
            .pointer("/description/body")
            .and_then(Value::as_str)
            .map(clean_text)
            .unwrap_or_default();
        let image_url = item
            .pointer("/media/url")
            .and_then(Value::as_str)
            .and_then(|src| resolve_url(self.base_url(), src));
        let pub_date = item
            .get("publishedAt")
            .and_then(Value::as_str)
            .and_then(parse_date);
        let categories = item
            .pointer("/category/title")
            .and_then(Value::as_str)
            .into_iter()
            .chain(tag);

        Article::builder(title, url, ArticleSource::new(self.core.source_id(), locale))
            .pub_date(pub_date)
            .description(description)
            .image_url(image_url)
            .categories(categories)
            .build()
            .ok()
    }
}

impl ParseArticle<Value> for OfficialApiClient {
    fn parse_article(&self, item: &Value) -> Option<Article> {
        let tag = self
            .category
            .as_deref()
            .map(|slug| sources::category_display(slug).unwrap_or(slug));
        self.parse_item(item, self.core.locale(), tag)
    }
}

#[async_trait]
impl NewsClient for OfficialApiClient {
    async fn fetch_news(&self, locale: &str, category: Option<&str>) -> Result<Vec<Article>> {
        let data = self.fetch_page_data(locale, category).await?;
        let articles = self.parse_page(&data, locale, category);
        info!(
            source_id = %self.core.source_id(),
            locale = %locale,
            category = category.unwrap_or("all"),
            count = articles.len(),
            "Fetched official news"
        );
        Ok(articles)
    }

    async fn close(&self) {
        self.core.close().await;
    }
}

#[async_trait]
impl Scraper for OfficialApiClient {
    fn source_id(&self) -> &str {
        self.core.source_id()
    }

    fn locale(&self) -> &str {
        self.core.locale()
    }

    async fn fetch_articles(&self) -> Result<Vec<Article>> {
        self.fetch_news(self.core.locale(), self.category.as_deref()).await
    }

    async fn close(&self) {
        self.core.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::breaker::CircuitBreakerRegistry;
    use crate::fetcher::mock::MockFetcher;
    use crate::robots::{RobotsGate, DEFAULT_CACHE_TTL};
    use crate::scraper::ScrapingDifficulty;

    const BASE: &str = "https://www.leagueoflegends.com";

    fn news_page(build_id: &str) -> String {
        format!(
            r#"<html><script id="__NEXT_DATA__" type="application/json">{{"props":{{}},"buildId":"{}","isFallback":false}}</script></html>"#,
            build_id
        )
    }

    const PAGE_DATA: &str = r#"{
      "pageProps": {"page": {"blades": [
        {"type": "featuredNewsHeader", "items": [
          {"title": "Patch 25.1 Notes",
           "action": {"payload": {"url": "/en-us/news/game-updates/patch-25-1-notes/"}},
           "publishedAt": "2025-01-08T19:00:00.000Z",
           "description": {"body": "<p>The first patch &amp; more</p>"},
           "media": {"url": "https://cmsassets.rgpub.io/patch.jpg"},
           "category": {"title": "Game Updates"}}
        ]},
        {"type": "articleCardGrid", "items": [
          {"title": "Patch 25.1 Notes",
           "action": {"payload": {"url": "/en-us/news/game-updates/patch-25-1-notes/"}}},
          {"title": "Dev Update",
           "action": {"payload": {"url": "https://www.leagueoflegends.com/en-us/news/dev/dev-update/"}},
           "category": {"title": "Dev"}},
          {"title": "No link here"}
        ]},
        {"type": "promo"}
      ]}}
    }"#;

    fn client(fetcher: Arc<MockFetcher>) -> OfficialApiClient {
        let resources = ScraperResources::new(
            Arc::new(RobotsGate::with_fetcher(fetcher.clone(), DEFAULT_CACHE_TTL)),
            Arc::new(CircuitBreakerRegistry::default()),
        );
        let config = ScrapingConfig::new("lol", BASE, ScrapingDifficulty::Easy).with_rate_limit(0.0);
        OfficialApiClient::from_core(ScraperCore::new(config, "en-us", &resources).with_fetcher(fetcher))
    }

    #[test]
    fn test_data_urls() {
        let client = client(Arc::new(MockFetcher::new()));
        assert_eq!(
            client.data_url("abc", "en-us", None),
            "https://www.leagueoflegends.com/_next/data/abc/en-us/news.json"
        );
        assert_eq!(
            client.data_url("abc", "ko-kr", Some("dev")),
            "https://www.leagueoflegends.com/_next/data/abc/ko-kr/news/dev.json"
        );
        assert_eq!(client.news_page_url("it-it"), "https://www.leagueoflegends.com/it-it/news/");
    }

    #[test]
    fn test_parse_page() {
        let client = client(Arc::new(MockFetcher::new()));
        let data: Value = serde_json::from_str(PAGE_DATA).unwrap();
        let articles = client.parse_page(&data, "en-us", None);

        assert_eq!(articles.len(), 2);
        let patch = &articles[0];
        assert_eq!(patch.title(), "Patch 25.1 Notes");
        assert_eq!(
            patch.url(),
            "https://www.leagueoflegends.com/en-us/news/game-updates/patch-25-1-notes/"
        );
        assert_eq!(patch.description(), "The first patch & more");
        assert_eq!(patch.image_url(), Some("https://cmsassets.rgpub.io/patch.jpg"));
        assert_eq!(patch.categories(), ["Game Updates"]);
        assert_eq!(patch.author(), "League of Legends");
        assert_eq!(patch.source_category(), crate::domain::SourceCategory::OfficialRiot);
        assert_eq!(articles[1].title(), "Dev Update");
    }

    #[test]
    fn test_category_tag_uses_display_name() {
        let client = client(Arc::new(MockFetcher::new()));
        let data: Value = serde_json::from_str(PAGE_DATA).unwrap();
        let articles = client.parse_page(&data, "en-us", Some("dev"));
        assert_eq!(articles[1].categories(), ["Dev"]);
        assert!(articles[0].categories().contains(&"Dev".to_string()));
    }

    #[test]
    fn test_missing_blades_is_empty() {
        let client = client(Arc::new(MockFetcher::new()));
        let data: Value = serde_json::from_str(r#"{"pageProps":{}}"#).unwrap();
        assert!(client.parse_page(&data, "en-us", None).is_empty());
    }

    #[tokio::test]
    async fn test_fetch_news_discovers_build_id_once() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .respond(&format!("{}/en-us/news/", BASE), 200, &news_page("b1"))
                .respond(&format!("{}/_next/data/b1/en-us/news.json", BASE), 200, PAGE_DATA)
                .respond(&format!("{}/_next/data/b1/en-us/news/dev.json", BASE), 200, PAGE_DATA),
        );
        let client = client(fetcher.clone());

        assert_eq!(client.fetch_news("en-us", None).await.unwrap().len(), 2);
        assert_eq!(client.fetch_news("en-us", Some("dev")).await.unwrap().len(), 2);
        assert_eq!(fetcher.calls_to(&format!("{}/en-us/news/", BASE)), 1);
    }

    #[tokio::test]
    async fn test_stale_build_id_retried_once() {
        let page_url = format!("{}/en-us/news/", BASE);
        let fetcher = Arc::new(
            MockFetcher::new()
                .respond(&page_url, 200, &news_page("old"))
                .respond(&format!("{}/_next/data/old/en-us/news.json", BASE), 200, PAGE_DATA),
        );
        let client = client(fetcher.clone());
        client.fetch_news("en-us", None).await.unwrap();

        fetcher.set(&page_url, 200, &news_page("new"));
        fetcher.set(&format!("{}/_next/data/old/en-us/news.json", BASE), 404, "");
        fetcher.set(&format!("{}/_next/data/new/en-us/news.json", BASE), 200, PAGE_DATA);

        let articles = client.fetch_news("en-us", None).await.unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(fetcher.calls_to(&page_url), 2);
    }

    #[tokio::test]
    async fn test_missing_build_id_is_parse_error() {
        let fetcher = Arc::new(MockFetcher::new().respond(
            &format!("{}/en-us/news/", BASE),
            200,
            "<html>maintenance</html>",
        ));
        let err = client(fetcher).fetch_news("en-us", None).await.unwrap_err();
        assert!(matches!(err, RiftError::FeedParse(_)));
    }

    #[tokio::test]
    async fn test_fetch_news_sends_requested_locale() {
        let page_url = format!("{}/ko-kr/news/", BASE);
        let data_url = format!("{}/_next/data/b1/ko-kr/news.json", BASE);
        let fetcher = Arc::new(
            MockFetcher::new()
                .respond(&page_url, 200, &news_page("b1"))
                .respond(&data_url, 200, PAGE_DATA),
        );
        // Client bound to en-us, asked for Korean news.
        let client = client(fetcher.clone());
        client.fetch_news("ko-kr", None).await.unwrap();

        assert_eq!(fetcher.accept_language_for(&page_url).as_deref(), Some("ko-KR,ko;q=0.9"));
        assert_eq!(fetcher.accept_language_for(&data_url).as_deref(), Some("ko-KR,ko;q=0.9"));
    }

    #[tokio::test]
    async fn test_scraper_uses_bound_category() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .respond(&format!("{}/en-us/news/", BASE), 200, &news_page("b1"))
                .respond(&format!("{}/_next/data/b1/en-us/news/dev.json", BASE), 200, PAGE_DATA),
        );
        let client = client(fetcher).with_category(Some("dev"));
        let articles = client.fetch_articles().await.unwrap();
        assert_eq!(articles.len(), 2);
    }
}
