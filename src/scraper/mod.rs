//! Source scrapers.
//!
//! Every upstream source is read by one of four variants behind the
//! [`Scraper`] trait. All of them go through the same gates before each
//! request, provided by [`ScraperCore`]:
//!
//! ```text
//! circuit breaker → robots.txt → rate limit → fetch → parse → Vec<Article>
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! use riftfeed::scraper::{build_scraper, ScraperResources};
//!
//! let resources = ScraperResources::from_config(&config);
//! let source = riftfeed::config::sources::find("dexerto").unwrap();
//! let scraper = build_scraper(source, "en-us", None, &resources)?;
//!
//! let articles = scraper.fetch_articles().await;
//! scraper.close().await;
//! ```

mod base;
mod browser;
mod config;
mod html;
mod official;
mod rate_limit;
mod rss;

pub use base::{
    clean_text, collapse_whitespace, parse_date, resolve_url, ScraperCore, ScraperResources,
    MAX_CRAWL_DELAY,
};
pub use browser::{browser_selectors_for, BrowserScraper, BROWSER_SELECTORS};
pub use config::{ScrapingConfig, ScrapingDifficulty};
pub use html::{
    html_selectors_for, HtmlExtractor, HtmlScraper, SelectorSet, DEFAULT_SELECTORS,
    HTML_SELECTORS, MAX_PAGE_ITEMS,
};
pub use official::{OfficialApiClient, BUILD_ID_TTL};
pub use rate_limit::RateLimiter;
pub use rss::{RssScraper, MAX_FEED_ITEMS};

use async_trait::async_trait;

use crate::app::Result;
use crate::config::sources::SourceDefinition;
use crate::domain::Article;

/// A source reader bound to one locale.
#[async_trait]
pub trait Scraper: Send + Sync {
    fn source_id(&self) -> &str;

    fn locale(&self) -> &str;

    /// Fetch and parse the source's current articles.
    ///
    /// Fails with [`RiftError::PermissionDenied`](crate::app::RiftError::PermissionDenied)
    /// when robots.txt disallows the request and propagates transport and
    /// status errors. Content that yields no usable entries is an empty `Vec`.
    async fn fetch_articles(&self) -> Result<Vec<Article>>;

    /// Release the HTTP client or browser. Safe to call more than once.
    async fn close(&self);
}

/// Conversion of one raw unit (feed entry, HTML element, API record) into an
/// article. `None` means the unit lacked a title or url and should be skipped.
pub trait ParseArticle<R: ?Sized> {
    fn parse_article(&self, raw: &R) -> Option<Article>;
}

/// The scraper variant a source needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScraperKind {
    OfficialApi,
    RssFeed,
    Html,
    HeadlessBrowser,
}

impl ScraperKind {
    /// Pick a variant from config alone. Official sources are never inferred.
    pub fn infer(config: &ScrapingConfig) -> Self {
        if config.requires_browser || config.difficulty == ScrapingDifficulty::Hard {
            ScraperKind::HeadlessBrowser
        } else if config.rss_feed_url.is_some() || config.difficulty == ScrapingDifficulty::Easy {
            ScraperKind::RssFeed
        } else {
            ScraperKind::Html
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ScraperKind::OfficialApi => "official_api",
            ScraperKind::RssFeed => "rss",
            ScraperKind::Html => "html",
            ScraperKind::HeadlessBrowser => "browser",
        }
    }
}

impl std::fmt::Display for ScraperKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Build the scraper for `source`. `category` only narrows official sources.
pub fn build_scraper(
    source: &SourceDefinition,
    locale: &str,
    category: Option<&str>,
    resources: &ScraperResources,
) -> Result<Box<dyn Scraper>> {
    let config = ScrapingConfig::from_source(source).with_timeout(resources.http.timeout_secs);

    let scraper: Box<dyn Scraper> = match source.kind {
        ScraperKind::OfficialApi => Box::new(
            OfficialApiClient::new(config, locale, resources).with_category(category),
        ),
        ScraperKind::RssFeed => Box::new(RssScraper::new(config, locale, resources)),
        ScraperKind::Html => Box::new(HtmlScraper::new(config, locale, resources)?),
        ScraperKind::HeadlessBrowser => Box::new(BrowserScraper::new(config, locale, resources)?),
    };
    Ok(scraper)
}
