use std::sync::LazyLock;

use ::scraper::{ElementRef, Html, Selector};
use async_trait::async_trait;
use regex::Regex;
use tracing::{debug, info};

use crate::app::{Result, RiftError};
use crate::domain::{Article, ArticleSource};
use crate::scraper::base::{collapse_whitespace, parse_date, resolve_url, ScraperCore, ScraperResources};
use crate::scraper::{ParseArticle, Scraper, ScrapingConfig};

/// At most this many article containers are read from one page.
pub const MAX_PAGE_ITEMS: usize = 50;

/// CSS selectors locating article data on a listing page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectorSet {
    pub article: &'static str,
    pub title: &'static str,
    pub url: &'static str,
    pub description: &'static str,
    pub image: &'static str,
    pub date: &'static str,
}

/// Used for sources without an entry in [`HTML_SELECTORS`].
pub const DEFAULT_SELECTORS: SelectorSet = SelectorSet {
    article: "article, .article, .post, .news-item",
    title: "h1 a, h2 a, h3 a, h1, h2, h3, .title",
    url: "a[href]",
    description: ".excerpt, .summary, .description, p",
    image: "img",
    date: "time, .date",
};

pub static HTML_SELECTORS: &[(&str, SelectorSet)] = &[
    ("dexerto", SelectorSet {
        article: "article.post",
        title: "h2 a, h3 a, h2, h3",
        url: "a[href]",
        description: ".excerpt, p",
        image: "img",
        date: "time",
    }),
    ("dotesports", SelectorSet {
        article: "article, .post-card",
        title: "h2 a, h3 a, .entry-title",
        url: "a[href]",
        description: ".excerpt, .entry-summary, p",
        image: "img",
        date: "time",
    }),
    ("esportsgg", SelectorSet {
        article: "article, .article-card",
        title: "h2, h3, .article-card__title",
        url: "a[href]",
        description: ".article-card__excerpt, p",
        image: "img",
        date: "time, .article-card__date",
    }),
    ("ggrecon", SelectorSet {
        article: "article, .article-tile",
        title: "h2, h3, .article-tile__title",
        url: "a[href]",
        description: ".article-tile__summary, p",
        image: "img",
        date: "time",
    }),
    ("nme", SelectorSet {
        article: ".td_module_flex, article",
        title: ".entry-title a, h3 a",
        url: ".entry-title a, a[href]",
        description: ".td-excerpt, p",
        image: ".entry-thumb, img",
        date: "time",
    }),
    ("pcgamesn", SelectorSet {
        article: "article.entry, article",
        title: "h3 a, h2 a, .entry-title",
        url: "a[href]",
        description: ".excerpt, p",
        image: "img",
        date: "time",
    }),
    ("thegamer", SelectorSet {
        article: ".display-card, article",
        title: ".display-card-title a, h5 a, h3 a",
        url: ".display-card-title a, a[href]",
        description: ".display-card-excerpt, p",
        image: "img",
        date: "time",
    }),
    ("upcomer", SelectorSet {
        article: "article, .article-card",
        title: "h2, h3",
        url: "a[href]",
        description: ".excerpt, p",
        image: "img",
        date: "time",
    }),
    ("inven", SelectorSet {
        article: ".news-list li, .list-common li",
        title: ".title, .subject a, a",
        url: "a[href]",
        description: ".summary, .content",
        image: "img",
        date: ".date, .info .date",
    }),
    ("opgg", SelectorSet {
        article: "article, .news-item",
        title: "h2, h3, .title",
        url: "a[href]",
        description: ".summary, p",
        image: "img",
        date: "time, .date",
    }),
    ("3djuegos", SelectorSet {
        article: "article, .article-item",
        title: "h2 a, h3 a, .title",
        url: "a[href]",
        description: ".excerpt, .summary, p",
        image: "img",
        date: "time",
    }),
    ("earlygame", SelectorSet {
        article: "article, .article-teaser",
        title: "h2, h3, .teaser-title",
        url: "a[href]",
        description: ".teaser-text, p",
        image: "img",
        date: "time",
    }),
    ("mobalytics", SelectorSet {
        article: "article, .blog-post-card",
        title: "h2, h3, .post-title",
        url: "a[href]",
        description: ".post-excerpt, p",
        image: "img",
        date: "time, .post-date",
    }),
    ("blitz-gg", SelectorSet {
        article: "article, .article-card",
        title: "h2, h3, .article-title",
        url: "a[href]",
        description: ".article-summary, p",
        image: "img",
        date: "time",
    }),
    ("porofessor", SelectorSet {
        article: ".news-item, article",
        title: "h2, h3, .news-title",
        url: "a[href]",
        description: ".news-summary, p",
        image: "img",
        date: ".date, time",
    }),
    ("bunnymuffins", SelectorSet {
        article: "article, .post",
        title: ".entry-title a, h2 a, h2",
        url: ".entry-title a, a[href]",
        description: ".entry-summary, .excerpt, p",
        image: "img",
        date: "time",
    }),
    ("tftactics", SelectorSet {
        article: ".guide-card, article",
        title: ".guide-title, h2, h3",
        url: "a[href]",
        description: ".guide-summary, p",
        image: "img",
        date: "time, .date",
    }),
];

pub fn html_selectors_for(source_id: &str) -> &'static SelectorSet {
    HTML_SELECTORS
        .iter()
        .find(|(id, _)| *id == source_id)
        .map(|(_, set)| set)
        .unwrap_or(&DEFAULT_SELECTORS)
}

static BACKGROUND_IMAGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"background-image\s*:\s*url\(\s*['"]?([^'")]+)['"]?\s*\)"#).expect("valid regex")
});

static BACKGROUND_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(r#"[style*="background-image"]"#).expect("valid selector")
});

struct CompiledSelectors {
    article: Selector,
    title: Selector,
    url: Selector,
    description: Selector,
    image: Selector,
    date: Selector,
}

fn compile(selector: &str) -> Result<Selector> {
    Selector::parse(selector)
        .map_err(|e| RiftError::Config(format!("invalid CSS selector '{}': {}", selector, e)))
}

impl CompiledSelectors {
    fn new(set: &SelectorSet) -> Result<Self> {
        Ok(Self {
            article: compile(set.article)?,
            title: compile(set.title)?,
            url: compile(set.url)?,
            description: compile(set.description)?,
            image: compile(set.image)?,
            date: compile(set.date)?,
        })
    }
}

/// Turns listing-page HTML into articles using one [`SelectorSet`].
/// Shared by the static HTML and headless-browser scrapers.
pub struct HtmlExtractor {
    source: ArticleSource,
    base_url: String,
    selectors: CompiledSelectors,
}

impl HtmlExtractor {
    pub fn new(source: ArticleSource, base_url: impl Into<String>, set: &SelectorSet) -> Result<Self> {
        Ok(Self {
            source,
            base_url: base_url.into(),
            selectors: CompiledSelectors::new(set)?,
        })
    }

    /// Extract up to `limit` articles. Containers without a title or url are skipped.
    pub fn extract(&self, html: &str, limit: usize) -> Vec<Article> {
        let document = Html::parse_document(html);
        let articles: Vec<Article> = document
            .select(&self.selectors.article)
            .take(limit)
            .filter_map(|element| self.parse_article(&element))
            .collect();

        debug!(
            source_id = %self.source.source_id,
            count = articles.len(),
            "Extracted articles from HTML"
        );
        articles
    }

    fn element_text(element: &ElementRef<'_>) -> String {
        collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
    }

    fn title(&self, element: &ElementRef<'_>) -> Option<String> {
        let title = element
            .select(&self.selectors.title)
            .map(|e| Self::element_text(&e))
            .find(|t| !t.is_empty())
            .unwrap_or_else(|| Self::element_text(element));
        (!title.is_empty()).then_some(title)
    }

    fn url(&self, element: &ElementRef<'_>) -> Option<String> {
        element
            .select(&self.selectors.url)
            .filter_map(|e| e.value().attr("href"))
            .chain(element.value().attr("href"))
            .find_map(|href| resolve_url(&self.base_url, href))
    }

    fn description(&self, element: &ElementRef<'_>) -> String {
        element
            .select(&self.selectors.description)
            .map(|e| Self::element_text(&e))
            .find(|t| !t.is_empty())
            .unwrap_or_default()
    }

    fn date(&self, element: &ElementRef<'_>) -> Option<chrono::DateTime<chrono::Utc>> {
        element.select(&self.selectors.date).find_map(|e| {
            e.value()
                .attr("datetime")
                .and_then(parse_date)
                .or_else(|| parse_date(&Self::element_text(&e)))
        })
    }

    /// `src`, then lazy-load `data-src`, then a CSS background image.
    fn image(&self, element: &ElementRef<'_>) -> Option<String> {
        let from_img = element.select(&self.selectors.image).find_map(|img| {
            let attrs = img.value();
            let src = attrs
                .attr("src")
                .map(str::trim)
                .filter(|s| !s.is_empty() && !s.starts_with("data:"));
            src.or_else(|| attrs.attr("data-src"))
                .and_then(|s| resolve_url(&self.base_url, s))
        });
        if from_img.is_some() {
            return from_img;
        }

        std::iter::once(*element)
            .chain(element.select(&BACKGROUND_SELECTOR))
            .filter_map(|e| e.value().attr("style"))
            .filter_map(|style| BACKGROUND_IMAGE_RE.captures(style))
            .find_map(|caps| resolve_url(&self.base_url, &caps[1]))
    }
}

impl<'a> ParseArticle<ElementRef<'a>> for HtmlExtractor {
    fn parse_article(&self, element: &ElementRef<'a>) -> Option<Article> {
        let title = self.title(element)?;
        let url = self.url(element)?;

        Article::builder(title, url, self.source.clone())
            .pub_date(self.date(element))
            .description(self.description(element))
            .image_url(self.image(element))
            .build()
            .ok()
    }
}

/// Scraper for static HTML listing pages.
pub struct HtmlScraper {
    core: ScraperCore,
    extractor: HtmlExtractor,
    page_url: String,
}

impl HtmlScraper {
    pub fn new(config: ScrapingConfig, locale: &str, resources: &ScraperResources) -> Result<Self> {
        Self::from_core(ScraperCore::new(config, locale, resources))
    }

    pub fn from_core(core: ScraperCore) -> Result<Self> {
        let set = html_selectors_for(core.source_id());
        let extractor = HtmlExtractor::new(
            ArticleSource::new(core.source_id(), core.locale()),
            core.config().base_url.clone(),
            set,
        )?;
        let page_url = core.config().base_url.clone();
        Ok(Self {
            core,
            extractor,
            page_url,
        })
    }

    /// Scrape this page instead of the base URL.
    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = url.into();
        self
    }

    pub fn extract(&self, html: &str) -> Vec<Article> {
        self.extractor.extract(html, MAX_PAGE_ITEMS)
    }
}

impl<'a> ParseArticle<ElementRef<'a>> for HtmlScraper {
    fn parse_article(&self, element: &ElementRef<'a>) -> Option<Article> {
        self.extractor.parse_article(element)
    }
}

#[async_trait]
impl Scraper for HtmlScraper {
    fn source_id(&self) -> &str {
        self.core.source_id()
    }

    fn locale(&self) -> &str {
        self.core.locale()
    }

    async fn fetch_articles(&self) -> Result<Vec<Article>> {
        let html = self.core.fetch_text(&self.page_url).await?;
        let articles = self.extract(&html);
        info!(
            source_id = %self.core.source_id(),
            locale = %self.core.locale(),
            count = articles.len(),
            "Scraped HTML page"
        );
        Ok(articles)
    }

    async fn close(&self) {
        self.core.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};

    use crate::breaker::CircuitBreakerRegistry;
    use crate::fetcher::mock::MockFetcher;
    use crate::robots::{RobotsGate, DEFAULT_CACHE_TTL};
    use crate::scraper::ScrapingDifficulty;

    const PAGE: &str = r#"
<html><body>
  <article class="post">
    <h2><a href="/x">First headline</a></h2>
    <p class="excerpt">  Short
       summary  </p>
    <img src="https://cdn.dexerto.com/a.jpg" data-src="https://cdn.dexerto.com/lazy.jpg">
    <time datetime="2025-01-01T12:00:00Z">Jan 1</time>
  </article>
  <article class="post">
    <h2><a href="https://dexerto.com/second">Second</a></h2>
    <img data-src="/lazy.jpg">
    <time>Jan 2, 2025</time>
  </article>
  <article class="post">
    <p>No heading, no link</p>
  </article>
  <article class="post">
    <h3><a href="/bg">Background</a></h3>
    <div class="thumb" style="background-image: url('/bg.png')"></div>
  </article>
</body></html>"#;

    fn scraper_with(fetcher: Arc<MockFetcher>) -> HtmlScraper {
        let resources = ScraperResources::new(
            Arc::new(RobotsGate::with_fetcher(fetcher.clone(), DEFAULT_CACHE_TTL)),
            Arc::new(CircuitBreakerRegistry::default()),
        );
        let config = ScrapingConfig::new("dexerto", "https://dexerto.com", ScrapingDifficulty::Medium)
            .with_rate_limit(0.0);
        HtmlScraper::from_core(ScraperCore::new(config, "en-us", &resources).with_fetcher(fetcher))
            .unwrap()
    }

    #[test]
    fn test_extract_articles() {
        let articles = scraper_with(Arc::new(MockFetcher::new())).extract(PAGE);
        assert_eq!(articles.len(), 3);

        let first = &articles[0];
        assert_eq!(first.title(), "First headline");
        assert_eq!(first.url(), "https://dexerto.com/x");
        assert_eq!(first.description(), "Short summary");
        assert_eq!(first.image_url(), Some("https://cdn.dexerto.com/a.jpg"));
        assert_eq!(
            first.pub_date(),
            Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
        );

        let second = &articles[1];
        assert_eq!(second.url(), "https://dexerto.com/second");
        assert_eq!(second.image_url(), Some("https://dexerto.com/lazy.jpg"));
        assert_eq!(
            second.pub_date(),
            Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap()
        );

        assert_eq!(articles[2].image_url(), Some("https://dexerto.com/bg.png"));
    }

    #[test]
    fn test_src_preferred_over_data_src() {
        let html = r#"<article class="post"><h2><a href="/a">A</a></h2>
            <img src="/real.jpg" data-src="/lazy.jpg"></article>"#;
        let articles = scraper_with(Arc::new(MockFetcher::new())).extract(html);
        assert_eq!(articles[0].image_url(), Some("https://dexerto.com/real.jpg"));
    }

    #[test]
    fn test_relative_href_resolved() {
        let html = r#"<article class="post"><h2><a href="/x">X</a></h2></article>"#;
        let articles = scraper_with(Arc::new(MockFetcher::new())).extract(html);
        assert_eq!(articles[0].url(), "https://dexerto.com/x");
    }

    #[test]
    fn test_container_cap() {
        let mut html = String::new();
        for i in 0..80 {
            html.push_str(&format!(
                r#"<article class="post"><h2><a href="/{i}">Item {i}</a></h2></article>"#
            ));
        }
        let articles = scraper_with(Arc::new(MockFetcher::new())).extract(&html);
        assert_eq!(articles.len(), MAX_PAGE_ITEMS);
    }

    #[test]
    fn test_unknown_source_uses_default_selectors() {
        assert_eq!(html_selectors_for("nobody"), &DEFAULT_SELECTORS);
        assert_eq!(html_selectors_for("dexerto").article, "article.post");
    }

    #[test]
    fn test_all_selector_tables_compile() {
        for (id, set) in HTML_SELECTORS {
            assert!(CompiledSelectors::new(set).is_ok(), "bad selectors for {}", id);
        }
        assert!(CompiledSelectors::new(&DEFAULT_SELECTORS).is_ok());
    }

    #[tokio::test]
    async fn test_fetch_articles() {
        let fetcher = Arc::new(MockFetcher::new().respond("https://dexerto.com", 200, PAGE));
        let scraper = scraper_with(fetcher);

        let articles = scraper.fetch_articles().await.unwrap();
        assert_eq!(articles.len(), 3);
        assert!(articles.iter().all(|a| a.locale() == "en-us"));
    }

    #[tokio::test]
    async fn test_robots_disallow_is_permission_denied() {
        let fetcher = Arc::new(
            MockFetcher::new()
                .respond("https://dexerto.com/robots.txt", 200, "User-agent: *\nDisallow: /\n")
                .respond("https://dexerto.com", 200, PAGE),
        );
        let scraper = scraper_with(fetcher.clone());

        let err = scraper.fetch_articles().await.unwrap_err();
        assert!(matches!(err, RiftError::PermissionDenied { .. }));
        assert_eq!(fetcher.calls_to("https://dexerto.com"), 0);
    }
}
