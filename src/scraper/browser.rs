use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig as ChromeConfig};
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::app::{Result, RiftError};
use crate::domain::{Article, ArticleSource};
use crate::scraper::base::{ScraperCore, ScraperResources};
use crate::scraper::html::{html_selectors_for, HtmlExtractor, SelectorSet, MAX_PAGE_ITEMS};
use crate::scraper::{Scraper, ScrapingConfig};

const POLL_INTERVAL: Duration = Duration::from_millis(250);
const DEFAULT_PAGE_WAIT: Duration = Duration::from_secs(10);

/// Selectors for JavaScript-rendered pages. Sources missing here fall back
/// to the static HTML table.
pub static BROWSER_SELECTORS: &[(&str, SelectorSet)] = &[
    ("twitter", SelectorSet {
        article: r#"article[data-testid="tweet"]"#,
        title: r#"div[data-testid="tweetText"]"#,
        url: r#"a[href*="/status/"]"#,
        description: r#"div[data-testid="tweetText"]"#,
        image: r#"div[data-testid="tweetPhoto"] img"#,
        date: "time",
    }),
    ("reddit", SelectorSet {
        article: "shreddit-post, div[data-testid=\"post-container\"]",
        title: r#"a[slot="title"], h3"#,
        url: r#"a[slot="full-post-link"], a[data-click-id="body"], a[href*="/comments/"]"#,
        description: r#"div[slot="text-body"], p"#,
        image: "img",
        date: "faceplate-timeago time, time",
    }),
    ("youtube", SelectorSet {
        article: "ytd-rich-item-renderer, ytd-grid-video-renderer",
        title: "#video-title",
        url: "a#video-title-link, a#thumbnail",
        description: "#metadata-line",
        image: "img",
        date: "#metadata-line span",
    }),
    ("discord", SelectorSet {
        article: r#"li[class*="messageListItem"]"#,
        title: r#"div[class*="messageContent"]"#,
        url: "a[href]",
        description: r#"div[class*="messageContent"]"#,
        image: "img",
        date: "time",
    }),
    ("u-gg", SelectorSet {
        article: ".news-item, .article-card, article",
        title: ".news-title, .article-title, h2, h3",
        url: "a[href]",
        description: ".news-description, .article-summary, p",
        image: "img",
        date: ".news-date, time",
    }),
    ("lolesports", SelectorSet {
        article: ".news-card, .article-card, article",
        title: ".title, h2, h3",
        url: "a[href]",
        description: ".description, .summary, p",
        image: "img",
        date: "time, .date",
    }),
];

pub fn browser_selectors_for(source_id: &str) -> &'static SelectorSet {
    BROWSER_SELECTORS
        .iter()
        .find(|(id, _)| *id == source_id)
        .map(|(_, set)| set)
        .unwrap_or_else(|| html_selectors_for(source_id))
}

/// A launched Chrome process and its CDP event loop.
struct Driver {
    browser: Browser,
    handler: JoinHandle<()>,
}

impl Driver {
    async fn launch(headless: bool) -> Result<Self> {
        let mut builder = ChromeConfig::builder()
            .arg("--no-sandbox")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-software-rasterizer");

        if !headless {
            builder = builder.with_head();
        }

        let browser_config = builder
            .build()
            .map_err(|e| RiftError::Driver(format!("Failed to build browser config: {}", e)))?;

        let (browser, mut handler) = Browser::launch(browser_config).await.map_err(|e| {
            RiftError::Driver(format!(
                "Failed to launch browser: {}. Is Chrome or Chromium installed and in PATH?",
                e
            ))
        })?;

        let handler = tokio::spawn(async move {
            while let Some(_event) = handler.next().await {}
        });

        Ok(Self { browser, handler })
    }

    async fn quit(mut self) {
        if let Err(e) = self.browser.close().await {
            debug!(error = %e, "Browser close failed");
        }
        if let Err(e) = self.browser.wait().await {
            debug!(error = %e, "Browser process wait failed");
        }
        self.handler.abort();
    }
}

/// Scraper that renders pages in headless Chrome before extracting articles.
///
/// The browser is launched on first use and quit after every
/// [`fetch_articles`](Scraper::fetch_articles), whatever the outcome.
pub struct BrowserScraper {
    core: ScraperCore,
    extractor: HtmlExtractor,
    article_selector: &'static str,
    page_url: String,
    headless: bool,
    page_wait: Duration,
    driver: Mutex<Option<Driver>>,
}

impl BrowserScraper {
    pub fn new(config: ScrapingConfig, locale: &str, resources: &ScraperResources) -> Result<Self> {
        let mut scraper = Self::from_core(ScraperCore::stealth(config, locale, resources))?;
        scraper.headless = resources.browser.headless;
        scraper.page_wait = resources.browser.page_wait();
        Ok(scraper)
    }

    pub fn from_core(core: ScraperCore) -> Result<Self> {
        let set = browser_selectors_for(core.source_id());
        let extractor = HtmlExtractor::new(
            ArticleSource::new(core.source_id(), core.locale()),
            core.config().base_url.clone(),
            set,
        )?;
        let page_url = core.config().base_url.clone();

        Ok(Self {
            core,
            extractor,
            article_selector: set.article,
            page_url,
            headless: true,
            page_wait: DEFAULT_PAGE_WAIT,
            driver: Mutex::new(None),
        })
    }

    pub fn with_page_url(mut self, url: impl Into<String>) -> Self {
        self.page_url = url.into();
        self
    }

    /// How long to wait for article elements, then again for `<body>`.
    pub fn with_page_wait(mut self, wait: Duration) -> Self {
        self.page_wait = wait;
        self
    }

    pub fn user_agent(&self) -> &str {
        self.core.user_agent()
    }

    pub async fn is_running(&self) -> bool {
        self.driver.lock().await.is_some()
    }

    /// Launch the browser unless it is already running.
    pub async fn init(&self) -> Result<()> {
        let mut slot = self.driver.lock().await;
        if slot.is_none() {
            info!(source_id = %self.core.source_id(), headless = self.headless, "Launching browser");
            *slot = Some(Driver::launch(self.headless).await?);
        }
        Ok(())
    }

    async fn render(&self, url: &str) -> Result<String> {
        self.init().await?;
        let slot = self.driver.lock().await;
        let Some(driver) = slot.as_ref() else {
            return Err(RiftError::Driver("browser is not running".to_string()));
        };

        let page = driver
            .browser
            .new_page("about:blank")
            .await
            .map_err(|e| RiftError::Driver(format!("Failed to create page: {}", e)))?;

        let result = self.load(&page, url).await;

        if let Err(e) = page.close().await {
            debug!(error = %e, "Failed to close page");
        }
        result
    }

    async fn load(&self, page: &Page, url: &str) -> Result<String> {
        page.set_user_agent(self.core.user_agent())
            .await
            .map_err(|e| RiftError::Driver(format!("Failed to set user agent: {}", e)))?;

        page.goto(url)
            .await
            .map_err(|e| RiftError::Driver(format!("Navigation failed: {}", e)))?;

        self.wait_for_content(page, url).await;

        page.content()
            .await
            .map_err(|e| RiftError::Driver(format!("Failed to read page content: {}", e)))
    }

    /// Degraded content beats no content: a page that never shows articles or
    /// even a body is still extracted.
    async fn wait_for_content(&self, page: &Page, url: &str) {
        if wait_for_selector(page, self.article_selector, self.page_wait).await {
            return;
        }
        debug!(url = %url, selector = %self.article_selector, "No article elements, waiting for body");

        if wait_for_selector(page, "body", self.page_wait).await {
            return;
        }
        warn!(url = %url, "Page body never appeared, extracting whatever rendered");
    }

    async fn shutdown(&self) {
        let driver = self.driver.lock().await.take();
        if let Some(driver) = driver {
            debug!(source_id = %self.core.source_id(), "Quitting browser");
            driver.quit().await;
        }
    }
}

async fn wait_for_selector(page: &Page, selector: &str, timeout: Duration) -> bool {
    tokio::time::timeout(timeout, async {
        while page.find_element(selector).await.is_err() {
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    })
    .await
    .is_ok()
}

#[async_trait]
impl Scraper for BrowserScraper {
    fn source_id(&self) -> &str {
        self.core.source_id()
    }

    fn locale(&self) -> &str {
        self.core.locale()
    }

    async fn fetch_articles(&self) -> Result<Vec<Article>> {
        let permit = self.core.guard(&self.page_url).await?;

        let rendered = self.render(&self.page_url).await;
        self.shutdown().await;

        match &rendered {
            Ok(_) => permit.succeed(),
            Err(e) if e.counts_as_source_failure() => permit.fail(),
            Err(_) => drop(permit),
        }

        let articles = self.extractor.extract(&rendered?, MAX_PAGE_ITEMS);
        info!(
            source_id = %self.core.source_id(),
            locale = %self.core.locale(),
            count = articles.len(),
            "Scraped rendered page"
        );
        Ok(articles)
    }

    async fn close(&self) {
        self.shutdown().await;
        self.core.close().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::breaker::{CircuitBreakerConfig, CircuitBreakerRegistry};
    use crate::fetcher::mock::MockFetcher;
    use crate::fetcher::user_agent::BROWSER_USER_AGENTS;
    use crate::robots::{RobotsGate, DEFAULT_CACHE_TTL};
    use crate::scraper::ScrapingDifficulty;

    fn resources(fetcher: Arc<MockFetcher>) -> ScraperResources {
        ScraperResources::new(
            Arc::new(RobotsGate::with_fetcher(fetcher, DEFAULT_CACHE_TTL)),
            Arc::new(CircuitBreakerRegistry::new(CircuitBreakerConfig {
                failure_threshold: 1,
                ..Default::default()
            })),
        )
    }

    fn scraper(resources: &ScraperResources) -> BrowserScraper {
        let config = ScrapingConfig::new("reddit", "https://www.reddit.com/r/leagueoflegends", ScrapingDifficulty::Hard)
            .with_rate_limit(0.0);
        BrowserScraper::new(config, "en-us", resources).unwrap()
    }

    #[test]
    fn test_browser_selector_table() {
        assert_eq!(
            browser_selectors_for("twitter").article,
            r#"article[data-testid="tweet"]"#
        );
        assert_eq!(browser_selectors_for("dexerto"), html_selectors_for("dexerto"));
    }

    #[test]
    fn test_uses_rotated_user_agent() {
        let scraper = scraper(&resources(Arc::new(MockFetcher::new())));
        assert!(BROWSER_USER_AGENTS.contains(&scraper.user_agent()));
    }

    #[test]
    fn test_page_wait_from_resources() {
        let mut res = resources(Arc::new(MockFetcher::new()));
        res.browser.page_wait_secs = 3;
        assert_eq!(scraper(&res).page_wait, Duration::from_secs(3));
    }

    #[tokio::test]
    async fn test_robots_checked_before_launch() {
        let fetcher = Arc::new(MockFetcher::new().respond(
            "https://www.reddit.com/robots.txt",
            200,
            "User-agent: *\nDisallow: /r/\n",
        ));
        let scraper = scraper(&resources(fetcher));

        let err = scraper.fetch_articles().await.unwrap_err();
        assert!(matches!(err, RiftError::PermissionDenied { .. }));
        assert!(!scraper.is_running().await);
    }

    #[tokio::test]
    async fn test_open_circuit_skips_launch() {
        let res = resources(Arc::new(MockFetcher::new()));
        let scraper = scraper(&res);
        scraper.core.breaker().record_failure();

        let err = scraper.fetch_articles().await.unwrap_err();
        assert!(matches!(err, RiftError::CircuitOpen { .. }));
        assert!(!scraper.is_running().await);
    }

    #[tokio::test]
    async fn test_close_without_launch() {
        let scraper = scraper(&resources(Arc::new(MockFetcher::new())));
        scraper.close().await;
        scraper.close().await;
        assert!(!scraper.is_running().await);
    }
}
