//! Plumbing shared by every scraper variant: gated fetching (circuit breaker,
//! robots.txt, rate limit), article construction and the parsing helpers.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use dashmap::DashMap;
use regex::Regex;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};
use url::Url;

use crate::app::{Result, RiftError};
use crate::breaker::{BreakerPermit, CircuitBreaker, CircuitBreakerRegistry};
use crate::config::{BrowserConfig, Config, HttpConfig};
use crate::domain::{Article, ArticleBuilder, ArticleSource};
use crate::fetcher::{
    default_user_agent, random_user_agent, FetchResponse, Fetcher, FetcherOptions, HttpFetcher,
};
use crate::robots::RobotsGate;
use crate::scraper::{RateLimiter, ScrapingConfig};

/// Longest robots.txt crawl delay honoured between two requests to one source.
/// Larger declared delays are clamped to this.
pub const MAX_CRAWL_DELAY: Duration = Duration::from_secs(60);

/// Process-wide collaborators handed to every scraper.
///
/// Cloning shares the robots cache, breakers and rate limiters.
#[derive(Clone)]
pub struct ScraperResources {
    pub robots: Arc<RobotsGate>,
    pub breakers: Arc<CircuitBreakerRegistry>,
    pub respect_robots: bool,
    pub http: HttpConfig,
    pub browser: BrowserConfig,
    limiters: Arc<DashMap<String, Arc<RateLimiter>>>,
}

impl ScraperResources {
    pub fn new(robots: Arc<RobotsGate>, breakers: Arc<CircuitBreakerRegistry>) -> Self {
        Self {
            robots,
            breakers,
            respect_robots: true,
            http: HttpConfig::default(),
            browser: BrowserConfig::default(),
            limiters: Arc::default(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            robots: Arc::new(RobotsGate::new(config.robots.cache_ttl())),
            breakers: Arc::new(CircuitBreakerRegistry::new(
                config.circuit_breaker.to_breaker_config(),
            )),
            respect_robots: config.robots.enabled,
            http: config.http.clone(),
            browser: config.browser.clone(),
            limiters: Arc::default(),
        }
    }

    /// The limiter shared by every scraper of `source_id`, created with
    /// `min_interval` on first request.
    pub fn rate_limiter(&self, source_id: &str, min_interval: Duration) -> Arc<RateLimiter> {
        self.limiters
            .entry(source_id.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::new(min_interval)))
            .clone()
    }

    pub async fn close(&self) {
        self.robots.close().await;
    }
}

/// State every scraper instance owns: its config, locale, client and the
/// shared gates it must pass before each request.
pub struct ScraperCore {
    config: ScrapingConfig,
    locale: String,
    user_agent: String,
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    robots: Arc<RobotsGate>,
    respect_robots: bool,
    breaker: Arc<CircuitBreaker>,
    limiter: Arc<RateLimiter>,
}

impl ScraperCore {
    pub fn new(config: ScrapingConfig, locale: &str, resources: &ScraperResources) -> Self {
        Self::build(config, locale, resources, resources.http.stealth)
    }

    /// Like [`new`](Self::new), but rotates browser user agents unless one is configured.
    pub fn stealth(config: ScrapingConfig, locale: &str, resources: &ScraperResources) -> Self {
        Self::build(config, locale, resources, true)
    }

    fn build(
        config: ScrapingConfig,
        locale: &str,
        resources: &ScraperResources,
        stealth: bool,
    ) -> Self {
        let user_agent = config
            .user_agent
            .clone()
            .or_else(|| resources.http.user_agent.clone())
            .unwrap_or_else(|| {
                if stealth {
                    random_user_agent().to_string()
                } else {
                    default_user_agent().to_string()
                }
            });

        let fetcher = HttpFetcher::new(FetcherOptions {
            user_agent: user_agent.clone(),
            accept_language: Some(FetcherOptions::accept_language_for(locale)),
            accept: None,
            timeout: config.timeout(),
        });

        Self {
            breaker: resources.breakers.get(&config.source_id, None),
            limiter: resources.rate_limiter(&config.source_id, config.rate_limit()),
            config,
            locale: locale.to_string(),
            user_agent,
            fetcher: Arc::new(fetcher),
            robots: resources.robots.clone(),
            respect_robots: resources.respect_robots,
        }
    }

    pub fn with_fetcher(mut self, fetcher: Arc<dyn Fetcher + Send + Sync>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn config(&self) -> &ScrapingConfig {
        &self.config
    }

    pub fn source_id(&self) -> &str {
        &self.config.source_id
    }

    pub fn locale(&self) -> &str {
        &self.locale
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.breaker
    }

    /// Pass the circuit breaker, robots.txt and rate limit for `url`.
    ///
    /// The caller makes the request and settles the returned permit.
    pub async fn guard(&self, url: &str) -> Result<BreakerPermit> {
        let permit = self.breaker.acquire()?;

        if self.respect_robots && !self.robots.can_fetch(url, Some(&self.user_agent)).await? {
            return Err(RiftError::PermissionDenied {
                url: url.to_string(),
                user_agent: self.user_agent.clone(),
            });
        }

        let crawl_delay = applied_crawl_delay(
            &self.config.source_id,
            self.robots.detected_crawl_delay(url),
        );
        self.limiter.wait_at_least(crawl_delay).await;

        Ok(permit)
    }

    async fn gated<T, F>(&self, url: &str, locale: &str, parse: F) -> Result<T>
    where
        F: FnOnce(FetchResponse) -> Result<T> + Send,
    {
        let permit = self.guard(url).await?;
        debug!(source_id = %self.config.source_id, url = %url, locale = %locale, "Fetching");

        let accept_language = FetcherOptions::accept_language_for(locale);
        let result = match self.fetcher.fetch_localized(url, &accept_language).await {
            Ok(response) => response.error_for_status(url).and_then(parse),
            Err(e) => Err(e),
        };

        match &result {
            Ok(_) => permit.succeed(),
            Err(e) if e.counts_as_source_failure() => permit.fail(),
            Err(_) => drop(permit),
        }
        result
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String> {
        self.fetch_text_in(url, &self.locale).await
    }

    /// Fetch with `Accept-Language` for `locale` instead of the scraper's own.
    pub async fn fetch_text_in(&self, url: &str, locale: &str) -> Result<String> {
        self.gated(url, locale, |response| Ok(response.text())).await
    }

    pub async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.gated(url, &self.locale, |response| Ok(response.body)).await
    }

    pub async fn fetch_json_in<T>(&self, url: &str, locale: &str) -> Result<T>
    where
        T: DeserializeOwned + Send,
    {
        self.gated(url, locale, |response| {
            serde_json::from_slice(&response.body).map_err(RiftError::from)
        })
        .await
    }

    pub async fn close(&self) {
        self.fetcher.close().await;
    }

    /// Start an article attributed to this scraper's source and locale.
    pub fn create_article(&self, title: &str, url: &str) -> ArticleBuilder {
        Article::builder(
            title,
            url,
            ArticleSource::new(self.config.source_id.as_str(), self.locale.as_str()),
        )
    }

    pub fn resolve_url(&self, href: &str) -> Option<String> {
        resolve_url(&self.config.base_url, href)
    }
}

/// The spacing a declared crawl delay adds, clamped to [`MAX_CRAWL_DELAY`].
fn applied_crawl_delay(source_id: &str, declared_secs: Option<f64>) -> Duration {
    // NaN fails the comparison too.
    let Some(secs) = declared_secs.filter(|secs| *secs > 0.0) else {
        return Duration::ZERO;
    };
    if secs > MAX_CRAWL_DELAY.as_secs_f64() {
        warn!(
            source_id = %source_id,
            declared_secs = secs,
            max_secs = MAX_CRAWL_DELAY.as_secs(),
            "Crawl-delay too long, clamping"
        );
        return MAX_CRAWL_DELAY;
    }
    Duration::try_from_secs_f64(secs).unwrap_or(MAX_CRAWL_DELAY)
}

/// Resolve `href` against `base`. Fragments, `javascript:` and `data:` links
/// give `None`.
pub fn resolve_url(base: &str, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() || href.starts_with('#') {
        return None;
    }
    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:") || lower.starts_with("data:") || lower.starts_with("mailto:")
    {
        return None;
    }

    if let Ok(url) = Url::parse(href) {
        return matches!(url.scheme(), "http" | "https").then(|| url.to_string());
    }

    Url::parse(base)
        .and_then(|base| base.join(href))
        .ok()
        .map(|url| url.to_string())
}

pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Strip markup and entities from an HTML snippet, collapsing whitespace.
pub fn clean_text(html: &str) -> String {
    if !html.contains('<') && !html.contains('&') {
        return collapse_whitespace(html);
    }
    let fragment = ::scraper::Html::parse_fragment(html);
    let text: Vec<&str> = fragment.root_element().text().collect();
    collapse_whitespace(&text.join(" "))
}

static RELATIVE_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(\d+)\s*(second|sec|minute|min|hour|hr|day|week)s?\s+ago$")
        .expect("valid regex")
});

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y/%m/%d %H:%M",
    "%d.%m.%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%B %d, %Y",
    "%b %d, %Y",
    "%d %B %Y",
    "%d %b %Y",
    "%Y.%m.%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%d.%m.%Y",
];

/// Permissive date parser for feed and page dates. Naive values are taken as UTC.
pub fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim().trim_end_matches('.');
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // chrono rejects a weekday that disagrees with the date, which feeds get wrong.
    if let Some((_, rest)) = s.split_once(", ") {
        if let Ok(dt) = DateTime::parse_from_rfc2822(rest) {
            return Some(dt.with_timezone(&Utc));
        }
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z") {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return date
                .and_hms_opt(0, 0, 0)
                .map(|naive| Utc.from_utc_datetime(&naive));
        }
    }

    let caps = RELATIVE_DATE_RE.captures(s)?;
    let amount: i64 = caps[1].parse().ok()?;
    let unit = caps[2].to_ascii_lowercase();
    let delta = match unit.as_str() {
        "second" | "sec" => chrono::Duration::seconds(amount),
        "minute" | "min" => chrono::Duration::minutes(amount),
        "hour" | "hr" => chrono::Duration::hours(amount),
        "day" => chrono::Duration::days(amount),
        _ => chrono::Duration::weeks(amount),
    };
    Some(Utc::now() - delta)
}
