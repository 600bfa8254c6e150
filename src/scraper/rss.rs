use std::collections::HashSet;
use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::Utc;
use feed_rs::model::{Entry, Link, MediaContent};
use feed_rs::parser;
use html_escape::decode_html_entities;
use regex::Regex;
use tracing::{debug, info, warn};
use url::Url;

use crate::app::Result;
use crate::domain::Article;
use crate::scraper::base::{clean_text, collapse_whitespace, ScraperCore, ScraperResources};
use crate::scraper::{ParseArticle, Scraper, ScrapingConfig};

/// At most this many entries are taken from one feed.
pub const MAX_FEED_ITEMS: usize = 100;

static IMG_SRC_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img[^>]+src\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});

// feed-rs folds RSS enclosures into media content, so they are told apart by URL.
static ENCLOSURE_URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?is)<enclosure\b[^>]*?\burl\s*=\s*["']([^"']+)["']"#).expect("valid regex")
});

fn is_image(content: &MediaContent) -> bool {
    content
        .content_type
        .as_ref()
        .is_none_or(|ct| ct.essence().to_string().starts_with("image/"))
}

/// RSS 0.9x/1.0/2.0 and Atom scraper.
pub struct RssScraper {
    core: ScraperCore,
    feed_url: String,
}

impl RssScraper {
    pub fn new(config: ScrapingConfig, locale: &str, resources: &ScraperResources) -> Self {
        Self::from_core(ScraperCore::new(config, locale, resources))
    }

    pub fn from_core(core: ScraperCore) -> Self {
        let feed_url = core.config().feed_url().to_string();
        Self { core, feed_url }
    }

    pub fn core(&self) -> &ScraperCore {
        &self.core
    }

    /// Parse a feed body. Unparseable feeds give an empty list.
    pub fn parse_feed(&self, body: &[u8]) -> Vec<Article> {
        let feed = match parser::parse(body) {
            Ok(feed) => feed,
            Err(e) => {
                warn!(
                    source_id = %self.core.source_id(),
                    url = %self.feed_url,
                    error = %e,
                    "Feed could not be parsed"
                );
                return Vec::new();
            }
        };

        let enclosures: HashSet<Url> = ENCLOSURE_URL_RE
            .captures_iter(&String::from_utf8_lossy(body))
            .filter_map(|caps| Url::parse(&decode_html_entities(&caps[1])).ok())
            .collect();

        let total = feed.entries.len();
        let articles: Vec<Article> = feed
            .entries
            .iter()
            .take(MAX_FEED_ITEMS)
            .filter_map(|entry| self.article_from(entry, &enclosures))
            .collect();

        if articles.len() < total.min(MAX_FEED_ITEMS) {
            debug!(
                source_id = %self.core.source_id(),
                skipped = total.min(MAX_FEED_ITEMS) - articles.len(),
                "Skipped entries without title or link"
            );
        }

        articles
    }

    fn entry_url(&self, entry: &Entry) -> Option<String> {
        let is_page = |link: &&Link| {
            let rel_ok = link.rel.as_deref().is_none_or(|rel| rel == "alternate");
            let type_ok = link
                .media_type
                .as_deref()
                .is_none_or(|t| t == "text/html");
            rel_ok && type_ok
        };

        if let Some(link) = entry.links.iter().find(is_page) {
            return self.core.resolve_url(&link.href);
        }
        if entry.id.starts_with("http://") || entry.id.starts_with("https://") {
            return Some(entry.id.clone());
        }
        entry
            .links
            .iter()
            .find(|link| link.rel.as_deref() != Some("enclosure"))
            .and_then(|link| self.core.resolve_url(&link.href))
    }

    /// Image for an entry: an image enclosure first, then media:content, then
    /// a media thumbnail, then the first `<img>` in the summary or content.
    fn entry_image(&self, entry: &Entry, enclosures: &HashSet<Url>) -> Option<String> {
        let contents = || entry.media.iter().flat_map(|m| m.content.iter());

        let rss_enclosure = contents()
            .filter_map(|c| c.url.as_ref().filter(|_| is_image(c)))
            .find(|url| enclosures.contains(*url));
        if let Some(url) = rss_enclosure {
            return Some(url.to_string());
        }
        let atom_enclosure = entry.links.iter().find(|l| {
            l.rel.as_deref() == Some("enclosure")
                && l.media_type
                    .as_deref()
                    .is_none_or(|t| t.starts_with("image/"))
        });
        if let Some(url) = atom_enclosure.and_then(|l| self.core.resolve_url(&l.href)) {
            return Some(url);
        }

        if let Some(url) = contents().filter(|c| is_image(c)).find_map(|c| c.url.as_ref()) {
            return Some(url.to_string());
        }

        if let Some(thumb) = entry.media.iter().flat_map(|m| m.thumbnails.iter()).next() {
            return Some(thumb.image.uri.clone());
        }

        let html = entry
            .summary
            .as_ref()
            .map(|s| s.content.as_str())
            .into_iter()
            .chain(entry.content.as_ref().and_then(|c| c.body.as_deref()));
        html.filter_map(|h| IMG_SRC_RE.captures(h))
            .find_map(|caps| self.core.resolve_url(&decode_html_entities(&caps[1])))
    }
}

impl ParseArticle<Entry> for RssScraper {
    fn parse_article(&self, entry: &Entry) -> Option<Article> {
        self.article_from(entry, &HashSet::new())
    }
}

impl RssScraper {
    fn article_from(&self, entry: &Entry, enclosures: &HashSet<Url>) -> Option<Article> {
        let title = entry
            .title
            .as_ref()
            .map(|t| collapse_whitespace(&decode_html_entities(&t.content)))
            .filter(|t| !t.is_empty())?;
        let url = self.entry_url(entry)?;

        let description = entry
            .summary
            .as_ref()
            .map(|s| s.content.as_str())
            .or_else(|| entry.content.as_ref().and_then(|c| c.body.as_deref()))
            .map(clean_text)
            .unwrap_or_default();

        let categories = entry.categories.iter().filter_map(|c| {
            let term = c.term.trim();
            if term.is_empty() {
                c.label.clone()
            } else {
                Some(term.to_string())
            }
        });

        let author = entry
            .authors
            .iter()
            .map(|p| p.name.trim())
            .find(|name| !name.is_empty())
            .map(String::from);

        let article = self
            .core
            .create_article(&title, &url)
            .pub_date(Some(entry.published.or(entry.updated).unwrap_or_else(Utc::now)))
            .description(description)
            .image_url(self.entry_image(entry, enclosures))
            .author(author)
            .categories(categories)
            .content(entry.content.as_ref().and_then(|c| c.body.clone()))
            .build();

        match article {
            Ok(article) => Some(article),
            Err(e) => {
                debug!(error = %e, "Dropping feed entry");
                None
            }
        }
    }
}

#[async_trait]
impl Scraper for RssScraper {
    fn source_id(&self) -> &str {
        self.core.source_id()
    }

    fn locale(&self) -> &str {
        self.core.locale()
    }

    async fn fetch_articles(&self) -> Result<Vec<Article>> {
        let body = self.core.fetch_bytes(&self.feed_url).await?;
        let articles = self.parse_feed(&body);
        info!(
            source_id = %self.core.source_id(),
            locale = %self.core.locale(),
            count = articles.len(),
            "Fetched feed"
        );
        Ok(articles)
    }

    async fn close(&self) {
        self.core.close().await;
    }
}
