use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::app::{Result, RiftError};
use crate::config::sources;

/// Editorial grouping of a source, used for task priority and feed filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceCategory {
    OfficialRiot,
    Tft,
    WildRift,
    Esports,
    News,
    Community,
    Analytics,
    Social,
}

impl SourceCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceCategory::OfficialRiot => "official_riot",
            SourceCategory::Tft => "tft",
            SourceCategory::WildRift => "wild_rift",
            SourceCategory::Esports => "esports",
            SourceCategory::News => "news",
            SourceCategory::Community => "community",
            SourceCategory::Analytics => "analytics",
            SourceCategory::Social => "social",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        let category = match s {
            "official_riot" => SourceCategory::OfficialRiot,
            "tft" => SourceCategory::Tft,
            "wild_rift" => SourceCategory::WildRift,
            "esports" => SourceCategory::Esports,
            "news" => SourceCategory::News,
            "community" => SourceCategory::Community,
            "analytics" => SourceCategory::Analytics,
            "social" => SourceCategory::Social,
            _ => return None,
        };
        Some(category)
    }
}

impl fmt::Display for SourceCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an article came from: a source id (game or site) plus the locale it was fetched for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArticleSource {
    pub source_id: String,
    pub locale: String,
}

impl ArticleSource {
    pub fn new(source_id: impl Into<String>, locale: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            locale: locale.into(),
        }
    }
}

impl fmt::Display for ArticleSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.source_id, self.locale)
    }
}

/// Generate the stable article identifier: SHA-256 of the canonical URL, hex encoded.
pub fn generate_guid(url: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(url.as_bytes());
    hex::encode(hasher.finalize())
}

/// A normalized news article. Only obtainable through [`ArticleBuilder::build`],
/// so title and url are always non-empty and the guid always matches the url.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Article {
    title: String,
    url: String,
    canonical_url: String,
    pub_date: DateTime<Utc>,
    guid: String,
    source: ArticleSource,
    source_category: SourceCategory,
    description: String,
    image_url: Option<String>,
    author: String,
    categories: Vec<String>,
    content: Option<String>,
}

impl Article {
    pub fn builder(
        title: impl Into<String>,
        url: impl Into<String>,
        source: ArticleSource,
    ) -> ArticleBuilder {
        ArticleBuilder {
            title: title.into(),
            url: url.into(),
            source,
            pub_date: None,
            description: None,
            image_url: None,
            author: None,
            categories: Vec::new(),
            content: None,
            source_category: None,
        }
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn canonical_url(&self) -> &str {
        &self.canonical_url
    }

    pub fn pub_date(&self) -> DateTime<Utc> {
        self.pub_date
    }

    pub fn guid(&self) -> &str {
        &self.guid
    }

    pub fn source(&self) -> &ArticleSource {
        &self.source
    }

    pub fn locale(&self) -> &str {
        &self.source.locale
    }

    pub fn source_category(&self) -> SourceCategory {
        self.source_category
    }

    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn image_url(&self) -> Option<&str> {
        self.image_url.as_deref()
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

#[derive(Debug, Clone)]
pub struct ArticleBuilder {
    title: String,
    url: String,
    source: ArticleSource,
    pub_date: Option<DateTime<Utc>>,
    description: Option<String>,
    image_url: Option<String>,
    author: Option<String>,
    categories: Vec<String>,
    content: Option<String>,
    source_category: Option<SourceCategory>,
}

impl ArticleBuilder {
    pub fn pub_date(mut self, pub_date: Option<DateTime<Utc>>) -> Self {
        self.pub_date = pub_date;
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = image_url.filter(|u| !u.trim().is_empty());
        self
    }

    pub fn author(mut self, author: Option<String>) -> Self {
        self.author = author.filter(|a| !a.trim().is_empty());
        self
    }

    pub fn categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories.extend(categories.into_iter().map(Into::into));
        self
    }

    pub fn content(mut self, content: Option<String>) -> Self {
        self.content = content.filter(|c| !c.is_empty());
        self
    }

    pub fn source_category(mut self, category: SourceCategory) -> Self {
        self.source_category = Some(category);
        self
    }

    pub fn build(self) -> Result<Article> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(RiftError::InvalidArticle("title must not be empty".into()));
        }

        let url = self.url.trim().to_string();
        if url.is_empty() {
            return Err(RiftError::InvalidArticle(format!(
                "url must not be empty (title: {})",
                title
            )));
        }

        let mut categories: Vec<String> = Vec::with_capacity(self.categories.len());
        for category in self.categories {
            let category = category.trim();
            if !category.is_empty() && !categories.iter().any(|c| c == category) {
                categories.push(category.to_string());
            }
        }

        let author = self
            .author
            .unwrap_or_else(|| sources::display_name(&self.source.source_id).to_string());
        let source_category = self
            .source_category
            .unwrap_or_else(|| sources::category_for(&self.source.source_id));

        Ok(Article {
            guid: generate_guid(&url),
            canonical_url: url.clone(),
            title,
            url,
            pub_date: self.pub_date.unwrap_or_else(Utc::now),
            source: self.source,
            source_category,
            description: self.description.unwrap_or_default(),
            image_url: self.image_url,
            author,
            categories,
            content: self.content,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn source() -> ArticleSource {
        ArticleSource::new("dexerto", "en-us")
    }

    #[test]
    fn test_guid_deterministic() {
        let a = generate_guid("https://example.com/article");
        let b = generate_guid("https://example.com/article");
        assert_eq!(a, b);
    }

    #[test]
    fn test_guid_distinct_urls() {
        let urls = [
            "https://example.com/article1",
            "https://example.com/article2",
            "https://example.com/article1?page=2",
            "http://example.com/article1",
        ];
        let guids: std::collections::HashSet<_> = urls.iter().map(|u| generate_guid(u)).collect();
        assert_eq!(guids.len(), urls.len());
    }

    #[test]
    fn test_guid_is_hex_sha256() {
        let guid = generate_guid("https://example.com/test");
        assert_eq!(guid.len(), 64);
        assert!(guid.chars().all(|c| matches!(c, '0'..='9' | 'a'..='f')));
    }

    #[test]
    fn test_build_complete_article() {
        let pub_date = Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap();
        let article = Article::builder("Test Article", "https://dexerto.com/test", source())
            .pub_date(Some(pub_date))
            .description("Test description")
            .image_url(Some("https://dexerto.com/image.jpg".into()))
            .author(Some("Test Author".into()))
            .categories(["LoL", "Esports"])
            .content(Some("<p>Full content</p>".into()))
            .build()
            .unwrap();

        assert_eq!(article.title(), "Test Article");
        assert_eq!(article.url(), "https://dexerto.com/test");
        assert_eq!(article.canonical_url(), "https://dexerto.com/test");
        assert_eq!(article.pub_date(), pub_date);
        assert_eq!(article.description(), "Test description");
        assert_eq!(article.image_url(), Some("https://dexerto.com/image.jpg"));
        assert_eq!(article.author(), "Test Author");
        assert_eq!(article.categories(), ["LoL", "Esports"]);
        assert_eq!(article.content(), Some("<p>Full content</p>"));
        assert_eq!(article.guid(), generate_guid("https://dexerto.com/test"));
    }

    #[test]
    fn test_build_minimal_article_defaults() {
        let before = Utc::now();
        let article = Article::builder("Minimal", "https://dexerto.com/minimal", source())
            .build()
            .unwrap();

        assert!(article.pub_date() >= before);
        assert_eq!(article.description(), "");
        assert_eq!(article.image_url(), None);
        assert_eq!(article.author(), "Dexerto");
        assert!(article.categories().is_empty());
        assert_eq!(article.source_category(), SourceCategory::Esports);
        assert_eq!(article.locale(), "en-us");
        assert_eq!(article.source().source_id, "dexerto");
    }

    #[test]
    fn test_empty_title_rejected() {
        let result = Article::builder("   ", "https://example.com/a", source()).build();
        assert!(matches!(result, Err(RiftError::InvalidArticle(_))));
    }

    #[test]
    fn test_empty_url_rejected() {
        let result = Article::builder("Title", "", source()).build();
        assert!(matches!(result, Err(RiftError::InvalidArticle(_))));
    }

    #[test]
    fn test_categories_deduplicated_in_order() {
        let article = Article::builder("T", "https://example.com/t", source())
            .categories(["Esports", "LoL", "Esports", " ", "lol"])
            .build()
            .unwrap();
        assert_eq!(article.categories(), ["Esports", "LoL", "lol"]);
    }

    #[test]
    fn test_unknown_source_author_falls_back_to_id() {
        let article = Article::builder("T", "https://example.com/t", ArticleSource::new("mystery", "en-us"))
            .build()
            .unwrap();
        assert_eq!(article.author(), "mystery");
        assert_eq!(article.source_category(), SourceCategory::News);
    }

    #[test]
    fn test_source_category_round_trip_names() {
        for category in [
            SourceCategory::OfficialRiot,
            SourceCategory::Tft,
            SourceCategory::Esports,
            SourceCategory::Analytics,
        ] {
            assert_eq!(SourceCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(SourceCategory::parse("bogus"), None);
    }
}
