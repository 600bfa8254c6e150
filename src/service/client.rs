use async_trait::async_trait;

use crate::app::{Result, RiftError};
use crate::config::sources::{self, SourceDefinition};
use crate::domain::Article;
use crate::scraper::{
    build_scraper, OfficialApiClient, ScraperKind, ScraperResources, ScrapingConfig,
};
use crate::service::NewsClient;

/// [`NewsClient`] for one registered source.
///
/// Official sources keep a single long-lived API client so the Next.js build
/// id stays cached between tasks. Every other source gets a fresh scraper per
/// call, closed before returning.
pub struct ScraperNewsClient {
    source: &'static SourceDefinition,
    resources: ScraperResources,
    official: Option<OfficialApiClient>,
}

impl ScraperNewsClient {
    pub fn new(source: &'static SourceDefinition, resources: ScraperResources) -> Self {
        let official = (source.kind == ScraperKind::OfficialApi).then(|| {
            let config =
                ScrapingConfig::from_source(source).with_timeout(resources.http.timeout_secs);
            OfficialApiClient::new(config, "en-us", &resources)
        });

        Self {
            source,
            resources,
            official,
        }
    }

    pub fn for_source(source_id: &str, resources: ScraperResources) -> Result<Self> {
        let source = sources::find(source_id)
            .ok_or_else(|| RiftError::UnknownSource(source_id.to_string()))?;
        Ok(Self::new(source, resources))
    }

    pub fn source(&self) -> &'static SourceDefinition {
        self.source
    }
}

#[async_trait]
impl NewsClient for ScraperNewsClient {
    async fn fetch_news(&self, locale: &str, category: Option<&str>) -> Result<Vec<Article>> {
        if let Some(client) = &self.official {
            return client.fetch_news(locale, category).await;
        }

        let scraper = build_scraper(self.source, locale, category, &self.resources)?;
        let result = scraper.fetch_articles().await;
        scraper.close().await;
        result
    }

    async fn close(&self) {
        if let Some(client) = &self.official {
            NewsClient::close(client).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::breaker::CircuitBreakerRegistry;
    use crate::robots::{RobotsGate, DEFAULT_CACHE_TTL};

    fn resources() -> ScraperResources {
        ScraperResources::new(
            Arc::new(RobotsGate::new(DEFAULT_CACHE_TTL)),
            Arc::new(CircuitBreakerRegistry::default()),
        )
    }

    #[test]
    fn test_unknown_source() {
        let result = ScraperNewsClient::for_source("nope", resources());
        assert!(matches!(result, Err(RiftError::UnknownSource(_))));
    }

    #[test]
    fn test_official_sources_keep_api_client() {
        let lol = ScraperNewsClient::for_source("lol", resources()).unwrap();
        assert!(lol.official.is_some());

        let dexerto = ScraperNewsClient::for_source("dexerto", resources()).unwrap();
        assert!(dexerto.official.is_none());
        assert_eq!(dexerto.source().name, "Dexerto");
    }
}
