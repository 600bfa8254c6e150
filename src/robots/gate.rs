use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::app::Result;
use crate::fetcher::{default_user_agent, FetcherOptions, Fetcher, HttpFetcher};
use crate::robots::RobotsTxt;

pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Delay used when robots.txt says nothing (or hasn't been fetched yet).
pub const DEFAULT_CRAWL_DELAY: f64 = 1.0;

/// Cached robots.txt for one domain.
#[derive(Debug, Clone)]
pub struct RobotsCacheEntry {
    pub robots: Arc<RobotsTxt>,
    pub fetched_at: DateTime<Utc>,
    /// Crawl-delay detected for the gate's own user agent.
    pub crawl_delay: Option<f64>,
    fetched: Instant,
}

impl RobotsCacheEntry {
    fn new(robots: RobotsTxt, user_agent: &str) -> Self {
        let crawl_delay = robots.crawl_delay(user_agent).map(|d| d.as_secs_f64());
        Self {
            robots: Arc::new(robots),
            fetched_at: Utc::now(),
            crawl_delay,
            fetched: Instant::now(),
        }
    }

    pub fn is_expired(&self, ttl: Duration) -> bool {
        self.fetched.elapsed() >= ttl
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RobotsCacheStats {
    pub domain: String,
    pub fetched_at: DateTime<Utc>,
    pub crawl_delay: Option<f64>,
    pub expired: bool,
}

/// Shared robots.txt compliance gate.
///
/// One instance is created at startup and handed to every scraper, so all of
/// them share the per-domain cache. Concurrent first requests for a domain
/// are collapsed into a single robots.txt fetch.
pub struct RobotsGate {
    fetcher: Arc<dyn Fetcher + Send + Sync>,
    user_agent: String,
    ttl: Duration,
    cache: DashMap<String, RobotsCacheEntry>,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl RobotsGate {
    pub fn new(ttl: Duration) -> Self {
        let fetcher = HttpFetcher::new(FetcherOptions {
            accept: Some("text/plain,text/html".to_string()),
            timeout: Duration::from_secs(10),
            ..FetcherOptions::default()
        });
        Self::with_fetcher(Arc::new(fetcher), ttl)
    }

    pub fn with_fetcher(fetcher: Arc<dyn Fetcher + Send + Sync>, ttl: Duration) -> Self {
        Self {
            fetcher,
            user_agent: default_user_agent().to_string(),
            ttl,
            cache: DashMap::new(),
            locks: DashMap::new(),
        }
    }

    /// May `url` be fetched by `user_agent` (default: the crawler's own UA)?
    ///
    /// Fails open: if robots.txt can't be fetched or parsed the answer is
    /// `true`. Only a malformed `url` is an error.
    pub async fn can_fetch(&self, url: &str, user_agent: Option<&str>) -> Result<bool> {
        let parsed = Url::parse(url)?;
        let agent = user_agent.unwrap_or(&self.user_agent);

        let Some(domain) = domain_key(&parsed) else {
            warn!(url = %url, "URL has no host, allowing by default");
            return Ok(true);
        };

        let Some(robots) = self.ensure_cached(&parsed, &domain).await else {
            warn!(domain = %domain, "No robots.txt cached, allowing by default");
            return Ok(true);
        };

        let mut path = parsed.path().to_string();
        if let Some(query) = parsed.query() {
            path.push('?');
            path.push_str(query);
        }

        let allowed = robots.is_allowed(agent, &path);
        if allowed {
            debug!("[robots.txt] ALLOWED {} {}", agent, url);
        } else {
            warn!("[robots.txt] BLOCKED {} {}", agent, url);
        }

        Ok(allowed)
    }

    /// Crawl delay in seconds for the domain of `url`.
    ///
    /// Never fetches: returns [`DEFAULT_CRAWL_DELAY`] unless a fresh entry
    /// with a `Crawl-delay` is already cached.
    pub fn get_crawl_delay(&self, url: &str) -> f64 {
        self.detected_crawl_delay(url)
            .unwrap_or(DEFAULT_CRAWL_DELAY)
    }

    /// The crawl delay robots.txt actually declared, if any.
    pub fn detected_crawl_delay(&self, url: &str) -> Option<f64> {
        let domain = Url::parse(url).ok().as_ref().and_then(domain_key)?;
        let entry = self.cache.get(&domain)?;
        if entry.is_expired(self.ttl) {
            debug!(domain = %domain, "robots.txt cache expired, using default delay");
            return None;
        }
        entry.crawl_delay
    }

    /// Remove one domain (or every domain) from the cache.
    pub fn clear_cache(&self, domain: Option<&str>) {
        match domain {
            Some(domain) => {
                self.cache.remove(domain);
                info!(domain = %domain, "Cleared robots.txt cache");
            }
            None => {
                self.cache.clear();
                info!("Cleared all robots.txt cache");
            }
        }
    }

    pub fn get_cache_stats(&self) -> Vec<RobotsCacheStats> {
        let mut stats: Vec<_> = self
            .cache
            .iter()
            .map(|entry| RobotsCacheStats {
                domain: entry.key().clone(),
                fetched_at: entry.fetched_at,
                crawl_delay: entry.crawl_delay,
                expired: entry.is_expired(self.ttl),
            })
            .collect();
        stats.sort_by(|a, b| a.domain.cmp(&b.domain));
        stats
    }

    /// Release the pooled HTTP client. The gate stays usable.
    pub async fn close(&self) {
        self.fetcher.close().await;
    }

    fn fresh(&self, domain: &str) -> Option<Arc<RobotsTxt>> {
        self.cache
            .get(domain)
            .filter(|entry| !entry.is_expired(self.ttl))
            .map(|entry| entry.robots.clone())
    }

    async fn ensure_cached(&self, url: &Url, domain: &str) -> Option<Arc<RobotsTxt>> {
        if let Some(robots) = self.fresh(domain) {
            return Some(robots);
        }

        // entry() holds the shard lock, so two callers can't create two mutexes.
        let lock = self
            .locks
            .entry(domain.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let _guard = lock.lock().await;

        if let Some(robots) = self.fresh(domain) {
            return Some(robots);
        }

        let robots_url = format!("{}://{}/robots.txt", url.scheme(), domain);
        info!(domain = %domain, url = %robots_url, "Fetching robots.txt");

        let robots = match self.fetcher.fetch(&robots_url).await {
            Ok(response) if response.is_success() => RobotsTxt::parse(&response.text()),
            Ok(response) if response.status == 404 => {
                info!(domain = %domain, "No robots.txt found (404), allowing all");
                RobotsTxt::allow_all()
            }
            Ok(response) => {
                error!(domain = %domain, status = response.status, "HTTP error fetching robots.txt");
                return None;
            }
            Err(e) => {
                error!(domain = %domain, error = %e, "Error fetching robots.txt");
                return None;
            }
        };

        let entry = RobotsCacheEntry::new(robots, &self.user_agent);
        info!(
            domain = %domain,
            crawl_delay = ?entry.crawl_delay,
            sitemaps = entry.robots.sitemaps().len(),
            "Cached robots.txt"
        );
        let robots = entry.robots.clone();
        self.cache.insert(domain.to_string(), entry);
        Some(robots)
    }
}

impl Default for RobotsGate {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

/// `host[:port]` of a URL.
fn domain_key(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host.to_string(),
    })
}
