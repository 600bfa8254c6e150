//! Update orchestration: turns the source registry into tasks, runs them
//! through [`NewsClient`]s and persists the results.

mod client;
mod update;

pub use client::ScraperNewsClient;
pub use update::{ServiceStatus, SourceStats, UpdateService, UpdateStats};

use async_trait::async_trait;

use crate::app::Result;
use crate::domain::Article;

/// Anything that can produce articles for a locale and optional category slug.
#[async_trait]
pub trait NewsClient: Send + Sync {
    async fn fetch_news(&self, locale: &str, category: Option<&str>) -> Result<Vec<Article>>;

    async fn close(&self) {}
}
