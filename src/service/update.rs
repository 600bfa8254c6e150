use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::app::{Result, RiftError};
use crate::config::sources;
use crate::config::UpdateConfig;
use crate::domain::{UpdatePriority, UpdateTask};
use crate::scraper::ScraperResources;
use crate::service::{NewsClient, ScraperNewsClient};
use crate::store::ArticleRepository;

/// Counts for one source, merged across its locale and category tasks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    pub fetched: usize,
    pub new: usize,
    pub duplicates: usize,
}

impl SourceStats {
    fn merge(&mut self, other: SourceStats) {
        self.fetched += other.fetched;
        self.new += other.new;
        self.duplicates += other.duplicates;
    }
}

/// Summary of one [`UpdateService::update_all_sources`] run.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateStats {
    pub started_at: DateTime<Utc>,
    pub sources: BTreeMap<String, SourceStats>,
    pub total_fetched: usize,
    pub total_new: usize,
    pub total_duplicates: usize,
    pub errors: Vec<String>,
    pub completed_at: DateTime<Utc>,
    pub elapsed_seconds: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub last_update: Option<DateTime<Utc>>,
    pub update_count: u64,
    pub error_count: u64,
    pub sources: Vec<String>,
}

#[derive(Default)]
struct History {
    last_update: Option<DateTime<Utc>>,
    update_count: u64,
    error_count: u64,
}

/// Fetches every configured source × locale (× news category for games)
/// and saves the articles.
///
/// One task failing never stops the others; failures end up in
/// [`UpdateStats::errors`].
pub struct UpdateService {
    repository: Arc<dyn ArticleRepository>,
    clients: HashMap<String, Arc<dyn NewsClient>>,
    locales: Vec<String>,
    source_ids: Vec<String>,
    max_concurrent_tasks: usize,
    history: Mutex<History>,
}

impl UpdateService {
    /// No clients are registered; see [`with_client`](Self::with_client).
    pub fn new(repository: Arc<dyn ArticleRepository>) -> Self {
        let defaults = UpdateConfig::default();
        Self {
            repository,
            clients: HashMap::new(),
            locales: defaults.locales(),
            source_ids: defaults.source_ids(),
            max_concurrent_tasks: defaults.max_concurrent_tasks,
            history: Mutex::new(History::default()),
        }
    }

    /// Register a [`ScraperNewsClient`] for every configured source.
    pub fn from_config(
        repository: Arc<dyn ArticleRepository>,
        config: &UpdateConfig,
        resources: &ScraperResources,
    ) -> Self {
        let mut service = Self::new(repository)
            .with_locales(config.locales())
            .with_max_concurrent_tasks(config.max_concurrent_tasks);

        let mut source_ids = Vec::new();
        for id in config.source_ids() {
            match ScraperNewsClient::for_source(&id, resources.clone()) {
                Ok(client) => {
                    service.clients.insert(id.clone(), Arc::new(client));
                    source_ids.push(id);
                }
                Err(e) => warn!(source_id = %id, error = %e, "Skipping source"),
            }
        }
        service.source_ids = source_ids;
        service
    }

    pub fn with_client(mut self, source_id: &str, client: Arc<dyn NewsClient>) -> Self {
        self.clients.insert(source_id.to_string(), client);
        self
    }

    pub fn with_locales(mut self, locales: Vec<String>) -> Self {
        self.locales = locales;
        self
    }

    pub fn with_sources(mut self, source_ids: Vec<String>) -> Self {
        self.source_ids = source_ids;
        self
    }

    pub fn with_max_concurrent_tasks(mut self, max: usize) -> Self {
        self.max_concurrent_tasks = max.max(1);
        self
    }

    pub fn repository(&self) -> &Arc<dyn ArticleRepository> {
        &self.repository
    }

    /// Tasks for every locale × source the source publishes in. Game sources
    /// get a main task plus one per news category. Ordered by priority, then
    /// insertion.
    pub fn create_tasks(&self) -> Vec<UpdateTask> {
        let mut seen = HashSet::new();
        let mut tasks = Vec::new();

        for locale in &self.locales {
            for source_id in &self.source_ids {
                let Some(source) = sources::find(source_id) else {
                    warn!(source_id = %source_id, "Unknown source, no task created");
                    continue;
                };
                if !source.supports_locale(locale) {
                    continue;
                }

                let priority = UpdatePriority::for_category(source.category);
                let categories = sources::game_categories(source_id).unwrap_or_default();

                let main = std::iter::once(None);
                let per_category = categories.iter().map(|c| Some(c.to_string()));
                for news_category in main.chain(per_category) {
                    let task = UpdateTask::new(
                        priority,
                        source_id.as_str(),
                        locale.as_str(),
                        source.category,
                        news_category,
                    );
                    if seen.insert(task.clone()) {
                        tasks.push(task);
                    }
                }
            }
        }

        tasks.sort_by_key(|task| task.priority);
        tasks
    }

    pub async fn update_all_sources(&self) -> UpdateStats {
        let started_at = Utc::now();
        let start = Instant::now();
        let tasks = self.create_tasks();
        info!(tasks = tasks.len(), "Starting update for all sources");

        let results: Vec<(UpdateTask, Result<SourceStats>)> = stream::iter(tasks)
            .map(|task| async move {
                let result = self.update_source(&task).await;
                (task, result)
            })
            .buffer_unordered(self.max_concurrent_tasks)
            .collect()
            .await;

        let mut per_source: BTreeMap<String, SourceStats> = BTreeMap::new();
        let mut errors = Vec::new();

        for (task, result) in results {
            match result {
                Ok(stats) => per_source.entry(task.source_id.clone()).or_default().merge(stats),
                Err(e) => {
                    let message = format!("Error updating {}: {}", task, e);
                    error!(task = %task, error = %e, "Update task failed");
                    errors.push(message);
                }
            }
        }

        let totals = per_source.values().fold(SourceStats::default(), |mut acc, s| {
            acc.merge(*s);
            acc
        });
        let completed_at = Utc::now();
        let elapsed = start.elapsed().as_secs_f64();

        {
            let mut history = self.history.lock();
            history.last_update = Some(completed_at);
            history.update_count += 1;
            history.error_count += errors.len() as u64;
        }

        info!(
            new = totals.new,
            duplicates = totals.duplicates,
            errors = errors.len(),
            elapsed_secs = elapsed,
            "Update complete"
        );

        UpdateStats {
            started_at,
            sources: per_source,
            total_fetched: totals.fetched,
            total_new: totals.new,
            total_duplicates: totals.duplicates,
            errors,
            completed_at,
            elapsed_seconds: (elapsed * 100.0).round() / 100.0,
        }
    }

    /// Fetch one task and save what comes back. Per-article save errors are
    /// logged and skipped.
    pub async fn update_source(&self, task: &UpdateTask) -> Result<SourceStats> {
        let client = self
            .clients
            .get(&task.source_id)
            .ok_or_else(|| RiftError::UnknownSource(task.source_id.clone()))?;

        debug!(task = %task, "Fetching");
        let articles = client
            .fetch_news(&task.locale, task.news_category.as_deref())
            .await?;

        let mut stats = SourceStats {
            fetched: articles.len(),
            ..Default::default()
        };

        for article in &articles {
            match self.repository.save(article) {
                Ok(true) => stats.new += 1,
                Ok(false) => stats.duplicates += 1,
                Err(e) => error!(guid = %article.guid(), error = %e, "Error saving article"),
            }
        }

        info!(
            task = %task,
            fetched = stats.fetched,
            new = stats.new,
            duplicates = stats.duplicates,
            "Source updated"
        );
        Ok(stats)
    }

    pub fn get_status(&self) -> ServiceStatus {
        let history = self.history.lock();
        let mut sources: Vec<String> = self.clients.keys().cloned().collect();
        sources.sort();

        ServiceStatus {
            last_update: history.last_update,
            update_count: history.update_count,
            error_count: history.error_count,
            sources,
        }
    }

    pub async fn close(&self) {
        for client in self.clients.values() {
            client.close().await;
        }
    }
}
