use std::path::PathBuf;
use std::sync::Arc;

use crate::app::error::{Result, RiftError};
use crate::breaker::CircuitBreakerRegistry;
use crate::config::Config;
use crate::robots::RobotsGate;
use crate::scraper::ScraperResources;
use crate::service::UpdateService;
use crate::store::{ArticleRepository, SqliteStore};

/// Everything a command needs, built once at startup and torn down with
/// [`shutdown`](Self::shutdown).
pub struct AppContext {
    pub config: Config,
    pub store: Arc<SqliteStore>,
    pub resources: ScraperResources,
    pub update_service: UpdateService,
}

impl AppContext {
    pub fn new(config: Config) -> Result<Self> {
        let db_path = match &config.storage.database_path {
            Some(p) => p.clone(),
            None => Self::default_db_path()?,
        };
        let store = Arc::new(SqliteStore::new(&db_path)?);
        Ok(Self::with_store(config, store))
    }

    pub fn in_memory(config: Config) -> Result<Self> {
        let store = Arc::new(SqliteStore::in_memory()?);
        Ok(Self::with_store(config, store))
    }

    fn with_store(config: Config, store: Arc<SqliteStore>) -> Self {
        let resources = ScraperResources::from_config(&config);
        let repository: Arc<dyn ArticleRepository> = store.clone();
        let update_service = UpdateService::from_config(repository, &config.update, &resources);

        Self {
            config,
            store,
            resources,
            update_service,
        }
    }

    pub fn robots(&self) -> &Arc<RobotsGate> {
        &self.resources.robots
    }

    pub fn breakers(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.resources.breakers
    }

    /// Release pooled HTTP clients. The context stays usable; clients are
    /// reopened on demand.
    pub async fn shutdown(&self) {
        self.update_service.close().await;
        self.resources.close().await;
    }

    pub fn default_db_path() -> Result<PathBuf> {
        let data_dir = dirs::data_dir()
            .ok_or_else(|| RiftError::Config("Could not find data directory".into()))?;
        let riftfeed_dir = data_dir.join("riftfeed");
        std::fs::create_dir_all(&riftfeed_dir)?;
        Ok(riftfeed_dir.join("riftfeed.db"))
    }
}
