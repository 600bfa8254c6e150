//! Configuration management for RiftFeed.
//!
//! Configuration is read from `~/.config/riftfeed/config.toml` at startup.
//! If the file doesn't exist, a default configuration with comments is created.
//! Static source tables live in [`sources`].

pub mod sources;

use serde::Deserialize;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::breaker::CircuitBreakerConfig;

/// Main configuration struct.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub update: UpdateConfig,
    pub http: HttpConfig,
    pub robots: RobotsConfig,
    pub circuit_breaker: BreakerSettings,
    pub browser: BrowserConfig,
    pub storage: StorageConfig,
}

/// Which sources and locales an update cycle covers, and how wide it fans out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpdateConfig {
    /// Locales to fetch. Empty means every Riot locale.
    pub locales: Vec<String>,
    /// Source ids to fetch. Empty means every registered source.
    pub sources: Vec<String>,
    /// Daemon interval, e.g. "30m" or "1h"
    pub interval: String,
    pub max_concurrent_tasks: usize,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            locales: vec!["en-us".to_string()],
            sources: Vec::new(),
            interval: "30m".to_string(),
            max_concurrent_tasks: 4,
        }
    }
}

impl UpdateConfig {
    pub fn locales(&self) -> Vec<String> {
        if self.locales.is_empty() {
            sources::RIOT_LOCALES.iter().map(|l| l.to_string()).collect()
        } else {
            self.locales.clone()
        }
    }

    pub fn source_ids(&self) -> Vec<String> {
        if self.sources.is_empty() {
            sources::all().iter().map(|s| s.id.to_string()).collect()
        } else {
            self.sources.clone()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    pub timeout_secs: u64,
    /// Overrides the transparent default user agent for every source.
    pub user_agent: Option<String>,
    /// Rotate realistic browser user agents instead of the default one.
    pub stealth: bool,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: None,
            stealth: false,
        }
    }
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RobotsConfig {
    pub enabled: bool,
    pub cache_ttl_hours: u64,
}

impl Default for RobotsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            cache_ttl_hours: 24,
        }
    }
}

impl RobotsConfig {
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_hours * 3600)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BreakerSettings {
    pub failure_threshold: u32,
    pub recovery_timeout_secs: u64,
    pub retry_attempts: u32,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        let defaults = CircuitBreakerConfig::default();
        Self {
            failure_threshold: defaults.failure_threshold,
            recovery_timeout_secs: defaults.recovery_timeout.as_secs(),
            retry_attempts: defaults.retry_attempts,
        }
    }
}

impl BreakerSettings {
    pub fn to_breaker_config(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold.max(1),
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
            retry_attempts: self.retry_attempts.max(1),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Whether to run the browser in headless mode (default: true)
    pub headless: bool,
    /// How long to wait for article elements after navigation
    pub page_wait_secs: u64,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            page_wait_secs: 10,
        }
    }
}

impl BrowserConfig {
    pub fn page_wait(&self) -> Duration {
        Duration::from_secs(self.page_wait_secs)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to `<data dir>/riftfeed/riftfeed.db`
    pub database_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from the default path.
    ///
    /// If the config file doesn't exist, creates a default one with comments.
    /// If the config file exists but is invalid, returns an error.
    /// Missing fields in the config file will use default values.
    pub fn load() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;

        if !config_path.exists() {
            Self::create_default_config(&config_path)?;
            return Ok(Self::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from an explicit file.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Get the default config file path: `~/.config/riftfeed/config.toml`
    pub fn default_config_path() -> Result<PathBuf, ConfigError> {
        let config_dir = dirs::config_dir().ok_or(ConfigError::NoConfigDir)?;
        Ok(config_dir.join("riftfeed").join("config.toml"))
    }

    fn create_default_config(path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| ConfigError::Io {
                path: parent.to_path_buf(),
                source: e,
            })?;
        }

        let mut file = fs::File::create(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;

        file.write_all(Self::default_config_content().as_bytes())
            .map_err(|e| ConfigError::Io {
                path: path.to_path_buf(),
                source: e,
            })?;

        Ok(())
    }

    fn default_config_content() -> &'static str {
        r##"# RiftFeed Configuration

[update]
# Locales to fetch (empty = all 25 Riot locales)
locales = ["en-us"]

# Source ids to fetch (empty = every registered source, see `riftfeed sources`)
sources = []

# Interval between update cycles in daemon mode: 30s, 5m, 1h, 1d
interval = "30m"

# Maximum tasks fetched at the same time
max_concurrent_tasks = 4

[http]
# Request timeout in seconds
timeout_secs = 30

# Override the default user agent
# user_agent = "Mozilla/5.0 (compatible; MyBot/1.0)"

# Rotate realistic browser user agents
stealth = false

[robots]
# Honour robots.txt before every request
enabled = true

# How long a fetched robots.txt stays valid
cache_ttl_hours = 24

[circuit_breaker]
# Consecutive failures before a source is skipped
failure_threshold = 5

# Seconds before a tripped source is tried again
recovery_timeout_secs = 900

# Trial requests allowed while probing
retry_attempts = 3

[browser]
# Run browser in headless mode (no visible window)
headless = true

# Seconds to wait for articles to render
page_wait_secs = 10

[storage]
# database_path = "/var/lib/riftfeed/riftfeed.db"
"##
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Could not determine config directory")]
    NoConfigDir,

    #[error("Failed to read/write config file at {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file at {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_deserializes() {
        let config: Config = toml::from_str(Config::default_config_content())
            .expect("Default config should be valid TOML");

        assert_eq!(config.update.locales, vec!["en-us"]);
        assert_eq!(config.update.interval, "30m");
        assert_eq!(config.circuit_breaker.failure_threshold, 5);
        assert_eq!(config.circuit_breaker.recovery_timeout_secs, 900);
        assert!(config.robots.enabled);
        assert!(config.http.user_agent.is_none());
    }

    #[test]
    fn test_partial_config() {
        let content = r##"
[update]
locales = ["ko-kr", "ja-jp"]

[circuit_breaker]
failure_threshold = 2
"##;
        let config: Config = toml::from_str(content).expect("Partial config should work");

        assert_eq!(config.update.locales, vec!["ko-kr", "ja-jp"]);
        assert_eq!(config.update.max_concurrent_tasks, 4);
        assert_eq!(config.circuit_breaker.failure_threshold, 2);
        assert_eq!(config.circuit_breaker.retry_attempts, 3);
        assert_eq!(config.robots.cache_ttl(), Duration::from_secs(24 * 3600));
    }

    #[test]
    fn test_empty_config() {
        let config: Config = toml::from_str("").expect("Empty config should work");
        assert_eq!(config.http.timeout(), Duration::from_secs(30));
        assert!(config.browser.headless);
    }

    #[test]
    fn test_empty_lists_expand_to_everything() {
        let update = UpdateConfig {
            locales: Vec::new(),
            sources: Vec::new(),
            ..Default::default()
        };
        assert_eq!(update.locales().len(), sources::RIOT_LOCALES.len());
        assert_eq!(update.source_ids().len(), sources::all().len());
    }

    #[test]
    fn test_breaker_settings_conversion() {
        let settings = BreakerSettings {
            failure_threshold: 0,
            recovery_timeout_secs: 60,
            retry_attempts: 2,
        };
        let config = settings.to_breaker_config();
        assert_eq!(config.failure_threshold, 1);
        assert_eq!(config.recovery_timeout, Duration::from_secs(60));
        assert_eq!(config.retry_attempts, 2);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[http]\nstealth = true\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.http.stealth);
    }

    #[test]
    fn test_load_from_invalid_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "[http\n").unwrap();

        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
