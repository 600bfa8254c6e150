//! # RiftFeed
//!
//! A League of Legends news aggregator: official Riot sites, esports and
//! community outlets, normalized into one article stream.
//!
//! ## Architecture
//!
//! RiftFeed follows a pipeline architecture:
//!
//! ```text
//! UpdateService → Scraper → (CircuitBreaker, RobotsGate, RateLimiter) → Fetcher → Article → Store
//! ```
//!
//! - [`scraper`]: Official API, RSS, HTML and headless-browser scrapers
//! - [`robots`]: robots.txt compliance with a shared per-domain cache
//! - [`breaker`]: Per-source circuit breakers
//! - [`service`]: Task planning and concurrent updates
//! - [`store`]: SQLite persistence layer
//!
//! ## Quick Start
//!
//! ```bash
//! # Update every configured source
//! riftfeed update
//!
//! # Only Korean official news
//! riftfeed update -l ko-kr -s lol
//!
//! # Preview one source without saving
//! riftfeed fetch dexerto
//!
//! # Run updates every 30 minutes
//! riftfeed daemon -i 30m
//! ```
//!
//! ## Modules
//!
//! - [`app`]: Application context and error types
//! - [`cli`]: Command-line interface definitions
//! - [`config`]: TOML configuration and the source registry
//! - [`daemon`]: Periodic background updates
//! - [`domain`]: Core domain models (Article, UpdateTask)
//! - [`fetcher`]: HTTP fetching and user-agent selection

/// Application context and error handling.
///
/// The [`AppContext`](app::AppContext) struct wires together all components:
/// store, robots gate, breaker registry, update service.
pub mod app;

/// Circuit breakers keyed by source id.
pub mod breaker;

/// Command-line interface using clap.
///
/// Defines the CLI structure and subcommands:
/// - `update [-l LOCALE]... [-s SOURCE]...` - Update sources
/// - `fetch <source>` - Print one source's articles
/// - `robots <url>` - Check robots.txt for a URL
/// - `sources` - List registered sources
/// - `list` - Show the latest stored articles
/// - `daemon [-i INTERVAL] [stop|status]` - Background updates
pub mod cli;

/// Configuration management.
///
/// Loads from `~/.config/riftfeed/config.toml`. The static source registry
/// lives in [`config::sources`].
pub mod config;

/// Background daemon for automatic source updates.
pub mod daemon;

/// Core domain models.
///
/// - [`Article`](domain::Article): Normalized news article with SHA256 GUID
/// - [`UpdateTask`](domain::UpdateTask): One source × locale × category fetch
pub mod domain;

/// HTTP fetching behind the [`Fetcher`](fetcher::Fetcher) trait.
pub mod fetcher;

/// robots.txt parsing and the caching [`RobotsGate`](robots::RobotsGate).
pub mod robots;

/// Source scrapers behind the [`Scraper`](scraper::Scraper) trait.
///
/// Every fetch goes through [`ScraperCore`](scraper::ScraperCore): circuit
/// breaker, robots.txt, per-source rate limit, then the fetcher.
pub mod scraper;

/// Update orchestration.
pub mod service;

/// Database persistence.
///
/// Uses SQLite with migrations for article storage.
pub mod store;
