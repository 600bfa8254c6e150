//! robots.txt compliance: a parser and a shared, caching gate in front of it.

mod gate;
mod parser;

pub use gate::{RobotsCacheEntry, RobotsCacheStats, RobotsGate, DEFAULT_CACHE_TTL, DEFAULT_CRAWL_DELAY};
pub use parser::RobotsTxt;
