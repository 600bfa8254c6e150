use rand::seq::IndexedRandom;

/// Identifies the crawler and where to reach its maintainers.
pub const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (compatible; RiftFeed/1.0; +https://github.com/riftfeed/riftfeed)";

pub const BROWSER_USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36 Edg/120.0.0.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

pub fn default_user_agent() -> &'static str {
    DEFAULT_USER_AGENT
}

/// Pick one of the realistic browser user agents.
pub fn random_user_agent() -> &'static str {
    BROWSER_USER_AGENTS
        .choose(&mut rand::rng())
        .copied()
        .unwrap_or(DEFAULT_USER_AGENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_contactable() {
        assert!(default_user_agent().contains("+https://"));
    }

    #[test]
    fn test_random_comes_from_pool() {
        for _ in 0..20 {
            assert!(BROWSER_USER_AGENTS.contains(&random_user_agent()));
        }
    }
}
