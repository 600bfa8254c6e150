//! robots.txt parsing and rule evaluation.

use std::time::Duration;

/// Parsed robots.txt rules.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RobotsTxt {
    groups: Vec<AgentGroup>,
    sitemaps: Vec<String>,
}

/// One `User-agent` block. Consecutive `User-agent` lines share a group.
#[derive(Debug, Clone, Default, PartialEq)]
struct AgentGroup {
    /// Lowercased agent tokens
    agents: Vec<String>,
    rules: Vec<Rule>,
    crawl_delay: Option<Duration>,
}

#[derive(Debug, Clone, PartialEq)]
struct Rule {
    allow: bool,
    pattern: String,
}

impl RobotsTxt {
    /// Parse robots.txt content. Never fails: unknown lines are ignored.
    pub fn parse(content: &str) -> Self {
        let mut robots = Self::default();
        let mut current: Option<AgentGroup> = None;
        let mut in_agent_lines = false;

        for line in content.lines() {
            let line = match line.split_once('#') {
                Some((before, _)) => before,
                None => line,
            }
            .trim();

            if line.is_empty() {
                continue;
            }

            let Some((directive, value)) = line.split_once(':') else {
                continue;
            };
            let directive = directive.trim().to_lowercase();
            let value = value.trim();

            match directive.as_str() {
                "user-agent" => {
                    if !in_agent_lines {
                        if let Some(group) = current.take() {
                            robots.groups.push(group);
                        }
                        current = Some(AgentGroup::default());
                    }
                    if let Some(group) = current.as_mut() {
                        group.agents.push(value.to_lowercase());
                    }
                    in_agent_lines = true;
                }
                "allow" | "disallow" => {
                    in_agent_lines = false;
                    // An empty Disallow allows everything; no rule needed.
                    if value.is_empty() {
                        continue;
                    }
                    if let Some(group) = current.as_mut() {
                        group.rules.push(Rule {
                            allow: directive == "allow",
                            pattern: value.to_string(),
                        });
                    }
                }
                "crawl-delay" => {
                    in_agent_lines = false;
                    // Negative, NaN and values too large for a Duration are ignored.
                    let delay = value
                        .parse::<f64>()
                        .ok()
                        .and_then(|secs| Duration::try_from_secs_f64(secs).ok());
                    if let (Some(group), Some(delay)) = (current.as_mut(), delay) {
                        group.crawl_delay = Some(delay);
                    }
                }
                "sitemap" => {
                    robots.sitemaps.push(value.to_string());
                }
                _ => {
                    in_agent_lines = false;
                }
            }
        }

        if let Some(group) = current {
            robots.groups.push(group);
        }

        robots
    }

    /// Robots that allow everything (missing robots.txt).
    pub fn allow_all() -> Self {
        Self::default()
    }

    /// Pick the group for a user agent: the longest agent token contained in
    /// the user agent string, else the `*` group.
    fn group_for(&self, user_agent: &str) -> Option<&AgentGroup> {
        let agent_lower = user_agent.to_lowercase();

        let specific = self
            .groups
            .iter()
            .flat_map(|g| g.agents.iter().map(move |a| (a, g)))
            .filter(|(a, _)| a.as_str() != "*" && agent_lower.contains(a.as_str()))
            .max_by_key(|(a, _)| a.len())
            .map(|(_, g)| g);

        specific.or_else(|| {
            self.groups
                .iter()
                .find(|g| g.agents.iter().any(|a| a == "*"))
        })
    }

    /// Check if a path (with optional query) is allowed for a user-agent.
    ///
    /// The longest matching pattern decides; `Allow` wins a tie.
    pub fn is_allowed(&self, user_agent: &str, path: &str) -> bool {
        if path == "/robots.txt" {
            return true;
        }

        let Some(group) = self.group_for(user_agent) else {
            return true;
        };

        let mut best: Option<(usize, bool)> = None;
        for rule in &group.rules {
            if !pattern_matches(&rule.pattern, path) {
                continue;
            }
            let len = rule.pattern.len();
            best = match best {
                Some((best_len, best_allow))
                    if best_len > len || (best_len == len && best_allow) =>
                {
                    Some((best_len, best_allow))
                }
                _ => Some((len, rule.allow)),
            };
        }

        best.map(|(_, allow)| allow).unwrap_or(true)
    }

    /// Crawl delay for a user-agent, falling back to the `*` group.
    pub fn crawl_delay(&self, user_agent: &str) -> Option<Duration> {
        self.group_for(user_agent).and_then(|g| g.crawl_delay).or_else(|| {
            self.groups
                .iter()
                .find(|g| g.agents.iter().any(|a| a == "*"))
                .and_then(|g| g.crawl_delay)
        })
    }

    pub fn sitemaps(&self) -> &[String] {
        &self.sitemaps
    }
}

/// Match a robots pattern against a path. `*` matches any run of characters,
/// a trailing `$` anchors the end; otherwise the pattern is a prefix.
fn pattern_matches(pattern: &str, path: &str) -> bool {
    let (pattern, anchored) = match pattern.strip_suffix('$') {
        Some(p) => (p, true),
        None => (pattern, false),
    };

    let parts: Vec<&str> = pattern.split('*').collect();
    let first = parts[0];
    if !path.starts_with(first) {
        return false;
    }
    let mut pos = first.len();

    for (i, part) in parts.iter().enumerate().skip(1) {
        if anchored && i == parts.len() - 1 {
            return path.len() >= pos + part.len() && path.ends_with(part);
        }
        match path[pos..].find(part) {
            Some(idx) => pos += idx + part.len(),
            None => return false,
        }
    }

    !anchored || pos == path.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_basic() {
        let content = r#"
User-agent: *
Disallow: /private/
Disallow: /admin/
Allow: /public/
Crawl-delay: 2

Sitemap: https://example.com/sitemap.xml
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(robots.is_allowed("TestBot", "/public/page"));
        assert!(!robots.is_allowed("TestBot", "/private/page"));
        assert!(!robots.is_allowed("TestBot", "/admin/"));
        assert!(robots.is_allowed("TestBot", "/other/page"));

        assert_eq!(robots.crawl_delay("TestBot"), Some(Duration::from_secs(2)));
        assert_eq!(robots.sitemaps().len(), 1);
    }

    #[test]
    fn test_specific_user_agent() {
        let content = r#"
User-agent: *
Disallow: /

User-agent: riftfeed
Disallow:
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed("BadBot", "/page"));
        assert!(robots.is_allowed(
            "Mozilla/5.0 (compatible; RiftFeed/1.0; +https://github.com/riftfeed/riftfeed)",
            "/page"
        ));
    }

    #[test]
    fn test_grouped_user_agents_share_rules() {
        let content = r#"
User-agent: alpha
User-agent: beta
Disallow: /shared/
        "#;

        let robots = RobotsTxt::parse(content);
        assert!(!robots.is_allowed("alpha", "/shared/x"));
        assert!(!robots.is_allowed("beta", "/shared/x"));
        assert!(robots.is_allowed("gamma", "/shared/x"));
    }

    #[test]
    fn test_longest_match_wins() {
        let content = r#"
User-agent: *
Disallow: /private/
Allow: /private/public/
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed("Bot", "/private/secret"));
        assert!(robots.is_allowed("Bot", "/private/public/page"));
    }

    #[test]
    fn test_allow_wins_tie() {
        let content = "User-agent: *\nDisallow: /page\nAllow: /page\n";
        let robots = RobotsTxt::parse(content);
        assert!(robots.is_allowed("Bot", "/page"));
    }

    #[test]
    fn test_wildcards_and_anchor() {
        let content = r#"
User-agent: *
Disallow: /*.pdf$
Disallow: /search*q=
        "#;

        let robots = RobotsTxt::parse(content);

        assert!(!robots.is_allowed("Bot", "/files/report.pdf"));
        assert!(robots.is_allowed("Bot", "/files/report.pdf?download=1"));
        assert!(!robots.is_allowed("Bot", "/search?page=2&q=lol"));
        assert!(robots.is_allowed("Bot", "/searchable"));
    }

    #[test]
    fn test_empty_robots() {
        let robots = RobotsTxt::parse("");

        assert!(robots.is_allowed("AnyBot", "/any/path"));
        assert!(robots.crawl_delay("AnyBot").is_none());
    }

    #[test]
    fn test_disallow_all() {
        let robots = RobotsTxt::parse("User-agent: *\nDisallow: /\n");

        assert!(!robots.is_allowed("Bot", "/"));
        assert!(!robots.is_allowed("Bot", "/anything"));
        assert!(robots.is_allowed("Bot", "/robots.txt"));
    }

    #[test]
    fn test_agent_crawl_delay_falls_back_to_wildcard() {
        let content = r#"
User-agent: *
Crawl-delay: 5

User-agent: riftfeed
Disallow: /tmp/
        "#;

        let robots = RobotsTxt::parse(content);
        assert_eq!(robots.crawl_delay("RiftFeed/1.0"), Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_unrepresentable_crawl_delay_ignored() {
        for value in ["1e20", "-3", "NaN", "inf", "soon"] {
            let robots = RobotsTxt::parse(&format!("User-agent: *\nCrawl-delay: {}\n", value));
            assert_eq!(robots.crawl_delay("riftfeed"), None, "Crawl-delay: {}", value);
        }

        let robots = RobotsTxt::parse("User-agent: *\nCrawl-delay: 0.5\n");
        assert_eq!(robots.crawl_delay("riftfeed"), Some(Duration::from_millis(500)));
    }

    #[test]
    fn test_comments_stripped() {
        let robots = RobotsTxt::parse("User-agent: * # everyone\nDisallow: /x # secret\n");
        assert!(!robots.is_allowed("Bot", "/x/y"));
    }
}
