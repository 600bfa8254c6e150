//! Static source tables: locales, game domains, news categories and the
//! third-party source registry.

use crate::domain::SourceCategory;
use crate::scraper::{ScraperKind, ScrapingDifficulty};

/// Every locale the official Riot sites publish.
pub const RIOT_LOCALES: &[&str] = &[
    "en-us", "en-gb", "es-es", "es-mx", "fr-fr", "de-de", "it-it", "pt-br", "ru-ru", "tr-tr",
    "pl-pl", "ja-jp", "ko-kr", "zh-cn", "zh-tw", "ar-ae", "vi-vn", "th-th", "id-id", "ph-ph",
    "cs-cz", "el-gr", "en-au", "en-sg", "hu-hu",
];

/// Official game sites. All serve the same Next.js news API.
pub const GAME_DOMAINS: &[(&str, &str)] = &[
    ("lol", "https://www.leagueoflegends.com"),
    ("tft", "https://teamfighttactics.leagueoflegends.com"),
    ("wildrift", "https://wildrift.leagueoflegends.com"),
];

pub const LOL_NEWS_CATEGORIES: &[&str] = &[
    "game-updates",
    "dev",
    "esports",
    "community",
    "media",
    "lore",
    "riot-games",
    "announcements",
    "merch",
];

pub const TFT_NEWS_CATEGORIES: &[&str] = &["game-updates", "dev", "esports", "community", "media"];

pub const WILDRIFT_NEWS_CATEGORIES: &[&str] = &["game-updates", "dev", "esports", "community"];

pub const CATEGORY_SLUG_TO_DISPLAY: &[(&str, &str)] = &[
    ("game-updates", "Game Updates"),
    ("dev", "Dev"),
    ("esports", "Esports"),
    ("community", "Community"),
    ("media", "Media"),
    ("lore", "Lore"),
    ("riot-games", "Riot Games"),
    ("announcements", "Announcements"),
    ("merch", "Merch"),
];

/// Minimum seconds between requests, keyed by host.
pub const DEFAULT_RATE_LIMITS: &[(&str, f64)] = &[
    ("www.leagueoflegends.com", 1.0),
    ("teamfighttactics.leagueoflegends.com", 1.0),
    ("wildrift.leagueoflegends.com", 1.0),
    ("www.dexerto.com", 2.0),
    ("dotesports.com", 2.0),
    ("www.reddit.com", 3.0),
];

pub const DEFAULT_RATE_LIMIT_SECONDS: f64 = 2.0;

const ENGLISH: &[&str] = &["en-us", "en-gb", "en-au", "en-sg"];
const US_ONLY: &[&str] = &["en-us"];

/// A known upstream source and how to scrape it.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceDefinition {
    pub id: &'static str,
    pub name: &'static str,
    pub base_url: &'static str,
    pub feed_url: Option<&'static str>,
    pub kind: ScraperKind,
    pub difficulty: ScrapingDifficulty,
    pub category: SourceCategory,
    /// Locales this source publishes in. Empty means every Riot locale.
    pub locales: &'static [&'static str],
    pub rate_limit_seconds: f64,
}

impl SourceDefinition {
    pub fn supports_locale(&self, locale: &str) -> bool {
        self.locales.is_empty() || self.locales.contains(&locale)
    }

    pub fn requires_browser(&self) -> bool {
        self.kind == ScraperKind::HeadlessBrowser
    }
}

const fn official(
    id: &'static str,
    name: &'static str,
    base_url: &'static str,
    category: SourceCategory,
) -> SourceDefinition {
    SourceDefinition {
        id,
        name,
        base_url,
        feed_url: None,
        kind: ScraperKind::OfficialApi,
        difficulty: ScrapingDifficulty::Easy,
        category,
        locales: &[],
        rate_limit_seconds: 1.0,
    }
}

const fn rss(
    id: &'static str,
    name: &'static str,
    base_url: &'static str,
    feed_url: &'static str,
    category: SourceCategory,
    locales: &'static [&'static str],
) -> SourceDefinition {
    SourceDefinition {
        id,
        name,
        base_url,
        feed_url: Some(feed_url),
        kind: ScraperKind::RssFeed,
        difficulty: ScrapingDifficulty::Easy,
        category,
        locales,
        rate_limit_seconds: 2.0,
    }
}

const fn html(
    id: &'static str,
    name: &'static str,
    base_url: &'static str,
    category: SourceCategory,
    locales: &'static [&'static str],
) -> SourceDefinition {
    SourceDefinition {
        id,
        name,
        base_url,
        feed_url: None,
        kind: ScraperKind::Html,
        difficulty: ScrapingDifficulty::Medium,
        category,
        locales,
        rate_limit_seconds: 2.0,
    }
}

const fn browser(
    id: &'static str,
    name: &'static str,
    base_url: &'static str,
    category: SourceCategory,
    locales: &'static [&'static str],
) -> SourceDefinition {
    SourceDefinition {
        id,
        name,
        base_url,
        feed_url: None,
        kind: ScraperKind::HeadlessBrowser,
        difficulty: ScrapingDifficulty::Hard,
        category,
        locales,
        rate_limit_seconds: 3.0,
    }
}

pub static SOURCES: &[SourceDefinition] = &[
    official("lol", "League of Legends", "https://www.leagueoflegends.com", SourceCategory::OfficialRiot),
    official("tft", "Teamfight Tactics", "https://teamfighttactics.leagueoflegends.com", SourceCategory::Tft),
    official("wildrift", "Wild Rift", "https://wildrift.leagueoflegends.com", SourceCategory::WildRift),
    rss("dexerto", "Dexerto", "https://www.dexerto.com", "https://www.dexerto.com/league-of-legends/feed/", SourceCategory::Esports, ENGLISH),
    rss("dotesports", "Dot Esports", "https://dotesports.com", "https://dotesports.com/league-of-legends/feed", SourceCategory::Esports, ENGLISH),
    rss("pcgamesn", "PCGamesN", "https://www.pcgamesn.com", "https://www.pcgamesn.com/league-of-legends/feed", SourceCategory::News, ENGLISH),
    rss("thegamer", "TheGamer", "https://www.thegamer.com", "https://www.thegamer.com/feed/category/league-of-legends/", SourceCategory::News, ENGLISH),
    rss("nme", "NME", "https://www.nme.com", "https://www.nme.com/gaming/league-of-legends/feed", SourceCategory::News, ENGLISH),
    rss("3djuegos", "3DJuegos", "https://www.3djuegos.com", "https://www.3djuegos.com/feeds/league-of-legends", SourceCategory::News, &["es-es", "es-mx"]),
    html("esportsgg", "Esports.gg", "https://esports.gg", SourceCategory::Esports, US_ONLY),
    html("upcomer", "Upcomer", "https://www.upcomer.com", SourceCategory::Esports, US_ONLY),
    html("ggrecon", "GGRecon", "https://www.ggrecon.com", SourceCategory::News, ENGLISH),
    html("earlygame", "EarlyGame", "https://earlygame.com", SourceCategory::News, &["en-us", "de-de"]),
    html("inven", "Inven", "https://www.inven.co.kr", SourceCategory::Community, &["ko-kr"]),
    html("opgg", "OP.GG", "https://op.gg", SourceCategory::Analytics, &["en-us", "ko-kr"]),
    html("mobalytics", "Mobalytics", "https://mobalytics.gg", SourceCategory::Analytics, US_ONLY),
    html("blitz-gg", "Blitz", "https://blitz.gg", SourceCategory::Analytics, US_ONLY),
    html("porofessor", "Porofessor", "https://porofessor.gg", SourceCategory::Analytics, US_ONLY),
    html("bunnymuffins", "BunnyMuffins", "https://bunnymuffins.lol", SourceCategory::Community, US_ONLY),
    html("tftactics", "TFTactics", "https://tftactics.gg", SourceCategory::Tft, US_ONLY),
    browser("u-gg", "U.GG", "https://u.gg", SourceCategory::Analytics, US_ONLY),
    browser("lolesports", "LoL Esports", "https://lolesports.com", SourceCategory::Esports, ENGLISH),
    browser("reddit", "r/leagueoflegends", "https://www.reddit.com/r/leagueoflegends", SourceCategory::Community, US_ONLY),
];

pub fn all() -> &'static [SourceDefinition] {
    SOURCES
}

pub fn find(source_id: &str) -> Option<&'static SourceDefinition> {
    SOURCES.iter().find(|s| s.id == source_id)
}

/// Human-readable name, falling back to the id itself for unknown sources.
pub fn display_name(source_id: &str) -> &str {
    find(source_id).map(|s| s.name).unwrap_or(source_id)
}

pub fn category_for(source_id: &str) -> SourceCategory {
    find(source_id)
        .map(|s| s.category)
        .unwrap_or(SourceCategory::News)
}

pub fn game_domain(game_id: &str) -> Option<&'static str> {
    GAME_DOMAINS
        .iter()
        .find(|(id, _)| *id == game_id)
        .map(|(_, domain)| *domain)
}

/// News category slugs for game sources; `None` for everything else.
pub fn game_categories(source_id: &str) -> Option<&'static [&'static str]> {
    match source_id {
        "lol" => Some(LOL_NEWS_CATEGORIES),
        "tft" => Some(TFT_NEWS_CATEGORIES),
        "wildrift" => Some(WILDRIFT_NEWS_CATEGORIES),
        _ => None,
    }
}

pub fn category_display(slug: &str) -> Option<&'static str> {
    CATEGORY_SLUG_TO_DISPLAY
        .iter()
        .find(|(s, _)| *s == slug)
        .map(|(_, display)| *display)
}

pub fn rate_limit_for_domain(host: &str) -> f64 {
    DEFAULT_RATE_LIMITS
        .iter()
        .find(|(h, _)| *h == host)
        .map(|(_, secs)| *secs)
        .unwrap_or(DEFAULT_RATE_LIMIT_SECONDS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locales_count() {
        assert_eq!(RIOT_LOCALES.len(), 25);
        assert!(RIOT_LOCALES.contains(&"it-it"));
    }

    #[test]
    fn test_every_game_domain_has_source_and_categories() {
        for (game_id, domain) in GAME_DOMAINS {
            let source = find(game_id).unwrap();
            assert_eq!(source.base_url, *domain);
            assert_eq!(source.kind, ScraperKind::OfficialApi);
            assert!(game_categories(game_id).is_some());
        }
    }

    #[test]
    fn test_every_category_slug_has_display_name() {
        for slug in LOL_NEWS_CATEGORIES {
            assert!(category_display(slug).is_some(), "missing display for {}", slug);
        }
        assert_eq!(category_display("game-updates"), Some("Game Updates"));
    }

    #[test]
    fn test_source_ids_unique() {
        let mut ids: Vec<_> = SOURCES.iter().map(|s| s.id).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), SOURCES.len());
    }

    #[test]
    fn test_display_name_and_category() {
        assert_eq!(display_name("dexerto"), "Dexerto");
        assert_eq!(display_name("unknown"), "unknown");
        assert_eq!(category_for("dexerto"), SourceCategory::Esports);
        assert_eq!(category_for("lol"), SourceCategory::OfficialRiot);
    }

    #[test]
    fn test_supports_locale() {
        assert!(find("lol").unwrap().supports_locale("ko-kr"));
        assert!(find("inven").unwrap().supports_locale("ko-kr"));
        assert!(!find("inven").unwrap().supports_locale("en-us"));
    }

    #[test]
    fn test_rate_limits_include_game_domains() {
        assert_eq!(rate_limit_for_domain("teamfighttactics.leagueoflegends.com"), 1.0);
        assert_eq!(rate_limit_for_domain("wildrift.leagueoflegends.com"), 1.0);
        assert_eq!(rate_limit_for_domain("unknown.example"), DEFAULT_RATE_LIMIT_SECONDS);
    }
}
