use std::fmt;
use std::hash::{Hash, Hasher};

use serde::Serialize;

use crate::domain::SourceCategory;

/// Scheduling tier of an update task. Lower discriminant runs first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdatePriority {
    Critical = 0,
    High = 1,
    Medium = 2,
    Low = 3,
}

impl UpdatePriority {
    pub fn for_category(category: SourceCategory) -> Self {
        match category {
            SourceCategory::OfficialRiot => UpdatePriority::Critical,
            SourceCategory::Tft | SourceCategory::WildRift => UpdatePriority::High,
            SourceCategory::Esports | SourceCategory::News => UpdatePriority::High,
            SourceCategory::Community | SourceCategory::Analytics => UpdatePriority::Medium,
            SourceCategory::Social => UpdatePriority::Low,
        }
    }
}

/// One unit of orchestrator work: fetch `source_id` for `locale`, optionally
/// narrowed to a news category slug.
///
/// Identity (equality and hashing) is `(source_id, locale, news_category)`;
/// priority and category only influence ordering.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateTask {
    pub priority: UpdatePriority,
    pub source_id: String,
    pub locale: String,
    pub category: SourceCategory,
    pub news_category: Option<String>,
}

impl UpdateTask {
    pub fn new(
        priority: UpdatePriority,
        source_id: impl Into<String>,
        locale: impl Into<String>,
        category: SourceCategory,
        news_category: Option<String>,
    ) -> Self {
        Self {
            priority,
            source_id: source_id.into(),
            locale: locale.into(),
            category,
            news_category,
        }
    }

    /// Key used in the per-source statistics breakdown.
    pub fn stats_key(&self) -> String {
        match &self.news_category {
            Some(cat) => format!("{}:{}:{}", self.source_id, self.locale, cat),
            None => format!("{}:{}", self.source_id, self.locale),
        }
    }
}

impl PartialEq for UpdateTask {
    fn eq(&self, other: &Self) -> bool {
        self.source_id == other.source_id
            && self.locale == other.locale
            && self.news_category == other.news_category
    }
}

impl Eq for UpdateTask {}

impl Hash for UpdateTask {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.source_id.hash(state);
        self.locale.hash(state);
        self.news_category.hash(state);
    }
}

impl fmt::Display for UpdateTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.stats_key())
    }
}
