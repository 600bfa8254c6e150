pub mod sqlite;

use crate::app::Result;
use crate::domain::Article;

pub use sqlite::{SqliteStore, StoredArticle};

/// Narrows [`ArticleRepository::get_latest`] to one source and/or locale.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceFilter {
    pub source_id: Option<String>,
    pub locale: Option<String>,
}

impl SourceFilter {
    pub fn source(source_id: impl Into<String>) -> Self {
        Self {
            source_id: Some(source_id.into()),
            locale: None,
        }
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

pub trait ArticleRepository: Send + Sync {
    /// Insert unless an article with the same guid exists. `true` means new.
    fn save(&self, article: &Article) -> Result<bool>;

    /// Newest first by publication date.
    fn get_latest(&self, limit: usize, filter: &SourceFilter) -> Result<Vec<StoredArticle>>;

    fn count(&self) -> Result<usize>;
}
