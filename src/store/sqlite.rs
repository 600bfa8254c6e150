use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use rusqlite_migration::{Migrations, M};
use serde::Serialize;

use crate::app::{Result, RiftError};
use crate::domain::{Article, SourceCategory};
use crate::store::{ArticleRepository, SourceFilter};

/// An article as read back from the database.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StoredArticle {
    pub guid: String,
    pub title: String,
    pub url: String,
    pub pub_date: DateTime<Utc>,
    pub source_id: String,
    pub locale: String,
    pub source_category: SourceCategory,
    pub description: String,
    pub image_url: Option<String>,
    pub author: String,
    pub categories: Vec<String>,
    pub content: Option<String>,
}

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| RiftError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            RiftError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
        DateTime::parse_from_rfc3339(s)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| s.parse::<DateTime<Utc>>().ok())
    }

    fn row_to_article(row: &Row<'_>) -> rusqlite::Result<StoredArticle> {
        let categories: String = row.get(10)?;
        Ok(StoredArticle {
            guid: row.get(0)?,
            title: row.get(1)?,
            url: row.get(2)?,
            pub_date: row
                .get::<_, String>(3)
                .ok()
                .and_then(|s| Self::parse_datetime(&s))
                .unwrap_or_else(Utc::now),
            source_id: row.get(4)?,
            locale: row.get(5)?,
            source_category: SourceCategory::parse(&row.get::<_, String>(6)?)
                .unwrap_or(SourceCategory::News),
            description: row.get(7)?,
            image_url: row.get(8)?,
            author: row.get(9)?,
            categories: serde_json::from_str(&categories).unwrap_or_default(),
            content: row.get(11)?,
        })
    }
}

impl ArticleRepository for SqliteStore {
    fn save(&self, article: &Article) -> Result<bool> {
        let conn = self.lock()?;
        let categories = serde_json::to_string(article.categories())?;

        let inserted = conn.execute(
            "INSERT OR IGNORE INTO articles
                (guid, title, url, canonical_url, pub_date, source_id, locale, source_category,
                 description, image_url, author, categories, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                article.guid(),
                article.title(),
                article.url(),
                article.canonical_url(),
                article.pub_date().to_rfc3339(),
                article.source().source_id,
                article.locale(),
                article.source_category().as_str(),
                article.description(),
                article.image_url(),
                article.author(),
                categories,
                article.content(),
                Utc::now().to_rfc3339()
            ],
        )?;

        Ok(inserted > 0)
    }

    fn get_latest(&self, limit: usize, filter: &SourceFilter) -> Result<Vec<StoredArticle>> {
        let conn = self.lock()?;

        let mut stmt = conn.prepare(
            "SELECT guid, title, url, pub_date, source_id, locale, source_category,
                    description, image_url, author, categories, content
             FROM articles
             WHERE (?1 IS NULL OR source_id = ?1) AND (?2 IS NULL OR locale = ?2)
             ORDER BY pub_date DESC
             LIMIT ?3",
        )?;

        let articles = stmt
            .query_map(
                params![filter.source_id, filter.locale, limit as i64],
                Self::row_to_article,
            )?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(articles)
    }

    fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM articles", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}
