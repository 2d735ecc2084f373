//! The append-only, deduplicated log of everything ever published.
//!
//! `link` is the primary key, so the "never publish twice" law is
//! enforced at the storage layer even if a caller skips the selection
//! filter. Rendering reads a bounded newest-first slice instead of
//! deserializing the whole history.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::StoreError;

/// One published feed item; immutable once appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub link: String,
    pub title: String,
    pub description: String,
    pub published_at: DateTime<Utc>,
}

#[derive(Clone)]
pub struct FeedLog {
    pool: SqlitePool,
}

impl FeedLog {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn contains(&self, link: &str) -> Result<bool, StoreError> {
        let n: i64 = sqlx::query_scalar(r#"SELECT COUNT(*) FROM feed_entry WHERE link = ?1"#)
            .bind(link)
            .fetch_one(&self.pool)
            .await?;
        Ok(n > 0)
    }

    /// Append a new entry. Fails with [`StoreError::DuplicateEntry`] if
    /// the link was ever published before; committed before returning.
    pub async fn append(&self, entry: &FeedEntry) -> Result<(), StoreError> {
        let res = sqlx::query(
            r#"INSERT INTO feed_entry (link, title, description, published_at)
               VALUES (?1, ?2, ?3, ?4)"#,
        )
        .bind(&entry.link)
        .bind(&entry.title)
        .bind(&entry.description)
        .bind(entry.published_at)
        .execute(&self.pool)
        .await;

        match res {
            Ok(_) => {
                tracing::info!(link = %entry.link, "store.feed.append");
                Ok(())
            }
            Err(sqlx::Error::Database(db))
                if db.kind() == sqlx::error::ErrorKind::UniqueViolation =>
            {
                Err(StoreError::DuplicateEntry(entry.link.clone()))
            }
            Err(other) => Err(StoreError::Database(other)),
        }
    }

    /// Newest-first bounded view for rendering.
    pub async fn render(&self, max_items: usize) -> Result<Vec<FeedEntry>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT link, title, description, published_at
               FROM feed_entry
               ORDER BY published_at DESC, rowid DESC
               LIMIT ?1"#,
        )
        .bind(max_items as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(FeedEntry {
                    link: row.try_get("link")?,
                    title: row.try_get("title")?,
                    description: row.try_get("description")?,
                    published_at: row.try_get("published_at")?,
                })
            })
            .collect()
    }
}
