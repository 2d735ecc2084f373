//! Pool construction and schema bootstrap.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;

use crate::error::StoreError;

/// Open (creating if missing) the database behind `database_url` with
/// WAL journaling and full synchronous writes; checkpoint and feed-log
/// durability depends on the latter.
pub async fn connect(database_url: &str) -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(sqlx::Error::from)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Full);
    let pool = SqlitePoolOptions::new().connect_with(options).await?;
    Ok(pool)
}

/// In-memory pool for tests. Capped at one connection so every query
/// sees the same database.
pub async fn memory_pool() -> Result<SqlitePool, StoreError> {
    let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(sqlx::Error::from)?;
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await?;
    Ok(pool)
}

/// Create the tables and indexes if they do not exist yet. Idempotent;
/// run at process start.
pub async fn ensure_schema(pool: &SqlitePool) -> Result<(), StoreError> {
    sqlx::raw_sql(
        r#"
        CREATE TABLE IF NOT EXISTS account_checkpoint (
          account_id        TEXT PRIMARY KEY,
          last_seen_post_id INTEGER,
          last_poll_time    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS url_aggregate (
          url        TEXT PRIMARY KEY,
          first_seen TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS url_sharer (
          url        TEXT NOT NULL,
          account_id TEXT NOT NULL,
          PRIMARY KEY (url, account_id)
        );

        CREATE TABLE IF NOT EXISTS mention_context (
          id          INTEGER PRIMARY KEY AUTOINCREMENT,
          url         TEXT NOT NULL,
          post_id     INTEGER NOT NULL,
          account_id  TEXT NOT NULL,
          post_text   TEXT NOT NULL,
          sub_posts   TEXT NOT NULL,
          recorded_at TEXT NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_mention_context_url ON mention_context (url);

        CREATE TABLE IF NOT EXISTS feed_entry (
          link         TEXT PRIMARY KEY,
          title        TEXT NOT NULL,
          description  TEXT NOT NULL,
          published_at TEXT NOT NULL
        );
        "#,
    )
    .execute(pool)
    .await?;
    tracing::debug!("store.schema.ensured");
    Ok(())
}
