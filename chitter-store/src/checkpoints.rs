//! Per-account fetch checkpoints.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};

use crate::error::StoreError;

/// Durable marker of ingestion progress for one account.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Checkpoint {
    pub account_id: String,
    /// Highest post id previously ingested, or `None` when every poll so
    /// far returned zero posts.
    pub last_seen_post_id: Option<i64>,
    pub last_poll_time: DateTime<Utc>,
}

#[derive(Clone)]
pub struct CheckpointStore {
    pool: SqlitePool,
}

impl CheckpointStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn get(&self, account_id: &str) -> Result<Option<Checkpoint>, StoreError> {
        let row = sqlx::query(
            r#"SELECT account_id, last_seen_post_id, last_poll_time
               FROM account_checkpoint WHERE account_id = ?1"#,
        )
        .bind(account_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(checkpoint_from_row).transpose()
    }

    /// Upsert the checkpoint. Passing `last_seen = None` keeps any
    /// previously recorded id (a poll that found nothing new still has to
    /// record its `poll_time`). The store does not reject a lower id; the
    /// caller owns the only-ever-forward discipline.
    pub async fn advance(
        &self,
        account_id: &str,
        last_seen: Option<i64>,
        poll_time: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        sqlx::query(
            r#"INSERT INTO account_checkpoint (account_id, last_seen_post_id, last_poll_time)
               VALUES (?1, ?2, ?3)
               ON CONFLICT(account_id) DO UPDATE SET
                 last_seen_post_id = COALESCE(excluded.last_seen_post_id,
                                              account_checkpoint.last_seen_post_id),
                 last_poll_time = excluded.last_poll_time"#,
        )
        .bind(account_id)
        .bind(last_seen)
        .bind(poll_time)
        .execute(&self.pool)
        .await?;
        tracing::debug!(
            account = %account_id,
            last_seen = ?last_seen,
            "store.checkpoint.advance"
        );
        Ok(())
    }

    pub async fn all(&self) -> Result<Vec<Checkpoint>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT account_id, last_seen_post_id, last_poll_time FROM account_checkpoint"#,
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(checkpoint_from_row).collect()
    }
}

fn checkpoint_from_row(row: sqlx::sqlite::SqliteRow) -> Result<Checkpoint, StoreError> {
    Ok(Checkpoint {
        account_id: row.try_get("account_id")?,
        last_seen_post_id: row.try_get("last_seen_post_id")?,
        last_poll_time: row.try_get("last_poll_time")?,
    })
}
