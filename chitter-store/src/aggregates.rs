//! URL aggregates: distinct sharers and append-only mention contexts.
//!
//! The sharer set is enforced by the `(url, account_id)` primary key, so
//! re-recording the same account is a no-op for the count while the
//! context trail still grows. All writes for one mention share a single
//! transaction, which also serializes concurrent mentions of the same
//! URL.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Row, SqlitePool};

use crate::error::StoreError;

/// Audit record of one post that referenced a URL.
#[derive(Debug, Clone)]
pub struct MentionContext {
    pub post_id: i64,
    pub account_id: String,
    pub post_text: String,
    pub sub_posts: Vec<SubPostSummary>,
}

/// Condensed reshared/quoted post carried inside a context.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubPostSummary {
    pub id: i64,
    pub author: String,
    pub text: String,
}

/// An aggregate that crossed the publication threshold.
#[derive(Debug, Clone)]
pub struct EligibleUrl {
    pub url: String,
    /// Distinct sharer accounts, sorted for deterministic rendering.
    pub sharers: Vec<String>,
    pub first_seen: DateTime<Utc>,
}

#[derive(Clone)]
pub struct AggregateStore {
    pool: SqlitePool,
}

impl AggregateStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Record one mention of `url` by `account_id`. Creates the aggregate
    /// on first sight (fixing `first_seen`), adds the sharer
    /// idempotently, and always appends the context.
    pub async fn record_mention(
        &self,
        url: &str,
        account_id: &str,
        context: MentionContext,
    ) -> Result<(), StoreError> {
        let sub_posts = serde_json::to_string(&context.sub_posts)?;
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"INSERT INTO url_aggregate (url, first_seen) VALUES (?1, ?2)
               ON CONFLICT(url) DO NOTHING"#,
        )
        .bind(url)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"INSERT INTO url_sharer (url, account_id) VALUES (?1, ?2)
               ON CONFLICT(url, account_id) DO NOTHING"#,
        )
        .bind(url)
        .bind(account_id)
        .execute(&mut *tx)
        .await?;
        sqlx::query(
            r#"INSERT INTO mention_context
               (url, post_id, account_id, post_text, sub_posts, recorded_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#,
        )
        .bind(url)
        .bind(context.post_id)
        .bind(&context.account_id)
        .bind(&context.post_text)
        .bind(sub_posts)
        .bind(now)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::debug!(
            url = %url,
            account = %account_id,
            post_id = context.post_id,
            "store.aggregate.mention"
        );
        Ok(())
    }

    /// Aggregates whose distinct-sharer count meets the threshold,
    /// oldest-first by `first_seen` so long-aggregating, high-consensus
    /// links surface before newer ones with the same count.
    pub async fn eligible(&self, min_sharer_count: u32) -> Result<Vec<EligibleUrl>, StoreError> {
        let rows = sqlx::query(
            r#"SELECT a.url AS url,
                      a.first_seen AS first_seen,
                      GROUP_CONCAT(s.account_id) AS sharers
               FROM url_aggregate a
               JOIN url_sharer s ON s.url = a.url
               GROUP BY a.url
               HAVING COUNT(s.account_id) >= ?1
               ORDER BY a.first_seen ASC"#,
        )
        .bind(min_sharer_count as i64)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                let concat: String = row.try_get("sharers")?;
                let mut sharers: Vec<String> =
                    concat.split(',').map(|s| s.to_string()).collect();
                sharers.sort();
                Ok(EligibleUrl {
                    url: row.try_get("url")?,
                    sharers,
                    first_seen: row.try_get("first_seen")?,
                })
            })
            .collect()
    }

    pub async fn sharer_count(&self, url: &str) -> Result<u32, StoreError> {
        let n: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM url_sharer WHERE url = ?1"#)
                .bind(url)
                .fetch_one(&self.pool)
                .await?;
        Ok(n as u32)
    }

    pub async fn context_count(&self, url: &str) -> Result<u32, StoreError> {
        let n: i64 =
            sqlx::query_scalar(r#"SELECT COUNT(*) FROM mention_context WHERE url = ?1"#)
                .bind(url)
                .fetch_one(&self.pool)
                .await?;
        Ok(n as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{ensure_schema, memory_pool};

    async fn store() -> AggregateStore {
        let pool = memory_pool().await.unwrap();
        ensure_schema(&pool).await.unwrap();
        AggregateStore::new(pool)
    }

    fn ctx(post_id: i64, account: &str) -> MentionContext {
        MentionContext {
            post_id,
            account_id: account.to_string(),
            post_text: format!("post {post_id}"),
            sub_posts: vec![],
        }
    }

    #[tokio::test]
    async fn repeated_mention_by_same_account_is_idempotent_for_sharers() {
        let store = store().await;
        let url = "https://example.com/a";
        store.record_mention(url, "42", ctx(100, "42")).await.unwrap();
        store.record_mention(url, "42", ctx(105, "42")).await.unwrap();

        assert_eq!(store.sharer_count(url).await.unwrap(), 1);
        assert_eq!(store.context_count(url).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn distinct_accounts_grow_the_sharer_set() {
        let store = store().await;
        let url = "https://example.com/a";
        store.record_mention(url, "1", ctx(10, "1")).await.unwrap();
        store.record_mention(url, "2", ctx(11, "2")).await.unwrap();
        assert_eq!(store.sharer_count(url).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn eligibility_boundary_is_inclusive() {
        let store = store().await;
        store
            .record_mention("https://x.example/two", "1", ctx(1, "1"))
            .await
            .unwrap();
        store
            .record_mention("https://x.example/two", "2", ctx(2, "2"))
            .await
            .unwrap();
        store
            .record_mention("https://x.example/one", "1", ctx(3, "1"))
            .await
            .unwrap();

        let eligible = store.eligible(2).await.unwrap();
        assert_eq!(eligible.len(), 1);
        assert_eq!(eligible[0].url, "https://x.example/two");
        assert_eq!(eligible[0].sharers, vec!["1", "2"]);

        // Exactly at the threshold counts; below does not.
        assert_eq!(store.eligible(1).await.unwrap().len(), 2);
        assert!(store.eligible(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn eligible_orders_oldest_first() {
        let store = store().await;
        store
            .record_mention("https://old.example/", "1", ctx(1, "1"))
            .await
            .unwrap();
        store
            .record_mention("https://new.example/", "1", ctx(2, "1"))
            .await
            .unwrap();
        store
            .record_mention("https://new.example/", "2", ctx(3, "2"))
            .await
            .unwrap();
        store
            .record_mention("https://old.example/", "2", ctx(4, "2"))
            .await
            .unwrap();

        let eligible = store.eligible(2).await.unwrap();
        assert_eq!(eligible.len(), 2);
        assert_eq!(eligible[0].url, "https://old.example/");
        assert_eq!(eligible[1].url, "https://new.example/");
        assert!(eligible[0].first_seen <= eligible[1].first_seen);
    }
}
