//! The ingestion cycle: poll tracked accounts, extract and canonicalize
//! shared URLs, and fold each mention into the durable aggregates.
//!
//! One cycle is a single sequential pass. Accounts are visited least
//! recently polled first so that a rate-limit abort rotates fairly: the
//! accounts cut off this cycle are at the front of the next one.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::Utc;

use chitter_social::{
    is_self_referential, normalize, AccountId, FetchError, Post, SocialClient,
};
use chitter_store::{
    AggregateStore, CheckpointStore, MentionContext, StoreError, SubPostSummary,
};

use crate::metadata::{MetadataCache, MetadataResolver};

/// What a single cycle did, for the caller's logs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Accounts fully polled and checkpointed.
    pub processed: usize,
    /// Accounts skipped on a per-account error (access denied, transient).
    pub skipped: usize,
    /// Accounts never reached because the platform rate-limited us.
    pub not_reached: usize,
}

pub struct IngestionEngine {
    social: Arc<dyn SocialClient>,
    checkpoints: CheckpointStore,
    aggregates: AggregateStore,
    /// Configured list refs whose members are tracked alongside follows.
    lists: Vec<String>,
}

impl IngestionEngine {
    pub fn new(
        social: Arc<dyn SocialClient>,
        checkpoints: CheckpointStore,
        aggregates: AggregateStore,
        lists: Vec<String>,
    ) -> Self {
        Self {
            social,
            checkpoints,
            aggregates,
            lists,
        }
    }

    /// Follows plus members of every configured list, deduplicated.
    /// A listing failure aborts the cycle; polling a stale roster would
    /// silently drop accounts.
    async fn tracked_accounts(&self) -> Result<Vec<AccountId>, FetchError> {
        let mut roster = BTreeSet::new();
        roster.extend(self.social.followed_accounts().await?);
        for list_ref in &self.lists {
            roster.extend(self.social.list_members(list_ref).await?);
        }
        Ok(roster.into_iter().collect())
    }

    /// Run one full cycle. Store failures are fatal; fetch failures are
    /// handled per the [`FetchError`] contract (rate limit aborts the
    /// walk, anything else skips the one account).
    pub async fn run_cycle(
        &self,
        resolver: &dyn MetadataResolver,
        cache: &mut MetadataCache,
    ) -> anyhow::Result<CycleReport> {
        let roster = self.tracked_accounts().await?;
        let ordered = self.order_by_staleness(roster).await?;
        tracing::info!(accounts = ordered.len(), "engine.cycle.start");

        let mut report = CycleReport::default();
        for (idx, account) in ordered.iter().enumerate() {
            let since = self
                .checkpoints
                .get(account)
                .await?
                .and_then(|cp| cp.last_seen_post_id);

            let posts = match self.social.fetch_posts_since(account, since).await {
                Ok(posts) => posts,
                Err(FetchError::RateLimited) => {
                    report.not_reached = ordered.len() - idx;
                    tracing::warn!(
                        account = %account,
                        not_reached = report.not_reached,
                        "engine.cycle.rate_limited"
                    );
                    break;
                }
                Err(err @ (FetchError::AccessDenied(_) | FetchError::Transient(_))) => {
                    tracing::warn!(account = %account, error = %err, "engine.account.skipped");
                    report.skipped += 1;
                    continue;
                }
            };

            let mut max_id = None;
            for post in &posts {
                max_id = max_id.max(Some(post.id));
                self.ingest_post(post, resolver, cache).await?;
            }

            // Only ever move forward; an API hiccup that replays old posts
            // must not rewind the checkpoint.
            let advance_to = max_id.filter(|m| since.map_or(true, |s| *m > s));
            self.checkpoints
                .advance(account, advance_to, Utc::now())
                .await?;
            report.processed += 1;
        }

        tracing::info!(
            processed = report.processed,
            skipped = report.skipped,
            not_reached = report.not_reached,
            "engine.cycle.done"
        );
        Ok(report)
    }

    async fn order_by_staleness(
        &self,
        roster: Vec<AccountId>,
    ) -> Result<Vec<AccountId>, StoreError> {
        let known: std::collections::HashMap<String, chrono::DateTime<Utc>> = self
            .checkpoints
            .all()
            .await?
            .into_iter()
            .map(|cp| (cp.account_id, cp.last_poll_time))
            .collect();

        let mut ordered = roster;
        // Never-polled accounts sort before any timestamp.
        ordered.sort_by_key(|a| known.get(a).copied());
        Ok(ordered)
    }

    async fn ingest_post(
        &self,
        post: &Post,
        resolver: &dyn MetadataResolver,
        cache: &mut MetadataCache,
    ) -> anyhow::Result<()> {
        for raw in post.all_urls() {
            let normalized = match normalize(&raw) {
                Ok(url) => url,
                Err(err) => {
                    tracing::debug!(raw = %raw, error = %err, "engine.url.unparseable");
                    continue;
                }
            };
            if is_self_referential(&normalized) {
                continue;
            }

            let canonical = self
                .canonicalize(resolver, cache, normalized.as_str())
                .await;
            let Some(canonical) = canonical else {
                continue;
            };

            self.aggregates
                .record_mention(&canonical, &post.author, mention_of(post))
                .await?;
        }
        Ok(())
    }

    /// Resolve redirects so shortened wrappers of the same target collapse
    /// into one aggregate. Degrades to the normalized URL when the page
    /// cannot be reached; returns `None` when the redirect lands back on
    /// the platform itself.
    async fn canonicalize(
        &self,
        resolver: &dyn MetadataResolver,
        cache: &mut MetadataCache,
        normalized: &str,
    ) -> Option<String> {
        match cache.resolve_with(resolver, normalized).await {
            Ok(meta) => match normalize(&meta.url) {
                Ok(landed) if is_self_referential(&landed) => {
                    tracing::debug!(url = %normalized, landed = %landed, "engine.url.self_redirect");
                    None
                }
                Ok(landed) => Some(landed.to_string()),
                Err(_) => Some(normalized.to_string()),
            },
            Err(err) => {
                tracing::debug!(url = %normalized, error = %err, "engine.url.unresolved");
                Some(normalized.to_string())
            }
        }
    }
}

fn mention_of(post: &Post) -> MentionContext {
    MentionContext {
        post_id: post.id,
        account_id: post.author.clone(),
        post_text: post.text.clone(),
        sub_posts: post
            .sub_posts
            .iter()
            .map(|s| SubPostSummary {
                id: s.id,
                author: s.author.clone(),
                text: s.text.clone(),
            })
            .collect(),
    }
}
