//! End-to-end cycle behavior against an in-memory store, a scripted
//! social client, and a canned metadata resolver.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;

use chitter_engine::{
    publish_selected, select_for_publication, IngestionEngine, MetadataCache, MetadataError,
    MetadataResolver, PageMetadata,
};
use chitter_social::{AccountId, FetchError, Post, SocialClient, SubPost};
use chitter_store::schema::{ensure_schema, memory_pool};
use chitter_store::{AggregateStore, CheckpointStore, FeedLog};

#[derive(Default)]
struct MockState {
    /// Remaining fetches before every further fetch rate-limits.
    fetch_budget: Option<usize>,
    /// Order in which accounts were fetched, across all cycles.
    fetch_log: Vec<String>,
}

#[derive(Default)]
struct MockOptions {
    /// Ignore `since_id` and replay full history, like a misbehaving API.
    replay: bool,
}

struct MockSocial {
    follows: Vec<AccountId>,
    list_members: HashMap<String, Vec<AccountId>>,
    /// Full post history per account; a fetch returns the suffix newer
    /// than `since_id`.
    history: HashMap<String, Vec<Post>>,
    denied: HashSet<String>,
    options: MockOptions,
    state: Mutex<MockState>,
}

impl MockSocial {
    fn new(follows: &[&str]) -> Self {
        Self {
            follows: follows.iter().map(|s| s.to_string()).collect(),
            list_members: HashMap::new(),
            history: HashMap::new(),
            denied: HashSet::new(),
            options: MockOptions::default(),
            state: Mutex::new(MockState::default()),
        }
    }

    fn replaying(mut self) -> Self {
        self.options.replay = true;
        self
    }

    fn with_posts(mut self, account: &str, posts: Vec<Post>) -> Self {
        self.history.insert(account.to_string(), posts);
        self
    }

    fn with_list(mut self, list_ref: &str, members: &[&str]) -> Self {
        self.list_members.insert(
            list_ref.to_string(),
            members.iter().map(|s| s.to_string()).collect(),
        );
        self
    }

    fn with_denied(mut self, account: &str) -> Self {
        self.denied.insert(account.to_string());
        self
    }

    fn limit_fetches(self, budget: usize) -> Self {
        self.state.lock().unwrap().fetch_budget = Some(budget);
        self
    }

    fn fetch_log(&self) -> Vec<String> {
        self.state.lock().unwrap().fetch_log.clone()
    }

    fn refill(&self, budget: usize) {
        self.state.lock().unwrap().fetch_budget = Some(budget);
    }
}

#[async_trait]
impl SocialClient for MockSocial {
    async fn followed_accounts(&self) -> Result<Vec<AccountId>, FetchError> {
        Ok(self.follows.clone())
    }

    async fn list_members(&self, list_ref: &str) -> Result<Vec<AccountId>, FetchError> {
        Ok(self.list_members.get(list_ref).cloned().unwrap_or_default())
    }

    async fn fetch_posts_since(
        &self,
        account_id: &str,
        since_id: Option<i64>,
    ) -> Result<Vec<Post>, FetchError> {
        {
            let mut state = self.state.lock().unwrap();
            if let Some(budget) = state.fetch_budget.as_mut() {
                if *budget == 0 {
                    return Err(FetchError::RateLimited);
                }
                *budget -= 1;
            }
            state.fetch_log.push(account_id.to_string());
        }
        if self.denied.contains(account_id) {
            return Err(FetchError::AccessDenied(account_id.to_string()));
        }
        let posts = self
            .history
            .get(account_id)
            .map(|ps| {
                ps.iter()
                    .filter(|p| self.options.replay || since_id.map_or(true, |s| p.id > s))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(posts)
    }
}

/// Resolver with scripted redirects and failures; everything else
/// resolves to itself with a title derived from the URL.
#[derive(Default)]
struct StaticResolver {
    redirects: HashMap<String, String>,
    failures: HashSet<String>,
}

impl StaticResolver {
    fn redirect(mut self, from: &str, to: &str) -> Self {
        self.redirects.insert(from.to_string(), to.to_string());
        self
    }

    fn failing(mut self, url: &str) -> Self {
        self.failures.insert(url.to_string());
        self
    }
}

#[async_trait]
impl MetadataResolver for StaticResolver {
    async fn resolve(&self, url: &str) -> Result<PageMetadata, MetadataError> {
        if self.failures.contains(url) {
            return Err(MetadataError {
                url: url.to_string(),
                reason: "connection refused".into(),
            });
        }
        let landed = self.redirects.get(url).cloned().unwrap_or_else(|| url.to_string());
        Ok(PageMetadata {
            url: landed.clone(),
            title: Some(format!("Title of {landed}")),
            description: Some("desc".into()),
        })
    }
}

fn post(id: i64, author: &str, urls: &[&str]) -> Post {
    Post {
        id,
        author: author.to_string(),
        text: format!("post {id}"),
        urls: urls.iter().map(|s| s.to_string()).collect(),
        sub_posts: Vec::new(),
    }
}

struct Harness {
    engine: IngestionEngine,
    checkpoints: CheckpointStore,
    aggregates: AggregateStore,
    feed_log: FeedLog,
    social: Arc<MockSocial>,
}

async fn harness(social: MockSocial, lists: Vec<String>) -> Harness {
    let pool = memory_pool().await.unwrap();
    ensure_schema(&pool).await.unwrap();
    let social = Arc::new(social);
    let checkpoints = CheckpointStore::new(pool.clone());
    let aggregates = AggregateStore::new(pool.clone());
    let feed_log = FeedLog::new(pool);
    let engine = IngestionEngine::new(
        social.clone(),
        checkpoints.clone(),
        aggregates.clone(),
        lists,
    );
    Harness {
        engine,
        checkpoints,
        aggregates,
        feed_log,
        social,
    }
}

#[tokio::test]
async fn first_cycle_ingests_and_checkpoints() {
    let social = MockSocial::new(&["alice"]).with_posts(
        "alice",
        vec![
            post(101, "alice", &["https://example.com/article"]),
            post(105, "alice", &["https://example.com/article"]),
        ],
    );
    let h = harness(social, vec![]).await;
    let resolver = StaticResolver::default();
    let mut cache = MetadataCache::new();

    let report = h.engine.run_cycle(&resolver, &mut cache).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 0);
    assert_eq!(report.not_reached, 0);

    let cp = h.checkpoints.get("alice").await.unwrap().unwrap();
    assert_eq!(cp.last_seen_post_id, Some(105));

    // One sharer, two contexts.
    assert_eq!(
        h.aggregates
            .sharer_count("https://example.com/article")
            .await
            .unwrap(),
        1
    );
    assert_eq!(
        h.aggregates
            .context_count("https://example.com/article")
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn replaying_a_cycle_adds_nothing() {
    let social = MockSocial::new(&["alice"])
        .with_posts("alice", vec![post(7, "alice", &["https://example.com/x"])]);
    let h = harness(social, vec![]).await;
    let resolver = StaticResolver::default();

    let mut cache = MetadataCache::new();
    h.engine.run_cycle(&resolver, &mut cache).await.unwrap();

    // Second cycle: past the checkpoint nothing new comes back, and even
    // if it did the sharer set would absorb the repeat.
    let mut cache = MetadataCache::new();
    h.engine.run_cycle(&resolver, &mut cache).await.unwrap();

    assert_eq!(
        h.aggregates
            .context_count("https://example.com/x")
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn threshold_gates_selection_inclusively() {
    let social = MockSocial::new(&["a", "b", "c"])
        .with_posts("a", vec![post(1, "a", &["https://example.com/hot"])])
        .with_posts(
            "b",
            vec![post(2, "b", &["https://example.com/hot", "https://example.com/cold"])],
        )
        .with_posts("c", vec![post(3, "c", &["https://example.com/hot"])]);
    let h = harness(social, vec![]).await;
    let resolver = StaticResolver::default();
    let mut cache = MetadataCache::new();
    h.engine.run_cycle(&resolver, &mut cache).await.unwrap();

    let selected = select_for_publication(&h.aggregates, &h.feed_log, 3, 20)
        .await
        .unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].url, "https://example.com/hot");
    assert_eq!(selected[0].sharers, vec!["a", "b", "c"]);
}

#[tokio::test]
async fn published_links_are_never_reoffered() {
    let social = MockSocial::new(&["a", "b"])
        .with_posts("a", vec![post(1, "a", &["https://example.com/once"])])
        .with_posts("b", vec![post(2, "b", &["https://example.com/once"])]);
    let h = harness(social, vec![]).await;
    let resolver = StaticResolver::default();
    let mut cache = MetadataCache::new();
    h.engine.run_cycle(&resolver, &mut cache).await.unwrap();

    let selected = select_for_publication(&h.aggregates, &h.feed_log, 2, 20)
        .await
        .unwrap();
    let appended = publish_selected(&h.feed_log, &resolver, &mut cache, &selected)
        .await
        .unwrap();
    assert_eq!(appended, 1);

    let again = select_for_publication(&h.aggregates, &h.feed_log, 2, 20)
        .await
        .unwrap();
    assert!(again.is_empty());

    let entries = h.feed_log.render(50).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].title, "Title of https://example.com/once");
    assert_eq!(entries[0].description, "[Saved by a, b]\tdesc");
}

#[tokio::test]
async fn rate_limit_aborts_and_next_cycle_starts_with_the_cutoff() {
    let social = MockSocial::new(&["a", "b", "c"]).limit_fetches(2);
    let h = harness(social, vec![]).await;
    let resolver = StaticResolver::default();

    let mut cache = MetadataCache::new();
    let report = h.engine.run_cycle(&resolver, &mut cache).await.unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.not_reached, 1);
    assert_eq!(h.social.fetch_log(), vec!["a", "b"]);

    // "c" has no checkpoint yet, so next cycle polls it first.
    h.social.refill(10);
    let mut cache = MetadataCache::new();
    let report = h.engine.run_cycle(&resolver, &mut cache).await.unwrap();
    assert_eq!(report.processed, 3);
    assert_eq!(h.social.fetch_log()[2], "c");
}

#[tokio::test]
async fn replayed_old_posts_never_rewind_the_checkpoint() {
    let social = MockSocial::new(&["alice"])
        .with_posts(
            "alice",
            vec![
                post(100, "alice", &["https://example.com/a"]),
                post(105, "alice", &["https://example.com/a"]),
            ],
        )
        .replaying();
    let h = harness(social, vec![]).await;
    h.checkpoints
        .advance("alice", Some(200), chrono::Utc::now())
        .await
        .unwrap();

    let resolver = StaticResolver::default();
    let mut cache = MetadataCache::new();
    h.engine.run_cycle(&resolver, &mut cache).await.unwrap();

    let cp = h.checkpoints.get("alice").await.unwrap().unwrap();
    assert_eq!(cp.last_seen_post_id, Some(200));
}

#[tokio::test]
async fn denied_account_is_skipped_not_fatal() {
    let social = MockSocial::new(&["locked", "open"])
        .with_denied("locked")
        .with_posts("open", vec![post(9, "open", &["https://example.com/ok"])]);
    let h = harness(social, vec![]).await;
    let resolver = StaticResolver::default();
    let mut cache = MetadataCache::new();

    let report = h.engine.run_cycle(&resolver, &mut cache).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(report.skipped, 1);
    // Skipped accounts keep no checkpoint for this attempt.
    assert!(h.checkpoints.get("locked").await.unwrap().is_none());
}

#[tokio::test]
async fn platform_self_links_are_never_aggregated() {
    let social = MockSocial::new(&["a"]).with_posts(
        "a",
        vec![post(
            1,
            "a",
            &["https://twitter.com/someone/status/5", "https://example.com/real"],
        )],
    );
    let h = harness(social, vec![]).await;
    let resolver = StaticResolver::default();
    let mut cache = MetadataCache::new();
    h.engine.run_cycle(&resolver, &mut cache).await.unwrap();

    assert_eq!(
        h.aggregates
            .sharer_count("https://twitter.com/someone/status/5")
            .await
            .unwrap(),
        0
    );
    assert_eq!(
        h.aggregates.sharer_count("https://example.com/real").await.unwrap(),
        1
    );
}

#[tokio::test]
async fn shortener_wrappers_collapse_into_the_landing_url() {
    let social = MockSocial::new(&["a", "b"])
        .with_posts("a", vec![post(1, "a", &["https://sho.rt/abc"])])
        .with_posts("b", vec![post(2, "b", &["https://example.com/story"])]);
    let h = harness(social, vec![]).await;
    let resolver = StaticResolver::default().redirect("https://sho.rt/abc", "https://example.com/story");
    let mut cache = MetadataCache::new();
    h.engine.run_cycle(&resolver, &mut cache).await.unwrap();

    assert_eq!(
        h.aggregates
            .sharer_count("https://example.com/story")
            .await
            .unwrap(),
        2
    );
}

#[tokio::test]
async fn unreachable_page_degrades_to_the_normalized_url() {
    let social = MockSocial::new(&["a"])
        .with_posts("a", vec![post(1, "a", &["https://example.com/flaky#frag"])]);
    let h = harness(social, vec![]).await;
    let resolver = StaticResolver::default().failing("https://example.com/flaky");
    let mut cache = MetadataCache::new();
    h.engine.run_cycle(&resolver, &mut cache).await.unwrap();

    // Fragment stripped by normalization, mention kept despite the fetch
    // failure.
    assert_eq!(
        h.aggregates
            .sharer_count("https://example.com/flaky")
            .await
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn redirect_back_onto_the_platform_is_dropped() {
    let social = MockSocial::new(&["a"]).with_posts("a", vec![post(1, "a", &["https://t.co/xyz"])]);
    let h = harness(social, vec![]).await;
    // t.co is a platform host itself, filtered before resolution.
    let resolver = StaticResolver::default();
    let mut cache = MetadataCache::new();
    h.engine.run_cycle(&resolver, &mut cache).await.unwrap();
    assert_eq!(h.aggregates.sharer_count("https://t.co/xyz").await.unwrap(), 0);

    // A non-platform wrapper that lands on the platform is dropped too.
    let social = MockSocial::new(&["a"])
        .with_posts("a", vec![post(1, "a", &["https://sho.rt/loop"])]);
    let h = harness(social, vec![]).await;
    let resolver =
        StaticResolver::default().redirect("https://sho.rt/loop", "https://x.com/u/status/1");
    let mut cache = MetadataCache::new();
    h.engine.run_cycle(&resolver, &mut cache).await.unwrap();
    assert_eq!(h.aggregates.sharer_count("https://sho.rt/loop").await.unwrap(), 0);
}

#[tokio::test]
async fn list_members_join_the_roster() {
    let social = MockSocial::new(&["a"])
        .with_list("42", &["b"])
        .with_posts("a", vec![post(1, "a", &["https://example.com/a"])])
        .with_posts("b", vec![post(2, "b", &["https://example.com/b"])]);
    let h = harness(social, vec!["42".to_string()]).await;
    let resolver = StaticResolver::default();
    let mut cache = MetadataCache::new();

    let report = h.engine.run_cycle(&resolver, &mut cache).await.unwrap();
    assert_eq!(report.processed, 2);
    assert!(h.checkpoints.get("b").await.unwrap().is_some());
}

#[tokio::test]
async fn sub_post_urls_count_for_the_resharing_account() {
    let mut p = post(50, "curator", &[]);
    p.sub_posts = vec![SubPost {
        id: 49,
        author: "origin".to_string(),
        text: "the original".to_string(),
        urls: vec!["https://example.com/deep".to_string()],
    }];
    let social = MockSocial::new(&["curator"]).with_posts("curator", vec![p]);
    let h = harness(social, vec![]).await;
    let resolver = StaticResolver::default();
    let mut cache = MetadataCache::new();
    h.engine.run_cycle(&resolver, &mut cache).await.unwrap();

    let eligible = h.aggregates.eligible(1).await.unwrap();
    assert_eq!(eligible.len(), 1);
    assert_eq!(eligible[0].sharers, vec!["curator"]);
}

#[tokio::test]
async fn publish_skips_unresolvable_candidates() {
    let social = MockSocial::new(&["a", "b"])
        .with_posts("a", vec![post(1, "a", &["https://example.com/gone"])])
        .with_posts("b", vec![post(2, "b", &["https://example.com/gone"])]);
    let h = harness(social, vec![]).await;
    let ingest_resolver = StaticResolver::default();
    let mut cache = MetadataCache::new();
    h.engine.run_cycle(&ingest_resolver, &mut cache).await.unwrap();

    let selected = select_for_publication(&h.aggregates, &h.feed_log, 2, 20)
        .await
        .unwrap();
    assert_eq!(selected.len(), 1);

    // Fresh cache so the publish-time resolution actually runs and fails.
    let publish_resolver = StaticResolver::default().failing("https://example.com/gone");
    let mut cache = MetadataCache::new();
    let appended = publish_selected(&h.feed_log, &publish_resolver, &mut cache, &selected)
        .await
        .unwrap();
    assert_eq!(appended, 0);

    // Still eligible next cycle.
    let again = select_for_publication(&h.aggregates, &h.feed_log, 2, 20)
        .await
        .unwrap();
    assert_eq!(again.len(), 1);
}

#[tokio::test]
async fn max_batch_truncates_oldest_first() {
    let social = MockSocial::new(&["a", "b"])
        .with_posts(
            "a",
            vec![
                post(1, "a", &["https://example.com/first"]),
                post(2, "a", &["https://example.com/second"]),
            ],
        )
        .with_posts(
            "b",
            vec![
                post(3, "b", &["https://example.com/first"]),
                post(4, "b", &["https://example.com/second"]),
            ],
        );
    let h = harness(social, vec![]).await;
    let resolver = StaticResolver::default();
    let mut cache = MetadataCache::new();
    h.engine.run_cycle(&resolver, &mut cache).await.unwrap();

    let selected = select_for_publication(&h.aggregates, &h.feed_log, 2, 1)
        .await
        .unwrap();
    assert_eq!(selected.len(), 1);
    assert_eq!(selected[0].url, "https://example.com/first");
}
