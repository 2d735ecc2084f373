//! Wires config into the engine and drives the poll schedule.
//!
//! One pass is cycle, selection, publication, feed render, in that
//! order. The first pass runs immediately on startup; afterwards passes
//! run on a fixed interval and never overlap, because the loop awaits
//! each pass before sleeping again.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use chitter_config::ChitterConfig;
use chitter_engine::{
    publish_selected, select_for_publication, HttpMetadataResolver, IngestionEngine, MetadataCache,
};
use chitter_feed::write_feed;
use chitter_social::PlatformApi;
use chitter_store::schema::{connect, ensure_schema};
use chitter_store::{AggregateStore, CheckpointStore, FeedLog};

pub struct Runner {
    cfg: ChitterConfig,
    engine: IngestionEngine,
    aggregates: AggregateStore,
    feed_log: FeedLog,
    resolver: HttpMetadataResolver,
}

impl Runner {
    pub async fn from_config(cfg: ChitterConfig) -> Result<Self> {
        let pool = connect(&cfg.database_url)
            .await
            .with_context(|| format!("opening database {}", cfg.database_url))?;
        ensure_schema(&pool).await?;

        let api = PlatformApi::new(
            &cfg.platform.api_base,
            cfg.platform.bearer_token.clone(),
            cfg.platform.self_account_id.clone(),
        )?;

        let checkpoints = CheckpointStore::new(pool.clone());
        let aggregates = AggregateStore::new(pool.clone());
        let feed_log = FeedLog::new(pool);
        let engine = IngestionEngine::new(
            Arc::new(api),
            checkpoints,
            aggregates.clone(),
            cfg.lists.clone(),
        );
        let resolver = HttpMetadataResolver::new()?;

        Ok(Self {
            cfg,
            engine,
            aggregates,
            feed_log,
            resolver,
        })
    }

    /// One full pass. The feed file is rewritten even when nothing new
    /// was published, so a fresh deployment gets a file on the first run.
    pub async fn run_once(&self) -> Result<()> {
        let mut cache = MetadataCache::new();

        let report = self.engine.run_cycle(&self.resolver, &mut cache).await?;

        let selected = select_for_publication(
            &self.aggregates,
            &self.feed_log,
            self.cfg.ingest.min_sharer_count,
            self.cfg.ingest.max_batch,
        )
        .await?;
        let appended =
            publish_selected(&self.feed_log, &self.resolver, &mut cache, &selected).await?;

        let entries = self.feed_log.render(self.cfg.feed.max_items).await?;
        write_feed(&self.cfg.feed, &entries)?;

        tracing::info!(
            processed = report.processed,
            skipped = report.skipped,
            not_reached = report.not_reached,
            published = appended,
            "chitter.pass.done"
        );
        Ok(())
    }

    pub async fn run_scheduled(&self) -> Result<()> {
        let period = Duration::from_secs(self.cfg.ingest.poll_interval_minutes * 60);
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(err) = self.run_once().await {
                        tracing::error!(error = %err, "chitter.pass.failed");
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("chitter.shutdown");
                    return Ok(());
                }
            }
        }
    }
}
