//! Picks which eligible aggregates actually go out this cycle.

use chitter_store::{AggregateStore, EligibleUrl, FeedLog, StoreError};

/// Eligible URLs not yet in the feed log, oldest `first_seen` first,
/// truncated to `max_batch`. Never re-offers a published link even if
/// its sharer count keeps growing.
pub async fn select_for_publication(
    aggregates: &AggregateStore,
    feed_log: &FeedLog,
    min_sharer_count: u32,
    max_batch: usize,
) -> Result<Vec<EligibleUrl>, StoreError> {
    let mut selected = Vec::new();
    for candidate in aggregates.eligible(min_sharer_count).await? {
        if feed_log.contains(&candidate.url).await? {
            continue;
        }
        selected.push(candidate);
        if selected.len() == max_batch {
            break;
        }
    }
    tracing::debug!(count = selected.len(), "engine.select.done");
    Ok(selected)
}
