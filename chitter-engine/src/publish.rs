//! Turns selected aggregates into feed log entries.

use chrono::Utc;

use chitter_store::{EligibleUrl, FeedEntry, FeedLog, StoreError};

use crate::metadata::{MetadataCache, MetadataResolver};

/// Append the selected candidates to the feed log. Each entry is titled
/// from page metadata resolved now (the same cycle cache the ingest pass
/// filled, so most lookups are hits). A candidate whose page cannot be
/// resolved is left unpublished; it stays eligible for the next cycle.
/// Returns how many entries were actually appended.
pub async fn publish_selected(
    feed_log: &FeedLog,
    resolver: &dyn MetadataResolver,
    cache: &mut MetadataCache,
    selected: &[EligibleUrl],
) -> Result<usize, StoreError> {
    let mut appended = 0;
    for candidate in selected {
        let meta = match cache.resolve_with(resolver, &candidate.url).await {
            Ok(meta) => meta,
            Err(err) => {
                tracing::warn!(url = %candidate.url, error = %err, "engine.publish.unresolved");
                continue;
            }
        };

        let entry = FeedEntry {
            // The aggregate key is the link; the post-redirect URL already
            // fed into it at ingest time.
            link: candidate.url.clone(),
            title: meta.title.unwrap_or_else(|| candidate.url.clone()),
            description: describe(&candidate.sharers, meta.description.as_deref()),
            published_at: Utc::now(),
        };

        match feed_log.append(&entry).await {
            Ok(()) => {
                tracing::info!(
                    url = %entry.link,
                    sharers = candidate.sharers.len(),
                    "engine.publish.appended"
                );
                appended += 1;
            }
            Err(StoreError::DuplicateEntry(link)) => {
                tracing::warn!(url = %link, "engine.publish.duplicate");
            }
            Err(err) => return Err(err),
        }
    }
    Ok(appended)
}

/// `[Saved by a, b]` followed by the page description, tab separated.
fn describe(sharers: &[String], description: Option<&str>) -> String {
    format!(
        "[Saved by {}]\t{}",
        sharers.join(", "),
        description.unwrap_or("")
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn description_lists_sharers_then_page_text() {
        let s = describe(&["alice".into(), "bob".into()], Some("A fine read"));
        assert_eq!(s, "[Saved by alice, bob]\tA fine read");
    }

    #[test]
    fn missing_page_description_leaves_trailing_tab() {
        let s = describe(&["alice".into()], None);
        assert_eq!(s, "[Saved by alice]\t");
    }
}
