//! Renders the feed log into an RSS 2.0 document on disk.
//!
//! The output file is the whole interface to downstream readers, so the
//! write is atomic: the document goes to a sibling temp file first and
//! is renamed over the target. A reader polling the path never sees a
//! half-written feed.

use std::fs;
use std::path::Path;

use anyhow::Context;
use rss::{ChannelBuilder, GuidBuilder, ItemBuilder};

use chitter_config::FeedConfig;
use chitter_store::FeedEntry;

/// Build the RSS document for `entries` (already newest-first from the
/// feed log) and write it to `config.output_path`.
pub fn write_feed(config: &FeedConfig, entries: &[FeedEntry]) -> anyhow::Result<()> {
    let xml = render_channel(config, entries);
    write_atomic(&config.output_path, xml.as_bytes())
        .with_context(|| format!("writing feed to {}", config.output_path.display()))?;
    tracing::info!(
        path = %config.output_path.display(),
        items = entries.len(),
        "feed.written"
    );
    Ok(())
}

fn render_channel(config: &FeedConfig, entries: &[FeedEntry]) -> String {
    let items: Vec<rss::Item> = entries
        .iter()
        .map(|e| {
            ItemBuilder::default()
                .title(Some(e.title.clone()))
                .link(Some(e.link.clone()))
                .description(Some(e.description.clone()))
                .guid(Some(
                    GuidBuilder::default()
                        .value(e.link.clone())
                        .permalink(true)
                        .build(),
                ))
                .pub_date(Some(e.published_at.to_rfc2822()))
                .build()
        })
        .collect();

    let channel = ChannelBuilder::default()
        .title(config.title.clone())
        .link(config.site_url.clone())
        .description(config.description.clone())
        .items(items)
        .build();
    channel.to_string()
}

fn write_atomic(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
    if let Some(dir) = path.parent() {
        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir)?;
        }
    }
    let tmp = path.with_extension("xml.tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}
