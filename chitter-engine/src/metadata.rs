//! Metadata resolution for shared URLs.
//!
//! The HTTP resolver follows redirects (this is where "flattening" a
//! shortened link happens), fetches a capped slice of the page, and
//! pulls `og:title`/`og:description` with a `<title>` fallback. Results
//! are memoized in a [`MetadataCache`] that lives for exactly one cycle;
//! failures are not cached so a flaky page gets another chance at
//! publication time.

use std::collections::HashMap;
use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use chitter_http::{HttpClient, HttpError, RequestOpts};

/// Page bytes fetched at most; metadata lives in the head anyway.
const MAX_BODY_BYTES: usize = 100_000;
/// Only this prefix of the body is scanned for tags.
const HEAD_LIMIT: usize = 50_000;

#[derive(Debug, Clone)]
pub struct PageMetadata {
    /// URL the request finally landed on, after redirects.
    pub url: String,
    pub title: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Error)]
#[error("metadata resolution failed for {url}: {reason}")]
pub struct MetadataError {
    pub url: String,
    pub reason: String,
}

#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, url: &str) -> Result<PageMetadata, MetadataError>;
}

/// Cycle-scoped memoization of successful resolutions, keyed by the URL
/// as requested. Constructed per cycle and dropped with it; never a
/// process-wide singleton.
#[derive(Default)]
pub struct MetadataCache {
    entries: HashMap<String, PageMetadata>,
}

impl MetadataCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub async fn resolve_with(
        &mut self,
        resolver: &dyn MetadataResolver,
        url: &str,
    ) -> Result<PageMetadata, MetadataError> {
        if let Some(hit) = self.entries.get(url) {
            return Ok(hit.clone());
        }
        let meta = resolver.resolve(url).await?;
        self.entries.insert(url.to_string(), meta.clone());
        Ok(meta)
    }
}

pub struct HttpMetadataResolver {
    http: HttpClient,
}

impl HttpMetadataResolver {
    pub fn new() -> Result<Self, HttpError> {
        let http = HttpClient::unanchored()?
            .with_timeout(Duration::from_secs(10))
            .with_retries(0);
        Ok(Self { http })
    }
}

#[async_trait]
impl MetadataResolver for HttpMetadataResolver {
    async fn resolve(&self, url: &str) -> Result<PageMetadata, MetadataError> {
        let resp = self
            .http
            .get_text(
                url,
                RequestOpts {
                    allow_absolute: true,
                    ..Default::default()
                },
                MAX_BODY_BYTES,
            )
            .await
            .map_err(|e| MetadataError {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        let (title, description) = extract_page_metadata(&resp.body);
        tracing::debug!(
            url = %url,
            final_url = %resp.final_url,
            has_title = title.is_some(),
            truncated = resp.truncated,
            "metadata.resolved"
        );
        Ok(PageMetadata {
            url: resp.final_url.to_string(),
            title,
            description,
        })
    }
}

fn og_forward_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)<meta\s+(?:[^>]*?\s)?(?:property|name)\s*=\s*["']og:(\w+)["'][^>]*?\scontent\s*=\s*["']([^"']*)["']"#,
        )
        .expect("static regex")
    })
}

fn og_reversed_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"(?i)<meta\s+(?:[^>]*?\s)?content\s*=\s*["']([^"']*)["'][^>]*?\s(?:property|name)\s*=\s*["']og:(\w+)["']"#,
        )
        .expect("static regex")
    })
}

fn title_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("static regex"))
}

/// OpenGraph title/description with `<title>` fallback, scanning only
/// the head of the document.
pub(crate) fn extract_page_metadata(html: &str) -> (Option<String>, Option<String>) {
    let head = match html[..html.len().min(HEAD_LIMIT)].find("</head>") {
        Some(end) => &html[..end],
        None => &html[..html.len().min(HEAD_LIMIT)],
    };

    let mut title = None;
    let mut description = None;

    for caps in og_forward_re().captures_iter(head) {
        assign_og(&caps[1], &caps[2], &mut title, &mut description);
    }
    for caps in og_reversed_re().captures_iter(head) {
        assign_og(&caps[2], &caps[1], &mut title, &mut description);
    }
    if title.is_none() {
        title = title_re()
            .captures(head)
            .map(|c| clean_text(&c[1]))
            .filter(|t| !t.is_empty());
    }
    (title, description)
}

fn assign_og(key: &str, value: &str, title: &mut Option<String>, description: &mut Option<String>) {
    let value = clean_text(value);
    if value.is_empty() {
        return;
    }
    match key.to_ascii_lowercase().as_str() {
        "title" if title.is_none() => *title = Some(value),
        "description" if description.is_none() => *description = Some(value),
        _ => {}
    }
}

fn clean_text(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed
        .replace("&amp;", "&")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
}
