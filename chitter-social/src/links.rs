//! Syntactic URL normalization and the platform-self-link filter.
//!
//! Redirect flattening is deliberately not done here; that belongs to the
//! metadata-resolution stage, which sees the page the URL finally lands
//! on. This module is pure and deterministic.

use thiserror::Error;
use url::Url;

/// Hosts that belong to the polled platform. Links into these must never
/// reach the aggregation store or the published feed, otherwise the feed
/// would just point back at the platform's own post pages.
const PLATFORM_HOSTS: &[&str] = &["twitter.com", "x.com", "t.co"];

#[derive(Debug, Error)]
pub enum LinkError {
    #[error("invalid url {raw:?}: {reason}")]
    Invalid { raw: String, reason: String },
    #[error("unsupported scheme {scheme:?} in {raw:?}")]
    UnsupportedScheme { raw: String, scheme: String },
}

/// Normalize a raw extracted URL into its canonical, deduplication-ready
/// form: parse (which lowercases scheme and host and resolves default
/// ports) and drop the fragment. Malformed input is an error, never
/// silently passed through.
///
/// ```
/// use chitter_social::links::normalize;
///
/// let url = normalize("HTTPS://Example.COM:443/a#section").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/a");
/// assert!(normalize("not a url").is_err());
/// ```
pub fn normalize(raw: &str) -> Result<Url, LinkError> {
    let mut url = Url::parse(raw.trim()).map_err(|e| LinkError::Invalid {
        raw: raw.to_string(),
        reason: e.to_string(),
    })?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(LinkError::UnsupportedScheme {
                raw: raw.to_string(),
                scheme: other.to_string(),
            })
        }
    }
    url.set_fragment(None);
    Ok(url)
}

/// True when the URL points back into the polled platform itself,
/// including subdomains (`mobile.twitter.com`, `www.x.com`, ...).
pub fn is_self_referential(url: &Url) -> bool {
    let Some(host) = url.host_str() else {
        return false;
    };
    let host = host.to_ascii_lowercase();
    PLATFORM_HOSTS
        .iter()
        .any(|p| host == *p || host.ends_with(&format!(".{p}")))
}
