use chitter_http::{HttpError, HttpStatus};
use thiserror::Error;

/// Failure modes of the social client, split the way the ingestion cycle
/// needs to react to them.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Global signal: stop fetching for this cycle, keep partial progress.
    #[error("rate limited by the platform")]
    RateLimited,
    /// One account is unreadable (protected/suspended); skip it this cycle.
    #[error("access denied: {0}")]
    AccessDenied(String),
    /// Anything else that should be retried next cycle.
    #[error("transient fetch failure: {0}")]
    Transient(String),
}

impl From<HttpError> for FetchError {
    fn from(err: HttpError) -> Self {
        match err.status() {
            Some(HttpStatus::TOO_MANY_REQUESTS) => FetchError::RateLimited,
            Some(HttpStatus::UNAUTHORIZED) | Some(HttpStatus::FORBIDDEN) => {
                FetchError::AccessDenied(err.to_string())
            }
            _ => FetchError::Transient(err.to_string()),
        }
    }
}
