use thiserror::Error;

/// Store failures are fatal to the running cycle: a checkpoint or feed
/// write that silently failed would either re-process posts or appear to
/// have advanced when it has not.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("durable write failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error("failed to encode mention context: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("feed entry already published: {0}")]
    DuplicateEntry(String),
}
