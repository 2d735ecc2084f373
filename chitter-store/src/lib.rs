//! SQLite-backed durable state for the poller.
//!
//! Three independent stores over one pool: per-account fetch checkpoints,
//! the URL aggregates (distinct sharers + append-only mention contexts),
//! and the append-only, deduplicated feed log of everything ever
//! published. Each write commits before the call returns, so a crash
//! right after a successful call never loses it.

pub mod aggregates;
pub mod checkpoints;
pub mod error;
pub mod feed_log;
pub mod schema;

pub use aggregates::{AggregateStore, EligibleUrl, MentionContext, SubPostSummary};
pub use checkpoints::{Checkpoint, CheckpointStore};
pub use error::StoreError;
pub use feed_log::{FeedEntry, FeedLog};
