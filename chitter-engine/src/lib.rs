//! The incremental-ingestion and aggregation engine.
//!
//! One [`cycle::IngestionEngine::run_cycle`] call polls every tracked
//! account past its checkpoint, updates the URL aggregates, and advances
//! checkpoints with per-account failure isolation. [`select`] computes
//! the newly publication-eligible URLs and [`publish`] turns them into
//! immutable feed-log entries. Metadata lookups go through a
//! cycle-scoped [`metadata::MetadataCache`] that is discarded afterwards.

pub mod cycle;
pub mod metadata;
pub mod publish;
pub mod select;

pub use cycle::{CycleReport, IngestionEngine};
pub use metadata::{HttpMetadataResolver, MetadataCache, MetadataError, MetadataResolver, PageMetadata};
pub use publish::publish_selected;
pub use select::select_for_publication;
