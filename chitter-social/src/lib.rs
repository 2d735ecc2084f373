//! Client for the polled social platform.
//!
//! Submodules provide the typed wire models, the extraction step that
//! turns timeline JSON into [`post::Post`]s (including reshared/quoted
//! sub-posts), the URL normalizer with its platform-self-link filter, and
//! the [`client::SocialClient`] trait plus its HTTP implementation.

pub mod client;
pub mod error;
pub mod extract;
pub mod links;
pub mod post;
pub mod types;

pub use client::{PlatformApi, SocialClient, DEFAULT_PAGE_SIZE};
pub use error::FetchError;
pub use links::{is_self_referential, normalize, LinkError};
pub use post::{AccountId, Post, SubPost};
