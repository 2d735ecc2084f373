use serde::{Deserialize, Serialize};

/// Opaque, stable identifier of a tracked account.
pub type AccountId = String;

/// One published item from an account, after extraction from the wire
/// format. Post ids are numeric and monotonically increasing within an
/// account's history, which is what makes checkpointing by id sound.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    /// Handle of the posting account (falls back to the raw author id
    /// when the expansion payload is missing).
    pub author: AccountId,
    pub text: String,
    /// Expanded URLs referenced directly by this post.
    pub urls: Vec<String>,
    /// Reshared or quoted posts carried inside this one, each with its
    /// own referenced URLs.
    pub sub_posts: Vec<SubPost>,
}

/// A reshared/quoted post nested inside a top-level [`Post`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubPost {
    pub id: i64,
    pub author: AccountId,
    pub text: String,
    pub urls: Vec<String>,
}

impl Post {
    /// URLs referenced by the post or any of its sub-posts, deduplicated,
    /// preserving first-appearance order.
    pub fn all_urls(&self) -> Vec<String> {
        let mut seen = std::collections::BTreeSet::new();
        let mut out = Vec::new();
        for u in self
            .urls
            .iter()
            .chain(self.sub_posts.iter().flat_map(|s| s.urls.iter()))
        {
            if seen.insert(u.as_str()) {
                out.push(u.clone());
            }
        }
        out
    }
}
