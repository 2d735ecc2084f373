//! Typed wire models for the platform's v2-style REST API.
//!
//! Only the fields the extraction step consumes are modeled; everything
//! else in the payload is ignored by serde.

use serde::{Deserialize, Serialize};

/// Response of the per-account timeline endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TimelineResponse {
    pub data: Option<Vec<WirePost>>,
    #[serde(default)]
    pub includes: Option<Includes>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

/// Response of the following / list-members endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct MembersResponse {
    pub data: Option<Vec<User>>,
    #[serde(default)]
    pub meta: Option<Meta>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Meta {
    #[serde(default)]
    pub next_token: Option<String>,
    #[serde(default)]
    pub result_count: Option<u32>,
}

/// Expansion payload: hydrated referenced posts and their authors.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Includes {
    #[serde(default)]
    pub users: Option<Vec<User>>,
    #[serde(default, rename = "tweets")]
    pub posts: Option<Vec<WirePost>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WirePost {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub author_id: Option<String>,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub entities: Option<Entities>,
    /// Reshares ("retweeted") and quotes ("quoted") reference the wrapped
    /// post by id; the hydrated body arrives in [`Includes::posts`].
    #[serde(default, rename = "referenced_tweets")]
    pub referenced_posts: Option<Vec<ReferencedPost>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencedPost {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Entities {
    #[serde(default)]
    pub urls: Option<Vec<UrlEntity>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UrlEntity {
    /// The un-shortened target; preferred over the wrapper link.
    #[serde(default)]
    pub expanded_url: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}
