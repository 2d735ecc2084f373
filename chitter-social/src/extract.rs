//! Conversion from timeline wire JSON into domain [`Post`]s.
//!
//! Referenced posts of kind `retweeted` or `quoted` are resolved against
//! the expansion payload and become [`SubPost`]s carrying their own URLs,
//! so a reshare of a link counts for the resharing account too.

use std::collections::HashMap;

use crate::post::{Post, SubPost};
use crate::types::{TimelineResponse, User, WirePost};

const SUB_POST_KINDS: &[&str] = &["retweeted", "quoted"];

/// Flatten a timeline response into posts, newest-first as the API
/// returns them. Posts whose id is not numeric are dropped with a warning
/// since they cannot participate in checkpointing.
pub fn posts_from_timeline(resp: &TimelineResponse, fallback_author: &str) -> Vec<Post> {
    let users: HashMap<&str, &User> = resp
        .includes
        .as_ref()
        .and_then(|inc| inc.users.as_ref())
        .map(|us| us.iter().map(|u| (u.id.as_str(), u)).collect())
        .unwrap_or_default();
    let included: HashMap<&str, &WirePost> = resp
        .includes
        .as_ref()
        .and_then(|inc| inc.posts.as_ref())
        .map(|ps| ps.iter().map(|p| (p.id.as_str(), p)).collect())
        .unwrap_or_default();

    let mut posts = Vec::new();
    for wire in resp.data.as_deref().unwrap_or_default() {
        let Some(id) = parse_post_id(&wire.id) else {
            tracing::warn!(post_id = %wire.id, "extract.post.non_numeric_id");
            continue;
        };

        let mut sub_posts = Vec::new();
        for r in wire.referenced_posts.as_deref().unwrap_or_default() {
            if !SUB_POST_KINDS.contains(&r.kind.as_str()) {
                continue;
            }
            let Some(sub) = included.get(r.id.as_str()) else {
                tracing::debug!(sub_id = %r.id, "extract.sub_post.not_hydrated");
                continue;
            };
            let Some(sub_id) = parse_post_id(&sub.id) else {
                continue;
            };
            sub_posts.push(SubPost {
                id: sub_id,
                author: author_of(sub, &users, fallback_author),
                text: sub.text.clone(),
                urls: urls_of(sub),
            });
        }

        posts.push(Post {
            id,
            author: author_of(wire, &users, fallback_author),
            text: wire.text.clone(),
            urls: urls_of(wire),
            sub_posts,
        });
    }
    posts
}

fn parse_post_id(raw: &str) -> Option<i64> {
    raw.parse::<i64>().ok()
}

fn author_of(post: &WirePost, users: &HashMap<&str, &User>, fallback: &str) -> String {
    match post.author_id.as_deref() {
        Some(aid) => users
            .get(aid)
            .map(|u| u.username.clone())
            .unwrap_or_else(|| aid.to_string()),
        None => fallback.to_string(),
    }
}

fn urls_of(post: &WirePost) -> Vec<String> {
    post.entities
        .as_ref()
        .and_then(|e| e.urls.as_ref())
        .map(|list| {
            list.iter()
                .filter_map(|u| u.expanded_url.as_ref().or(u.url.as_ref()))
                .cloned()
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn extracts_posts_with_reshared_sub_post() {
        let v = json!({
            "data": [{
                "id": "105",
                "text": "RT worth reading",
                "author_id": "42",
                "entities": { "urls": [{"expanded_url": "https://example.com/a"}] },
                "referenced_tweets": [{"type": "retweeted", "id": "90"}]
            }],
            "includes": {
                "users": [
                    { "id": "42", "username": "alice" },
                    { "id": "7", "username": "bob" }
                ],
                "tweets": [{
                    "id": "90",
                    "text": "the original",
                    "author_id": "7",
                    "entities": { "urls": [{"expanded_url": "https://example.com/b"}] }
                }]
            }
        });
        let resp: TimelineResponse = serde_json::from_value(v).unwrap();
        let posts = posts_from_timeline(&resp, "42");

        assert_eq!(posts.len(), 1);
        let post = &posts[0];
        assert_eq!(post.id, 105);
        assert_eq!(post.author, "alice");
        assert_eq!(post.urls, vec!["https://example.com/a"]);
        assert_eq!(post.sub_posts.len(), 1);
        assert_eq!(post.sub_posts[0].author, "bob");
        assert_eq!(post.sub_posts[0].urls, vec!["https://example.com/b"]);
        assert_eq!(
            post.all_urls(),
            vec!["https://example.com/a", "https://example.com/b"]
        );
    }

    #[test]
    fn replies_are_not_treated_as_sub_posts() {
        let v = json!({
            "data": [{
                "id": "10",
                "text": "replying",
                "author_id": "42",
                "referenced_tweets": [{"type": "replied_to", "id": "9"}]
            }],
            "includes": {
                "users": [{ "id": "42", "username": "alice" }],
                "tweets": [{ "id": "9", "text": "parent", "author_id": "42" }]
            }
        });
        let resp: TimelineResponse = serde_json::from_value(v).unwrap();
        let posts = posts_from_timeline(&resp, "42");
        assert_eq!(posts.len(), 1);
        assert!(posts[0].sub_posts.is_empty());
    }

    #[test]
    fn non_numeric_ids_are_dropped() {
        let v = json!({ "data": [{ "id": "not-a-number", "text": "x" }] });
        let resp: TimelineResponse = serde_json::from_value(v).unwrap();
        assert!(posts_from_timeline(&resp, "42").is_empty());
    }
}
