//! The [`SocialClient`] seam and its HTTP implementation.
//!
//! The trait is what the ingestion engine consumes; tests substitute a
//! scripted mock. [`PlatformApi`] speaks the v2-style REST API through
//! `chitter-http` with bearer auth, mapping 429 to the global rate-limit
//! signal and 401/403 to per-account access denial.

use async_trait::async_trait;
use std::borrow::Cow;

use chitter_http::{Auth, HttpClient, HttpError, RequestOpts};

use crate::error::FetchError;
use crate::extract::posts_from_timeline;
use crate::post::{AccountId, Post};
use crate::types::{MembersResponse, TimelineResponse};

/// Page size used when an account has no checkpoint: the first fetch is
/// bounded to one page of recent history, not a full backfill.
pub const DEFAULT_PAGE_SIZE: u32 = 100;

/// Upper bound on pagination when walking follow/member lists.
const MAX_MEMBER_PAGES: usize = 50;

#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Accounts followed by the operator.
    async fn followed_accounts(&self) -> Result<Vec<AccountId>, FetchError>;

    /// Members of a configured account list.
    async fn list_members(&self, list_ref: &str) -> Result<Vec<AccountId>, FetchError>;

    /// Posts of one account with id strictly greater than `since_id`.
    /// `None` fetches the default page of recent posts.
    async fn fetch_posts_since(
        &self,
        account_id: &str,
        since_id: Option<i64>,
    ) -> Result<Vec<Post>, FetchError>;
}

#[derive(Clone)]
pub struct PlatformApi {
    http: HttpClient,
    bearer: String,
    self_account_id: String,
}

impl PlatformApi {
    pub fn new(
        api_base: &str,
        bearer_token: String,
        self_account_id: String,
    ) -> Result<Self, HttpError> {
        Ok(Self {
            http: HttpClient::new(api_base)?,
            bearer: bearer_token,
            self_account_id,
        })
    }

    async fn member_pages(&self, path: &str) -> Result<Vec<AccountId>, FetchError> {
        let mut ids = Vec::new();
        let mut next_token: Option<String> = None;

        for _ in 0..MAX_MEMBER_PAGES {
            let mut params: Vec<(&str, Cow<'_, str>)> = vec![("max_results", "100".into())];
            if let Some(tok) = next_token.as_deref() {
                params.push(("pagination_token", tok.to_string().into()));
            }
            let resp: MembersResponse = self
                .http
                .get_json(
                    path,
                    RequestOpts {
                        auth: Some(Auth::Bearer(&self.bearer)),
                        query: Some(params),
                        ..Default::default()
                    },
                )
                .await?;

            ids.extend(
                resp.data
                    .unwrap_or_default()
                    .into_iter()
                    .map(|u| u.id),
            );
            next_token = resp.meta.and_then(|m| m.next_token);
            if next_token.is_none() {
                break;
            }
        }
        Ok(ids)
    }
}

#[async_trait]
impl SocialClient for PlatformApi {
    async fn followed_accounts(&self) -> Result<Vec<AccountId>, FetchError> {
        let path = format!("2/users/{}/following", self.self_account_id);
        let ids = self.member_pages(&path).await?;
        tracing::debug!(count = ids.len(), "social.followed_accounts");
        Ok(ids)
    }

    async fn list_members(&self, list_ref: &str) -> Result<Vec<AccountId>, FetchError> {
        let path = format!("2/lists/{list_ref}/members");
        let ids = self.member_pages(&path).await?;
        tracing::debug!(list = %list_ref, count = ids.len(), "social.list_members");
        Ok(ids)
    }

    async fn fetch_posts_since(
        &self,
        account_id: &str,
        since_id: Option<i64>,
    ) -> Result<Vec<Post>, FetchError> {
        let path = format!("2/users/{account_id}/tweets");
        let mut params: Vec<(&str, Cow<'_, str>)> = vec![
            ("max_results", DEFAULT_PAGE_SIZE.to_string().into()),
            (
                "tweet.fields",
                "created_at,entities,referenced_tweets,author_id".into(),
            ),
            (
                "expansions",
                "author_id,referenced_tweets.id,referenced_tweets.id.author_id".into(),
            ),
            ("user.fields", "username".into()),
        ];
        if let Some(since) = since_id {
            params.push(("since_id", since.to_string().into()));
        }

        let resp: TimelineResponse = self
            .http
            .get_json(
                &path,
                RequestOpts {
                    auth: Some(Auth::Bearer(&self.bearer)),
                    query: Some(params),
                    ..Default::default()
                },
            )
            .await?;

        let posts = posts_from_timeline(&resp, account_id);
        tracing::debug!(
            account = %account_id,
            since_id = ?since_id,
            posts = posts.len(),
            "social.fetch_posts_since"
        );
        Ok(posts)
    }
}
