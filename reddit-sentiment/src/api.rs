use crate::rate_limiter::{RateLimitConfig, RateLimiter};
use biggygains_core::{CoreError, FeedComment, RedditApiError, RedditConfig};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

const REDDIT_API_BASE: &str = "https://oauth.reddit.com";
const REDDIT_TOKEN_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// A token is renewed this long before Reddit says it expires.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListing<T> {
    pub kind: String,
    pub data: RedditListingData<T>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingData<T> {
    pub children: Vec<RedditListingChild<T>>,
    pub after: Option<String>,
    pub before: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditListingChild<T> {
    pub kind: String,
    pub data: T,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditPostData {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub selftext: String,
    pub subreddit: String,
    pub created_utc: f64,
    #[serde(default)]
    pub num_comments: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedditCommentData {
    pub id: String,
    #[serde(default)]
    pub body: String,
    pub created_utc: f64,
    /// Either an empty string or a nested listing.
    #[serde(default)]
    pub replies: serde_json::Value,
}

impl From<&RedditCommentData> for FeedComment {
    fn from(data: &RedditCommentData) -> Self {
        Self {
            id: data.id.clone(),
            body: data.body.clone(),
            created_utc: data.created_utc as i64,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self) -> bool {
        Instant::now() + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

/// Application-only Reddit client. Every request waits on a shared rate
/// limiter and carries a bearer token that is renewed before it lapses.
#[derive(Debug)]
pub struct RedditApiClient {
    http_client: Client,
    rate_limiter: Arc<RateLimiter>,
    client_id: String,
    client_secret: String,
    token: RwLock<Option<AccessToken>>,
}

impl RedditApiClient {
    pub fn new(config: &RedditConfig) -> Result<Self, CoreError> {
        let (client_id, client_secret) = config.credentials()?;

        let http_client = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http_client,
            rate_limiter: Arc::new(RateLimiter::new(RateLimitConfig::reddit_oauth())),
            client_id,
            client_secret,
            token: RwLock::new(None),
        })
    }

    /// Runs the client-credentials grant and caches the token.
    pub async fn authenticate(&self) -> Result<(), CoreError> {
        let _permit = self.rate_limiter.acquire().await?;
        info!("Requesting Reddit application token");

        let response = self
            .http_client
            .post(REDDIT_TOKEN_URL)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await
            .map_err(network_error)?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(RedditApiError::AuthenticationFailed {
                reason: format!("token endpoint answered {}", status),
            }
            .into());
        }
        if let Some(e) = status_error(status, None, "/api/v1/access_token") {
            return Err(e.into());
        }

        let body: TokenResponse = response.json().await.map_err(|e| {
            error!("Failed to parse token response: {}", e);
            RedditApiError::AuthenticationFailed {
                reason: "malformed token response".to_string(),
            }
        })?;

        debug!("Reddit token valid for {}s", body.expires_in);
        *self.token.write().await = Some(AccessToken {
            value: body.access_token,
            expires_at: Instant::now() + Duration::from_secs(body.expires_in),
        });
        Ok(())
    }

    async fn access_token(&self) -> Result<String, CoreError> {
        if let Some(token) = self.token.read().await.as_ref().filter(|t| t.is_fresh()) {
            return Ok(token.value.clone());
        }

        self.authenticate().await?;
        self.token
            .read()
            .await
            .as_ref()
            .map(|t| t.value.clone())
            .ok_or_else(|| RedditApiError::InvalidToken.into())
    }

    pub async fn make_request(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<Response, CoreError> {
        let mut url = Url::parse(REDDIT_API_BASE)
            .and_then(|base| base.join(endpoint))
            .map_err(|e| CoreError::InvalidInput {
                message: format!("bad endpoint {}: {}", endpoint, e),
            })?;
        url.query_pairs_mut()
            .append_pair("raw_json", "1")
            .extend_pairs(query.iter().map(|(k, v)| (*k, v.as_str())));

        let token = self.access_token().await?;
        let permit = self.rate_limiter.acquire().await?;
        debug!("GET {} (waited {:?} for rate limit)", endpoint, permit.waited);

        let response = self
            .http_client
            .get(url)
            .bearer_auth(token)
            .send()
            .await
            .map_err(network_error)?;
        drop(permit);

        let status = response.status();
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());

        match status_error(status, retry_after, endpoint) {
            None => Ok(response),
            Some(e) => {
                warn!("Reddit answered {} for {}", status, endpoint);
                match &e {
                    RedditApiError::RateLimitExceeded { retry_after } => {
                        self.rate_limiter
                            .back_off(Duration::from_secs(*retry_after))
                            .await;
                    }
                    RedditApiError::InvalidToken => {
                        *self.token.write().await = None;
                    }
                    _ => {}
                }
                Err(e.into())
            }
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        endpoint: &str,
        query: &[(&str, String)],
    ) -> Result<T, CoreError> {
        let response = self.make_request(endpoint, query).await?;
        response.json().await.map_err(|e| {
            error!("Failed to parse response from {}: {}", endpoint, e);
            RedditApiError::InvalidResponse {
                details: format!("unexpected body from {}", endpoint),
            }
            .into()
        })
    }

    /// Newest posts of `subreddits` (a `sub1+sub2` path).
    pub async fn get_new_posts(
        &self,
        subreddits: &str,
        limit: u32,
    ) -> Result<Vec<RedditPostData>, CoreError> {
        let listing: RedditListing<RedditPostData> = self
            .get_json(
                &format!("/r/{}/new", subreddits),
                &[("limit", limit.to_string())],
            )
            .await?;

        let posts: Vec<RedditPostData> = listing.data.children.into_iter().map(|c| c.data).collect();
        info!("Retrieved {} posts from r/{}", posts.len(), subreddits);
        Ok(posts)
    }

    /// Every comment loaded for a post, replies included. Collapsed
    /// "more comments" stubs are not expanded.
    pub async fn get_post_comments(&self, post_id: &str) -> Result<Vec<FeedComment>, CoreError> {
        // the endpoint answers [post listing, comment listing]
        let listings: Vec<RedditListing<serde_json::Value>> = self
            .get_json(
                &format!("/comments/{}", post_id),
                &[("limit", "500".to_string()), ("sort", "new".to_string())],
            )
            .await?;

        let mut comments = Vec::new();
        if let Some(tree) = listings.get(1) {
            flatten_comment_tree(&tree.data.children, &mut comments);
        }
        debug!("Post {} has {} loaded comments", post_id, comments.len());
        Ok(comments)
    }

    /// Newest comments across `subreddits`, newest first as Reddit sends them.
    pub async fn get_new_comments(
        &self,
        subreddits: &str,
        limit: u32,
    ) -> Result<Vec<FeedComment>, CoreError> {
        let listing: RedditListing<RedditCommentData> = self
            .get_json(
                &format!("/r/{}/comments", subreddits),
                &[("limit", limit.to_string())],
            )
            .await?;

        Ok(listing
            .data
            .children
            .iter()
            .map(|c| FeedComment::from(&c.data))
            .collect())
    }
}

fn network_error(e: reqwest::Error) -> CoreError {
    if e.is_timeout() {
        RedditApiError::RequestTimeout.into()
    } else {
        CoreError::Network(e)
    }
}

/// Maps a non-success status to the matching error; `None` for success.
pub fn status_error(
    status: StatusCode,
    retry_after: Option<u64>,
    endpoint: &str,
) -> Option<RedditApiError> {
    if status.is_success() {
        return None;
    }
    Some(match status.as_u16() {
        401 => RedditApiError::InvalidToken,
        403 => RedditApiError::Forbidden {
            resource: endpoint.to_string(),
        },
        404 => RedditApiError::SubredditNotFound {
            subreddit: endpoint.to_string(),
        },
        429 => RedditApiError::RateLimitExceeded {
            retry_after: retry_after.unwrap_or(60),
        },
        code if status.is_server_error() => RedditApiError::ServerError { status_code: code },
        code => RedditApiError::InvalidResponse {
            details: format!("status {} from {}", code, endpoint),
        },
    })
}

/// Depth-first walk over `t1` children and their `replies` listings.
pub fn flatten_comment_tree(
    children: &[RedditListingChild<serde_json::Value>],
    out: &mut Vec<FeedComment>,
) {
    for child in children {
        if child.kind != "t1" {
            continue;
        }
        let data: RedditCommentData = match serde_json::from_value(child.data.clone()) {
            Ok(data) => data,
            Err(e) => {
                debug!("Skipping unreadable comment: {}", e);
                continue;
            }
        };
        out.push(FeedComment::from(&data));

        if let Ok(replies) =
            serde_json::from_value::<RedditListing<serde_json::Value>>(data.replies)
        {
            flatten_comment_tree(&replies.data.children, out);
        }
    }
}
