//! HTTP implementation of `ContentSource` against the Reddit OAuth API.

use crate::config::ListenerOptions;
use crate::date::from_epoch_secs;
use crate::item::{Comment, Post, DELETED_AUTHOR};
use crate::query::channel_path;
use crate::source::{ContentSource, Page, Recency};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE, RETRY_AFTER, USER_AGENT};
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::time::sleep;
use tracing::{debug, instrument, warn};

const DEFAULT_INITIAL_BACKOFF: Duration = Duration::from_secs(2);
const DEFAULT_RATE_LIMIT_WAIT: Duration = Duration::from_secs(60);
// Refresh the token this long before the server says it expires.
const TOKEN_EXPIRY_SLACK: Duration = Duration::from_secs(60);

#[derive(Clone)]
struct AccessToken {
    token: String,
    expires_at: Instant,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default = "default_expires_in")]
    expires_in: u64,
}

fn default_expires_in() -> u64 {
    3600
}

#[derive(Deserialize)]
struct Listing<T> {
    data: ListingData<T>,
}

#[derive(Deserialize)]
struct ListingData<T> {
    #[serde(default)]
    after: Option<String>,
    children: Vec<Child<T>>,
}

#[derive(Deserialize)]
struct Child<T> {
    data: T,
}

#[derive(Deserialize)]
struct RawPost {
    id: String,
    name: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    selftext: String,
    #[serde(default)]
    subreddit: String,
    #[serde(default)]
    url: String,
    created_utc: f64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: i64,
    #[serde(default)]
    author: Option<String>,
}

#[derive(Deserialize)]
struct RawComment {
    id: String,
    name: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    subreddit: String,
    created_utc: f64,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    parent_id: String,
    #[serde(default)]
    link_id: String,
}

fn author_or_deleted(author: Option<String>) -> String {
    author.filter(|a| !a.is_empty()).unwrap_or_else(|| DELETED_AUTHOR.to_string())
}

impl From<RawPost> for Post {
    fn from(r: RawPost) -> Self {
        Post {
            id: r.id,
            name: r.name,
            title: r.title,
            selftext: r.selftext,
            subreddit: r.subreddit,
            url: r.url,
            created_utc: from_epoch_secs(r.created_utc),
            score: r.score,
            num_comments: r.num_comments,
            author: author_or_deleted(r.author),
        }
    }
}

impl From<RawComment> for Comment {
    fn from(r: RawComment) -> Self {
        Comment {
            id: r.id,
            name: r.name,
            body: r.body,
            subreddit: r.subreddit,
            created_utc: from_epoch_secs(r.created_utc),
            score: r.score,
            author: author_or_deleted(r.author),
            parent_id: r.parent_id,
            link_id: r.link_id,
        }
    }
}

/// Authenticated listing client (application-only OAuth, client-credentials grant).
pub struct RedditClient {
    client: Client,
    api_base: String,
    auth_url: String,
    client_id: String,
    client_secret: String,
    max_retries: usize,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    pub fn new(opts: &ListenerOptions) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&opts.credentials.user_agent).context("user agent is not a valid header value")?,
        );
        let client = Client::builder()
            .default_headers(headers)
            .timeout(opts.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            api_base: opts.api_base.trim_end_matches('/').to_string(),
            auth_url: opts.auth_url.clone(),
            client_id: opts.credentials.client_id.clone(),
            client_secret: opts.credentials.client_secret.clone(),
            max_retries: opts.max_retries,
            token: Mutex::new(None),
        })
    }

    fn cached_token(&self) -> Option<String> {
        let guard = self.token.lock();
        guard
            .as_ref()
            .filter(|t| Instant::now() < t.expires_at)
            .map(|t| t.token.clone())
    }

    fn invalidate_token(&self) {
        *self.token.lock() = None;
    }

    #[instrument(skip(self))]
    async fn access_token(&self) -> Result<String> {
        if let Some(token) = self.cached_token() {
            return Ok(token);
        }

        let response = self
            .client
            .post(&self.auth_url)
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .context("token request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("token request failed with status {}: {}", status, body));
        }

        let parsed: TokenResponse = response.json().await.context("Failed to parse token response")?;
        let lifetime = Duration::from_secs(parsed.expires_in).saturating_sub(TOKEN_EXPIRY_SLACK);
        *self.token.lock() = Some(AccessToken {
            token: parsed.access_token.clone(),
            expires_at: Instant::now() + lifetime,
        });
        debug!(expires_in = parsed.expires_in, "Obtained access token");
        Ok(parsed.access_token)
    }

    fn listing_url(&self, channels: &[String], endpoint: &str, params: &[(&str, String)]) -> Result<Url> {
        if channels.is_empty() {
            return Err(anyhow!("no channels to query"));
        }
        let mut url = Url::parse(&format!("{}/r/{}/{}", self.api_base, channel_path(channels), endpoint))
            .with_context(|| format!("invalid listing url for {}", endpoint))?;
        {
            let mut q = url.query_pairs_mut();
            for (k, v) in params {
                q.append_pair(k, v);
            }
            q.append_pair("raw_json", "1");
        }
        Ok(url)
    }

    fn get_retry_after(response: &reqwest::Response, default: Duration) -> Duration {
        response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|h| h.to_str().ok())
            .and_then(|s| s.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or(default)
    }

    /// GET a listing with retries: 429 honours `Retry-After`, 5xx and transport errors back
    /// off exponentially, 401 refreshes the token once, other client errors fail immediately.
    #[instrument(skip(self, url), fields(url = %url))]
    async fn get_listing<T: DeserializeOwned>(&self, url: Url) -> Result<Page<T>> {
        let mut attempt = 0;
        let mut delay = DEFAULT_INITIAL_BACKOFF;
        let mut reauthed = false;

        loop {
            let token = self.access_token().await?;
            let sent = self
                .client
                .get(url.clone())
                .header(AUTHORIZATION, format!("bearer {}", token))
                .send()
                .await;

            match sent {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        let body = response.bytes().await.context("Failed to read listing body")?;
                        let listing: Listing<T> =
                            serde_json::from_slice(&body).context("Failed to parse listing")?;
                        let items = listing.data.children.into_iter().map(|c| c.data).collect();
                        return Ok(Page::new(items, listing.data.after.filter(|a| !a.is_empty())));
                    }

                    match status {
                        StatusCode::UNAUTHORIZED if !reauthed => {
                            warn!("Access token rejected, refreshing");
                            self.invalidate_token();
                            reauthed = true;
                        }
                        StatusCode::TOO_MANY_REQUESTS => {
                            attempt += 1;
                            if attempt > self.max_retries {
                                return Err(anyhow!("Max retries reached. Last error: HTTP 429"));
                            }
                            let retry_after = Self::get_retry_after(&response, DEFAULT_RATE_LIMIT_WAIT);
                            warn!(attempt, retry_after = ?retry_after, "Rate limited, retrying");
                            sleep(retry_after).await;
                        }
                        status if status.is_server_error() => {
                            attempt += 1;
                            if attempt > self.max_retries {
                                return Err(anyhow!("Max retries reached. Last error: HTTP {}", status));
                            }
                            warn!(status = %status, attempt, delay = ?delay, "Server error, retrying");
                            sleep(delay).await;
                            delay *= 2;
                        }
                        status => {
                            let body = response.text().await.unwrap_or_default();
                            return Err(anyhow!("Request failed with status {}: {}", status, body));
                        }
                    }
                }
                Err(e) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(anyhow!("Max retries reached. Last error: {}", e));
                    }
                    warn!(error = %e, attempt, delay = ?delay, "Request error, retrying");
                    sleep(delay).await;
                    delay *= 2;
                }
            }
        }
    }
}

fn paging_params(page_size: usize, after: Option<&str>) -> Vec<(&'static str, String)> {
    let mut params = vec![("limit", page_size.to_string())];
    if let Some(a) = after {
        params.push(("after", a.to_string()));
    }
    params
}

#[async_trait]
impl ContentSource for RedditClient {
    async fn search_posts(
        &self,
        channels: &[String],
        query: &str,
        recency: Recency,
        page_size: usize,
        after: Option<&str>,
    ) -> Result<Page<Post>> {
        let mut params = vec![
            ("q", query.to_string()),
            ("sort", "new".to_string()),
            ("t", recency.as_param().to_string()),
            ("restrict_sr", "1".to_string()),
        ];
        params.extend(paging_params(page_size, after));
        let url = self.listing_url(channels, "search", &params)?;
        let page: Page<RawPost> = self.get_listing(url).await?;
        Ok(Page::new(page.items.into_iter().map(Post::from).collect(), page.after))
    }

    async fn new_posts(&self, channels: &[String], page_size: usize, after: Option<&str>) -> Result<Page<Post>> {
        let url = self.listing_url(channels, "new", &paging_params(page_size, after))?;
        let page: Page<RawPost> = self.get_listing(url).await?;
        Ok(Page::new(page.items.into_iter().map(Post::from).collect(), page.after))
    }

    async fn new_comments(&self, channels: &[String], page_size: usize, after: Option<&str>) -> Result<Page<Comment>> {
        let url = self.listing_url(channels, "comments", &paging_params(page_size, after))?;
        let page: Page<RawComment> = self.get_listing(url).await?;
        Ok(Page::new(page.items.into_iter().map(Comment::from).collect(), page.after))
    }
}
