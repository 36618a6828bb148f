use crate::query::{normalize_channel, KeywordSet};
use crate::source::Recency;
use crate::util::{env_bool, env_list, read_list_file};
use anyhow::{anyhow, bail, Context, Result};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://oauth.reddit.com";
pub const DEFAULT_AUTH_URL: &str = "https://www.reddit.com/api/v1/access_token";

/// Maximum items per listing request accepted by the platform.
pub const PAGE_SIZE: usize = 100;

/// What to do with comments that do not match any keyword.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum CommentFilter {
    /// Evaluate the keyword predicate and report matches, but keep every comment.
    #[default]
    Evaluate,
    /// Drop comments that match no keyword.
    Enforce,
}

impl std::str::FromStr for CommentFilter {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "evaluate" | "" => Ok(CommentFilter::Evaluate),
            "enforce" => Ok(CommentFilter::Enforce),
            other => Err(anyhow!("unknown comment filter {:?} (expected evaluate|enforce)", other)),
        }
    }
}

/// Application credentials for the client-credentials grant. Opaque to the poller.
#[derive(Clone)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub user_agent: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"***")
            .field("user_agent", &self.user_agent)
            .finish()
    }
}

impl Default for Credentials {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            user_agent: format!("rtail/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Listener options with sensible defaults and builder chaining.
#[derive(Clone, Debug)]
pub struct ListenerOptions {
    pub subreddits: Vec<String>,     // normalized lowercase, no "r/"
    pub keywords: KeywordSet,
    pub keyword_search: bool,        // search posts by keyword instead of listing newest
    pub comment_filter: CommentFilter,
    pub search_recency: Recency,     // time window for keyword search
    pub poll_interval: Duration,
    pub output_dir: PathBuf,         // posts/ and comments/ live under here
    pub concurrent_streams: bool,    // poll posts and comments concurrently within a cycle
    pub page_size: usize,
    pub max_pages_per_poll: usize,   // hard cap on the paging loop
    pub credentials: Credentials,
    pub api_base: String,
    pub auth_url: String,
    pub request_timeout: Duration,
    pub max_retries: usize,
}

impl Default for ListenerOptions {
    fn default() -> Self {
        Self {
            subreddits: Vec::new(),
            keywords: KeywordSet::default(),
            keyword_search: true,
            comment_filter: CommentFilter::default(),
            search_recency: Recency::default(),
            poll_interval: Duration::from_secs(60),
            output_dir: PathBuf::from("."),
            concurrent_streams: false,
            page_size: PAGE_SIZE,
            max_pages_per_poll: 50,
            credentials: Credentials::default(),
            api_base: DEFAULT_API_BASE.to_string(),
            auth_url: DEFAULT_AUTH_URL.to_string(),
            request_timeout: Duration::from_secs(30),
            max_retries: 5,
        }
    }
}

impl ListenerOptions {
    pub fn with_subreddits<I, S>(mut self, iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut v: Vec<String> = iter
            .into_iter()
            .map(|s| normalize_channel(s.as_ref()))
            .filter(|s| !s.is_empty())
            .collect();
        v.sort();
        v.dedup();
        self.subreddits = v;
        self
    }
    pub fn with_keywords<I, S>(mut self, iter: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.keywords = KeywordSet::new(iter);
        self
    }
    pub fn with_keyword_search(mut self, yes: bool) -> Self {
        self.keyword_search = yes;
        self
    }
    pub fn with_comment_filter(mut self, filter: CommentFilter) -> Self {
        self.comment_filter = filter;
        self
    }
    pub fn with_search_recency(mut self, recency: Recency) -> Self {
        self.search_recency = recency;
        self
    }
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
    pub fn with_output_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.output_dir = dir.as_ref().to_path_buf();
        self
    }
    pub fn with_concurrent_streams(mut self, yes: bool) -> Self {
        self.concurrent_streams = yes;
        self
    }
    pub fn with_page_size(mut self, n: usize) -> Self {
        self.page_size = n.clamp(1, PAGE_SIZE);
        self
    }
    pub fn with_max_pages_per_poll(mut self, n: usize) -> Self {
        self.max_pages_per_poll = n.max(1);
        self
    }
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = credentials;
        self
    }
    pub fn with_api_base(mut self, base: impl Into<String>) -> Self {
        self.api_base = base.into().trim_end_matches('/').to_string();
        self
    }
    pub fn with_auth_url(mut self, url: impl Into<String>) -> Self {
        self.auth_url = url.into();
        self
    }
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
    pub fn with_max_retries(mut self, n: usize) -> Self {
        self.max_retries = n;
        self
    }

    /// Load options from the process environment (call `dotenv` first if desired).
    /// Does not validate; call `validate()` before use.
    pub fn from_env() -> Result<Self> {
        let mut opts = ListenerOptions::default();

        let defaults = Credentials::default();
        opts.credentials = Credentials {
            client_id: std::env::var("REDDIT_CLIENT_ID").unwrap_or_default(),
            client_secret: std::env::var("REDDIT_CLIENT_SECRET").unwrap_or_default(),
            user_agent: std::env::var("REDDIT_USER_AGENT")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.user_agent),
        };

        opts = opts.with_subreddits(env_list("RTAIL_SUBREDDITS", true));

        let mut keywords = env_list("RTAIL_KEYWORDS", false);
        if let Ok(path) = std::env::var("RTAIL_KEYWORDS_FILE") {
            if !path.trim().is_empty() {
                let extra = read_list_file(Path::new(path.trim()))
                    .with_context(|| format!("RTAIL_KEYWORDS_FILE {}", path))?;
                keywords.extend(extra);
            }
        }
        opts = opts.with_keywords(keywords);

        if let Some(yes) = env_bool("RTAIL_KEYWORD_SEARCH")? {
            opts = opts.with_keyword_search(yes);
        }
        if let Ok(s) = std::env::var("RTAIL_COMMENT_FILTER") {
            opts = opts.with_comment_filter(s.parse()?);
        }
        if let Ok(s) = std::env::var("RTAIL_SEARCH_RECENCY") {
            opts = opts.with_search_recency(s.parse()?);
        }
        if let Ok(s) = std::env::var("RTAIL_POLL_INTERVAL_SECS") {
            let secs: u64 = s
                .trim()
                .parse()
                .with_context(|| format!("RTAIL_POLL_INTERVAL_SECS must be whole seconds, got {:?}", s))?;
            opts = opts.with_poll_interval(Duration::from_secs(secs));
        }
        if let Ok(dir) = std::env::var("RTAIL_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                opts = opts.with_output_dir(dir.trim());
            }
        }
        if let Some(yes) = env_bool("RTAIL_CONCURRENT_STREAMS")? {
            opts = opts.with_concurrent_streams(yes);
        }
        if let Ok(base) = std::env::var("RTAIL_API_BASE") {
            opts = opts.with_api_base(base);
        }
        if let Ok(url) = std::env::var("RTAIL_AUTH_URL") {
            opts = opts.with_auth_url(url);
        }

        Ok(opts)
    }

    /// Fail fast on configuration that cannot produce a working listener.
    pub fn validate(&self) -> Result<()> {
        if self.subreddits.is_empty() {
            bail!("no subreddits configured (set RTAIL_SUBREDDITS)");
        }
        let re = Regex::new(r"^[A-Za-z0-9_]{2,21}$")?;
        if let Some(bad) = self.subreddits.iter().find(|s| !re.is_match(s)) {
            bail!("invalid subreddit name {:?}", bad);
        }
        if self.credentials.client_id.trim().is_empty() {
            bail!("missing client id (set REDDIT_CLIENT_ID)");
        }
        if self.credentials.client_secret.trim().is_empty() {
            bail!("missing client secret (set REDDIT_CLIENT_SECRET)");
        }
        if self.poll_interval.is_zero() {
            bail!("poll interval must be at least one second");
        }
        if self.keyword_search && self.keywords.is_empty() {
            bail!("keyword search is enabled but no keywords are configured (set RTAIL_KEYWORDS or disable RTAIL_KEYWORD_SEARCH)");
        }
        Ok(())
    }
}
