//! Page fetcher seam between the poller and the content platform.

use crate::item::{Comment, Post};
use anyhow::Result;
use async_trait::async_trait;

/// One bounded, newest-first batch returned by a single listing call.
#[derive(Clone, Debug)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Cursor for the next (older) page; `None` when the listing is exhausted.
    pub after: Option<String>,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, after: Option<String>) -> Self {
        Self { items, after }
    }

    pub fn empty() -> Self {
        Self { items: Vec::new(), after: None }
    }
}

/// Recency window applied to server-side search.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Recency {
    Hour,
    #[default]
    Day,
    Week,
}

impl std::str::FromStr for Recency {
    type Err = anyhow::Error;
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "hour" => Ok(Recency::Hour),
            "day" | "" => Ok(Recency::Day),
            "week" => Ok(Recency::Week),
            other => Err(anyhow::anyhow!("unknown search recency {:?} (expected hour|day|week)", other)),
        }
    }
}

impl Recency {
    pub fn as_param(self) -> &'static str {
        match self {
            Recency::Hour => "hour",
            Recency::Day => "day",
            Recency::Week => "week",
        }
    }
}

/// Listing operations the poller needs. Every page is newest-first and holds at most
/// `page_size` items; `after` continues from a previous page's cursor.
/// Implementations own authentication, retries and transport errors.
#[async_trait]
pub trait ContentSource: Send + Sync {
    async fn search_posts(
        &self,
        channels: &[String],
        query: &str,
        recency: Recency,
        page_size: usize,
        after: Option<&str>,
    ) -> Result<Page<Post>>;

    async fn new_posts(&self, channels: &[String], page_size: usize, after: Option<&str>) -> Result<Page<Post>>;

    async fn new_comments(&self, channels: &[String], page_size: usize, after: Option<&str>) -> Result<Page<Comment>>;
}
