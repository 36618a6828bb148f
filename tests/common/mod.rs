#![allow(dead_code)]

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use rtail::{Comment, ContentSource, ListenerOptions, Page, Post, Recency};
use std::collections::VecDeque;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use time::macros::datetime;
use time::{Duration, OffsetDateTime};

/// Fixed reference instant all scripted timelines are built around.
pub fn t0() -> OffsetDateTime {
    datetime!(2024-01-01 0:00 UTC)
}

/// `t0 + secs`.
pub fn t(secs: i64) -> OffsetDateTime {
    t0() + Duration::seconds(secs)
}

pub fn post_at(id: &str, ts: OffsetDateTime) -> Post {
    Post {
        id: id.to_string(),
        name: format!("t3_{}", id),
        title: format!("title {}", id),
        selftext: format!("text {}", id),
        subreddit: "rust".to_string(),
        url: format!("https://example.com/{}", id),
        created_utc: ts,
        score: 1,
        num_comments: 0,
        author: "alice".to_string(),
    }
}

pub fn comment_at(id: &str, body: &str, ts: OffsetDateTime) -> Comment {
    Comment {
        id: id.to_string(),
        name: format!("t1_{}", id),
        body: body.to_string(),
        subreddit: "rust".to_string(),
        created_utc: ts,
        score: 1,
        author: "bob".to_string(),
        parent_id: "t3_p1".to_string(),
        link_id: "t3_p1".to_string(),
    }
}

/// Newest-first page of posts at the given offsets (seconds from `t0`), ids `p<offset>`.
pub fn post_page(offsets: &[i64], after: Option<&str>) -> Page<Post> {
    let items = offsets.iter().map(|&s| post_at(&format!("p{}", s), t(s))).collect();
    Page::new(items, after.map(str::to_string))
}

/// Newest-first page of comments at the given offsets, ids `c<offset>`.
pub fn comment_page(offsets: &[i64], body: &str, after: Option<&str>) -> Page<Comment> {
    let items = offsets.iter().map(|&s| comment_at(&format!("c{}", s), body, t(s))).collect();
    Page::new(items, after.map(str::to_string))
}

/// One recorded listing call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Call {
    pub endpoint: &'static str,
    pub query: Option<String>,
    pub recency: Option<Recency>,
    pub after: Option<String>,
}

/// In-memory source that replays queued pages (or errors) per endpoint and records
/// every call. An exhausted queue yields an empty page.
#[derive(Default)]
pub struct ScriptedSource {
    posts: Mutex<VecDeque<Result<Page<Post>, String>>>,
    comments: Mutex<VecDeque<Result<Page<Comment>, String>>>,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_posts(&self, page: Page<Post>) {
        self.posts.lock().push_back(Ok(page));
    }

    pub fn push_posts_error(&self, msg: &str) {
        self.posts.lock().push_back(Err(msg.to_string()));
    }

    pub fn push_comments(&self, page: Page<Comment>) {
        self.comments.lock().push_back(Ok(page));
    }

    pub fn push_comments_error(&self, msg: &str) {
        self.comments.lock().push_back(Err(msg.to_string()));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn calls_to(&self, endpoint: &str) -> Vec<Call> {
        self.calls.lock().iter().filter(|c| c.endpoint == endpoint).cloned().collect()
    }

    fn record(&self, endpoint: &'static str, search: Option<(&str, Recency)>, after: Option<&str>) {
        self.calls.lock().push(Call {
            endpoint,
            query: search.map(|(q, _)| q.to_string()),
            recency: search.map(|(_, r)| r),
            after: after.map(str::to_string),
        });
    }

    fn next_post_page(&self) -> Result<Page<Post>> {
        match self.posts.lock().pop_front() {
            Some(Ok(p)) => Ok(p),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Ok(Page::empty()),
        }
    }
}

#[async_trait]
impl ContentSource for ScriptedSource {
    async fn search_posts(
        &self,
        _channels: &[String],
        query: &str,
        recency: Recency,
        _page_size: usize,
        after: Option<&str>,
    ) -> Result<Page<Post>> {
        self.record("search", Some((query, recency)), after);
        self.next_post_page()
    }

    async fn new_posts(&self, _channels: &[String], _page_size: usize, after: Option<&str>) -> Result<Page<Post>> {
        self.record("new", None, after);
        self.next_post_page()
    }

    async fn new_comments(&self, _channels: &[String], _page_size: usize, after: Option<&str>) -> Result<Page<Comment>> {
        self.record("comments", None, after);
        match self.comments.lock().pop_front() {
            Some(Ok(p)) => Ok(p),
            Some(Err(e)) => Err(anyhow!(e)),
            None => Ok(Page::empty()),
        }
    }
}

/// Options that list newest posts (no keyword search) in r/rust.
pub fn listing_opts() -> ListenerOptions {
    ListenerOptions::default()
        .with_subreddits(["rust"])
        .with_keyword_search(false)
}

/// Options that search posts for "tokio"/"serde" and evaluate keywords on comments.
pub fn search_opts() -> ListenerOptions {
    ListenerOptions::default()
        .with_subreddits(["rust"])
        .with_keywords(["Tokio", "serde"])
        .with_keyword_search(true)
}

/// Read a text file line-by-line into strings (skips empty lines).
pub fn read_lines(path: &Path) -> Vec<String> {
    let f = File::open(path).unwrap();
    let r = BufReader::new(f);
    r.lines().map(|l| l.unwrap()).filter(|s| !s.is_empty()).collect()
}

/// Parse a CSV file into header + rows.
pub fn read_csv(path: &Path) -> (Vec<String>, Vec<Vec<String>>) {
    let mut rdr = csv::ReaderBuilder::new().has_headers(true).from_path(path).unwrap();
    let header = rdr.headers().unwrap().iter().map(str::to_string).collect();
    let rows = rdr
        .records()
        .map(|r| r.unwrap().iter().map(str::to_string).collect())
        .collect();
    (header, rows)
}
