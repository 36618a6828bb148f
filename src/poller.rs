//! Watermark-driven incremental poller for one stream.
//!
//! Each poll walks newest-first listing pages until it reaches items the watermark
//! already covers, then hands back everything newer in chronological order together
//! with the advanced watermark. The caller owns the watermark and decides when to
//! commit the returned one.

use crate::config::{CommentFilter, ListenerOptions};
use crate::item::{sort_chronological, Comment, Item, Post, StreamKind};
use crate::query::KeywordSet;
use crate::source::{ContentSource, Page, Recency};
use crate::watermark::Watermark;
use anyhow::Result;
use std::collections::HashSet;
use std::future::Future;
use time::OffsetDateTime;
use tracing::{debug, info, warn};

/// Result of one poll of one stream.
#[derive(Clone, Debug)]
pub struct PollOutcome<T> {
    /// Accepted items, oldest first.
    pub items: Vec<T>,
    /// Watermark to commit once `items` are durably written.
    pub watermark: Watermark,
    /// Listing pages fetched.
    pub pages: usize,
    /// Items newer than the watermark and the run start (before keyword policy).
    pub fresh: usize,
    /// Keyword matches among fresh items, when the predicate was evaluated locally.
    pub keyword_matches: Option<usize>,
}

/// Poller configuration shared by both streams. Holds no watermark state.
#[derive(Clone, Debug)]
pub struct StreamPoller {
    channels: Vec<String>,
    keywords: KeywordSet,
    keyword_search: bool,
    comment_filter: CommentFilter,
    recency: Recency,
    page_size: usize,
    max_pages: usize,
    run_start: OffsetDateTime,
}

impl StreamPoller {
    pub fn new(opts: &ListenerOptions, run_start: OffsetDateTime) -> Self {
        Self {
            channels: opts.subreddits.clone(),
            keywords: opts.keywords.clone(),
            keyword_search: opts.keyword_search,
            comment_filter: opts.comment_filter,
            recency: opts.search_recency,
            page_size: opts.page_size,
            max_pages: opts.max_pages_per_poll.max(1),
            run_start,
        }
    }

    /// Poll new posts: keyword search (newest first, last day) when enabled,
    /// otherwise the channels' newest listing.
    pub async fn poll_posts(&self, source: &dyn ContentSource, watermark: Watermark) -> Result<PollOutcome<Post>> {
        let channels = self.channels.as_slice();
        let page_size = self.page_size;
        if self.keyword_search {
            let query = self.keywords.search_query();
            let query = query.as_str();
            let recency = self.recency;
            self.drain(watermark, |_: &Post| true, None, move |after: Option<String>| async move {
                source.search_posts(channels, query, recency, page_size, after.as_deref()).await
            })
            .await
        } else {
            self.drain(watermark, |_: &Post| true, None, move |after: Option<String>| async move {
                source.new_posts(channels, page_size, after.as_deref()).await
            })
            .await
        }
    }

    /// Poll new comments from the channels' newest listing. There is no server-side
    /// search for comments; the keyword predicate runs locally per `CommentFilter`.
    pub async fn poll_comments(&self, source: &dyn ContentSource, watermark: Watermark) -> Result<PollOutcome<Comment>> {
        let channels = self.channels.as_slice();
        let page_size = self.page_size;
        let keywords = &self.keywords;
        let evaluate = self.keyword_search;
        let enforce = evaluate && self.comment_filter == CommentFilter::Enforce;

        let keep = move |c: &Comment| !enforce || keywords.matches(&c.body);
        let matcher = if evaluate { Some(keywords) } else { None };
        self.drain(watermark, keep, matcher, move |after: Option<String>| async move {
            source.new_comments(channels, page_size, after.as_deref()).await
        })
        .await
    }

    /// Core paging loop. Stops when a page yields nothing fresh, when a page reaches the
    /// watermark or run start, when the listing has no further cursor, or at the page cap.
    /// Any fetch error aborts the whole poll so the caller keeps its old watermark.
    async fn drain<T, K, F, Fut>(
        &self,
        watermark: Watermark,
        keep: K,
        matcher: Option<&KeywordSet>,
        mut fetch: F,
    ) -> Result<PollOutcome<T>>
    where
        T: Item,
        K: Fn(&T) -> bool,
        F: FnMut(Option<String>) -> Fut,
        Fut: Future<Output = Result<Page<T>>>,
    {
        let now = OffsetDateTime::now_utc();
        let kind: StreamKind = T::KIND;

        let mut accepted: Vec<T> = Vec::new();
        let mut seen: HashSet<String> = HashSet::new();
        let mut newest_fresh: Option<OffsetDateTime> = None;
        let mut frontier = watermark.instant();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;
        let mut fresh_total = 0usize;
        let mut matches = 0usize;

        loop {
            if pages >= self.max_pages {
                warn!(
                    stream = %kind,
                    pages,
                    frontier = %Watermark::new(frontier),
                    "Page cap reached before catching up; older unseen items in this window are skipped"
                );
                break;
            }

            let page = fetch(cursor.take()).await?;
            pages += 1;

            let mut fresh = 0usize;
            let mut reached_boundary = false;
            let mut oldest_fresh: Option<OffsetDateTime> = None;
            for item in page.items {
                let ts = item.created_utc();
                if watermark.covers(ts) || ts < self.run_start {
                    reached_boundary = true;
                    continue;
                }
                if !seen.insert(item.id().to_string()) {
                    continue;
                }
                fresh += 1;
                oldest_fresh = Some(ts);
                newest_fresh = Some(newest_fresh.map_or(ts, |n| n.max(ts)));
                if let Some(kw) = matcher {
                    if kw.matches(&item.text()) {
                        matches += 1;
                    }
                }
                if keep(&item) {
                    accepted.push(item);
                }
            }

            debug!(stream = %kind, page = pages, fresh, reached_boundary, "Fetched page");

            let Some(oldest) = oldest_fresh else { break };
            fresh_total += fresh;
            frontier = oldest;

            if reached_boundary {
                break;
            }
            match page.after {
                Some(after) => cursor = Some(after),
                None => break,
            }
        }

        let next = match newest_fresh {
            Some(ts) => watermark.advanced_to(ts),
            // Nothing new anywhere: move up to the poll start so the empty range is not rescanned.
            None => watermark.advanced_to(now),
        };

        sort_chronological(&mut accepted);

        info!(
            stream = %kind,
            since = %watermark,
            found = accepted.len(),
            fresh = fresh_total,
            pages,
            next_watermark = %next,
            "Polled stream"
        );

        Ok(PollOutcome {
            items: accepted,
            watermark: next,
            pages,
            fresh: fresh_total,
            keyword_matches: matcher.map(|_| matches),
        })
    }
}
