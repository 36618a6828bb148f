//! Dual-stream scheduler: polls posts and comments each cycle, writes the batches,
//! commits each stream's watermark only after its batch is on disk, then sleeps.

use crate::config::ListenerOptions;
use crate::date::DayKey;
use crate::item::StreamKind;
use crate::paths::OutputLayout;
use crate::poller::{PollOutcome, StreamPoller};
use crate::sink::DailySink;
use crate::source::ContentSource;
use crate::watermark::Watermark;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tokio::sync::watch;
use tracing::{error, info, warn};

/// Per-stream state owned by the scheduler. Nothing else reads or writes it.
#[derive(Clone, Debug)]
pub struct StreamState {
    pub kind: StreamKind,
    pub watermark: Watermark,
    pub items_written: u64,
    pub fetch_failures: u64,
    pub write_failures: u64,
}

impl StreamState {
    fn new(kind: StreamKind, watermark: Watermark) -> Self {
        Self { kind, watermark, items_written: 0, fetch_failures: 0, write_failures: 0 }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamStatus {
    /// Batch written (or empty) and watermark committed.
    Committed,
    /// Fetch failed; watermark left unchanged.
    FetchFailed(String),
    /// Write failed after retry; watermark left unchanged so the range is re-polled.
    WriteFailed(String),
}

#[derive(Clone, Debug)]
pub struct StreamReport {
    pub kind: StreamKind,
    pub found: usize,
    pub written_to: Option<PathBuf>,
    pub status: StreamStatus,
}

#[derive(Clone, Debug)]
pub struct CycleReport {
    pub day: DayKey,
    pub posts: StreamReport,
    pub comments: StreamReport,
}

pub struct Listener {
    source: Arc<dyn ContentSource>,
    poller: StreamPoller,
    sink: DailySink,
    interval: Duration,
    concurrent: bool,
    posts: StreamState,
    comments: StreamState,
}

impl Listener {
    /// Both watermarks start at `run_start`, so nothing created before the process started
    /// is ever emitted.
    pub fn new(opts: &ListenerOptions, source: Arc<dyn ContentSource>, run_start: OffsetDateTime) -> Self {
        let start = Watermark::new(run_start);
        Self {
            source,
            poller: StreamPoller::new(opts, run_start),
            sink: DailySink::new(OutputLayout::new(&opts.output_dir)),
            interval: opts.poll_interval,
            concurrent: opts.concurrent_streams,
            posts: StreamState::new(StreamKind::Posts, start),
            comments: StreamState::new(StreamKind::Comments, start),
        }
    }

    pub fn posts_state(&self) -> &StreamState {
        &self.posts
    }

    pub fn comments_state(&self) -> &StreamState {
        &self.comments
    }

    /// One cycle against today's (UTC) files.
    pub async fn run_cycle(&mut self) -> CycleReport {
        self.run_cycle_on(DayKey::today()).await
    }

    /// One cycle writing into the files for `day`.
    pub async fn run_cycle_on(&mut self, day: DayKey) -> CycleReport {
        let source = Arc::clone(&self.source);
        let source: &dyn ContentSource = source.as_ref();

        info!(since = %self.posts.watermark, "Checking for new posts");
        if self.concurrent {
            info!(since = %self.comments.watermark, "Checking for new comments");
            let (posts, comments) = tokio::join!(
                self.poller.poll_posts(source, self.posts.watermark),
                self.poller.poll_comments(source, self.comments.watermark),
            );
            let posts = persist(&self.sink, &mut self.posts, day, posts, DailySink::write_posts).await;
            let comments = persist(&self.sink, &mut self.comments, day, comments, DailySink::write_comments).await;
            return CycleReport { day, posts, comments };
        }

        let posts = self.poller.poll_posts(source, self.posts.watermark).await;
        let posts = persist(&self.sink, &mut self.posts, day, posts, DailySink::write_posts).await;

        info!(since = %self.comments.watermark, "Checking for new comments");
        let comments = self.poller.poll_comments(source, self.comments.watermark).await;
        let comments = persist(&self.sink, &mut self.comments, day, comments, DailySink::write_comments).await;

        CycleReport { day, posts, comments }
    }

    /// Run cycles until `shutdown` turns `true`. A cycle in progress always finishes
    /// (including its writes) before the stop is honoured.
    pub async fn run_until(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<()> {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let report = self.run_cycle().await;
            info!(
                day = %report.day,
                posts = report.posts.found,
                comments = report.comments.found,
                "Fetched {} Posts, {} Comments",
                report.posts.found,
                report.comments.found
            );

            if *shutdown.borrow() {
                break;
            }
            info!(interval = ?self.interval, "Waiting for the next polling interval");
            match tokio::time::timeout(self.interval, shutdown.wait_for(|stop| *stop)).await {
                Ok(Ok(_)) => break,
                // Sender gone: no stop can arrive any more, just keep the cadence.
                Ok(Err(_)) => tokio::time::sleep(self.interval).await,
                Err(_) => {}
            }
        }
        info!(
            posts_written = self.posts.items_written,
            comments_written = self.comments.items_written,
            "Listener stopped"
        );
        Ok(())
    }
}

type WriteFn<T> = fn(&DailySink, DayKey, &[T]) -> Result<Option<PathBuf>>;

/// Run one sink write on the blocking pool so file I/O and open backoff never stall
/// the runtime. Empty batches never touch the sink.
async fn write_blocking<T: Send + Sync + 'static>(
    sink: &DailySink,
    day: DayKey,
    items: &Arc<Vec<T>>,
    write: WriteFn<T>,
) -> Result<Option<PathBuf>> {
    if items.is_empty() {
        return Ok(None);
    }
    let sink = sink.clone();
    let items = Arc::clone(items);
    tokio::task::spawn_blocking(move || write(&sink, day, &items))
        .await
        .context("sink write task failed")?
}

/// Write a poll's batch (retrying once) and commit the watermark on success.
async fn persist<T: Send + Sync + 'static>(
    sink: &DailySink,
    state: &mut StreamState,
    day: DayKey,
    outcome: Result<PollOutcome<T>>,
    write: WriteFn<T>,
) -> StreamReport {
    let kind = state.kind;
    let outcome = match outcome {
        Ok(o) => o,
        Err(e) => {
            state.fetch_failures += 1;
            warn!(stream = %kind, error = %format!("{:#}", e), watermark = %state.watermark, "Poll failed; keeping watermark for retry next cycle");
            return StreamReport { kind, found: 0, written_to: None, status: StreamStatus::FetchFailed(format!("{:#}", e)) };
        }
    };

    let found = outcome.items.len();
    if let Some(m) = outcome.keyword_matches {
        info!(stream = %kind, keyword_matches = m, fresh = outcome.fresh, "Keyword predicate evaluated");
    }

    let items = Arc::new(outcome.items);
    let written = match write_blocking(sink, day, &items, write).await {
        Ok(path) => Ok(path),
        Err(first) => {
            warn!(stream = %kind, error = %format!("{:#}", first), "Write failed, retrying once");
            write_blocking(sink, day, &items, write).await
        }
    };

    match written {
        Ok(path) => {
            state.watermark = state.watermark.advanced_to(outcome.watermark.instant());
            state.items_written += found as u64;
            if let Some(p) = &path {
                info!(stream = %kind, count = found, path = %p.display(), "Appended batch");
            }
            StreamReport { kind, found, written_to: path, status: StreamStatus::Committed }
        }
        Err(e) => {
            state.write_failures += 1;
            error!(
                stream = %kind,
                count = found,
                error = %format!("{:#}", e),
                watermark = %state.watermark,
                "Write failed after retry; batch NOT recorded, watermark not advanced"
            );
            StreamReport { kind, found, written_to: None, status: StreamStatus::WriteFailed(format!("{:#}", e)) }
        }
    }
}
