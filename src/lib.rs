mod config;
mod date;
mod paths;
mod query;

mod item;
mod record;
mod watermark;

mod source;
mod reddit;
mod poller;

mod sink;
mod scheduler;
mod util;

pub use crate::config::{CommentFilter, Credentials, ListenerOptions, DEFAULT_API_BASE, DEFAULT_AUTH_URL, PAGE_SIZE};
pub use crate::date::{format_created_utc, from_epoch_secs, DayKey};
pub use crate::item::{sort_chronological, Comment, Item, Post, StreamKind, DELETED_AUTHOR};
pub use crate::query::{channel_path, normalize_channel, KeywordSet};
pub use crate::watermark::Watermark;

// The page fetcher seam and its HTTP implementation.
pub use crate::source::{ContentSource, Page, Recency};
pub use crate::reddit::RedditClient;

// Core polling engine and the scheduler driving it.
pub use crate::poller::{PollOutcome, StreamPoller};
pub use crate::scheduler::{CycleReport, Listener, StreamReport, StreamState, StreamStatus};

// Output side.
pub use crate::paths::{OutputLayout, OUTPUT_EXT};
pub use crate::record::{CommentRecord, PostRecord};
pub use crate::sink::DailySink;

pub use crate::util::{init_tracing_once, split_list};
