//! Typed items for the two polled streams and the capability they share.

use std::fmt;
use time::OffsetDateTime;

/// Author string used when the platform reports no author (deleted account).
pub const DELETED_AUTHOR: &str = "[deleted]";

/// Which of the two independent streams an item or file belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StreamKind {
    Posts,
    Comments,
}

impl StreamKind {
    /// Directory name under the output root.
    pub fn dir_name(self) -> &'static str {
        match self {
            StreamKind::Posts => "posts",
            StreamKind::Comments => "comments",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Common view over posts and comments used by the poller.
pub trait Item: Clone + Send + Sync + 'static {
    const KIND: StreamKind;

    /// Short id, unique within the platform.
    fn id(&self) -> &str;

    /// Fullname (`t3_<id>`, `t1_<id>`), used as the listing cursor.
    fn name(&self) -> &str;

    fn created_utc(&self) -> OffsetDateTime;

    /// Text the keyword predicate is evaluated against.
    fn text(&self) -> String;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub name: String,
    pub title: String,
    pub selftext: String,
    pub subreddit: String,
    pub url: String,
    pub created_utc: OffsetDateTime,
    pub score: i64,
    pub num_comments: i64,
    pub author: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Comment {
    pub id: String,
    pub name: String,
    pub body: String,
    pub subreddit: String,
    pub created_utc: OffsetDateTime,
    pub score: i64,
    pub author: String,
    pub parent_id: String,
    pub link_id: String,
}

impl Item for Post {
    const KIND: StreamKind = StreamKind::Posts;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn created_utc(&self) -> OffsetDateTime {
        self.created_utc
    }

    fn text(&self) -> String {
        format!("{} {}", self.title, self.selftext)
    }
}

impl Item for Comment {
    const KIND: StreamKind = StreamKind::Comments;

    fn id(&self) -> &str {
        &self.id
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn created_utc(&self) -> OffsetDateTime {
        self.created_utc
    }

    fn text(&self) -> String {
        self.body.clone()
    }
}

/// Sort oldest-first with ties broken by id, the total order within a stream.
pub fn sort_chronological<T: Item>(items: &mut [T]) {
    items.sort_by(|a, b| {
        a.created_utc()
            .cmp(&b.created_utc())
            .then_with(|| a.id().cmp(b.id()))
    });
}
