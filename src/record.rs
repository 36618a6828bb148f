use crate::date::format_created_utc;
use crate::item::{Comment, Post};
use serde::Serialize;

/// Flat CSV row for a post. Field order is the column order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PostRecord {
    pub id: String,
    pub title: String,
    pub selftext: String,
    pub subreddit: String,
    pub url: String,
    pub created_utc: String,
    pub score: i64,
    pub num_comments: i64,
    pub author: String,
}

/// Flat CSV row for a comment. Field order is the column order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct CommentRecord {
    pub id: String,
    pub body: String,
    pub subreddit: String,
    pub created_utc: String,
    pub score: i64,
    pub author: String,
    pub parent_id: String,
    pub link_id: String,
}

impl From<&Post> for PostRecord {
    fn from(p: &Post) -> Self {
        Self {
            id: p.id.clone(),
            title: p.title.clone(),
            selftext: p.selftext.clone(),
            subreddit: p.subreddit.clone(),
            url: p.url.clone(),
            created_utc: format_created_utc(p.created_utc),
            score: p.score,
            num_comments: p.num_comments,
            author: p.author.clone(),
        }
    }
}

impl From<&Comment> for CommentRecord {
    fn from(c: &Comment) -> Self {
        Self {
            id: c.id.clone(),
            body: c.body.clone(),
            subreddit: c.subreddit.clone(),
            created_utc: format_created_utc(c.created_utc),
            score: c.score,
            author: c.author.clone(),
            parent_id: c.parent_id.clone(),
            link_id: c.link_id.clone(),
        }
    }
}
