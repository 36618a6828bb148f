use crate::date::DayKey;
use crate::item::{Comment, Post, StreamKind};
use crate::paths::OutputLayout;
use crate::record::{CommentRecord, PostRecord};
use crate::util::open_append_with_backoff;
use anyhow::{Context, Result};
use serde::Serialize;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

/// Append-only writer for the daily per-kind CSV files.
///
/// Header handling: a header row is written only when the target file is empty at the
/// time of the append, so repeated appends (and restarts on the same day) never repeat it.
/// No deduplication happens here.
#[derive(Clone, Debug)]
pub struct DailySink {
    layout: OutputLayout,
    write_buffer_bytes: usize,
}

impl DailySink {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout, write_buffer_bytes: 64 * 1024 }
    }

    pub fn write_posts(&self, day: DayKey, posts: &[Post]) -> Result<Option<PathBuf>> {
        let rows: Vec<PostRecord> = posts.iter().map(PostRecord::from).collect();
        self.append(StreamKind::Posts, day, &rows)
    }

    pub fn write_comments(&self, day: DayKey, comments: &[Comment]) -> Result<Option<PathBuf>> {
        let rows: Vec<CommentRecord> = comments.iter().map(CommentRecord::from).collect();
        self.append(StreamKind::Comments, day, &rows)
    }

    /// Append `rows` to the file for (`kind`, `day`). Returns the path written, or `None`
    /// for an empty batch (no file is touched).
    pub fn append<R: Serialize>(&self, kind: StreamKind, day: DayKey, rows: &[R]) -> Result<Option<PathBuf>> {
        if rows.is_empty() {
            return Ok(None);
        }
        let path = self.layout.daily_file(kind, day);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).with_context(|| format!("create {}", dir.display()))?;
        }

        let (file, empty) = open_append_with_backoff(&path, 16, 50)
            .with_context(|| format!("open {} for append", path.display()))?;
        let buf = BufWriter::with_capacity(self.write_buffer_bytes, file);
        let mut w = csv::WriterBuilder::new().has_headers(empty).from_writer(buf);

        for row in rows {
            w.serialize(row).with_context(|| format!("write row to {}", path.display()))?;
        }
        let mut inner = w
            .into_inner()
            .map_err(|e| anyhow::anyhow!("flush {}: {}", path.display(), e.error()))?;
        inner.flush().with_context(|| format!("flush {}", path.display()))?;
        inner
            .get_ref()
            .sync_data()
            .with_context(|| format!("sync {}", path.display()))?;

        Ok(Some(path))
    }
}
