use crate::date::DayKey;
use crate::item::StreamKind;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Extension of the daily output files.
pub const OUTPUT_EXT: &str = "csv";

/// Output layout:
///   <root>/posts/YYYYMMDD.csv
///   <root>/comments/YYYYMMDD.csv
#[derive(Clone, Debug)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self { root: root.as_ref().to_path_buf() }
    }

    pub fn kind_dir(&self, kind: StreamKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    pub fn daily_file(&self, kind: StreamKind, day: DayKey) -> PathBuf {
        self.kind_dir(kind).join(day.file_name(OUTPUT_EXT))
    }

    /// Create `posts/` and `comments/` if missing.
    pub fn ensure_dirs(&self) -> Result<()> {
        for kind in [StreamKind::Posts, StreamKind::Comments] {
            let dir = self.kind_dir(kind);
            fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        }
        Ok(())
    }
}
