use std::fmt;
use time::OffsetDateTime;

use crate::date::format_created_utc;

/// Timestamp boundary at or below which a stream's items count as already processed.
/// Only ever moves forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Watermark(OffsetDateTime);

impl Watermark {
    pub fn new(ts: OffsetDateTime) -> Self {
        Self(ts)
    }

    #[inline]
    pub fn instant(self) -> OffsetDateTime {
        self.0
    }

    /// True if an item created at `ts` was already covered by this watermark.
    /// Equality counts as seen.
    #[inline]
    pub fn covers(self, ts: OffsetDateTime) -> bool {
        ts <= self.0
    }

    /// Move forward to `ts`; never moves backwards.
    #[must_use]
    pub fn advanced_to(self, ts: OffsetDateTime) -> Self {
        if ts > self.0 { Self(ts) } else { self }
    }
}

impl fmt::Display for Watermark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&format_created_utc(self.0))
    }
}
