use std::fmt;
use std::str::FromStr;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime};

/// UTC calendar day used to select the output file ("YYYYMMDD").
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DayKey {
    pub year: u16,
    pub month: u8, // 1..=12
    pub day: u8,   // 1..=31
}

impl DayKey {
    pub fn new(year: u16, month: u8, day: u8) -> Self {
        assert!((1..=12).contains(&month), "Month must be 1..=12");
        assert!((1..=31).contains(&day), "Day must be 1..=31");
        Self { year, month, day }
    }

    /// Day of the given instant, in UTC.
    pub fn of(ts: OffsetDateTime) -> Self {
        let date: Date = ts.to_offset(time::UtcOffset::UTC).date();
        let year = date.year().clamp(0, u16::MAX as i32) as u16;
        Self { year, month: date.month() as u8, day: date.day() }
    }

    pub fn today() -> Self {
        Self::of(OffsetDateTime::now_utc())
    }

    /// File name for this day with the given extension, e.g. `20240101.csv`.
    pub fn file_name(&self, ext: &str) -> String {
        format!("{}.{}", self, ext)
    }
}

impl fmt::Display for DayKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}{:02}{:02}", self.year, self.month, self.day)
    }
}

impl FromStr for DayKey {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
            return Err("expected YYYYMMDD".into());
        }
        let year: u16 = s[0..4].parse().map_err(|_| "invalid year")?;
        let month: u8 = s[4..6].parse().map_err(|_| "invalid month")?;
        let day: u8 = s[6..8].parse().map_err(|_| "invalid day")?;
        let m = Month::try_from(month).map_err(|_| "month must be 01..12")?;
        Date::from_calendar_date(year as i32, m, day).map_err(|_| "day out of range")?;
        Ok(Self { year, month, day })
    }
}

/// Render an instant as `YYYY-MM-DD HH:MM:SS` (UTC), the sink's timestamp format.
pub fn format_created_utc(ts: OffsetDateTime) -> String {
    let fmt = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    ts.to_offset(time::UtcOffset::UTC)
        .format(&fmt)
        .unwrap_or_else(|_| ts.unix_timestamp().to_string())
}

/// Convert the platform's fractional epoch seconds into an instant.
/// Sub-second precision is dropped; out-of-range values clamp to the epoch.
pub fn from_epoch_secs(secs: f64) -> OffsetDateTime {
    if !secs.is_finite() {
        return OffsetDateTime::UNIX_EPOCH;
    }
    OffsetDateTime::from_unix_timestamp(secs.trunc() as i64).unwrap_or(OffsetDateTime::UNIX_EPOCH)
}
