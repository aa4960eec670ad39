use std::fmt;

use time::{macros::date, Date};

/// Watermark used when the destination table is empty, so the first run
/// requests the full published history.
pub const EPOCH_WATERMARK: Date = date!(1900 - 01 - 01);

/// Inclusive `[start, end]` date range requested from upstream in one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    pub start: Date,
    pub end: Date,
}

impl SyncWindow {
    /// Window starting the day after `watermark` and ending `today`.
    pub fn after(watermark: Date, today: Date) -> Self {
        Self {
            start: watermark.next_day().unwrap_or(Date::MAX),
            end: today,
        }
    }

    /// `start > end`: the watermark is today or later.
    pub fn is_degenerate(&self) -> bool {
        self.start > self.end
    }

    /// Number of calendar days covered, 0 for a degenerate window.
    pub fn days(&self) -> u64 {
        if self.is_degenerate() {
            0
        } else {
            (self.end - self.start).whole_days() as u64 + 1
        }
    }

    pub fn estimated_rows(&self, generators_per_day: u32) -> u64 {
        self.days() * u64::from(generators_per_day)
    }

    /// Whether the window likely holds more rows than one response page.
    pub fn exceeds_page(&self, generators_per_day: u32, page_limit: u32) -> bool {
        self.estimated_rows(generators_per_day) > u64::from(page_limit)
    }

    pub fn start_param(&self) -> String {
        iso_date(self.start)
    }

    pub fn end_param(&self) -> String {
        iso_date(self.end)
    }
}

impl fmt::Display for SyncWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", iso_date(self.start), iso_date(self.end))
    }
}

/// `YYYY-MM-DD`, the format the upstream API expects for `start`/`end`.
pub fn iso_date(d: Date) -> String {
    format!("{:04}-{:02}-{:02}", d.year(), u8::from(d.month()), d.day())
}
