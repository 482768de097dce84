//! Trailing-year date window
//!
//! Global invariants enforced:
//! - The window always holds exactly `WINDOW_DAYS` dates
//! - Dates are strictly increasing by one calendar day
//! - The last date is "today"
//!
//! Dates are plain calendar days (`NaiveDate`), so daylight-saving shifts cannot
//! change the day count. The count is still checked and the start boundary
//! corrected, mirroring how the window is defined rather than how it happens to be
//! computed.

use chrono::{DateTime, Duration, Months, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Number of days shown on the heatmap, today included
pub const WINDOW_DAYS: i64 = 365;

/// Inclusive span of calendar days ending today
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    /// Window of `WINDOW_DAYS` days ending on `today` (inclusive)
    pub fn ending(today: NaiveDate) -> Self {
        let mut start = today - Duration::days(WINDOW_DAYS - 1);

        let span = (today - start).num_days() + 1;
        if span != WINDOW_DAYS {
            start -= Duration::days(WINDOW_DAYS - span);
        }

        Self { start, end: today }
    }

    /// Number of days covered (inclusive)
    pub fn len(&self) -> usize {
        ((self.end - self.start).num_days() + 1).max(0) as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }

    /// All dates in the window, oldest first
    pub fn dates(&self) -> Vec<NaiveDate> {
        self.start.iter_days().take(self.len()).collect()
    }
}

/// Ordered sequence of the last `WINDOW_DAYS` dates ending on `today`
pub fn generate(today: NaiveDate) -> Vec<NaiveDate> {
    DateWindow::ending(today).dates()
}

/// Boundary used for "since" queries: the same instant one year earlier.
///
/// Falls back to `WINDOW_DAYS` days earlier when the month arithmetic is not
/// representable.
pub fn trailing_year_start(now: DateTime<Utc>) -> DateTime<Utc> {
    now.checked_sub_months(Months::new(12))
        .unwrap_or_else(|| now - Duration::days(WINDOW_DAYS))
}
