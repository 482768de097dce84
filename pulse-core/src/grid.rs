//! Calendar grid layout for the contribution heatmap
//!
//! Lays the date window out as week rows (Sunday first), pads the partial
//! first and last weeks, places month labels, and tags every real day with its
//! count, intensity level and hover text.
//!
//! Global invariants enforced:
//! - Every week row has exactly 7 slots
//! - Non-padding slots, read in order, reproduce the input dates exactly
//! - Each (year, month) gets at most one marker; the earliest week wins

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::buckets::DayBuckets;
use crate::level::ContributionLevel;

pub const DAYS_PER_WEEK: usize = 7;

/// A real day on the heatmap
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayCell {
    pub date: NaiveDate,
    pub count: u64,
    pub level: ContributionLevel,
    pub tooltip: String,
}

/// One slot of a week row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Cell {
    /// Before the first or after the last date; rendered empty and inert
    #[default]
    Padding,
    Day(DayCell),
}

impl Cell {
    pub fn as_day(&self) -> Option<&DayCell> {
        match self {
            Cell::Day(day) => Some(day),
            Cell::Padding => None,
        }
    }
}

/// Sunday..Saturday
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekRow {
    pub cells: [Cell; DAYS_PER_WEEK],
}

impl WeekRow {
    pub fn days(&self) -> impl Iterator<Item = &DayCell> {
        self.cells.iter().filter_map(Cell::as_day)
    }
}

/// Header label placed above the first week containing the 1st of a month
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthMarker {
    pub week_index: usize,
    pub label: String,
}

/// Complete visual model of the heatmap
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapGrid {
    pub weeks: Vec<WeekRow>,
    pub months: Vec<MonthMarker>,
    /// One entry per week: the month label to show above it, or `""`
    pub month_row: Vec<String>,
}

impl HeatmapGrid {
    /// All real days in chronological order
    pub fn days(&self) -> impl Iterator<Item = &DayCell> {
        self.weeks.iter().flat_map(WeekRow::days)
    }
}

/// Hover text, e.g. `2024-03-01: 1 contribution`
pub fn tooltip(date: NaiveDate, count: u64) -> String {
    let noun = if count == 1 {
        "contribution"
    } else {
        "contributions"
    };
    format!("{}: {} {}", date.format("%Y-%m-%d"), count, noun)
}

/// Lay out `dates` (ascending, consecutive) as a Sunday-first week grid
pub fn build_grid(dates: &[NaiveDate], buckets: &DayBuckets) -> HeatmapGrid {
    let Some(first) = dates.first() else {
        return HeatmapGrid::default();
    };
    let lead = first.weekday().num_days_from_sunday() as usize;

    let mut weeks = Vec::with_capacity((lead + dates.len()).div_ceil(DAYS_PER_WEEK));
    let mut current = WeekRow::default();
    let mut slot = lead;

    for &date in dates {
        let count = buckets.get(date);
        current.cells[slot] = Cell::Day(DayCell {
            date,
            count,
            level: ContributionLevel::classify(count),
            tooltip: tooltip(date, count),
        });
        slot += 1;
        if slot == DAYS_PER_WEEK {
            weeks.push(std::mem::take(&mut current));
            slot = 0;
        }
    }
    if slot > 0 {
        weeks.push(current);
    }

    let months = month_markers(dates, lead);
    let mut month_row = vec![String::new(); weeks.len()];
    for marker in &months {
        if let Some(label) = month_row.get_mut(marker.week_index) {
            if label.is_empty() {
                *label = marker.label.clone();
            }
        }
    }

    HeatmapGrid {
        weeks,
        months,
        month_row,
    }
}

/// Markers for every month whose first day falls inside `dates`
fn month_markers(dates: &[NaiveDate], lead: usize) -> Vec<MonthMarker> {
    let mut seen = BTreeSet::new();
    let mut markers = Vec::new();

    for (index, date) in dates.iter().enumerate() {
        if date.day() != 1 {
            continue;
        }
        if seen.insert((date.year(), date.month())) {
            markers.push(MonthMarker {
                week_index: (index + lead) / DAYS_PER_WEEK,
                label: date.format("%b").to_string(),
            });
        }
    }
    markers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dates::generate;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_rows_have_seven_slots_and_preserve_dates() {
        let dates = generate(date(2024, 3, 1));
        let grid = build_grid(&dates, &DayBuckets::new());

        assert!(grid.weeks.iter().all(|w| w.cells.len() == DAYS_PER_WEEK));
        let laid_out: Vec<NaiveDate> = grid.days().map(|d| d.date).collect();
        assert_eq!(laid_out, dates);
    }

    #[test]
    fn test_first_week_is_left_padded_to_weekday() {
        // 2023-03-03 is a Friday
        let dates = generate(date(2024, 3, 1));
        assert_eq!(dates[0], date(2023, 3, 3));
        let grid = build_grid(&dates, &DayBuckets::new());

        let first = &grid.weeks[0];
        assert!(first.cells[..5].iter().all(|c| *c == Cell::Padding));
        assert_eq!(first.cells[5].as_day().unwrap().date, date(2023, 3, 3));

        // 2024-03-01 is a Friday too: last row ends with one padding slot
        let last = grid.weeks.last().unwrap();
        assert_eq!(last.cells[5].as_day().unwrap().date, date(2024, 3, 1));
        assert_eq!(last.cells[6], Cell::Padding);
        assert_eq!(grid.weeks.len(), 53);
    }

    #[test]
    fn test_month_markers_point_at_week_containing_first_day() {
        let dates = generate(date(2024, 3, 1));
        let grid = build_grid(&dates, &DayBuckets::new());

        // Apr 2023 .. Mar 2024: twelve month starts inside the window
        assert_eq!(grid.months.len(), 12);
        assert_eq!(grid.months[0].label, "Apr");
        assert_eq!(grid.months.last().unwrap().label, "Mar");

        for marker in &grid.months {
            let week = &grid.weeks[marker.week_index];
            assert!(week
                .days()
                .any(|d| d.date.day() == 1 && d.date.format("%b").to_string() == marker.label));
            assert_eq!(grid.month_row[marker.week_index], marker.label);
        }
        assert_eq!(grid.month_row.len(), grid.weeks.len());
    }

    #[test]
    fn test_cells_carry_level_and_tooltip() {
        let dates = generate(date(2024, 3, 2));
        let buckets: DayBuckets = [(date(2024, 3, 1), 4), (date(2024, 3, 2), 1)]
            .into_iter()
            .collect();
        let grid = build_grid(&dates, &buckets);

        let march_first = grid.days().find(|d| d.date == date(2024, 3, 1)).unwrap();
        assert_eq!(march_first.count, 4);
        assert_eq!(march_first.level.value(), 3);
        assert_eq!(march_first.tooltip, "2024-03-01: 4 contributions");

        let march_second = grid.days().find(|d| d.date == date(2024, 3, 2)).unwrap();
        assert_eq!(march_second.tooltip, "2024-03-02: 1 contribution");

        let quiet = grid.days().next().unwrap();
        assert_eq!(quiet.level, ContributionLevel::NONE);
        assert!(quiet.tooltip.ends_with(": 0 contributions"));
    }

    #[test]
    fn test_empty_input() {
        let grid = build_grid(&[], &DayBuckets::new());
        assert!(grid.weeks.is_empty());
        assert!(grid.months.is_empty());
    }

    #[test]
    fn test_sunday_start_needs_no_lead_padding() {
        // 2024-01-07 is a Sunday
        let dates: Vec<NaiveDate> = date(2024, 1, 7).iter_days().take(7).collect();
        let grid = build_grid(&dates, &DayBuckets::new());
        assert_eq!(grid.weeks.len(), 1);
        assert!(grid.weeks[0].cells.iter().all(|c| c.as_day().is_some()));
    }
}
