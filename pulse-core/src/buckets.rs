//! Day-bucketed contribution counts
//!
//! A [`DayBuckets`] maps calendar dates to counts. Counts from different sources
//! are kept apart in [`TaggedCounts`] and only summed on demand, so a stricter
//! merge (e.g. dedup by commit SHA) can be added without changing the shape
//! callers see.
//!
//! Merging is additive: a commit that appears both as a push event and in
//! commit history is counted twice. This inflates busy days slightly and is
//! accepted for a visual heatmap.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Date → contribution count, ordered by date
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DayBuckets(BTreeMap<NaiveDate, u64>);

impl DayBuckets {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `amount` to the bucket for `date`
    pub fn add(&mut self, date: NaiveDate, amount: u64) {
        if amount == 0 {
            return;
        }
        let slot = self.0.entry(date).or_insert(0);
        *slot = slot.saturating_add(amount);
    }

    /// Count for `date`, 0 when absent
    pub fn get(&self, date: NaiveDate) -> u64 {
        self.0.get(&date).copied().unwrap_or(0)
    }

    /// Sum `other` into `self`
    pub fn merge_from(&mut self, other: &DayBuckets) {
        for (date, count) in &other.0 {
            self.add(*date, *count);
        }
    }

    /// Sum of every bucket
    pub fn total(&self) -> u64 {
        self.0.values().fold(0u64, |acc, c| acc.saturating_add(*c))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (NaiveDate, u64)> + '_ {
        self.0.iter().map(|(d, c)| (*d, *c))
    }
}

impl FromIterator<(NaiveDate, u64)> for DayBuckets {
    fn from_iter<I: IntoIterator<Item = (NaiveDate, u64)>>(iter: I) -> Self {
        let mut buckets = DayBuckets::new();
        for (date, count) in iter {
            buckets.add(date, count);
        }
        buckets
    }
}

/// Upstream that produced a set of counts
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceTag {
    /// Public events feed (recent activity, push events weighted by size)
    Events,
    /// Per-repository commit history
    CommitHistory,
}

impl SourceTag {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceTag::Events => "events",
            SourceTag::CommitHistory => "commit_history",
        }
    }
}

impl fmt::Display for SourceTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-source counts, merged additively on demand
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaggedCounts {
    pub by_source: BTreeMap<SourceTag, DayBuckets>,
}

impl TaggedCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record counts for `tag`, summing into anything already recorded for it
    pub fn insert(&mut self, tag: SourceTag, buckets: DayBuckets) {
        self.by_source.entry(tag).or_default().merge_from(&buckets);
    }

    pub fn get(&self, tag: SourceTag) -> Option<&DayBuckets> {
        self.by_source.get(&tag)
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }

    /// Additive merge across all sources
    pub fn merged(&self) -> DayBuckets {
        let mut merged = DayBuckets::new();
        for buckets in self.by_source.values() {
            merged.merge_from(buckets);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_merge_is_additive_across_sources() {
        let mut counts = TaggedCounts::new();
        counts.insert(
            SourceTag::Events,
            [(date("2024-01-01"), 2)].into_iter().collect(),
        );
        counts.insert(
            SourceTag::CommitHistory,
            [(date("2024-01-01"), 3)].into_iter().collect(),
        );

        let merged = counts.merged();
        assert_eq!(merged.get(date("2024-01-01")), 5);
        assert_eq!(merged.len(), 1);
    }

    #[test]
    fn test_sub_counts_stay_tagged() {
        let mut counts = TaggedCounts::new();
        counts.insert(
            SourceTag::Events,
            [(date("2024-01-01"), 2)].into_iter().collect(),
        );
        assert_eq!(
            counts.get(SourceTag::Events).unwrap().get(date("2024-01-01")),
            2
        );
        assert!(counts.get(SourceTag::CommitHistory).is_none());
    }

    #[test]
    fn test_zero_amount_creates_no_bucket() {
        let mut buckets = DayBuckets::new();
        buckets.add(date("2024-01-01"), 0);
        assert!(buckets.is_empty());
        assert_eq!(buckets.get(date("2024-01-01")), 0);
    }

    #[test]
    fn test_serializes_with_iso_keys() {
        let buckets: DayBuckets = [(date("2024-03-01"), 4), (date("2024-03-02"), 1)]
            .into_iter()
            .collect();
        let json = serde_json::to_string(&buckets).unwrap();
        assert_eq!(json, r#"{"2024-03-01":4,"2024-03-02":1}"#);

        let back: DayBuckets = serde_json::from_str(&json).unwrap();
        assert_eq!(back.total(), 5);
    }
}
