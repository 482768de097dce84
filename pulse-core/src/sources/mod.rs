//! Upstream activity sources
//!
//! Every source returns a [`SourceReport`] instead of an error: failures are
//! logged where they happen and the source contributes whatever it managed to
//! collect (often nothing). The report's [`SourceStatus`] keeps "degraded"
//! distinguishable from "genuinely zero activity" for callers that care.

pub mod github;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::buckets::{DayBuckets, SourceTag, TaggedCounts};
use crate::cache::{cache_key, TtlCache};
use crate::http::FetchError;

pub use github::GithubSource;

/// How a source run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SourceStatus {
    /// Every query succeeded
    Complete,
    /// Served from the TTL cache
    Cached,
    /// Some or all queries failed; counts are partial
    Degraded { reason: String },
}

impl SourceStatus {
    pub fn is_degraded(&self) -> bool {
        matches!(self, SourceStatus::Degraded { .. })
    }
}

/// Counts collected by one source for one identity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceReport {
    pub tag: SourceTag,
    pub buckets: DayBuckets,
    #[serde(flatten)]
    pub status: SourceStatus,
}

impl SourceReport {
    pub fn complete(tag: SourceTag, buckets: DayBuckets) -> Self {
        Self {
            tag,
            buckets,
            status: SourceStatus::Complete,
        }
    }

    pub fn degraded(tag: SourceTag, buckets: DayBuckets, reason: impl Into<String>) -> Self {
        Self {
            tag,
            buckets,
            status: SourceStatus::Degraded {
                reason: reason.into(),
            },
        }
    }
}

/// Fold reports into source-tagged counts (additive, no dedup)
pub fn collect_reports(reports: &[SourceReport]) -> TaggedCounts {
    let mut counts = TaggedCounts::new();
    for report in reports {
        counts.insert(report.tag, report.buckets.clone());
    }
    counts
}

/// Cache key for a source's counts for one identity
pub fn source_cache_key(provider: &str, tag: SourceTag, identity: &str) -> String {
    cache_key(&format!("{provider}_{tag}"), identity)
}

/// Serve `tag` for `identity` from cache, or run `fetch` and write back on success.
///
/// Degraded results are not cached so the next load retries the upstream.
pub fn cached_report<F>(
    cache: Option<&TtlCache<'_>>,
    key: &str,
    tag: SourceTag,
    fetch: F,
) -> SourceReport
where
    F: FnOnce() -> SourceReport,
{
    if let Some(cache) = cache {
        if let Some(buckets) = cache.get::<DayBuckets>(key) {
            return SourceReport {
                tag,
                buckets,
                status: SourceStatus::Cached,
            };
        }
    }

    let report = fetch();
    if let Some(cache) = cache {
        if report.status == SourceStatus::Complete {
            cache.set(key, &report.buckets);
        }
    }
    report
}

/// Log a failed upstream query, keeping rate limiting distinct from other failures
pub(crate) fn log_fetch_failure(what: &str, err: &FetchError) -> String {
    if err.is_rate_limited() {
        warn!("GitHub API rate limit exceeded while fetching {what}");
        format!("rate limited while fetching {what}")
    } else {
        warn!("error fetching {what}: {err}");
        format!("failed to fetch {what}: {err}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::clock::FixedClock;
    use chrono::{NaiveDate, TimeZone, Utc};
    use std::cell::Cell;

    fn buckets() -> DayBuckets {
        [(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(), 2)]
            .into_iter()
            .collect()
    }

    #[test]
    fn test_cached_report_writes_back_complete_results() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        let cache = TtlCache::new(&store, &clock);
        let calls = Cell::new(0);

        for _ in 0..2 {
            let report = cached_report(Some(&cache), "k", SourceTag::Events, || {
                calls.set(calls.get() + 1);
                SourceReport::complete(SourceTag::Events, buckets())
            });
            assert_eq!(report.buckets, buckets());
        }
        assert_eq!(calls.get(), 1, "second load should be served from cache");
    }

    #[test]
    fn test_cached_report_skips_degraded_results() {
        let store = MemoryStore::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        let cache = TtlCache::new(&store, &clock);

        let report = cached_report(Some(&cache), "k", SourceTag::Events, || {
            SourceReport::degraded(SourceTag::Events, DayBuckets::new(), "rate limited")
        });
        assert!(report.status.is_degraded());
        assert!(store.is_empty());
    }

    #[test]
    fn test_source_cache_key_separates_sources() {
        assert_eq!(
            source_cache_key("github", SourceTag::Events, "alice"),
            "github_events.alice"
        );
        assert_ne!(
            source_cache_key("github", SourceTag::Events, "alice"),
            source_cache_key("github", SourceTag::CommitHistory, "alice")
        );
    }
}
