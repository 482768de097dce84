//! Pulse core library - contribution heatmaps, activity stats, project cards, blog metadata and content sections for a static portfolio site

#![deny(warnings)]

// Global invariants enforced in this crate:
// - Upstream failures never abort a page build; they degrade to empty counts
// - Time, HTTP, cache storage and pacing are injected, never ambient
// - Date keys are UTC calendar days
// - Merging is additive; per-source counts stay tagged

pub mod blog;
pub mod buckets;
pub mod cache;
pub mod cards;
pub mod clock;
pub mod config;
pub mod content;
pub mod contributions;
pub mod dates;
pub mod grid;
pub mod html;
pub mod http;
pub mod level;
pub mod prefetch;
pub mod sources;
pub mod stats;
pub mod throttle;

pub use buckets::{DayBuckets, SourceTag, TaggedCounts};
pub use cache::{cache_key, CacheStore, FileStore, MemoryStore, TtlCache};
pub use clock::{Clock, FixedClock, SystemClock};
pub use config::SiteConfig;
pub use content::{ContentKind, ContentLoader};
pub use contributions::{load_contributions, ContributionsView, LoadContext, LoadState};
pub use dates::DateWindow;
pub use grid::{build_grid, HeatmapGrid};
pub use http::{FetchError, HttpClient, ReqwestClient};
pub use level::ContributionLevel;
pub use sources::{SourceReport, SourceStatus};
pub use stats::{aggregate_stats, StatsSummary};
pub use throttle::{FixedDelay, NoDelay, Pacer};
