//! Contribution heatmap page build
//!
//! One call per page build: window -> sources (cached) -> merge -> grid + stats.
//! There is no fatal state. A source that fails contributes nothing and moves
//! the load to `PartialFailure`; the grid is still fully rendered.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::buckets::{DayBuckets, TaggedCounts};
use crate::cache::TtlCache;
use crate::clock::Clock;
use crate::config::ContributionsConfig;
use crate::dates::DateWindow;
use crate::grid::{build_grid, HeatmapGrid};
use crate::http::HttpClient;
use crate::sources::github::{GithubSource, DEFAULT_API_BASE};
use crate::sources::{collect_reports, SourceReport};
use crate::stats::{aggregate_stats, StatsSummary};
use crate::throttle::Pacer;

/// Heatmap widget lifecycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoadState {
    #[default]
    Idle,
    Loading,
    /// Every enabled source answered
    Success,
    /// At least one source degraded; counts are partial
    PartialFailure,
}

impl LoadState {
    /// Terminal state once all sources have reported
    pub fn settle(reports: &[SourceReport]) -> LoadState {
        if reports.iter().any(|r| r.status.is_degraded()) {
            LoadState::PartialFailure
        } else {
            LoadState::Success
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, LoadState::Success | LoadState::PartialFailure)
    }
}

/// Collaborators for one page build
pub struct LoadContext<'a> {
    pub client: &'a dyn HttpClient,
    pub pacer: &'a dyn Pacer,
    pub clock: &'a dyn Clock,
    /// `None` disables caching entirely
    pub cache: Option<TtlCache<'a>>,
    pub github_api: String,
}

impl<'a> LoadContext<'a> {
    pub fn new(client: &'a dyn HttpClient, pacer: &'a dyn Pacer, clock: &'a dyn Clock) -> Self {
        Self {
            client,
            pacer,
            clock,
            cache: None,
            github_api: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_cache(mut self, cache: TtlCache<'a>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_github_api(mut self, api_base: impl Into<String>) -> Self {
        self.github_api = api_base.into();
        self
    }
}

/// Everything the heatmap widget renders
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionsView {
    pub state: LoadState,
    pub generated_at: DateTime<Utc>,
    pub window: DateWindow,
    pub sources: Vec<SourceReport>,
    /// Per-source counts before merging
    #[serde(skip_serializing_if = "TaggedCounts::is_empty")]
    pub counts: TaggedCounts,
    pub buckets: DayBuckets,
    pub grid: HeatmapGrid,
    pub stats: StatsSummary,
}

impl ContributionsView {
    pub fn degraded_sources(&self) -> impl Iterator<Item = &SourceReport> {
        self.sources.iter().filter(|r| r.status.is_degraded())
    }
}

/// Build the heatmap view for `config`
pub fn load_contributions(config: &ContributionsConfig, ctx: &LoadContext<'_>) -> ContributionsView {
    let mut state = LoadState::Idle;
    let now = ctx.clock.now();
    let window = DateWindow::ending(now.date_naive());

    state = transition(state, LoadState::Loading);

    let mut sources = Vec::new();
    match config.github_username() {
        Some(username) => {
            let github = GithubSource::with_api_base(ctx.client, ctx.pacer, ctx.github_api.as_str());
            sources.extend(github.fetch_contributions(username, now, ctx.cache.as_ref()));
        }
        None => debug!("GitHub disabled; heatmap has no live sources"),
    }

    let counts = collect_reports(&sources);
    let buckets = counts.merged();
    let grid = build_grid(&window.dates(), &buckets);
    let stats = aggregate_stats(config, &buckets);

    state = transition(state, LoadState::settle(&sources));
    for report in sources.iter().filter(|r| r.status.is_degraded()) {
        warn!("{} counts are partial", report.tag);
    }
    info!(
        "heatmap {} .. {}: {} contributions on {} days",
        window.start,
        window.end,
        buckets.total(),
        buckets.len()
    );

    ContributionsView {
        state,
        generated_at: now,
        window,
        sources,
        counts,
        buckets,
        grid,
        stats,
    }
}

fn transition(from: LoadState, to: LoadState) -> LoadState {
    debug!("contributions: {:?} -> {:?}", from, to);
    to
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::clock::FixedClock;
    use crate::config::SourceConfig;
    use crate::http::{HttpResponse, ScriptedClient};
    use crate::throttle::NoDelay;
    use chrono::TimeZone;

    const API: &str = "https://api.test";

    fn clock() -> FixedClock {
        FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 2, 18, 0, 0).unwrap())
    }

    fn alice() -> ContributionsConfig {
        ContributionsConfig {
            github: Some(SourceConfig::enabled("alice")),
            ..Default::default()
        }
    }

    #[test]
    fn test_disabled_github_succeeds_with_empty_grid() {
        let client = ScriptedClient::new();
        let clock = clock();
        let ctx = LoadContext::new(&client, &NoDelay, &clock).with_github_api(API);

        let view = load_contributions(&ContributionsConfig::default(), &ctx);
        assert_eq!(view.state, LoadState::Success);
        assert!(view.buckets.is_empty());
        assert_eq!(view.grid.days().count(), 365);
        assert!(client.requests().is_empty());
    }

    #[test]
    fn test_unreachable_api_is_partial_failure_not_fatal() {
        let client = ScriptedClient::new();
        let clock = clock();
        let ctx = LoadContext::new(&client, &NoDelay, &clock).with_github_api(API);

        let view = load_contributions(&alice(), &ctx);
        assert_eq!(view.state, LoadState::PartialFailure);
        assert!(view.state.is_terminal());
        assert_eq!(view.degraded_sources().count(), 2);
        assert_eq!(view.stats.commits, 0);
    }

    #[test]
    fn test_second_load_served_from_cache() {
        let client = ScriptedClient::new()
            .respond(
                format!("{API}/users/alice/events/public?per_page=100&page=1"),
                HttpResponse::ok(r#"[{"type": "IssuesEvent", "created_at": "2024-03-02T09:00:00Z"}]"#),
            )
            .respond(
                format!("{API}/users/alice/events/public?per_page=100&page=2"),
                HttpResponse::ok("[]"),
            )
            .respond(
                format!("{API}/users/alice/repos?per_page=10&sort=updated"),
                HttpResponse::ok("[]"),
            );
        let clock = clock();
        let store = MemoryStore::new();
        let ctx = LoadContext::new(&client, &NoDelay, &clock)
            .with_github_api(API)
            .with_cache(TtlCache::new(&store, &clock));

        let first = load_contributions(&alice(), &ctx);
        let requests = client.requests().len();
        let second = load_contributions(&alice(), &ctx);

        assert_eq!(first.buckets, second.buckets);
        assert_eq!(client.requests().len(), requests, "no new requests on a warm cache");
        assert_eq!(store.len(), 2);
    }
}
