//! GitHub activity: public events feed and per-repository commit history
//!
//! Two independent strategies, merged additively:
//!
//! 1. **Events feed**: cheap and detailed, but GitHub only serves the last
//!    ~300 events / 90 days. Push events are weighted by their commit count.
//! 2. **Commit history**: fills in older days by listing the most recently
//!    updated repositories and fetching one page of the user's commits from each.
//!    Capped at `REPO_LIMIT` repositories and `COMMITS_PER_REPO` commits per
//!    repository to keep the unauthenticated request count low.
//!
//! Both run concurrently; repository queries inside strategy 2 run sequentially
//! through a [`ThrottledQueue`].

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use serde::Deserialize;
use tracing::{debug, info};

use super::{cached_report, log_fetch_failure, source_cache_key, SourceReport};
use crate::buckets::{DayBuckets, SourceTag};
use crate::cache::TtlCache;
use crate::dates::trailing_year_start;
use crate::http::{get_json, HttpClient};
use crate::throttle::{Pacer, ThrottledQueue};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";

/// GitHub serves at most 3 pages of 100 public events
pub const EVENTS_MAX_PAGES: u32 = 3;
pub const EVENTS_PER_PAGE: u32 = 100;
/// Most recently updated repositories scanned for commit history
pub const REPO_LIMIT: usize = 10;
pub const COMMITS_PER_REPO: u32 = 100;

/// Provider prefix for cache keys
pub const PROVIDER: &str = "github";

#[derive(Debug, Deserialize)]
struct Event {
    #[serde(rename = "type")]
    kind: Option<String>,
    created_at: Option<String>,
    #[serde(default)]
    payload: Option<EventPayload>,
}

#[derive(Debug, Deserialize)]
struct EventPayload {
    size: Option<u64>,
}

impl Event {
    /// Date and weight of this event, if it has a usable timestamp
    fn contribution(&self) -> Option<(NaiveDate, u64)> {
        let date = parse_day(self.created_at.as_deref()?)?;
        let weight = if self.kind.as_deref() == Some("PushEvent") {
            self.payload
                .as_ref()
                .and_then(|p| p.size)
                .filter(|size| *size > 0)
                .unwrap_or(1)
        } else {
            1
        };
        Some((date, weight))
    }
}

#[derive(Debug, Deserialize)]
struct Repo {
    full_name: String,
    pushed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    commit: Option<CommitDetail>,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    author: Option<CommitAuthor>,
}

#[derive(Debug, Deserialize)]
struct CommitAuthor {
    date: Option<String>,
}

impl CommitEntry {
    fn day(&self) -> Option<NaiveDate> {
        parse_day(self.commit.as_ref()?.author.as_ref()?.date.as_deref()?)
    }
}

/// UTC calendar day of an ISO-8601 timestamp
fn parse_day(timestamp: &str) -> Option<NaiveDate> {
    if let Ok(parsed) = DateTime::parse_from_rfc3339(timestamp) {
        return Some(parsed.with_timezone(&Utc).date_naive());
    }
    let day = timestamp.split('T').next()?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

/// GitHub REST source for one deployment (API base, client, pacing)
pub struct GithubSource<'a> {
    client: &'a dyn HttpClient,
    pacer: &'a dyn Pacer,
    api_base: String,
}

impl<'a> GithubSource<'a> {
    pub fn new(client: &'a dyn HttpClient, pacer: &'a dyn Pacer) -> Self {
        Self::with_api_base(client, pacer, DEFAULT_API_BASE)
    }

    pub fn with_api_base(
        client: &'a dyn HttpClient,
        pacer: &'a dyn Pacer,
        api_base: impl Into<String>,
    ) -> Self {
        Self {
            client,
            pacer,
            api_base: api_base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn events_url(&self, username: &str, page: u32) -> String {
        format!(
            "{}/users/{}/events/public?per_page={}&page={}",
            self.api_base, username, EVENTS_PER_PAGE, page
        )
    }

    pub fn repos_url(&self, username: &str) -> String {
        format!(
            "{}/users/{}/repos?per_page={}&sort=updated",
            self.api_base, username, REPO_LIMIT
        )
    }

    pub fn commits_url(&self, full_name: &str, username: &str, since: DateTime<Utc>) -> String {
        format!(
            "{}/repos/{}/commits?author={}&since={}&per_page={}",
            self.api_base,
            full_name,
            username,
            since.to_rfc3339_opts(SecondsFormat::Secs, true),
            COMMITS_PER_REPO
        )
    }

    /// Counts from the public events feed.
    ///
    /// Pages until an empty page, a failed request, or `EVENTS_MAX_PAGES`.
    pub fn fetch_events(&self, username: &str) -> SourceReport {
        let mut buckets = DayBuckets::new();

        for page in 1..=EVENTS_MAX_PAGES {
            let url = self.events_url(username, page);
            let events: Vec<Event> = match get_json(self.client, &url, None) {
                Ok(events) => events,
                Err(e) => {
                    let reason = log_fetch_failure(&format!("public events page {page}"), &e);
                    return SourceReport::degraded(SourceTag::Events, buckets, reason);
                }
            };

            if events.is_empty() {
                break;
            }
            for (date, weight) in events.iter().filter_map(Event::contribution) {
                buckets.add(date, weight);
            }
            debug!("events page {page}: {} events", events.len());
        }

        SourceReport::complete(SourceTag::Events, buckets)
    }

    /// Counts from the commit history of recently pushed repositories.
    ///
    /// Repositories not pushed since `since`, or with no push time at all, are
    /// skipped. A failing repository
    /// is logged and does not stop the others.
    pub fn fetch_commit_history(&self, username: &str, since: DateTime<Utc>) -> SourceReport {
        let url = self.repos_url(username);
        let repos: Vec<Repo> = match get_json(self.client, &url, None) {
            Ok(repos) => repos,
            Err(e) => {
                let reason = log_fetch_failure("repositories", &e);
                return SourceReport::degraded(SourceTag::CommitHistory, DayBuckets::new(), reason);
            }
        };

        let active: Vec<&Repo> = repos
            .iter()
            .take(REPO_LIMIT)
            .filter(|repo| repo.pushed_at.is_some_and(|pushed| pushed >= since))
            .collect();
        debug!(
            "{} of {} repositories pushed since {}",
            active.len(),
            repos.len(),
            since.date_naive()
        );

        let mut buckets = DayBuckets::new();
        let mut failures = Vec::new();
        ThrottledQueue::new(self.pacer).run(active, |repo| {
            let url = self.commits_url(&repo.full_name, username, since);
            match get_json::<Vec<CommitEntry>>(self.client, &url, None) {
                Ok(commits) => {
                    for day in commits.iter().filter_map(CommitEntry::day) {
                        buckets.add(day, 1);
                    }
                }
                Err(e) => {
                    failures.push(log_fetch_failure(
                        &format!("commits for {}", repo.full_name),
                        &e,
                    ));
                }
            }
        });

        if failures.is_empty() {
            SourceReport::complete(SourceTag::CommitHistory, buckets)
        } else {
            SourceReport::degraded(SourceTag::CommitHistory, buckets, failures.join("; "))
        }
    }

    /// Both strategies for `username`, concurrently, each behind the TTL cache
    pub fn fetch_contributions(
        &self,
        username: &str,
        now: DateTime<Utc>,
        cache: Option<&TtlCache<'_>>,
    ) -> Vec<SourceReport> {
        let since = trailing_year_start(now);
        let events_key = source_cache_key(PROVIDER, SourceTag::Events, username);
        let history_key = source_cache_key(PROVIDER, SourceTag::CommitHistory, username);

        let (events, history) = rayon::join(
            || {
                cached_report(cache, &events_key, SourceTag::Events, || {
                    self.fetch_events(username)
                })
            },
            || {
                cached_report(cache, &history_key, SourceTag::CommitHistory, || {
                    self.fetch_commit_history(username, since)
                })
            },
        );

        info!(
            "GitHub contributions for {username}: {} from events ({:?}), {} from commit history ({:?})",
            events.buckets.total(),
            events.status,
            history.buckets.total(),
            history.status
        );
        vec![events, history]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::{HttpResponse, ScriptedClient};
    use crate::throttle::{CountingPacer, NoDelay};
    use chrono::TimeZone;

    const API: &str = "https://api.test";

    fn day(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn since() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 3, 10, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_push_events_weighted_by_size() {
        let events = r#"[
            {"type": "PushEvent", "created_at": "2024-03-01T12:00:00Z", "payload": {"size": 4}},
            {"type": "PushEvent", "created_at": "2024-03-01T13:00:00Z", "payload": {"size": 0}},
            {"type": "IssuesEvent", "created_at": "2024-03-02T09:00:00Z", "payload": {}},
            {"type": "WatchEvent"}
        ]"#;
        let client = ScriptedClient::new()
            .respond(
                format!("{API}/users/alice/events/public?per_page=100&page=1"),
                HttpResponse::ok(events),
            )
            .respond(
                format!("{API}/users/alice/events/public?per_page=100&page=2"),
                HttpResponse::ok("[]"),
            );
        let source = GithubSource::with_api_base(&client, &NoDelay, API);

        let report = source.fetch_events("alice");
        assert_eq!(report.status, crate::sources::SourceStatus::Complete);
        assert_eq!(report.buckets.get(day("2024-03-01")), 5);
        assert_eq!(report.buckets.get(day("2024-03-02")), 1);
        assert_eq!(client.requests().len(), 2, "stops at the first empty page");
    }

    #[test]
    fn test_events_stop_after_max_pages() {
        let page = r#"[{"type": "CreateEvent", "created_at": "2024-03-01T00:00:00Z"}]"#;
        let mut client = ScriptedClient::new();
        for n in 1..=4 {
            client = client.respond(
                format!("{API}/users/alice/events/public?per_page=100&page={n}"),
                HttpResponse::ok(page),
            );
        }
        let source = GithubSource::with_api_base(&client, &NoDelay, API);

        let report = source.fetch_events("alice");
        assert_eq!(report.buckets.get(day("2024-03-01")), 3);
        assert_eq!(client.requests().len(), EVENTS_MAX_PAGES as usize);
    }

    #[test]
    fn test_rate_limited_events_degrade_to_partial_data() {
        let mut limited = HttpResponse::with_status(403, r#"{"message":"rate limit"}"#);
        limited.rate_limit_remaining = Some(0);
        let client = ScriptedClient::new()
            .respond(
                format!("{API}/users/alice/events/public?per_page=100&page=1"),
                HttpResponse::ok(r#"[{"type": "ForkEvent", "created_at": "2024-01-05T10:00:00Z"}]"#),
            )
            .respond(
                format!("{API}/users/alice/events/public?per_page=100&page=2"),
                limited,
            );
        let source = GithubSource::with_api_base(&client, &NoDelay, API);

        let report = source.fetch_events("alice");
        assert!(report.status.is_degraded());
        assert_eq!(report.buckets.total(), 1, "keeps data from earlier pages");
    }

    #[test]
    fn test_commit_history_skips_stale_repos_and_survives_failures() {
        let repos = r#"[
            {"full_name": "alice/fresh", "pushed_at": "2024-02-01T00:00:00Z"},
            {"full_name": "alice/stale", "pushed_at": "2022-01-01T00:00:00Z"},
            {"full_name": "alice/broken", "pushed_at": "2024-01-01T00:00:00Z"},
            {"full_name": "alice/unknown", "pushed_at": null}
        ]"#;
        let commits = r#"[
            {"commit": {"author": {"date": "2024-01-15T08:00:00Z"}}},
            {"commit": {"author": {"date": "2024-01-15T20:00:00Z"}}},
            {"commit": {"author": null}}
        ]"#;
        let client = ScriptedClient::new()
            .respond(
                format!("{API}/users/alice/repos?per_page=10&sort=updated"),
                HttpResponse::ok(repos),
            )
            .respond(
                format!("{API}/repos/alice/fresh/commits?author=alice&since=2023-03-10T00:00:00Z&per_page=100"),
                HttpResponse::ok(commits),
            )
            .fail(
                format!("{API}/repos/alice/broken/commits?author=alice&since=2023-03-10T00:00:00Z&per_page=100"),
                "connection reset",
            )
            .respond(
                format!("{API}/repos/alice/unknown/commits?author=alice&since=2023-03-10T00:00:00Z&per_page=100"),
                HttpResponse::ok(r#"[{"commit": {"author": {"date": "2024-01-16T08:00:00Z"}}}]"#),
            );
        let pacer = CountingPacer::default();
        let source = GithubSource::with_api_base(&client, &pacer, API);

        let report = source.fetch_commit_history("alice", since());

        assert!(report.status.is_degraded());
        assert_eq!(report.buckets.get(day("2024-01-15")), 2);
        assert_eq!(report.buckets.get(day("2024-01-16")), 0);
        let requests = client.requests();
        assert!(!requests.iter().any(|url| url.contains("alice/stale/commits")));
        assert!(
            !requests.iter().any(|url| url.contains("alice/unknown/commits")),
            "never-pushed repositories are not queried"
        );
        assert_eq!(pacer.pauses(), 1, "pause between the two queried repos");
    }

    #[test]
    fn test_repository_list_failure_yields_empty_report() {
        let client = ScriptedClient::new();
        let source = GithubSource::with_api_base(&client, &NoDelay, API);

        let report = source.fetch_commit_history("alice", since());
        assert!(report.buckets.is_empty());
        assert!(report.status.is_degraded());
    }

    #[test]
    fn test_parse_day_accepts_offsets_and_bare_dates() {
        assert_eq!(parse_day("2024-03-01T23:30:00-02:00"), Some(day("2024-03-02")));
        assert_eq!(parse_day("2024-03-01"), Some(day("2024-03-01")));
        assert_eq!(parse_day("garbage"), None);
    }
}
