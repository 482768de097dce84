//! Ahead-of-time totals for the stats panel
//!
//! The live heatmap only sees the last few hundred public events, so exact
//! totals are fetched separately (usually from CI, where tokens are available)
//! and stored as `stats.json`. Every provider is independent: a failure or a
//! missing token yields zeros for that provider only.

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::{json, Value};
use std::path::Path;
use tracing::{info, warn};

use crate::cards::DEFAULT_HF_BASE;
use crate::clock::Clock;
use crate::config::ContributionsConfig;
use crate::http::{get_json, Auth, FetchError, HttpClient};
use crate::sources::github::DEFAULT_API_BASE;
use crate::stats::{GithubStats, HuggingFaceStats, PrefetchedStats, WandbStats};

pub const DEFAULT_WANDB_GRAPHQL: &str = "https://api.wandb.ai/graphql";

/// Listing page size for Hub author queries
pub const HUB_LIST_LIMIT: u32 = 100;

const GITHUB_TOTAL_QUERY: &str = r#"
query($username: String!) {
  user(login: $username) {
    contributionsCollection {
      contributionCalendar {
        totalContributions
      }
    }
  }
}"#;

const WANDB_RUNS_QUERY: &str = r#"
query UserStats($entity: String!) {
  user(name: $entity) {
    projects {
      edges {
        node {
          runCount
        }
      }
    }
  }
}"#;

/// Credentials read from the environment
#[derive(Debug, Clone, Default)]
pub struct ApiTokens {
    pub github: Option<String>,
    pub huggingface: Option<String>,
    pub wandb: Option<String>,
}

impl ApiTokens {
    /// `GITHUB_TOKEN`, `HF_TOKEN`, `WANDB_API_KEY`; blank values count as unset
    pub fn from_env() -> Self {
        let var = |name: &str| {
            std::env::var(name)
                .ok()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        Self {
            github: var("GITHUB_TOKEN"),
            huggingface: var("HF_TOKEN"),
            wandb: var("WANDB_API_KEY"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct HubListing {
    #[serde(default)]
    likes: u64,
}

/// Endpoints used by [`prefetch_stats`]
#[derive(Debug, Clone)]
pub struct PrefetchEndpoints {
    pub github_api: String,
    pub hf_base: String,
    pub wandb_graphql: String,
}

impl Default for PrefetchEndpoints {
    fn default() -> Self {
        Self {
            github_api: DEFAULT_API_BASE.to_string(),
            hf_base: DEFAULT_HF_BASE.to_string(),
            wandb_graphql: DEFAULT_WANDB_GRAPHQL.to_string(),
        }
    }
}

/// Fetch totals for every configured provider
pub fn prefetch_stats(
    config: &ContributionsConfig,
    tokens: &ApiTokens,
    client: &dyn HttpClient,
    clock: &dyn Clock,
    endpoints: &PrefetchEndpoints,
) -> PrefetchedStats {
    let huggingface = match config.huggingface_username() {
        Some(user) => fetch_hf_stats(client, &endpoints.hf_base, user, tokens.huggingface.as_deref()),
        None => HuggingFaceStats::default(),
    };
    let github = match (config.github_username(), tokens.github.as_deref()) {
        (Some(user), Some(token)) => fetch_github_total(client, &endpoints.github_api, user, token),
        (Some(_), None) => {
            warn!("GITHUB_TOKEN not set; skipping GitHub contribution total");
            GithubStats::default()
        }
        (None, _) => GithubStats::default(),
    };
    let wandb = match (config.wandb_username(), tokens.wandb.as_deref()) {
        (Some(user), Some(key)) => fetch_wandb_runs(client, &endpoints.wandb_graphql, user, key),
        (Some(_), None) => {
            warn!("WANDB_API_KEY not set; skipping WandB experiment count");
            WandbStats::default()
        }
        (None, _) => WandbStats::default(),
    };

    info!(
        "prefetched stats: {} commits, {} models, {} datasets, {} likes, {} experiments",
        github.commits, huggingface.models, huggingface.datasets, huggingface.likes, wandb.experiments
    );

    PrefetchedStats {
        github: Some(github),
        huggingface: Some(huggingface),
        wandb: Some(wandb),
        last_updated: Some(clock.now().to_rfc3339()),
    }
}

/// Model and dataset counts plus summed likes for a Hub author
pub fn fetch_hf_stats(
    client: &dyn HttpClient,
    hf_base: &str,
    username: &str,
    token: Option<&str>,
) -> HuggingFaceStats {
    let auth = token.map(|t| Auth::Bearer(t.to_string()));
    let mut stats = HuggingFaceStats::default();

    for kind in ["models", "datasets"] {
        let url = format!(
            "{}/api/{}?author={}&limit={}",
            hf_base.trim_end_matches('/'),
            kind,
            username,
            HUB_LIST_LIMIT
        );
        match get_json::<Vec<HubListing>>(client, &url, auth.as_ref()) {
            Ok(items) => {
                let count = items.len() as u64;
                stats.likes += items.iter().map(|i| i.likes).sum::<u64>();
                if kind == "models" {
                    stats.models = count;
                } else {
                    stats.datasets = count;
                }
            }
            Err(e) => warn!("error fetching Hugging Face {kind} for {username}: {e}"),
        }
    }
    stats
}

/// Contributions in the last year per GitHub's own calendar (needs a token)
pub fn fetch_github_total(
    client: &dyn HttpClient,
    api_base: &str,
    username: &str,
    token: &str,
) -> GithubStats {
    let url = format!("{}/graphql", api_base.trim_end_matches('/'));
    let body = json!({ "query": GITHUB_TOTAL_QUERY, "variables": { "username": username } });
    let auth = Auth::Bearer(token.to_string());

    match post_graphql(client, &url, &body, &auth) {
        Ok(data) => GithubStats {
            commits: data
                .pointer("/data/user/contributionsCollection/contributionCalendar/totalContributions")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        },
        Err(e) => {
            warn!("error fetching GitHub stats for {username}: {e}");
            GithubStats::default()
        }
    }
}

/// Total runs across the entity's WandB projects (basic auth `api:<key>`)
pub fn fetch_wandb_runs(
    client: &dyn HttpClient,
    graphql_url: &str,
    username: &str,
    api_key: &str,
) -> WandbStats {
    let body = json!({ "query": WANDB_RUNS_QUERY, "variables": { "entity": username } });
    let auth = Auth::Basic {
        user: "api".to_string(),
        password: api_key.to_string(),
    };

    match post_graphql(client, graphql_url, &body, &auth) {
        Ok(data) => {
            let experiments = data
                .pointer("/data/user/projects/edges")
                .and_then(Value::as_array)
                .map(|edges| {
                    edges
                        .iter()
                        .filter_map(|edge| edge.pointer("/node/runCount").and_then(Value::as_u64))
                        .sum::<u64>()
                })
                .unwrap_or(0);
            WandbStats { experiments }
        }
        Err(e) => {
            warn!("error fetching WandB stats for {username}: {e}");
            WandbStats::default()
        }
    }
}

fn post_graphql(
    client: &dyn HttpClient,
    url: &str,
    body: &Value,
    auth: &Auth,
) -> Result<Value, FetchError> {
    client.post_json(url, body, Some(auth))?.error_for_status(url)?.json()
}

/// Read a `stats.json` written by [`write_stats_file`]
pub fn load_stats_file(path: &Path) -> Result<PrefetchedStats> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read stats file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse stats file: {}", path.display()))
}

pub fn write_stats_file(path: &Path, stats: &PrefetchedStats) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    let json = serde_json::to_string_pretty(stats).context("failed to serialize stats")?;
    std::fs::write(path, json + "\n")
        .with_context(|| format!("failed to write stats file: {}", path.display()))
}
