//! Stats summary shown next to the heatmap
//!
//! Merges prefetched totals (see [`crate::prefetch`]) with what the heatmap
//! collected live. Strictly derived: never stored, recomputed per page build.
//!
//! Global invariants enforced:
//! - The summary always has all four slots; missing inputs read as zero
//! - A disabled provider contributes zero regardless of prefetched values

use serde::{Deserialize, Serialize};

use crate::buckets::DayBuckets;
use crate::config::ContributionsConfig;

/// Four-field summary rendered under the heatmap
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StatsSummary {
    pub commits: u64,
    pub models: u64,
    pub datasets: u64,
    pub experiments: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GithubStats {
    #[serde(default)]
    pub commits: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HuggingFaceStats {
    #[serde(default)]
    pub models: u64,
    #[serde(default)]
    pub datasets: u64,
    /// Summed likes over models and datasets
    #[serde(default)]
    pub likes: u64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WandbStats {
    #[serde(default)]
    pub experiments: u64,
}

/// Totals computed ahead of time, embedded in the config or read from `stats.json`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrefetchedStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<GithubStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub huggingface: Option<HuggingFaceStats>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wandb: Option<WandbStats>,
    /// RFC 3339 timestamp of the prefetch run
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<String>,
}

/// Build the summary for `config` from prefetched totals and the merged buckets
pub fn aggregate_stats(config: &ContributionsConfig, buckets: &DayBuckets) -> StatsSummary {
    let prefetched = config.prefetched_stats.clone().unwrap_or_default();
    let mut summary = StatsSummary::default();

    if config.github_username().is_some() {
        let prefetched_commits = prefetched.github.map(|g| g.commits).unwrap_or(0);
        summary.commits = if prefetched_commits > 0 {
            prefetched_commits
        } else {
            buckets.total()
        };
    }

    if config.huggingface_username().is_some() {
        let hf = prefetched.huggingface.unwrap_or_default();
        summary.models = hf.models;
        summary.datasets = hf.datasets;
        if summary.models == 0 {
            summary.models = config
                .huggingface
                .as_ref()
                .map(|hf| hf.models.len() as u64)
                .unwrap_or(0);
        }
    }

    if config.wandb_username().is_some() {
        summary.experiments = prefetched.wandb.map(|w| w.experiments).unwrap_or(0);
    }

    summary
}
