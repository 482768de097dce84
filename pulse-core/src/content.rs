//! Static content sections: publications, blog posts and updates
//!
//! Records are JSON files under `{data_dir}/publications/`, `{data_dir}/blog/`
//! and `{data_dir}/updates/`. A directory lists its records in `manifest.json`
//! (the blog builder writes one); without a manifest the numbered defaults
//! (`paper1.json`, `post1.json`, `update1.json`, ...) are tried instead.
//!
//! A record that cannot be read or parsed is logged and skipped. Only an
//! unreadable manifest fails a whole section.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::Context;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::{debug, warn};

use crate::blog::{Manifest, MANIFEST_FILE};
use crate::config::{ContentConfig, SortOrder};

/// Records without a usable date sort as if published on this day
const UNDATED_YEAR: i32 = 1900;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    Publications,
    BlogPosts,
    Updates,
}

impl ContentKind {
    /// Subdirectory of the content data directory
    pub fn dir_name(self) -> &'static str {
        match self {
            ContentKind::Publications => "publications",
            ContentKind::BlogPosts => "blog",
            ContentKind::Updates => "updates",
        }
    }

    /// Lower-case name used in empty and error states
    pub fn label(self) -> &'static str {
        match self {
            ContentKind::Publications => "publications",
            ContentKind::BlogPosts => "blog posts",
            ContentKind::Updates => "updates",
        }
    }

    fn default_files(self) -> Vec<String> {
        let (prefix, count) = match self {
            ContentKind::Publications => ("paper", 5),
            ContentKind::BlogPosts => ("post", 5),
            ContentKind::Updates => ("update", 10),
        };
        (1..=count).map(|n| format!("{prefix}{n}.json")).collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Publication {
    pub title: String,
    /// A string, or a list joined with ", "
    #[serde(default, deserialize_with = "loose_text")]
    pub authors: Option<String>,
    #[serde(default)]
    pub venue: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// A number or a string
    #[serde(default, deserialize_with = "loose_text")]
    pub year: Option<String>,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

impl Publication {
    /// `year` wins over `date` when both are set
    fn sort_date(&self) -> NaiveDate {
        let text = [self.year.as_deref(), self.date.as_deref()]
            .into_iter()
            .flatten()
            .find(|s| !s.trim().is_empty());
        date_or_undated(text)
    }
}

/// Listing view of a blog post record (`postN.json`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostSummary {
    pub title: String,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub excerpt: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub links: Vec<Link>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Update {
    pub date: String,
    pub content: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum LooseText {
    Text(String),
    Number(serde_json::Number),
    List(Vec<String>),
}

fn loose_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<LooseText>::deserialize(deserializer)?.map(|value| match value {
        LooseText::Text(text) => text,
        LooseText::Number(n) => n.to_string(),
        LooseText::List(items) => items.join(", "),
    }))
}

/// Parse `YYYY-MM-DD` (with optional time suffix), `YYYY-MM` or `YYYY`
pub fn parse_loose_date(text: &str) -> Option<NaiveDate> {
    let text = text.trim();
    let day = text.get(..10).unwrap_or(text);
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(&format!("{text}-01"), "%Y-%m-%d").ok())
        .or_else(|| {
            text.parse::<i32>()
                .ok()
                .and_then(|year| NaiveDate::from_ymd_opt(year, 1, 1))
        })
}

fn date_or_undated(text: Option<&str>) -> NaiveDate {
    text.and_then(parse_loose_date)
        .or_else(|| NaiveDate::from_ymd_opt(UNDATED_YEAR, 1, 1))
        .unwrap_or(NaiveDate::MIN)
}

/// Stable sort, so records with equal dates keep listing order
fn sort_by_date<T>(items: &mut [T], order: SortOrder, key: impl Fn(&T) -> NaiveDate) {
    items.sort_by(|a, b| match order {
        SortOrder::Desc => key(b).cmp(&key(a)),
        SortOrder::Asc => key(a).cmp(&key(b)),
    });
}

/// Reads content records, caching each parsed file by path for the loader's lifetime
pub struct ContentLoader {
    config: ContentConfig,
    cache: Mutex<HashMap<PathBuf, serde_json::Value>>,
}

impl ContentLoader {
    /// `config.data_dir` should already be rooted at the site
    pub fn new(config: ContentConfig) -> Self {
        Self {
            config,
            cache: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ContentConfig {
        &self.config
    }

    /// Publications in configured order, uncapped
    pub fn publications(&self) -> anyhow::Result<Vec<Publication>> {
        let mut items: Vec<Publication> = self.section(ContentKind::Publications)?;
        sort_by_date(&mut items, self.config.sort_order, Publication::sort_date);
        Ok(items)
    }

    /// Blog posts in configured order, at most `max_blog_posts`
    pub fn blog_posts(&self) -> anyhow::Result<Vec<PostSummary>> {
        let mut items: Vec<PostSummary> = self.section(ContentKind::BlogPosts)?;
        sort_by_date(&mut items, self.config.sort_order, |post| {
            date_or_undated(Some(post.date.as_str()))
        });
        items.truncate(self.config.max_blog_posts);
        Ok(items)
    }

    /// Updates in configured order, at most `max_updates`
    pub fn updates(&self) -> anyhow::Result<Vec<Update>> {
        let mut items: Vec<Update> = self.section(ContentKind::Updates)?;
        sort_by_date(&mut items, self.config.sort_order, |update| {
            date_or_undated(Some(update.date.as_str()))
        });
        items.truncate(self.config.max_updates);
        Ok(items)
    }

    fn section<T: DeserializeOwned>(&self, kind: ContentKind) -> anyhow::Result<Vec<T>> {
        let dir = self.config.data_dir.join(kind.dir_name());
        let manifest_path = dir.join(MANIFEST_FILE);
        let (files, listed) = if manifest_path.exists() {
            let manifest: Manifest = serde_json::from_value(self.load_json(&manifest_path)?)
                .with_context(|| format!("invalid manifest: {}", manifest_path.display()))?;
            (manifest.files, true)
        } else {
            debug!("no manifest in {}, trying numbered files", dir.display());
            (kind.default_files(), false)
        };

        let mut records = Vec::new();
        for name in files {
            if Path::new(&name).file_name().and_then(|n| n.to_str()) != Some(name.as_str()) {
                warn!("skipping {} entry {:?}: not a plain file name", kind.label(), name);
                continue;
            }
            let path = dir.join(&name);
            // Numbered defaults are guesses; only listed files are expected to exist
            if !listed && !path.exists() {
                continue;
            }
            let record = self.load_json(&path).and_then(|value| {
                serde_json::from_value::<T>(value)
                    .with_context(|| format!("invalid record: {}", path.display()))
            });
            match record {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping {} entry: {e:#}", kind.label()),
            }
        }
        debug!("loaded {} {}", records.len(), kind.label());
        Ok(records)
    }

    fn load_json(&self, path: &Path) -> anyhow::Result<serde_json::Value> {
        if let Some(value) = self
            .cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(path)
        {
            return Ok(value.clone());
        }

        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let value: serde_json::Value = serde_json::from_str(&text)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        self.cache
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(path.to_path_buf(), value.clone());
        Ok(value)
    }
}
