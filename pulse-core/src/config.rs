//! Configuration file support for Pulse
//!
//! Loads site configuration from a JSON file.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.pulserc.json` in the site root
//! 3. `pulse.config.json` in the site root
//!
//! The file is shared by several independent widgets (heatmap, stats, cards,
//! blog, content sections). Each widget reads its own sections from the parsed JSON, so a
//! malformed section disables only the widget that needs it.

use anyhow::{Context, Result};
use globset::Glob;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::stats::PrefetchedStats;

/// Config file names tried, in order, when no explicit path is given
pub const CONFIG_FILE_NAMES: &[&str] = &[".pulserc.json", "pulse.config.json"];

/// One activity provider (GitHub, Hugging Face, WandB)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub username: String,
}

impl SourceConfig {
    pub fn enabled(username: &str) -> Self {
        Self {
            enabled: true,
            username: username.to_string(),
        }
    }

    /// Username when the provider is enabled and configured
    pub fn active_username(&self) -> Option<&str> {
        let username = self.username.trim();
        (self.enabled && !username.is_empty()).then_some(username)
    }
}

/// Hugging Face provider, plus the model ids shown as cards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HuggingFaceConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub username: String,
    /// Model or dataset ids (`name` or `owner/name`)
    #[serde(default)]
    pub models: Vec<String>,
}

impl HuggingFaceConfig {
    pub fn source(&self) -> SourceConfig {
        SourceConfig {
            enabled: self.enabled,
            username: self.username.clone(),
        }
    }
}

/// Sections read by the contributions widget (heatmap + stats)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContributionsConfig {
    #[serde(default)]
    pub github: Option<SourceConfig>,
    #[serde(default)]
    pub huggingface: Option<HuggingFaceConfig>,
    #[serde(default)]
    pub wandb: Option<SourceConfig>,
    /// Totals computed ahead of time (see `pulse stats`)
    #[serde(default)]
    pub prefetched_stats: Option<PrefetchedStats>,
}

impl ContributionsConfig {
    pub fn github_username(&self) -> Option<&str> {
        self.github.as_ref().and_then(SourceConfig::active_username)
    }

    pub fn huggingface_username(&self) -> Option<&str> {
        self.huggingface.as_ref().and_then(|hf| {
            let username = hf.username.trim();
            (hf.enabled && !username.is_empty()).then_some(username)
        })
    }

    pub fn wandb_username(&self) -> Option<&str> {
        self.wandb.as_ref().and_then(SourceConfig::active_username)
    }

    /// Validate the configuration for logical errors.
    ///
    /// Only fields the heatmap and stats read are checked here; the model id
    /// list belongs to the cards widget and is validated by [`CardsConfig`].
    pub fn validate(&self) -> Result<()> {
        let sources = [
            ("github", self.github.clone(), is_github_login as fn(&str) -> bool),
            (
                "huggingface",
                self.huggingface.as_ref().map(HuggingFaceConfig::source),
                is_name_segment,
            ),
            ("wandb", self.wandb.clone(), is_name_segment),
        ];
        for (name, source, is_valid) in sources {
            let Some(source) = source else {
                continue;
            };
            let username = source.username.trim();
            if source.enabled && username.is_empty() {
                anyhow::bail!("{}.username must be set when {}.enabled is true", name, name);
            }
            if !username.is_empty() && !is_valid(username) {
                anyhow::bail!(
                    "{}.username contains characters that are not allowed (got {:?})",
                    name,
                    source.username
                );
            }
        }
        Ok(())
    }

    /// Extract and validate from a parsed config document
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let config: ContributionsConfig = serde_json::from_value(value.clone())
            .context("invalid contributions config")?;
        config.validate()?;
        Ok(config)
    }
}

/// Sections read by the project-cards widget
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardsConfig {
    /// GitHub repositories (`owner/name`)
    #[serde(default)]
    pub repos: Vec<String>,
    /// Hugging Face model or dataset ids (`owner/name`)
    #[serde(default)]
    pub models: Vec<String>,
}

impl CardsConfig {
    pub fn validate(&self) -> Result<()> {
        for repo in &self.repos {
            validate_repo_id(repo)?;
        }
        for id in &self.models {
            validate_hub_id(id)?;
        }
        Ok(())
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let repos = match value.get("repos") {
            Some(repos) => serde_json::from_value(repos.clone()).context("invalid repos list")?,
            None => Vec::new(),
        };
        let models = match value.get("huggingface").and_then(|hf| hf.get("models")) {
            Some(models) => serde_json::from_value(models.clone())
                .context("invalid huggingface.models list")?,
            None => Vec::new(),
        };
        let config = CardsConfig { repos, models };
        config.validate()?;
        Ok(config)
    }
}

/// Section read by the blog builder
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BlogConfig {
    /// Directory holding `*.md` sources
    #[serde(default = "default_markdown_dir")]
    pub markdown_dir: PathBuf,
    /// Directory receiving `postN.json`, `manifest.json` and HTML fragments
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    /// Author used when a post's frontmatter has none
    #[serde(default)]
    pub default_author: Option<String>,
    /// Glob patterns (relative to `markdown_dir`) selecting post sources
    #[serde(default = "default_include")]
    pub include: Vec<String>,
}

fn default_markdown_dir() -> PathBuf {
    PathBuf::from("blog/markdown")
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("data/blog")
}

fn default_include() -> Vec<String> {
    vec!["*.md".to_string()]
}

impl Default for BlogConfig {
    fn default() -> Self {
        Self {
            markdown_dir: default_markdown_dir(),
            data_dir: default_data_dir(),
            default_author: None,
            include: default_include(),
        }
    }
}

impl BlogConfig {
    pub fn validate(&self) -> Result<()> {
        if self.include.is_empty() {
            anyhow::bail!("blog.include must list at least one pattern");
        }
        for pattern in &self.include {
            Glob::new(pattern)
                .with_context(|| format!("invalid blog.include pattern: {}", pattern))?;
        }
        Ok(())
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        let config = match value.get("blog") {
            Some(blog) => {
                serde_json::from_value(blog.clone()).context("invalid blog config")?
            }
            None => BlogConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Resolve relative directories against the site root
    pub fn rooted_at(mut self, root: &Path) -> Self {
        if self.markdown_dir.is_relative() {
            self.markdown_dir = root.join(&self.markdown_dir);
        }
        if self.data_dir.is_relative() {
            self.data_dir = root.join(&self.data_dir);
        }
        self
    }
}

/// Ordering of dated content records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Newest first
    #[default]
    Desc,
    Asc,
}

/// Section read by the content sections (publications, blog posts, updates)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ContentConfig {
    /// Directory holding `publications/`, `blog/` and `updates/`
    #[serde(default = "default_content_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_max_blog_posts")]
    pub max_blog_posts: usize,
    #[serde(default = "default_max_updates")]
    pub max_updates: usize,
    #[serde(default)]
    pub sort_order: SortOrder,
}

fn default_content_dir() -> PathBuf {
    PathBuf::from("data")
}

fn default_max_blog_posts() -> usize {
    20
}

fn default_max_updates() -> usize {
    10
}

impl Default for ContentConfig {
    fn default() -> Self {
        Self {
            data_dir: default_content_dir(),
            max_blog_posts: default_max_blog_posts(),
            max_updates: default_max_updates(),
            sort_order: SortOrder::default(),
        }
    }
}

impl ContentConfig {
    pub fn from_value(value: &serde_json::Value) -> Result<Self> {
        match value.get("content") {
            Some(content) => {
                serde_json::from_value(content.clone()).context("invalid content config")
            }
            None => Ok(ContentConfig::default()),
        }
    }

    /// Resolve a relative data directory against the site root
    pub fn rooted_at(mut self, root: &Path) -> Self {
        if self.data_dir.is_relative() {
            self.data_dir = root.join(&self.data_dir);
        }
        self
    }
}

/// GitHub logins: ASCII letters, digits and `-`
fn is_github_login(name: &str) -> bool {
    !name.is_empty() && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

/// Repository, Hub and WandB names: ASCII letters, digits, `-`, `_` and `.`
fn is_name_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment != "."
        && segment != ".."
        && segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// GitHub `owner/name`
fn validate_repo_id(id: &str) -> Result<()> {
    let valid = match id.split_once('/') {
        Some((owner, name)) => is_github_login(owner) && is_name_segment(name),
        None => false,
    };
    if !valid {
        anyhow::bail!("repos entries must look like owner/name (got {:?})", id);
    }
    Ok(())
}

/// Hub id: `name` (e.g. `gpt2`) or `owner/name`
fn validate_hub_id(id: &str) -> Result<()> {
    let valid = match id.split_once('/') {
        Some((owner, name)) => is_name_segment(owner) && is_name_segment(name),
        None => is_name_segment(id),
    };
    if !valid {
        anyhow::bail!(
            "huggingface.models entries must look like name or owner/name (got {:?})",
            id
        );
    }
    Ok(())
}

/// Parsed config document with the path it came from
#[derive(Debug, Clone, Default)]
pub struct SiteConfig {
    pub document: serde_json::Value,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl SiteConfig {
    pub fn contributions(&self) -> Result<ContributionsConfig> {
        ContributionsConfig::from_value(&self.document)
    }

    pub fn cards(&self) -> Result<CardsConfig> {
        CardsConfig::from_value(&self.document)
    }

    pub fn blog(&self) -> Result<BlogConfig> {
        BlogConfig::from_value(&self.document)
    }

    pub fn content(&self) -> Result<ContentConfig> {
        ContentConfig::from_value(&self.document)
    }

    /// Validate every section, reporting the first failure
    pub fn validate(&self) -> Result<()> {
        self.contributions()?;
        self.cards()?;
        self.blog()?;
        self.content()?;
        Ok(())
    }

    /// Directory relative paths in the config resolve against
    pub fn root(&self) -> PathBuf {
        self.config_path
            .as_ref()
            .and_then(|p| p.parent())
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Load a config document from an explicit file path
pub fn load_config_file(path: &Path) -> Result<SiteConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let document: serde_json::Value = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    if !document.is_object() {
        anyhow::bail!("config file must contain a JSON object: {}", path.display());
    }

    Ok(SiteConfig {
        document,
        config_path: Some(path.to_path_buf()),
    })
}

/// Discover a config file in `root`; `None` if there is none
pub fn discover_config(root: &Path) -> Result<Option<SiteConfig>> {
    for name in CONFIG_FILE_NAMES {
        let path = root.join(name);
        if path.exists() {
            return load_config_file(&path).map(Some);
        }
    }
    Ok(None)
}

/// Load config from `config_path`, else discover it in `root`, else defaults
pub fn load(root: &Path, config_path: Option<&Path>) -> Result<SiteConfig> {
    if let Some(path) = config_path {
        return load_config_file(path);
    }
    Ok(discover_config(root)?.unwrap_or_else(|| SiteConfig {
        document: serde_json::json!({}),
        config_path: None,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn doc(json: &str) -> serde_json::Value {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_empty_document_yields_defaults() {
        let value = doc("{}");
        let contributions = ContributionsConfig::from_value(&value).unwrap();
        assert_eq!(contributions.github_username(), None);
        assert!(CardsConfig::from_value(&value).unwrap().repos.is_empty());
        assert_eq!(BlogConfig::from_value(&value).unwrap(), BlogConfig::default());
    }

    #[test]
    fn test_parse_full_config() {
        let value = doc(
            r#"{
                "github": {"enabled": true, "username": "alice"},
                "huggingface": {"enabled": true, "username": "alice", "models": ["alice/tiny-llm"]},
                "wandb": {"enabled": false, "username": ""},
                "prefetched_stats": {"github": {"commits": 1200}, "wandb": {"experiments": 7}},
                "repos": ["alice/pulse"],
                "blog": {"markdown_dir": "posts", "default_author": "Alice"}
            }"#,
        );
        let contributions = ContributionsConfig::from_value(&value).unwrap();
        assert_eq!(contributions.github_username(), Some("alice"));
        assert_eq!(contributions.huggingface_username(), Some("alice"));
        assert_eq!(contributions.wandb_username(), None);
        let prefetched = contributions.prefetched_stats.unwrap();
        assert_eq!(prefetched.github.unwrap().commits, 1200);

        let cards = CardsConfig::from_value(&value).unwrap();
        assert_eq!(cards.repos, vec!["alice/pulse"]);
        assert_eq!(cards.models, vec!["alice/tiny-llm"]);

        let blog = BlogConfig::from_value(&value).unwrap();
        assert_eq!(blog.markdown_dir, PathBuf::from("posts"));
        assert_eq!(blog.data_dir, PathBuf::from("data/blog"));
        assert_eq!(blog.default_author.as_deref(), Some("Alice"));
    }

    #[test]
    fn test_disabled_source_has_no_username() {
        let source = SourceConfig {
            enabled: false,
            username: "alice".into(),
        };
        assert_eq!(source.active_username(), None);
    }

    #[test]
    fn test_reject_enabled_without_username() {
        let value = doc(r#"{"github": {"enabled": true, "username": " "}}"#);
        assert!(ContributionsConfig::from_value(&value).is_err());
    }

    #[test]
    fn test_reject_unknown_source_fields() {
        let value = doc(r#"{"github": {"enabled": true, "username": "a", "token": "x"}}"#);
        assert!(ContributionsConfig::from_value(&value).is_err());
    }

    #[test]
    fn test_malformed_section_only_breaks_its_widget() {
        let value = doc(r#"{"github": {"enabled": "yes"}, "repos": ["alice/pulse"]}"#);
        assert!(ContributionsConfig::from_value(&value).is_err());
        assert_eq!(
            CardsConfig::from_value(&value).unwrap().repos,
            vec!["alice/pulse"]
        );
    }

    #[test]
    fn test_reject_bad_repo_names() {
        for bad in ["alice", "alice/", "/pulse", "a/b/c", "alice/my repo"] {
            let value = serde_json::json!({ "repos": [bad] });
            assert!(CardsConfig::from_value(&value).is_err(), "{bad} should be rejected");
        }
    }

    #[test]
    fn test_bare_hub_ids_do_not_touch_the_heatmap() {
        let site = SiteConfig {
            document: doc(
                r#"{
                    "github": {"enabled": true, "username": "alice"},
                    "huggingface": {"enabled": true, "username": "alice", "models": ["gpt2", "alice/tiny-llm"]}
                }"#,
            ),
            config_path: None,
        };
        assert_eq!(site.contributions().unwrap().github_username(), Some("alice"));
        assert_eq!(site.cards().unwrap().models, vec!["gpt2", "alice/tiny-llm"]);
        assert!(site.validate().is_ok());
    }

    #[test]
    fn test_bad_model_id_only_breaks_cards() {
        let site = SiteConfig {
            document: doc(
                r#"{
                    "github": {"enabled": true, "username": "alice"},
                    "huggingface": {"enabled": true, "username": "alice", "models": ["a/b/c"]}
                }"#,
            ),
            config_path: None,
        };
        assert!(site.contributions().is_ok());
        assert!(site.cards().is_err());
    }

    #[test]
    fn test_reject_usernames_that_would_alter_urls() {
        for bad in ["al?ce", "a&b", "a#b", "a/b", "al ice", "a%2Fb", "a.b"] {
            let value = serde_json::json!({ "github": {"enabled": true, "username": bad} });
            assert!(
                ContributionsConfig::from_value(&value).is_err(),
                "{bad} should be rejected"
            );
        }
        for bad in ["al?ce", "a#b", ".."] {
            let value = serde_json::json!({ "wandb": {"enabled": true, "username": bad} });
            assert!(ContributionsConfig::from_value(&value).is_err(), "{bad} should be rejected");
        }
        let value = serde_json::json!({
            "github": {"enabled": true, "username": "alice-dev"},
            "huggingface": {"enabled": true, "username": "alice_dev.ml"},
        });
        assert!(ContributionsConfig::from_value(&value).is_ok());
    }

    #[test]
    fn test_reject_repo_names_with_query_characters() {
        for bad in ["alice/pulse?x=1", "alice/pulse#top", "al.ice/pulse", "alice/.."] {
            let value = serde_json::json!({ "repos": [bad] });
            assert!(CardsConfig::from_value(&value).is_err(), "{bad} should be rejected");
        }
        let value = serde_json::json!({ "repos": ["alice/pulse.rs", "alice/my_repo"] });
        assert!(CardsConfig::from_value(&value).is_ok());
    }

    #[test]
    fn test_reject_invalid_blog_glob() {
        let value = doc(r#"{"blog": {"include": ["[invalid"]}}"#);
        assert!(BlogConfig::from_value(&value).is_err());
    }

    #[test]
    fn test_content_section_defaults_and_overrides() {
        let defaults = ContentConfig::from_value(&doc("{}")).unwrap();
        assert_eq!(defaults.data_dir, PathBuf::from("data"));
        assert_eq!(defaults.max_blog_posts, 20);
        assert_eq!(defaults.max_updates, 10);
        assert_eq!(defaults.sort_order, SortOrder::Desc);

        let value = doc(r#"{"content": {"sort_order": "asc", "max_updates": 3}}"#);
        let content = ContentConfig::from_value(&value).unwrap();
        assert_eq!(content.sort_order, SortOrder::Asc);
        assert_eq!(content.max_updates, 3);

        assert!(ContentConfig::from_value(&doc(r#"{"content": {"sort_order": "newest"}}"#)).is_err());
    }

    #[test]
    fn test_discover_config_order() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_config(dir.path()).unwrap().is_none());

        fs::write(dir.path().join("pulse.config.json"), r#"{"repos": ["a/b"]}"#).unwrap();
        fs::write(dir.path().join(".pulserc.json"), r#"{"repos": ["c/d"]}"#).unwrap();

        let config = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.config_path, Some(dir.path().join(".pulserc.json")));
        assert_eq!(config.cards().unwrap().repos, vec!["c/d"]);
        assert_eq!(config.root(), dir.path());
    }

    #[test]
    fn test_reject_non_object_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pulse.config.json");
        fs::write(&path, "[1, 2]").unwrap();
        assert!(load_config_file(&path).is_err());
    }

    #[test]
    fn test_blog_dirs_rooted_at_site() {
        let blog = BlogConfig::default().rooted_at(Path::new("/site"));
        assert_eq!(blog.markdown_dir, PathBuf::from("/site/blog/markdown"));
        assert_eq!(blog.data_dir, PathBuf::from("/site/data/blog"));
    }
}
