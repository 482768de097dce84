//! Repository and Hugging Face model cards
//!
//! Each configured repository / model id is looked up independently (in
//! parallel, order preserved) and cached for an hour. Lookups that fail are
//! logged and dropped from the list; the widget only reports failure when
//! nothing could be loaded.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::{cache_key, TtlCache};
use crate::config::CardsConfig;
use crate::http::{get_json, FetchError, HttpClient};
use crate::sources::github::DEFAULT_API_BASE;

/// Hugging Face Hub root (site and API)
pub const DEFAULT_HF_BASE: &str = "https://huggingface.co";

/// Fallback label when GitHub reports no language
pub const OTHER_LANGUAGE: &str = "Other";

const LANGUAGE_COLORS: &[(&str, &str)] = &[
    ("Python", "#7FB4CA"),
    ("JavaScript", "#E6C384"),
    ("TypeScript", "#7E9CD8"),
    ("Java", "#DCA561"),
    ("C++", "#C34043"),
    ("C", "#727169"),
    ("Go", "#98BB6C"),
    ("Rust", "#FFA066"),
    ("Ruby", "#D27E99"),
    ("PHP", "#938AA9"),
    ("Swift", "#FFA066"),
    ("Kotlin", "#957FB8"),
    ("Scala", "#E82424"),
    ("Shell", "#98BB6C"),
    ("HTML", "#E46876"),
    ("CSS", "#9CABCA"),
    ("Jupyter Notebook", "#CC6D00"),
    ("R", "#7E9CD8"),
    ("MATLAB", "#DCA561"),
    ("Dart", "#7FB4CA"),
    ("Vue", "#98BB6C"),
    ("Svelte", "#FF5D62"),
];

const OTHER_COLOR: &str = "#727169";

/// Dot colour for a GitHub language name
pub fn language_color(language: &str) -> &'static str {
    LANGUAGE_COLORS
        .iter()
        .find(|(name, _)| *name == language)
        .map(|(_, color)| *color)
        .unwrap_or(OTHER_COLOR)
}

/// GitHub repository card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepoCard {
    pub name: String,
    pub full_name: String,
    pub description: String,
    pub language: String,
    pub language_color: String,
    pub url: String,
    pub stars: u64,
    pub forks: u64,
    pub is_public: bool,
}

#[derive(Debug, Deserialize)]
struct GithubRepo {
    name: String,
    full_name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    language: Option<String>,
    html_url: String,
    #[serde(default)]
    stargazers_count: u64,
    #[serde(default)]
    forks_count: u64,
    #[serde(default)]
    private: bool,
}

impl From<GithubRepo> for RepoCard {
    fn from(repo: GithubRepo) -> Self {
        let language = repo
            .language
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| OTHER_LANGUAGE.to_string());
        RepoCard {
            name: repo.name,
            full_name: repo.full_name,
            description: repo
                .description
                .filter(|d| !d.trim().is_empty())
                .unwrap_or_else(|| "No description available".to_string()),
            language_color: language_color(&language).to_string(),
            language,
            url: repo.html_url,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
            is_public: !repo.private,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HubKind {
    Model,
    Dataset,
}

impl HubKind {
    pub fn label(self) -> &'static str {
        match self {
            HubKind::Model => "Model",
            HubKind::Dataset => "Dataset",
        }
    }

    pub fn color(self) -> &'static str {
        match self {
            HubKind::Model => "#FFD21E",
            HubKind::Dataset => "#4F46E5",
        }
    }

    fn api_path(self) -> &'static str {
        match self {
            HubKind::Model => "models",
            HubKind::Dataset => "datasets",
        }
    }
}

/// Hugging Face model or dataset card
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelCard {
    pub id: String,
    pub name: String,
    pub kind: HubKind,
    pub description: String,
    pub likes: u64,
    pub downloads: u64,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_modified: Option<String>,
}

#[derive(Debug, Deserialize)]
struct HubItem {
    id: String,
    #[serde(default)]
    pipeline_tag: Option<String>,
    #[serde(default)]
    likes: u64,
    #[serde(default)]
    downloads: u64,
    #[serde(default, rename = "lastModified")]
    last_modified: Option<String>,
}

/// Result of loading one card list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum CardsOutcome<T> {
    /// Nothing listed in the config
    NoneConfigured,
    /// Every lookup failed
    AllFailed { rate_limited: bool },
    /// At least one card loaded; `failed` lookups were dropped
    Loaded { cards: Vec<T>, failed: usize },
}

impl<T> CardsOutcome<T> {
    fn from_results(results: Vec<Result<T, FetchError>>) -> Self {
        if results.is_empty() {
            return CardsOutcome::NoneConfigured;
        }
        let total = results.len();
        let mut rate_limited = false;
        let mut cards = Vec::with_capacity(total);
        for result in results {
            match result {
                Ok(card) => cards.push(card),
                Err(e) => rate_limited |= e.is_rate_limited(),
            }
        }
        if cards.is_empty() {
            CardsOutcome::AllFailed { rate_limited }
        } else {
            let failed = total - cards.len();
            CardsOutcome::Loaded { cards, failed }
        }
    }

    pub fn cards(&self) -> &[T] {
        match self {
            CardsOutcome::Loaded { cards, .. } => cards,
            _ => &[],
        }
    }
}

/// Both card lists for the projects section
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectCards {
    pub repos: CardsOutcome<RepoCard>,
    pub models: CardsOutcome<ModelCard>,
}

/// Card lookups against GitHub and the Hugging Face Hub
pub struct CardSource<'a> {
    client: &'a dyn HttpClient,
    cache: Option<&'a TtlCache<'a>>,
    github_api: String,
    hf_base: String,
}

impl<'a> CardSource<'a> {
    pub fn new(client: &'a dyn HttpClient, cache: Option<&'a TtlCache<'a>>) -> Self {
        Self {
            client,
            cache,
            github_api: DEFAULT_API_BASE.to_string(),
            hf_base: DEFAULT_HF_BASE.to_string(),
        }
    }

    pub fn with_bases(mut self, github_api: &str, hf_base: &str) -> Self {
        self.github_api = github_api.trim_end_matches('/').to_string();
        self.hf_base = hf_base.trim_end_matches('/').to_string();
        self
    }

    /// Card for `owner/name`, from cache or `GET /repos/{repo}`
    pub fn fetch_repo_card(&self, repo: &str) -> Result<RepoCard, FetchError> {
        let key = cache_key("github_repo", repo);
        if let Some(card) = self.cache.and_then(|c| c.get::<RepoCard>(&key)) {
            debug!("using cached data for {repo}");
            return Ok(card);
        }

        let url = format!("{}/repos/{}", self.github_api, repo);
        let card = RepoCard::from(get_json::<GithubRepo>(self.client, &url, None)?);
        if let Some(cache) = self.cache {
            cache.set(&key, &card);
        }
        Ok(card)
    }

    /// Card for a Hub id, tried as a model first and then as a dataset
    pub fn fetch_model_card(&self, id: &str) -> Result<ModelCard, FetchError> {
        let key = cache_key("hf_model", id);
        if let Some(card) = self.cache.and_then(|c| c.get::<ModelCard>(&key)) {
            debug!("using cached data for {id}");
            return Ok(card);
        }

        let card = match self.fetch_hub_item(HubKind::Model, id) {
            Ok(card) => card,
            Err(e) if e.is_rate_limited() => return Err(e),
            Err(e) => {
                debug!("{id} is not a model ({e}); trying datasets");
                self.fetch_hub_item(HubKind::Dataset, id)?
            }
        };
        if let Some(cache) = self.cache {
            cache.set(&key, &card);
        }
        Ok(card)
    }

    fn fetch_hub_item(&self, kind: HubKind, id: &str) -> Result<ModelCard, FetchError> {
        let url = format!("{}/api/{}/{}", self.hf_base, kind.api_path(), id);
        let item: HubItem = get_json(self.client, &url, None)?;

        let name = item.id.rsplit('/').next().unwrap_or(&item.id).to_string();
        let description = match kind {
            HubKind::Model => item.pipeline_tag.unwrap_or_else(|| "Model".to_string()),
            HubKind::Dataset => "Dataset".to_string(),
        };
        let url = match kind {
            HubKind::Model => format!("{}/{}", self.hf_base, item.id),
            HubKind::Dataset => format!("{}/datasets/{}", self.hf_base, item.id),
        };
        Ok(ModelCard {
            id: item.id,
            name,
            kind,
            description,
            likes: item.likes,
            downloads: item.downloads,
            url,
            last_modified: item.last_modified,
        })
    }

    /// Load every configured card, in parallel, keeping configuration order
    pub fn load_cards(&self, config: &CardsConfig) -> ProjectCards {
        let repos: Vec<_> = config
            .repos
            .par_iter()
            .map(|repo| {
                self.fetch_repo_card(repo).map_err(|e| {
                    log_card_failure("repository", repo, &e);
                    e
                })
            })
            .collect();
        let models: Vec<_> = config
            .models
            .par_iter()
            .map(|id| {
                self.fetch_model_card(id).map_err(|e| {
                    log_card_failure("Hugging Face model/dataset", id, &e);
                    e
                })
            })
            .collect();

        let cards = ProjectCards {
            repos: CardsOutcome::from_results(repos),
            models: CardsOutcome::from_results(models),
        };
        info!(
            "loaded {} repository and {} model cards",
            cards.repos.cards().len(),
            cards.models.cards().len()
        );
        cards
    }
}

fn log_card_failure(what: &str, id: &str, err: &FetchError) {
    if err.is_rate_limited() {
        warn!("API rate limit exceeded while fetching {what} {id}");
    } else if err.is_not_found() {
        warn!("{what} not found: {id}");
    } else {
        warn!("error fetching {what} {id}: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryStore;
    use crate::clock::FixedClock;
    use crate::http::{HttpResponse, ScriptedClient};
    use chrono::{TimeZone, Utc};

    const GH: &str = "https://gh.test";
    const HF: &str = "https://hf.test";

    fn repo_json(name: &str, language: Option<&str>) -> String {
        serde_json::json!({
            "name": name.split('/').nth(1).unwrap(),
            "full_name": name,
            "description": null,
            "language": language,
            "html_url": format!("https://github.com/{name}"),
            "stargazers_count": 12,
            "forks_count": 0,
            "private": false
        })
        .to_string()
    }

    #[test]
    fn test_language_color_fallback() {
        assert_eq!(language_color("Rust"), "#FFA066");
        assert_eq!(language_color("COBOL"), OTHER_COLOR);
    }

    #[test]
    fn test_repo_card_defaults() {
        let client = ScriptedClient::new().respond(
            format!("{GH}/repos/alice/pulse"),
            HttpResponse::ok(repo_json("alice/pulse", None)),
        );
        let source = CardSource::new(&client, None).with_bases(GH, HF);

        let card = source.fetch_repo_card("alice/pulse").unwrap();
        assert_eq!(card.name, "pulse");
        assert_eq!(card.language, "Other");
        assert_eq!(card.language_color, OTHER_COLOR);
        assert_eq!(card.description, "No description available");
        assert!(card.is_public);
    }

    #[test]
    fn test_repo_card_is_cached() {
        let client = ScriptedClient::new().respond(
            format!("{GH}/repos/alice/pulse"),
            HttpResponse::ok(repo_json("alice/pulse", Some("Rust"))),
        );
        let store = MemoryStore::new();
        let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap());
        let cache = TtlCache::new(&store, &clock);
        let source = CardSource::new(&client, Some(&cache)).with_bases(GH, HF);

        source.fetch_repo_card("alice/pulse").unwrap();
        source.fetch_repo_card("alice/pulse").unwrap();
        assert_eq!(client.requests().len(), 1);
        assert!(store.contains(&cache_key("github_repo", "alice/pulse")));
    }

    #[test]
    fn test_model_card_falls_back_to_dataset() {
        let client = ScriptedClient::new().respond(
            format!("{HF}/api/datasets/alice/corpus"),
            HttpResponse::ok(r#"{"id": "alice/corpus", "likes": 3, "downloads": 40}"#),
        );
        let source = CardSource::new(&client, None).with_bases(GH, HF);

        let card = source.fetch_model_card("alice/corpus").unwrap();
        assert_eq!(card.kind, HubKind::Dataset);
        assert_eq!(card.name, "corpus");
        assert_eq!(card.url, format!("{HF}/datasets/alice/corpus"));
        assert_eq!(
            client.requests(),
            vec![
                format!("{HF}/api/models/alice/corpus"),
                format!("{HF}/api/datasets/alice/corpus")
            ]
        );
    }

    #[test]
    fn test_model_card_uses_pipeline_tag() {
        let client = ScriptedClient::new().respond(
            format!("{HF}/api/models/alice/tiny"),
            HttpResponse::ok(r#"{"id": "alice/tiny", "pipeline_tag": "text-generation", "likes": 1}"#),
        );
        let source = CardSource::new(&client, None).with_bases(GH, HF);

        let card = source.fetch_model_card("alice/tiny").unwrap();
        assert_eq!(card.kind, HubKind::Model);
        assert_eq!(card.description, "text-generation");
        assert_eq!(card.url, format!("{HF}/alice/tiny"));
    }

    #[test]
    fn test_load_cards_outcomes() {
        let mut limited = HttpResponse::with_status(403, "");
        limited.rate_limit_remaining = Some(0);
        let client = ScriptedClient::new()
            .respond(
                format!("{GH}/repos/alice/one"),
                HttpResponse::ok(repo_json("alice/one", Some("Go"))),
            )
            .respond(format!("{GH}/repos/alice/limited"), limited.clone())
            .respond(format!("{HF}/api/models/alice/m"), limited);
        let source = CardSource::new(&client, None).with_bases(GH, HF);

        let cards = source.load_cards(&CardsConfig {
            repos: vec!["alice/missing".into(), "alice/one".into(), "alice/limited".into()],
            models: vec!["alice/m".into()],
        });

        match &cards.repos {
            CardsOutcome::Loaded { cards, failed } => {
                assert_eq!(cards.len(), 1);
                assert_eq!(cards[0].full_name, "alice/one");
                assert_eq!(*failed, 2);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        assert_eq!(cards.models, CardsOutcome::AllFailed { rate_limited: true });

        let empty = source.load_cards(&CardsConfig::default());
        assert_eq!(empty.repos, CardsOutcome::NoneConfigured);
        assert_eq!(empty.models, CardsOutcome::NoneConfigured);
    }
}
