//! Config-driven page builds: config file -> widgets -> HTML

use chrono::{TimeZone, Utc};
use pulse_core::cards::{CardSource, CardsOutcome};
use pulse_core::config;
use pulse_core::html::{render_heatmap, render_page, render_repo_cards, render_section};
use pulse_core::http::{HttpResponse, ScriptedClient};
use pulse_core::{load_contributions, FixedClock, LoadContext, LoadState, NoDelay};
use std::fs;

const GH: &str = "https://gh.test";
const HF: &str = "https://hf.test";

fn write_config(dir: &std::path::Path, json: &str) {
    fs::write(dir.join(".pulserc.json"), json).unwrap();
}

#[test]
fn test_discovered_config_drives_a_full_page() {
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        r#"{
            "github": {"enabled": true, "username": "alice"},
            "repos": ["alice/pulse", "alice/gone"]
        }"#,
    );
    let site = config::load(dir.path(), None).unwrap();
    assert_eq!(site.root(), dir.path());

    let client = ScriptedClient::new()
        .respond(
            format!("{GH}/users/alice/events/public?per_page=100&page=1"),
            HttpResponse::ok(
                r#"[{"type": "PushEvent", "created_at": "2024-03-01T12:00:00Z", "payload": {"size": 2}}]"#,
            ),
        )
        .respond(
            format!("{GH}/users/alice/events/public?per_page=100&page=2"),
            HttpResponse::ok("[]"),
        )
        .respond(
            format!("{GH}/users/alice/repos?per_page=10&sort=updated"),
            HttpResponse::ok("[]"),
        )
        .respond(
            format!("{GH}/repos/alice/pulse"),
            HttpResponse::ok(
                r#"{"name": "pulse", "full_name": "alice/pulse", "description": "Activity <widgets>",
                    "language": "Rust", "html_url": "https://github.com/alice/pulse",
                    "stargazers_count": 7, "forks_count": 1, "private": false}"#,
            ),
        );
    let clock = FixedClock::new(Utc.with_ymd_and_hms(2024, 3, 2, 18, 0, 0).unwrap());

    let ctx = LoadContext::new(&client, &NoDelay, &clock).with_github_api(GH);
    let view = load_contributions(&site.contributions().unwrap(), &ctx);
    assert_eq!(view.state, LoadState::Success);

    let cards = CardSource::new(&client, None)
        .with_bases(GH, HF)
        .load_cards(&site.cards().unwrap());
    assert!(matches!(cards.repos, CardsOutcome::Loaded { failed: 1, .. }));
    assert_eq!(cards.models, CardsOutcome::NoneConfigured);

    let page = render_page(
        "Alice",
        view.generated_at,
        &[
            render_section("activity", "Activity", &render_heatmap(&view)),
            render_section("projects", "Projects", &render_repo_cards(&cards.repos)),
        ],
    );
    assert!(page.starts_with("<!DOCTYPE html>"));
    assert!(page.contains("2 contributions in the last year"));
    assert!(page.contains(r#"data-date="2024-03-01""#));
    assert!(page.contains("Activity &lt;widgets&gt;"));
    assert!(!page.contains("alice/gone"));
}

#[test]
fn test_broken_section_only_affects_its_widget() {
    let dir = tempfile::tempdir().unwrap();
    write_config(
        dir.path(),
        r#"{
            "github": {"enabled": true, "username": "alice"},
            "repos": ["not a repo"],
            "blog": {"include": ["[oops"]}
        }"#,
    );
    let site = config::load(dir.path(), None).unwrap();

    assert_eq!(
        site.contributions().unwrap().github_username(),
        Some("alice")
    );
    assert!(site.cards().is_err());
    assert!(site.blog().is_err());
    assert!(site.validate().is_err());
}

#[test]
fn test_missing_config_falls_back_to_defaults() {
    let dir = tempfile::tempdir().unwrap();

    let site = config::load(dir.path(), None).unwrap();

    assert!(site.config_path.is_none());
    assert!(site.validate().is_ok());
    assert_eq!(site.contributions().unwrap().github_username(), None);
    assert_eq!(
        site.blog().unwrap().markdown_dir,
        std::path::PathBuf::from("blog/markdown")
    );
}

#[test]
fn test_explicit_path_must_hold_an_object() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("site.json");
    fs::write(&path, "[1, 2, 3]").unwrap();

    assert!(config::load(dir.path(), Some(&path)).is_err());
}
