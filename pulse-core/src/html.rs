//! HTML rendering
//!
//! Produces HTML fragments for each widget (heatmap, stats panel, project
//! cards, content sections) and a self-contained page with embedded CSS that works offline.
//! All interpolated text goes through [`html_escape`].

use chrono::{DateTime, Utc};

use crate::cards::{CardsOutcome, ModelCard, RepoCard};
use crate::content::{parse_loose_date, ContentKind, Link, PostSummary, Publication, Update};
use crate::contributions::{ContributionsView, LoadState};
use crate::grid::{Cell, HeatmapGrid};
use crate::level::ContributionLevel;
use crate::stats::StatsSummary;

/// Row labels for the Sunday-first grid
const DAY_LABELS: [&str; 7] = ["", "Mon", "", "Wed", "", "Fri", ""];

/// Escape HTML special characters
pub fn html_escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Placeholder card shown when a widget has nothing to display
pub fn render_empty_state(message: &str) -> String {
    format!(
        r#"<div class="card"><div class="empty-state">{}</div></div>"#,
        html_escape(message)
    )
}

/// Contribution heatmap: day labels, month row, week columns and legend
pub fn render_heatmap(view: &ContributionsView) -> String {
    let notice = if view.state == LoadState::PartialFailure {
        r#"
    <div class="heatmap-notice">Some activity could not be loaded; counts may be incomplete.</div>"#
    } else {
        ""
    };

    format!(
        r#"<div class="heatmap-container">
    <div class="heatmap-title">{total} contributions in the last year</div>{notice}
    <div class="heatmap-wrapper">
        <div class="heatmap-day-labels">{day_labels}</div>
        <div class="heatmap-content">
            {month_row}
            {weeks}
        </div>
    </div>
    {legend}
</div>"#,
        total = view.buckets.total(),
        notice = notice,
        day_labels = render_day_labels(),
        month_row = render_month_row(&view.grid),
        weeks = render_week_columns(&view.grid),
        legend = render_legend(),
    )
}

fn render_day_labels() -> String {
    DAY_LABELS
        .iter()
        .map(|label| format!(r#"<div class="heatmap-day-label">{}</div>"#, label))
        .collect()
}

fn render_month_row(grid: &HeatmapGrid) -> String {
    let labels: String = grid
        .month_row
        .iter()
        .map(|label| format!(r#"<div class="heatmap-month-label">{}</div>"#, html_escape(label)))
        .collect();
    format!(r#"<div class="heatmap-month-row">{}</div>"#, labels)
}

fn render_week_columns(grid: &HeatmapGrid) -> String {
    let mut html = String::from(r#"<div class="heatmap-week-columns">"#);
    for week in &grid.weeks {
        html.push_str(r#"<div class="heatmap-week">"#);
        for cell in &week.cells {
            match cell {
                Cell::Padding => html.push_str(r#"<div class="heatmap-square empty"></div>"#),
                Cell::Day(day) => html.push_str(&format!(
                    r#"<div class="heatmap-square level-{level}" data-date="{date}" data-count="{count}" title="{title}"></div>"#,
                    level = day.level.value(),
                    date = day.date.format("%Y-%m-%d"),
                    count = day.count,
                    title = html_escape(&day.tooltip),
                )),
            }
        }
        html.push_str("</div>");
    }
    html.push_str("</div>");
    html
}

fn render_legend() -> String {
    let squares: String = ContributionLevel::all()
        .map(|level| format!(r#"<div class="heatmap-square level-{}"></div>"#, level.value()))
        .collect();
    format!(
        r#"<div class="heatmap-legend"><span>Less</span><div class="heatmap-legend-squares">{}</div><span>More</span></div>"#,
        squares
    )
}

/// Four-slot stats panel, each value captioned with where it comes from
pub fn render_stats(stats: &StatsSummary) -> String {
    let items = [
        ("Commits", "Last Year", stats.commits),
        ("Models", "Hugging Face", stats.models),
        ("Datasets", "Hugging Face", stats.datasets),
        ("Experiments", "WandB", stats.experiments),
    ];
    let body: String = items
        .iter()
        .map(|(label, source, value)| {
            format!(
                r#"
    <div class="stat-item">
        <span class="stat-value">{value}</span>
        <span class="stat-label">{label}</span>
        <span class="stat-source">{source}</span>
    </div>"#
            )
        })
        .collect();
    format!(r#"<div class="contributions-stats">{}
</div>"#, body)
}

/// Repository cards, or the matching empty state
pub fn render_repo_cards(outcome: &CardsOutcome<RepoCard>) -> String {
    match outcome {
        CardsOutcome::NoneConfigured => render_empty_state(
            "No repositories configured. Add repositories to the `repos` list in the site config.",
        ),
        CardsOutcome::AllFailed { rate_limited: true } => render_empty_state(
            "GitHub API rate limit exceeded. Please wait a few minutes and try again.",
        ),
        CardsOutcome::AllFailed { rate_limited: false } => render_empty_state(
            "Failed to load repositories. Please check the repository names in the site config.",
        ),
        CardsOutcome::Loaded { cards, .. } => cards.iter().map(render_repo_card).collect(),
    }
}

fn render_repo_card(card: &RepoCard) -> String {
    let badge = if card.is_public {
        r#"<span class="card-badge">Public</span>"#
    } else {
        ""
    };
    let mut footer = format!(
        r#"<span class="card-language"><span class="card-dot" style="background-color: {color}"></span>{language}</span>"#,
        color = html_escape(&card.language_color),
        language = html_escape(&card.language),
    );
    if card.stars > 0 {
        footer.push_str(&format!(r#"<span class="card-stat">&#9733; {}</span>"#, card.stars));
    }
    if card.forks > 0 {
        footer.push_str(&format!(r#"<span class="card-stat">forks {}</span>"#, card.forks));
    }

    format!(
        r#"
<div class="project-card">
    <div class="card-header"><a href="{url}" class="card-name" target="_blank" rel="noopener">{name}</a>{badge}</div>
    <div class="card-description">{description}</div>
    <div class="card-footer">{footer}</div>
</div>"#,
        url = html_escape(&card.url),
        name = html_escape(&card.name),
        badge = badge,
        description = html_escape(&card.description),
        footer = footer,
    )
}

/// Hugging Face cards, or the matching empty state
pub fn render_model_cards(outcome: &CardsOutcome<ModelCard>) -> String {
    match outcome {
        CardsOutcome::NoneConfigured => {
            render_empty_state("No Hugging Face models configured.")
        }
        CardsOutcome::AllFailed { rate_limited: true } => render_empty_state(
            "Hugging Face API rate limit exceeded. Please wait a few minutes and try again.",
        ),
        CardsOutcome::AllFailed { rate_limited: false } => {
            render_empty_state("Failed to load Hugging Face models.")
        }
        CardsOutcome::Loaded { cards, .. } => cards.iter().map(render_model_card).collect(),
    }
}

fn render_model_card(card: &ModelCard) -> String {
    let mut footer = format!(
        r#"<span class="card-language"><span class="card-dot" style="background-color: {color}"></span>{kind}</span>"#,
        color = card.kind.color(),
        kind = card.kind.label(),
    );
    if card.likes > 0 {
        footer.push_str(&format!(r#"<span class="card-stat">&#9829; {}</span>"#, card.likes));
    }
    if card.downloads > 0 {
        footer.push_str(&format!(r#"<span class="card-stat">downloads {}</span>"#, card.downloads));
    }

    format!(
        r#"
<div class="project-card">
    <div class="card-header"><a href="{url}" class="card-name" target="_blank" rel="noopener">{id}</a></div>
    <div class="card-description">{description}</div>
    <div class="card-footer">{footer}</div>
</div>"#,
        url = html_escape(&card.url),
        id = html_escape(&card.id),
        description = html_escape(&card.description),
        footer = footer,
    )
}

/// Empty state for a content section with no records
pub fn render_no_content(kind: ContentKind) -> String {
    render_empty_state(&format!("No {} available yet.", kind.label()))
}

/// Error state for a content section that could not be loaded
pub fn render_content_error(kind: ContentKind, error: &anyhow::Error) -> String {
    format!(
        r#"<div class="error"><strong>Error loading {}:</strong> {}</div>"#,
        kind.label(),
        html_escape(&format!("{error:#}"))
    )
}

fn render_links(links: &[Link]) -> String {
    links
        .iter()
        .map(|link| {
            format!(
                r#"<a href="{}" class="paper-link" target="_blank" rel="noopener">{}</a>"#,
                html_escape(&link.url),
                html_escape(&link.name)
            )
        })
        .collect()
}

/// "March 1, 2024", or the raw text when it is not a date
fn long_date(text: &str) -> String {
    parse_loose_date(text)
        .map(|d| d.format("%B %-d, %Y").to_string())
        .unwrap_or_else(|| text.to_string())
}

/// "Mar 2024", or the raw text when it is not a date
fn month_year(text: &str) -> String {
    parse_loose_date(text)
        .map(|d| d.format("%b %Y").to_string())
        .unwrap_or_else(|| text.to_string())
}

pub fn render_publications(items: &[Publication]) -> String {
    if items.is_empty() {
        return render_no_content(ContentKind::Publications);
    }
    items.iter().map(render_publication).collect()
}

fn render_publication(publication: &Publication) -> String {
    let mut body = format!(
        r#"<div class="paper-title">{}</div>"#,
        html_escape(&publication.title)
    );
    for (class, text) in [
        ("paper-authors", &publication.authors),
        ("paper-venue", &publication.venue),
        ("paper-description", &publication.description),
    ] {
        if let Some(text) = text {
            body.push_str(&format!(r#"<div class="{class}">{}</div>"#, html_escape(text)));
        }
    }
    if !publication.links.is_empty() {
        body.push_str(&format!(
            r#"<div class="paper-links">{}</div>"#,
            render_links(&publication.links)
        ));
    }
    format!("\n<div class=\"card\">{body}</div>")
}

pub fn render_blog_posts(posts: &[PostSummary]) -> String {
    if posts.is_empty() {
        return render_no_content(ContentKind::BlogPosts);
    }
    posts
        .iter()
        .map(|post| {
            format!(
                r#"
<div class="card">
    <div class="paper-title">{title}</div>
    <div class="blog-date">{date}</div>
    <div class="blog-excerpt">{excerpt}</div>
    <div class="paper-links">{links}</div>
</div>"#,
                title = html_escape(&post.title),
                date = html_escape(&long_date(&post.date)),
                excerpt = html_escape(&post.excerpt),
                links = render_links(&post.links),
            )
        })
        .collect()
}

pub fn render_updates(updates: &[Update]) -> String {
    if updates.is_empty() {
        return render_no_content(ContentKind::Updates);
    }
    updates
        .iter()
        .map(|update| {
            format!(
                r#"
<div class="card"><div class="update-item"><div class="update-date">{}</div><div class="update-content">{}</div></div></div>"#,
                html_escape(&month_year(&update.date)),
                html_escape(&update.content)
            )
        })
        .collect()
}

/// One titled block of a page
pub fn render_section(id: &str, heading: &str, body: &str) -> String {
    format!(
        r#"<section id="{id}">
    <h2>{heading}</h2>
    {body}
</section>"#,
        id = html_escape(id),
        heading = html_escape(heading),
        body = body,
    )
}

/// Self-contained page around already rendered sections
pub fn render_page(title: &str, generated_at: DateTime<Utc>, sections: &[String]) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="UTF-8">
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
    <title>{title}</title>
    <style>{css}</style>
</head>
<body>
    <div class="container">
        <header><h1>{title}</h1></header>
        {sections}
        <footer><p>Generated {generated} by Pulse</p></footer>
    </div>
</body>
</html>"#,
        title = html_escape(title),
        css = inline_css(),
        sections = sections.join("\n"),
        generated = generated_at.format("%Y-%m-%d %H:%M UTC"),
    )
}

fn inline_css() -> &'static str {
    r#"
* { box-sizing: border-box; margin: 0; padding: 0; }

body {
    font-family: system-ui, -apple-system, 'Segoe UI', sans-serif;
    line-height: 1.6;
    color: #111827;
    background: #ffffff;
}

.container { max-width: 1100px; margin: 0 auto; padding: 2rem; }

header { margin-bottom: 2rem; padding-bottom: 1rem; border-bottom: 2px solid #e5e7eb; }
header h1 { font-size: 2rem; font-weight: 700; }

section { margin-bottom: 2.5rem; }
section h2 { font-size: 1.25rem; margin-bottom: 1rem; }

/* Heatmap */
.heatmap-title { font-weight: 600; margin-bottom: 0.5rem; }
.heatmap-notice { color: #92400e; font-size: 0.875rem; margin-bottom: 0.5rem; }
.heatmap-wrapper { display: flex; gap: 4px; overflow-x: auto; }
.heatmap-day-labels { display: flex; flex-direction: column; gap: 3px; margin-top: 18px; }
.heatmap-day-label { height: 11px; font-size: 9px; line-height: 11px; color: #6b7280; }
.heatmap-month-row { display: flex; gap: 3px; height: 15px; }
.heatmap-month-label { width: 11px; font-size: 9px; color: #6b7280; overflow: visible; white-space: nowrap; }
.heatmap-week-columns { display: flex; gap: 3px; }
.heatmap-week { display: flex; flex-direction: column; gap: 3px; }
.heatmap-square { width: 11px; height: 11px; border-radius: 2px; }
.heatmap-square.empty { background: transparent; pointer-events: none; }
.level-0 { background: #ebedf0; }
.level-1 { background: #9be9a8; }
.level-2 { background: #40c463; }
.level-3 { background: #30a14e; }
.level-4 { background: #216e39; }
.heatmap-legend { display: flex; align-items: center; gap: 4px; justify-content: flex-end; font-size: 0.75rem; color: #6b7280; margin-top: 0.5rem; }
.heatmap-legend-squares { display: flex; gap: 3px; }

/* Stats */
.contributions-stats { display: grid; grid-template-columns: repeat(4, 1fr); gap: 1rem; margin-top: 1rem; }
.stat-item { background: #f9fafb; border: 1px solid #e5e7eb; border-radius: 8px; padding: 1rem; text-align: center; }
.stat-value { display: block; font-size: 1.5rem; font-weight: 700; }
.stat-label { color: #6b7280; font-size: 0.875rem; }
.stat-source { display: block; color: #9ca3af; font-size: 0.75rem; }
.paper-title { font-weight: 600; margin-bottom: 0.25rem; }
.paper-authors, .paper-venue, .blog-date, .update-date { color: #6b7280; font-size: 0.875rem; }
.paper-description, .blog-excerpt { margin-top: 0.5rem; }
.paper-link { margin-right: 0.75rem; font-size: 0.875rem; }
.update-item { display: flex; gap: 1rem; }
.error { background: #fef2f2; border: 1px solid #fecaca; border-radius: 8px; padding: 1rem; color: #991b1b; }

/* Cards */
.project-card { border: 1px solid #e5e7eb; border-radius: 8px; padding: 1rem; margin-bottom: 1rem; }
.card-header { display: flex; justify-content: space-between; align-items: center; }
.card-name { font-weight: 600; color: #1d4ed8; text-decoration: none; }
.card-badge { font-size: 0.75rem; border: 1px solid #d1d5db; border-radius: 999px; padding: 0 0.5rem; color: #6b7280; }
.card-description { color: #4b5563; margin: 0.5rem 0; }
.card-footer { display: flex; gap: 1rem; font-size: 0.875rem; color: #6b7280; }
.card-dot { display: inline-block; width: 10px; height: 10px; border-radius: 50%; margin-right: 4px; }

.empty-state { color: #6b7280; font-style: italic; padding: 1rem; }

footer { margin-top: 3rem; padding-top: 1rem; border-top: 1px solid #e5e7eb; color: #9ca3af; font-size: 0.875rem; }
"#
}
