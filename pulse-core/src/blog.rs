//! Markdown blog build
//!
//! Turns `*.md` posts with a `---` frontmatter header into JSON metadata
//! records (`postN.json`), a `manifest.json` listing them, and pre-rendered
//! HTML fragments (`{slug}.html`). Also scaffolds new posts.
//!
//! Global invariants enforced:
//! - Posts are numbered by sorted file name, so numbering is stable across builds
//! - Returned records are ordered newest first; undated posts sort last
//! - Existing posts are never overwritten by `new_post`

use anyhow::{Context, Result};
use chrono::NaiveDate;
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use tracing::{debug, info};

use crate::config::BlogConfig;
use crate::html::html_escape;

pub const MANIFEST_FILE: &str = "manifest.json";

/// Author used when neither the post nor the config names one
pub const FALLBACK_AUTHOR: &str = "Anonymous";

/// Metadata record written as `postN.json`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlogRecord {
    pub title: String,
    pub slug: String,
    pub date: String,
    pub author: String,
    pub excerpt: String,
    pub description: String,
    pub tags: Vec<String>,
}

impl BlogRecord {
    fn sort_date(&self) -> Option<NaiveDate> {
        let day = self.date.get(..10).unwrap_or(&self.date);
        NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
    }
}

/// `{ "files": [...] }` index of the written records
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub files: Vec<String>,
}

/// Outcome of [`build_blog`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlogBuild {
    /// Records, newest first
    pub posts: Vec<BlogRecord>,
    /// Paths written under the data directory
    pub written: Vec<PathBuf>,
}

/// Frontmatter fields and the trimmed body
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontmatter {
    pub metadata: BTreeMap<String, String>,
    pub body: String,
}

/// Split a `---` delimited `key: value` header off `content`.
///
/// Without a header the whole (trimmed) content is the body.
pub fn parse_frontmatter(content: &str) -> Frontmatter {
    static HEADER_RE: OnceLock<Regex> = OnceLock::new();
    let header_re =
        HEADER_RE.get_or_init(|| Regex::new(r"(?s)^---\r?\n(.*?)\r?\n---\r?\n(.*)$").unwrap());

    let Some(caps) = header_re.captures(content) else {
        return Frontmatter {
            metadata: BTreeMap::new(),
            body: content.trim().to_string(),
        };
    };

    let mut metadata = BTreeMap::new();
    for line in caps[1].lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        metadata.insert(key.to_string(), strip_quotes(value.trim()).to_string());
    }

    Frontmatter {
        metadata,
        body: caps[2].trim().to_string(),
    }
}

fn strip_quotes(value: &str) -> &str {
    let value = value
        .strip_prefix('"')
        .or_else(|| value.strip_prefix('\''))
        .unwrap_or(value);
    value
        .strip_suffix('"')
        .or_else(|| value.strip_suffix('\''))
        .unwrap_or(value)
}

/// URL slug for a title: `"Hello, World!"` -> `"hello-world"`
pub fn slugify(title: &str) -> String {
    static STRIP_RE: OnceLock<Regex> = OnceLock::new();
    static SPACE_RE: OnceLock<Regex> = OnceLock::new();
    static DASH_RE: OnceLock<Regex> = OnceLock::new();
    let strip_re = STRIP_RE.get_or_init(|| Regex::new(r"[^a-zA-Z0-9_\s-]").unwrap());
    let space_re = SPACE_RE.get_or_init(|| Regex::new(r"\s+").unwrap());
    let dash_re = DASH_RE.get_or_init(|| Regex::new(r"-+").unwrap());

    let lower = title.to_lowercase();
    let stripped = strip_re.replace_all(&lower, "");
    let dashed = space_re.replace_all(&stripped, "-");
    dash_re.replace_all(&dashed, "-").trim().to_string()
}

/// Metadata record for one post
pub fn blog_record(
    metadata: &BTreeMap<String, String>,
    file_stem: &str,
    default_author: Option<&str>,
) -> BlogRecord {
    let field = |key: &str| metadata.get(key).map(String::as_str).filter(|v| !v.is_empty());

    let title = field("title").unwrap_or(file_stem).to_string();
    let slug = field("slug")
        .map(str::to_string)
        .unwrap_or_else(|| slugify(&title));
    let author = field("author")
        .or(default_author)
        .unwrap_or(FALLBACK_AUTHOR)
        .to_string();
    let excerpt = field("excerpt")
        .or_else(|| field("description"))
        .map(str::to_string)
        .unwrap_or_else(|| format!("Read \"{}\" - a blog post by {}", title, author));
    let description = field("description").map(str::to_string).unwrap_or_else(|| excerpt.clone());
    let tags = field("tags")
        .map(|tags| {
            tags.split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    BlogRecord {
        title,
        slug,
        date: field("date").unwrap_or_default().to_string(),
        author,
        excerpt,
        description,
        tags,
    }
}

fn build_include_set(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern)
            .with_context(|| format!("invalid blog.include pattern: {}", pattern))?;
        builder.add(glob);
    }
    builder.build().context("failed to build blog include set")
}

/// Markdown sources in `dir` matching `include`, sorted by file name
fn markdown_sources(dir: &Path, include: &GlobSet) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(dir)
        .with_context(|| format!("failed to read markdown directory: {}", dir.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to read entry in {}", dir.display()))?;
        let path = entry.path();
        let is_markdown = path.extension().is_some_and(|ext| ext == "md");
        if path.is_file() && is_markdown && include.is_match(entry.file_name()) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn check_slug(slug: &str, source: &Path) -> Result<()> {
    if slug.is_empty() || slug == "." || slug == ".." || slug.contains(['/', '\\']) {
        anyhow::bail!(
            "post {} has an unusable slug {:?}; set `slug:` in its frontmatter",
            source.display(),
            slug
        );
    }
    Ok(())
}

/// Build every post (or only `only_slug`) from `config.markdown_dir` into `config.data_dir`.
///
/// The manifest is rewritten only on full builds, so a single-post rebuild
/// never drops other posts from it.
pub fn build_blog(config: &BlogConfig, only_slug: Option<&str>) -> Result<BlogBuild> {
    let include = build_include_set(&config.include)?;
    let sources = markdown_sources(&config.markdown_dir, &include)?;
    if sources.is_empty() {
        info!("no markdown files found in {}", config.markdown_dir.display());
        return Ok(BlogBuild::default());
    }

    fs::create_dir_all(&config.data_dir)
        .with_context(|| format!("failed to create data directory: {}", config.data_dir.display()))?;

    let mut build = BlogBuild::default();
    let mut manifest = Manifest::default();

    for (index, source) in sources.iter().enumerate() {
        let content = fs::read_to_string(source)
            .with_context(|| format!("failed to read post: {}", source.display()))?;
        let parsed = parse_frontmatter(&content);
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let record = blog_record(&parsed.metadata, &stem, config.default_author.as_deref());

        let json_name = format!("post{}.json", index + 1);
        manifest.files.push(json_name.clone());

        if only_slug.is_some_and(|slug| slug != record.slug) {
            debug!("skipping {} (slug {})", source.display(), record.slug);
            continue;
        }
        check_slug(&record.slug, source)?;

        let json_path = config.data_dir.join(&json_name);
        let json = serde_json::to_string_pretty(&record).context("failed to serialize post")?;
        fs::write(&json_path, json + "\n")
            .with_context(|| format!("failed to write {}", json_path.display()))?;

        let html_path = config.data_dir.join(format!("{}.html", record.slug));
        fs::write(&html_path, markdown_to_html(&parsed.body))
            .with_context(|| format!("failed to write {}", html_path.display()))?;

        info!("generated blog data: {}", json_path.display());
        build.written.push(json_path);
        build.written.push(html_path);
        build.posts.push(record);
    }

    if only_slug.is_none() {
        let manifest_path = config.data_dir.join(MANIFEST_FILE);
        let json = serde_json::to_string_pretty(&manifest).context("failed to serialize manifest")?;
        fs::write(&manifest_path, json + "\n")
            .with_context(|| format!("failed to write {}", manifest_path.display()))?;
        build.written.push(manifest_path);
    }

    // Newest first; undated posts keep file order at the end
    build
        .posts
        .sort_by(|a, b| b.sort_date().cmp(&a.sort_date()));
    Ok(build)
}

/// Template for a freshly scaffolded post
pub fn post_template(title: &str, slug: &str, date: NaiveDate, author: &str) -> String {
    format!(
        r#"---
title: {title}
date: {date}
author: {author}
excerpt: Write a brief excerpt or summary of your blog post here (this appears on the main page).
description: A longer description for SEO purposes (optional, defaults to excerpt).
tags: tag1, tag2, tag3
slug: {slug}
---

# {title}

Write your blog post content here using Markdown syntax.

## Sections

You can use all standard Markdown features:

- **Bold text**
- *Italic text*
- `Inline code`
- [Links](https://example.com)

### Code Blocks

```rust
println!("Hello, world!");
```

### Quotes

> This is a blockquote for important information or quotes.

## Conclusion

Don't forget to update the excerpt and tags in the frontmatter above!
"#,
        title = title,
        slug = slug,
        date = date.format("%Y-%m-%d"),
        author = author,
    )
}

/// Create `{slug}.md` in `markdown_dir`; fails if it already exists
pub fn new_post(markdown_dir: &Path, title: &str, date: NaiveDate, author: &str) -> Result<PathBuf> {
    let title = title.trim();
    if title.is_empty() {
        anyhow::bail!("please provide a title for the blog post");
    }
    let slug = slugify(title);
    if slug.is_empty() {
        anyhow::bail!("title {:?} does not produce a usable slug", title);
    }

    fs::create_dir_all(markdown_dir)
        .with_context(|| format!("failed to create directory: {}", markdown_dir.display()))?;
    let path = markdown_dir.join(format!("{}.md", slug));

    let mut file = match fs::OpenOptions::new().write(true).create_new(true).open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
            anyhow::bail!(
                "a blog post with the slug \"{}\" already exists: {}",
                slug,
                path.display()
            );
        }
        Err(e) => {
            return Err(e).with_context(|| format!("failed to create {}", path.display()));
        }
    };
    file.write_all(post_template(title, &slug, date, author).as_bytes())
        .with_context(|| format!("failed to write {}", path.display()))?;

    info!("created new blog post: {}", path.display());
    Ok(path)
}

enum Block {
    Code { lang: String, text: String },
    Text(Vec<String>),
}

/// Small Markdown subset: headers, emphasis, code, links, lists, quotes, paragraphs
pub fn markdown_to_html(markdown: &str) -> String {
    let mut html = Vec::new();
    for block in split_blocks(markdown) {
        match block {
            Block::Code { lang, text } => {
                let class = if lang.is_empty() {
                    String::new()
                } else {
                    format!(r#" class="language-{}""#, html_escape(&lang))
                };
                html.push(format!("<pre><code{}>{}</code></pre>", class, html_escape(&text)));
            }
            Block::Text(lines) => render_text_block(&lines, &mut html),
        }
    }
    html.join("\n\n")
}

/// Fenced code blocks, then blank-line separated text blocks
fn split_blocks(markdown: &str) -> Vec<Block> {
    let mut blocks = Vec::new();
    let mut text: Vec<String> = Vec::new();
    let mut lines = markdown.lines();

    let flush = |text: &mut Vec<String>, blocks: &mut Vec<Block>| {
        if !text.is_empty() {
            blocks.push(Block::Text(std::mem::take(text)));
        }
    };

    while let Some(line) = lines.next() {
        if let Some(lang) = line.trim_start().strip_prefix("```") {
            flush(&mut text, &mut blocks);
            let mut code = Vec::new();
            for code_line in lines.by_ref() {
                if code_line.trim_start().starts_with("```") {
                    break;
                }
                code.push(code_line);
            }
            blocks.push(Block::Code {
                lang: lang.trim().to_string(),
                text: code.join("\n"),
            });
        } else if line.trim().is_empty() {
            flush(&mut text, &mut blocks);
        } else {
            text.push(line.to_string());
        }
    }
    flush(&mut text, &mut blocks);
    blocks
}

fn render_text_block(lines: &[String], html: &mut Vec<String>) {
    static HEADING_RE: OnceLock<Regex> = OnceLock::new();
    static BULLET_RE: OnceLock<Regex> = OnceLock::new();
    static NUMBERED_RE: OnceLock<Regex> = OnceLock::new();
    let heading_re = HEADING_RE.get_or_init(|| Regex::new(r"^(#{1,6})\s+(.*)$").unwrap());
    let bullet_re = BULLET_RE.get_or_init(|| Regex::new(r"^\s*[-*+]\s+(.*)$").unwrap());
    let numbered_re = NUMBERED_RE.get_or_init(|| Regex::new(r"^\s*\d+\.\s+(.*)$").unwrap());

    let mut paragraph: Vec<String> = Vec::new();
    let mut list: Option<(&'static str, Vec<String>)> = None;
    let mut quote: Vec<String> = Vec::new();

    let flush_paragraph = |paragraph: &mut Vec<String>, html: &mut Vec<String>| {
        if !paragraph.is_empty() {
            html.push(format!("<p>{}</p>", paragraph.join("\n")));
            paragraph.clear();
        }
    };
    let flush_list = |list: &mut Option<(&'static str, Vec<String>)>, html: &mut Vec<String>| {
        if let Some((tag, items)) = list.take() {
            let items: String = items.iter().map(|i| format!("<li>{}</li>", i)).collect();
            html.push(format!("<{tag}>{items}</{tag}>"));
        }
    };
    let flush_quote = |quote: &mut Vec<String>, html: &mut Vec<String>| {
        if !quote.is_empty() {
            html.push(format!("<blockquote>{}</blockquote>", quote.join("\n")));
            quote.clear();
        }
    };

    for line in lines {
        let (tag, item) = if let Some(caps) = bullet_re.captures(line) {
            ("ul", Some(caps[1].to_string()))
        } else if let Some(caps) = numbered_re.captures(line) {
            ("ol", Some(caps[1].to_string()))
        } else {
            ("", None)
        };

        if let Some(item) = item {
            flush_paragraph(&mut paragraph, html);
            flush_quote(&mut quote, html);
            if list.as_ref().is_some_and(|(open, _)| *open != tag) {
                flush_list(&mut list, html);
            }
            list.get_or_insert_with(|| (tag, Vec::new()))
                .1
                .push(render_inline(&item));
            continue;
        }
        flush_list(&mut list, html);

        if let Some(text) = line.strip_prefix('>') {
            flush_paragraph(&mut paragraph, html);
            quote.push(render_inline(text.trim()));
            continue;
        }
        flush_quote(&mut quote, html);

        if let Some(caps) = heading_re.captures(line) {
            flush_paragraph(&mut paragraph, html);
            let level = caps[1].len();
            html.push(format!("<h{level}>{}</h{level}>", render_inline(caps[2].trim())));
        } else {
            paragraph.push(render_inline(line.trim()));
        }
    }
    flush_paragraph(&mut paragraph, html);
    flush_list(&mut list, html);
    flush_quote(&mut quote, html);
}

/// Escape, then apply code spans, emphasis and links (not inside code spans)
fn render_inline(text: &str) -> String {
    static CODE_RE: OnceLock<Regex> = OnceLock::new();
    let code_re = CODE_RE.get_or_init(|| Regex::new(r"`([^`]+)`").unwrap());

    let escaped = html_escape(text);
    let mut out = String::with_capacity(escaped.len());
    let mut last = 0;
    for caps in code_re.captures_iter(&escaped) {
        let (Some(whole), Some(code)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        out.push_str(&render_emphasis(&escaped[last..whole.start()]));
        out.push_str("<code>");
        out.push_str(code.as_str());
        out.push_str("</code>");
        last = whole.end();
    }
    out.push_str(&render_emphasis(&escaped[last..]));
    out
}

fn render_emphasis(text: &str) -> String {
    static STRONG_EM_RE: OnceLock<Regex> = OnceLock::new();
    static STRONG_RE: OnceLock<Regex> = OnceLock::new();
    static EM_RE: OnceLock<Regex> = OnceLock::new();
    static LINK_RE: OnceLock<Regex> = OnceLock::new();
    let strong_em_re = STRONG_EM_RE.get_or_init(|| Regex::new(r"\*\*\*(.+?)\*\*\*").unwrap());
    let strong_re = STRONG_RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").unwrap());
    let em_re = EM_RE.get_or_init(|| Regex::new(r"\*(.+?)\*").unwrap());
    let link_re = LINK_RE.get_or_init(|| Regex::new(r"\[([^\]]+)\]\(([^)\s]+)\)").unwrap());

    let text = strong_em_re.replace_all(text, "<strong><em>$1</em></strong>");
    let text = strong_re.replace_all(&text, "<strong>$1</strong>");
    let text = em_re.replace_all(&text, "<em>$1</em>");
    link_re
        .replace_all(&text, r#"<a href="$2">$1</a>"#)
        .into_owned()
}
