//! Pulse CLI - builds contribution heatmaps, stats, project cards and blog metadata

#![deny(warnings)]

use anyhow::Context;
use clap::{ArgAction, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use pulse_core::blog::{self, FALLBACK_AUTHOR};
use pulse_core::cards::CardSource;
use pulse_core::config::{self, ContributionsConfig, SiteConfig};
use pulse_core::html;
use pulse_core::prefetch::{self, ApiTokens, PrefetchEndpoints};
use pulse_core::{
    load_contributions, Clock, ContentKind, ContentLoader, FileStore, FixedDelay, LoadContext,
    ReqwestClient, SystemClock, TtlCache,
};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

/// Cache directory used when `--cache-dir` is not given (relative to the site root)
const DEFAULT_CACHE_DIR: &str = ".pulse/cache";

/// Prefetched totals picked up next to the config when it embeds none
const STATS_FILE: &str = "stats.json";

#[derive(Parser)]
#[command(name = "pulse")]
#[command(about = "Contribution heatmap, stats, project cards and blog builder for a static portfolio site")]
#[command(version = env!("PULSE_VERSION"))]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(clap::Args)]
struct CacheArgs {
    /// Cache directory (default: .pulse/cache under the site root)
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Always query the upstream APIs
    #[arg(long)]
    no_cache: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the contribution heatmap and stats summary
    Heatmap {
        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json")]
        format: OutputFormat,

        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Prefetch exact totals (GitHub, Hugging Face, WandB) using tokens from the environment
    Stats {
        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Where to write the totals
        #[arg(long, default_value = STATS_FILE)]
        output: PathBuf,
    },
    /// Load repository and Hugging Face model cards
    Cards {
        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output format
        #[arg(long, default_value = "json")]
        format: OutputFormat,

        /// Output file (default: stdout)
        #[arg(long)]
        output: Option<PathBuf>,

        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Render heatmap, stats, cards and content sections into one self-contained HTML page
    Render {
        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Output file
        #[arg(long, default_value = "pulse.html")]
        output: PathBuf,

        /// Page title
        #[arg(long, default_value = "Activity")]
        title: String,

        #[command(flatten)]
        cache: CacheArgs,
    },
    /// Build or scaffold blog posts
    Blog {
        #[command(subcommand)]
        action: BlogAction,
    },
    /// Validate or show the configuration
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum BlogAction {
    /// Convert Markdown posts into JSON metadata and HTML fragments
    Build {
        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,

        /// Only rebuild the post with this slug
        #[arg(long)]
        slug: Option<String>,
    },
    /// Create a new Markdown post from the template
    New {
        /// Post title
        #[arg(required = true, num_args = 1..)]
        title: Vec<String>,

        /// Path to config file (default: auto-discover)
        #[arg(long)]
        config: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Validate every config section without fetching anything
    Validate {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show the resolved configuration
    Show {
        /// Path to config file (default: auto-discover from current directory)
        #[arg(long)]
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Json,
    Html,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let site_root = std::env::current_dir()?;

    match cli.command {
        Commands::Heatmap {
            config,
            format,
            output,
            cache,
        } => {
            let site = load_site(&site_root, config.as_deref())?;
            let contributions = contributions_config(&site)?;
            let store = cache_store(&site, &cache);
            let http = http_client()?;
            let clock = SystemClock;
            let pacer = FixedDelay::default();
            let mut ctx = LoadContext::new(&http, &pacer, &clock);
            if let Some(store) = &store {
                ctx = ctx.with_cache(TtlCache::new(store, &clock));
            }

            let spinner = spinner("Fetching contributions...");
            let view = load_contributions(&contributions, &ctx);
            spinner.finish_and_clear();

            let rendered = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&view)? + "\n",
                OutputFormat::Html => {
                    format!("{}\n{}\n", html::render_heatmap(&view), html::render_stats(&view.stats))
                }
            };
            write_output(output.as_deref(), &rendered)?;
        }
        Commands::Stats { config, output } => {
            let site = load_site(&site_root, config.as_deref())?;
            let contributions = site
                .contributions()
                .context("invalid contributions configuration")?;
            let http = http_client()?;

            let spinner = spinner("Fetching stats...");
            let stats = prefetch::prefetch_stats(
                &contributions,
                &ApiTokens::from_env(),
                &http,
                &SystemClock,
                &PrefetchEndpoints::default(),
            );
            spinner.finish_and_clear();

            prefetch::write_stats_file(&output, &stats)?;
            println!("Stats written to: {}", output.display());
        }
        Commands::Cards {
            config,
            format,
            output,
            cache,
        } => {
            let site = load_site(&site_root, config.as_deref())?;
            let cards_config = site.cards().context("invalid cards configuration")?;
            let store = cache_store(&site, &cache);
            let http = http_client()?;
            let clock = SystemClock;
            let ttl = store.as_ref().map(|s| TtlCache::new(s, &clock));

            let spinner = spinner("Fetching project cards...");
            let cards = CardSource::new(&http, ttl.as_ref()).load_cards(&cards_config);
            spinner.finish_and_clear();

            let rendered = match format {
                OutputFormat::Json => serde_json::to_string_pretty(&cards)? + "\n",
                OutputFormat::Html => format!(
                    "{}\n{}\n",
                    html::render_repo_cards(&cards.repos),
                    html::render_model_cards(&cards.models)
                ),
            };
            write_output(output.as_deref(), &rendered)?;
        }
        Commands::Render {
            config,
            output,
            title,
            cache,
        } => {
            let site = load_site(&site_root, config.as_deref())?;
            let store = cache_store(&site, &cache);
            let http = http_client()?;
            let clock = SystemClock;
            let pacer = FixedDelay::default();
            let mut ctx = LoadContext::new(&http, &pacer, &clock);
            if let Some(store) = &store {
                ctx = ctx.with_cache(TtlCache::new(store, &clock));
            }

            let spinner = spinner("Rendering page...");
            let mut sections = Vec::new();

            // Each widget reads its own config section and degrades on its own
            match contributions_config(&site) {
                Ok(contributions) => {
                    let view = load_contributions(&contributions, &ctx);
                    sections.push(html::render_section(
                        "contributions",
                        "Contributions",
                        &format!("{}\n{}", html::render_heatmap(&view), html::render_stats(&view.stats)),
                    ));
                }
                Err(e) => {
                    warn!("skipping heatmap: {e:#}");
                    sections.push(html::render_section(
                        "contributions",
                        "Contributions",
                        &html::render_empty_state("Contribution settings are invalid; see the build log."),
                    ));
                }
            }

            match site.cards() {
                Ok(cards_config) => {
                    let cards = CardSource::new(&http, ctx.cache.as_ref()).load_cards(&cards_config);
                    sections.push(html::render_section(
                        "open-source",
                        "Open Source",
                        &html::render_repo_cards(&cards.repos),
                    ));
                    sections.push(html::render_section(
                        "models",
                        "Models & Datasets",
                        &html::render_model_cards(&cards.models),
                    ));
                }
                Err(e) => {
                    warn!("skipping project cards: {e:#}");
                    sections.push(html::render_section(
                        "open-source",
                        "Open Source",
                        &html::render_empty_state("Project card settings are invalid; see the build log."),
                    ));
                }
            }

            match site.content() {
                Ok(content_config) => {
                    let content = ContentLoader::new(content_config.rooted_at(&site.root()));
                    sections.push(content_section(
                        ContentKind::Publications,
                        "Publications",
                        content.publications().map(|items| html::render_publications(&items)),
                    ));
                    sections.push(content_section(
                        ContentKind::BlogPosts,
                        "Blog",
                        content.blog_posts().map(|posts| html::render_blog_posts(&posts)),
                    ));
                    sections.push(content_section(
                        ContentKind::Updates,
                        "Updates",
                        content.updates().map(|updates| html::render_updates(&updates)),
                    ));
                }
                Err(e) => {
                    warn!("skipping content sections: {e:#}");
                    sections.push(html::render_section(
                        "publications",
                        "Publications",
                        &html::render_content_error(ContentKind::Publications, &e),
                    ));
                }
            }
            spinner.finish_and_clear();

            let page = html::render_page(&title, clock.now(), &sections);
            write_output(Some(output.as_path()), &page)?;
            eprintln!("HTML page written to: {}", output.display());
        }
        Commands::Blog { action } => match action {
            BlogAction::Build { config, slug } => {
                let site = load_site(&site_root, config.as_deref())?;
                let blog_config = site
                    .blog()
                    .context("invalid blog configuration")?
                    .rooted_at(&site.root());

                if let Some(slug) = &slug {
                    println!("Building blog post: {}", slug);
                }
                let build = blog::build_blog(&blog_config, slug.as_deref())?;
                if slug.is_some() && build.posts.is_empty() {
                    anyhow::bail!("no blog post with slug {:?}", slug.unwrap_or_default());
                }

                println!("Built {} blog post(s)", build.posts.len());
                for post in &build.posts {
                    println!("  - {} ({}) {}", post.title, post.slug, post.date);
                }
            }
            BlogAction::New { title, config } => {
                let site = load_site(&site_root, config.as_deref())?;
                let blog_config = site
                    .blog()
                    .context("invalid blog configuration")?
                    .rooted_at(&site.root());
                let author = blog_config
                    .default_author
                    .as_deref()
                    .unwrap_or(FALLBACK_AUTHOR);

                let title = title.join(" ");
                let path = blog::new_post(&blog_config.markdown_dir, &title, SystemClock.today(), author)?;
                println!("Created new blog post: {}", path.display());
                println!("Next: edit the post, then run `pulse blog build`");
            }
        },
        Commands::Config { action } => match action {
            ConfigAction::Validate { path } => {
                let loaded = config::load(&site_root, path.as_deref()).and_then(|site| {
                    site.validate()?;
                    Ok(site)
                });

                match loaded {
                    Ok(site) => {
                        if let Some(ref p) = site.config_path {
                            println!("Config valid: {}", p.display());
                        } else {
                            println!("No config file found. Using defaults.");
                        }
                    }
                    Err(e) => {
                        eprintln!("Config validation failed: {:#}", e);
                        std::process::exit(1);
                    }
                }
            }
            ConfigAction::Show { path } => {
                let site = config::load(&site_root, path.as_deref())
                    .context("failed to load configuration")?;

                println!("Configuration:");
                match &site.config_path {
                    Some(p) => println!("  Source: {}", p.display()),
                    None => println!("  Source: defaults (no config file found)"),
                }
                match site.contributions() {
                    Ok(c) => {
                        println!("  GitHub: {}", c.github_username().unwrap_or("disabled"));
                        println!(
                            "  Hugging Face: {}",
                            c.huggingface_username().unwrap_or("disabled")
                        );
                        println!("  WandB: {}", c.wandb_username().unwrap_or("disabled"));
                        println!(
                            "  Prefetched stats: {}",
                            if c.prefetched_stats.is_some() { "yes" } else { "no" }
                        );
                    }
                    Err(e) => println!("  Contributions: invalid ({:#})", e),
                }
                match site.cards() {
                    Ok(c) => {
                        println!("  Repositories: {}", c.repos.len());
                        println!("  Models: {}", c.models.len());
                    }
                    Err(e) => println!("  Cards: invalid ({:#})", e),
                }
                match site.blog() {
                    Ok(b) => {
                        let b = b.rooted_at(&site.root());
                        println!("  Blog markdown: {}", b.markdown_dir.display());
                        println!("  Blog data: {}", b.data_dir.display());
                        println!("  Blog include: {}", b.include.join(", "));
                    }
                    Err(e) => println!("  Blog: invalid ({:#})", e),
                }
                match site.content() {
                    Ok(c) => {
                        let c = c.rooted_at(&site.root());
                        println!("  Content data: {}", c.data_dir.display());
                        println!(
                            "  Content limits: {} blog posts, {} updates ({:?} order)",
                            c.max_blog_posts, c.max_updates, c.sort_order
                        );
                    }
                    Err(e) => println!("  Content: invalid ({:#})", e),
                }
            }
        },
    }

    Ok(())
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,pulse_core={level},pulse={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn load_site(root: &Path, config_path: Option<&Path>) -> anyhow::Result<SiteConfig> {
    let site = config::load(root, config_path)?;
    if let Some(p) = &site.config_path {
        debug!("using config: {}", p.display());
    }
    Ok(site)
}

/// One content section, or its error state when the section could not be loaded
fn content_section(kind: ContentKind, heading: &str, body: anyhow::Result<String>) -> String {
    let body = body.unwrap_or_else(|e| {
        warn!("failed to load {}: {e:#}", kind.label());
        html::render_content_error(kind, &e)
    });
    html::render_section(kind.dir_name(), heading, &body)
}

/// Contributions section, with `stats.json` next to the config filling in missing prefetched totals
fn contributions_config(site: &SiteConfig) -> anyhow::Result<ContributionsConfig> {
    let mut contributions = site
        .contributions()
        .context("invalid contributions configuration")?;
    if contributions.prefetched_stats.is_none() {
        let stats_path = site.root().join(STATS_FILE);
        if stats_path.exists() {
            match prefetch::load_stats_file(&stats_path) {
                Ok(stats) => contributions.prefetched_stats = Some(stats),
                Err(e) => warn!("ignoring prefetched stats: {e:#}"),
            }
        }
    }
    Ok(contributions)
}

fn cache_store(site: &SiteConfig, args: &CacheArgs) -> Option<FileStore> {
    if args.no_cache {
        return None;
    }
    let dir = args
        .cache_dir
        .clone()
        .unwrap_or_else(|| site.root().join(DEFAULT_CACHE_DIR));
    Some(FileStore::new(dir))
}

fn http_client() -> anyhow::Result<ReqwestClient> {
    ReqwestClient::new(&format!("pulse/{}", env!("PULSE_VERSION")))
        .context("failed to build HTTP client")
}

fn spinner(message: &'static str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner} {msg}") {
        spinner.set_style(style);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Write to `path` (temp + rename) or stdout
fn write_output(path: Option<&Path>, content: &str) -> anyhow::Result<()> {
    let Some(path) = path else {
        print!("{}", content);
        return Ok(());
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory: {}", parent.display()))?;
    }
    let mut temp_name = path.as_os_str().to_owned();
    temp_name.push(".tmp");
    let temp_path = PathBuf::from(temp_name);
    std::fs::write(&temp_path, content)
        .with_context(|| format!("failed to write temporary file: {}", temp_path.display()))?;
    std::fs::rename(&temp_path, path)
        .with_context(|| format!("failed to rename temporary file to: {}", path.display()))?;
    Ok(())
}
