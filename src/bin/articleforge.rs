//! CLI binary for articleforge.
//!
//! A thin shim over the library crate: maps flags to `PipelineConfig`,
//! wires the collaborators, runs a batch against a JSON file store, and
//! prints a per-article report.

use anyhow::{bail, Context, Result};
use articleforge::pipeline::resolve::ImageResolver;
use articleforge::pipeline::revalidate::CacheInvalidator;
use articleforge::pipeline::storage::BlobStorage;
use articleforge::{
    Article, ArticleMode, BatchProgressCallback, Disposition, JsonFileStore, LlmGenerator,
    PipelineConfig, ProgressCallback, Scheduler,
};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI definition ───────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "articleforge",
    about = "AI article pipeline: rewrite or generate SEO articles with durable image rehosting",
    version
)]
struct Cli {
    /// Path to the JSON article store.
    #[arg(long, global = true, default_value = "articles.json")]
    store: PathBuf,

    /// Verbose logging (or set RUST_LOG).
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run one processing batch.
    Run {
        /// Process only this article id, bypassing the cooldown guard.
        #[arg(long)]
        article: Option<String>,

        /// Maximum articles in this batch.
        #[arg(long)]
        limit: Option<usize>,

        /// LLM provider name (openai, anthropic, …). Auto-detected when omitted.
        #[arg(long, env = "ARTICLEFORGE_PROVIDER")]
        provider: Option<String>,

        /// Model identifier, e.g. gpt-4.1-mini.
        #[arg(long, env = "ARTICLEFORGE_MODEL")]
        model: Option<String>,

        /// Cooldown window in hours before a failed article is retried.
        #[arg(long)]
        cooldown_hours: Option<i64>,

        /// Site revalidation endpoint, e.g. https://example.com/api/revalidate
        #[arg(long, env = "REVALIDATE_URL")]
        revalidate_url: Option<String>,

        /// Shared secret for the revalidation endpoint.
        #[arg(long, env = "REVALIDATE_SECRET", hide_env_values = true)]
        revalidate_secret: Option<String>,

        /// Print the batch report as JSON instead of the table.
        #[arg(long)]
        json: bool,
    },

    /// List every article in the store with its status.
    List,

    /// Add a pending article to the store.
    Add {
        id: String,

        #[arg(long)]
        slug: String,

        #[arg(long)]
        title: String,

        /// rewrite or generate.
        #[arg(long)]
        mode: String,

        #[arg(long)]
        category: Option<String>,

        /// File containing the source text (rewrite mode).
        #[arg(long)]
        source_file: Option<PathBuf>,
    },
}

// ── Progress bar ─────────────────────────────────────────────────────────

struct CliProgress {
    bar: ProgressBar,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} [{bar:40.green/238}] {pos}/{len} articles  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

impl BatchProgressCallback for CliProgress {
    fn on_batch_start(&self, total: usize) {
        self.bar.set_length(total as u64);
    }

    fn on_article_start(&self, _position: usize, _total: usize, slug: &str) {
        self.bar.set_message(slug.to_string());
    }

    fn on_article_complete(&self, position: usize, total: usize, slug: &str) {
        self.bar
            .println(format!("  {} {:>2}/{:<2}  {}", green("✓"), position, total, slug));
        self.bar.inc(1);
    }

    fn on_article_skipped(&self, position: usize, total: usize, slug: &str, reason: &str) {
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {}  {}",
            yellow("→"),
            position,
            total,
            slug,
            dim(reason)
        ));
        self.bar.inc(1);
    }

    fn on_article_failed(&self, position: usize, total: usize, slug: &str, error: &str) {
        let msg = if error.len() > 80 {
            format!("{}…", &error[..79])
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {:>2}/{:<2}  {}  {}",
            red("✗"),
            position,
            total,
            slug,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, _total: usize, _completed: usize) {
        self.bar.finish_and_clear();
    }
}

// ── Entry point ──────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("articleforge=debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("articleforge=warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Command::Run {
            article,
            limit,
            provider,
            model,
            cooldown_hours,
            revalidate_url,
            revalidate_secret,
            json,
        } => {
            run_batch(
                &cli.store,
                article,
                limit,
                provider,
                model,
                cooldown_hours,
                revalidate_url,
                revalidate_secret,
                json,
            )
            .await
        }
        Command::List => list(&cli.store),
        Command::Add {
            id,
            slug,
            title,
            mode,
            category,
            source_file,
        } => add(&cli.store, id, slug, title, &mode, category, source_file),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_batch(
    store_path: &PathBuf,
    article: Option<String>,
    limit: Option<usize>,
    provider: Option<String>,
    model: Option<String>,
    cooldown_hours: Option<i64>,
    revalidate_url: Option<String>,
    revalidate_secret: Option<String>,
    json: bool,
) -> Result<()> {
    let mut builder = PipelineConfig::builder();
    if let Some(p) = provider {
        builder = builder.provider_name(p);
    }
    if let Some(m) = model {
        builder = builder.model(m);
    }
    if let Some(h) = cooldown_hours {
        builder = builder.cooldown_hours(h);
    }
    if !json {
        builder = builder.progress_callback(CliProgress::new() as ProgressCallback);
    }
    let config = builder.build()?;
    let limit = limit.unwrap_or(config.batch_limit);

    let store = Arc::new(
        JsonFileStore::open(store_path)
            .with_context(|| format!("opening store {}", store_path.display()))?,
    );
    let generator = Arc::new(LlmGenerator::from_config(&config)?);
    let resolver = Arc::new(ImageResolver::from_env(config.fetch_timeout_secs));
    let storage = Arc::new(BlobStorage::from_env(config.fetch_timeout_secs));

    let mut scheduler = Scheduler::new(store, generator, resolver, storage, config);
    if let Some(url) = revalidate_url {
        scheduler = scheduler
            .with_invalidator(Arc::new(CacheInvalidator::new(url, revalidate_secret, 10)));
    }

    let output = scheduler.run_batch(limit, article.as_deref()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    println!();
    println!(
        "{}  {} completed, {} failed, {} skipped  {}",
        bold("Batch finished:"),
        green(&output.stats.completed.to_string()),
        red(&output.stats.failed.to_string()),
        yellow(&output.stats.skipped.to_string()),
        dim(&format!("{}ms", output.stats.total_duration_ms)),
    );
    for outcome in &output.outcomes {
        if let Disposition::Failed { kind, detail } = &outcome.disposition {
            println!("  {} {} [{:?}] {}", red("✗"), outcome.slug, kind, detail);
        }
    }

    if output.stats.failed > 0 && output.stats.completed == 0 {
        bail!("every article in the batch failed");
    }
    Ok(())
}

fn list(store_path: &PathBuf) -> Result<()> {
    let store = JsonFileStore::open(store_path)?;
    let articles = store.all();
    if articles.is_empty() {
        println!("store is empty: {}", store_path.display());
        return Ok(());
    }

    println!(
        "{}",
        bold(&format!(
            "{:<12} {:<24} {:<10} {:<11} {}",
            "ID", "SLUG", "MODE", "STATUS", "LAST ATTEMPT"
        ))
    );
    for a in articles {
        let last = a
            .last_attempt_at
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<12} {:<24} {:<10} {:<11} {}",
            a.id,
            a.slug,
            format!("{:?}", a.mode).to_lowercase(),
            format!("{:?}", a.status).to_lowercase(),
            dim(&last),
        );
    }
    Ok(())
}

fn add(
    store_path: &PathBuf,
    id: String,
    slug: String,
    title: String,
    mode: &str,
    category: Option<String>,
    source_file: Option<PathBuf>,
) -> Result<()> {
    let mode = match mode {
        "rewrite" => ArticleMode::Rewrite,
        "generate" => ArticleMode::Generate,
        other => bail!("mode must be 'rewrite' or 'generate', got '{other}'"),
    };
    if mode == ArticleMode::Rewrite && source_file.is_none() {
        bail!("rewrite mode requires --source-file");
    }

    let mut article = Article::new(id.clone(), slug, title, mode);
    article.category = category;
    if let Some(path) = source_file {
        article.source_text = Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?,
        );
    }

    let store = JsonFileStore::open(store_path)?;
    store.insert(article)?;
    println!("{} added article '{id}'", green("✓"));
    Ok(())
}
