use std::collections::HashSet;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing_subscriber::{fmt, EnvFilter};

use websearch_core::persist::{load_index, save_index};
use websearch_core::query::{search, suggestions, SearchOptions};
use websearch_core::SearchIndex;
use websearch_crawler::{crawl_site, page, ContentFetcher, CrawlConfig, CrawlPolicy, FsFetcher};

#[derive(Parser)]
#[command(name = "websearch")]
#[command(about = "Crawl a local site tree and search the resulting index", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl a site rooted in a local directory into an index blob
    Crawl {
        /// Seed address, e.g. site.rw/index.rw
        #[arg(long)]
        seed: String,
        /// Directory the site tree lives under
        #[arg(long)]
        root: PathBuf,
        /// Index blob to create or extend
        #[arg(long, default_value = "./websearch.idx")]
        index: PathBuf,
        #[arg(long, default_value_t = 3)]
        max_depth: usize,
        #[arg(long, default_value_t = 100)]
        max_pages: usize,
        /// Pause between pages in milliseconds
        #[arg(long, default_value_t = 100)]
        delay_ms: u64,
        #[arg(long, default_value = "websearch-bot/0.1")]
        user_agent: String,
        /// Drop previously indexed documents for urls seen again this run
        #[arg(long, default_value_t = false)]
        replace: bool,
    },
    /// Query an index blob
    Search {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        query: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
        #[arg(long, default_value_t = 0)]
        offset: usize,
        /// Emit the full result set as JSON
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Prefix suggestions from the index vocabulary
    Suggest {
        #[arg(long)]
        index: PathBuf,
        #[arg(long)]
        prefix: String,
        #[arg(long, default_value_t = 8)]
        limit: usize,
    },
    /// Print index metadata
    Stats {
        #[arg(long)]
        index: PathBuf,
    },
    /// Re-tokenize every stored document, e.g. after tokenizer changes
    Rebuild {
        #[arg(long)]
        index: PathBuf,
    },
}

fn main() -> Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Crawl {
            seed,
            root,
            index,
            max_depth,
            max_pages,
            delay_ms,
            user_agent,
            replace,
        } => run_crawl(seed, root, index, max_depth, max_pages, delay_ms, user_agent, replace),
        Commands::Search { index, query, limit, offset, json } => {
            run_search(index, query, limit, offset, json)
        }
        Commands::Suggest { index, prefix, limit } => run_suggest(index, prefix, limit),
        Commands::Stats { index } => run_stats(index),
        Commands::Rebuild { index } => run_rebuild(index),
    }
}

fn run_crawl(
    seed: String,
    root: PathBuf,
    index_path: PathBuf,
    max_depth: usize,
    max_pages: usize,
    delay_ms: u64,
    user_agent: String,
    replace: bool,
) -> Result<()> {
    let fetcher = FsFetcher::new(&root);
    let policy = match fetcher.fetch(&format!("{}/robots.txt", page::host(&seed))) {
        Ok(bytes) => CrawlPolicy::parse(&String::from_utf8_lossy(&bytes), &user_agent),
        Err(_) => {
            tracing::debug!("no robots.txt, crawling permissively");
            CrawlPolicy::allow_all()
        }
    };

    let mut index = load_index(&index_path);
    let prior_ids: HashSet<String> = index.documents().map(|d| d.id.clone()).collect();

    let config = CrawlConfig {
        max_depth,
        max_pages,
        delay: Duration::from_millis(delay_ms),
        user_agent,
    };
    let stats = crawl_site(&config, &seed, &mut index, &fetcher, &policy);

    if replace {
        drop_recrawled(&mut index, &prior_ids);
    }
    save_index(&index, &index_path)?;

    tracing::info!(
        pages_indexed = stats.pages_indexed,
        pages_failed = stats.pages_failed,
        total_visited = stats.total_visited,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        index = %index_path.display(),
        "crawl complete"
    );
    for (address, reason) in &stats.errors {
        tracing::warn!(%address, reason, "page failed");
    }
    Ok(())
}

/// Remove pre-existing documents whose url was re-indexed this run, turning
/// the index's duplicate-on-recrawl default into replace semantics.
fn drop_recrawled(index: &mut SearchIndex, prior_ids: &HashSet<String>) {
    let fresh_urls: HashSet<String> = index
        .documents()
        .filter(|d| !prior_ids.contains(&d.id))
        .map(|d| d.url.clone())
        .collect();
    let stale: Vec<String> = index
        .documents()
        .filter(|d| prior_ids.contains(&d.id) && fresh_urls.contains(&d.url))
        .map(|d| d.id.clone())
        .collect();
    for id in &stale {
        index.remove_document(id);
    }
    if !stale.is_empty() {
        tracing::info!(replaced = stale.len(), "dropped re-crawled documents");
    }
}

fn run_search(index_path: PathBuf, query: String, limit: usize, offset: usize, json: bool) -> Result<()> {
    let index = load_index(&index_path);
    let results = search(&index, &query, &SearchOptions { limit, offset });
    if json {
        println!("{}", serde_json::to_string_pretty(&results)?);
        return Ok(());
    }
    println!("{} of {} result(s) for '{}'", results.results.len(), results.total, results.query);
    for (i, hit) in results.results.iter().enumerate() {
        println!(
            "{:3}. [{:.3}] {} ({}, {})",
            offset + i + 1,
            hit.score,
            hit.document.title,
            hit.document.url,
            hit.document.doc_type
        );
        println!("      {}", hit.snippet);
    }
    Ok(())
}

fn run_suggest(index_path: PathBuf, prefix: String, limit: usize) -> Result<()> {
    let index = load_index(&index_path);
    for term in suggestions(&index, &prefix, limit) {
        println!("{term}");
    }
    Ok(())
}

fn run_stats(index_path: PathBuf) -> Result<()> {
    let index = load_index(&index_path);
    let meta = index.metadata();
    let updated = if meta.last_update == 0 {
        "never".to_string()
    } else {
        OffsetDateTime::from_unix_timestamp(meta.last_update)
            .ok()
            .and_then(|t| t.format(&Rfc3339).ok())
            .unwrap_or_else(|| meta.last_update.to_string())
    };
    println!("documents:  {}", meta.total_documents);
    println!("terms:      {}", meta.total_terms);
    println!("updated:    {updated}");
    println!("version:    {}", meta.version);
    Ok(())
}

fn run_rebuild(index_path: PathBuf) -> Result<()> {
    let mut index = load_index(&index_path);
    index.rebuild();
    save_index(&index, &index_path)?;
    tracing::info!(index = %index_path.display(), "rebuild complete");
    Ok(())
}
