use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use websearch_core::SearchIndex;

use crate::fetch::ContentFetcher;
use crate::page;
use crate::policy::CrawlPolicy;

#[derive(Debug, Clone)]
pub struct CrawlConfig {
    pub max_depth: usize,
    pub max_pages: usize,
    /// Cooperative pacing between pages; a policy Crawl-delay can raise it
    /// but never lower it.
    pub delay: Duration,
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        CrawlConfig {
            max_depth: 3,
            max_pages: 100,
            delay: Duration::from_millis(100),
            user_agent: "websearch-bot/0.1".to_string(),
        }
    }
}

/// Outcome of one crawl run. Transient: built at crawl start, handed back at
/// the end, never persisted.
#[derive(Debug, Default)]
pub struct CrawlStats {
    pub pages_indexed: usize,
    pub pages_failed: usize,
    pub total_visited: usize,
    pub errors: HashMap<String, String>,
    pub elapsed: Duration,
}

/// Traverse a site's link graph from `seed`, feeding indexable pages into
/// `index`. One FIFO frontier, so depth grows monotonically down each path
/// while work interleaves across paths. Fetch failures are recorded
/// per-address and never abort the run.
pub fn crawl_site(
    config: &CrawlConfig,
    seed: &str,
    index: &mut SearchIndex,
    fetcher: &dyn ContentFetcher,
    policy: &CrawlPolicy,
) -> CrawlStats {
    let started = Instant::now();
    let mut stats = CrawlStats::default();
    let mut visited: HashSet<String> = HashSet::new();
    let mut frontier: VecDeque<(String, usize)> = VecDeque::new();
    frontier.push_back((seed.to_string(), 0));

    let delay = match policy.crawl_delay() {
        Some(floor) => config.delay.max(floor),
        None => config.delay,
    };

    tracing::info!(seed, max_depth = config.max_depth, max_pages = config.max_pages, "crawl started");

    while stats.pages_indexed < config.max_pages {
        let Some((address, depth)) = frontier.pop_front() else {
            break;
        };
        if visited.contains(&address) {
            continue;
        }
        if !policy.is_allowed(&address) {
            tracing::debug!(%address, "denied by crawl policy");
            continue;
        }
        visited.insert(address.clone());

        let content = match fetcher.fetch(&address) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).into_owned(),
            Err(err) => {
                tracing::debug!(%address, %err, "fetch failed");
                stats.errors.insert(address, err.to_string());
                stats.pages_failed += 1;
                continue;
            }
        };

        let Some(doc_type) = page::classify(&address) else {
            tracing::debug!(%address, "unrecognized content type, not indexing");
            continue;
        };
        let title = page::extract_title(&content, doc_type);
        let doc_id = index.add_document(&address, &title, &content, doc_type);
        stats.pages_indexed += 1;
        tracing::debug!(%address, %doc_id, depth, "indexed page");

        if depth < config.max_depth {
            for link in page::extract_links(&content) {
                if let Some(resolved) = page::resolve_link(&address, &link) {
                    if page::is_crawlable(&resolved) && !visited.contains(&resolved) {
                        frontier.push_back((resolved, depth + 1));
                    }
                }
            }
        }

        if !delay.is_zero() && !frontier.is_empty() {
            std::thread::sleep(delay);
        }
    }

    stats.total_visited = visited.len();
    stats.elapsed = started.elapsed();
    tracing::info!(
        pages_indexed = stats.pages_indexed,
        pages_failed = stats.pages_failed,
        total_visited = stats.total_visited,
        elapsed_ms = stats.elapsed.as_millis() as u64,
        "crawl finished"
    );
    stats
}
