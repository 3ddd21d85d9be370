use crate::core::config::CrawlerConfig;
use crate::core::error::ConfigError;
use crate::scraping::content::{netloc, normalize_url};
use crate::scraping::fetcher::{fetch_page, FetchOptions, FetchedPage};
use crate::types::{PageResult, PageStatus};
use futures::FutureExt;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use std::collections::{HashSet, VecDeque};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub const DEFAULT_MAX_PAGES: usize = 30;
pub const MAX_PAGES_LIMIT: usize = 2000;

/// Clamp a requested page budget to `1..=2000`.
pub fn clamp_max_pages(requested: Option<usize>) -> usize {
    requested
        .unwrap_or(DEFAULT_MAX_PAGES)
        .clamp(1, MAX_PAGES_LIMIT)
}

/// Browser-like request headers sent with every crawl fetch.
pub fn default_headers(user_agent: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    if let Ok(ua) = HeaderValue::from_str(user_agent) {
        headers.insert(USER_AGENT, ua);
    }
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en;q=0.9"));
    headers
}

/// Configuration for one crawl run
#[derive(Clone, Debug)]
pub struct CrawlConfig {
    pub start_url: String,
    pub max_pages: usize,
    pub same_domain: bool,
    pub workers: usize,
    pub headers: HeaderMap,
    pub page_timeout: Duration,
    pub max_links: usize,
    pub snippet_chars: usize,
}

impl CrawlConfig {
    /// Build from request parameters plus the `crawler` section of the config file.
    pub fn from_settings(
        start_url: &str,
        max_pages: Option<usize>,
        same_domain: bool,
        settings: &CrawlerConfig,
    ) -> Self {
        Self {
            start_url: start_url.trim().to_string(),
            max_pages: clamp_max_pages(max_pages),
            same_domain,
            workers: settings.resolve_max_workers(),
            headers: default_headers(&settings.resolve_user_agent()),
            page_timeout: settings.resolve_page_timeout(),
            max_links: settings.resolve_max_links(),
            snippet_chars: settings.resolve_snippet_chars(),
        }
    }

    /// Concurrent fetches: never more than the page budget.
    pub fn pool_size(&self) -> usize {
        self.workers.min(self.max_pages).max(1)
    }
}

/// Reported after every completed fetch.
#[derive(Debug, Clone)]
pub struct CrawlProgress {
    pub url: String,
    pub status: PageStatus,
    pub error: String,
    pub visited: usize,
    pub limit: usize,
}

#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// Pages in completion order.
    pub results: Vec<PageResult>,
    pub visited: usize,
    pub errors: usize,
    pub cancelled: bool,
}

/// Breadth-first crawl from `config.start_url`.
///
/// Up to `pool_size()` fetches run at once; each completion frees a slot that
/// is refilled from the frontier straight away. `visited` never exceeds
/// `max_pages`, and a URL enters the frontier at most once. Failed pages are
/// counted and kept, they never end the crawl. Cancellation stops new
/// dispatches; fetches already in flight still complete.
pub async fn crawl_site<F>(
    client: &reqwest::Client,
    config: CrawlConfig,
    on_progress: F,
    cancel: &CancellationToken,
) -> Result<CrawlOutcome, ConfigError>
where
    F: Fn(CrawlProgress) + Send + Sync,
{
    let start_time = Instant::now();
    let root = normalize_url(&config.start_url)
        .ok_or_else(|| ConfigError::InvalidUrl(config.start_url.clone()))?;
    let root_netloc =
        netloc(&root).ok_or_else(|| ConfigError::InvalidUrl(config.start_url.clone()))?;

    let limit = config.max_pages;
    let pool = config.pool_size();
    info!(
        "Starting crawl of {} (max_pages: {}, workers: {}, same_domain: {})",
        root, limit, pool, config.same_domain
    );

    let opts = Arc::new(FetchOptions {
        headers: config.headers.clone(),
        timeout: config.page_timeout,
        max_links: config.max_links,
        snippet_chars: config.snippet_chars,
        same_domain: config.same_domain,
        root_netloc,
    });

    let mut queue: VecDeque<String> = VecDeque::from([root.clone()]);
    let mut seen: HashSet<String> = HashSet::from([root]);
    let mut in_flight: JoinSet<FetchedPage> = JoinSet::new();
    let mut outcome = CrawlOutcome::default();

    loop {
        // Backfill the pool up to its size and the remaining budget.
        while in_flight.len() < pool
            && outcome.visited + in_flight.len() < limit
            && !cancel.is_cancelled()
        {
            let Some(url) = queue.pop_front() else {
                break;
            };
            let client = client.clone();
            let opts = Arc::clone(&opts);
            in_flight.spawn(async move {
                match AssertUnwindSafe(fetch_page(&client, &url, &opts))
                    .catch_unwind()
                    .await
                {
                    Ok(page) => page,
                    Err(_) => FetchedPage {
                        result: PageResult::failed(&url, "fetch task panicked"),
                        child_urls: Vec::new(),
                    },
                }
            });
        }

        let Some(joined) = in_flight.join_next().await else {
            break;
        };

        let page = match joined {
            Ok(page) => page,
            Err(e) => {
                warn!("Crawl task failed: {}", e);
                FetchedPage {
                    result: PageResult::failed("", format!("fetch task failed: {}", e)),
                    child_urls: Vec::new(),
                }
            }
        };

        outcome.visited += 1;
        if page.is_error() {
            outcome.errors += 1;
        }

        if outcome.visited < limit {
            for child in page.child_urls {
                if seen.insert(child.clone()) {
                    queue.push_back(child);
                }
            }
        }

        on_progress(CrawlProgress {
            url: page.result.url.clone(),
            status: page.result.status,
            error: page.result.error.clone(),
            visited: outcome.visited,
            limit,
        });
        outcome.results.push(page.result);
    }

    outcome.cancelled = cancel.is_cancelled();
    info!(
        "Crawl completed: {} visited, {} errors, {} queued unvisited, cancelled={}, {}ms total",
        outcome.visited,
        outcome.errors,
        queue.len(),
        outcome.cancelled,
        start_time.elapsed().as_millis()
    );
    Ok(outcome)
}
