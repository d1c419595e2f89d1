//! Sequential, scope-aware documentation crawler.
//!
//! The crawler starts from a root index URL, performs BFS traversal over
//! same-authority links under a path prefix, and stops once the page budget
//! is met or the frontier empties. Fetches are strictly one at a time with a
//! politeness delay between them.

use std::collections::{HashSet, VecDeque};
use std::time::{Duration, Instant};

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, info, instrument, warn};
use url::Url;

use cadkb_shared::{CadKbError, CrawlConfig, Result};

// ---------------------------------------------------------------------------
// CrawlResult
// ---------------------------------------------------------------------------

/// Summary of a completed crawl.
#[derive(Debug, Clone)]
pub struct CrawlResult {
    /// Number of pages successfully fetched.
    pub pages_fetched: usize,
    /// Number of fetch attempts that failed (network or non-2xx).
    pub pages_failed: usize,
    /// Errors encountered (URL, error message).
    pub errors: Vec<(String, String)>,
    /// Total duration of the crawl.
    pub duration: Duration,
}

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    /// Normalized page URL (no fragment, no query).
    pub url: Url,
    /// Raw response body.
    pub html: String,
}

// ---------------------------------------------------------------------------
// Crawler
// ---------------------------------------------------------------------------

/// Breadth-first documentation crawler.
pub struct Crawler {
    config: CrawlConfig,
    client: Client,
}

impl Crawler {
    /// Create a new crawler with the given configuration.
    pub fn new(config: CrawlConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(config.user_agent.as_str())
            .redirect(reqwest::redirect::Policy::limited(5))
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| CadKbError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(Self { config, client })
    }

    /// Crawl starting from `root`, returning a summary and the fetched pages
    /// in visit order.
    ///
    /// `on_page` is called after each successful fetch.
    #[instrument(skip_all, fields(root = %root, link_limit = self.config.link_limit))]
    pub async fn crawl(
        &self,
        root: &Url,
        mut on_page: impl FnMut(&FetchedPage),
    ) -> Result<(CrawlResult, Vec<FetchedPage>)> {
        let start_time = Instant::now();
        let scope = CrawlScope::new(root, self.config.path_prefix.as_deref())?;

        let mut frontier: VecDeque<Url> = VecDeque::from([normalize_url(root)]);
        let mut visited: HashSet<Url> = HashSet::new();
        let mut pages: Vec<FetchedPage> = Vec::new();
        let mut errors: Vec<(String, String)> = Vec::new();
        let mut attempts: usize = 0;

        info!(
            prefix = %scope.path_prefix,
            delay_ms = self.config.delay_ms,
            "starting crawl"
        );

        while pages.len() < self.config.link_limit {
            let Some(url) = frontier.pop_front() else {
                break;
            };
            if !visited.insert(url.clone()) {
                continue;
            }

            if attempts > 0 && self.config.delay_ms > 0 {
                tokio::time::sleep(Duration::from_millis(self.config.delay_ms)).await;
            }
            attempts += 1;

            let body = match fetch_page(&self.client, &url).await {
                Ok(body) => body,
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!(%url, error = %e, "fetch failed, skipping");
                    errors.push((url.to_string(), e.to_string()));
                    continue;
                }
            };

            let doc = Html::parse_document(&body);
            let mut enqueued = 0usize;
            for link in extract_links(&doc, &url) {
                if scope.in_scope(&link) && !visited.contains(&link) {
                    frontier.push_back(link);
                    enqueued += 1;
                }
            }
            debug!(%url, enqueued, frontier = frontier.len(), "page fetched");

            let page = FetchedPage { url, html: body };
            on_page(&page);
            pages.push(page);
        }

        let result = CrawlResult {
            pages_fetched: pages.len(),
            pages_failed: errors.len(),
            errors,
            duration: start_time.elapsed(),
        };

        info!(
            pages_fetched = result.pages_fetched,
            pages_failed = result.pages_failed,
            duration_ms = result.duration.as_millis(),
            "crawl completed"
        );

        Ok((result, pages))
    }
}

// ---------------------------------------------------------------------------
// Scope checking
// ---------------------------------------------------------------------------

/// Determines which URLs are "in scope" for a crawl.
#[derive(Debug)]
struct CrawlScope {
    /// `host[:port]` of the root URL.
    authority: String,
    /// Path prefix that URLs must start with.
    path_prefix: String,
}

impl CrawlScope {
    fn new(root: &Url, path_prefix: Option<&str>) -> Result<Self> {
        if !is_http(root) {
            return Err(CadKbError::validation(format!(
                "root URL must be http or https: {root}"
            )));
        }

        let path_prefix = match path_prefix {
            Some(prefix) => prefix.to_string(),
            None => directory_of(root.path()),
        };

        Ok(Self {
            authority: authority_of(root),
            path_prefix,
        })
    }

    fn in_scope(&self, url: &Url) -> bool {
        is_http(url)
            && authority_of(url) == self.authority
            && url.path().starts_with(&self.path_prefix)
    }
}

fn is_http(url: &Url) -> bool {
    matches!(url.scheme(), "http" | "https")
}

fn authority_of(url: &Url) -> String {
    let host = url.host_str().unwrap_or("");
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

/// Directory part of a URL path: `/a/b/index.htm` → `/a/b/`.
fn directory_of(path: &str) -> String {
    match path.rfind('/') {
        Some(idx) => path[..=idx].to_string(),
        None => "/".to_string(),
    }
}

// ---------------------------------------------------------------------------
// Page fetching
// ---------------------------------------------------------------------------

/// Fetch a single page body. Non-2xx statuses are errors.
async fn fetch_page(client: &Client, url: &Url) -> Result<String> {
    debug!(%url, "fetching page");

    let response = client
        .get(url.as_str())
        .send()
        .await
        .map_err(|e| CadKbError::Network(format!("{url}: {e}")))?;

    let status = response.status();
    if !status.is_success() {
        return Err(CadKbError::Network(format!("{url}: HTTP {status}")));
    }

    response
        .text()
        .await
        .map_err(|e| CadKbError::Network(format!("{url}: body read failed: {e}")))
}

/// Extract all links from a document, resolved against the page URL and
/// normalized.
fn extract_links(doc: &Html, base_url: &Url) -> Vec<Url> {
    let Ok(link_sel) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let mut links = Vec::new();

    for el in doc.select(&link_sel) {
        if let Some(href) = el.value().attr("href") {
            let href = href.trim();
            // Skip anchors, javascript:, mailto:
            if href.is_empty()
                || href.starts_with('#')
                || href.starts_with("javascript:")
                || href.starts_with("mailto:")
            {
                continue;
            }

            if let Ok(resolved) = base_url.join(href) {
                links.push(normalize_url(&resolved));
            }
        }
    }

    links
}

/// Normalize a URL for deduplication: strip fragment and query.
pub fn normalize_url(url: &Url) -> Url {
    let mut normalized = url.clone();
    normalized.set_fragment(None);
    normalized.set_query(None);
    normalized
}
