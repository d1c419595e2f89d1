//! Entry points: scrape documentation, harvest instructions, verify a store.
//!
//! Each sub-pipeline has a path-based entry point that opens its own store
//! handle ([`scrape_docs`], [`harvest_pdf`]) and a handle-based variant
//! ([`scrape_into`], [`harvest_into`]) for callers that run both against one
//! store.

use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, info, instrument};
use url::Url;

use cadkb_crawler::{Crawler, extract_doc_triples};
use cadkb_harvester::{ClassifiedStep, RuleSet, default_sources};
use cadkb_shared::{CadKbError, CrawlConfig, HarvestConfig, Result};
use cadkb_storage::{Storage, StoreTable};

use crate::indexer::index_doc_triples;
use crate::persist::persist_steps;

/// Progress callback for reporting pipeline status.
pub trait ProgressReporter {
    /// Called when entering a new phase.
    fn phase(&self, name: &str);
    /// Called when a documentation page is fetched.
    fn page_fetched(&self, url: &str, current: usize, budget: usize);
    /// Called when a step has been classified.
    fn step_harvested(&self, current: usize, action: &str);
    /// Called when a sub-pipeline completes.
    fn done(&self, message: &str);
}

/// No-op progress reporter for headless/test usage.
pub struct SilentProgress;

impl ProgressReporter for SilentProgress {
    fn phase(&self, _name: &str) {}
    fn page_fetched(&self, _url: &str, _current: usize, _budget: usize) {}
    fn step_harvested(&self, _current: usize, _action: &str) {}
    fn done(&self, _message: &str) {}
}

// ---------------------------------------------------------------------------
// Scrape
// ---------------------------------------------------------------------------

/// Outcome of a documentation scrape.
#[derive(Debug, Clone)]
pub struct ScrapeSummary {
    /// Doc rows attempted (duplicates included).
    pub rows_attempted: usize,
    pub pages_fetched: usize,
    pub pages_failed: usize,
    /// Fetched pages that documented at least one creation method.
    pub pages_with_methods: usize,
    /// Failed fetches as (URL, error message), in crawl order.
    pub failures: Vec<(String, String)>,
    pub elapsed: Duration,
}

/// Crawl `master_url` and index its creation methods into the store at
/// `db_path`.
///
/// Returns the number of doc rows attempted.
pub async fn scrape_docs(
    master_url: &Url,
    db_path: &Path,
    overwrite_docs: bool,
    crawl_config: &CrawlConfig,
    progress: &dyn ProgressReporter,
) -> Result<usize> {
    progress.phase("Opening knowledge store");
    let storage = Storage::create(db_path, false).await?;
    let summary = scrape_into(&storage, master_url, overwrite_docs, crawl_config, progress).await?;
    Ok(summary.rows_attempted)
}

/// Crawl and index into an already open store.
#[instrument(skip_all, fields(master = %master_url, overwrite_docs))]
pub async fn scrape_into(
    storage: &Storage,
    master_url: &Url,
    overwrite_docs: bool,
    crawl_config: &CrawlConfig,
    progress: &dyn ProgressReporter,
) -> Result<ScrapeSummary> {
    let start = Instant::now();

    if overwrite_docs {
        progress.phase("Clearing documented functions");
        storage.clear_doc_functions().await?;
    }

    progress.phase("Crawling documentation");
    let crawler = Crawler::new(crawl_config.clone())?;
    let budget = crawl_config.link_limit;
    let mut fetched = 0usize;
    let (crawl, pages) = crawler
        .crawl(master_url, |page| {
            fetched += 1;
            progress.page_fetched(page.url.as_str(), fetched, budget);
        })
        .await?;

    progress.phase("Indexing documented functions");
    let mut rows_attempted = 0usize;
    let mut pages_with_methods = 0usize;
    for page in &pages {
        let triples =
            extract_doc_triples(page.url.as_str(), &page.html, &crawl_config.default_factory);
        if triples.is_empty() {
            debug!(url = %page.url, "no creation methods on page");
            continue;
        }
        pages_with_methods += 1;
        rows_attempted += index_doc_triples(storage, &triples).await?;
    }

    let summary = ScrapeSummary {
        rows_attempted,
        pages_fetched: crawl.pages_fetched,
        pages_failed: crawl.pages_failed,
        pages_with_methods,
        failures: crawl.errors,
        elapsed: start.elapsed(),
    };

    info!(
        rows_attempted = summary.rows_attempted,
        pages_fetched = summary.pages_fetched,
        pages_failed = summary.pages_failed,
        pages_with_methods = summary.pages_with_methods,
        elapsed_ms = summary.elapsed.as_millis(),
        "scrape complete"
    );
    progress.done(&format!(
        "Indexed {} doc rows from {} pages",
        summary.rows_attempted, summary.pages_fetched
    ));

    Ok(summary)
}

// ---------------------------------------------------------------------------
// Harvest
// ---------------------------------------------------------------------------

/// Outcome of an instructions harvest.
#[derive(Debug, Clone)]
pub struct HarvestSummary {
    pub steps_written: usize,
    /// Steps recorded as notes because their block matched no rule.
    pub notes: usize,
    pub elapsed: Duration,
}

/// Harvest the instructions PDF at `pdf_path` into the store at `db_path`.
///
/// `overwrite_db` recreates the store from scratch; `clear_steps` empties
/// only `harvested_steps`. Without either, the store must not already hold
/// steps. Returns the store location.
pub async fn harvest_pdf(
    pdf_path: &Path,
    db_path: &Path,
    overwrite_db: bool,
    clear_steps: bool,
    harvest_config: &HarvestConfig,
    progress: &dyn ProgressReporter,
) -> Result<PathBuf> {
    ensure_pdf_exists(pdf_path)?;

    progress.phase("Opening knowledge store");
    let storage = Storage::create(db_path, overwrite_db).await?;
    harvest_into(&storage, pdf_path, clear_steps, harvest_config, progress).await?;
    Ok(storage.path().to_path_buf())
}

/// Harvest into an already open store.
#[instrument(skip_all, fields(pdf = %pdf_path.display(), clear_steps))]
pub async fn harvest_into(
    storage: &Storage,
    pdf_path: &Path,
    clear_steps: bool,
    harvest_config: &HarvestConfig,
    progress: &dyn ProgressReporter,
) -> Result<HarvestSummary> {
    ensure_pdf_exists(pdf_path)?;

    progress.phase("Extracting instructions");
    let rules = RuleSet::default();
    let steps = cadkb_harvester::harvest_pdf(pdf_path, &default_sources(), &rules, harvest_config);

    store_steps(storage, steps, clear_steps, progress).await
}

/// Write classified steps, clearing or guarding the table first.
pub async fn store_steps(
    storage: &Storage,
    steps: Vec<ClassifiedStep>,
    clear_steps: bool,
    progress: &dyn ProgressReporter,
) -> Result<HarvestSummary> {
    let start = Instant::now();

    if clear_steps {
        progress.phase("Clearing harvested steps");
        storage.clear_harvested_steps().await?;
    } else {
        let existing = storage.count_rows(StoreTable::HarvestedSteps).await?;
        if existing > 0 {
            return Err(CadKbError::validation(format!(
                "{} already holds {existing} harvested steps; recreate the store or clear the steps first",
                storage.path().display()
            )));
        }
    }

    for (i, step) in steps.iter().enumerate() {
        progress.step_harvested(i + 1, &step.classification.action);
    }
    let notes = steps.iter().filter(|s| s.classification.is_note()).count();

    progress.phase("Writing harvested steps");
    let steps_written = persist_steps(storage, steps).await?;

    let summary = HarvestSummary {
        steps_written,
        notes,
        elapsed: start.elapsed(),
    };

    info!(
        steps_written = summary.steps_written,
        notes = summary.notes,
        elapsed_ms = summary.elapsed.as_millis(),
        "harvest complete"
    );
    progress.done(&format!("Harvested {} steps", summary.steps_written));

    Ok(summary)
}

/// Fail with a config error when `pdf_path` is not a readable file.
pub fn ensure_pdf_exists(pdf_path: &Path) -> Result<()> {
    if pdf_path.is_file() {
        Ok(())
    } else {
        Err(CadKbError::config(format!(
            "instructions PDF not found: {}",
            pdf_path.display()
        )))
    }
}

// ---------------------------------------------------------------------------
// Verify
// ---------------------------------------------------------------------------

/// Row count of every table in the store at `db_path`.
pub async fn verify_store(db_path: &Path) -> Result<Vec<(String, u64)>> {
    let storage = Storage::open_readonly(db_path).await?;
    let counts = storage.table_counts().await?;
    for (table, rows) in &counts {
        info!(table = %table, rows, "table count");
    }
    Ok(counts)
}
