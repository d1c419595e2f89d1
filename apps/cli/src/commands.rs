//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use cadkb_core::{
    ProgressReporter, Storage, ensure_pdf_exists, harvest_into, harvest_pdf, scrape_docs,
    scrape_into, verify_store,
};
use cadkb_shared::{AppConfig, CrawlConfig, HarvestConfig, init_config, load_config};
use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// cadkb — build a CAD knowledge base from docs and instruction PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "cadkb",
    version,
    about = "Index CAD API reference pages and harvest construction steps into a local knowledge store.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log level used when RUST_LOG is unset.
    #[arg(long, global = true, ignore_case = true)]
    pub log_level: Option<LogLevel>,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv). Ignored when --log-level is given.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            Self::Error => "error",
            Self::Warn => "warn",
            Self::Info => "info",
            Self::Debug => "debug",
            Self::Trace => "trace",
        }
    }
}

/// Top-level CLI subcommands.
#[derive(Subcommand, Debug)]
pub(crate) enum Command {
    /// Crawl the API reference from its master index and index creation methods.
    Scrape {
        /// Master index URL of the API reference.
        #[arg(long)]
        master: String,

        /// Knowledge store path (defaults to the configured store).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Clear documented functions before indexing.
        #[arg(long)]
        overwrite_docs: bool,

        /// Maximum number of pages to fetch.
        #[arg(long)]
        link_limit: Option<usize>,
    },

    /// Harvest construction steps from an instructions PDF.
    Harvest {
        /// Instructions PDF.
        #[arg(long)]
        pdf: PathBuf,

        /// Knowledge store path (defaults to the configured store).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Recreate the store from scratch.
        #[arg(long)]
        overwrite_db: bool,

        /// Clear previously harvested steps.
        #[arg(long)]
        overwrite_steps: bool,
    },

    /// Run the requested pipelines against one store, then verify it.
    Run {
        /// Master index URL of the API reference.
        #[arg(long)]
        master: Option<String>,

        /// Instructions PDF.
        #[arg(long)]
        pdf: Option<PathBuf>,

        /// Knowledge store path (defaults to the configured store).
        #[arg(long)]
        db: Option<PathBuf>,

        /// Recreate the store from scratch.
        #[arg(long)]
        overwrite_db: bool,

        /// Clear documented functions before indexing.
        #[arg(long)]
        overwrite_docs: bool,

        /// Clear previously harvested steps.
        #[arg(long)]
        overwrite_steps: bool,

        /// Maximum number of pages to fetch.
        #[arg(long)]
        link_limit: Option<usize>,
    },

    /// Print the row count of every table in the store.
    Verify {
        /// Knowledge store path (defaults to the configured store).
        #[arg(long)]
        db: Option<PathBuf>,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Default filter directive when `RUST_LOG` is unset.
fn filter_directive(cli: &Cli) -> String {
    let level = match (cli.log_level, cli.verbose) {
        (Some(level), _) => level.as_str(),
        (None, 0) => "info",
        (None, 1) => "debug",
        (None, _) => "trace",
    };
    format!("cadkb={level}")
}

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter_directive(cli)));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Scrape {
            master,
            db,
            overwrite_docs,
            link_limit,
        } => cmd_scrape(&master, db, overwrite_docs, link_limit).await,
        Command::Harvest {
            pdf,
            db,
            overwrite_db,
            overwrite_steps,
        } => cmd_harvest(&pdf, db, overwrite_db, overwrite_steps).await,
        Command::Run {
            master,
            pdf,
            db,
            overwrite_db,
            overwrite_docs,
            overwrite_steps,
            link_limit,
        } => {
            let opts = RunOptions {
                master,
                pdf,
                db,
                overwrite_db,
                overwrite_docs,
                overwrite_steps,
                link_limit,
            };
            cmd_run(opts).await
        }
        Command::Verify { db } => cmd_verify(db).await,
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init().await,
            ConfigAction::Show => cmd_config_show().await,
        },
    }
}

// ---------------------------------------------------------------------------
// Shared helpers
// ---------------------------------------------------------------------------

fn parse_master(master: &str) -> Result<Url> {
    Url::parse(master).map_err(|e| eyre!("invalid master URL '{master}': {e}"))
}

fn resolve_db(config: &AppConfig, db: Option<PathBuf>) -> PathBuf {
    db.unwrap_or_else(|| PathBuf::from(&config.store.db_path))
}

fn resolve_crawl(config: &AppConfig, link_limit: Option<usize>) -> CrawlConfig {
    let mut crawl = CrawlConfig::from(config);
    if let Some(limit) = link_limit {
        crawl.link_limit = limit;
    }
    crawl
}

fn print_counts(db: &Path, counts: &[(String, u64)]) {
    println!();
    println!("  Store: {}", db.display());
    for (table, rows) in counts {
        println!("  {table:<20} {rows}");
    }
    println!();
}

// ---------------------------------------------------------------------------
// Progress reporting
// ---------------------------------------------------------------------------

/// Spinner-backed progress reporter for the terminal.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn page_fetched(&self, url: &str, current: usize, budget: usize) {
        self.spinner
            .set_message(format!("Fetching [{current}/{budget}] {url}"));
    }

    fn step_harvested(&self, current: usize, action: &str) {
        self.spinner
            .set_message(format!("Classified step {current}: {action}"));
    }

    fn done(&self, message: &str) {
        self.spinner.finish_and_clear();
        info!("{message}");
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_scrape(
    master: &str,
    db: Option<PathBuf>,
    overwrite_docs: bool,
    link_limit: Option<usize>,
) -> Result<()> {
    let config = load_config()?;
    let master_url = parse_master(master)?;
    let db_path = resolve_db(&config, db);
    let crawl = resolve_crawl(&config, link_limit);

    info!(master, db = %db_path.display(), link_limit = crawl.link_limit, "scraping documentation");

    let reporter = CliProgress::new();
    let rows = scrape_docs(&master_url, &db_path, overwrite_docs, &crawl, &reporter).await?;

    println!();
    println!("  Documentation indexed.");
    println!("  Rows:  {rows}");
    println!("  Store: {}", db_path.display());
    println!();

    Ok(())
}

async fn cmd_harvest(
    pdf: &Path,
    db: Option<PathBuf>,
    overwrite_db: bool,
    overwrite_steps: bool,
) -> Result<()> {
    let config = load_config()?;
    let db_path = resolve_db(&config, db);
    let harvest = HarvestConfig::from(&config);

    info!(pdf = %pdf.display(), db = %db_path.display(), "harvesting instructions");

    let reporter = CliProgress::new();
    let store =
        harvest_pdf(pdf, &db_path, overwrite_db, overwrite_steps, &harvest, &reporter).await?;

    println!();
    println!("  Instructions harvested.");
    println!("  Store: {}", store.display());
    println!();

    Ok(())
}

struct RunOptions {
    master: Option<String>,
    pdf: Option<PathBuf>,
    db: Option<PathBuf>,
    overwrite_db: bool,
    overwrite_docs: bool,
    overwrite_steps: bool,
    link_limit: Option<usize>,
}

async fn cmd_run(opts: RunOptions) -> Result<()> {
    let config = load_config()?;
    run_pipelines(&config, opts).await
}

async fn run_pipelines(config: &AppConfig, opts: RunOptions) -> Result<()> {
    let db_path = resolve_db(config, opts.db);

    // Reject bad inputs before touching the store.
    let master_url = opts.master.as_deref().map(parse_master).transpose()?;
    if let Some(pdf) = &opts.pdf {
        ensure_pdf_exists(pdf)?;
    }

    let storage = Storage::create(&db_path, opts.overwrite_db).await?;

    if master_url.is_none() && opts.pdf.is_none() {
        println!("Nothing to do. Provide --master and/or --pdf.");
    }

    if let Some(master_url) = &master_url {
        let crawl = resolve_crawl(config, opts.link_limit);
        let reporter = CliProgress::new();
        let summary =
            scrape_into(&storage, master_url, opts.overwrite_docs, &crawl, &reporter).await?;
        println!(
            "  Scraped {} pages ({} failed), {} doc rows in {:.1}s",
            summary.pages_fetched,
            summary.pages_failed,
            summary.rows_attempted,
            summary.elapsed.as_secs_f64()
        );
        for (url, error) in summary.failures.iter().take(5) {
            println!("    failed: {url} ({error})");
        }
    }

    if let Some(pdf) = &opts.pdf {
        let harvest = HarvestConfig::from(config);
        let reporter = CliProgress::new();
        let summary =
            harvest_into(&storage, pdf, opts.overwrite_steps, &harvest, &reporter).await?;
        println!(
            "  Harvested {} steps ({} notes) in {:.1}s",
            summary.steps_written,
            summary.notes,
            summary.elapsed.as_secs_f64()
        );
    }

    drop(storage);
    let counts = verify_store(&db_path).await?;
    print_counts(&db_path, &counts);

    Ok(())
}

async fn cmd_verify(db: Option<PathBuf>) -> Result<()> {
    let config = load_config()?;
    let db_path = resolve_db(&config, db);
    let counts = verify_store(&db_path).await?;
    print_counts(&db_path, &counts);
    Ok(())
}

async fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

async fn cmd_config_show() -> Result<()> {
    let config: AppConfig = load_config()?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}
