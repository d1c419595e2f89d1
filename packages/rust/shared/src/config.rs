//! Application configuration for the CAD knowledge-base builder.
//!
//! User config lives at `~/.cadkb/cadkb.toml`.
//! CLI flags override config file values, which override defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CadKbError, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "cadkb.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".cadkb";

/// Factory assumed for pages that name creation methods but no factory type.
pub const DEFAULT_FACTORY: &str = "HybridShapeFactory";

// ---------------------------------------------------------------------------
// Config structs (matching cadkb.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Knowledge store location.
    #[serde(default)]
    pub store: StoreConfig,

    /// Documentation crawl policies.
    #[serde(default)]
    pub crawl: CrawlPoliciesConfig,

    /// Instruction harvesting settings.
    #[serde(default)]
    pub harvest: HarvestPoliciesConfig,
}

/// `[store]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Default knowledge store file.
    #[serde(default = "default_db_path")]
    pub db_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
        }
    }
}

fn default_db_path() -> String {
    "knowledge.db".into()
}

/// `[crawl]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlPoliciesConfig {
    /// Maximum number of successfully fetched pages.
    #[serde(default = "default_link_limit")]
    pub link_limit: usize,

    /// Pause between consecutive page fetches, in milliseconds.
    #[serde(default = "default_delay_ms")]
    pub delay_ms: u64,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Path prefix discovered links must start with. Defaults to the
    /// directory of the root URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,

    /// Factory assumed when a page names methods but no factory.
    #[serde(default = "default_factory")]
    pub default_factory: String,
}

impl Default for CrawlPoliciesConfig {
    fn default() -> Self {
        Self {
            link_limit: default_link_limit(),
            delay_ms: default_delay_ms(),
            timeout_secs: default_timeout_secs(),
            user_agent: default_user_agent(),
            path_prefix: None,
            default_factory: default_factory(),
        }
    }
}

fn default_link_limit() -> usize {
    600
}
fn default_delay_ms() -> u64 {
    20
}
fn default_timeout_secs() -> u64 {
    25
}
fn default_user_agent() -> String {
    concat!("cadkb/", env!("CARGO_PKG_VERSION")).into()
}
fn default_factory() -> String {
    DEFAULT_FACTORY.into()
}

/// `[harvest]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HarvestPoliciesConfig {
    /// Lines shorter than this (in characters, after trimming) are noise.
    #[serde(default = "default_min_line_len")]
    pub min_line_len: usize,
}

impl Default for HarvestPoliciesConfig {
    fn default() -> Self {
        Self {
            min_line_len: default_min_line_len(),
        }
    }
}

fn default_min_line_len() -> usize {
    5
}

// ---------------------------------------------------------------------------
// Runtime configs (merged from config + CLI flags)
// ---------------------------------------------------------------------------

/// Runtime crawl configuration — merged from config file + CLI flags.
#[derive(Debug, Clone)]
pub struct CrawlConfig {
    /// Budget of successfully fetched pages.
    pub link_limit: usize,
    /// Politeness delay between fetches, in milliseconds.
    pub delay_ms: u64,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
    /// User-Agent header.
    pub user_agent: String,
    /// Explicit path prefix filter, if any.
    pub path_prefix: Option<String>,
    /// Factory assumed when none is recognized on a page.
    pub default_factory: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for CrawlConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            link_limit: config.crawl.link_limit,
            delay_ms: config.crawl.delay_ms,
            timeout_secs: config.crawl.timeout_secs,
            user_agent: config.crawl.user_agent.clone(),
            path_prefix: config.crawl.path_prefix.clone(),
            default_factory: config.crawl.default_factory.clone(),
        }
    }
}

/// Runtime harvest configuration.
#[derive(Debug, Clone)]
pub struct HarvestConfig {
    /// Minimum trimmed line length offered to the classifier.
    pub min_line_len: usize,
}

impl Default for HarvestConfig {
    fn default() -> Self {
        Self::from(&AppConfig::default())
    }
}

impl From<&AppConfig> for HarvestConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            min_line_len: config.harvest.min_line_len,
        }
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.cadkb/`).
pub fn config_dir() -> Result<PathBuf> {
    let home =
        dirs::home_dir().ok_or_else(|| CadKbError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.cadkb/cadkb.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| CadKbError::io(path, e))?;

    let config: AppConfig = toml::from_str(&content)
        .map_err(|e| CadKbError::config(format!("failed to parse {}: {e}", path.display())))?;
    validate_config(&config)?;
    Ok(config)
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| CadKbError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| CadKbError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| CadKbError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}

/// Reject settings that would make a run meaningless.
pub fn validate_config(config: &AppConfig) -> Result<()> {
    if config.crawl.link_limit == 0 {
        return Err(CadKbError::config("crawl.link_limit must be at least 1"));
    }
    if config.crawl.default_factory.trim().is_empty() {
        return Err(CadKbError::config("crawl.default_factory must not be empty"));
    }
    if config.harvest.min_line_len == 0 {
        return Err(CadKbError::config("harvest.min_line_len must be at least 1"));
    }
    if let Some(prefix) = &config.crawl.path_prefix {
        if !prefix.starts_with('/') {
            return Err(CadKbError::config(format!(
                "crawl.path_prefix must start with '/': {prefix}"
            )));
        }
    }
    Ok(())
}
