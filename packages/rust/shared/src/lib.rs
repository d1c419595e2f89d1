//! Shared types, error model, and configuration for the CAD knowledge-base
//! builder.
//!
//! This crate is the foundation depended on by all other `cadkb` crates.
//! It provides:
//! - [`CadKbError`] — the unified error type
//! - Domain records ([`DocFunctionRecord`], [`HarvestedStep`], [`DocTriple`])
//! - The identifier tokenizer ([`naming`])
//! - Configuration ([`AppConfig`], [`CrawlConfig`], [`HarvestConfig`], config loading)

pub mod config;
pub mod error;
pub mod naming;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, CrawlConfig, CrawlPoliciesConfig, DEFAULT_FACTORY, HarvestConfig,
    HarvestPoliciesConfig, StoreConfig, config_dir, config_file_path, init_config, load_config,
    load_config_from, validate_config,
};
pub use error::{CadKbError, Result};
pub use naming::{action_from_method, normalize_key, split_identifier, tokens_for};
pub use types::{DocFunctionRecord, DocTriple, HarvestedStep, NOTE_ACTION};
