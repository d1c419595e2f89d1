//! Pipeline orchestration for the CAD knowledge-base builder.
//!
//! This crate ties the crawler, the harvester and the store together:
//! - [`indexer`] — documented functions into `doc_functions`
//! - [`persist`] — numbered steps into `harvested_steps`
//! - [`pipeline`] — the scrape, harvest and verify entry points

pub mod indexer;
pub mod persist;
pub mod pipeline;

pub use indexer::index_doc_triples;
pub use persist::{number_steps, persist_steps};
pub use pipeline::{
    HarvestSummary, ProgressReporter, ScrapeSummary, SilentProgress, ensure_pdf_exists, harvest_into,
    harvest_pdf, scrape_docs, scrape_into, store_steps, verify_store,
};

pub use cadkb_storage::{Storage, StoreTable};
