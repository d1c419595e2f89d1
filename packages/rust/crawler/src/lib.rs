//! Documentation crawler and page token extraction.
//!
//! This crate provides:
//! - [`engine`] — Sequential, scope-aware breadth-first crawler
//! - [`extract`] — Factory/method recognition on a fetched page

pub mod engine;
pub mod extract;

pub use engine::{CrawlResult, Crawler, FetchedPage, normalize_url};
pub use extract::extract_doc_triples;
