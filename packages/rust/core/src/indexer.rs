//! Doc indexer: turns (factory, method, url) triples into `doc_functions`
//! rows.

use tracing::debug;

use cadkb_shared::{DocFunctionRecord, DocTriple, Result};
use cadkb_storage::Storage;

/// Persist a batch of triples with ignore-on-conflict semantics.
///
/// Returns the number of rows attempted; duplicates of an existing
/// `function_key` are dropped by the store, so repeating a batch is safe.
pub async fn index_doc_triples(storage: &Storage, triples: &[DocTriple]) -> Result<usize> {
    let records: Vec<DocFunctionRecord> = triples.iter().map(DocFunctionRecord::from).collect();
    let attempted = storage.insert_doc_functions(&records).await?;
    debug!(attempted, "indexed doc triples");
    Ok(attempted)
}
