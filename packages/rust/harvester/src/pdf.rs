//! Per-page plain-text extraction from an instructions PDF.
//!
//! Extraction goes through the [`PageTextSource`] capability. Sources are
//! tried in order until one yields at least one page; if every source fails
//! the document is treated as empty.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::path::Path;

use tracing::{debug, info, warn};

use cadkb_shared::{CadKbError, Result};

/// Something that can extract per-page text from a PDF file.
pub trait PageTextSource {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Text of each page, in page order.
    fn extract_pages(&self, path: &Path) -> Result<Vec<String>>;
}

/// Primary source: `pdf-extract`, whole-document extraction.
#[derive(Debug, Default, Clone, Copy)]
pub struct PdfExtractSource;

impl PageTextSource for PdfExtractSource {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        // pdf-extract panics on some malformed inputs.
        let outcome = catch_unwind(AssertUnwindSafe(|| pdf_extract::extract_text_by_pages(path)));
        match outcome {
            Ok(Ok(pages)) => Ok(pages),
            Ok(Err(e)) => Err(CadKbError::Extraction(format!("pdf-extract: {e}"))),
            Err(_) => Err(CadKbError::Extraction("pdf-extract panicked".into())),
        }
    }
}

/// Secondary source: `lopdf`, page by page. A page that fails to extract
/// contributes an empty string.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfSource;

impl PageTextSource for LopdfSource {
    fn name(&self) -> &'static str {
        "lopdf"
    }

    fn extract_pages(&self, path: &Path) -> Result<Vec<String>> {
        let doc = lopdf::Document::load(path)
            .map_err(|e| CadKbError::Extraction(format!("lopdf: {e}")))?;

        let pages = doc
            .get_pages()
            .into_keys()
            .map(|page_number| match doc.extract_text(&[page_number]) {
                Ok(text) => text,
                Err(e) => {
                    debug!(page_number, error = %e, "page extraction failed");
                    String::new()
                }
            })
            .collect();
        Ok(pages)
    }
}

/// The default source order: `pdf-extract`, then `lopdf`.
pub fn default_sources() -> Vec<Box<dyn PageTextSource>> {
    vec![Box::new(PdfExtractSource), Box::new(LopdfSource)]
}

/// Per-page text from the first source that yields pages.
///
/// Never fails: total failure returns an empty vector.
pub fn extract_pdf_text_pages(path: &Path, sources: &[Box<dyn PageTextSource>]) -> Vec<String> {
    for source in sources {
        match source.extract_pages(path) {
            Ok(pages) if !pages.is_empty() => {
                info!(source = source.name(), pages = pages.len(), "extracted PDF text");
                return pages;
            }
            Ok(_) => debug!(source = source.name(), "no pages extracted, trying next source"),
            Err(e) => warn!(source = source.name(), error = %e, "PDF extraction failed"),
        }
    }

    warn!(path = %path.display(), "no extraction source produced text");
    Vec::new()
}
