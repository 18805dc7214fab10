//! PDF text extraction, one string per page.

use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use estthmar_core::{Error, Result};

/// Extract the text of every page of a PDF file, in page order.
pub fn extract_pdf_pages(path: &Path) -> Result<Vec<String>> {
    let doc = Document::load(path)
        .map_err(|e| Error::Extraction(format!("{}: {}", path.display(), e)))?;
    Ok(pages_text(&doc))
}

/// A page whose text cannot be decoded yields an empty string so page
/// numbering stays aligned with the document.
fn pages_text(doc: &Document) -> Vec<String> {
    let pages = doc.get_pages();
    debug!("PDF has {} pages", pages.len());
    pages
        .keys()
        .map(|&page_num| match doc.extract_text(&[page_num]) {
            Ok(text) => text,
            Err(e) => {
                warn!("Failed to extract text from page {}: {}", page_num, e);
                String::new()
            }
        })
        .collect()
}
