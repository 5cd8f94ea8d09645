//! Direct extraction of the embedded text layer.
//!
//! Never rasterises. A page without a text layer yields an empty string,
//! which is a normal result; only unreadable PDF structure is an error.

use crate::error::Pdf2TextError;
use crate::pipeline::input::Document;
use crate::pipeline::pdfium::PdfiumBackend;

/// Reads page counts and embedded text from PDF bytes.
pub trait TextLayer: Send + Sync {
    /// Number of pages. Fails with `DocumentRead` if the PDF cannot be parsed.
    fn page_count(&self, source: &str, bytes: &[u8]) -> Result<usize, Pdf2TextError>;

    /// Embedded text of one page, empty when the page has no text layer.
    fn page_text(&self, document: &Document, page_index: usize) -> Result<String, Pdf2TextError>;
}

impl TextLayer for PdfiumBackend {
    fn page_count(&self, source: &str, bytes: &[u8]) -> Result<usize, Pdf2TextError> {
        self.with_document(source, bytes, |pdf| pdf.pages().len() as usize)
    }

    fn page_text(&self, document: &Document, page_index: usize) -> Result<String, Pdf2TextError> {
        let source = document.source();
        let read_error = |detail: String| Pdf2TextError::DocumentRead {
            source_name: source.to_string(),
            detail,
        };

        self.with_document(source, document.bytes(), |pdf| {
            let pages = pdf.pages();
            let total = pages.len() as usize;
            if page_index >= total {
                return Err(read_error(format!(
                    "page {} out of range (document has {} pages)",
                    page_index + 1,
                    total
                )));
            }
            let page = pages
                .get(page_index as u16)
                .map_err(|e| read_error(format!("page {}: {:?}", page_index + 1, e)))?;
            let text = page
                .text()
                .map_err(|e| read_error(format!("page {} text: {:?}", page_index + 1, e)))?;
            Ok(text.all())
        })?
    }
}
