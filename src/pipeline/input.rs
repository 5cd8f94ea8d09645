//! Input handling: extraction requests and the immutable [`Document`].
//!
//! Requests carry raw bytes; nothing here touches the file system except
//! [`ExtractRequest::from_path`]. The `%PDF` magic is checked before pdfium
//! sees the bytes so callers get a meaningful `NotAPdf` instead of a generic
//! parser failure.

use crate::error::Pdf2TextError;
use crate::pipeline::text_layer::TextLayer;
use std::path::Path;
use std::sync::Arc;
use tracing::debug;

/// Default rasterisation resolution for a request.
pub const DEFAULT_RESOLUTION_DPI: u32 = 300;

/// PDF readers accept the header anywhere in the first kilobyte.
const MAGIC_SEARCH_WINDOW: usize = 1024;

/// One document to extract.
#[derive(Debug, Clone)]
pub struct ExtractRequest {
    /// Identifier used in logs, results and the persisted header
    /// (usually the original file name).
    pub source: String,
    pub document_bytes: Vec<u8>,
    /// Skip the text layer and OCR every page.
    pub force_ocr: bool,
    /// Rasterisation DPI for OCR pages (150–600).
    pub resolution_dpi: u32,
}

impl ExtractRequest {
    pub fn new(source: impl Into<String>, document_bytes: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            document_bytes,
            force_ocr: false,
            resolution_dpi: DEFAULT_RESOLUTION_DPI,
        }
    }

    pub fn force_ocr(mut self, v: bool) -> Self {
        self.force_ocr = v;
        self
    }

    pub fn resolution_dpi(mut self, dpi: u32) -> Self {
        self.resolution_dpi = dpi;
        self
    }

    /// Read a request from a local file; the file name becomes the source.
    pub async fn from_path(path: impl AsRef<Path>) -> Result<Self, Pdf2TextError> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Pdf2TextError::InputReadFailed {
                path: path.to_path_buf(),
                source: e,
            })?;
        let source = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        debug!("Read {} bytes from {}", bytes.len(), path.display());
        Ok(Self::new(source, bytes))
    }
}

/// Several documents extracted under one concurrency limit.
#[derive(Debug, Clone)]
pub struct BatchExtractRequest {
    pub documents: Vec<ExtractRequest>,
    /// Documents in flight at once. `0` defers to the extractor's
    /// configured concurrency.
    pub max_concurrency: usize,
}

impl BatchExtractRequest {
    pub fn new(documents: Vec<ExtractRequest>) -> Self {
        Self {
            documents,
            max_concurrency: 0,
        }
    }

    pub fn max_concurrency(mut self, n: usize) -> Self {
        self.max_concurrency = n;
        self
    }

    /// The limit actually applied: `max_concurrency`, else `configured`,
    /// never zero.
    pub fn effective_concurrency(&self, configured: usize) -> usize {
        match self.max_concurrency {
            0 => configured.max(1),
            n => n,
        }
    }
}

/// An opened source PDF: its bytes and page count. Immutable once loaded.
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    bytes: Arc<[u8]>,
    page_count: usize,
}

impl Document {
    /// Validate the bytes and read the page count.
    ///
    /// Fails with `NotAPdf` or `DocumentRead`; both end the pipeline before
    /// any page is attempted.
    pub fn open(
        source: impl Into<String>,
        bytes: impl Into<Arc<[u8]>>,
        text_layer: &dyn TextLayer,
    ) -> Result<Self, Pdf2TextError> {
        let source = source.into();
        let bytes = bytes.into();
        check_pdf_magic(&source, &bytes)?;
        let page_count = text_layer.page_count(&source, &bytes)?;
        debug!("Opened '{}': {} pages", source, page_count);
        Ok(Self {
            source,
            bytes,
            page_count,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }
}

/// Reject inputs that do not carry a `%PDF` header in their first kilobyte.
pub fn check_pdf_magic(source: &str, bytes: &[u8]) -> Result<(), Pdf2TextError> {
    let window = &bytes[..bytes.len().min(MAGIC_SEARCH_WINDOW)];
    if window.windows(4).any(|w| w == b"%PDF") {
        return Ok(());
    }
    Err(Pdf2TextError::NotAPdf {
        source_name: source.to_string(),
        magic: bytes.iter().take(4).copied().collect(),
    })
}
