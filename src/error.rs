//! Error types for the edgequake-pdf2text library.
//!
//! Two tiers mirror the two places an extraction can go wrong:
//!
//! * [`Pdf2TextError`]: **Fatal for one document**: the PDF cannot be
//!   opened, the deadline expired, the batch was cancelled before the document
//!   was admitted. Returned as `Err` from [`crate::extract::Extractor::extract`]
//!   and recorded as a [`crate::output::FailureRecord`] inside a batch.
//!
//! * [`PageError`]: **Non-fatal**: one page could not be rasterised or
//!   recognised. Stored inside [`crate::output::PageResult`]; the rest of the
//!   document carries on.
//!
//! [`OcrError`] is what an OCR backend reports; the selector lifts it into a
//! [`PageError`] once it knows which page was being recognised.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Serialisable tag for a failure, shared by document and page errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    DocumentReadError,
    RasterizationError,
    OcrUnavailableError,
    OcrError,
    TimeoutError,
    CancelledError,
    ConfigError,
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::DocumentReadError => "DocumentReadError",
            ErrorKind::RasterizationError => "RasterizationError",
            ErrorKind::OcrUnavailableError => "OcrUnavailableError",
            ErrorKind::OcrError => "OcrError",
            ErrorKind::TimeoutError => "TimeoutError",
            ErrorKind::CancelledError => "CancelledError",
            ErrorKind::ConfigError => "ConfigError",
            ErrorKind::InternalError => "InternalError",
        };
        f.write_str(s)
    }
}

/// All document-level errors returned by the edgequake-pdf2text library.
///
/// Page-level failures use [`PageError`] and never surface here.
#[derive(Debug, Error)]
pub enum Pdf2TextError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The bytes do not start with the `%PDF` magic.
    #[error("'{source_name}' is not a valid PDF (first bytes: {magic:?})")]
    NotAPdf { source_name: String, magic: Vec<u8> },

    /// PDF header/trailer/xref is corrupt and pdfium refused to open it.
    #[error("PDF '{source_name}' could not be read: {detail}")]
    DocumentRead { source_name: String, detail: String },

    /// Reading the input file from disk failed.
    #[error("Failed to read input file '{path}': {source}")]
    InputReadFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Run-control errors ────────────────────────────────────────────────
    /// The per-document deadline expired.
    #[error("Extraction of '{source_name}' timed out after {secs}s")]
    Timeout { source_name: String, secs: u64 },

    /// The batch was cancelled before this document was admitted.
    #[error("Extraction of '{source_name}' was cancelled")]
    Cancelled { source_name: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output text file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder or request validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
Set PDFIUM_LIB_PATH=/path/to/libpdfium, place the library next to the\n\
executable, or install it system-wide.\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Pdf2TextError {
    /// The failure tag recorded in batch results.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Pdf2TextError::NotAPdf { .. }
            | Pdf2TextError::DocumentRead { .. }
            | Pdf2TextError::InputReadFailed { .. }
            | Pdf2TextError::PdfiumBindingFailed(_) => ErrorKind::DocumentReadError,
            Pdf2TextError::Timeout { .. } => ErrorKind::TimeoutError,
            Pdf2TextError::Cancelled { .. } => ErrorKind::CancelledError,
            Pdf2TextError::InvalidConfig(_) => ErrorKind::ConfigError,
            Pdf2TextError::OutputWriteFailed { .. } | Pdf2TextError::Internal(_) => {
                ErrorKind::InternalError
            }
        }
    }
}

/// A non-fatal error for a single page.
///
/// Pages are 1-indexed in messages, matching the page markers in the
/// assembled text.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
pub enum PageError {
    /// The page could not be rendered to an image.
    #[error("Page {page}: rasterisation failed: {detail}")]
    Rasterization { page: usize, detail: String },

    /// OCR was needed but the engine is not installed or not reachable.
    #[error("Page {page}: OCR engine unavailable: {detail}")]
    OcrUnavailable { page: usize, detail: String },

    /// The OCR engine ran but every recognition pass failed.
    #[error("Page {page}: OCR failed: {detail}")]
    OcrFailed { page: usize, detail: String },

    /// The batch was cancelled before this page was started, or the
    /// document was abandoned while the page was running.
    #[error("Page {page}: skipped after cancellation")]
    Cancelled { page: usize },

    /// The page worker panicked or could not be joined.
    #[error("Page {page}: internal error: {detail}")]
    Internal { page: usize, detail: String },
}

impl PageError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PageError::Rasterization { .. } => ErrorKind::RasterizationError,
            PageError::OcrUnavailable { .. } => ErrorKind::OcrUnavailableError,
            PageError::OcrFailed { .. } => ErrorKind::OcrError,
            PageError::Cancelled { .. } => ErrorKind::CancelledError,
            PageError::Internal { .. } => ErrorKind::InternalError,
        }
    }
}

/// Errors reported by an [`crate::pipeline::ocr::OcrBackend`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OcrError {
    /// The recognition capability is missing (binary not found, version check failed).
    #[error("OCR engine unavailable: {0}")]
    Unavailable(String),

    /// The engine is present but this recognition attempt failed.
    #[error("OCR recognition failed: {0}")]
    Failed(String),

    /// Recognition was abandoned because the document's deadline passed.
    #[error("OCR abandoned: document no longer wanted")]
    Aborted,
}

impl OcrError {
    /// Attach the page number, producing the error stored in the page result.
    pub fn into_page_error(self, page: usize) -> PageError {
        match self {
            OcrError::Unavailable(detail) => PageError::OcrUnavailable { page, detail },
            OcrError::Failed(detail) => PageError::OcrFailed { page, detail },
            OcrError::Aborted => PageError::Cancelled { page },
        }
    }
}
