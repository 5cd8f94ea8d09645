//! # edgequake-pdf2text
//!
//! Convert PDF documents to plain text, reading the embedded text layer when
//! it is usable and falling back to OCR when it is not.
//!
//! ## Why hybrid?
//!
//! Digital PDFs carry their text; reading it is exact and takes
//! milliseconds. Scanned PDFs carry only pictures of text and need OCR, which
//! costs seconds per page and is lossy. Deciding per page means a scanned
//! appendix in an otherwise digital report is OCR'd while the rest is not.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF bytes
//!  │
//!  ├─ 1. Open      %PDF magic check, page count via pdfium
//!  ├─ 2. Select    per page: text layer → quality heuristic
//!  │                 pass → direct
//!  │                 fail → render → preprocess → multi-pass OCR
//!  ├─ 3. Clean     whitespace / invisible-char normalisation
//!  └─ 4. Assemble  "--- PAGE n ---" markers + counts + method
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use edgequake_pdf2text::{extract_file, ExtractionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ExtractionConfig::default();
//!     let result = extract_file("scan.pdf", &config).await?;
//!     println!("{} ({} words)", result.method, result.word_count);
//!     println!("{}", result.text);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdf2text` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! ## Runtime requirements
//!
//! * pdfium shared library (`PDFIUM_LIB_PATH`, next to the working
//!   directory, or system-wide)
//! * `tesseract` on `PATH` for scanned pages; without it digital PDFs still
//!   extract and OCR pages fail individually

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod error;
pub mod extract;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{extract_batch, BatchOrchestrator, CancelSignal};
pub use config::{ExtractionConfig, ExtractionConfigBuilder, PreprocessProfile};
pub use error::{ErrorKind, OcrError, PageError, Pdf2TextError};
pub use extract::{
    extract, extract_file, extract_sync, extract_to_file, system_status, write_text_file,
    Extractor, SystemStatus,
};
pub use output::{
    BatchEntry, BatchResult, BatchSummary, DocumentMethod, DocumentOutcome, DocumentResult,
    DocumentSummary, ExtractionAttempt, ExtractionMethod, FailureRecord, PageResult,
};
pub use pipeline::input::{BatchExtractRequest, ExtractRequest};
pub use progress::{ExtractionProgressCallback, NoopProgressCallback, ProgressCallback};
