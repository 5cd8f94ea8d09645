//! Result types produced by the extraction pipeline.
//!
//! ```text
//! ExtractionAttempt ─▶ PageResult ─▶ DocumentResult ─▶ BatchResult
//!  (one method, one    (the selected   (ordered pages +   (one outcome per
//!   page)               attempt)        aggregates)        input document)
//! ```
//!
//! `DocumentResult` serialises to the compact wire shape consumed by HTTP
//! and storage layers ([`DocumentSummary`]); the per-page detail stays
//! available in memory for callers that want it.

use crate::error::{ErrorKind, PageError, Pdf2TextError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// How the text of a single page was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExtractionMethod {
    /// Read from the embedded text layer.
    Direct,
    /// Recognised from a rasterised image.
    Ocr,
}

impl ExtractionMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExtractionMethod::Direct => "direct",
            ExtractionMethod::Ocr => "ocr",
        }
    }
}

impl fmt::Display for ExtractionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Overall method classification of a document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentMethod {
    Direct,
    Ocr,
    /// Pages were extracted with different methods.
    Mixed,
}

impl DocumentMethod {
    /// Classify a document from its pages. A document without pages is `Direct`
    /// since no OCR was ever involved.
    pub fn classify(pages: &[PageResult]) -> Self {
        let direct = pages
            .iter()
            .any(|p| p.attempt.method == ExtractionMethod::Direct);
        let ocr = pages.iter().any(|p| p.attempt.method == ExtractionMethod::Ocr);
        match (direct, ocr) {
            (true, true) => DocumentMethod::Mixed,
            (false, true) => DocumentMethod::Ocr,
            _ => DocumentMethod::Direct,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentMethod::Direct => "direct",
            DocumentMethod::Ocr => "ocr",
            DocumentMethod::Mixed => "mixed",
        }
    }
}

impl fmt::Display for DocumentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The outcome of applying one extraction method to one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionAttempt {
    pub method: ExtractionMethod,
    pub text: String,
    /// Method-specific quality in `0.0..=1.0`: alphanumeric ratio for direct
    /// text, mean word confidence for OCR. Zero when no text was found.
    pub quality: f32,
    pub elapsed_ms: u64,
}

impl ExtractionAttempt {
    /// An attempt that produced nothing, used for failed pages.
    pub fn empty(method: ExtractionMethod, elapsed_ms: u64) -> Self {
        Self {
            method,
            text: String::new(),
            quality: 0.0,
            elapsed_ms,
        }
    }

    pub fn char_count(&self) -> usize {
        self.text.chars().count()
    }
}

/// The selected attempt for one page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 0-based page index.
    pub page_index: usize,
    pub attempt: ExtractionAttempt,
    /// Set when the page could not be extracted; `attempt` is then empty.
    pub error: Option<PageError>,
}

impl PageResult {
    pub fn failed(page_index: usize, method: ExtractionMethod, error: PageError, elapsed_ms: u64) -> Self {
        Self {
            page_index,
            attempt: ExtractionAttempt::empty(method, elapsed_ms),
            error: Some(error),
        }
    }

    /// 1-based page number, as printed in page markers.
    pub fn page_num(&self) -> usize {
        self.page_index + 1
    }

    pub fn is_failed(&self) -> bool {
        self.error.is_some()
    }

    /// True when no text came out of the page, whether or not it failed.
    pub fn is_empty(&self) -> bool {
        self.attempt.text.trim().is_empty()
    }
}

/// The result of one document pipeline run.
#[derive(Debug, Clone, Serialize)]
#[serde(into = "DocumentSummary")]
pub struct DocumentResult {
    /// Identifier of the input (file name or caller-supplied id).
    pub source: String,
    /// One entry per page, ordered by page index without gaps.
    pub pages: Vec<PageResult>,
    /// Assembled text: page markers followed by page text.
    pub text: String,
    pub char_count: usize,
    pub word_count: usize,
    pub method: DocumentMethod,
    pub processing_time_seconds: f64,
    /// True when at least one page produced non-empty text.
    pub success: bool,
    pub extracted_at: DateTime<Utc>,
}

impl DocumentResult {
    /// Pages that produced a result without a page error.
    pub fn pages_processed(&self) -> usize {
        self.pages.iter().filter(|p| !p.is_failed()).count()
    }

    pub fn failed_pages(&self) -> impl Iterator<Item = &PageResult> {
        self.pages.iter().filter(|p| p.is_failed())
    }

    /// Count of pages extracted with `method`.
    pub fn pages_with_method(&self, method: ExtractionMethod) -> usize {
        self.pages
            .iter()
            .filter(|p| p.attempt.method == method)
            .count()
    }

    pub fn summary(&self) -> DocumentSummary {
        DocumentSummary::from(self.clone())
    }
}

/// Wire shape of a [`DocumentResult`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub success: bool,
    pub method: DocumentMethod,
    pub pages_processed: usize,
    pub char_count: usize,
    pub word_count: usize,
    pub processing_time_seconds: f64,
    pub text: String,
}

impl From<DocumentResult> for DocumentSummary {
    fn from(r: DocumentResult) -> Self {
        Self {
            success: r.success,
            method: r.method,
            pages_processed: r.pages_processed(),
            char_count: r.char_count,
            word_count: r.word_count,
            processing_time_seconds: r.processing_time_seconds,
            text: r.text,
        }
    }
}

/// Why a document produced no result at all.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub kind: ErrorKind,
    pub message: String,
}

impl From<&Pdf2TextError> for FailureRecord {
    fn from(e: &Pdf2TextError) -> Self {
        Self {
            kind: e.kind(),
            message: e.to_string(),
        }
    }
}

/// What happened to one input document of a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DocumentOutcome {
    Completed(DocumentResult),
    Failed(FailureRecord),
}

impl DocumentOutcome {
    /// Completed with at least one page of text.
    pub fn is_success(&self) -> bool {
        matches!(self, DocumentOutcome::Completed(r) if r.success)
    }

    pub fn result(&self) -> Option<&DocumentResult> {
        match self {
            DocumentOutcome::Completed(r) => Some(r),
            DocumentOutcome::Failed(_) => None,
        }
    }

    pub fn failure(&self) -> Option<&FailureRecord> {
        match self {
            DocumentOutcome::Completed(_) => None,
            DocumentOutcome::Failed(f) => Some(f),
        }
    }
}

/// One batch input and its outcome.
#[derive(Debug, Clone, Serialize)]
pub struct BatchEntry {
    pub id: String,
    #[serde(flatten)]
    pub outcome: DocumentOutcome,
}

/// Aggregate counts for a batch run.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub elapsed_seconds: f64,
}

/// One entry per input document, in input order.
#[derive(Debug, Clone, Serialize)]
pub struct BatchResult {
    pub entries: Vec<BatchEntry>,
    pub summary: BatchSummary,
}

impl BatchResult {
    pub fn new(entries: Vec<BatchEntry>, elapsed_seconds: f64) -> Self {
        let succeeded = entries.iter().filter(|e| e.outcome.is_success()).count();
        let summary = BatchSummary {
            total: entries.len(),
            succeeded,
            failed: entries.len() - succeeded,
            elapsed_seconds,
        };
        Self { entries, summary }
    }

    pub fn get(&self, id: &str) -> Option<&DocumentOutcome> {
        self.entries.iter().find(|e| e.id == id).map(|e| &e.outcome)
    }
}

// ── Assembled text format ────────────────────────────────────────────────

/// Marker line that precedes the text of page `page_num` (1-based).
pub fn page_marker(page_num: usize) -> String {
    format!("--- PAGE {page_num} ---")
}

/// True if `line` is a page marker produced by [`page_marker`].
pub fn is_page_marker(line: &str) -> bool {
    line.strip_prefix("--- PAGE ")
        .and_then(|rest| rest.strip_suffix(" ---"))
        .is_some_and(|n| !n.is_empty() && n.chars().all(|c| c.is_ascii_digit()))
}

const HEADER_RULE_WIDTH: usize = 80;

/// Render the persisted plain-text file: a header block followed by the
/// page-delimited text.
pub fn render_text_file(result: &DocumentResult) -> String {
    let mut out = String::with_capacity(result.text.len() + 512);
    out.push_str("PDF Text Extraction Results\n");
    out.push_str(&format!("Source: {}\n", result.source));
    out.push_str(&format!(
        "Extraction Date: {}\n",
        result.extracted_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    out.push_str(&format!("Method: {}\n", result.method));
    out.push_str(&format!(
        "Processing Time: {:.2} seconds\n",
        result.processing_time_seconds
    ));
    out.push_str(&format!("Characters: {}\n", result.char_count));
    out.push_str(&format!("Words: {}\n", result.word_count));
    out.push_str(&"=".repeat(HEADER_RULE_WIDTH));
    out.push_str("\n\n");
    out.push_str(&result.text);
    if !out.ends_with('\n') {
        out.push('\n');
    }
    out
}

/// `<stem>_<YYYYmmdd_HHMMSS>.txt` for the given source name.
pub fn output_file_name(source: &str, at: DateTime<Utc>) -> String {
    let stem = Path::new(source)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    format!("{}_{}.txt", stem, at.format("%Y%m%d_%H%M%S"))
}
