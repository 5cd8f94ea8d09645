//! The per-document state machine.
//!
//! ```text
//! Loaded ──▶ Extracting(page 0..n) ──▶ Assembling ──▶ Completed
//!    ▲
//!  open ──────────────────────────────────────────────▶ Failed
//! ```
//!
//! `Failed` is reachable only from opening: once the page count is known a
//! document always completes, with failed pages recorded in place. Pages run
//! strictly in order, one at a time, each on the blocking pool because
//! pdfium and the OCR engine are synchronous. Cancellation is checked between
//! pages, so an in-flight page always finishes and releases its raster.

use crate::batch::CancelSignal;
use crate::config::validate_dpi;
use crate::error::{PageError, Pdf2TextError};
use crate::output::{page_marker, DocumentMethod, DocumentResult, ExtractionMethod, PageResult};
use crate::pipeline::input::{Document, ExtractRequest};
use crate::pipeline::select::{MethodSelector, PageOptions};
use crate::progress::ProgressCallback;
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Where a document run currently stands.
#[derive(Debug)]
pub enum PipelineState {
    /// Opened; page count known.
    Loaded { document: Document },
    /// `pages` holds results for pages `0..next_page`.
    Extracting {
        document: Document,
        next_page: usize,
        pages: Vec<PageResult>,
    },
    Assembling {
        document: Document,
        pages: Vec<PageResult>,
    },
    Completed(DocumentResult),
    Failed(Pdf2TextError),
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Completed(_) | PipelineState::Failed(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Loaded { .. } => "loaded",
            PipelineState::Extracting { .. } => "extracting",
            PipelineState::Assembling { .. } => "assembling",
            PipelineState::Completed(_) => "completed",
            PipelineState::Failed(_) => "failed",
        }
    }
}

/// Runs one document through [`PipelineState`] to a result.
pub struct DocumentPipeline {
    selector: Arc<MethodSelector>,
    progress: Option<ProgressCallback>,
    cancel: CancelSignal,
    abort: CancelSignal,
    batch_index: usize,
}

impl DocumentPipeline {
    pub fn new(selector: Arc<MethodSelector>) -> Self {
        Self {
            selector,
            progress: None,
            cancel: CancelSignal::new(),
            abort: CancelSignal::new(),
            batch_index: 0,
        }
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    pub fn with_cancel(mut self, cancel: CancelSignal) -> Self {
        self.cancel = cancel;
        self
    }

    /// Signal that the document itself has been abandoned (deadline passed).
    ///
    /// Unlike `with_cancel`, which lets the current page finish, this is
    /// handed to the running page so its OCR stops at the next pass.
    pub fn with_abort(mut self, abort: CancelSignal) -> Self {
        self.abort = abort;
        self
    }

    /// Position of this document in its batch, reported to callbacks.
    pub fn batch_index(mut self, index: usize) -> Self {
        self.batch_index = index;
        self
    }

    /// Drive `request` to `Completed` or `Failed`.
    pub async fn run(&self, request: ExtractRequest) -> Result<DocumentResult, Pdf2TextError> {
        let started = Instant::now();
        let source = request.source.clone();
        info!("Starting extraction: {}", source);

        let options = PageOptions {
            force_ocr: request.force_ocr,
            dpi: request.resolution_dpi,
        };

        let mut state = self.open(request).await;
        while !state.is_terminal() {
            debug!("'{}': {}", source, state.name());
            state = self.advance(state, &options, started).await;
        }

        match state {
            PipelineState::Completed(result) => {
                info!(
                    "Extraction complete: {} ({}, {} pages, {} chars, {:.2}s)",
                    source,
                    result.method,
                    result.pages.len(),
                    result.char_count,
                    result.processing_time_seconds
                );
                if let Some(ref cb) = self.progress {
                    cb.on_document_complete(self.batch_index, &source, result.success);
                }
                Ok(result)
            }
            PipelineState::Failed(e) => {
                warn!("Extraction failed: {}: {}", source, e);
                if let Some(ref cb) = self.progress {
                    cb.on_document_complete(self.batch_index, &source, false);
                }
                Err(e)
            }
            other => Err(Pdf2TextError::Internal(format!(
                "pipeline stopped in non-terminal state '{}'",
                other.name()
            ))),
        }
    }

    /// Validate the request and open the document: `Loaded` or `Failed`.
    pub async fn open(&self, request: ExtractRequest) -> PipelineState {
        if let Err(e) = validate_dpi(request.resolution_dpi) {
            return PipelineState::Failed(e);
        }

        let ExtractRequest {
            source,
            document_bytes,
            ..
        } = request;
        let text_layer = Arc::clone(self.selector.text_layer());

        let opened = tokio::task::spawn_blocking(move || {
            Document::open(source, document_bytes, text_layer.as_ref())
        })
        .await;

        match opened {
            Ok(Ok(document)) => PipelineState::Loaded { document },
            Ok(Err(e)) => PipelineState::Failed(e),
            Err(e) => PipelineState::Failed(Pdf2TextError::Internal(format!(
                "document open task failed: {}",
                e
            ))),
        }
    }

    /// One transition. Terminal states are returned unchanged.
    pub async fn advance(
        &self,
        state: PipelineState,
        options: &PageOptions,
        started: Instant,
    ) -> PipelineState {
        match state {
            PipelineState::Loaded { document } => {
                if let Some(ref cb) = self.progress {
                    cb.on_document_start(self.batch_index, document.source(), document.page_count());
                }
                let pages = Vec::with_capacity(document.page_count());
                PipelineState::Extracting {
                    document,
                    next_page: 0,
                    pages,
                }
            }

            PipelineState::Extracting {
                document,
                next_page,
                mut pages,
            } => {
                let total = document.page_count();
                if next_page >= total {
                    return PipelineState::Assembling { document, pages };
                }

                if self.cancel.is_cancelled() {
                    warn!(
                        "'{}': cancelled, skipping pages {}..={}",
                        document.source(),
                        next_page + 1,
                        total
                    );
                    let method = planned_method(options);
                    pages.extend((next_page..total).map(|idx| {
                        PageResult::failed(
                            idx,
                            method,
                            PageError::Cancelled { page: idx + 1 },
                            0,
                        )
                    }));
                    return PipelineState::Assembling { document, pages };
                }

                let result = self.extract_page(&document, next_page, *options).await;
                self.report_page(&document, &result);
                pages.push(result);

                PipelineState::Extracting {
                    document,
                    next_page: next_page + 1,
                    pages,
                }
            }

            PipelineState::Assembling { document, pages } => {
                PipelineState::Completed(assemble(document.source(), pages, started.elapsed()))
            }

            terminal => terminal,
        }
    }

    async fn extract_page(&self, document: &Document, page_index: usize, options: PageOptions) -> PageResult {
        let selector = Arc::clone(&self.selector);
        let doc = document.clone();
        let abort = self.abort.clone();
        let started = Instant::now();

        let worker =
            tokio::task::spawn_blocking(move || selector.select(&doc, page_index, &options, &abort));
        match worker.await {
            Ok(result) => result,
            Err(e) => PageResult::failed(
                page_index,
                planned_method(&options),
                PageError::Internal {
                    page: page_index + 1,
                    detail: e.to_string(),
                },
                started.elapsed().as_millis() as u64,
            ),
        }
    }

    fn report_page(&self, document: &Document, result: &PageResult) {
        let Some(ref cb) = self.progress else {
            return;
        };
        let total = document.page_count();
        match &result.error {
            None => cb.on_page_complete(
                document.source(),
                result.page_num(),
                total,
                result.attempt.method,
                result.attempt.char_count(),
            ),
            Some(e) => cb.on_page_error(document.source(), result.page_num(), total, &e.to_string()),
        }
    }
}

/// Method recorded for pages that never ran.
fn planned_method(options: &PageOptions) -> ExtractionMethod {
    if options.force_ocr {
        ExtractionMethod::Ocr
    } else {
        ExtractionMethod::Direct
    }
}

/// Build the [`DocumentResult`] from ordered page results.
///
/// Every page contributes its marker, including empty and failed pages, so
/// the marker count always equals the page count.
pub fn assemble(source: &str, pages: Vec<PageResult>, elapsed: Duration) -> DocumentResult {
    let text = pages
        .iter()
        .map(|page| {
            let marker = page_marker(page.page_num());
            if page.attempt.text.is_empty() {
                marker
            } else {
                format!("{}\n{}", marker, page.attempt.text)
            }
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let success = pages.iter().any(|p| !p.is_empty());
    let method = DocumentMethod::classify(&pages);

    DocumentResult {
        source: source.to_string(),
        char_count: text.chars().count(),
        word_count: text.split_whitespace().count(),
        text,
        method,
        processing_time_seconds: elapsed.as_secs_f64(),
        success,
        extracted_at: Utc::now(),
        pages,
    }
}
