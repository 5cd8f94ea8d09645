//! Concurrent extraction of many documents.
//!
//! Documents run under a bounded concurrency limit; within a document pages
//! stay sequential (see [`crate::pipeline::document`]). Every input produces
//! exactly one [`BatchEntry`], in input order, whatever happened to its
//! siblings.

use crate::config::ExtractionConfig;
use crate::error::Pdf2TextError;
use crate::extract::Extractor;
use crate::output::{BatchEntry, BatchResult, DocumentOutcome, FailureRecord};
use crate::pipeline::input::BatchExtractRequest;
use futures::stream::{self, StreamExt};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Cooperative cancellation flag shared by a batch and its documents.
///
/// Once set, no further documents are admitted and running documents stop
/// after their current page.
#[derive(Debug, Clone, Default)]
pub struct CancelSignal(Arc<AtomicBool>);

impl CancelSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Runs document pipelines concurrently and aggregates their outcomes.
pub struct BatchOrchestrator {
    extractor: Arc<Extractor>,
}

impl BatchOrchestrator {
    pub fn new(extractor: Arc<Extractor>) -> Self {
        Self { extractor }
    }

    /// Extract every document of `request`.
    ///
    /// Never fails: document errors become [`DocumentOutcome::Failed`]
    /// entries. `max_concurrency == 0` falls back to the extractor's
    /// configured concurrency.
    pub async fn run(&self, request: BatchExtractRequest, cancel: &CancelSignal) -> BatchResult {
        let started = Instant::now();
        let total = request.documents.len();
        let concurrency = request.effective_concurrency(self.extractor.config().concurrency);
        let progress = self.extractor.config().progress_callback.clone();

        info!(
            "Starting batch: {} documents, concurrency {}",
            total, concurrency
        );
        if let Some(ref cb) = progress {
            cb.on_batch_start(total);
        }

        // buffer_unordered polls at most `concurrency` futures; a future's
        // first poll is its admission, so the cancel check lives there.
        let mut entries: Vec<(usize, BatchEntry)> =
            stream::iter(request.documents.into_iter().enumerate().map(|(index, doc)| {
                let extractor = Arc::clone(&self.extractor);
                let cancel = cancel.clone();
                let progress = progress.clone();
                async move {
                    let id = doc.source.clone();
                    let outcome = if cancel.is_cancelled() {
                        debug!("Not admitting '{}': batch cancelled", id);
                        if let Some(ref cb) = progress {
                            cb.on_document_complete(index, &id, false);
                        }
                        let e = Pdf2TextError::Cancelled {
                            source_name: id.clone(),
                        };
                        DocumentOutcome::Failed(FailureRecord::from(&e))
                    } else {
                        match extractor.extract_with(doc, index, cancel).await {
                            Ok(result) => DocumentOutcome::Completed(result),
                            Err(e) => DocumentOutcome::Failed(FailureRecord::from(&e)),
                        }
                    };
                    (index, BatchEntry { id, outcome })
                }
            }))
            .buffer_unordered(concurrency)
            .collect()
            .await;

        entries.sort_by_key(|(index, _)| *index);
        let result = BatchResult::new(
            entries.into_iter().map(|(_, entry)| entry).collect(),
            started.elapsed().as_secs_f64(),
        );

        info!(
            "Batch complete: {}/{} succeeded, {:.2}s",
            result.summary.succeeded, result.summary.total, result.summary.elapsed_seconds
        );
        if let Some(ref cb) = progress {
            cb.on_batch_complete(result.summary.total, result.summary.succeeded);
        }

        result
    }
}

/// Run a batch with a one-off [`Extractor`].
///
/// # Errors
/// Only when the extractor cannot be built (pdfium missing).
pub async fn extract_batch(
    request: BatchExtractRequest,
    config: &ExtractionConfig,
    cancel: &CancelSignal,
) -> Result<BatchResult, Pdf2TextError> {
    let extractor = Arc::new(Extractor::new(config.clone())?);
    Ok(BatchOrchestrator::new(extractor).run(request, cancel).await)
}
