//! Progress-callback trait for per-document and per-page extraction events.
//!
//! Inject an [`Arc<dyn ExtractionProgressCallback>`] via
//! [`crate::config::ExtractionConfigBuilder::progress_callback`] to receive
//! events as documents are admitted, pages are decided, and documents finish.
//!
//! Documents in a batch run concurrently, so every method may be called from
//! several threads at once. Implementations protect their own state
//! (`Mutex`, atomics).
//!
//! # Example
//!
//! ```rust
//! use edgequake_pdf2text::{ExtractionConfig, ExtractionMethod, ExtractionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct OcrCounter {
//!     ocr_pages: AtomicUsize,
//! }
//!
//! impl ExtractionProgressCallback for OcrCounter {
//!     fn on_page_complete(&self, _source: &str, _page: usize, _total: usize,
//!                         method: ExtractionMethod, _chars: usize) {
//!         if method == ExtractionMethod::Ocr {
//!             self.ocr_pages.fetch_add(1, Ordering::SeqCst);
//!         }
//!     }
//! }
//!
//! let counter = Arc::new(OcrCounter { ocr_pages: AtomicUsize::new(0) });
//! let config = ExtractionConfig::builder()
//!     .progress_callback(counter as Arc<dyn ExtractionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::ExtractionMethod;
use std::sync::Arc;

/// Called by the pipeline and the batch orchestrator as work progresses.
///
/// All methods default to no-ops so callers only override what they need.
pub trait ExtractionProgressCallback: Send + Sync {
    /// Called once before any document of a batch is admitted.
    fn on_batch_start(&self, total_documents: usize) {
        let _ = total_documents;
    }

    /// Called after a document has been opened and its page count is known.
    ///
    /// `index` is the document's position in the batch (0 for single extractions).
    fn on_document_start(&self, index: usize, source: &str, total_pages: usize) {
        let _ = (index, source, total_pages);
    }

    /// Called when a page produced a result without a page error.
    ///
    /// `page_num` is 1-indexed.
    fn on_page_complete(
        &self,
        source: &str,
        page_num: usize,
        total_pages: usize,
        method: ExtractionMethod,
        chars: usize,
    ) {
        let _ = (source, page_num, total_pages, method, chars);
    }

    /// Called when a page was recorded as failed.
    fn on_page_error(&self, source: &str, page_num: usize, total_pages: usize, error: &str) {
        let _ = (source, page_num, total_pages, error);
    }

    /// Called when a document reaches a terminal state.
    ///
    /// `success` is false both for documents that failed outright and for
    /// documents that completed without any text.
    fn on_document_complete(&self, index: usize, source: &str, success: bool) {
        let _ = (index, source, success);
    }

    /// Called once after every document of a batch has an outcome.
    fn on_batch_complete(&self, total_documents: usize, succeeded: usize) {
        let _ = (total_documents, succeeded);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl ExtractionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::ExtractionConfig`].
pub type ProgressCallback = Arc<dyn ExtractionProgressCallback>;

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct TrackingCallback {
        documents: AtomicUsize,
        direct_pages: AtomicUsize,
        ocr_pages: AtomicUsize,
        errors: AtomicUsize,
        succeeded: AtomicUsize,
    }

    impl ExtractionProgressCallback for TrackingCallback {
        fn on_document_start(&self, _index: usize, _source: &str, _total_pages: usize) {
            self.documents.fetch_add(1, Ordering::SeqCst);
        }

        fn on_page_complete(
            &self,
            _source: &str,
            _page_num: usize,
            _total_pages: usize,
            method: ExtractionMethod,
            _chars: usize,
        ) {
            match method {
                ExtractionMethod::Direct => self.direct_pages.fetch_add(1, Ordering::SeqCst),
                ExtractionMethod::Ocr => self.ocr_pages.fetch_add(1, Ordering::SeqCst),
            };
        }

        fn on_page_error(&self, _source: &str, _page_num: usize, _total: usize, _error: &str) {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }

        fn on_batch_complete(&self, _total: usize, succeeded: usize) {
            self.succeeded.store(succeeded, Ordering::SeqCst);
        }
    }

    #[test]
    fn noop_callback_does_not_panic() {
        let cb = NoopProgressCallback;
        cb.on_batch_start(2);
        cb.on_document_start(0, "a.pdf", 3);
        cb.on_page_complete("a.pdf", 1, 3, ExtractionMethod::Direct, 120);
        cb.on_page_error("a.pdf", 2, 3, "rasterisation failed");
        cb.on_document_complete(0, "a.pdf", true);
        cb.on_batch_complete(2, 1);
    }

    #[test]
    fn tracking_callback_receives_events() {
        let tracker = TrackingCallback::default();
        tracker.on_document_start(0, "scan.pdf", 3);
        tracker.on_page_complete("scan.pdf", 1, 3, ExtractionMethod::Direct, 40);
        tracker.on_page_complete("scan.pdf", 2, 3, ExtractionMethod::Ocr, 900);
        tracker.on_page_error("scan.pdf", 3, 3, "OCR engine unavailable");
        tracker.on_batch_complete(1, 1);

        assert_eq!(tracker.documents.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.direct_pages.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.ocr_pages.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.errors.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.succeeded.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn arc_dyn_callback_works() {
        let cb: ProgressCallback = Arc::new(NoopProgressCallback);
        cb.on_batch_start(10);
        cb.on_document_complete(3, "x.pdf", false);
    }
}
