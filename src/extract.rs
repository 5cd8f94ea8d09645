//! Single-document extraction entry points.
//!
//! [`Extractor`] wires the backends together once (pdfium binding lookup,
//! tesseract detection) and can then run any number of documents. The free
//! functions below build a throwaway extractor per call for one-off use.

use crate::batch::CancelSignal;
use crate::config::ExtractionConfig;
use crate::error::Pdf2TextError;
use crate::output::{render_text_file, DocumentResult};
use crate::pipeline::document::DocumentPipeline;
use crate::pipeline::input::ExtractRequest;
use crate::pipeline::ocr::{OcrBackend, OcrEngine};
use crate::pipeline::pdfium::{bind_pdfium, PdfiumBackend};
use crate::pipeline::render::Rasterizer;
use crate::pipeline::select::MethodSelector;
use crate::pipeline::tesseract::TesseractCli;
use crate::pipeline::text_layer::TextLayer;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Extraction components, initialised once and shared by every document.
pub struct Extractor {
    config: ExtractionConfig,
    selector: Arc<MethodSelector>,
}

impl Extractor {
    /// Bind pdfium and detect tesseract.
    ///
    /// Fails only when pdfium cannot be bound. A missing tesseract is not an
    /// error here: digital PDFs still extract, and pages that need OCR fail
    /// individually with `OcrUnavailableError`.
    pub fn new(config: ExtractionConfig) -> Result<Self, Pdf2TextError> {
        let pdfium = Arc::new(PdfiumBackend::new(config.max_rendered_pixels)?);
        let tesseract = TesseractCli::detect(config.tesseract_path.clone());
        if !tesseract.is_available() {
            warn!("OCR engine unavailable; scanned pages will fail");
        }
        Ok(Self::with_backends(
            config,
            pdfium.clone(),
            pdfium,
            Arc::new(tesseract),
        ))
    }

    /// Build from explicit backends.
    pub fn with_backends(
        config: ExtractionConfig,
        text_layer: Arc<dyn TextLayer>,
        rasterizer: Arc<dyn Rasterizer>,
        ocr_backend: Arc<dyn OcrBackend>,
    ) -> Self {
        let ocr = OcrEngine::new(ocr_backend, &config);
        let selector = Arc::new(MethodSelector::new(text_layer, rasterizer, ocr, &config));
        Self { config, selector }
    }

    pub fn config(&self) -> &ExtractionConfig {
        &self.config
    }

    pub fn selector(&self) -> &Arc<MethodSelector> {
        &self.selector
    }

    /// Extract one document.
    ///
    /// # Errors
    /// Only document-level failures: unreadable PDF, invalid DPI, deadline
    /// expiry. Page failures are recorded in the returned result.
    pub async fn extract(&self, request: ExtractRequest) -> Result<DocumentResult, Pdf2TextError> {
        self.extract_with(request, 0, CancelSignal::new()).await
    }

    /// Extract one document as item `index` of a batch.
    ///
    /// On timeout the future is dropped and the page still on the blocking
    /// pool is told to stop: OCR ends at the next pass boundary and a running
    /// tesseract process is killed. The partial page result is discarded.
    pub(crate) async fn extract_with(
        &self,
        request: ExtractRequest,
        index: usize,
        cancel: CancelSignal,
    ) -> Result<DocumentResult, Pdf2TextError> {
        let abort = CancelSignal::new();
        let pipeline = DocumentPipeline::new(Arc::clone(&self.selector))
            .with_progress(self.config.progress_callback.clone())
            .with_cancel(cancel)
            .with_abort(abort.clone())
            .batch_index(index);

        let Some(secs) = self.config.document_timeout_secs else {
            return pipeline.run(request).await;
        };

        let source = request.source.clone();
        match tokio::time::timeout(Duration::from_secs(secs), pipeline.run(request)).await {
            Ok(result) => result,
            Err(_) => {
                warn!("Extraction timed out after {}s: {}", secs, source);
                // Stops the page still on the blocking pool.
                abort.cancel();
                if let Some(ref cb) = self.config.progress_callback {
                    cb.on_document_complete(index, &source, false);
                }
                Err(Pdf2TextError::Timeout {
                    source_name: source,
                    secs,
                })
            }
        }
    }
}

/// Extract one document with a one-off [`Extractor`].
pub async fn extract(
    request: ExtractRequest,
    config: &ExtractionConfig,
) -> Result<DocumentResult, Pdf2TextError> {
    Extractor::new(config.clone())?.extract(request).await
}

/// Read a PDF from disk and extract it at `config.dpi`.
pub async fn extract_file(
    path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<DocumentResult, Pdf2TextError> {
    let request = ExtractRequest::from_path(path).await?.resolution_dpi(config.dpi);
    extract(request, config).await
}

/// Synchronous wrapper around [`extract`].
///
/// Creates a temporary tokio runtime internally.
pub fn extract_sync(
    request: ExtractRequest,
    config: &ExtractionConfig,
) -> Result<DocumentResult, Pdf2TextError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| Pdf2TextError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(extract(request, config))
}

/// Extract a document and write the persisted text file to `output_path`.
pub async fn extract_to_file(
    request: ExtractRequest,
    output_path: impl AsRef<Path>,
    config: &ExtractionConfig,
) -> Result<DocumentResult, Pdf2TextError> {
    let result = extract(request, config).await?;
    write_text_file(&result, output_path).await?;
    Ok(result)
}

/// Write [`render_text_file`] output for `result`.
///
/// Uses atomic write (temp file + rename) to prevent partial files.
pub async fn write_text_file(
    result: &DocumentResult,
    output_path: impl AsRef<Path>,
) -> Result<(), Pdf2TextError> {
    let path = output_path.as_ref();
    let write_error = |e: std::io::Error| Pdf2TextError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(write_error)?;
    }

    let tmp_path = path.with_extension("txt.tmp");
    tokio::fs::write(&tmp_path, render_text_file(result))
        .await
        .map_err(write_error)?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(write_error)?;

    info!("Wrote {}", path.display());
    Ok(())
}

/// Availability of the extraction backends.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub pdfium_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pdfium_error: Option<String>,
    pub ocr_engine: String,
    pub ocr_available: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ocr_version: Option<String>,
    /// Both backends usable: any document can be extracted.
    pub ready: bool,
    pub timestamp: DateTime<Utc>,
}

/// Probe pdfium and the OCR engine configured in `config`.
pub fn system_status(config: &ExtractionConfig) -> SystemStatus {
    let pdfium_error = bind_pdfium().err().map(|e| e.to_string());
    let tesseract = TesseractCli::detect(config.tesseract_path.clone());
    status_from(pdfium_error, &tesseract)
}

fn status_from(pdfium_error: Option<String>, ocr: &dyn OcrBackend) -> SystemStatus {
    let pdfium_available = pdfium_error.is_none();
    let ocr_available = ocr.is_available();
    SystemStatus {
        pdfium_available,
        pdfium_error,
        ocr_engine: ocr.name().to_string(),
        ocr_available,
        ocr_version: ocr.version(),
        ready: pdfium_available && ocr_available,
        timestamp: Utc::now(),
    }
}
