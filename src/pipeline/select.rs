//! Per-page method selection: text layer first, OCR as the fallback.
//!
//! The text layer is near-free and exact when present, so it is always tried
//! first and accepted whenever it passes [`QualityHeuristic`]. Only pages
//! that fail the heuristic (or documents with force-OCR set) pay for
//! rasterisation, preprocessing and recognition.
//!
//! [`MethodSelector::select`] never fails. Page-level problems are recorded
//! in the returned [`PageResult`].

use crate::batch::CancelSignal;
use crate::config::ExtractionConfig;
use crate::error::PageError;
use crate::output::{ExtractionAttempt, ExtractionMethod, PageResult};
use crate::pipeline::input::Document;
use crate::pipeline::ocr::{OcrEngine, OcrOutcome};
use crate::pipeline::postprocess::normalize_text;
use crate::pipeline::preprocess::ImagePreprocessor;
use crate::pipeline::render::Rasterizer;
use crate::pipeline::text_layer::TextLayer;
use image::DynamicImage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

/// Decides whether embedded text is usable without OCR.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityHeuristic {
    /// Non-whitespace characters at or above which the text is accepted.
    pub min_chars: usize,
    /// Alphanumeric share of all characters at or above which shorter text
    /// is still accepted.
    pub min_alnum_ratio: f32,
}

/// Result of [`QualityHeuristic::evaluate`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityVerdict {
    pub passes: bool,
    /// Alphanumeric ratio, zero for empty text.
    pub quality: f32,
    pub non_whitespace: usize,
}

impl QualityHeuristic {
    pub fn from_config(config: &ExtractionConfig) -> Self {
        Self {
            min_chars: config.min_direct_chars,
            min_alnum_ratio: config.min_alnum_ratio,
        }
    }

    pub fn evaluate(&self, text: &str) -> QualityVerdict {
        let total = text.chars().count();
        let non_whitespace = text.chars().filter(|c| !c.is_whitespace()).count();
        let alnum = text.chars().filter(|c| c.is_alphanumeric()).count();

        let quality = if total == 0 {
            0.0
        } else {
            alnum as f32 / total as f32
        };
        let passes = non_whitespace > 0
            && (non_whitespace >= self.min_chars || quality >= self.min_alnum_ratio);

        QualityVerdict {
            passes,
            quality,
            non_whitespace,
        }
    }
}

/// Per-document flags applied to every page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageOptions {
    pub force_ocr: bool,
    pub dpi: u32,
}

/// One page under extraction.
///
/// The embedded text is read at most once, and the raster only when OCR is
/// actually needed. Both are dropped with the `Page`, so a rendered image
/// never outlives the selection of its page.
pub struct Page<'a> {
    document: &'a Document,
    index: usize,
    embedded_text: Option<String>,
    raster: Option<DynamicImage>,
}

impl<'a> Page<'a> {
    pub fn new(document: &'a Document, index: usize) -> Self {
        Self {
            document,
            index,
            embedded_text: None,
            raster: None,
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Embedded text, empty when the page has none or it cannot be read.
    pub fn embedded_text(&mut self, layer: &dyn TextLayer) -> &str {
        let (document, index) = (self.document, self.index);
        self.embedded_text.get_or_insert_with(|| {
            layer.page_text(document, index).unwrap_or_else(|e| {
                warn!("Page {}: text layer unreadable, treating as empty: {}", index + 1, e);
                String::new()
            })
        })
    }

    fn take_text(&mut self) -> String {
        self.embedded_text.take().unwrap_or_default()
    }

    /// Render the page on first use.
    pub fn raster(&mut self, rasterizer: &dyn Rasterizer, dpi: u32) -> Result<&DynamicImage, PageError> {
        match &mut self.raster {
            Some(image) => Ok(&*image),
            slot @ None => {
                let image = rasterizer.rasterize(self.document, self.index, dpi)?;
                Ok(&*slot.insert(image))
            }
        }
    }

    pub fn is_rasterized(&self) -> bool {
        self.raster.is_some()
    }
}

/// Chooses and runs the extraction method for each page.
pub struct MethodSelector {
    text_layer: Arc<dyn TextLayer>,
    rasterizer: Arc<dyn Rasterizer>,
    preprocessor: ImagePreprocessor,
    ocr: OcrEngine,
    heuristic: QualityHeuristic,
    normalize: bool,
}

impl MethodSelector {
    pub fn new(
        text_layer: Arc<dyn TextLayer>,
        rasterizer: Arc<dyn Rasterizer>,
        ocr: OcrEngine,
        config: &ExtractionConfig,
    ) -> Self {
        Self {
            text_layer,
            rasterizer,
            preprocessor: ImagePreprocessor::new(config.preprocess),
            ocr,
            heuristic: QualityHeuristic::from_config(config),
            normalize: config.normalize_text,
        }
    }

    pub fn text_layer(&self) -> &Arc<dyn TextLayer> {
        &self.text_layer
    }

    pub fn ocr(&self) -> &OcrEngine {
        &self.ocr
    }

    /// Extract one page with the cheapest acceptable method.
    ///
    /// `abort` is set when the page's result is no longer wanted; OCR then
    /// stops at the next pass boundary and the page is recorded as cancelled.
    pub fn select(
        &self,
        document: &Document,
        page_index: usize,
        options: &PageOptions,
        abort: &CancelSignal,
    ) -> PageResult {
        let started = Instant::now();
        let page_num = page_index + 1;
        let mut page = Page::new(document, page_index);

        if !options.force_ocr {
            let verdict = self
                .heuristic
                .evaluate(page.embedded_text(self.text_layer.as_ref()));
            if verdict.passes {
                debug!(
                    "Page {}: direct ({} chars, alnum ratio {:.2})",
                    page_num, verdict.non_whitespace, verdict.quality
                );
                let text = self.finish_text(page.take_text());
                return PageResult {
                    page_index,
                    attempt: ExtractionAttempt {
                        method: ExtractionMethod::Direct,
                        quality: if text.is_empty() { 0.0 } else { verdict.quality },
                        text,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    },
                    error: None,
                };
            }
            debug!(
                "Page {}: text layer insufficient ({} chars), falling back to OCR",
                page_num, verdict.non_whitespace
            );
        }

        match self.ocr_page(&mut page, options.dpi, abort) {
            Ok(outcome) => {
                debug!(
                    "Page {}: ocr (psm {}, quality {:.2}, {} passes)",
                    page_num, outcome.segmentation_mode, outcome.quality, outcome.passes
                );
                let text = self.finish_text(outcome.text);
                PageResult {
                    page_index,
                    attempt: ExtractionAttempt {
                        method: ExtractionMethod::Ocr,
                        quality: if text.is_empty() { 0.0 } else { outcome.quality },
                        text,
                        elapsed_ms: started.elapsed().as_millis() as u64,
                    },
                    error: None,
                }
            }
            Err(e) => {
                warn!("{}", e);
                PageResult::failed(
                    page_index,
                    ExtractionMethod::Ocr,
                    e,
                    started.elapsed().as_millis() as u64,
                )
            }
        }
    }

    fn ocr_page(
        &self,
        page: &mut Page<'_>,
        dpi: u32,
        abort: &CancelSignal,
    ) -> Result<OcrOutcome, PageError> {
        let page_num = page.index() + 1;
        if abort.is_cancelled() {
            return Err(PageError::Cancelled { page: page_num });
        }

        // No point rendering a page nobody can read.
        let backend = self.ocr.backend();
        if !backend.is_available() {
            return Err(PageError::OcrUnavailable {
                page: page_num,
                detail: format!("{} is not available", backend.name()),
            });
        }

        let raster = page.raster(self.rasterizer.as_ref(), dpi)?;

        let processed;
        let image = if self.preprocessor.is_enabled() {
            match self.preprocessor.process(raster) {
                Ok(enhanced) => {
                    processed = enhanced;
                    &processed
                }
                Err(e) => {
                    warn!("Page {}: preprocessing failed, using raw raster: {}", page_num, e);
                    raster
                }
            }
        } else {
            raster
        };

        self.ocr
            .recognize(image, abort)
            .map_err(|e| e.into_page_error(page_num))
    }

    fn finish_text(&self, text: String) -> String {
        if self.normalize {
            normalize_text(&text)
        } else {
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn heuristic() -> QualityHeuristic {
        QualityHeuristic {
            min_chars: 20,
            min_alnum_ratio: 0.5,
        }
    }

    #[test]
    fn long_text_passes() {
        let v = heuristic().evaluate("Discharge summary for admission on 2024-03-01");
        assert!(v.passes);
        assert!(v.non_whitespace >= 20);
    }

    #[test]
    fn short_clean_text_passes_on_ratio() {
        let v = heuristic().evaluate("Patient: Jane Doe");
        assert_eq!(v.non_whitespace, 15);
        assert!(v.passes);
        assert!(v.quality > 0.5);
    }

    #[test]
    fn empty_and_whitespace_fail() {
        assert!(!heuristic().evaluate("").passes);
        let v = heuristic().evaluate("  \n\t ");
        assert!(!v.passes);
        assert_eq!(v.quality, 0.0);
    }

    #[test]
    fn short_symbol_noise_fails() {
        // Glyph soup some scanners leave in an invisible text layer.
        assert!(!heuristic().evaluate(". , ; : - _ |").passes);
    }

    #[test]
    fn thresholds_are_configurable() {
        let strict = QualityHeuristic {
            min_chars: 100,
            min_alnum_ratio: 0.95,
        };
        assert!(!strict.evaluate("Patient: Jane Doe").passes);
    }
}
