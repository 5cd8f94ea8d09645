//! Configuration types for hybrid PDF-to-text extraction.
//!
//! All extraction behaviour is controlled through [`ExtractionConfig`], built
//! via its [`ExtractionConfigBuilder`]. One struct holds every knob so it can
//! be shared across the worker pool and logged next to a run's results.
//!
//! The builder clamps obviously out-of-range values; [`ExtractionConfigBuilder::build`]
//! rejects the ones that cannot be clamped into something meaningful.

use crate::error::Pdf2TextError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Lowest accepted rasterisation resolution.
pub const MIN_DPI: u32 = 150;
/// Highest accepted rasterisation resolution.
pub const MAX_DPI: u32 = 600;
/// Highest tesseract page-segmentation mode.
pub const MAX_SEGMENTATION_MODE: u8 = 13;

/// Configuration for hybrid extraction.
///
/// # Example
/// ```rust
/// use edgequake_pdf2text::ExtractionConfig;
///
/// let config = ExtractionConfig::builder()
///     .dpi(300)
///     .concurrency(4)
///     .ocr_languages(vec!["eng".into(), "deu".into()])
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ExtractionConfig {
    /// Rasterisation DPI for pages that need OCR. Range: 150–600. Default: 300.
    ///
    /// Tesseract is trained on roughly 300 DPI glyph sizes; lower values lose
    /// small print, higher values mostly cost memory (pixels grow with DPI²).
    pub dpi: u32,

    /// Maximum rendered image edge in pixels. Default: 7000.
    ///
    /// An A0 poster at 300 DPI would otherwise allocate hundreds of megabytes.
    pub max_rendered_pixels: u32,

    /// Minimum non-whitespace characters for a text layer to be accepted. Default: 20.
    pub min_direct_chars: usize,

    /// Minimum alphanumeric-to-total character ratio for a text layer to be
    /// accepted when it is shorter than `min_direct_chars`. Default: 0.5.
    pub min_alnum_ratio: f32,

    /// Tesseract language codes, joined with `+` on the command line. Default: `["eng"]`.
    pub ocr_languages: Vec<String>,

    /// Page-segmentation modes tried in order by the multi-pass OCR engine.
    /// Default: `[6, 3, 4]` (uniform block, automatic, single column).
    pub segmentation_modes: Vec<u8>,

    /// Mean word confidence (0–1) at which a pass is accepted without trying
    /// the remaining modes. Default: 0.90.
    pub early_accept_confidence: f32,

    /// Image preprocessing applied before OCR.
    pub preprocess: PreprocessProfile,

    /// Apply whitespace/punctuation normalisation to page text. Default: true.
    pub normalize_text: bool,

    /// Number of documents processed concurrently in a batch.
    /// Default: available processing units.
    pub concurrency: usize,

    /// Per-document deadline in seconds. Default: none.
    pub document_timeout_secs: Option<u64>,

    /// Path to the `tesseract` executable. Default: looked up on `PATH`.
    pub tesseract_path: Option<PathBuf>,

    /// Receives per-document and per-page events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            max_rendered_pixels: 7000,
            min_direct_chars: 20,
            min_alnum_ratio: 0.5,
            ocr_languages: vec!["eng".to_string()],
            segmentation_modes: vec![6, 3, 4],
            early_accept_confidence: 0.90,
            preprocess: PreprocessProfile::default(),
            normalize_text: true,
            concurrency: default_concurrency(),
            document_timeout_secs: None,
            tesseract_path: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ExtractionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExtractionConfig")
            .field("dpi", &self.dpi)
            .field("max_rendered_pixels", &self.max_rendered_pixels)
            .field("min_direct_chars", &self.min_direct_chars)
            .field("min_alnum_ratio", &self.min_alnum_ratio)
            .field("ocr_languages", &self.ocr_languages)
            .field("segmentation_modes", &self.segmentation_modes)
            .field("early_accept_confidence", &self.early_accept_confidence)
            .field("preprocess", &self.preprocess)
            .field("normalize_text", &self.normalize_text)
            .field("concurrency", &self.concurrency)
            .field("document_timeout_secs", &self.document_timeout_secs)
            .field("tesseract_path", &self.tesseract_path)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn ExtractionProgressCallback>"),
            )
            .finish()
    }
}

impl ExtractionConfig {
    /// Create a new builder for `ExtractionConfig`.
    pub fn builder() -> ExtractionConfigBuilder {
        ExtractionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Number of processing units, falling back to 1 when it cannot be queried.
pub fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Check a rasterisation DPI against the accepted range.
pub fn validate_dpi(dpi: u32) -> Result<u32, Pdf2TextError> {
    if (MIN_DPI..=MAX_DPI).contains(&dpi) {
        Ok(dpi)
    } else {
        Err(Pdf2TextError::InvalidConfig(format!(
            "DPI must be {MIN_DPI}–{MAX_DPI}, got {dpi}"
        )))
    }
}

/// Builder for [`ExtractionConfig`].
#[derive(Debug)]
pub struct ExtractionConfigBuilder {
    config: ExtractionConfig,
}

impl ExtractionConfigBuilder {
    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(MIN_DPI, MAX_DPI);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.max_rendered_pixels = px.max(100);
        self
    }

    pub fn min_direct_chars(mut self, n: usize) -> Self {
        self.config.min_direct_chars = n;
        self
    }

    pub fn min_alnum_ratio(mut self, ratio: f32) -> Self {
        self.config.min_alnum_ratio = ratio.clamp(0.0, 1.0);
        self
    }

    pub fn ocr_languages(mut self, languages: Vec<String>) -> Self {
        self.config.ocr_languages = languages;
        self
    }

    pub fn segmentation_modes(mut self, modes: Vec<u8>) -> Self {
        self.config.segmentation_modes = modes;
        self
    }

    pub fn early_accept_confidence(mut self, c: f32) -> Self {
        self.config.early_accept_confidence = c.clamp(0.0, 1.0);
        self
    }

    pub fn preprocess(mut self, profile: PreprocessProfile) -> Self {
        self.config.preprocess = profile;
        self
    }

    pub fn normalize_text(mut self, v: bool) -> Self {
        self.config.normalize_text = v;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn document_timeout_secs(mut self, secs: u64) -> Self {
        self.config.document_timeout_secs = Some(secs);
        self
    }

    pub fn tesseract_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.tesseract_path = Some(path.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ExtractionConfig, Pdf2TextError> {
        let c = &self.config;
        validate_dpi(c.dpi)?;
        if c.concurrency == 0 {
            return Err(Pdf2TextError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.ocr_languages.is_empty() || c.ocr_languages.iter().any(|l| l.trim().is_empty()) {
            return Err(Pdf2TextError::InvalidConfig(
                "At least one non-empty OCR language code is required".into(),
            ));
        }
        if c.segmentation_modes.is_empty() {
            return Err(Pdf2TextError::InvalidConfig(
                "At least one page-segmentation mode is required".into(),
            ));
        }
        if let Some(m) = c
            .segmentation_modes
            .iter()
            .find(|&&m| m > MAX_SEGMENTATION_MODE)
        {
            return Err(Pdf2TextError::InvalidConfig(format!(
                "Page-segmentation mode must be 0–{MAX_SEGMENTATION_MODE}, got {m}"
            )));
        }
        if c.document_timeout_secs == Some(0) {
            return Err(Pdf2TextError::InvalidConfig(
                "Document timeout must be ≥ 1 second".into(),
            ));
        }
        c.preprocess.validate()?;
        Ok(self.config)
    }
}

/// Image enhancement steps applied before OCR.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PreprocessProfile {
    /// Run preprocessing at all. When false the raw raster goes to OCR.
    pub enabled: bool,
    /// 3×3 median filter before thresholding.
    pub denoise: bool,
    /// Neighbourhood size for Gaussian adaptive thresholding. Odd, ≥ 3. Default: 11.
    pub threshold_block_size: u32,
    /// Constant subtracted from the local mean. Default: 2.
    pub threshold_offset: i16,
    /// Estimate and undo small rotations (±5°).
    pub deskew: bool,
}

impl Default for PreprocessProfile {
    fn default() -> Self {
        Self {
            enabled: true,
            denoise: true,
            threshold_block_size: 11,
            threshold_offset: 2,
            deskew: false,
        }
    }
}

impl PreprocessProfile {
    /// A profile that hands the raw raster straight to OCR.
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }

    fn validate(&self) -> Result<(), Pdf2TextError> {
        if self.threshold_block_size < 3 || self.threshold_block_size % 2 == 0 {
            return Err(Pdf2TextError::InvalidConfig(format!(
                "Threshold block size must be odd and ≥ 3, got {}",
                self.threshold_block_size
            )));
        }
        Ok(())
    }
}
