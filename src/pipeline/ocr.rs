//! OCR capability interface and the multi-pass recognition engine.
//!
//! [`OcrBackend`] is the black box: one image and one configuration in, text
//! and a confidence out. A backend is initialised once and shared by
//! reference, which also lets tests swap in doubles.
//!
//! [`OcrEngine`] runs the backend once per configured page-segmentation mode
//! and keeps the best pass. No single mode is reliable across forms, tables
//! and prose; trying a few and scoring them is cheaper than guessing wrong.

use crate::batch::CancelSignal;
use crate::config::ExtractionConfig;
use crate::error::OcrError;
use image::DynamicImage;
use std::sync::Arc;
use tracing::{debug, warn};

/// Settings for one recognition pass.
#[derive(Debug, Clone)]
pub struct RecognitionConfig {
    pub languages: Vec<String>,
    /// Tesseract page-segmentation mode (0–13).
    pub segmentation_mode: u8,
    /// Set once nobody wants the result; backends that run long should
    /// poll it and return [`OcrError::Aborted`].
    pub abort: CancelSignal,
}

/// Output of one recognition pass.
#[derive(Debug, Clone, PartialEq)]
pub struct RecognizedText {
    pub text: String,
    /// Mean word confidence in `0.0..=1.0`.
    pub confidence: f32,
    pub word_count: usize,
}

/// A text-recognition capability.
pub trait OcrBackend: Send + Sync {
    fn name(&self) -> &str;

    /// Version string reported by the engine, if it could be read.
    fn version(&self) -> Option<String> {
        None
    }

    fn is_available(&self) -> bool;

    fn recognize(
        &self,
        image: &DynamicImage,
        config: &RecognitionConfig,
    ) -> Result<RecognizedText, OcrError>;
}

/// The pass selected by [`OcrEngine::recognize`].
#[derive(Debug, Clone, PartialEq)]
pub struct OcrOutcome {
    pub text: String,
    /// Confidence of the selected pass, zero when no text was recognised.
    pub quality: f32,
    pub segmentation_mode: u8,
    /// Passes actually run (fewer than configured after an early accept).
    pub passes: usize,
}

/// Multi-pass recognition over an [`OcrBackend`].
#[derive(Clone)]
pub struct OcrEngine {
    backend: Arc<dyn OcrBackend>,
    languages: Vec<String>,
    segmentation_modes: Vec<u8>,
    early_accept_confidence: f32,
}

impl OcrEngine {
    pub fn new(backend: Arc<dyn OcrBackend>, config: &ExtractionConfig) -> Self {
        Self {
            backend,
            languages: config.ocr_languages.clone(),
            segmentation_modes: config.segmentation_modes.clone(),
            early_accept_confidence: config.early_accept_confidence,
        }
    }

    pub fn backend(&self) -> &Arc<dyn OcrBackend> {
        &self.backend
    }

    /// Recognise `image`, trying each segmentation mode until one is good
    /// enough, then returning the best pass.
    ///
    /// `Unavailable` aborts at once. Other pass failures are skipped as long
    /// as some pass succeeds. `abort` is checked before every pass; once set
    /// the remaining passes are not started.
    pub fn recognize(
        &self,
        image: &DynamicImage,
        abort: &CancelSignal,
    ) -> Result<OcrOutcome, OcrError> {
        let mut passes: Vec<(u8, RecognizedText)> = Vec::with_capacity(self.segmentation_modes.len());
        let mut last_err: Option<OcrError> = None;

        for &mode in &self.segmentation_modes {
            if abort.is_cancelled() {
                debug!("OCR abandoned before psm={}", mode);
                return Err(OcrError::Aborted);
            }
            let config = RecognitionConfig {
                languages: self.languages.clone(),
                segmentation_mode: mode,
                abort: abort.clone(),
            };

            match self.backend.recognize(image, &config) {
                Ok(pass) => {
                    debug!(
                        "OCR pass psm={}: {} words, confidence {:.2}",
                        mode, pass.word_count, pass.confidence
                    );
                    let accept = pass.confidence >= self.early_accept_confidence
                        && !pass.text.trim().is_empty();
                    passes.push((mode, pass));
                    if accept {
                        break;
                    }
                }
                Err(e @ (OcrError::Unavailable(_) | OcrError::Aborted)) => return Err(e),
                Err(e) => {
                    warn!("OCR pass psm={} failed: {}", mode, e);
                    last_err = Some(e);
                }
            }
        }

        let Some(best) = select_best(&passes) else {
            return Err(last_err
                .unwrap_or_else(|| OcrError::Failed("no segmentation modes configured".into())));
        };

        let run = passes.len();
        let (mode, pass) = passes.swap_remove(best);
        let quality = if pass.text.trim().is_empty() {
            0.0
        } else {
            pass.confidence.clamp(0.0, 1.0)
        };

        Ok(OcrOutcome {
            text: pass.text,
            quality,
            segmentation_mode: mode,
            passes: run,
        })
    }
}

/// Index of the pass with the highest `confidence × relative word coverage`.
///
/// Coverage keeps a confident pass that found three words from beating a
/// slightly less confident pass that read the whole page. Ties keep the
/// earlier pass.
fn select_best(passes: &[(u8, RecognizedText)]) -> Option<usize> {
    let max_words = passes.iter().map(|(_, p)| p.word_count).max()?;

    let score = |p: &RecognizedText| -> f32 {
        if max_words == 0 {
            0.0
        } else {
            p.confidence * (p.word_count as f32 / max_words as f32)
        }
    };

    let mut best = 0;
    for (i, (_, pass)) in passes.iter().enumerate().skip(1) {
        if score(pass) > score(&passes[best].1) {
            best = i;
        }
    }
    Some(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    /// Returns a scripted result per segmentation mode and records calls.
    struct ScriptedBackend {
        script: HashMap<u8, Result<RecognizedText, OcrError>>,
        calls: Mutex<Vec<u8>>,
    }

    impl ScriptedBackend {
        fn new(script: Vec<(u8, Result<RecognizedText, OcrError>)>) -> Arc<Self> {
            Arc::new(Self {
                script: script.into_iter().collect(),
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    impl OcrBackend for ScriptedBackend {
        fn name(&self) -> &str {
            "scripted"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn recognize(
            &self,
            _image: &DynamicImage,
            config: &RecognitionConfig,
        ) -> Result<RecognizedText, OcrError> {
            self.calls.lock().unwrap().push(config.segmentation_mode);
            self.script
                .get(&config.segmentation_mode)
                .cloned()
                .unwrap_or_else(|| Err(OcrError::Failed("unscripted mode".into())))
        }
    }

    fn text(s: &str, confidence: f32) -> Result<RecognizedText, OcrError> {
        Ok(RecognizedText {
            text: s.to_string(),
            confidence,
            word_count: s.split_whitespace().count(),
        })
    }

    fn engine(backend: Arc<ScriptedBackend>, modes: Vec<u8>) -> OcrEngine {
        let config = ExtractionConfig::builder()
            .segmentation_modes(modes)
            .build()
            .unwrap();
        OcrEngine::new(backend, &config)
    }

    fn blank() -> DynamicImage {
        DynamicImage::ImageLuma8(image::GrayImage::new(8, 8))
    }

    #[test]
    fn picks_best_scoring_pass() {
        let backend = ScriptedBackend::new(vec![
            (6, text("Blood pressure 120 over 80", 0.70)),
            (3, text("Blood", 0.85)),
            (4, text("Blood pressure 120 over 80 mmHg", 0.80)),
        ]);
        let out = engine(backend.clone(), vec![6, 3, 4]).recognize(&blank(), &CancelSignal::new()).unwrap();
        assert_eq!(out.segmentation_mode, 4);
        assert_eq!(out.passes, 3);
        assert!((out.quality - 0.80).abs() < 1e-6);
        assert_eq!(*backend.calls.lock().unwrap(), vec![6, 3, 4]);
    }

    #[test]
    fn early_accept_stops_further_passes() {
        let backend = ScriptedBackend::new(vec![
            (6, text("Discharge summary", 0.95)),
            (3, text("never used", 0.99)),
        ]);
        let out = engine(backend.clone(), vec![6, 3]).recognize(&blank(), &CancelSignal::new()).unwrap();
        assert_eq!(out.segmentation_mode, 6);
        assert_eq!(out.passes, 1);
        assert_eq!(*backend.calls.lock().unwrap(), vec![6]);
    }

    #[test]
    fn unavailable_aborts_immediately() {
        let backend = ScriptedBackend::new(vec![
            (6, Err(OcrError::Unavailable("tesseract not found".into()))),
            (3, text("x", 0.5)),
        ]);
        let err = engine(backend.clone(), vec![6, 3]).recognize(&blank(), &CancelSignal::new()).unwrap_err();
        assert!(matches!(err, OcrError::Unavailable(_)));
        assert_eq!(backend.calls.lock().unwrap().len(), 1);
    }

    #[test]
    fn failed_pass_skipped_when_another_succeeds() {
        let backend = ScriptedBackend::new(vec![
            (6, Err(OcrError::Failed("exit status 1".into()))),
            (3, text("Allergies: none", 0.6)),
        ]);
        let out = engine(backend, vec![6, 3]).recognize(&blank(), &CancelSignal::new()).unwrap();
        assert_eq!(out.text, "Allergies: none");
    }

    #[test]
    fn all_passes_failing_returns_last_error() {
        let backend = ScriptedBackend::new(vec![
            (6, Err(OcrError::Failed("first".into()))),
            (3, Err(OcrError::Failed("second".into()))),
        ]);
        let err = engine(backend, vec![6, 3]).recognize(&blank(), &CancelSignal::new()).unwrap_err();
        assert_eq!(err, OcrError::Failed("second".into()));
    }

    #[test]
    fn empty_text_has_zero_quality() {
        let backend = ScriptedBackend::new(vec![(6, text("   ", 0.4))]);
        let out = engine(backend, vec![6]).recognize(&blank(), &CancelSignal::new()).unwrap();
        assert_eq!(out.quality, 0.0);
    }

    #[test]
    fn preset_abort_runs_no_pass() {
        let backend = ScriptedBackend::new(vec![(6, text("unused", 0.9))]);
        let abort = CancelSignal::new();
        abort.cancel();

        let err = engine(backend.clone(), vec![6, 3]).recognize(&blank(), &abort).unwrap_err();
        assert_eq!(err, OcrError::Aborted);
        assert!(backend.calls.lock().unwrap().is_empty());
    }

    /// Sets the abort flag while its first pass is running.
    struct AbandonedDuringPass {
        calls: Mutex<Vec<u8>>,
    }

    impl OcrBackend for AbandonedDuringPass {
        fn name(&self) -> &str {
            "abandoned"
        }

        fn is_available(&self) -> bool {
            true
        }

        fn recognize(
            &self,
            _image: &DynamicImage,
            config: &RecognitionConfig,
        ) -> Result<RecognizedText, OcrError> {
            self.calls.lock().unwrap().push(config.segmentation_mode);
            config.abort.cancel();
            text("Referral letter", 0.5)
        }
    }

    #[test]
    fn abort_stops_between_passes() {
        let backend = Arc::new(AbandonedDuringPass {
            calls: Mutex::new(Vec::new()),
        });
        let config = ExtractionConfig::builder()
            .segmentation_modes(vec![6, 3, 4])
            .build()
            .unwrap();

        let err = OcrEngine::new(backend.clone(), &config)
            .recognize(&blank(), &CancelSignal::new())
            .unwrap_err();
        assert_eq!(err, OcrError::Aborted);
        assert_eq!(*backend.calls.lock().unwrap(), vec![6]);
    }

    #[test]
    fn select_best_ties_keep_first() {
        let passes = vec![
            (6, RecognizedText { text: "a b".into(), confidence: 0.5, word_count: 2 }),
            (3, RecognizedText { text: "c d".into(), confidence: 0.5, word_count: 2 }),
        ];
        assert_eq!(select_best(&passes), Some(0));
        assert_eq!(select_best(&[]), None);
    }
}
