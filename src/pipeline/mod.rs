//! Pipeline stages for hybrid PDF-to-text extraction.
//!
//! Each submodule implements one step. The capability seams
//! ([`text_layer::TextLayer`], [`render::Rasterizer`], [`ocr::OcrBackend`])
//! are traits so the pipeline runs against pdfium and tesseract in
//! production and against in-memory doubles in tests.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ text_layer ──▶ select ──▶ postprocess ──▶ document
//!                            │  ▲
//!                            ▼  │
//!             render ──▶ preprocess ──▶ ocr
//! ```
//!
//! 1. [`input`]      requests, `%PDF` check, the immutable [`input::Document`]
//! 2. [`pdfium`]     library binding shared by text extraction and rendering
//! 3. [`text_layer`] embedded text of one page
//! 4. [`render`]     one page to a raster; pdfium is not async-safe, so
//!    callers run it in `spawn_blocking`
//! 5. [`preprocess`] grayscale, denoise, adaptive threshold, deskew
//! 6. [`ocr`]        multi-pass recognition over an [`ocr::OcrBackend`]
//! 7. [`tesseract`]  the `tesseract` CLI backend
//! 8. [`select`]     per-page method decision
//! 9. [`postprocess`] deterministic text normalisation
//! 10. [`document`]  per-document state machine and assembly

pub mod document;
pub mod input;
pub mod ocr;
pub mod pdfium;
pub mod postprocess;
pub mod preprocess;
pub mod render;
pub mod select;
pub mod tesseract;
pub mod text_layer;
