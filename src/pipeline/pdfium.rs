//! pdfium binding and the backend shared by text-layer extraction and
//! rasterisation.
//!
//! pdfium uses thread-local state and its document handles borrow the
//! library binding, so neither can be kept across threads. Every call binds,
//! opens the document from the shared byte buffer, does its work and drops
//! everything before returning. Callers run these methods on the blocking
//! pool (see [`crate::pipeline::document`]).

use crate::error::Pdf2TextError;
use pdfium_render::prelude::*;
use tracing::debug;

/// Bind to a pdfium library.
///
/// Resolution order: `PDFIUM_LIB_PATH`, a library next to the working
/// directory, then the system library search path.
pub fn bind_pdfium() -> Result<Pdfium, Pdf2TextError> {
    let bindings = match std::env::var("PDFIUM_LIB_PATH") {
        Ok(path) if !path.is_empty() => Pdfium::bind_to_library(&path),
        _ => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| Pdf2TextError::PdfiumBindingFailed(format!("{:?}", e)))?;

    Ok(Pdfium::new(bindings))
}

/// Text-layer and rasterisation backend built on pdfium.
#[derive(Debug, Clone)]
pub struct PdfiumBackend {
    pub(crate) max_rendered_pixels: u32,
}

impl PdfiumBackend {
    /// Probe the pdfium binding once so a missing library is reported when
    /// the extractor is built rather than on the first page.
    pub fn new(max_rendered_pixels: u32) -> Result<Self, Pdf2TextError> {
        bind_pdfium()?;
        debug!("pdfium bound successfully");
        Ok(Self {
            max_rendered_pixels,
        })
    }

    /// Open `bytes` and hand the document to `f`.
    pub(crate) fn with_document<T>(
        &self,
        source: &str,
        bytes: &[u8],
        f: impl FnOnce(&PdfDocument<'_>) -> T,
    ) -> Result<T, Pdf2TextError> {
        let pdfium = bind_pdfium()?;
        let document = pdfium.load_pdf_from_byte_slice(bytes, None).map_err(|e| {
            let err_str = format!("{:?}", e);
            let detail = if err_str.contains("Password") || err_str.contains("password") {
                "document is encrypted and requires a password".to_string()
            } else {
                err_str
            };
            Pdf2TextError::DocumentRead {
                source_name: source.to_string(),
                detail,
            }
        })?;
        Ok(f(&document))
    }
}
