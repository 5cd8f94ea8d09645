//! Page rasterisation for OCR.
//!
//! Memory grows with DPI², so the rendered image is additionally capped at
//! `max_rendered_pixels` on either edge. The returned image is owned by the
//! caller and freed when it goes out of scope.

use crate::error::PageError;
use crate::pipeline::input::Document;
use crate::pipeline::pdfium::PdfiumBackend;
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::debug;

/// PDF user space is 72 points per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Renders one page of a document to a raster image.
pub trait Rasterizer: Send + Sync {
    fn rasterize(
        &self,
        document: &Document,
        page_index: usize,
        dpi: u32,
    ) -> Result<DynamicImage, PageError>;
}

impl Rasterizer for PdfiumBackend {
    fn rasterize(
        &self,
        document: &Document,
        page_index: usize,
        dpi: u32,
    ) -> Result<DynamicImage, PageError> {
        let page_num = page_index + 1;
        let render_error = |detail: String| PageError::Rasterization {
            page: page_num,
            detail,
        };

        let render_config = PdfRenderConfig::new()
            .scale_page_by_factor(dpi as f32 / POINTS_PER_INCH)
            .set_maximum_width(self.max_rendered_pixels as i32)
            .set_maximum_height(self.max_rendered_pixels as i32);

        self.with_document(document.source(), document.bytes(), |pdf| {
            let pages = pdf.pages();
            let total = pages.len() as usize;
            if page_index >= total {
                return Err(render_error(format!(
                    "page index out of range (document has {total} pages)"
                )));
            }

            let page = pages
                .get(page_index as u16)
                .map_err(|e| render_error(format!("{:?}", e)))?;
            let bitmap = page
                .render_with_config(&render_config)
                .map_err(|e| render_error(format!("{:?}", e)))?;

            let image = bitmap.as_image();
            debug!(
                "Rendered page {} at {} DPI → {}x{} px",
                page_num,
                dpi,
                image.width(),
                image.height()
            );
            Ok(image)
        })
        .map_err(|e| render_error(e.to_string()))?
    }
}
