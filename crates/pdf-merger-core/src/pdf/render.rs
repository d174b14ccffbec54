use image::RgbImage;
use mupdf::{Colorspace, Document as MuDocument, Matrix};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::raster::PixelSurface;
use super::document::PdfDocument;
use super::page_index::PageIndex;

/// Default scale factor for rendering (1 pixel per PDF point)
pub const DEFAULT_RENDER_SCALE: f32 = 1.0;

/// Page renderer for PDF documents
pub struct PageRenderer<'a> {
    /// The PDF document to render
    pub doc: &'a PdfDocument,
    /// Scale factor for rendering
    pub scale: f32,
}

impl<'a> PageRenderer<'a> {
    /// Create a renderer with default scale (1.0)
    pub const fn new(doc: &'a PdfDocument) -> Self {
        Self {
            doc,
            scale: DEFAULT_RENDER_SCALE,
        }
    }

    /// Create a renderer with custom scale
    pub const fn with_scale(doc: &'a PdfDocument, scale: f32) -> Self {
        Self { doc, scale }
    }

    /// Rasterize one page (0-based) onto an opaque white surface
    pub fn render_page(&self, page_num: usize) -> Result<PixelSurface> {
        self.check_scale(page_num)?;
        let doc = self.doc.open_document()?;
        self.render_loaded(&doc, page_num)
    }

    /// Rasterize every page in order.
    ///
    /// The document is parsed once for the whole batch. The first page that
    /// fails aborts the batch.
    pub fn render_all_pages(&self) -> Result<Vec<PixelSurface>> {
        let total = self.doc.page_count();
        info!("Rendering {} pages at scale {}", total, self.scale);
        self.check_scale(0)?;

        let doc = self.doc.open_document()?;
        (0..total)
            .map(|page_num| self.render_loaded(&doc, page_num))
            .collect()
    }

    fn check_scale(&self, page_num: usize) -> Result<()> {
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(Error::PdfRender {
                page: page_num,
                reason: format!("scale must be a positive number, got {}", self.scale),
            });
        }
        Ok(())
    }

    fn render_loaded(&self, doc: &MuDocument, page_num: usize) -> Result<PixelSurface> {
        let page_index = PageIndex::try_from_page_num(page_num, self.doc.page_count())?;

        let page = doc.load_page(page_index.into()).map_err(|e| Error::PdfRender {
            page: page_num,
            reason: format!("Failed to load page: {e}"),
        })?;

        let matrix = Matrix::new_scale(self.scale, self.scale);

        // No alpha channel: mupdf paints onto opaque white
        let pixmap = page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), 0.0, true)
            .map_err(|e| Error::PdfRender {
                page: page_num,
                reason: format!("Failed to render: {e}"),
            })?;

        let rgb = pixels_to_rgb(
            pixmap.samples(),
            pixmap.n() as usize,
            pixmap.width(),
            pixmap.height(),
        )
        .map_err(|reason| Error::PdfRender {
            page: page_num,
            reason,
        })?;

        debug!(
            "Rendered page {} at {}x{} (scale {})",
            page_index.human_number(),
            rgb.width(),
            rgb.height(),
            self.scale
        );

        PixelSurface::new(rgb).map_err(|e| Error::PdfRender {
            page: page_num,
            reason: e.to_string(),
        })
    }
}

/// Rasterize every page of an in-memory PDF
pub fn render_pages_from_bytes(pdf_bytes: &[u8], scale: f32) -> Result<Vec<PixelSurface>> {
    let doc = PdfDocument::from_bytes(pdf_bytes.to_vec())?;
    PageRenderer::with_scale(&doc, scale).render_all_pages()
}

/// Premultiplied channel composited over white
const fn over_white(premultiplied: u8, alpha: u8) -> u8 {
    premultiplied.saturating_add(u8::MAX - alpha)
}

/// Convert mupdf samples (gray or RGB, optionally with premultiplied alpha)
/// into an opaque RGB buffer
fn pixels_to_rgb(
    samples: &[u8],
    components: usize,
    width: u32,
    height: u32,
) -> std::result::Result<RgbImage, String> {
    if width == 0 || height == 0 {
        return Err(format!("page rendered to an empty {width}x{height} surface"));
    }
    if components == 0 {
        return Err("pixmap has no color components".to_string());
    }

    let mut rgb = Vec::with_capacity(samples.len() / components * 3);

    for chunk in samples.chunks_exact(components) {
        match components {
            1 => rgb.extend_from_slice(&[chunk[0], chunk[0], chunk[0]]),
            2 => {
                let gray = over_white(chunk[0], chunk[1]);
                rgb.extend_from_slice(&[gray, gray, gray]);
            }
            3 => rgb.extend_from_slice(chunk),
            4 => rgb.extend_from_slice(&[
                over_white(chunk[0], chunk[3]),
                over_white(chunk[1], chunk[3]),
                over_white(chunk[2], chunk[3]),
            ]),
            n => return Err(format!("Unexpected pixel format with {n} components")),
        }
    }

    RgbImage::from_raw(width, height, rgb)
        .ok_or_else(|| "Failed to create image buffer".to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_expands_to_rgb() {
        let img = pixels_to_rgb(&[10, 20], 1, 2, 1).unwrap();
        assert_eq!(img.as_raw(), &[10, 10, 10, 20, 20, 20]);
    }

    #[test]
    fn test_rgb_passthrough() {
        let img = pixels_to_rgb(&[1, 2, 3], 3, 1, 1).unwrap();
        assert_eq!(img.as_raw(), &[1, 2, 3]);
    }

    #[test]
    fn test_premultiplied_alpha_flattened_on_white() {
        // Half-covered red edge pixel
        let img = pixels_to_rgb(&[128, 0, 0, 128], 4, 1, 1).unwrap();
        assert_eq!(img.as_raw(), &[255, 127, 127]);

        let img = pixels_to_rgb(&[0, 0, 0, 0], 4, 1, 1).unwrap();
        assert_eq!(img.as_raw(), &[255, 255, 255]);

        let img = pixels_to_rgb(&[40, 255], 2, 1, 1).unwrap();
        assert_eq!(img.as_raw(), &[40, 40, 40]);
    }

    #[test]
    fn test_empty_pixmap_rejected() {
        assert!(pixels_to_rgb(&[], 3, 0, 0).is_err());
    }

    #[test]
    fn test_short_buffer_rejected() {
        assert!(pixels_to_rgb(&[1, 2, 3], 3, 2, 2).is_err());
    }

    #[test]
    fn test_invalid_scale_rejected() {
        let doc = PdfDocument::from_bytes(crate::pdf::create_test_pdf(&["A"], 100, 100)).unwrap();
        let renderer = PageRenderer::with_scale(&doc, 0.0);
        assert!(matches!(renderer.render_page(0), Err(Error::PdfRender { .. })));
        assert!(renderer.render_all_pages().is_err());
    }
}
