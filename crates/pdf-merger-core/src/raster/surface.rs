use image::{DynamicImage, RgbaImage, RgbImage};

use crate::error::{Error, Result};

/// A decoded, fully opaque bitmap ready for JPEG encoding.
///
/// The alpha channel is gone by construction: surfaces are stored as RGB and
/// anything translucent is composited over white before it gets here.
#[derive(Debug, Clone)]
pub struct PixelSurface {
    image: RgbImage,
}

impl PixelSurface {
    /// Wrap an RGB image, rejecting empty dimensions.
    pub fn new(image: RgbImage) -> Result<Self> {
        if image.width() == 0 || image.height() == 0 {
            return Err(Error::SurfaceUnavailable(format!(
                "surface must not be empty ({}x{})",
                image.width(),
                image.height()
            )));
        }
        Ok(Self { image })
    }

    /// Composite an RGBA image over an opaque white background.
    pub fn from_rgba(source: &RgbaImage) -> Result<Self> {
        let mut canvas = white_canvas(source.width(), source.height())?;
        image::imageops::overlay(&mut canvas, source, 0, 0);
        Self::new(DynamicImage::ImageRgba8(canvas).into_rgb8())
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }

    pub fn pixel_count(&self) -> u64 {
        u64::from(self.width()) * u64::from(self.height())
    }

    pub const fn as_image(&self) -> &RgbImage {
        &self.image
    }
}

/// Allocate an opaque white RGBA canvas.
///
/// Fails instead of panicking when the buffer size overflows.
pub(crate) fn white_canvas(width: u32, height: u32) -> Result<RgbaImage> {
    let len = usize::try_from(width)
        .ok()
        .zip(usize::try_from(height).ok())
        .and_then(|(w, h)| w.checked_mul(h))
        .and_then(|px| px.checked_mul(4))
        .filter(|&len| len > 0)
        .ok_or_else(|| {
            Error::SurfaceUnavailable(format!("cannot allocate a {width}x{height} surface"))
        })?;

    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(len)
        .map_err(|e| Error::SurfaceUnavailable(format!("{width}x{height}: {e}")))?;
    buffer.resize(len, u8::MAX);

    RgbaImage::from_raw(width, height, buffer).ok_or_else(|| {
        Error::SurfaceUnavailable(format!("buffer does not fit {width}x{height}"))
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use image::{Rgb, Rgba};

    #[test]
    fn test_empty_surface_rejected() {
        let result = PixelSurface::new(RgbImage::new(0, 10));
        assert!(matches!(result, Err(Error::SurfaceUnavailable(_))));
    }

    #[test]
    fn test_transparent_pixels_become_white() {
        let source = RgbaImage::from_pixel(4, 3, Rgba([0, 0, 0, 0]));
        let surface = PixelSurface::from_rgba(&source).unwrap();

        assert_eq!(surface.dimensions(), (4, 3));
        assert!(surface.as_image().pixels().all(|p| *p == Rgb([255, 255, 255])));
    }

    #[test]
    fn test_opaque_pixels_kept() {
        let source = RgbaImage::from_pixel(2, 2, Rgba([10, 20, 30, 255]));
        let surface = PixelSurface::from_rgba(&source).unwrap();
        assert_eq!(*surface.as_image().get_pixel(1, 1), Rgb([10, 20, 30]));
    }

    #[test]
    fn test_half_transparent_blends_toward_white() {
        let source = RgbaImage::from_pixel(1, 1, Rgba([0, 0, 0, 128]));
        let surface = PixelSurface::from_rgba(&source).unwrap();
        let Rgb([r, g, b]) = *surface.as_image().get_pixel(0, 0);
        assert!(r > 100 && r < 160, "expected mid gray, got {r}");
        assert_eq!(r, g);
        assert_eq!(g, b);
    }

    #[test]
    fn test_white_canvas_rejects_zero() {
        assert!(white_canvas(0, 0).is_err());
    }
}
