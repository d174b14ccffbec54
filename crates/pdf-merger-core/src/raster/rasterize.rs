//! Decoding raster images into opaque pixel surfaces.

use std::io::Cursor;

use image::ImageReader;
use image::imageops::FilterType;
use tracing::debug;

use crate::error::{Error, Result};
use crate::input::{InputFile, InputKind};
use super::surface::PixelSurface;

/// Default pixel budget (4096x4096)
pub const DEFAULT_MAX_PIXELS: u64 = 4096 * 4096;

/// Decode an image input into an opaque surface of at most `max_pixels`.
///
/// Oversized images are downsampled with their aspect ratio preserved and
/// everything is composited over white.
pub fn rasterize(file: &InputFile, max_pixels: u64) -> Result<PixelSurface> {
    let kind = match file.kind() {
        InputKind::Image(kind) => kind,
        InputKind::Pdf => {
            return Err(Error::ImageDecode(
                "application/pdf is not a raster image".to_string(),
            ));
        }
        InputKind::Unsupported(media_type) => return Err(Error::UnsupportedFileType(media_type)),
    };

    let mut reader = ImageReader::new(Cursor::new(file.bytes()))
        .with_guessed_format()
        .map_err(|e| Error::ImageDecode(e.to_string()))?;
    if reader.format().is_none() {
        reader.set_format(kind.image_format());
    }

    let decoded = reader
        .decode()
        .map_err(|e| Error::ImageDecode(format!("{}: {e}", file.media_type())))?
        .into_rgba8();

    let (width, height) = decoded.dimensions();
    let (target_width, target_height) = target_dimensions(width, height, max_pixels);

    if (target_width, target_height) == (width, height) {
        return PixelSurface::from_rgba(&decoded);
    }

    debug!(
        "Downsampling {}x{} image to {}x{} (budget {} px)",
        width, height, target_width, target_height, max_pixels
    );
    let scaled = image::imageops::resize(&decoded, target_width, target_height, FilterType::Lanczos3);
    drop(decoded);
    PixelSurface::from_rgba(&scaled)
}

/// Dimensions after fitting `width * height` into `max_pixels`.
///
/// Each axis is scaled by `sqrt(max_pixels / (width * height))` and floored
/// independently, never below one pixel.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss
)]
pub fn target_dimensions(width: u32, height: u32, max_pixels: u64) -> (u32, u32) {
    let pixels = u64::from(width) * u64::from(height);
    if pixels == 0 || pixels <= max_pixels {
        return (width, height);
    }

    let scale = (max_pixels as f64 / pixels as f64).sqrt();
    // scale < 1, so the products stay within u32
    let mut new_width = ((f64::from(width) * scale).floor() as u32).max(1);
    let mut new_height = ((f64::from(height) * scale).floor() as u32).max(1);

    // float error can leave the product a hair over budget
    while u64::from(new_width) * u64::from(new_height) > max_pixels
        && (new_width > 1 || new_height > 1)
    {
        if new_width >= new_height {
            new_width -= 1;
        } else {
            new_height -= 1;
        }
    }

    (new_width, new_height)
}
