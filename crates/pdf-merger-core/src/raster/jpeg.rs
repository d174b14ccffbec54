//! JPEG encoding of pixel surfaces.

use std::fmt;

use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;
use tracing::debug;

use crate::error::{Error, Result};
use super::surface::PixelSurface;

/// Byte size above which the per-image ladder lowers quality
pub const DEFAULT_IMAGE_CAP_BYTES: u64 = 1_000_000;

/// Number of tenths on the per-image quality ladder (1.0 down to 0.1)
const LADDER_STEPS: u8 = 10;

/// JPEG quality factor in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Quality(f32);

impl Quality {
    pub const MAX: Self = Self(1.0);

    /// Clamp into `[0, 1]`. NaN maps to 0.
    pub fn new(value: f32) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    pub const fn value(self) -> f32 {
        self.0
    }

    /// Map onto the encoder's integer scale (1..=100).
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    pub fn to_encoder_scale(self) -> u8 {
        // 0.0..=100.0 after clamping, so the cast is exact
        ((self.0 * 100.0).round() as u8).clamp(1, 100)
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.3}", self.0)
    }
}

/// One surface encoded at one quality
#[derive(Debug, Clone)]
pub struct EncodedPage {
    /// JPEG bytes
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// Quality used to produce `bytes`
    pub quality: Quality,
}

impl EncodedPage {
    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Encodes pixel surfaces as JPEG.
///
/// Implementations must be deterministic for a given surface and quality;
/// the compressor relies on byte sizes being reproducible.
pub trait JpegEncode {
    fn encode(&self, surface: &PixelSurface, quality: Quality) -> Result<EncodedPage>;
}

/// JPEG encoder backed by the `image` crate
#[derive(Debug, Default, Clone, Copy)]
pub struct ImageJpegEncoder;

impl JpegEncode for ImageJpegEncoder {
    fn encode(&self, surface: &PixelSurface, quality: Quality) -> Result<EncodedPage> {
        let image = surface.as_image();
        let mut bytes = Vec::new();
        {
            let mut encoder = JpegEncoder::new_with_quality(&mut bytes, quality.to_encoder_scale());
            encoder
                .encode(
                    image.as_raw(),
                    image.width(),
                    image.height(),
                    ExtendedColorType::Rgb8,
                )
                .map_err(|e| Error::Encode(e.to_string()))?;
        }

        if bytes.is_empty() {
            return Err(Error::Encode("encoder produced no output".to_string()));
        }

        Ok(EncodedPage {
            bytes,
            width: image.width(),
            height: image.height(),
            quality,
        })
    }
}

/// Encode with a coarse quality ladder until the JPEG fits `cap_bytes`.
///
/// Starts at 1.0 and steps down by 0.1 while the output is larger than the
/// cap, stopping at 0.1. The last attempt is returned even when it is still
/// over the cap.
pub fn encode_capped(
    encoder: &dyn JpegEncode,
    surface: &PixelSurface,
    cap_bytes: u64,
) -> Result<EncodedPage> {
    let mut step = LADDER_STEPS;
    let mut page = encoder.encode(surface, ladder_quality(step))?;

    while page.byte_len() > cap_bytes && step > 1 {
        step -= 1;
        debug!(
            "Image is {} bytes (cap {}), retrying at quality {}",
            page.byte_len(),
            cap_bytes,
            ladder_quality(step)
        );
        page = encoder.encode(surface, ladder_quality(step))?;
    }

    Ok(page)
}

fn ladder_quality(step: u8) -> Quality {
    Quality::new(f32::from(step) / f32::from(LADDER_STEPS))
}
