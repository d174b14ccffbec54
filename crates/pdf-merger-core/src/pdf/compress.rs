//! Fitting a raster-only PDF under a byte budget.
//!
//! # Search
//!
//! Document size is assumed to grow with JPEG quality, so the quality range
//! `[cut_quality, 1.0]` is bisected:
//!
//! ```text
//! q = (low + high) / 2
//! size(q) <= budget  ->  keep as best, low = q   (try higher)
//! size(q) >  budget  ->  high = q                (try lower)
//! ```
//!
//! The loop ends after `max_iterations` trials, once `high - low` drops
//! below `convergence`, or as soon as an accepted document lands within
//! `early_stop_ratio` of the budget. Every trial builds and serializes a
//! complete document so the measured size is the real output size.

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::raster::{ImageJpegEncoder, JpegEncode, PixelSurface, Quality};
use super::assemble::{AssembledDocument, assemble_jpeg_pages};

/// Default byte budget
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 1_000_000;

/// Default quality floor
pub const DEFAULT_CUT_QUALITY: f32 = 0.04;

/// Default number of bisection trials
pub const DEFAULT_MAX_ITERATIONS: u32 = 10;

/// Accepted documents above this fraction of the budget end the search
pub const DEFAULT_EARLY_STOP_RATIO: f64 = 0.95;

/// Quality interval width at which the search stops
pub const DEFAULT_CONVERGENCE: f32 = 0.01;

/// Options for size-constrained compression
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CompressOptions {
    pub max_size_bytes: u64,
    pub cut_quality: f32,
    pub max_iterations: u32,
    pub early_stop_ratio: f64,
    pub convergence: f32,
}

impl Default for CompressOptions {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_SIZE_BYTES,
            cut_quality: DEFAULT_CUT_QUALITY,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            early_stop_ratio: DEFAULT_EARLY_STOP_RATIO,
            convergence: DEFAULT_CONVERGENCE,
        }
    }
}

impl CompressOptions {
    pub fn with_max_size(mut self, max_size_bytes: u64) -> Self {
        self.max_size_bytes = max_size_bytes;
        self
    }

    pub fn with_cut_quality(mut self, cut_quality: f32) -> Self {
        self.cut_quality = cut_quality;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(0.0..=1.0).contains(&self.cut_quality) {
            return Err(invalid("cut_quality", format!("{} is outside [0, 1]", self.cut_quality)));
        }
        if self.max_iterations == 0 {
            return Err(invalid("max_iterations", "must be at least 1".to_string()));
        }
        if !(0.0..=1.0).contains(&self.early_stop_ratio) {
            return Err(invalid(
                "early_stop_ratio",
                format!("{} is outside [0, 1]", self.early_stop_ratio),
            ));
        }
        if self.convergence.is_nan() || self.convergence < 0.0 {
            return Err(invalid("convergence", "must not be negative".to_string()));
        }
        Ok(())
    }
}

fn invalid(field: &str, reason: String) -> Error {
    Error::ConfigInvalid {
        field: field.to_string(),
        reason,
    }
}

/// A document that fits the budget
#[derive(Debug, Clone)]
pub struct CompressedPdf {
    /// Serialized PDF
    pub bytes: Vec<u8>,
    /// Quality that produced `bytes`
    pub quality: Quality,
    /// Number of trials run
    pub iterations: u32,
    pub page_count: usize,
}

impl CompressedPdf {
    pub fn byte_len(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Build one raster-only document with every surface encoded at `quality`
pub fn encode_pages(
    surfaces: &[PixelSurface],
    quality: Quality,
    encoder: &dyn JpegEncode,
) -> Result<AssembledDocument> {
    let pages = surfaces
        .iter()
        .map(|surface| encoder.encode(surface, quality))
        .collect::<Result<Vec<_>>>()?;
    assemble_jpeg_pages(pages)
}

/// Compress with the default JPEG encoder
pub fn compress(surfaces: &[PixelSurface], options: &CompressOptions) -> Result<CompressedPdf> {
    compress_with(surfaces, options, &ImageJpegEncoder)
}

/// Search for the highest quality whose document fits `max_size_bytes`.
///
/// Fails with `Error::CompressionSize` when no trial fit, which is expected
/// whenever the budget is below what `cut_quality` achieves.
#[allow(clippy::cast_precision_loss)]
pub fn compress_with(
    surfaces: &[PixelSurface],
    options: &CompressOptions,
    encoder: &dyn JpegEncode,
) -> Result<CompressedPdf> {
    if surfaces.is_empty() {
        return Err(Error::EmptyInput);
    }
    options.validate()?;

    let budget = options.max_size_bytes;
    let near_budget = budget as f64 * options.early_stop_ratio;

    info!(
        "Compressing {} pages to at most {} bytes (quality floor {})",
        surfaces.len(),
        budget,
        options.cut_quality
    );

    let mut low = options.cut_quality;
    let mut high = 1.0_f32;
    let mut best: Option<(Quality, Vec<u8>)> = None;
    let mut iterations = 0;

    while iterations < options.max_iterations {
        iterations += 1;
        let quality = Quality::new((low + high) / 2.0);

        let bytes = encode_pages(surfaces, quality, encoder)?.into_bytes()?;
        let size = bytes.len() as u64;

        if size <= budget {
            debug!("Trial {}: quality {} -> {} bytes (fits)", iterations, quality, size);
            let close_enough = size as f64 > near_budget;
            best = Some((quality, bytes));
            low = quality.value();
            if close_enough {
                debug!("Within {:.0}% of budget, stopping", options.early_stop_ratio * 100.0);
                break;
            }
        } else {
            debug!("Trial {}: quality {} -> {} bytes (too large)", iterations, quality, size);
            high = quality.value();
        }

        if high - low < options.convergence {
            break;
        }
    }

    match best {
        Some((quality, bytes)) => {
            info!(
                "Compressed to {} bytes at quality {} after {} trials",
                bytes.len(),
                quality,
                iterations
            );
            Ok(CompressedPdf {
                bytes,
                quality,
                iterations,
                page_count: surfaces.len(),
            })
        }
        None => Err(Error::CompressionSize {
            max_size_bytes: budget,
            cut_quality: options.cut_quality,
        }),
    }
}
