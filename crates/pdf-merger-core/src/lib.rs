//! PDF Merger Core Library
//!
//! This library merges PDFs and raster images into one PDF and fits PDFs
//! under a byte budget:
//! - Input classification by media type
//! - Image decoding, downsampling and JPEG encoding
//! - PDF page copying and page rasterization
//! - Quality search for size-constrained compression

pub mod config;
pub mod error;
pub mod input;
pub mod pdf;
pub mod raster;
pub mod shared;
pub mod util;

pub use config::{AppConfig, CompressionConfig, RasterConfig};
pub use error::{Error, Result};
pub use input::{ImageKind, InputFile, InputKind};
pub use pdf::{
    AssembleOptions, AssembledDocument, CompressOptions, CompressedPdf, DocumentAssembler,
    PageRenderer, PdfDocument, assemble, compress, compress_with,
};
pub use raster::{ImageJpegEncoder, JpegEncode, PixelSurface, Quality, rasterize};
pub use shared::{SharedHandle, shared_merger};
pub use util::output_file_name;

use tracing::info;

/// Callback receiving `(done, total)` after each merged input
pub type ProgressCallback = Box<dyn Fn(usize, usize) + Send>;

/// High-level merger combining all components
///
/// Every operation runs on tokio's blocking pool and processes its inputs,
/// pages and quality trials strictly one after another.
#[derive(Debug, Clone)]
pub struct PdfMerger {
    config: AppConfig,
}

/// A merged, uncompressed document
#[derive(Debug, Clone)]
pub struct MergedPdf {
    /// Serialized PDF
    pub bytes: Vec<u8>,
    pub page_count: usize,
}

impl PdfMerger {
    /// Create a merger with the given configuration
    pub fn new(config: AppConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub const fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Merge inputs into one PDF, in order
    pub async fn merge(
        &self,
        inputs: Vec<InputFile>,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<MergedPdf> {
        let options = self.config.assemble_options();

        run_blocking(move || {
            let assembled = DocumentAssembler::new(options).assemble_with_progress(
                &inputs,
                |done, total| {
                    if let Some(ref callback) = progress_callback {
                        callback(done, total);
                    }
                },
            )?;
            let page_count = assembled.page_count();

            Ok(MergedPdf {
                bytes: assembled.into_bytes()?,
                page_count,
            })
        })
        .await
    }

    /// Rasterize every page of a PDF and fit it under the configured budget
    pub async fn compress_pdf(&self, pdf_bytes: Vec<u8>) -> Result<CompressedPdf> {
        let scale = self.config.render_scale;
        let options = self.config.compress_options();

        run_blocking(move || {
            let surfaces = pdf::render_pages_from_bytes(&pdf_bytes, scale)?;
            drop(pdf_bytes);
            compress(&surfaces, &options)
        })
        .await
    }

    /// Merge, then compress the merged document
    pub async fn merge_and_compress(
        &self,
        inputs: Vec<InputFile>,
        progress_callback: Option<ProgressCallback>,
    ) -> Result<CompressedPdf> {
        let merged = self.merge(inputs, progress_callback).await?;
        info!(
            "Merged {} pages ({} bytes), compressing",
            merged.page_count,
            merged.bytes.len()
        );
        self.compress_pdf(merged.bytes).await
    }
}

/// Run CPU-bound work off the async executor
async fn run_blocking<T, F>(work: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| Error::Worker(e.to_string()))?
}
