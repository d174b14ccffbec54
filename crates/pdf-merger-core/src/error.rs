use thiserror::Error;

/// Unified error type for pdf-merger-core
///
/// This enum encompasses all error cases that can occur in the library:
/// - Input validation (empty input list, unsupported media types)
/// - Decoding and rendering (images, PDFs, pages)
/// - Encoding and serialization
/// - The size-constraint outcome of the compressor
/// - Configuration operations (loading, validation)
#[derive(Error, Debug)]
pub enum Error {
    // ==========================================================================
    // Input Errors
    // ==========================================================================
    /// The input list was empty
    #[error("At least one file is required")]
    EmptyInput,

    /// Media type is neither a PDF nor a supported raster image
    #[error("unsupported file type: {0}")]
    UnsupportedFileType(String),

    // ==========================================================================
    // Decode / Render Errors
    // ==========================================================================
    /// Failed to decode a raster image
    #[error("failed to decode image: {0}")]
    ImageDecode(String),

    /// An input declared as PDF could not be parsed
    #[error("invalid PDF input: {0}")]
    InvalidPdf(String),

    /// Failed to open a PDF for rendering
    #[error("failed to open PDF: {0}")]
    PdfOpen(String),

    /// Invalid page number requested
    #[error("invalid page number {page} (document has {total} pages)")]
    PdfInvalidPage { page: usize, total: usize },

    /// Failed to render a PDF page
    #[error("failed to render page {page}: {reason}")]
    PdfRender { page: usize, reason: String },

    /// A pixel surface could not be allocated
    #[error("pixel surface unavailable: {0}")]
    SurfaceUnavailable(String),

    // ==========================================================================
    // Encode / Save Errors
    // ==========================================================================
    /// The JPEG encoder produced no output
    #[error("failed to encode JPEG: {0}")]
    Encode(String),

    /// Failed to serialize a PDF
    #[error("failed to save PDF: {0}")]
    PdfSave(String),

    // ==========================================================================
    // Size Constraint
    // ==========================================================================
    /// No tried quality produced a document within the byte budget
    #[error(
        "could not compress PDF under the given size limit ({max_size_bytes} bytes, quality floor {cut_quality})"
    )]
    CompressionSize { max_size_bytes: u64, cut_quality: f32 },

    // ==========================================================================
    // Configuration Errors
    // ==========================================================================
    /// Failed to load configuration file
    #[error("failed to load config: {0}")]
    ConfigLoad(String),

    /// Invalid configuration value
    #[error("invalid config value for '{field}': {reason}")]
    ConfigInvalid { field: String, reason: String },

    // ==========================================================================
    // Runtime Errors
    // ==========================================================================
    /// A blocking worker task panicked or was cancelled
    #[error("worker task failed: {0}")]
    Worker(String),

    /// General I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Whether this is the size-constraint outcome rather than a fault.
    ///
    /// Callers should offer to relax the budget or the quality floor
    /// instead of retrying.
    pub const fn is_size_constraint(&self) -> bool {
        matches!(self, Self::CompressionSize { .. })
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_input_message() {
        assert_eq!(Error::EmptyInput.to_string(), "At least one file is required");
    }

    #[test]
    fn test_unsupported_type_names_mime() {
        let err = Error::UnsupportedFileType("text/plain".to_string());
        assert!(err.to_string().contains("text/plain"));
    }

    #[test]
    fn test_size_constraint_detection() {
        let err = Error::CompressionSize {
            max_size_bytes: 100,
            cut_quality: 0.04,
        };
        assert!(err.is_size_constraint());
        assert!(!Error::EmptyInput.is_size_constraint());
    }
}
