//! Caller-supplied input files and their classification.
//!
//! Classification is metadata-only: the declared media type decides whether a
//! blob is treated as a PDF, a raster image or rejected. Magic bytes and file
//! extensions are never sniffed here.

use std::fmt;
use std::path::Path;

use bytes::Bytes;

use crate::error::{Error, Result};

/// Media type of PDF inputs
pub const PDF_MEDIA_TYPE: &str = "application/pdf";

/// Raster image subtypes accepted by the assembler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    Jpeg,
    Png,
    Webp,
    Gif,
}

impl ImageKind {
    /// Exact, case-sensitive lookup of a media type
    pub fn from_media_type(media_type: &str) -> Option<Self> {
        match media_type {
            "image/jpeg" => Some(Self::Jpeg),
            "image/png" => Some(Self::Png),
            "image/webp" => Some(Self::Webp),
            "image/gif" => Some(Self::Gif),
            _ => None,
        }
    }

    pub const fn media_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Webp => "image/webp",
            Self::Gif => "image/gif",
        }
    }

    /// Decoder format hint for the `image` crate
    pub const fn image_format(self) -> image::ImageFormat {
        match self {
            Self::Jpeg => image::ImageFormat::Jpeg,
            Self::Png => image::ImageFormat::Png,
            Self::Webp => image::ImageFormat::WebP,
            Self::Gif => image::ImageFormat::Gif,
        }
    }
}

/// Result of classifying an input by its media type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputKind {
    Pdf,
    Image(ImageKind),
    Unsupported(String),
}

impl InputKind {
    pub fn classify(media_type: &str) -> Self {
        if media_type == PDF_MEDIA_TYPE {
            return Self::Pdf;
        }
        ImageKind::from_media_type(media_type)
            .map_or_else(|| Self::Unsupported(media_type.to_string()), Self::Image)
    }
}

/// A byte blob with a declared media type
#[derive(Clone)]
pub struct InputFile {
    bytes: Bytes,
    media_type: String,
}

impl InputFile {
    pub fn new(bytes: impl Into<Bytes>, media_type: impl Into<String>) -> Self {
        Self {
            bytes: bytes.into(),
            media_type: media_type.into(),
        }
    }

    pub fn pdf(bytes: impl Into<Bytes>) -> Self {
        Self::new(bytes, PDF_MEDIA_TYPE)
    }

    pub fn image(bytes: impl Into<Bytes>, kind: ImageKind) -> Self {
        Self::new(bytes, kind.media_type())
    }

    /// Read a file from disk, guessing its media type from the extension.
    ///
    /// Unknown extensions become `application/octet-stream`, which the
    /// assembler rejects.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)?;
        let media_type = mime_guess::from_path(path)
            .first_or_octet_stream()
            .essence_str()
            .to_string();
        Ok(Self::new(bytes, media_type))
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn media_type(&self) -> &str {
        &self.media_type
    }

    pub fn kind(&self) -> InputKind {
        InputKind::classify(&self.media_type)
    }

    /// Fail with `UnsupportedFileType` unless the media type is accepted.
    pub fn ensure_supported(&self) -> Result<()> {
        match self.kind() {
            InputKind::Unsupported(media_type) => Err(Error::UnsupportedFileType(media_type)),
            InputKind::Pdf | InputKind::Image(_) => Ok(()),
        }
    }
}

impl fmt::Debug for InputFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputFile")
            .field("media_type", &self.media_type)
            .field("bytes_len", &self.bytes.len())
            .finish()
    }
}
