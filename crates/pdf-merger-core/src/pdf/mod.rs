mod assemble;
mod compress;
mod document;
mod page_index;
mod render;

pub use assemble::{
    AssembleOptions, AssembledDocument, DocumentAssembler, assemble, assemble_jpeg_pages,
};
pub use compress::{
    CompressOptions, CompressedPdf, DEFAULT_CONVERGENCE, DEFAULT_CUT_QUALITY,
    DEFAULT_EARLY_STOP_RATIO, DEFAULT_MAX_ITERATIONS, DEFAULT_MAX_SIZE_BYTES, compress,
    compress_with, encode_pages,
};
pub use document::PdfDocument;
pub use page_index::PageIndex;
pub use render::{DEFAULT_RENDER_SCALE, PageRenderer, render_pages_from_bytes};

#[cfg(test)]
pub(crate) use assemble::tests::{create_test_pdf, create_test_png};
