mod jpeg;
mod rasterize;
mod surface;

pub use jpeg::{
    DEFAULT_IMAGE_CAP_BYTES, EncodedPage, ImageJpegEncoder, JpegEncode, Quality, encode_capped,
};
pub use rasterize::{DEFAULT_MAX_PIXELS, rasterize, target_dimensions};
pub use surface::PixelSurface;
