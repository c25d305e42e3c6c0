//! Image encoding: `DynamicImage` → PNG bytes, PNG bytes → base64.
//!
//! PNG is lossless, so text edges on rendered pages stay crisp and the same
//! raster always produces the same bytes.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::DynamicImage;
use std::io::Cursor;
use tracing::debug;

/// Encode a rasterised page as PNG.
pub fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} raster → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Standard padded base64, as embedded in the inline response.
pub fn to_base64(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}
