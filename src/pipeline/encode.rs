//! Image encoding: marker and page rasters → PNG.
//!
//! PNG is lossless, so module edges stay sharp; JPEG ringing around the
//! black/white transitions makes small markers harder to detect after printing.

use crate::error::FormScanError;
use image::GrayImage;
use std::io::Cursor;
use std::path::Path;
use tracing::debug;

/// Encode a greyscale raster as PNG bytes.
pub fn encode_png(img: &GrayImage) -> Result<Vec<u8>, image::ImageError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)?;
    debug!(
        "Encoded {}x{} image → {} bytes PNG",
        img.width(),
        img.height(),
        buf.len()
    );
    Ok(buf)
}

/// Write a greyscale raster to `path` as PNG, creating parent directories.
pub fn save_png(img: &GrayImage, path: &Path) -> Result<(), FormScanError> {
    let write_err = |detail: String| FormScanError::ImageWriteFailed {
        path: path.to_path_buf(),
        detail,
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| write_err(e.to_string()))?;
    }
    let bytes = encode_png(img).map_err(|e| write_err(e.to_string()))?;
    std::fs::write(path, bytes).map_err(|e| write_err(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn encode_small_image() {
        let img = GrayImage::from_pixel(10, 10, Luma([0u8]));
        let data = encode_png(&img).expect("encode should succeed");
        assert_eq!(&data[..4], b"\x89PNG");
    }

    #[test]
    fn save_creates_parent_dirs() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("markers/nested/m.png");
        save_png(&GrayImage::from_pixel(4, 4, Luma([255u8])), &path).expect("save");
        let back = image::open(&path).expect("readable png").to_luma8();
        assert_eq!(back.dimensions(), (4, 4));
    }
}
