//! Image loading for medicine strip photos.
//!
//! Format is detected from magic bytes (extensions can be wrong), then the
//! bitmap is decoded, EXIF-rotated and re-encoded as PNG for local OCR.
//! Phone photos embed rotation in EXIF tag 0x0112; without correction a
//! portrait shot of a strip reaches Tesseract sideways.

use std::io::Cursor;
use std::path::Path;

use image::{DynamicImage, GenericImageView, ImageOutputFormat};
use tracing::debug;

use super::types::{ImageFormat, LoadedImage};
use super::ExtractionError;

/// Maximum input file size. The vision client applies the same cap to the
/// decoded inline image.
const MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;

/// Minimum valid image size in bytes (smallest valid PNG is ~67 bytes).
const MIN_IMAGE_BYTES: u64 = 67;

/// Load and prepare the image at `path`.
///
/// Fails with `FileNotFound` before reading anything when the path does not
/// resolve to a regular file.
pub fn load_image(path: &Path) -> Result<LoadedImage, ExtractionError> {
    if !path.is_file() {
        return Err(ExtractionError::FileNotFound(path.to_path_buf()));
    }

    let file_size = std::fs::metadata(path)?.len();
    if file_size > MAX_IMAGE_BYTES {
        return Err(ExtractionError::ImageTooLarge(file_size));
    }
    if file_size < MIN_IMAGE_BYTES {
        return Err(ExtractionError::ImageTooSmall(file_size));
    }

    let original_bytes = std::fs::read(path)?;
    let format = detect_image_format(&original_bytes).ok_or(ExtractionError::UnsupportedFormat)?;

    let decoded = image::load_from_memory_with_format(&original_bytes, decoder_format(format))
        .map_err(|e| ExtractionError::ImageProcessing(e.to_string()))?;

    let orientation = read_exif_orientation(&original_bytes);
    let oriented = apply_orientation(decoded, orientation);
    let (width, height) = oriented.dimensions();

    let ocr_png = encode_png(&oriented)?;

    debug!(
        path = %path.display(),
        format = format.mime_type(),
        size = format!("{width}x{height}"),
        orientation,
        "Image loaded"
    );

    Ok(LoadedImage {
        path: path.to_path_buf(),
        format,
        original_bytes,
        ocr_png,
        width,
        height,
        orientation,
    })
}

/// Detect image format from magic bytes (NOT file extensions).
pub fn detect_image_format(bytes: &[u8]) -> Option<ImageFormat> {
    match bytes {
        [0xFF, 0xD8, 0xFF, ..] => Some(ImageFormat::Jpeg),
        [0x89, 0x50, 0x4E, 0x47, ..] => Some(ImageFormat::Png),
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Some(ImageFormat::Tiff),
        [b'B', b'M', ..] => Some(ImageFormat::Bmp),
        _ if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" => {
            Some(ImageFormat::WebP)
        }
        _ => None,
    }
}

fn decoder_format(format: ImageFormat) -> image::ImageFormat {
    match format {
        ImageFormat::Jpeg => image::ImageFormat::Jpeg,
        ImageFormat::Png => image::ImageFormat::Png,
        ImageFormat::Tiff => image::ImageFormat::Tiff,
        ImageFormat::Bmp => image::ImageFormat::Bmp,
        ImageFormat::WebP => image::ImageFormat::WebP,
    }
}

fn encode_png(image: &DynamicImage) -> Result<Vec<u8>, ExtractionError> {
    let mut buf = Vec::new();
    image
        .write_to(&mut buf, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;
    Ok(buf)
}

/// Read EXIF orientation tag from raw image bytes.
/// Returns 1 (normal) if no EXIF data or tag not present.
pub fn read_exif_orientation(bytes: &[u8]) -> u32 {
    let mut cursor = Cursor::new(bytes);
    let reader = match exif::Reader::new().read_from_container(&mut cursor) {
        Ok(r) => r,
        Err(_) => return 1,
    };

    reader
        .get_field(exif::Tag::Orientation, exif::In::PRIMARY)
        .and_then(|f| f.value.get_uint(0))
        .unwrap_or(1)
}

/// Apply EXIF orientation transform to a `DynamicImage`.
///
/// 1 = Normal, 2 = Mirrored, 3 = 180deg, 4 = Flipped V,
/// 5 = Mirrored + 90deg CW, 6 = 90deg CW, 7 = Mirrored + 270deg CW, 8 = 270deg CW
pub fn apply_orientation(img: DynamicImage, orientation: u32) -> DynamicImage {
    match orientation {
        2 => img.fliph(),
        3 => img.rotate180(),
        4 => img.flipv(),
        5 => img.rotate90().fliph(),
        6 => img.rotate90(),
        7 => img.rotate270().fliph(),
        8 => img.rotate270(),
        _ => img,
    }
}
