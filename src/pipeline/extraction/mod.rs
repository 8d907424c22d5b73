pub mod types;
pub mod image_loader;
pub mod ocr;
pub mod name_extract;
pub mod medical_correction;
pub mod vision_ocr;

pub use types::*;
pub use image_loader::*;
pub use ocr::*;
pub use name_extract::*;
pub use medical_correction::*;
pub use vision_ocr::*;

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtractionError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Image too large ({0} bytes), maximum is 20 MB")]
    ImageTooLarge(u64),

    #[error("File too small to be an image ({0} bytes)")]
    ImageTooSmall(u64),

    #[error("Unsupported format for extraction")]
    UnsupportedFormat,

    #[error("Image processing error: {0}")]
    ImageProcessing(String),

    #[error("Tesseract OCR initialization failed: {0}")]
    OcrInit(String),

    #[error("OCR processing failed: {0}")]
    OcrProcessing(String),

    #[error("Tessdata not found at: {0}")]
    TessdataNotFound(PathBuf),
}

impl ExtractionError {
    /// Short stable label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Io(_) => "io",
            Self::FileNotFound(_) => "file_not_found",
            Self::ImageTooLarge(_) | Self::ImageTooSmall(_) => "image_size",
            Self::UnsupportedFormat => "unsupported_format",
            Self::ImageProcessing(_) => "image_processing",
            Self::OcrInit(_) | Self::TessdataNotFound(_) => "ocr_init",
            Self::OcrProcessing(_) => "ocr_processing",
        }
    }
}
