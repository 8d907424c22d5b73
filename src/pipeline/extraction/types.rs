use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::ExtractionError;
use crate::pipeline::vision::VisionError;

/// Image container formats accepted by the loader (detected from magic bytes).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ImageFormat {
    Jpeg,
    Png,
    Tiff,
    Bmp,
    WebP,
}

impl ImageFormat {
    pub fn mime_type(&self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
            Self::Tiff => "image/tiff",
            Self::Bmp => "image/bmp",
            Self::WebP => "image/webp",
        }
    }
}

/// A medicine photo loaded for one scan. Read-only after load.
#[derive(Clone)]
pub struct LoadedImage {
    pub path: PathBuf,
    pub format: ImageFormat,
    /// Original file bytes, sent as-is to the vision model.
    pub original_bytes: Vec<u8>,
    /// Orientation-corrected bitmap encoded as PNG, fed to local OCR.
    pub ocr_png: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// EXIF orientation tag value that was applied (1 = none).
    pub orientation: u32,
}

impl fmt::Debug for LoadedImage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoadedImage")
            .field("path", &self.path)
            .field("format", &self.format)
            .field("original_bytes", &self.original_bytes.len())
            .field("ocr_png", &self.ocr_png.len())
            .field("width", &self.width)
            .field("height", &self.height)
            .field("orientation", &self.orientation)
            .finish()
    }
}

/// Raw OCR result from the engine
#[derive(Debug, Clone, Default)]
pub struct OcrPageResult {
    pub text: String,
    /// Mean confidence 0.0-1.0, when the engine reports one.
    pub confidence: Option<f32>,
}

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError>;
}

impl<T: OcrEngine + ?Sized> OcrEngine for Arc<T> {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        (**self).ocr_image(image_bytes)
    }
}

/// A recognized medicine name: non-empty, lowercase, trimmed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CandidateName(String);

impl CandidateName {
    /// Normalize and wrap. `None` when nothing remains after trimming.
    pub fn new(raw: &str) -> Option<Self> {
        let normalized = raw.trim().to_lowercase();
        if normalized.is_empty() {
            None
        } else {
            Some(Self(normalized))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CandidateName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Which recognition path produced a name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NameSource {
    VisionModel,
    LocalOcr,
}

impl NameSource {
    pub fn label(&self) -> &'static str {
        match self {
            Self::VisionModel => "vision model",
            Self::LocalOcr => "local OCR",
        }
    }
}

/// Outcome of asking the vision model to name the medicine.
#[derive(Debug, Clone)]
pub struct VisionNameResult {
    /// `None` when the model answered but could not name the medicine.
    pub name: Option<CandidateName>,
    pub raw_reply: String,
}

/// Vision recognizer abstraction (allows mocking for tests)
pub trait VisionNameEngine {
    fn recognize_name(&self, image: &LoadedImage) -> Result<VisionNameResult, VisionError>;
}

impl<T: VisionNameEngine + ?Sized> VisionNameEngine for Arc<T> {
    fn recognize_name(&self, image: &LoadedImage) -> Result<VisionNameResult, VisionError> {
        (**self).recognize_name(image)
    }
}
