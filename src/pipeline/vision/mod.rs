pub mod gemini;
pub mod types;

pub use gemini::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum VisionError {
    #[error("No vision API key configured; set DAWASCAN_GEMINI_API_KEY")]
    MissingApiKey,

    #[error("Vision API rejected the credentials (HTTP {status}): {message}")]
    Auth { status: u16, message: String },

    #[error("Vision API quota exceeded: {0}")]
    Quota(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Vision API returned an error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Malformed vision API response: {0}")]
    ResponseParsing(String),

    #[error("Image too large ({0} bytes), maximum is 20 MB")]
    ImageTooLarge(usize),
}

impl VisionError {
    /// Short stable label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::MissingApiKey => "missing_credentials",
            Self::Auth { .. } => "auth",
            Self::Quota(_) => "quota",
            Self::Timeout(_) | Self::Network(_) => "network",
            Self::ApiError { .. } => "api",
            Self::ResponseParsing(_) => "parse",
            Self::ImageTooLarge(_) => "image_too_large",
        }
    }
}
