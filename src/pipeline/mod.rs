pub mod extraction;
pub mod labels;
pub mod orchestrator;
pub mod reconcile;
pub mod vision;

pub use orchestrator::*;
pub use reconcile::*;

use std::path::PathBuf;

use thiserror::Error;

use extraction::ExtractionError;

/// Conditions that stop a scan before any recognition runs.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Could not load image: {0}")]
    ImageLoad(ExtractionError),

    #[error("HTTP client setup failed: {0}")]
    ClientInit(String),
}

impl From<ExtractionError> for PipelineError {
    fn from(err: ExtractionError) -> Self {
        match err {
            ExtractionError::FileNotFound(path) => Self::FileNotFound(path),
            other => Self::ImageLoad(other),
        }
    }
}

impl PipelineError {
    /// Short stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::FileNotFound(_) => "file_not_found",
            Self::ImageLoad(err) => err.kind(),
            Self::ClientInit(_) => "client_init",
        }
    }
}
