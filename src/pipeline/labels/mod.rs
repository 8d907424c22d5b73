pub mod openfda;
pub mod types;

pub use openfda::*;
pub use types::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LookupError {
    #[error("No label found for '{0}'")]
    NotFound(String),

    #[error("Request timed out after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Label API returned an error (HTTP {status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Malformed label API response: {0}")]
    Parse(String),
}

impl LookupError {
    /// Short stable label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Timeout(_) | Self::Network(_) => "network",
            Self::ApiError { .. } => "api",
            Self::Parse(_) => "parse",
        }
    }
}
