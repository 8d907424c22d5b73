use std::fmt;
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Application-level constants
pub const APP_NAME: &str = "Dawascan";
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-pro";
pub const DEFAULT_GEMINI_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_OPENFDA_URL: &str = "https://api.fda.gov";
pub const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 60;
pub const DEFAULT_TESSERACT_CMD: &str = "tesseract";
pub const DEFAULT_OCR_LANG: &str = "eng";

/// Log filter used when `RUST_LOG` is not set.
pub fn default_log_filter() -> &'static str {
    "dawascan_lib=info,dawascan=info"
}

/// Get the application data directory (~/Dawascan/).
/// `None` when the home directory cannot be determined.
pub fn app_data_dir() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(APP_NAME))
}

/// Default tessdata directory for the bundled Tesseract engine.
pub fn default_tessdata_dir() -> Option<PathBuf> {
    app_data_dir().map(|dir| dir.join("tessdata"))
}

/// Read `.env` from the working directory (or a parent) into the process
/// environment. Variables already set are not overridden. Must run before
/// tracing is initialized so `RUST_LOG` from the file takes effect.
pub fn load_dotenv() -> Option<PathBuf> {
    dotenv::dotenv().ok()
}

/// Read a specific env file. `false` when it is missing or malformed.
pub fn load_dotenv_from(path: &Path) -> bool {
    dotenv::from_path(path).is_ok()
}

#[derive(Error, Debug, PartialEq)]
pub enum ConfigError {
    #[error("{var} must be a positive integer, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
}

/// Process configuration, built once at startup and handed to the pipeline.
///
/// Credentials live here and nowhere else. `Debug` never prints the key.
#[derive(Clone)]
pub struct AppConfig {
    pub gemini_api_key: Option<String>,
    pub gemini_model: String,
    pub gemini_base_url: String,
    pub openfda_base_url: String,
    pub http_timeout_secs: u64,
    pub tessdata_dir: Option<PathBuf>,
    pub tesseract_cmd: String,
    pub ocr_lang: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gemini_api_key: None,
            gemini_model: DEFAULT_GEMINI_MODEL.to_string(),
            gemini_base_url: DEFAULT_GEMINI_URL.to_string(),
            openfda_base_url: DEFAULT_OPENFDA_URL.to_string(),
            http_timeout_secs: DEFAULT_HTTP_TIMEOUT_SECS,
            tessdata_dir: default_tessdata_dir(),
            tesseract_cmd: DEFAULT_TESSERACT_CMD.to_string(),
            ocr_lang: DEFAULT_OCR_LANG.to_string(),
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field(
                "gemini_api_key",
                &self.gemini_api_key.as_ref().map(|_| "<redacted>"),
            )
            .field("gemini_model", &self.gemini_model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("openfda_base_url", &self.openfda_base_url)
            .field("http_timeout_secs", &self.http_timeout_secs)
            .field("tessdata_dir", &self.tessdata_dir)
            .field("tesseract_cmd", &self.tesseract_cmd)
            .field("ocr_lang", &self.ocr_lang)
            .finish()
    }
}

impl AppConfig {
    /// Load from the process environment. Call [`load_dotenv`] first so
    /// `.env` values are visible here.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let defaults = Self::default();

        let http_timeout_secs = match get("DAWASCAN_HTTP_TIMEOUT_SECS") {
            Some(raw) => match raw.parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidNumber {
                        var: "DAWASCAN_HTTP_TIMEOUT_SECS",
                        value: raw,
                    })
                }
            },
            None => defaults.http_timeout_secs,
        };

        Ok(Self {
            gemini_api_key: get("DAWASCAN_GEMINI_API_KEY").or_else(|| get("GEMINI_API_KEY")),
            gemini_model: get("DAWASCAN_GEMINI_MODEL").unwrap_or(defaults.gemini_model),
            gemini_base_url: get("DAWASCAN_GEMINI_URL").unwrap_or(defaults.gemini_base_url),
            openfda_base_url: get("DAWASCAN_OPENFDA_URL").unwrap_or(defaults.openfda_base_url),
            http_timeout_secs,
            tessdata_dir: get("DAWASCAN_TESSDATA_DIR")
                .map(PathBuf::from)
                .or(defaults.tessdata_dir),
            tesseract_cmd: get("DAWASCAN_TESSERACT_CMD").unwrap_or(defaults.tesseract_cmd),
            ocr_lang: get("DAWASCAN_OCR_LANG").unwrap_or(defaults.ocr_lang),
        })
    }
}
