use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicUsize, Ordering};

use super::types::{OcrEngine, OcrPageResult};
use super::ExtractionError;

/// Tesseract driven through its command-line executable.
///
/// Default engine: needs only the `tesseract` binary on PATH, no native
/// libraries at build time. Image bytes go in on stdin, text comes back on stdout.
pub struct TesseractCli {
    command: String,
    lang: String,
    tessdata_dir: Option<PathBuf>,
}

impl TesseractCli {
    pub fn new(command: &str, lang: &str) -> Self {
        Self {
            command: command.to_string(),
            lang: lang.to_string(),
            tessdata_dir: None,
        }
    }

    /// Use a specific tessdata directory instead of the system default.
    /// Ignored when the directory has no `eng.traineddata`.
    pub fn with_tessdata_dir(mut self, dir: &std::path::Path) -> Self {
        if dir.join("eng.traineddata").exists() {
            self.tessdata_dir = Some(dir.to_path_buf());
        } else {
            tracing::debug!(
                path = %dir.display(),
                "No traineddata in configured tessdata dir, using system default"
            );
        }
        self
    }

    fn build_command(&self) -> Command {
        let mut cmd = Command::new(&self.command);
        cmd.arg("stdin").arg("stdout").arg("-l").arg(&self.lang);
        if let Some(ref dir) = self.tessdata_dir {
            cmd.arg("--tessdata-dir").arg(dir);
        }
        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        cmd
    }
}

impl OcrEngine for TesseractCli {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let mut child = self.build_command().spawn().map_err(|e| {
            ExtractionError::OcrInit(format!("cannot run '{}': {e}", self.command))
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(image_bytes) {
                // Reap the child so a failed write does not leave a zombie.
                let _ = child.kill();
                let _ = child.wait();
                return Err(ExtractionError::OcrProcessing(format!(
                    "stdin write failed: {e}"
                )));
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::OcrProcessing(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        Ok(OcrPageResult {
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
            confidence: None,
        })
    }
}

/// Bundled Tesseract OCR engine.
/// Only available when compiled with the `ocr` feature flag.
#[cfg(feature = "ocr")]
pub struct BundledTesseract {
    tessdata_dir: std::path::PathBuf,
    lang: String,
}

#[cfg(feature = "ocr")]
impl BundledTesseract {
    /// Initialize with a tessdata directory containing at least `eng.traineddata`.
    pub fn new(tessdata_dir: &std::path::Path, lang: &str) -> Result<Self, ExtractionError> {
        if !tessdata_dir.join("eng.traineddata").exists() {
            return Err(ExtractionError::TessdataNotFound(tessdata_dir.to_path_buf()));
        }

        Ok(Self {
            tessdata_dir: tessdata_dir.to_path_buf(),
            lang: lang.to_string(),
        })
    }
}

#[cfg(feature = "ocr")]
impl OcrEngine for BundledTesseract {
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        let tessdata_str = self
            .tessdata_dir
            .to_str()
            .ok_or_else(|| ExtractionError::OcrInit("Invalid tessdata path".into()))?;

        let tess = tesseract::Tesseract::new(Some(tessdata_str), Some(&self.lang))
            .map_err(|e| ExtractionError::OcrInit(format!("{e:?}")))?;

        let mut tess = tess
            .set_image_from_mem(image_bytes)
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let text = tess
            .get_text()
            .map_err(|e| ExtractionError::OcrProcessing(format!("{e:?}")))?;

        let confidence = tess.mean_text_conf().max(0) as f32 / 100.0;

        Ok(OcrPageResult {
            text,
            confidence: Some(confidence),
        })
    }
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    pub text: String,
    pub confidence: f32,
    fail_with: Option<String>,
    calls: AtomicUsize,
}

impl MockOcrEngine {
    pub fn new(text: &str, confidence: f32) -> Self {
        Self {
            text: text.to_string(),
            confidence,
            fail_with: None,
            calls: AtomicUsize::new(0),
        }
    }

    /// An engine whose every call fails with `OcrProcessing(message)`.
    pub fn failing(message: &str) -> Self {
        Self {
            text: String::new(),
            confidence: 0.0,
            fail_with: Some(message.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl OcrEngine for MockOcrEngine {
    fn ocr_image(&self, _image_bytes: &[u8]) -> Result<OcrPageResult, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ref message) = self.fail_with {
            return Err(ExtractionError::OcrProcessing(message.clone()));
        }
        Ok(OcrPageResult {
            text: self.text.clone(),
            confidence: Some(self.confidence),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mock_returns_configured_text() {
        let engine = MockOcrEngine::new("LISIPREARI 500mg", 0.8);
        let result = engine.ocr_image(b"png").unwrap();
        assert_eq!(result.text, "LISIPREARI 500mg");
        assert_eq!(result.confidence, Some(0.8));
    }

    #[test]
    fn failing_mock_returns_error() {
        let engine = MockOcrEngine::failing("engine crashed");
        let err = engine.ocr_image(b"png").unwrap_err();
        assert!(err.to_string().contains("engine crashed"));
        assert_eq!(err.kind(), "ocr_processing");
    }

    #[test]
    fn cli_command_line_shape() {
        let engine = TesseractCli::new("tesseract", "eng+fra");
        let cmd = engine.build_command();
        let args: Vec<_> = cmd.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(cmd.get_program(), "tesseract");
        assert_eq!(args, vec!["stdin", "stdout", "-l", "eng+fra"]);
    }

    #[test]
    fn cli_ignores_tessdata_dir_without_traineddata() {
        let dir = tempfile::tempdir().unwrap();
        let engine = TesseractCli::new("tesseract", "eng").with_tessdata_dir(dir.path());
        assert!(engine.tessdata_dir.is_none());
    }

    #[test]
    fn cli_passes_tessdata_dir_when_present() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("eng.traineddata"), b"stub").unwrap();
        let engine = TesseractCli::new("tesseract", "eng").with_tessdata_dir(dir.path());
        let args: Vec<_> = engine
            .build_command()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"--tessdata-dir".to_string()));
    }

    #[test]
    fn cli_missing_binary_is_init_error() {
        let engine = TesseractCli::new("dawascan-no-such-tesseract-binary", "eng");
        let err = engine.ocr_image(b"png").unwrap_err();
        assert!(matches!(err, ExtractionError::OcrInit(_)), "got {err:?}");
    }

    #[cfg(unix)]
    #[test]
    fn cli_exiting_without_reading_input_is_processing_error() {
        // `true` exits at once; a payload larger than the pipe buffer hits a broken pipe.
        let engine = TesseractCli::new("true", "eng");
        let err = engine.ocr_image(&vec![0u8; 1 << 20]).unwrap_err();
        assert_eq!(err.kind(), "ocr_processing");
        assert!(err.to_string().contains("stdin write failed"), "got {err}");
    }
}
