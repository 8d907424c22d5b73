//! Vision recognizer: asks a cloud vision-language model to name the medicine.
//!
//! Bridges the `VisionClient` (HTTP layer) to the `VisionNameEngine` trait
//! (extraction layer): builds the inline image, sends the fixed instruction,
//! and reduces the free-text reply to a single candidate name.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::LazyLock;

use base64::Engine as _;
use regex::Regex;

use super::types::{CandidateName, LoadedImage, VisionNameEngine, VisionNameResult};
use crate::pipeline::vision::{InlineImage, VisionClient, VisionError};

/// Fixed instruction sent alongside the strip photo.
pub const MEDICINE_NAME_PROMPT: &str = "\
This is an image of the back side of a medicine strip. \
Identify the exact name of the medicine written on it. \
Only return the name, nothing else. \
If the name cannot be read, return exactly: unknown";

/// Replies meaning "could not read it" rather than a medicine name.
const UNREADABLE_REPLIES: &[&str] = &["unknown", "none", "n/a", "unreadable", "not visible"];

/// Leading/trailing decoration models add around a one-word answer:
/// markdown emphasis, quotes, list bullets, trailing punctuation.
static DECORATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^[\s*_`"'#>\-•]+|[\s*_`"'.,:;!]+$"#).unwrap()
});

/// Production vision recognizer.
pub struct MedicineVisionRecognizer {
    vision_client: Box<dyn VisionClient + Send + Sync>,
    model_name: String,
}

impl MedicineVisionRecognizer {
    pub fn new(vision_client: Box<dyn VisionClient + Send + Sync>, model_name: &str) -> Self {
        Self {
            vision_client,
            model_name: model_name.to_string(),
        }
    }
}

impl VisionNameEngine for MedicineVisionRecognizer {
    fn recognize_name(&self, image: &LoadedImage) -> Result<VisionNameResult, VisionError> {
        let _span = tracing::info_span!(
            "vision_recognize",
            model = %self.model_name,
            image_size = image.original_bytes.len(),
        )
        .entered();
        let start = std::time::Instant::now();

        let inline = InlineImage {
            mime_type: image.format.mime_type().to_string(),
            data: base64::engine::general_purpose::STANDARD.encode(&image.original_bytes),
        };

        let raw_reply = self
            .vision_client
            .generate_with_image(&self.model_name, MEDICINE_NAME_PROMPT, &inline)?;

        let name = parse_name_reply(&raw_reply);

        tracing::info!(
            model = %self.model_name,
            elapsed_ms = %start.elapsed().as_millis(),
            recognized = name.is_some(),
            "Vision recognition complete"
        );

        Ok(VisionNameResult {
            name,
            raw_reply,
        })
    }
}

/// Reduce a model reply to a candidate name.
///
/// Takes the first non-empty line, strips decoration, lowercases.
/// `None` for empty replies and for the model's own "can't read it" answers.
pub fn parse_name_reply(reply: &str) -> Option<CandidateName> {
    let line = reply.lines().map(str::trim).find(|l| !l.is_empty())?;
    let cleaned = DECORATION.replace_all(line, "");
    let name = CandidateName::new(&cleaned)?;

    if UNREADABLE_REPLIES.contains(&name.as_str()) {
        return None;
    }
    Some(name)
}

/// Mock vision recognizer for testing.
pub struct MockVisionRecognizer {
    reply: Result<String, VisionError>,
    calls: AtomicUsize,
}

impl MockVisionRecognizer {
    /// Recognizer whose model "replies" with `reply`; parsed like a real reply.
    pub fn new(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: VisionError) -> Self {
        Self {
            reply: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VisionNameEngine for MockVisionRecognizer {
    fn recognize_name(&self, _image: &LoadedImage) -> Result<VisionNameResult, VisionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let raw_reply = self.reply.clone()?;
        Ok(VisionNameResult {
            name: parse_name_reply(&raw_reply),
            raw_reply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::extraction::types::ImageFormat;
    use crate::pipeline::vision::MockVisionClient;
    use std::path::PathBuf;

    fn sample_image() -> LoadedImage {
        LoadedImage {
            path: PathBuf::from("strip.jpg"),
            format: ImageFormat::Jpeg,
            original_bytes: vec![0xFF, 0xD8, 0xFF, 0xE0],
            ocr_png: Vec::new(),
            width: 1,
            height: 1,
            orientation: 1,
        }
    }

    // ── parse_name_reply ──

    #[test]
    fn plain_reply_is_trimmed_and_lowercased() {
        assert_eq!(parse_name_reply("  Metformin \n").unwrap().as_str(), "metformin");
    }

    #[test]
    fn multi_word_names_are_kept() {
        assert_eq!(
            parse_name_reply("Amoxicillin and Potassium Clavulanate").unwrap().as_str(),
            "amoxicillin and potassium clavulanate"
        );
    }

    #[test]
    fn decoration_is_stripped() {
        assert_eq!(parse_name_reply("**Paracetamol**").unwrap().as_str(), "paracetamol");
        assert_eq!(parse_name_reply("\"Lisinopril.\"").unwrap().as_str(), "lisinopril");
        assert_eq!(parse_name_reply("- Atorvastatin").unwrap().as_str(), "atorvastatin");
    }

    #[test]
    fn inner_hyphens_survive() {
        assert_eq!(
            parse_name_reply("co-amoxiclav").unwrap().as_str(),
            "co-amoxiclav"
        );
    }

    #[test]
    fn first_non_empty_line_wins() {
        assert_eq!(
            parse_name_reply("\n\nCiprofloxacin\n500 mg tablets").unwrap().as_str(),
            "ciprofloxacin"
        );
    }

    #[test]
    fn unreadable_answers_are_none() {
        assert!(parse_name_reply("unknown").is_none());
        assert!(parse_name_reply("Unknown.").is_none());
        assert!(parse_name_reply("N/A").is_none());
    }

    #[test]
    fn empty_or_decoration_only_is_none() {
        assert!(parse_name_reply("").is_none());
        assert!(parse_name_reply("   \n ").is_none());
        assert!(parse_name_reply("**").is_none());
    }

    // ── MedicineVisionRecognizer ──

    #[test]
    fn recognizer_parses_client_reply() {
        let recognizer = MedicineVisionRecognizer::new(
            Box::new(MockVisionClient::new("Metformin\n")),
            "gemini-1.5-pro",
        );
        let result = recognizer.recognize_name(&sample_image()).unwrap();
        assert_eq!(result.name.unwrap().as_str(), "metformin");
        assert_eq!(result.raw_reply, "Metformin\n");
    }

    #[test]
    fn recognizer_reports_unreadable_as_none() {
        let recognizer = MedicineVisionRecognizer::new(
            Box::new(MockVisionClient::new("unknown")),
            "gemini-1.5-pro",
        );
        let result = recognizer.recognize_name(&sample_image()).unwrap();
        assert!(result.name.is_none());
    }

    #[test]
    fn recognizer_propagates_client_error_kind() {
        let recognizer = MedicineVisionRecognizer::new(
            Box::new(MockVisionClient::failing(VisionError::Auth {
                status: 403,
                message: "bad key".into(),
            })),
            "gemini-1.5-pro",
        );
        let err = recognizer.recognize_name(&sample_image()).unwrap_err();
        assert_eq!(err.kind(), "auth");
    }

    #[test]
    fn prompt_asks_for_name_only() {
        assert!(MEDICINE_NAME_PROMPT.contains("medicine strip"));
        assert!(MEDICINE_NAME_PROMPT.contains("Only return the name"));
    }
}
