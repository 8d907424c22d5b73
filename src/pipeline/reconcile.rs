//! Choose the final medicine name from the two recognition paths.
//!
//! Strict precedence: a name from the vision model always wins; the
//! corrected OCR token is used only when the vision path produced none.
//! No scoring, no merging of partial evidence.

use serde::Serialize;

use crate::pipeline::extraction::{CandidateName, NameSource};
use crate::pipeline::vision::VisionError;

/// What the vision path produced for this scan.
#[derive(Debug, Clone, PartialEq)]
pub enum VisionOutcome {
    /// The model named the medicine.
    Recognized(CandidateName),
    /// The model answered but could not read a name.
    Unreadable,
    /// The call failed; the error kind is kept for the report.
    Failed(VisionError),
    /// Vision recognition was turned off for this run.
    Skipped,
}

impl VisionOutcome {
    pub fn name(&self) -> Option<&CandidateName> {
        match self {
            Self::Recognized(name) => Some(name),
            _ => None,
        }
    }
}

/// The name used for the label lookup and where it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FinalName {
    pub name: CandidateName,
    pub source: NameSource,
}

/// Pick the final name. `None` only when neither path produced a name.
pub fn reconcile(vision: &VisionOutcome, ocr_name: Option<&CandidateName>) -> Option<FinalName> {
    if let VisionOutcome::Recognized(name) = vision {
        return Some(FinalName {
            name: name.clone(),
            source: NameSource::VisionModel,
        });
    }

    match vision {
        VisionOutcome::Failed(err) => tracing::info!(
            vision_error = err.kind(),
            has_ocr_name = ocr_name.is_some(),
            "Vision failed, falling back to OCR name"
        ),
        VisionOutcome::Unreadable => tracing::info!(
            has_ocr_name = ocr_name.is_some(),
            "Vision could not read a name, falling back to OCR name"
        ),
        VisionOutcome::Skipped | VisionOutcome::Recognized(_) => {}
    }

    ocr_name.map(|name| FinalName {
        name: name.clone(),
        source: NameSource::LocalOcr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn name(s: &str) -> CandidateName {
        CandidateName::new(s).unwrap()
    }

    #[test]
    fn vision_name_wins_over_different_ocr_name() {
        let chosen = reconcile(
            &VisionOutcome::Recognized(name("metformin")),
            Some(&name("lisinopril")),
        )
        .unwrap();
        assert_eq!(chosen.name.as_str(), "metformin");
        assert_eq!(chosen.source, NameSource::VisionModel);
    }

    #[test]
    fn vision_name_used_when_ocr_found_nothing() {
        let chosen = reconcile(&VisionOutcome::Recognized(name("metformin")), None).unwrap();
        assert_eq!(chosen.name.as_str(), "metformin");
    }

    #[test]
    fn unreadable_vision_falls_back_to_ocr() {
        let chosen = reconcile(&VisionOutcome::Unreadable, Some(&name("lisinopril"))).unwrap();
        assert_eq!(chosen.name.as_str(), "lisinopril");
        assert_eq!(chosen.source, NameSource::LocalOcr);
    }

    #[test]
    fn failed_vision_falls_back_to_ocr_for_every_kind() {
        let failures = [
            VisionError::MissingApiKey,
            VisionError::Auth { status: 401, message: "nope".into() },
            VisionError::Quota("exhausted".into()),
            VisionError::Network("connection reset".into()),
            VisionError::ResponseParsing("eof".into()),
        ];
        for err in failures {
            let chosen = reconcile(&VisionOutcome::Failed(err), Some(&name("500mg"))).unwrap();
            assert_eq!(chosen.name.as_str(), "500mg");
            assert_eq!(chosen.source, NameSource::LocalOcr);
        }
    }

    #[test]
    fn skipped_vision_uses_ocr() {
        let chosen = reconcile(&VisionOutcome::Skipped, Some(&name("paracetamol"))).unwrap();
        assert_eq!(chosen.source, NameSource::LocalOcr);
    }

    #[test]
    fn nothing_from_either_path_is_none() {
        assert!(reconcile(&VisionOutcome::Unreadable, None).is_none());
        assert!(reconcile(&VisionOutcome::Failed(VisionError::MissingApiKey), None).is_none());
    }

    #[test]
    fn literal_unknown_from_ocr_is_just_a_name() {
        let chosen = reconcile(&VisionOutcome::Unreadable, Some(&name("unknown"))).unwrap();
        assert_eq!(chosen.name.as_str(), "unknown");
    }
}
