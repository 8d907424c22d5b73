//! Post-OCR correction of known medicine-name misreads.
//!
//! Exact-match lookup against a fixed table of tokens Tesseract is known to
//! garble on strip photos. No fuzzy matching: a token that is not a key
//! passes through unchanged.

use super::types::CandidateName;

/// Misread token → canonical generic name.
/// Sorted by key for binary search. Keys must be lowercase.
const MEDICINE_CORRECTIONS: &[(&str, &str)] = &[
    ("amoxilin", "amoxicillin"),
    ("atorvastine", "atorvastatin"),
    ("ciproflaxin", "ciprofloxacin"),
    ("lisipreari", "lisinopril"),
    ("metformine", "metformin"),
    ("paracetamo1", "paracetamol"),
];

/// Look up a token in the correction table. Case-sensitive; callers pass lowercase.
pub fn lookup_correction(token: &str) -> Option<&'static str> {
    MEDICINE_CORRECTIONS
        .binary_search_by_key(&token, |&(misread, _)| misread)
        .ok()
        .map(|idx| MEDICINE_CORRECTIONS[idx].1)
}

/// A candidate name after the correction table has been applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectedName {
    pub original: CandidateName,
    pub corrected: CandidateName,
}

impl CorrectedName {
    pub fn was_corrected(&self) -> bool {
        self.original != self.corrected
    }
}

/// Map a known misread to its canonical spelling; anything else is returned unchanged.
pub fn correct_ocr_name(name: &CandidateName) -> CorrectedName {
    let corrected = lookup_correction(name.as_str())
        .and_then(CandidateName::new)
        .unwrap_or_else(|| name.clone());

    CorrectedName {
        original: name.clone(),
        corrected,
    }
}
