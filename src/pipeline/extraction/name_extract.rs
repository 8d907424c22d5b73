//! Heuristic drug-name pick from raw OCR text.
//!
//! The first whitespace-separated token longer than four characters wins.
//! There is no check that the token is a drug name; dosage units, brand
//! boilerplate or batch codes can be picked instead. Treat it as a
//! placeholder heuristic.

use super::types::CandidateName;

/// Tokens must be strictly longer than this (in characters) to qualify.
const MIN_TOKEN_CHARS: usize = 4;

/// Lowercase the text and return the first token longer than four characters.
/// `None` when no token qualifies.
pub fn extract_candidate_name(ocr_text: &str) -> Option<CandidateName> {
    ocr_text
        .to_lowercase()
        .split_whitespace()
        .find(|token| token.chars().count() > MIN_TOKEN_CHARS)
        .and_then(CandidateName::new)
}
