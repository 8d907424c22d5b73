use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::LookupError;

/// Label text for one medicine, taken from the first matching record.
/// Each field is `None` when the record does not carry it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrugRecord {
    pub uses: Option<String>,
    pub dosage: Option<String>,
    pub side_effects: Option<String>,
}

/// Drug label database abstraction (allows mocking for tests).
pub trait LabelLookup {
    /// Look up the label for a generic name.
    fn lookup(&self, generic_name: &str) -> Result<DrugRecord, LookupError>;
}

impl<T: LabelLookup + ?Sized> LabelLookup for Arc<T> {
    fn lookup(&self, generic_name: &str) -> Result<DrugRecord, LookupError> {
        (**self).lookup(generic_name)
    }
}

// ──────────────────────────────────────────────
// openFDA drug/label.json response bodies
// ──────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct LabelSearchResponse {
    #[serde(default)]
    pub results: Vec<LabelResult>,
}

/// The subset of a label record this tool reads. Every section is a list of
/// paragraphs; only the first paragraph is used.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LabelResult {
    #[serde(default)]
    pub indications_and_usage: Vec<String>,
    #[serde(default)]
    pub dosage_and_administration: Vec<String>,
    #[serde(default)]
    pub adverse_reactions: Vec<String>,
}

/// openFDA error envelope: `{"error": {"code": "NOT_FOUND", "message": "..."}}`.
#[derive(Debug, Clone, Deserialize)]
pub struct OpenFdaErrorEnvelope {
    pub error: OpenFdaErrorBody,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OpenFdaErrorBody {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
}
