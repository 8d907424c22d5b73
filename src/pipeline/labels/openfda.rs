use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::types::{DrugRecord, LabelLookup, LabelResult, LabelSearchResponse, OpenFdaErrorEnvelope};
use super::LookupError;

/// openFDA drug label client (`/drug/label.json`).
pub struct OpenFdaClient {
    base_url: String,
    client: reqwest::blocking::Client,
    timeout_secs: u64,
}

impl OpenFdaClient {
    pub fn new(base_url: &str, timeout_secs: u64) -> Result<Self, LookupError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| LookupError::Network(format!("HTTP client init failed: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            timeout_secs,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/drug/label.json", self.base_url)
    }
}

impl LabelLookup for OpenFdaClient {
    fn lookup(&self, generic_name: &str) -> Result<DrugRecord, LookupError> {
        let search = build_search_query(generic_name)
            .ok_or_else(|| LookupError::NotFound(generic_name.to_string()))?;

        let start = std::time::Instant::now();
        let response = self
            .client
            .get(self.endpoint())
            .query(&[("search", search.as_str()), ("limit", "1")])
            .send()
            .map_err(|e| {
                if e.is_timeout() {
                    LookupError::Timeout(self.timeout_secs)
                } else {
                    LookupError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| LookupError::Network(e.to_string()))?;

        tracing::info!(
            name = %generic_name,
            status = status.as_u16(),
            elapsed_ms = %start.elapsed().as_millis(),
            "openFDA label lookup complete"
        );

        if !status.is_success() {
            return Err(classify_error(generic_name, status.as_u16(), &body));
        }

        parse_label_response(generic_name, &body)
    }
}

/// Build the `search` parameter for an exact generic-name match.
/// `None` when the name is blank after trimming.
pub fn build_search_query(generic_name: &str) -> Option<String> {
    let cleaned = generic_name.trim().replace('"', "");
    if cleaned.is_empty() {
        return None;
    }
    Some(format!("openfda.generic_name:\"{cleaned}\""))
}

/// Map a non-2xx response to a failure kind. openFDA answers "no matches"
/// with HTTP 404 and `NOT_FOUND`.
pub fn classify_error(generic_name: &str, status: u16, body: &str) -> LookupError {
    let envelope = serde_json::from_str::<OpenFdaErrorEnvelope>(body).ok();

    if status == 404 || envelope.as_ref().is_some_and(|e| e.error.code == "NOT_FOUND") {
        return LookupError::NotFound(generic_name.to_string());
    }

    let message = envelope
        .map(|e| e.error.message)
        .unwrap_or_else(|| body.trim().to_string());
    LookupError::ApiError { status, message }
}

/// Extract the three label sections from the first result.
pub fn parse_label_response(generic_name: &str, body: &str) -> Result<DrugRecord, LookupError> {
    let parsed: LabelSearchResponse =
        serde_json::from_str(body).map_err(|e| LookupError::Parse(e.to_string()))?;

    let first = parsed
        .results
        .into_iter()
        .next()
        .ok_or_else(|| LookupError::NotFound(generic_name.to_string()))?;

    Ok(record_from_result(first))
}

fn record_from_result(result: LabelResult) -> DrugRecord {
    DrugRecord {
        uses: first_paragraph(result.indications_and_usage),
        dosage: first_paragraph(result.dosage_and_administration),
        side_effects: first_paragraph(result.adverse_reactions),
    }
}

fn first_paragraph(section: Vec<String>) -> Option<String> {
    section
        .into_iter()
        .next()
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
}

/// Mock label lookup for testing. One canned outcome, counts calls.
pub struct MockLabelLookup {
    outcome: Result<DrugRecord, LookupError>,
    calls: AtomicUsize,
}

impl MockLabelLookup {
    pub fn new(record: DrugRecord) -> Self {
        Self {
            outcome: Ok(record),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(error: LookupError) -> Self {
        Self {
            outcome: Err(error),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl LabelLookup for MockLabelLookup {
    fn lookup(&self, _generic_name: &str) -> Result<DrugRecord, LookupError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.outcome.clone()
    }
}
