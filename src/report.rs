//! Report rendering. Pure functions: same input, byte-identical output.

use std::fmt::Write as _;

use crate::pipeline::labels::LookupError;
use crate::pipeline::{LookupOutcome, ScanReport, VisionOutcome};

pub const NO_INFORMATION: &str = "No information available.";
const DIVIDER_WIDTH: usize = 50;
const UNKNOWN_NAME: &str = "UNKNOWN";

/// Render the summary block for a name and its three label fields.
/// Missing fields read "No information available."
pub fn format_summary(
    name: Option<&str>,
    uses: Option<&str>,
    dosage: Option<&str>,
    side_effects: Option<&str>,
) -> String {
    render(name, None, [uses, dosage, side_effects], &[])
}

/// Render the full report for a finished scan, including where the name came
/// from and why information is missing when a step failed.
pub fn render_report(report: &ScanReport) -> String {
    let record = report.lookup.record();
    let fields = [
        record.and_then(|r| r.uses.as_deref()),
        record.and_then(|r| r.dosage.as_deref()),
        record.and_then(|r| r.side_effects.as_deref()),
    ];

    let mut notes = Vec::new();
    if let Some(ref failure) = report.ocr_failure {
        notes.push(format!("Local OCR failed ({failure})."));
    }
    if let VisionOutcome::Failed(ref err) = report.vision {
        notes.push(format!("Vision model unavailable ({}).", err.kind()));
    }
    if let Some(note) = lookup_note(&report.lookup) {
        notes.push(note);
    }

    render(
        report.final_name.as_ref().map(|f| f.name.as_str()),
        report.final_name.as_ref().map(|f| f.source.label()),
        fields,
        &notes,
    )
}

fn lookup_note(outcome: &LookupOutcome) -> Option<String> {
    match outcome {
        LookupOutcome::Found(_) => None,
        LookupOutcome::Skipped => {
            Some("No medicine name was recognized; label lookup skipped.".to_string())
        }
        LookupOutcome::Failed(err) => Some(match err {
            LookupError::NotFound(_) => "No openFDA label matches this name.".to_string(),
            LookupError::Timeout(_) | LookupError::Network(_) => {
                "Label lookup failed: network error.".to_string()
            }
            LookupError::ApiError { status, .. } => {
                format!("Label lookup failed: label service returned HTTP {status}.")
            }
            LookupError::Parse(_) => {
                "Label lookup failed: unexpected response from the label service.".to_string()
            }
        }),
    }
}

fn render(
    name: Option<&str>,
    source: Option<&str>,
    [uses, dosage, side_effects]: [Option<&str>; 3],
    notes: &[String],
) -> String {
    let divider = format!("\n{}\n", "-".repeat(DIVIDER_WIDTH));
    let display_name = name
        .map(str::to_uppercase)
        .unwrap_or_else(|| UNKNOWN_NAME.to_string());

    let mut out = String::new();
    // Writing to a String cannot fail.
    let _ = writeln!(out, "{divider}");
    let _ = writeln!(out, "Final Medicine Report");
    let _ = writeln!(out, "{divider}");
    let _ = writeln!(out, "Medicine Name: {display_name}");
    if let Some(source) = source {
        let _ = writeln!(out, "Identified by: {source}");
    }
    for (heading, value) in [("Uses", uses), ("Dosage", dosage), ("Side Effects", side_effects)] {
        let _ = writeln!(out);
        let _ = writeln!(out, "{heading}:");
        let _ = writeln!(out, "{}", field_or_default(value));
    }
    for note in notes {
        let _ = writeln!(out);
        let _ = writeln!(out, "Note: {note}");
    }
    out.push_str(&divider);
    out
}

fn field_or_default(value: Option<&str>) -> &str {
    match value {
        Some(v) if !v.trim().is_empty() => v,
        _ => NO_INFORMATION,
    }
}
