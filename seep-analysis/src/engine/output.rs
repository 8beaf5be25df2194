//! JSON report output with fidelity receipts.
//!
//! The engine itself does not persist; this helper exists for hosts that
//! want the report written to disk with the json_output stage reconciled.

use std::fs;
use std::path::Path;

use seep_core::errors::TaintError;

use crate::fidelity::{reconcile, FidelityOutcome, JsonReceipt, OutputManifest, StageCheck};
use crate::types::TaintReport;

/// Serialize the report to pretty JSON, write it, and reconcile the
/// json_output stage against the byte-level receipt.
pub fn write_json_report(
    report: &TaintReport,
    path: &Path,
    strict: bool,
) -> Result<FidelityOutcome, TaintError> {
    let json = serde_json::to_string_pretty(report)
        .map_err(|e| TaintError::Report(e.to_string()))?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| TaintError::Report(e.to_string()))?;
    }
    fs::write(path, json.as_bytes()).map_err(|e| TaintError::Report(e.to_string()))?;

    let manifest = OutputManifest {
        paths_to_write: report.taint_paths.len(),
    };
    let receipt = JsonReceipt {
        json_count: report.taint_paths.len(),
        json_bytes: json.len(),
    };
    reconcile(
        StageCheck::JsonOutput {
            manifest: &manifest,
            receipt: &receipt,
        },
        strict,
    )
    .map_err(|e| TaintError::Report(e.to_string()))
}
