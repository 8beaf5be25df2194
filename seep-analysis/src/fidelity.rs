//! Fidelity control: per-stage manifest/receipt reconciliation.
//!
//! Every pipeline stage emits a manifest of what it produced and, where a
//! boundary is crossed, a receipt of what actually landed. Reconciliation
//! turns silent data loss between stages into loud errors.

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

use seep_core::errors::FidelityError;

/// Reconciliation verdict for one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FidelityStatus {
    Ok,
    Warning,
    Failed,
}

/// The structured result of reconciling one stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FidelityOutcome {
    pub status: FidelityStatus,
    pub stage: String,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Manifest after source/sink discovery.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DiscoveryManifest {
    pub source_count: usize,
    pub sink_count: usize,
}

/// Manifest after path tracing.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalysisManifest {
    pub vulnerable_count: usize,
    pub sanitized_count: usize,
    pub sinks_analyzed: usize,
    pub sources_checked: usize,
}

/// Manifest after deduplication.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DedupManifest {
    pub pre_count: usize,
    pub post_count: usize,
    pub removed: usize,
    pub removal_ratio: f64,
}

impl DedupManifest {
    pub fn new(pre_count: usize, post_count: usize) -> Self {
        let removed = pre_count.saturating_sub(post_count);
        Self {
            pre_count,
            post_count,
            removed,
            removal_ratio: removed as f64 / pre_count.max(1) as f64,
        }
    }
}

/// Manifest before an output write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OutputManifest {
    pub paths_to_write: usize,
}

/// Receipt after a database write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct DbReceipt {
    pub db_rows: usize,
}

/// Receipt after a JSON write.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct JsonReceipt {
    pub json_count: usize,
    pub json_bytes: usize,
}

/// One stage's manifest/receipt pairing, ready to reconcile.
#[derive(Debug, Clone, Copy)]
pub enum StageCheck<'a> {
    Discovery(&'a DiscoveryManifest),
    Analysis {
        manifest: &'a AnalysisManifest,
        sinks_to_analyze: usize,
    },
    Dedup(&'a DedupManifest),
    DbOutput {
        manifest: &'a OutputManifest,
        receipt: &'a DbReceipt,
    },
    JsonOutput {
        manifest: &'a OutputManifest,
        receipt: &'a JsonReceipt,
    },
}

impl StageCheck<'_> {
    fn stage(&self) -> &'static str {
        match self {
            Self::Discovery(_) => "discovery",
            Self::Analysis { .. } => "analysis",
            Self::Dedup(_) => "dedup",
            Self::DbOutput { .. } => "db_output",
            Self::JsonOutput { .. } => "json_output",
        }
    }
}

/// Compare manifest against receipt for one stage.
///
/// In strict mode errors raise [`FidelityError`]; the environment variable
/// `SEEP_FIDELITY_STRICT=0` forces non-strict behavior regardless of the
/// caller's flag.
pub fn reconcile(check: StageCheck<'_>, strict: bool) -> Result<FidelityOutcome, FidelityError> {
    let strict = match std::env::var("SEEP_FIDELITY_STRICT") {
        Ok(value) if value == "0" => false,
        _ => strict,
    };

    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    match check {
        StageCheck::Discovery(manifest) => {
            if manifest.source_count == 0 {
                warnings.push("Discovery found 0 sources - is this expected?".to_string());
            }
            if manifest.sink_count == 0 {
                warnings.push("Discovery found 0 sinks - is this expected?".to_string());
            }
        }
        StageCheck::Analysis {
            manifest,
            sinks_to_analyze,
        } => {
            if manifest.sinks_analyzed == 0 && sinks_to_analyze > 0 {
                errors.push(format!(
                    "Analysis processed 0/{sinks_to_analyze} sinks - pipeline stalled"
                ));
            }
        }
        StageCheck::Dedup(manifest) => {
            if manifest.removal_ratio > 0.5 {
                warnings.push(format!(
                    "Dedup removed {}/{} paths ({:.0}%) - check for key collisions",
                    manifest.removed,
                    manifest.pre_count,
                    manifest.removal_ratio * 100.0
                ));
            }
        }
        StageCheck::DbOutput { manifest, receipt } => {
            if manifest.paths_to_write > 0 && receipt.db_rows == 0 {
                errors.push(format!(
                    "DB Output: {} paths to write, 0 written (100% LOSS)",
                    manifest.paths_to_write
                ));
            } else if manifest.paths_to_write != receipt.db_rows {
                warnings.push(format!(
                    "DB Output: manifest={}, db_rows={} (delta={})",
                    manifest.paths_to_write,
                    receipt.db_rows,
                    manifest.paths_to_write as i64 - receipt.db_rows as i64
                ));
            }
        }
        StageCheck::JsonOutput { manifest, receipt } => {
            if manifest.paths_to_write > 0 && receipt.json_count == 0 {
                errors.push(format!(
                    "JSON Output: {} paths to write, 0 in JSON (100% LOSS)",
                    manifest.paths_to_write
                ));
            } else if manifest.paths_to_write != receipt.json_count {
                warnings.push(format!(
                    "JSON Output: manifest={}, json={} (delta={})",
                    manifest.paths_to_write,
                    receipt.json_count,
                    manifest.paths_to_write as i64 - receipt.json_count as i64
                ));
            }
        }
    }

    let stage = check.stage().to_string();
    let outcome = FidelityOutcome {
        status: if !errors.is_empty() {
            FidelityStatus::Failed
        } else if !warnings.is_empty() {
            FidelityStatus::Warning
        } else {
            FidelityStatus::Ok
        },
        stage: stage.clone(),
        errors: errors.clone(),
        warnings: warnings.clone(),
    };

    if !errors.is_empty() {
        let message = errors.join("; ");
        error!(stage = stage.as_str(), message = message.as_str(), "fidelity FAILED");
        if strict {
            return Err(FidelityError { stage, message });
        }
    }
    if !warnings.is_empty() {
        warn!(stage = stage.as_str(), warnings = ?warnings, "fidelity warnings");
    }

    Ok(outcome)
}
