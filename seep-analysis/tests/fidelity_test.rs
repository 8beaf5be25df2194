//! Fidelity reconciliation tests for every pipeline stage.

use seep_analysis::fidelity::{
    reconcile, AnalysisManifest, DbReceipt, DedupManifest, DiscoveryManifest, FidelityStatus,
    JsonReceipt, OutputManifest, StageCheck,
};

#[test]
fn discovery_warns_on_zero_counts() {
    let outcome = reconcile(
        StageCheck::Discovery(&DiscoveryManifest {
            source_count: 0,
            sink_count: 5,
        }),
        true,
    )
    .unwrap();
    assert_eq!(outcome.status, FidelityStatus::Warning);
    assert_eq!(outcome.stage, "discovery");
    assert_eq!(outcome.warnings.len(), 1);

    let clean = reconcile(
        StageCheck::Discovery(&DiscoveryManifest {
            source_count: 3,
            sink_count: 5,
        }),
        true,
    )
    .unwrap();
    assert_eq!(clean.status, FidelityStatus::Ok);
}

#[test]
fn stalled_analysis_fails_and_raises_in_strict_mode() {
    let manifest = AnalysisManifest {
        vulnerable_count: 0,
        sanitized_count: 0,
        sinks_analyzed: 0,
        sources_checked: 4,
    };

    let err = reconcile(
        StageCheck::Analysis {
            manifest: &manifest,
            sinks_to_analyze: 9,
        },
        true,
    )
    .unwrap_err();
    assert_eq!(err.stage, "analysis");

    let lenient = reconcile(
        StageCheck::Analysis {
            manifest: &manifest,
            sinks_to_analyze: 9,
        },
        false,
    )
    .unwrap();
    assert_eq!(lenient.status, FidelityStatus::Failed);
    assert_eq!(lenient.errors.len(), 1);
}

#[test]
fn heavy_dedup_removal_warns() {
    let heavy = DedupManifest::new(10, 3);
    assert_eq!(heavy.removed, 7);
    let outcome = reconcile(StageCheck::Dedup(&heavy), true).unwrap();
    assert_eq!(outcome.status, FidelityStatus::Warning);

    let light = DedupManifest::new(10, 8);
    let outcome = reconcile(StageCheck::Dedup(&light), true).unwrap();
    assert_eq!(outcome.status, FidelityStatus::Ok);

    // Empty input never divides by zero.
    let empty = DedupManifest::new(0, 0);
    assert_eq!(empty.removal_ratio, 0.0);
}

#[test]
fn total_db_loss_fails_reconciliation() {
    let manifest = OutputManifest { paths_to_write: 7 };
    let receipt = DbReceipt { db_rows: 0 };

    // Non-strict: FAILED status, no raise.
    let outcome = reconcile(
        StageCheck::DbOutput {
            manifest: &manifest,
            receipt: &receipt,
        },
        false,
    )
    .unwrap();
    assert_eq!(outcome.status, FidelityStatus::Failed);

    // Strict: raises.
    let err = reconcile(
        StageCheck::DbOutput {
            manifest: &manifest,
            receipt: &receipt,
        },
        true,
    )
    .unwrap_err();
    assert_eq!(err.stage, "db_output");
}

#[test]
fn partial_db_mismatch_only_warns() {
    let manifest = OutputManifest { paths_to_write: 7 };
    let receipt = DbReceipt { db_rows: 5 };
    let outcome = reconcile(
        StageCheck::DbOutput {
            manifest: &manifest,
            receipt: &receipt,
        },
        true,
    )
    .unwrap();
    assert_eq!(outcome.status, FidelityStatus::Warning);
}

#[test]
fn json_output_mirrors_db_rules() {
    let manifest = OutputManifest { paths_to_write: 4 };

    let total_loss = JsonReceipt {
        json_count: 0,
        json_bytes: 2,
    };
    let err = reconcile(
        StageCheck::JsonOutput {
            manifest: &manifest,
            receipt: &total_loss,
        },
        true,
    )
    .unwrap_err();
    assert_eq!(err.stage, "json_output");

    let exact = JsonReceipt {
        json_count: 4,
        json_bytes: 2048,
    };
    let outcome = reconcile(
        StageCheck::JsonOutput {
            manifest: &manifest,
            receipt: &exact,
        },
        true,
    )
    .unwrap();
    assert_eq!(outcome.status, FidelityStatus::Ok);
}

#[test]
fn zero_paths_to_write_is_clean() {
    let manifest = OutputManifest { paths_to_write: 0 };
    let receipt = DbReceipt { db_rows: 0 };
    let outcome = reconcile(
        StageCheck::DbOutput {
            manifest: &manifest,
            receipt: &receipt,
        },
        true,
    )
    .unwrap();
    assert_eq!(outcome.status, FidelityStatus::Ok);
}
