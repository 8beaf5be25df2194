//! Environment override for fidelity strictness. Kept in its own binary so
//! the process-global variable cannot race other reconciliation tests.

use seep_analysis::fidelity::{reconcile, DbReceipt, FidelityStatus, OutputManifest, StageCheck};

#[test]
fn env_override_forces_non_strict() {
    std::env::set_var("SEEP_FIDELITY_STRICT", "0");

    let manifest = OutputManifest { paths_to_write: 3 };
    let receipt = DbReceipt { db_rows: 0 };
    let outcome = reconcile(
        StageCheck::DbOutput {
            manifest: &manifest,
            receipt: &receipt,
        },
        true,
    )
    .expect("env override must downgrade the raise");
    assert_eq!(outcome.status, FidelityStatus::Failed);

    std::env::remove_var("SEEP_FIDELITY_STRICT");
}
