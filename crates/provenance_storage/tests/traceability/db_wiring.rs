#![forbid(unsafe_code)]

use chrono::{DateTime, TimeZone, Utc};
use provenance_contracts::identity::{derive_evidence_id, derive_finding_id};
use provenance_contracts::ledger::{Evidence, Finding, LineageRoot, SourceRecord};
use provenance_contracts::RecordId;
use provenance_storage::repo::{
    EvidenceLedgerRepo, FindingLedgerRepo, LineageLedgerRepo, TraceabilityRepo,
};
use provenance_storage::{ErrorClass, LedgerStore, StorageError};
use serde_json::json;

const ENGINE: &str = "audit_engine";

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn rid(s: &str) -> RecordId {
    RecordId::new(s).unwrap()
}

/// Writes a lineage root with one finding and `n` evidence rows.
fn seed_lineage(
    s: &mut LedgerStore,
    root: &str,
    n: usize,
) -> (RecordId, RecordId, Vec<RecordId>) {
    let root_id = rid(root);
    let src_id = rid(&format!("{root}-src"));
    let mut txn = s.begin();
    txn.insert_or_verify_lineage_root_row(
        LineageRoot::v1(root_id.clone(), "ap", root, json!({}), t0()).unwrap(),
    )
    .unwrap();
    txn.insert_or_verify_source_record_row(
        SourceRecord::v1(
            src_id.clone(),
            root_id.clone(),
            "erp",
            "invoice-9",
            json!({"total": 100}),
            t0(),
            None,
        )
        .unwrap(),
    )
    .unwrap();
    let (finding, _) = txn
        .insert_or_verify_finding_row(
            Finding::v1(
                derive_finding_id(ENGINE, &root_id, "split_invoice", "invoice-9"),
                root_id.clone(),
                src_id,
                ENGINE,
                "split_invoice",
                json!({"parts": 2}),
                t0(),
            )
            .unwrap(),
        )
        .unwrap();
    let mut evidence = Vec::new();
    for i in 0..n {
        let (e, _) = txn
            .insert_or_verify_evidence_row(
                Evidence::v1(
                    derive_evidence_id(ENGINE, &root_id, "invoice_pair", &format!("p{i}")),
                    root_id.clone(),
                    ENGINE,
                    "invoice_pair",
                    json!({"i": i}),
                    t0(),
                )
                .unwrap(),
            )
            .unwrap();
        evidence.push(e.id);
    }
    txn.commit().unwrap();
    (root_id, finding.id, evidence)
}

#[test]
fn at_trace_db_01_without_ids_every_scoped_evidence_row_is_counted() {
    let mut s = LedgerStore::new_in_memory();
    let (l1, _, _) = seed_lineage(&mut s, "dv-1", 3);
    seed_lineage(&mut s, "dv-2", 5);

    let report = s.verify_traceability(&l1, None).unwrap();
    assert!(report.valid);
    assert_eq!(report.checked, 3);
    assert!(report.mismatches.is_empty());

    let empty = s.verify_traceability(&rid("dv-empty"), None).unwrap();
    assert!(empty.valid);
    assert_eq!(empty.checked, 0);
}

#[test]
fn at_trace_db_02_foreign_ids_are_reported_not_raised() {
    let mut s = LedgerStore::new_in_memory();
    let (l1, f1, e1) = seed_lineage(&mut s, "dv-1", 1);
    let (l2, _, e2) = seed_lineage(&mut s, "dv-2", 1);

    let ids = vec![e2[0].clone(), e1[0].clone(), f1.clone()];
    let report = s.verify_traceability_row(&l2, Some(ids.as_slice())).unwrap();
    assert!(!report.valid);
    assert_eq!(report.checked, 3);
    assert_eq!(report.mismatches.len(), 2);
    assert_eq!(report.mismatches[0].id, e1[0]);
    assert_eq!(report.mismatches[0].table, "evidence");
    assert_eq!(report.mismatches[0].actual_lineage_root_id, l1);
    assert_eq!(report.mismatches[1].id, f1);
    assert_eq!(report.mismatches[1].table, "findings");

    match report.into_strict().unwrap_err() {
        StorageError::LineageMismatch {
            lineage_root_id,
            mismatches,
        } => {
            assert_eq!(lineage_root_id, l2);
            assert_eq!(mismatches.len(), 2);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test]
fn at_trace_db_03_unknown_ids_raise_before_lineage_checks() {
    let mut s = LedgerStore::new_in_memory();
    let (l1, _, e1) = seed_lineage(&mut s, "dv-1", 1);
    let (l2, _, _) = seed_lineage(&mut s, "dv-2", 0);

    let ids = vec![e1[0].clone(), rid("nope-1"), rid("nope-2")];
    let err = s.verify_traceability(&l2, Some(ids.as_slice())).unwrap_err();
    assert_eq!(err.class(), ErrorClass::Traceability);
    match err {
        StorageError::MissingEvidence { lineage_root_id, ids } => {
            assert_eq!(lineage_root_id, l2);
            assert_eq!(ids, vec![rid("nope-1"), rid("nope-2")]);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    // Soft variant reports the same gaps instead of raising.
    let soft = s.verify_traceability_soft(&l1, &ids);
    assert!(!soft.valid);
    assert_eq!(soft.checked, 1);
    assert!(soft.mismatches.is_empty());
    assert_eq!(soft.missing, vec![rid("nope-1"), rid("nope-2")]);
    assert_eq!(soft.into_strict().unwrap_err().code(), "MISSING_EVIDENCE");
}

#[test]
fn at_trace_db_04_clean_report_passes_strict() {
    let mut s = LedgerStore::new_in_memory();
    let (l1, f1, e1) = seed_lineage(&mut s, "dv-1", 2);

    let mut ids = e1.clone();
    ids.push(f1);
    let report = s.verify_traceability(&l1, Some(ids.as_slice())).unwrap();
    let report = report.into_strict().unwrap();
    assert!(report.valid);
    assert_eq!(report.checked, 3);
}

#[test]
fn at_trace_db_05_get_by_ids_keeps_request_order_and_raises_on_foreign_rows() {
    let mut s = LedgerStore::new_in_memory();
    let (l1, _, e1) = seed_lineage(&mut s, "dv-1", 3);
    let (l2, _, e2) = seed_lineage(&mut s, "dv-2", 1);

    let ids = vec![e1[2].clone(), e1[0].clone(), e1[1].clone()];
    let rows = s.evidence_by_ids_rows(&ids, &l1).unwrap();
    let got: Vec<&RecordId> = rows.iter().map(|e| &e.id).collect();
    assert_eq!(got, ids.iter().collect::<Vec<_>>());

    let err = s.evidence_by_ids(&[e1[0].clone()], &l2).unwrap_err();
    assert_eq!(err.code(), "LINEAGE_MISMATCH");

    let err = s
        .evidence_by_ids(&[e2[0].clone(), rid("nope")], &l2)
        .unwrap_err();
    assert_eq!(err.code(), "MISSING_EVIDENCE");

    assert!(s.evidence_by_ids(&[], &l1).unwrap().is_empty());
}
