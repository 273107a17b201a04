#![forbid(unsafe_code)]

use chrono::{DateTime, TimeZone, Utc};
use provenance_contracts::identity::{
    derive_derived_fact_id, derive_finding_id, derive_lineage_root_id, derive_source_record_id,
};
use provenance_contracts::ledger::{DerivedFact, Finding, LineageRoot, SourceRecord};
use provenance_contracts::payload::payload_checksum_hex;
use provenance_contracts::RecordId;
use provenance_storage::repo::{FindingLedgerRepo, LineageLedgerRepo};
use provenance_storage::writer::backfill_source_checksum_from_payload;
use provenance_storage::{LedgerStore, StorageError};
use serde_json::json;

fn t(minute: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, minute, 0).unwrap()
}

fn lineage_root(dataset_key: &str, version_label: &str) -> LineageRoot {
    LineageRoot::v1(
        derive_lineage_root_id(dataset_key, version_label),
        dataset_key,
        version_label,
        json!({"loaded_by": "ingest"}),
        t(0),
    )
    .unwrap()
}

fn source_record(root: &RecordId, key: &str) -> SourceRecord {
    SourceRecord::v1(
        derive_source_record_id(root, "hris", key),
        root.clone(),
        "hris",
        key,
        json!({"employee": key, "gross": 4200}),
        t(1),
        None,
    )
    .unwrap()
}

#[test]
fn at_lin_db_01_lineage_root_id_is_derived_and_idempotent() {
    let mut s = LedgerStore::new_in_memory();
    let root = lineage_root("payroll", "2026-03");
    assert_eq!(root.id, derive_lineage_root_id("payroll", "2026-03"));

    let mut txn = s.begin();
    assert!(txn.insert_or_verify_lineage_root_row(root.clone()).unwrap().1);
    txn.commit().unwrap();

    let mut txn = s.begin();
    assert!(!txn.insert_or_verify_lineage_root_row(root.clone()).unwrap().1);
    let mut changed = root;
    changed.payload = json!({"loaded_by": "someone_else"});
    let err = txn.insert_or_verify_lineage_root_row(changed).unwrap_err();
    assert_eq!(err.code(), "PAYLOAD_MISMATCH");
}

#[test]
fn at_lin_db_02_source_record_requires_its_lineage_root() {
    let mut s = LedgerStore::new_in_memory();
    let root = derive_lineage_root_id("payroll", "2026-03");

    let mut txn = s.begin();
    let err = txn
        .insert_or_verify_source_record_row(source_record(&root, "emp-1"))
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::ForeignKeyViolation { table: "lineage_roots", .. }
    ));

    // Same transaction: a root staged first satisfies the reference.
    txn.insert_or_verify_lineage_root_row(lineage_root("payroll", "2026-03"))
        .unwrap();
    assert!(txn
        .insert_or_verify_source_record_row(source_record(&root, "emp-1"))
        .unwrap()
        .1);
    let receipt = txn.commit().unwrap();
    assert_eq!(receipt.inserted, 2);
}

#[test]
fn at_lin_db_03_derived_fact_and_finding_need_a_source_under_the_same_root() {
    let mut s = LedgerStore::new_in_memory();
    let l1 = lineage_root("payroll", "2026-03");
    let l2 = lineage_root("payroll", "2026-04");
    let src = source_record(&l1.id, "emp-1");

    let mut txn = s.begin();
    txn.insert_or_verify_lineage_root_row(l1.clone()).unwrap();
    txn.insert_or_verify_lineage_root_row(l2.clone()).unwrap();
    txn.insert_or_verify_source_record_row(src.clone()).unwrap();

    let fact = DerivedFact::v1(
        derive_derived_fact_id("tax_engine", &l1.id, &src.id, "taxable_income"),
        l1.id.clone(),
        src.id.clone(),
        "tax_engine",
        "taxable_income",
        json!({"amount": 3900}),
        t(2),
    )
    .unwrap();
    assert!(txn.insert_or_verify_derived_fact_row(fact).unwrap().1);

    let cross_lineage = Finding::v1(
        derive_finding_id("tax_engine", &l2.id, "underpayment", "emp-1"),
        l2.id.clone(),
        src.id.clone(),
        "tax_engine",
        "underpayment",
        json!({"delta": 12}),
        t(3),
    )
    .unwrap();
    let err = txn.insert_or_verify_finding_row(cross_lineage).unwrap_err();
    assert!(matches!(
        err,
        StorageError::ForeignKeyViolation { table: "source_records", .. }
    ));
    txn.commit().unwrap();

    assert_eq!(s.row_count::<DerivedFact>(), 1);
    assert_eq!(s.row_count::<Finding>(), 0);
}

#[test]
fn at_lin_db_04_checksum_backfill_sets_once_and_survives_replay() {
    let mut s = LedgerStore::new_in_memory();
    let root = lineage_root("payroll", "2026-03");
    let src = source_record(&root.id, "emp-1");

    let mut txn = s.begin();
    txn.insert_or_verify_lineage_root_row(root).unwrap();
    txn.insert_or_verify_source_record_row(src.clone()).unwrap();
    txn.commit().unwrap();

    let mut txn = s.begin();
    let filled = backfill_source_checksum_from_payload(&mut txn, &src.id).unwrap();
    let expected = payload_checksum_hex(&src.payload);
    assert_eq!(filled.checksum.as_deref(), Some(expected.as_str()));
    let receipt = txn.commit().unwrap();
    assert_eq!(receipt.updated, 1);

    // Setting the same value again stages nothing.
    let mut txn = s.begin();
    txn.backfill_source_checksum_row(&src.id, expected.clone())
        .unwrap();
    assert!(txn.writes().is_empty());

    // Replaying the original pre-backfill write is still a no-op.
    let (stored, was_new) = txn.insert_or_verify_source_record_row(src.clone()).unwrap();
    assert!(!was_new);
    assert_eq!(stored.checksum.as_deref(), Some(expected.as_str()));
    txn.commit().unwrap();
}

#[test]
fn at_lin_db_05_backfill_of_unknown_source_is_rejected() {
    let mut s = LedgerStore::new_in_memory();
    let missing = RecordId::new("src-missing").unwrap();

    let mut txn = s.begin();
    let err = txn
        .backfill_source_checksum_row(&missing, "0".repeat(64))
        .unwrap_err();
    assert!(matches!(
        err,
        StorageError::ForeignKeyViolation { table: "source_records", .. }
    ));
}

#[test]
fn at_lin_db_06_malformed_checksum_is_a_contract_violation() {
    let mut s = LedgerStore::new_in_memory();
    let root = lineage_root("payroll", "2026-03");
    let src = source_record(&root.id, "emp-1");

    let mut txn = s.begin();
    txn.insert_or_verify_lineage_root_row(root).unwrap();
    txn.insert_or_verify_source_record_row(src.clone()).unwrap();
    txn.commit().unwrap();

    let mut txn = s.begin();
    let err = txn
        .backfill_source_checksum_row(&src.id, "NOT-HEX".to_string())
        .unwrap_err();
    assert_eq!(err.code(), "CONTRACT_VIOLATION");
    assert!(txn.writes().is_empty());
}
