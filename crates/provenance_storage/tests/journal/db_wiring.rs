#![forbid(unsafe_code)]

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, TimeZone, Utc};
use provenance_contracts::identity::derive_evidence_id;
use provenance_contracts::ledger::{Evidence, LedgerEntity, LineageRoot, SourceRecord};
use provenance_contracts::RecordId;
use provenance_storage::journal::CommitJournal;
use provenance_storage::repo::{EvidenceLedgerRepo, LineageLedgerRepo};
use provenance_storage::{ErrorClass, LedgerConfig, LedgerStore, StagedWrite, StorageError};
use serde_json::json;

fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 0, 0).unwrap()
}

fn rid(s: &str) -> RecordId {
    RecordId::new(s).unwrap()
}

fn journal_path(test: &str) -> PathBuf {
    let path = std::env::temp_dir()
        .join(format!("provenance_ledger_{}", std::process::id()))
        .join(format!("{test}.jsonl"));
    let _ = fs::remove_file(&path);
    path
}

fn open(path: &Path) -> Result<LedgerStore, StorageError> {
    LedgerStore::open(LedgerConfig::default().with_journal(path))
}

fn evidence(root: &RecordId, key: &str, payload: serde_json::Value) -> Evidence {
    Evidence::v1(
        derive_evidence_id("kpi_engine", root, "metric", key),
        root.clone(),
        "kpi_engine",
        "metric",
        payload,
        t0(),
    )
    .unwrap()
}

fn source(root: &RecordId) -> SourceRecord {
    SourceRecord::v1(
        rid("src-1"),
        root.clone(),
        "warehouse",
        "table/orders",
        json!({"rows": 1000}),
        t0(),
        None,
    )
    .unwrap()
}

/// Writes root + source in commit 1 and one evidence row in commit 2.
fn seed(path: &Path) -> (RecordId, Evidence) {
    let mut s = open(path).unwrap();
    let root = rid("dv-1");
    let e1 = evidence(&root, "e1", json!({"v": 1}));

    let mut txn = s.begin();
    txn.insert_or_verify_lineage_root_row(
        LineageRoot::v1(root.clone(), "orders", "dv-1", json!({}), t0()).unwrap(),
    )
    .unwrap();
    txn.insert_or_verify_source_record_row(source(&root)).unwrap();
    assert_eq!(txn.commit().unwrap().commit_seq, 1);

    let mut txn = s.begin();
    txn.insert_or_verify_evidence_row(e1.clone()).unwrap();
    assert_eq!(txn.commit().unwrap().commit_seq, 2);
    (root, e1)
}

#[test]
fn at_journal_db_01_reopen_restores_rows_and_replay_stays_a_no_op() {
    let path = journal_path("reopen");
    let (root, e1) = seed(&path);

    let mut s = open(&path).unwrap();
    assert_eq!(s.row_count::<LineageRoot>(), 1);
    assert_eq!(s.row_count::<SourceRecord>(), 1);
    assert_eq!(s.get::<Evidence>(&e1.id), Some(&e1));

    // Crash-restart recompute: identical write, nothing new, no journal line.
    let mut txn = s.begin();
    let (_, was_new) = txn
        .insert_or_verify_evidence_row(evidence(&root, "e1", json!({"v": 1})))
        .unwrap();
    assert!(!was_new);
    txn.commit().unwrap();
    let entries = CommitJournal::open(&path).unwrap().read_entries().unwrap();
    assert_eq!(entries.len(), 2);

    // Sequence numbers carry on past the replayed commits.
    let mut txn = s.begin();
    txn.insert_or_verify_evidence_row(evidence(&root, "e2", json!({"v": 2})))
        .unwrap();
    assert_eq!(txn.commit().unwrap().commit_seq, 4);

    let _ = fs::remove_file(&path);
}

#[test]
fn at_journal_db_02_conflicting_write_after_restart_still_conflicts() {
    let path = journal_path("conflict");
    let (root, e1) = seed(&path);

    let mut s = open(&path).unwrap();
    let mut txn = s.begin();
    let err = txn
        .insert_or_verify_evidence_row(evidence(&root, "e1", json!({"v": 99})))
        .unwrap_err();
    assert_eq!(err.code(), "PAYLOAD_MISMATCH");
    drop(txn);
    assert_eq!(s.get::<Evidence>(&e1.id).unwrap().payload, json!({"v": 1}));

    let _ = fs::remove_file(&path);
}

#[test]
fn at_journal_db_03_checksum_backfill_survives_restart() {
    let path = journal_path("backfill");
    let (root, _) = seed(&path);
    let checksum = "ab".repeat(32);

    {
        let mut s = open(&path).unwrap();
        let mut txn = s.begin();
        txn.backfill_source_checksum_row(&source(&root).id, checksum.clone())
            .unwrap();
        assert_eq!(txn.commit().unwrap().updated, 1);
    }

    let s = open(&path).unwrap();
    assert_eq!(
        s.get::<SourceRecord>(&rid("src-1")).unwrap().checksum,
        Some(checksum)
    );

    let _ = fs::remove_file(&path);
}

#[test]
fn at_journal_db_04_contradictory_journal_fails_loudly_on_open() {
    let path = journal_path("contradiction");
    let (root, _) = seed(&path);

    let journal = CommitJournal::open(&path).unwrap();
    let forged = evidence(&root, "e1", json!({"v": 2}));
    journal
        .append(3, &[StagedWrite::Insert(forged.into_row())])
        .unwrap();

    let err = open(&path).unwrap_err();
    assert_eq!(err.code(), "PAYLOAD_MISMATCH");

    let _ = fs::remove_file(&path);
}

#[test]
fn at_journal_db_05_unreadable_line_is_an_io_error() {
    let path = journal_path("corrupt");
    seed(&path);

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"{not json\n").unwrap();
    drop(file);

    let err = open(&path).unwrap_err();
    assert_eq!(err.code(), "JOURNAL_IO");
    assert_eq!(err.class(), ErrorClass::Io);
    assert!(err.to_string().contains("line 3"));

    let _ = fs::remove_file(&path);
}

#[test]
fn at_journal_db_06_guard_rejections_never_reach_the_journal() {
    let path = journal_path("rejected");
    let (_, e1) = seed(&path);

    let mut s = open(&path).unwrap();
    let mut txn = s.begin();
    txn.stage_delete::<Evidence>(e1.id.clone());
    assert_eq!(txn.commit().unwrap_err().code(), "IMMUTABLE_DELETE");

    let entries = CommitJournal::open(&path).unwrap().read_entries().unwrap();
    assert_eq!(entries.len(), 2);
    assert!(entries
        .iter()
        .flat_map(|e| e.writes.iter())
        .all(|w| matches!(w, StagedWrite::Insert(_))));

    let _ = fs::remove_file(&path);
}

#[test]
fn at_journal_db_07_unterminated_last_line_is_dropped_on_open() {
    let path = journal_path("torn_tail");
    let (root, e1) = seed(&path);

    let mut file = OpenOptions::new().append(true).open(&path).unwrap();
    file.write_all(b"{\"schema_version\":1,\"commit_seq\":3,\"wri").unwrap();
    drop(file);

    let mut s = open(&path).unwrap();
    assert_eq!(s.get::<Evidence>(&e1.id), Some(&e1));
    assert!(fs::read_to_string(&path).unwrap().ends_with('\n'));

    // The next commit lands on a clean line and survives another reopen.
    let mut txn = s.begin();
    let (e2, _) = txn
        .insert_or_verify_evidence_row(evidence(&root, "e2", json!({"v": 2})))
        .unwrap();
    assert_eq!(txn.commit().unwrap().commit_seq, 3);
    drop(s);

    let s = open(&path).unwrap();
    assert_eq!(s.get::<Evidence>(&e2.id), Some(&e2));
    assert_eq!(CommitJournal::open(&path).unwrap().read_entries().unwrap().len(), 3);

    let _ = fs::remove_file(&path);
}
