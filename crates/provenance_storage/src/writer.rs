#![forbid(unsafe_code)]

//! Insert-or-verify writes.
//!
//! A candidate arrives with its id already derived. Absent → staged insert.
//! Present and identical → the stored row comes back with `was_new = false`.
//! Present and different → a conflict, and nothing is staged.

use chrono::{DateTime, TimeZone};
use provenance_contracts::identity::derive_link_id;
use provenance_contracts::ledger::{
    EntityKind, FindingEvidenceLink, LedgerEntity, LedgerRow, SourceRecord,
};
use provenance_contracts::payload::payload_checksum_hex;
use provenance_contracts::{RecordId, Validate};
use tracing::{debug, error};

use crate::error::StorageError;
use crate::ledger::{LedgerTxn, StagedWrite, StoredEntity};

fn conflict_root<T: LedgerEntity>(record: &T) -> RecordId {
    record
        .lineage_root_id()
        .unwrap_or_else(|| record.record_id())
        .clone()
}

/// Default comparison: a difference in any identity field is a collision,
/// otherwise a payload mismatch. A sanctioned field the candidate leaves unset
/// is ignored, so replaying an original write after a backfill stays a no-op.
pub fn verify_identical<T: LedgerEntity>(existing: &T, candidate: &T) -> Result<(), StorageError> {
    let sanctioned = T::KIND.sanctioned_fields();
    let changed: Vec<&'static str> = existing
        .changed_fields(candidate)
        .into_iter()
        .filter(|f| !(sanctioned.contains(f) && candidate.field_is_unset(f)))
        .collect();
    if changed.is_empty() {
        return Ok(());
    }

    let table = T::KIND.table();
    let id = candidate.record_id().clone();
    let lineage_root_id = conflict_root(candidate);
    if changed.iter().any(|f| T::IDENTITY_FIELDS.contains(f)) {
        error!(
            table,
            id = %id,
            lineage_root = %lineage_root_id,
            fields = ?changed,
            "IDENTIFIER_COLLISION: identity inputs differ under one derived id"
        );
        return Err(StorageError::IdentifierCollision {
            table,
            id,
            lineage_root_id,
            fields: changed,
        });
    }
    error!(
        table,
        id = %id,
        lineage_root = %lineage_root_id,
        fields = ?changed,
        "PAYLOAD_MISMATCH: recomputation produced a different record"
    );
    Err(StorageError::PayloadMismatch {
        table,
        id,
        lineage_root_id,
        fields: changed,
    })
}

/// Link comparison: only the lineage root and the (finding, evidence) pair
/// count. A replay at a later wall-clock time is still the same link.
pub fn verify_same_link(
    existing: &FindingEvidenceLink,
    candidate: &FindingEvidenceLink,
) -> Result<(), StorageError> {
    if existing.lineage_root_id == candidate.lineage_root_id
        && existing.finding_id == candidate.finding_id
        && existing.evidence_id == candidate.evidence_id
    {
        return Ok(());
    }
    error!(
        id = %candidate.id,
        lineage_root = %candidate.lineage_root_id,
        stored_finding = %existing.finding_id,
        stored_evidence = %existing.evidence_id,
        finding = %candidate.finding_id,
        evidence = %candidate.evidence_id,
        "LINK_MISMATCH"
    );
    Err(StorageError::LinkMismatch {
        id: candidate.id.clone(),
        lineage_root_id: candidate.lineage_root_id.clone(),
        stored_finding_id: existing.finding_id.clone(),
        stored_evidence_id: existing.evidence_id.clone(),
        finding_id: candidate.finding_id.clone(),
        evidence_id: candidate.evidence_id.clone(),
    })
}

/// The one insert-or-verify implementation, parameterized by the comparison.
pub fn insert_or_verify_with<T, F>(
    txn: &mut LedgerTxn<'_>,
    candidate: T,
    verify: F,
) -> Result<(T, bool), StorageError>
where
    T: StoredEntity,
    F: FnOnce(&T, &T) -> Result<(), StorageError>,
{
    candidate.validate()?;
    if let Some(existing) = txn.get::<T>(candidate.record_id()) {
        verify(existing, &candidate)?;
        debug!(
            table = T::KIND.table(),
            id = %candidate.record_id(),
            "insert-or-verify matched stored row"
        );
        return Ok((existing.clone(), false));
    }
    candidate.check_references(txn)?;
    txn.stage_insert(candidate.clone());
    Ok((candidate, true))
}

/// Insert-or-verify with the table's own comparison: links compare by pair,
/// every other table by [`verify_identical`].
pub fn insert_or_verify<T: StoredEntity>(
    txn: &mut LedgerTxn<'_>,
    candidate: T,
) -> Result<(T, bool), StorageError> {
    insert_or_verify_with(txn, candidate, T::verify_stored)
}

/// Writes the link for `(finding, evidence)` under `lineage_root_id`, deriving
/// its id from the triple.
pub fn link_finding_evidence<Tz: TimeZone>(
    txn: &mut LedgerTxn<'_>,
    lineage_root_id: &RecordId,
    finding_id: &RecordId,
    evidence_id: &RecordId,
    created_at: DateTime<Tz>,
) -> Result<(FindingEvidenceLink, bool), StorageError> {
    let link = FindingEvidenceLink::v1(
        derive_link_id(lineage_root_id, finding_id, evidence_id),
        lineage_root_id.clone(),
        finding_id.clone(),
        evidence_id.clone(),
        created_at,
    )?;
    insert_or_verify_with(txn, link, verify_same_link)
}

/// The one sanctioned mutation: sets a source record's checksum if it was
/// never set. Setting the same value again is a no-op; any other value is
/// staged and then rejected by the mutation guard at commit.
pub fn backfill_source_checksum(
    txn: &mut LedgerTxn<'_>,
    source_record_id: &RecordId,
    checksum: String,
) -> Result<SourceRecord, StorageError> {
    let existing = txn.get::<SourceRecord>(source_record_id).cloned().ok_or_else(|| {
        StorageError::ForeignKeyViolation {
            table: EntityKind::SourceRecord.table(),
            key: source_record_id.to_string(),
        }
    })?;
    if existing.checksum.as_deref() == Some(checksum.as_str()) {
        return Ok(existing);
    }
    let mut updated = existing;
    updated.checksum = Some(checksum);
    updated.validate()?;
    txn.stage_update(updated.clone());
    Ok(updated)
}

/// Backfills the checksum computed from the stored payload.
pub fn backfill_source_checksum_from_payload(
    txn: &mut LedgerTxn<'_>,
    source_record_id: &RecordId,
) -> Result<SourceRecord, StorageError> {
    let checksum = txn
        .get::<SourceRecord>(source_record_id)
        .map(|s| payload_checksum_hex(&s.payload))
        .ok_or_else(|| StorageError::ForeignKeyViolation {
            table: EntityKind::SourceRecord.table(),
            key: source_record_id.to_string(),
        })?;
    backfill_source_checksum(txn, source_record_id, checksum)
}

/// Re-applies a journaled write. Inserts go back through insert-or-verify, so
/// a journal that contradicts rows already present fails loudly.
pub(crate) fn replay_write(txn: &mut LedgerTxn<'_>, write: StagedWrite) -> Result<(), StorageError> {
    match write {
        StagedWrite::Insert(row) => {
            match row {
                LedgerRow::LineageRoot(r) => insert_or_verify(txn, r).map(drop)?,
                LedgerRow::SourceRecord(r) => insert_or_verify(txn, r).map(drop)?,
                LedgerRow::DerivedFact(r) => insert_or_verify(txn, r).map(drop)?,
                LedgerRow::Finding(r) => insert_or_verify(txn, r).map(drop)?,
                LedgerRow::Evidence(r) => insert_or_verify(txn, r).map(drop)?,
                LedgerRow::FindingEvidenceLink(r) => insert_or_verify(txn, r).map(drop)?,
                LedgerRow::ProvenanceArtifact(r) => insert_or_verify(txn, r).map(drop)?,
            }
            Ok(())
        }
        other => {
            txn.stage(other);
            Ok(())
        }
    }
}
