#![forbid(unsafe_code)]

//! Typed repository interfaces over the provenance ledger.
//!
//! The write traits expose insert-or-verify and nothing else: there is no
//! update or delete method on any protected table. The single sanctioned
//! backfill is its own narrowly named operation.

use std::collections::BTreeMap;

use provenance_contracts::ledger::{
    DerivedFact, Evidence, Finding, FindingEvidenceLink, LineageRoot, ProvenanceArtifact,
    SourceRecord,
};
use provenance_contracts::RecordId;

use crate::aggregate::LineageSummary;
use crate::error::StorageError;
use crate::ledger::{LedgerStore, LedgerTxn};
use crate::trace::TraceabilityReport;
use crate::writer;

/// Typed repository interface for lineage roots, source records and derived
/// facts.
pub trait LineageLedgerRepo {
    fn insert_or_verify_lineage_root_row(
        &mut self,
        row: LineageRoot,
    ) -> Result<(LineageRoot, bool), StorageError>;
    fn insert_or_verify_source_record_row(
        &mut self,
        row: SourceRecord,
    ) -> Result<(SourceRecord, bool), StorageError>;
    fn insert_or_verify_derived_fact_row(
        &mut self,
        row: DerivedFact,
    ) -> Result<(DerivedFact, bool), StorageError>;
    fn backfill_source_checksum_row(
        &mut self,
        source_record_id: &RecordId,
        checksum: String,
    ) -> Result<SourceRecord, StorageError>;
}

/// Typed repository interface for evidence and process-level artifacts.
pub trait EvidenceLedgerRepo {
    fn insert_or_verify_evidence_row(
        &mut self,
        row: Evidence,
    ) -> Result<(Evidence, bool), StorageError>;
    fn insert_or_verify_artifact_row(
        &mut self,
        row: ProvenanceArtifact,
    ) -> Result<(ProvenanceArtifact, bool), StorageError>;
}

/// Typed repository interface for findings and their evidence links.
pub trait FindingLedgerRepo {
    fn insert_or_verify_finding_row(
        &mut self,
        row: Finding,
    ) -> Result<(Finding, bool), StorageError>;
    fn link_finding_evidence_row(
        &mut self,
        lineage_root_id: &RecordId,
        finding_id: &RecordId,
        evidence_id: &RecordId,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(FindingEvidenceLink, bool), StorageError>;
}

/// Typed read interface for reporting layers.
pub trait TraceabilityRepo {
    fn evidence_by_lineage_rows(
        &self,
        lineage_root_id: &RecordId,
        producing_engine_id: Option<&str>,
        kind: Option<&str>,
    ) -> Vec<&Evidence>;
    fn evidence_by_ids_rows(
        &self,
        ids: &[RecordId],
        lineage_root_id: &RecordId,
    ) -> Result<Vec<&Evidence>, StorageError>;
    fn findings_evidence_rows(
        &self,
        finding_ids: &[RecordId],
        lineage_root_id: &RecordId,
    ) -> Result<BTreeMap<RecordId, Vec<&Evidence>>, StorageError>;
    fn verify_traceability_row(
        &self,
        lineage_root_id: &RecordId,
        ids: Option<&[RecordId]>,
    ) -> Result<TraceabilityReport, StorageError>;
    fn lineage_summary_row(&self, lineage_root_id: &RecordId) -> LineageSummary;
}

impl LineageLedgerRepo for LedgerTxn<'_> {
    fn insert_or_verify_lineage_root_row(
        &mut self,
        row: LineageRoot,
    ) -> Result<(LineageRoot, bool), StorageError> {
        writer::insert_or_verify(self, row)
    }

    fn insert_or_verify_source_record_row(
        &mut self,
        row: SourceRecord,
    ) -> Result<(SourceRecord, bool), StorageError> {
        writer::insert_or_verify(self, row)
    }

    fn insert_or_verify_derived_fact_row(
        &mut self,
        row: DerivedFact,
    ) -> Result<(DerivedFact, bool), StorageError> {
        writer::insert_or_verify(self, row)
    }

    fn backfill_source_checksum_row(
        &mut self,
        source_record_id: &RecordId,
        checksum: String,
    ) -> Result<SourceRecord, StorageError> {
        writer::backfill_source_checksum(self, source_record_id, checksum)
    }
}

impl EvidenceLedgerRepo for LedgerTxn<'_> {
    fn insert_or_verify_evidence_row(
        &mut self,
        row: Evidence,
    ) -> Result<(Evidence, bool), StorageError> {
        writer::insert_or_verify(self, row)
    }

    fn insert_or_verify_artifact_row(
        &mut self,
        row: ProvenanceArtifact,
    ) -> Result<(ProvenanceArtifact, bool), StorageError> {
        writer::insert_or_verify(self, row)
    }
}

impl FindingLedgerRepo for LedgerTxn<'_> {
    fn insert_or_verify_finding_row(
        &mut self,
        row: Finding,
    ) -> Result<(Finding, bool), StorageError> {
        writer::insert_or_verify(self, row)
    }

    fn link_finding_evidence_row(
        &mut self,
        lineage_root_id: &RecordId,
        finding_id: &RecordId,
        evidence_id: &RecordId,
        created_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(FindingEvidenceLink, bool), StorageError> {
        writer::link_finding_evidence(self, lineage_root_id, finding_id, evidence_id, created_at)
    }
}

impl TraceabilityRepo for LedgerStore {
    fn evidence_by_lineage_rows(
        &self,
        lineage_root_id: &RecordId,
        producing_engine_id: Option<&str>,
        kind: Option<&str>,
    ) -> Vec<&Evidence> {
        self.evidence_by_lineage(lineage_root_id, producing_engine_id, kind)
    }

    fn evidence_by_ids_rows(
        &self,
        ids: &[RecordId],
        lineage_root_id: &RecordId,
    ) -> Result<Vec<&Evidence>, StorageError> {
        self.evidence_by_ids(ids, lineage_root_id)
    }

    fn findings_evidence_rows(
        &self,
        finding_ids: &[RecordId],
        lineage_root_id: &RecordId,
    ) -> Result<BTreeMap<RecordId, Vec<&Evidence>>, StorageError> {
        self.findings_evidence(finding_ids, lineage_root_id)
    }

    fn verify_traceability_row(
        &self,
        lineage_root_id: &RecordId,
        ids: Option<&[RecordId]>,
    ) -> Result<TraceabilityReport, StorageError> {
        self.verify_traceability(lineage_root_id, ids)
    }

    fn lineage_summary_row(&self, lineage_root_id: &RecordId) -> LineageSummary {
        self.lineage_summary(lineage_root_id)
    }
}
