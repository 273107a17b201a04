#![forbid(unsafe_code)]

use provenance_contracts::ledger::{EntityKind, Evidence, Finding};
use provenance_contracts::RecordId;
use serde::Serialize;

use crate::error::StorageError;
use crate::ledger::LedgerStore;

/// A record found under another lineage than the one it was queried under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineageMismatch {
    pub id: RecordId,
    pub table: &'static str,
    pub expected_lineage_root_id: RecordId,
    pub actual_lineage_root_id: RecordId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TraceabilityReport {
    pub lineage_root_id: RecordId,
    pub valid: bool,
    pub checked: usize,
    pub mismatches: Vec<LineageMismatch>,
    pub missing: Vec<RecordId>,
}

impl TraceabilityReport {
    /// Hard-fail reading of a soft report.
    pub fn into_strict(self) -> Result<Self, StorageError> {
        if !self.missing.is_empty() {
            return Err(StorageError::MissingEvidence {
                lineage_root_id: self.lineage_root_id,
                ids: self.missing,
            });
        }
        if !self.mismatches.is_empty() {
            return Err(StorageError::LineageMismatch {
                lineage_root_id: self.lineage_root_id,
                mismatches: self.mismatches,
            });
        }
        Ok(self)
    }
}

enum Traced<'a> {
    Evidence(&'a Evidence),
    Finding(&'a Finding),
}

impl Traced<'_> {
    fn lineage_root_id(&self) -> &RecordId {
        match self {
            Traced::Evidence(e) => &e.lineage_root_id,
            Traced::Finding(f) => &f.lineage_root_id,
        }
    }

    fn table(&self) -> &'static str {
        match self {
            Traced::Evidence(_) => EntityKind::Evidence.table(),
            Traced::Finding(_) => EntityKind::Finding.table(),
        }
    }
}

impl LedgerStore {
    fn trace(&self, id: &RecordId) -> Option<Traced<'_>> {
        if let Some(e) = self.get::<Evidence>(id) {
            return Some(Traced::Evidence(e));
        }
        self.get::<Finding>(id).map(Traced::Finding)
    }

    fn trace_ids(
        &self,
        lineage_root_id: &RecordId,
        ids: &[RecordId],
    ) -> (usize, Vec<LineageMismatch>, Vec<RecordId>) {
        let mut checked = 0;
        let mut mismatches = Vec::new();
        let mut missing = Vec::new();
        for id in ids {
            match self.trace(id) {
                None => missing.push(id.clone()),
                Some(traced) => {
                    checked += 1;
                    if traced.lineage_root_id() != lineage_root_id {
                        mismatches.push(LineageMismatch {
                            id: id.clone(),
                            table: traced.table(),
                            expected_lineage_root_id: lineage_root_id.clone(),
                            actual_lineage_root_id: traced.lineage_root_id().clone(),
                        });
                    }
                }
            }
        }
        (checked, mismatches, missing)
    }

    /// Checks that `ids` (evidence or findings) all trace to `lineage_root_id`.
    ///
    /// Without ids, every evidence row scoped to the root is counted and the
    /// report is trivially valid. Unknown ids raise `MISSING_EVIDENCE` before
    /// any lineage comparison; lineage mismatches are reported, not raised.
    pub fn verify_traceability(
        &self,
        lineage_root_id: &RecordId,
        ids: Option<&[RecordId]>,
    ) -> Result<TraceabilityReport, StorageError> {
        let Some(ids) = ids else {
            let checked = self
                .rows::<Evidence>()
                .filter(|e| &e.lineage_root_id == lineage_root_id)
                .count();
            return Ok(TraceabilityReport {
                lineage_root_id: lineage_root_id.clone(),
                valid: true,
                checked,
                mismatches: Vec::new(),
                missing: Vec::new(),
            });
        };

        let missing: Vec<RecordId> = ids
            .iter()
            .filter(|id| self.trace(id).is_none())
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(StorageError::MissingEvidence {
                lineage_root_id: lineage_root_id.clone(),
                ids: missing,
            });
        }
        Ok(self.verify_traceability_soft(lineage_root_id, ids))
    }

    /// Like [`LedgerStore::verify_traceability`] but unknown ids land in
    /// `missing` instead of raising.
    pub fn verify_traceability_soft(
        &self,
        lineage_root_id: &RecordId,
        ids: &[RecordId],
    ) -> TraceabilityReport {
        let (checked, mismatches, missing) = self.trace_ids(lineage_root_id, ids);
        TraceabilityReport {
            lineage_root_id: lineage_root_id.clone(),
            valid: mismatches.is_empty() && missing.is_empty(),
            checked,
            mismatches,
            missing,
        }
    }

    /// Evidence rows by id, in request order. Raises on any unknown id, then on
    /// any row scoped to another lineage.
    pub fn evidence_by_ids(
        &self,
        ids: &[RecordId],
        lineage_root_id: &RecordId,
    ) -> Result<Vec<&Evidence>, StorageError> {
        let mut found = Vec::with_capacity(ids.len());
        let mut missing = Vec::new();
        for id in ids {
            match self.get::<Evidence>(id) {
                Some(e) => found.push(e),
                None => missing.push(id.clone()),
            }
        }
        if !missing.is_empty() {
            return Err(StorageError::MissingEvidence {
                lineage_root_id: lineage_root_id.clone(),
                ids: missing,
            });
        }
        let mismatches: Vec<LineageMismatch> = found
            .iter()
            .filter(|e| &e.lineage_root_id != lineage_root_id)
            .map(|e| LineageMismatch {
                id: e.id.clone(),
                table: EntityKind::Evidence.table(),
                expected_lineage_root_id: lineage_root_id.clone(),
                actual_lineage_root_id: e.lineage_root_id.clone(),
            })
            .collect();
        if !mismatches.is_empty() {
            return Err(StorageError::LineageMismatch {
                lineage_root_id: lineage_root_id.clone(),
                mismatches,
            });
        }
        Ok(found)
    }
}
