#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, TimeZone, Utc};
use provenance_contracts::ledger::{
    DerivedFact, EntityKind, Evidence, Finding, FindingEvidenceLink, LedgerEntity,
    LineageRoot, ProvenanceArtifact, SourceRecord,
};
use provenance_contracts::RecordId;
use serde::Serialize;

use crate::error::StorageError;
use crate::ledger::{LedgerStore, StoredEntity};
use crate::trace::LineageMismatch;

/// Read-side rollup of one lineage root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LineageSummary {
    pub lineage_root_id: RecordId,
    pub root_present: bool,
    pub source_records: usize,
    pub derived_facts: usize,
    pub findings: usize,
    pub evidence: usize,
    pub links: usize,
    pub artifacts: usize,
    pub evidence_by_kind: BTreeMap<String, usize>,
    pub evidence_by_engine: BTreeMap<String, usize>,
    pub findings_by_kind: BTreeMap<String, usize>,
    pub findings_by_engine: BTreeMap<String, usize>,
    pub artifacts_by_class: BTreeMap<&'static str, usize>,
    /// Earliest and latest `created_at` over evidence and findings.
    pub earliest: Option<DateTime<Utc>>,
    pub latest: Option<DateTime<Utc>>,
}

impl LineageSummary {
    fn widen(&mut self, at: DateTime<Utc>) {
        self.earliest = Some(self.earliest.map_or(at, |e| e.min(at)));
        self.latest = Some(self.latest.map_or(at, |l| l.max(at)));
    }
}

fn created_then_id<T: LedgerEntity>(a: &&T, b: &&T) -> std::cmp::Ordering {
    a.created_at()
        .cmp(&b.created_at())
        .then_with(|| a.record_id().cmp(b.record_id()))
}

fn bump(map: &mut BTreeMap<String, usize>, key: &str) {
    *map.entry(key.to_string()).or_insert(0) += 1;
}

impl LedgerStore {
    fn scoped<'a, T: StoredEntity + 'a>(
        &'a self,
        lineage_root_id: &RecordId,
    ) -> impl Iterator<Item = &'a T> {
        let root = lineage_root_id.clone();
        self.rows::<T>()
            .filter(move |r| r.lineage_root_id() == Some(&root))
    }

    /// Evidence under `lineage_root_id`, optionally narrowed by producing
    /// engine and kind, ordered by `created_at` then id. An unknown or empty
    /// lineage yields an empty list.
    pub fn evidence_by_lineage(
        &self,
        lineage_root_id: &RecordId,
        producing_engine_id: Option<&str>,
        kind: Option<&str>,
    ) -> Vec<&Evidence> {
        let mut out: Vec<&Evidence> = self
            .scoped::<Evidence>(lineage_root_id)
            .filter(|e| producing_engine_id.map_or(true, |p| e.producing_engine_id == p))
            .filter(|e| kind.map_or(true, |k| e.kind == k))
            .collect();
        out.sort_by(created_then_id);
        out
    }

    pub fn findings_by_lineage(
        &self,
        lineage_root_id: &RecordId,
        producing_engine_id: Option<&str>,
        kind: Option<&str>,
    ) -> Vec<&Finding> {
        let mut out: Vec<&Finding> = self
            .scoped::<Finding>(lineage_root_id)
            .filter(|f| producing_engine_id.map_or(true, |p| f.producing_engine_id == p))
            .filter(|f| kind.map_or(true, |k| f.kind == k))
            .collect();
        out.sort_by(created_then_id);
        out
    }

    /// Evidence with `from <= created_at < to`, in the same order as
    /// [`LedgerStore::evidence_by_lineage`].
    pub fn evidence_in_window<Tz: TimeZone>(
        &self,
        lineage_root_id: &RecordId,
        from: DateTime<Tz>,
        to: DateTime<Tz>,
    ) -> Vec<&Evidence> {
        let from = from.with_timezone(&Utc);
        let to = to.with_timezone(&Utc);
        let mut out: Vec<&Evidence> = self
            .scoped::<Evidence>(lineage_root_id)
            .filter(|e| e.created_at >= from && e.created_at < to)
            .collect();
        out.sort_by(created_then_id);
        out
    }

    /// Finding → evidence join. Every requested finding gets an entry, empty
    /// when it has no links. Links are resolved in one pass over the link
    /// table regardless of how many findings are requested.
    pub fn findings_evidence(
        &self,
        finding_ids: &[RecordId],
        lineage_root_id: &RecordId,
    ) -> Result<BTreeMap<RecordId, Vec<&Evidence>>, StorageError> {
        let mut missing = Vec::new();
        let mut mismatches = Vec::new();
        for id in finding_ids {
            match self.get::<Finding>(id) {
                None => missing.push(id.clone()),
                Some(f) if &f.lineage_root_id != lineage_root_id => {
                    mismatches.push(LineageMismatch {
                        id: id.clone(),
                        table: EntityKind::Finding.table(),
                        expected_lineage_root_id: lineage_root_id.clone(),
                        actual_lineage_root_id: f.lineage_root_id.clone(),
                    })
                }
                Some(_) => {}
            }
        }
        if !missing.is_empty() {
            return Err(StorageError::MissingEvidence {
                lineage_root_id: lineage_root_id.clone(),
                ids: missing,
            });
        }
        if !mismatches.is_empty() {
            return Err(StorageError::LineageMismatch {
                lineage_root_id: lineage_root_id.clone(),
                mismatches,
            });
        }

        let wanted: BTreeSet<&RecordId> = finding_ids.iter().collect();
        let mut out: BTreeMap<RecordId, Vec<&Evidence>> = finding_ids
            .iter()
            .map(|id| (id.clone(), Vec::new()))
            .collect();
        for link in self.scoped::<FindingEvidenceLink>(lineage_root_id) {
            if !wanted.contains(&link.finding_id) {
                continue;
            }
            // Link writes check both ends, so a dangling evidence id cannot occur.
            if let (Some(evidence), Some(slot)) = (
                self.get::<Evidence>(&link.evidence_id),
                out.get_mut(&link.finding_id),
            ) {
                slot.push(evidence);
            }
        }
        for evidence in out.values_mut() {
            evidence.sort_by(created_then_id);
        }
        Ok(out)
    }

    pub fn lineage_summary(&self, lineage_root_id: &RecordId) -> LineageSummary {
        let mut summary = LineageSummary {
            lineage_root_id: lineage_root_id.clone(),
            root_present: self.get::<LineageRoot>(lineage_root_id).is_some(),
            source_records: self.scoped::<SourceRecord>(lineage_root_id).count(),
            derived_facts: self.scoped::<DerivedFact>(lineage_root_id).count(),
            findings: 0,
            evidence: 0,
            links: self.scoped::<FindingEvidenceLink>(lineage_root_id).count(),
            artifacts: 0,
            evidence_by_kind: BTreeMap::new(),
            evidence_by_engine: BTreeMap::new(),
            findings_by_kind: BTreeMap::new(),
            findings_by_engine: BTreeMap::new(),
            artifacts_by_class: BTreeMap::new(),
            earliest: None,
            latest: None,
        };

        for e in self.scoped::<Evidence>(lineage_root_id) {
            summary.evidence += 1;
            bump(&mut summary.evidence_by_kind, &e.kind);
            bump(&mut summary.evidence_by_engine, &e.producing_engine_id);
            summary.widen(e.created_at);
        }
        for f in self.scoped::<Finding>(lineage_root_id) {
            summary.findings += 1;
            bump(&mut summary.findings_by_kind, &f.kind);
            bump(&mut summary.findings_by_engine, &f.producing_engine_id);
            summary.widen(f.created_at);
        }
        for a in self.scoped::<ProvenanceArtifact>(lineage_root_id) {
            summary.artifacts += 1;
            *summary.artifacts_by_class.entry(a.class.as_str()).or_insert(0) += 1;
        }
        summary
    }
}
