#![forbid(unsafe_code)]

use std::collections::{BTreeMap, BTreeSet};

use provenance_contracts::identity::derive_link_id;
use provenance_contracts::ledger::{
    DerivedFact, EntityKind, Evidence, Finding, FindingEvidenceLink, LedgerEntity, LedgerRow,
    LineageRoot, ProvenanceArtifact, SourceRecord,
};
use provenance_contracts::{ContractViolation, RecordId, Validate};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::LedgerConfig;
use crate::error::StorageError;
use crate::guard::{install_mutation_guard, mutation_guard_installed, MutationGuard};
use crate::journal::CommitJournal;
use crate::writer;

/// One pending write inside a transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "write", rename_all = "snake_case")]
pub enum StagedWrite {
    Insert(LedgerRow),
    Update(LedgerRow),
    Delete { kind: EntityKind, id: RecordId },
}

impl StagedWrite {
    pub fn kind(&self) -> EntityKind {
        match self {
            StagedWrite::Insert(row) | StagedWrite::Update(row) => row.kind(),
            StagedWrite::Delete { kind, .. } => *kind,
        }
    }

    pub fn record_id(&self) -> &RecordId {
        match self {
            StagedWrite::Insert(row) | StagedWrite::Update(row) => row.record_id(),
            StagedWrite::Delete { id, .. } => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitReceipt {
    pub commit_seq: u64,
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
}

/// Binds a record type to its table inside [`LedgerStore`].
pub trait StoredEntity: LedgerEntity {
    fn table(store: &LedgerStore) -> &BTreeMap<RecordId, Self>;

    /// Referential checks against the transaction's view. The lineage root
    /// must exist for every downstream record.
    fn check_references(&self, txn: &LedgerTxn<'_>) -> Result<(), StorageError> {
        if let Some(root) = self.lineage_root_id() {
            require_lineage_root(txn, root)?;
        }
        Ok(())
    }

    /// Comparison used by [`writer::insert_or_verify`] when the id is taken.
    fn verify_stored(existing: &Self, candidate: &Self) -> Result<(), StorageError> {
        writer::verify_identical(existing, candidate)
    }
}

fn require_lineage_root(txn: &LedgerTxn<'_>, root: &RecordId) -> Result<(), StorageError> {
    if txn.get::<LineageRoot>(root).is_none() {
        return Err(StorageError::ForeignKeyViolation {
            table: EntityKind::LineageRoot.table(),
            key: root.to_string(),
        });
    }
    Ok(())
}

fn require_source_record(
    txn: &LedgerTxn<'_>,
    root: &RecordId,
    source_record_id: &RecordId,
) -> Result<(), StorageError> {
    match txn.get::<SourceRecord>(source_record_id) {
        Some(s) if &s.lineage_root_id == root => Ok(()),
        _ => Err(StorageError::ForeignKeyViolation {
            table: EntityKind::SourceRecord.table(),
            key: source_record_id.to_string(),
        }),
    }
}

/// In-memory transactional ledger.
///
/// Rows are only reachable for writing through [`LedgerTxn`]; every commit
/// passes the mutation guard, the per-table id uniqueness constraint and the
/// referential checks before any row is applied.
#[derive(Debug)]
pub struct LedgerStore {
    config: LedgerConfig,
    lineage_roots: BTreeMap<RecordId, LineageRoot>,
    source_records: BTreeMap<RecordId, SourceRecord>,
    derived_facts: BTreeMap<RecordId, DerivedFact>,
    findings: BTreeMap<RecordId, Finding>,
    evidence: BTreeMap<RecordId, Evidence>,
    finding_evidence_links: BTreeMap<RecordId, FindingEvidenceLink>,
    provenance_artifacts: BTreeMap<RecordId, ProvenanceArtifact>,
    next_commit_seq: u64,
    journal: Option<CommitJournal>,
}

impl LedgerStore {
    pub fn new_in_memory() -> Self {
        Self::with_config(LedgerConfig::default())
    }

    /// Opens a store, installing the guard when configured and replaying the
    /// commit journal if one is configured.
    pub fn open(config: LedgerConfig) -> Result<Self, StorageError> {
        let journal_path = config.journal_path.clone();
        let mut store = Self::with_config(config);
        if let Some(path) = journal_path {
            let journal = CommitJournal::open(&path)?;
            let entries = journal.recover()?;
            let replayed = entries.len();
            for entry in entries {
                let mut txn = store.begin();
                for write in entry.writes {
                    writer::replay_write(&mut txn, write)?;
                }
                txn.commit()?;
                store.next_commit_seq = store.next_commit_seq.max(entry.commit_seq + 1);
            }
            info!(
                path = %path.display(),
                commits = replayed,
                "replayed provenance ledger journal"
            );
            store.journal = Some(journal);
        }
        Ok(store)
    }

    fn with_config(config: LedgerConfig) -> Self {
        if config.guard_enabled {
            install_mutation_guard();
        }
        Self {
            config,
            lineage_roots: BTreeMap::new(),
            source_records: BTreeMap::new(),
            derived_facts: BTreeMap::new(),
            findings: BTreeMap::new(),
            evidence: BTreeMap::new(),
            finding_evidence_links: BTreeMap::new(),
            provenance_artifacts: BTreeMap::new(),
            next_commit_seq: 1,
            journal: None,
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    pub fn begin(&mut self) -> LedgerTxn<'_> {
        LedgerTxn {
            store: self,
            writes: Vec::new(),
        }
    }

    pub fn get<T: StoredEntity>(&self, id: &RecordId) -> Option<&T> {
        T::table(self).get(id)
    }

    pub fn rows<'a, T: StoredEntity + 'a>(&'a self) -> impl Iterator<Item = &'a T> {
        T::table(self).values()
    }

    pub fn row_count<T: StoredEntity>(&self) -> usize {
        T::table(self).len()
    }

    pub(crate) fn find_row(&self, kind: EntityKind, id: &RecordId) -> Option<LedgerRow> {
        match kind {
            EntityKind::LineageRoot => self.lineage_roots.get(id).cloned().map(LedgerEntity::into_row),
            EntityKind::SourceRecord => {
                self.source_records.get(id).cloned().map(LedgerEntity::into_row)
            }
            EntityKind::DerivedFact => {
                self.derived_facts.get(id).cloned().map(LedgerEntity::into_row)
            }
            EntityKind::Finding => self.findings.get(id).cloned().map(LedgerEntity::into_row),
            EntityKind::Evidence => self.evidence.get(id).cloned().map(LedgerEntity::into_row),
            EntityKind::FindingEvidenceLink => self
                .finding_evidence_links
                .get(id)
                .cloned()
                .map(LedgerEntity::into_row),
            EntityKind::ProvenanceArtifact => self
                .provenance_artifacts
                .get(id)
                .cloned()
                .map(LedgerEntity::into_row),
        }
    }

    fn contains(&self, kind: EntityKind, id: &RecordId) -> bool {
        match kind {
            EntityKind::LineageRoot => self.lineage_roots.contains_key(id),
            EntityKind::SourceRecord => self.source_records.contains_key(id),
            EntityKind::DerivedFact => self.derived_facts.contains_key(id),
            EntityKind::Finding => self.findings.contains_key(id),
            EntityKind::Evidence => self.evidence.contains_key(id),
            EntityKind::FindingEvidenceLink => self.finding_evidence_links.contains_key(id),
            EntityKind::ProvenanceArtifact => self.provenance_artifacts.contains_key(id),
        }
    }

    fn apply_row(&mut self, row: LedgerRow) {
        match row {
            LedgerRow::LineageRoot(r) => {
                self.lineage_roots.insert(r.id.clone(), r);
            }
            LedgerRow::SourceRecord(r) => {
                self.source_records.insert(r.id.clone(), r);
            }
            LedgerRow::DerivedFact(r) => {
                self.derived_facts.insert(r.id.clone(), r);
            }
            LedgerRow::Finding(r) => {
                self.findings.insert(r.id.clone(), r);
            }
            LedgerRow::Evidence(r) => {
                self.evidence.insert(r.id.clone(), r);
            }
            LedgerRow::FindingEvidenceLink(r) => {
                self.finding_evidence_links.insert(r.id.clone(), r);
            }
            LedgerRow::ProvenanceArtifact(r) => {
                self.provenance_artifacts.insert(r.id.clone(), r);
            }
        }
    }

    fn remove_row(&mut self, kind: EntityKind, id: &RecordId) {
        match kind {
            EntityKind::LineageRoot => {
                self.lineage_roots.remove(id);
            }
            EntityKind::SourceRecord => {
                self.source_records.remove(id);
            }
            EntityKind::DerivedFact => {
                self.derived_facts.remove(id);
            }
            EntityKind::Finding => {
                self.findings.remove(id);
            }
            EntityKind::Evidence => {
                self.evidence.remove(id);
            }
            EntityKind::FindingEvidenceLink => {
                self.finding_evidence_links.remove(id);
            }
            EntityKind::ProvenanceArtifact => {
                self.provenance_artifacts.remove(id);
            }
        }
    }
}

macro_rules! stored_entity {
    ($ty:ty, $field:ident) => {
        impl StoredEntity for $ty {
            fn table(store: &LedgerStore) -> &BTreeMap<RecordId, Self> {
                &store.$field
            }
        }
    };
}

stored_entity!(LineageRoot, lineage_roots);
stored_entity!(SourceRecord, source_records);
stored_entity!(Evidence, evidence);
stored_entity!(ProvenanceArtifact, provenance_artifacts);

impl StoredEntity for DerivedFact {
    fn table(store: &LedgerStore) -> &BTreeMap<RecordId, Self> {
        &store.derived_facts
    }

    fn check_references(&self, txn: &LedgerTxn<'_>) -> Result<(), StorageError> {
        require_lineage_root(txn, &self.lineage_root_id)?;
        require_source_record(txn, &self.lineage_root_id, &self.source_record_id)
    }
}

impl StoredEntity for Finding {
    fn table(store: &LedgerStore) -> &BTreeMap<RecordId, Self> {
        &store.findings
    }

    fn check_references(&self, txn: &LedgerTxn<'_>) -> Result<(), StorageError> {
        require_lineage_root(txn, &self.lineage_root_id)?;
        require_source_record(txn, &self.lineage_root_id, &self.source_record_id)
    }
}

impl StoredEntity for FindingEvidenceLink {
    fn table(store: &LedgerStore) -> &BTreeMap<RecordId, Self> {
        &store.finding_evidence_links
    }

    /// A link id is always derived from its triple, so one pair can never be
    /// stored under two ids.
    fn check_references(&self, txn: &LedgerTxn<'_>) -> Result<(), StorageError> {
        if self.id != derive_link_id(&self.lineage_root_id, &self.finding_id, &self.evidence_id) {
            return Err(ContractViolation::InvalidValue {
                field: "finding_evidence_link.id",
                reason: "must be derived from (lineage_root_id, finding_id, evidence_id)",
            }
            .into());
        }
        require_lineage_root(txn, &self.lineage_root_id)?;
        match txn.get::<Finding>(&self.finding_id) {
            Some(f) if f.lineage_root_id == self.lineage_root_id => {}
            _ => {
                return Err(StorageError::ForeignKeyViolation {
                    table: EntityKind::Finding.table(),
                    key: self.finding_id.to_string(),
                })
            }
        }
        match txn.get::<Evidence>(&self.evidence_id) {
            Some(e) if e.lineage_root_id == self.lineage_root_id => Ok(()),
            _ => Err(StorageError::ForeignKeyViolation {
                table: EntityKind::Evidence.table(),
                key: self.evidence_id.to_string(),
            }),
        }
    }

    fn verify_stored(existing: &Self, candidate: &Self) -> Result<(), StorageError> {
        writer::verify_same_link(existing, candidate)
    }
}

fn check_row_references(txn: &LedgerTxn<'_>, row: &LedgerRow) -> Result<(), StorageError> {
    match row {
        LedgerRow::LineageRoot(r) => r.check_references(txn),
        LedgerRow::SourceRecord(r) => r.check_references(txn),
        LedgerRow::DerivedFact(r) => r.check_references(txn),
        LedgerRow::Finding(r) => r.check_references(txn),
        LedgerRow::Evidence(r) => r.check_references(txn),
        LedgerRow::FindingEvidenceLink(r) => r.check_references(txn),
        LedgerRow::ProvenanceArtifact(r) => r.check_references(txn),
    }
}

/// A single-writer unit of work. Dropping it without [`LedgerTxn::commit`]
/// discards every staged write.
#[derive(Debug)]
pub struct LedgerTxn<'a> {
    store: &'a mut LedgerStore,
    writes: Vec<StagedWrite>,
}

impl<'a> LedgerTxn<'a> {
    pub fn store(&self) -> &LedgerStore {
        &*self.store
    }

    pub fn writes(&self) -> &[StagedWrite] {
        &self.writes
    }

    /// Read-your-writes lookup: the latest staged row wins over committed state,
    /// and a staged delete hides the row.
    pub fn get<T: StoredEntity>(&self, id: &RecordId) -> Option<&T> {
        for write in self.writes.iter().rev() {
            if write.kind() != T::KIND || write.record_id() != id {
                continue;
            }
            return match write {
                StagedWrite::Insert(row) | StagedWrite::Update(row) => T::from_row(row),
                StagedWrite::Delete { .. } => None,
            };
        }
        self.store.get::<T>(id)
    }

    fn staged_insert(&self, kind: EntityKind, id: &RecordId) -> bool {
        self.writes
            .iter()
            .any(|w| matches!(w, StagedWrite::Insert(row) if row.kind() == kind && row.record_id() == id))
    }

    /// Raw insert. Prefer [`crate::writer::insert_or_verify`]; a raw insert of
    /// an id that already exists fails the uniqueness constraint at commit.
    pub fn stage_insert<T: StoredEntity>(&mut self, record: T) {
        self.writes.push(StagedWrite::Insert(record.into_row()));
    }

    /// Raw update. Protected tables reject it at commit unless it is the
    /// sanctioned unset-to-value transition.
    pub fn stage_update<T: StoredEntity>(&mut self, record: T) {
        self.writes.push(StagedWrite::Update(record.into_row()));
    }

    /// Raw delete. Protected tables reject it at commit.
    pub fn stage_delete<T: StoredEntity>(&mut self, id: RecordId) {
        self.writes.push(StagedWrite::Delete { kind: T::KIND, id });
    }

    pub(crate) fn stage(&mut self, write: StagedWrite) {
        self.writes.push(write);
    }

    pub fn rollback(self) {
        debug!(staged = self.writes.len(), "provenance ledger transaction rolled back");
    }

    pub fn commit(self) -> Result<CommitReceipt, StorageError> {
        // Journaled history is replayed under the guard, so a journaled store
        // only ever commits what the guard allows.
        if mutation_guard_installed() || self.store.journal.is_some() {
            MutationGuard::evaluate(&*self.store, &self.writes)?;
        }

        let mut inserted_ids: BTreeSet<(EntityKind, RecordId)> = BTreeSet::new();
        // Referential checks see the whole final write-set, so a row staged later
        // in the same transaction satisfies an earlier reference.
        for write in &self.writes {
            match write {
                StagedWrite::Insert(row) => {
                    row.validate()?;
                    let key = (row.kind(), row.record_id().clone());
                    if self.store.contains(key.0, &key.1) || !inserted_ids.insert(key) {
                        return Err(StorageError::DuplicateKey {
                            table: row.kind().table(),
                            key: row.record_id().to_string(),
                        });
                    }
                    check_row_references(&self, row)?;
                }
                StagedWrite::Update(row) => {
                    row.validate()?;
                    let exists = self.store.contains(row.kind(), row.record_id())
                        || self.staged_insert(row.kind(), row.record_id());
                    if !exists {
                        return Err(StorageError::ForeignKeyViolation {
                            table: row.kind().table(),
                            key: row.record_id().to_string(),
                        });
                    }
                    check_row_references(&self, row)?;
                }
                StagedWrite::Delete { .. } => {}
            }
        }

        let commit_seq = self.store.next_commit_seq;
        if let Some(journal) = &self.store.journal {
            if !self.writes.is_empty() {
                journal.append(commit_seq, &self.writes)?;
            }
        }

        let mut receipt = CommitReceipt {
            commit_seq,
            inserted: 0,
            updated: 0,
            deleted: 0,
        };
        let LedgerTxn { store, writes } = self;
        for write in writes {
            match write {
                StagedWrite::Insert(row) => {
                    receipt.inserted += 1;
                    store.apply_row(row);
                }
                StagedWrite::Update(row) => {
                    receipt.updated += 1;
                    store.apply_row(row);
                }
                StagedWrite::Delete { kind, id } => {
                    receipt.deleted += 1;
                    store.remove_row(kind, &id);
                }
            }
        }
        store.next_commit_seq += 1;
        debug!(
            commit_seq = receipt.commit_seq,
            inserted = receipt.inserted,
            updated = receipt.updated,
            deleted = receipt.deleted,
            "provenance ledger commit applied"
        );
        Ok(receipt)
    }
}
