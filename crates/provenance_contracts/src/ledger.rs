#![forbid(unsafe_code)]

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::common::{validate_text, validate_token, ContractViolation, RecordId, Validate};
use crate::payload::{payloads_equivalent, validate_checksum_hex, validate_payload};

pub const SOURCE_KEY_MAX_LEN: usize = 256;
pub const VERSION_LABEL_MAX_LEN: usize = 64;

/// Every table the mutation guard protects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    LineageRoot,
    SourceRecord,
    DerivedFact,
    Finding,
    Evidence,
    FindingEvidenceLink,
    ProvenanceArtifact,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::LineageRoot,
        EntityKind::SourceRecord,
        EntityKind::DerivedFact,
        EntityKind::Finding,
        EntityKind::Evidence,
        EntityKind::FindingEvidenceLink,
        EntityKind::ProvenanceArtifact,
    ];

    pub fn table(self) -> &'static str {
        match self {
            EntityKind::LineageRoot => "lineage_roots",
            EntityKind::SourceRecord => "source_records",
            EntityKind::DerivedFact => "derived_facts",
            EntityKind::Finding => "findings",
            EntityKind::Evidence => "evidence",
            EntityKind::FindingEvidenceLink => "finding_evidence_links",
            EntityKind::ProvenanceArtifact => "provenance_artifacts",
        }
    }

    pub fn is_protected(self) -> bool {
        true
    }

    /// Fields that may change after insert, and then only from unset to a value.
    pub fn sanctioned_fields(self) -> &'static [&'static str] {
        match self {
            EntityKind::SourceRecord => &["checksum"],
            _ => &[],
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.table())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactClass {
    AuditLog,
    ReportArtifact,
    CalculationRun,
}

impl ArtifactClass {
    pub fn as_str(self) -> &'static str {
        match self {
            ArtifactClass::AuditLog => "audit_log",
            ArtifactClass::ReportArtifact => "report_artifact",
            ArtifactClass::CalculationRun => "calculation_run",
        }
    }
}

/// Shared shape of every protected ledger record.
pub trait LedgerEntity: Clone + fmt::Debug + Validate {
    const KIND: EntityKind;
    /// Fields whose difference under one id means the id derivation itself is
    /// broken (collision) rather than the computation being nondeterministic.
    const IDENTITY_FIELDS: &'static [&'static str];

    fn record_id(&self) -> &RecordId;
    /// `None` only for the lineage root itself.
    fn lineage_root_id(&self) -> Option<&RecordId>;
    fn created_at(&self) -> DateTime<Utc>;
    fn changed_fields(&self, other: &Self) -> Vec<&'static str>;

    fn field_is_unset(&self, _field: &str) -> bool {
        false
    }

    fn into_row(self) -> LedgerRow;
    fn from_row(row: &LedgerRow) -> Option<&Self>;
}

fn mark(changed: &mut Vec<&'static str>, differs: bool, field: &'static str) {
    if differs {
        changed.push(field);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineageRoot {
    pub id: RecordId,
    pub dataset_key: String,
    pub version_label: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl LineageRoot {
    pub fn v1<Tz: TimeZone>(
        id: RecordId,
        dataset_key: impl Into<String>,
        version_label: impl Into<String>,
        payload: Value,
        created_at: DateTime<Tz>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            id,
            dataset_key: dataset_key.into(),
            version_label: version_label.into(),
            payload,
            created_at: created_at.with_timezone(&Utc),
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for LineageRoot {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        validate_token("lineage_root.dataset_key", &self.dataset_key)?;
        validate_text(
            "lineage_root.version_label",
            &self.version_label,
            VERSION_LABEL_MAX_LEN,
        )?;
        validate_payload("lineage_root.payload", &self.payload)
    }
}

impl LedgerEntity for LineageRoot {
    const KIND: EntityKind = EntityKind::LineageRoot;
    const IDENTITY_FIELDS: &'static [&'static str] = &["dataset_key", "version_label"];

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn lineage_root_id(&self) -> Option<&RecordId> {
        None
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut c = Vec::new();
        mark(&mut c, self.dataset_key != other.dataset_key, "dataset_key");
        mark(&mut c, self.version_label != other.version_label, "version_label");
        mark(&mut c, !payloads_equivalent(&self.payload, &other.payload), "payload");
        mark(&mut c, self.created_at != other.created_at, "created_at");
        c
    }

    fn into_row(self) -> LedgerRow {
        LedgerRow::LineageRoot(self)
    }

    fn from_row(row: &LedgerRow) -> Option<&Self> {
        match row {
            LedgerRow::LineageRoot(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceRecord {
    pub id: RecordId,
    pub lineage_root_id: RecordId,
    pub source_system: String,
    pub source_record_key: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
    /// Legacy backfill column: may go from unset to a value exactly once.
    pub checksum: Option<String>,
}

impl SourceRecord {
    pub fn v1<Tz: TimeZone>(
        id: RecordId,
        lineage_root_id: RecordId,
        source_system: impl Into<String>,
        source_record_key: impl Into<String>,
        payload: Value,
        created_at: DateTime<Tz>,
        checksum: Option<String>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            id,
            lineage_root_id,
            source_system: source_system.into(),
            source_record_key: source_record_key.into(),
            payload,
            created_at: created_at.with_timezone(&Utc),
            checksum,
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for SourceRecord {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        self.lineage_root_id.validate()?;
        validate_token("source_record.source_system", &self.source_system)?;
        validate_text(
            "source_record.source_record_key",
            &self.source_record_key,
            SOURCE_KEY_MAX_LEN,
        )?;
        validate_payload("source_record.payload", &self.payload)?;
        if let Some(c) = &self.checksum {
            validate_checksum_hex("source_record.checksum", c)?;
        }
        Ok(())
    }
}

impl LedgerEntity for SourceRecord {
    const KIND: EntityKind = EntityKind::SourceRecord;
    const IDENTITY_FIELDS: &'static [&'static str] =
        &["lineage_root_id", "source_system", "source_record_key"];

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn lineage_root_id(&self) -> Option<&RecordId> {
        Some(&self.lineage_root_id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut c = Vec::new();
        mark(&mut c, self.lineage_root_id != other.lineage_root_id, "lineage_root_id");
        mark(&mut c, self.source_system != other.source_system, "source_system");
        mark(
            &mut c,
            self.source_record_key != other.source_record_key,
            "source_record_key",
        );
        mark(&mut c, !payloads_equivalent(&self.payload, &other.payload), "payload");
        mark(&mut c, self.created_at != other.created_at, "created_at");
        mark(&mut c, self.checksum != other.checksum, "checksum");
        c
    }

    fn field_is_unset(&self, field: &str) -> bool {
        field == "checksum" && self.checksum.is_none()
    }

    fn into_row(self) -> LedgerRow {
        LedgerRow::SourceRecord(self)
    }

    fn from_row(row: &LedgerRow) -> Option<&Self> {
        match row {
            LedgerRow::SourceRecord(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DerivedFact {
    pub id: RecordId,
    pub lineage_root_id: RecordId,
    pub source_record_id: RecordId,
    pub producing_engine_id: String,
    pub kind: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl DerivedFact {
    pub fn v1<Tz: TimeZone>(
        id: RecordId,
        lineage_root_id: RecordId,
        source_record_id: RecordId,
        producing_engine_id: impl Into<String>,
        kind: impl Into<String>,
        payload: Value,
        created_at: DateTime<Tz>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            id,
            lineage_root_id,
            source_record_id,
            producing_engine_id: producing_engine_id.into(),
            kind: kind.into(),
            payload,
            created_at: created_at.with_timezone(&Utc),
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for DerivedFact {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        self.lineage_root_id.validate()?;
        self.source_record_id.validate()?;
        validate_token("derived_fact.producing_engine_id", &self.producing_engine_id)?;
        validate_token("derived_fact.kind", &self.kind)?;
        validate_payload("derived_fact.payload", &self.payload)
    }
}

impl LedgerEntity for DerivedFact {
    const KIND: EntityKind = EntityKind::DerivedFact;
    const IDENTITY_FIELDS: &'static [&'static str] = &[
        "lineage_root_id",
        "source_record_id",
        "producing_engine_id",
        "kind",
    ];

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn lineage_root_id(&self) -> Option<&RecordId> {
        Some(&self.lineage_root_id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut c = Vec::new();
        mark(&mut c, self.lineage_root_id != other.lineage_root_id, "lineage_root_id");
        mark(&mut c, self.source_record_id != other.source_record_id, "source_record_id");
        mark(
            &mut c,
            self.producing_engine_id != other.producing_engine_id,
            "producing_engine_id",
        );
        mark(&mut c, self.kind != other.kind, "kind");
        mark(&mut c, !payloads_equivalent(&self.payload, &other.payload), "payload");
        mark(&mut c, self.created_at != other.created_at, "created_at");
        c
    }

    fn into_row(self) -> LedgerRow {
        LedgerRow::DerivedFact(self)
    }

    fn from_row(row: &LedgerRow) -> Option<&Self> {
        match row {
            LedgerRow::DerivedFact(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub id: RecordId,
    pub lineage_root_id: RecordId,
    pub source_record_id: RecordId,
    pub producing_engine_id: String,
    pub kind: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl Finding {
    pub fn v1<Tz: TimeZone>(
        id: RecordId,
        lineage_root_id: RecordId,
        source_record_id: RecordId,
        producing_engine_id: impl Into<String>,
        kind: impl Into<String>,
        payload: Value,
        created_at: DateTime<Tz>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            id,
            lineage_root_id,
            source_record_id,
            producing_engine_id: producing_engine_id.into(),
            kind: kind.into(),
            payload,
            created_at: created_at.with_timezone(&Utc),
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for Finding {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        self.lineage_root_id.validate()?;
        self.source_record_id.validate()?;
        validate_token("finding.producing_engine_id", &self.producing_engine_id)?;
        validate_token("finding.kind", &self.kind)?;
        validate_payload("finding.payload", &self.payload)
    }
}

impl LedgerEntity for Finding {
    const KIND: EntityKind = EntityKind::Finding;
    const IDENTITY_FIELDS: &'static [&'static str] = &[
        "lineage_root_id",
        "source_record_id",
        "producing_engine_id",
        "kind",
    ];

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn lineage_root_id(&self) -> Option<&RecordId> {
        Some(&self.lineage_root_id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut c = Vec::new();
        mark(&mut c, self.lineage_root_id != other.lineage_root_id, "lineage_root_id");
        mark(&mut c, self.source_record_id != other.source_record_id, "source_record_id");
        mark(
            &mut c,
            self.producing_engine_id != other.producing_engine_id,
            "producing_engine_id",
        );
        mark(&mut c, self.kind != other.kind, "kind");
        mark(&mut c, !payloads_equivalent(&self.payload, &other.payload), "payload");
        mark(&mut c, self.created_at != other.created_at, "created_at");
        c
    }

    fn into_row(self) -> LedgerRow {
        LedgerRow::Finding(self)
    }

    fn from_row(row: &LedgerRow) -> Option<&Self> {
        match row {
            LedgerRow::Finding(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Evidence {
    pub id: RecordId,
    pub lineage_root_id: RecordId,
    pub producing_engine_id: String,
    pub kind: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl Evidence {
    pub fn v1<Tz: TimeZone>(
        id: RecordId,
        lineage_root_id: RecordId,
        producing_engine_id: impl Into<String>,
        kind: impl Into<String>,
        payload: Value,
        created_at: DateTime<Tz>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            id,
            lineage_root_id,
            producing_engine_id: producing_engine_id.into(),
            kind: kind.into(),
            payload,
            created_at: created_at.with_timezone(&Utc),
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for Evidence {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        self.lineage_root_id.validate()?;
        validate_token("evidence.producing_engine_id", &self.producing_engine_id)?;
        validate_token("evidence.kind", &self.kind)?;
        validate_payload("evidence.payload", &self.payload)
    }
}

impl LedgerEntity for Evidence {
    const KIND: EntityKind = EntityKind::Evidence;
    const IDENTITY_FIELDS: &'static [&'static str] =
        &["lineage_root_id", "producing_engine_id", "kind"];

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn lineage_root_id(&self) -> Option<&RecordId> {
        Some(&self.lineage_root_id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut c = Vec::new();
        mark(&mut c, self.lineage_root_id != other.lineage_root_id, "lineage_root_id");
        mark(
            &mut c,
            self.producing_engine_id != other.producing_engine_id,
            "producing_engine_id",
        );
        mark(&mut c, self.kind != other.kind, "kind");
        mark(&mut c, !payloads_equivalent(&self.payload, &other.payload), "payload");
        mark(&mut c, self.created_at != other.created_at, "created_at");
        c
    }

    fn into_row(self) -> LedgerRow {
        LedgerRow::Evidence(self)
    }

    fn from_row(row: &LedgerRow) -> Option<&Self> {
        match row {
            LedgerRow::Evidence(r) => Some(r),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FindingEvidenceLink {
    pub id: RecordId,
    pub lineage_root_id: RecordId,
    pub finding_id: RecordId,
    pub evidence_id: RecordId,
    pub created_at: DateTime<Utc>,
}

impl FindingEvidenceLink {
    pub fn v1<Tz: TimeZone>(
        id: RecordId,
        lineage_root_id: RecordId,
        finding_id: RecordId,
        evidence_id: RecordId,
        created_at: DateTime<Tz>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            id,
            lineage_root_id,
            finding_id,
            evidence_id,
            created_at: created_at.with_timezone(&Utc),
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for FindingEvidenceLink {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        self.lineage_root_id.validate()?;
        self.finding_id.validate()?;
        self.evidence_id.validate()
    }
}

impl LedgerEntity for FindingEvidenceLink {
    const KIND: EntityKind = EntityKind::FindingEvidenceLink;
    const IDENTITY_FIELDS: &'static [&'static str] =
        &["lineage_root_id", "finding_id", "evidence_id"];

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn lineage_root_id(&self) -> Option<&RecordId> {
        Some(&self.lineage_root_id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut c = Vec::new();
        mark(&mut c, self.lineage_root_id != other.lineage_root_id, "lineage_root_id");
        mark(&mut c, self.finding_id != other.finding_id, "finding_id");
        mark(&mut c, self.evidence_id != other.evidence_id, "evidence_id");
        mark(&mut c, self.created_at != other.created_at, "created_at");
        c
    }

    fn into_row(self) -> LedgerRow {
        LedgerRow::FindingEvidenceLink(self)
    }

    fn from_row(row: &LedgerRow) -> Option<&Self> {
        match row {
            LedgerRow::FindingEvidenceLink(r) => Some(r),
            _ => None,
        }
    }
}

/// Process-level provenance: audit log entries, report artifacts and
/// calculation runs share one table keyed by class.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceArtifact {
    pub id: RecordId,
    pub class: ArtifactClass,
    pub lineage_root_id: RecordId,
    pub producing_engine_id: String,
    pub kind: String,
    pub payload: Value,
    pub created_at: DateTime<Utc>,
}

impl ProvenanceArtifact {
    pub fn v1<Tz: TimeZone>(
        id: RecordId,
        class: ArtifactClass,
        lineage_root_id: RecordId,
        producing_engine_id: impl Into<String>,
        kind: impl Into<String>,
        payload: Value,
        created_at: DateTime<Tz>,
    ) -> Result<Self, ContractViolation> {
        let r = Self {
            id,
            class,
            lineage_root_id,
            producing_engine_id: producing_engine_id.into(),
            kind: kind.into(),
            payload,
            created_at: created_at.with_timezone(&Utc),
        };
        r.validate()?;
        Ok(r)
    }
}

impl Validate for ProvenanceArtifact {
    fn validate(&self) -> Result<(), ContractViolation> {
        self.id.validate()?;
        self.lineage_root_id.validate()?;
        validate_token(
            "provenance_artifact.producing_engine_id",
            &self.producing_engine_id,
        )?;
        validate_token("provenance_artifact.kind", &self.kind)?;
        validate_payload("provenance_artifact.payload", &self.payload)
    }
}

impl LedgerEntity for ProvenanceArtifact {
    const KIND: EntityKind = EntityKind::ProvenanceArtifact;
    const IDENTITY_FIELDS: &'static [&'static str] =
        &["class", "lineage_root_id", "producing_engine_id", "kind"];

    fn record_id(&self) -> &RecordId {
        &self.id
    }

    fn lineage_root_id(&self) -> Option<&RecordId> {
        Some(&self.lineage_root_id)
    }

    fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    fn changed_fields(&self, other: &Self) -> Vec<&'static str> {
        let mut c = Vec::new();
        mark(&mut c, self.class != other.class, "class");
        mark(&mut c, self.lineage_root_id != other.lineage_root_id, "lineage_root_id");
        mark(
            &mut c,
            self.producing_engine_id != other.producing_engine_id,
            "producing_engine_id",
        );
        mark(&mut c, self.kind != other.kind, "kind");
        mark(&mut c, !payloads_equivalent(&self.payload, &other.payload), "payload");
        mark(&mut c, self.created_at != other.created_at, "created_at");
        c
    }

    fn into_row(self) -> LedgerRow {
        LedgerRow::ProvenanceArtifact(self)
    }

    fn from_row(row: &LedgerRow) -> Option<&Self> {
        match row {
            LedgerRow::ProvenanceArtifact(r) => Some(r),
            _ => None,
        }
    }
}

/// Type-erased ledger row, used for transaction write-sets and the journal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", content = "row", rename_all = "snake_case")]
pub enum LedgerRow {
    LineageRoot(LineageRoot),
    SourceRecord(SourceRecord),
    DerivedFact(DerivedFact),
    Finding(Finding),
    Evidence(Evidence),
    FindingEvidenceLink(FindingEvidenceLink),
    ProvenanceArtifact(ProvenanceArtifact),
}

impl LedgerRow {
    pub fn kind(&self) -> EntityKind {
        match self {
            LedgerRow::LineageRoot(_) => EntityKind::LineageRoot,
            LedgerRow::SourceRecord(_) => EntityKind::SourceRecord,
            LedgerRow::DerivedFact(_) => EntityKind::DerivedFact,
            LedgerRow::Finding(_) => EntityKind::Finding,
            LedgerRow::Evidence(_) => EntityKind::Evidence,
            LedgerRow::FindingEvidenceLink(_) => EntityKind::FindingEvidenceLink,
            LedgerRow::ProvenanceArtifact(_) => EntityKind::ProvenanceArtifact,
        }
    }

    pub fn record_id(&self) -> &RecordId {
        match self {
            LedgerRow::LineageRoot(r) => r.record_id(),
            LedgerRow::SourceRecord(r) => r.record_id(),
            LedgerRow::DerivedFact(r) => r.record_id(),
            LedgerRow::Finding(r) => r.record_id(),
            LedgerRow::Evidence(r) => r.record_id(),
            LedgerRow::FindingEvidenceLink(r) => r.record_id(),
            LedgerRow::ProvenanceArtifact(r) => r.record_id(),
        }
    }

    pub fn lineage_root_id(&self) -> Option<&RecordId> {
        match self {
            LedgerRow::LineageRoot(r) => r.lineage_root_id(),
            LedgerRow::SourceRecord(r) => r.lineage_root_id(),
            LedgerRow::DerivedFact(r) => r.lineage_root_id(),
            LedgerRow::Finding(r) => r.lineage_root_id(),
            LedgerRow::Evidence(r) => r.lineage_root_id(),
            LedgerRow::FindingEvidenceLink(r) => r.lineage_root_id(),
            LedgerRow::ProvenanceArtifact(r) => r.lineage_root_id(),
        }
    }

    /// Changed fields between two rows of the same table; `None` when the
    /// tables differ.
    pub fn changed_fields(&self, other: &LedgerRow) -> Option<Vec<&'static str>> {
        match (self, other) {
            (LedgerRow::LineageRoot(a), LedgerRow::LineageRoot(b)) => Some(a.changed_fields(b)),
            (LedgerRow::SourceRecord(a), LedgerRow::SourceRecord(b)) => Some(a.changed_fields(b)),
            (LedgerRow::DerivedFact(a), LedgerRow::DerivedFact(b)) => Some(a.changed_fields(b)),
            (LedgerRow::Finding(a), LedgerRow::Finding(b)) => Some(a.changed_fields(b)),
            (LedgerRow::Evidence(a), LedgerRow::Evidence(b)) => Some(a.changed_fields(b)),
            (LedgerRow::FindingEvidenceLink(a), LedgerRow::FindingEvidenceLink(b)) => {
                Some(a.changed_fields(b))
            }
            (LedgerRow::ProvenanceArtifact(a), LedgerRow::ProvenanceArtifact(b)) => {
                Some(a.changed_fields(b))
            }
            _ => None,
        }
    }

    pub fn field_is_unset(&self, field: &str) -> bool {
        match self {
            LedgerRow::LineageRoot(r) => r.field_is_unset(field),
            LedgerRow::SourceRecord(r) => r.field_is_unset(field),
            LedgerRow::DerivedFact(r) => r.field_is_unset(field),
            LedgerRow::Finding(r) => r.field_is_unset(field),
            LedgerRow::Evidence(r) => r.field_is_unset(field),
            LedgerRow::FindingEvidenceLink(r) => r.field_is_unset(field),
            LedgerRow::ProvenanceArtifact(r) => r.field_is_unset(field),
        }
    }
}

impl Validate for LedgerRow {
    fn validate(&self) -> Result<(), ContractViolation> {
        match self {
            LedgerRow::LineageRoot(r) => r.validate(),
            LedgerRow::SourceRecord(r) => r.validate(),
            LedgerRow::DerivedFact(r) => r.validate(),
            LedgerRow::Finding(r) => r.validate(),
            LedgerRow::Evidence(r) => r.validate(),
            LedgerRow::FindingEvidenceLink(r) => r.validate(),
            LedgerRow::ProvenanceArtifact(r) => r.validate(),
        }
    }
}
