#![forbid(unsafe_code)]

//! Deterministic record identity.
//!
//! Every ledger id is a UUIDv5 over a namespace and the `|`-joined key parts the
//! caller supplies. Nothing else (clock, randomness, process state) takes part,
//! so a recomputation under identical inputs lands on the identical id.

use uuid::Uuid;

use crate::common::RecordId;
use crate::ledger::ArtifactClass;

pub const KEY_PART_SEPARATOR: &str = "|";

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct IdNamespace(Uuid);

impl IdNamespace {
    /// Root namespace of the provenance ledger. Never change this value: every
    /// persisted id is derived beneath it.
    pub const LEDGER: IdNamespace =
        IdNamespace(Uuid::from_u128(0x5f0c_2d7e_9a41_4b1c_8e63_d2a7_10f4_c9b8));

    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    pub fn named(label: &str) -> Self {
        Self(Uuid::new_v5(&Self::LEDGER.0, label.as_bytes()))
    }

    pub fn for_engine(engine_id: &str) -> Self {
        Self::named(&format!("engine{KEY_PART_SEPARATOR}{engine_id}"))
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

pub fn derive_record_id(namespace: &IdNamespace, parts: &[&str]) -> RecordId {
    let name = parts.join(KEY_PART_SEPARATOR);
    // Hyphenated UUID text is always a valid record id.
    RecordId::from_derived(Uuid::new_v5(&namespace.0, name.as_bytes()).to_string())
}

pub fn derive_lineage_root_id(dataset_key: &str, version_label: &str) -> RecordId {
    derive_record_id(
        &IdNamespace::named("lineage_root"),
        &[dataset_key, version_label],
    )
}

pub fn derive_source_record_id(
    lineage_root_id: &RecordId,
    source_system: &str,
    source_record_key: &str,
) -> RecordId {
    derive_record_id(
        &IdNamespace::named("source_record"),
        &[lineage_root_id.as_str(), source_system, source_record_key],
    )
}

pub fn derive_derived_fact_id(
    engine_id: &str,
    lineage_root_id: &RecordId,
    source_record_id: &RecordId,
    kind: &str,
) -> RecordId {
    derive_record_id(
        &IdNamespace::for_engine(engine_id),
        &[
            "derived_fact",
            engine_id,
            lineage_root_id.as_str(),
            source_record_id.as_str(),
            kind,
        ],
    )
}

pub fn derive_finding_id(
    engine_id: &str,
    lineage_root_id: &RecordId,
    kind: &str,
    natural_key: &str,
) -> RecordId {
    derive_record_id(
        &IdNamespace::for_engine(engine_id),
        &["finding", engine_id, lineage_root_id.as_str(), kind, natural_key],
    )
}

pub fn derive_evidence_id(
    engine_id: &str,
    lineage_root_id: &RecordId,
    kind: &str,
    natural_key: &str,
) -> RecordId {
    derive_record_id(
        &IdNamespace::for_engine(engine_id),
        &["evidence", engine_id, lineage_root_id.as_str(), kind, natural_key],
    )
}

pub fn derive_artifact_id(
    engine_id: &str,
    class: ArtifactClass,
    lineage_root_id: &RecordId,
    kind: &str,
    natural_key: &str,
) -> RecordId {
    derive_record_id(
        &IdNamespace::for_engine(engine_id),
        &[
            class.as_str(),
            engine_id,
            lineage_root_id.as_str(),
            kind,
            natural_key,
        ],
    )
}

pub fn derive_link_id(
    lineage_root_id: &RecordId,
    finding_id: &RecordId,
    evidence_id: &RecordId,
) -> RecordId {
    derive_record_id(
        &IdNamespace::named("finding_evidence_link"),
        &[
            lineage_root_id.as_str(),
            finding_id.as_str(),
            evidence_id.as_str(),
        ],
    )
}
