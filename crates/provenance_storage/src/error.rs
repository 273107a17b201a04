#![forbid(unsafe_code)]

use provenance_contracts::{ContractViolation, RecordId};

use crate::trace::LineageMismatch;

/// Coarse error taxonomy. None of the classes is retried inside the ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorClass {
    Validation,
    Conflict,
    Immutability,
    Traceability,
    Io,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum StorageError {
    #[error(transparent)]
    ContractViolation(#[from] ContractViolation),

    #[error("foreign key violation on {table}: {key}")]
    ForeignKeyViolation { table: &'static str, key: String },

    #[error("duplicate key on {table}: {key}")]
    DuplicateKey { table: &'static str, key: String },

    #[error(
        "IDENTIFIER_COLLISION on {table} id={id} lineage_root={lineage_root_id}: fields {}",
        .fields.join(",")
    )]
    IdentifierCollision {
        table: &'static str,
        id: RecordId,
        lineage_root_id: RecordId,
        fields: Vec<&'static str>,
    },

    #[error(
        "PAYLOAD_MISMATCH on {table} id={id} lineage_root={lineage_root_id}: fields {}",
        .fields.join(",")
    )]
    PayloadMismatch {
        table: &'static str,
        id: RecordId,
        lineage_root_id: RecordId,
        fields: Vec<&'static str>,
    },

    #[error(
        "LINK_MISMATCH id={id} lineage_root={lineage_root_id}: stored ({stored_finding_id}, {stored_evidence_id}) vs candidate ({finding_id}, {evidence_id})"
    )]
    LinkMismatch {
        id: RecordId,
        lineage_root_id: RecordId,
        stored_finding_id: RecordId,
        stored_evidence_id: RecordId,
        finding_id: RecordId,
        evidence_id: RecordId,
    },

    #[error("IMMUTABLE_UPDATE on {table} id={id}: fields {}", .fields.join(","))]
    ImmutableUpdate {
        table: &'static str,
        id: RecordId,
        fields: Vec<&'static str>,
    },

    #[error("IMMUTABLE_DELETE on {table} id={id}")]
    ImmutableDelete { table: &'static str, id: RecordId },

    #[error("MISSING_EVIDENCE under lineage_root={lineage_root_id}: {}", join_ids(.ids))]
    MissingEvidence {
        lineage_root_id: RecordId,
        ids: Vec<RecordId>,
    },

    #[error(
        "LINEAGE_MISMATCH under lineage_root={lineage_root_id}: {} record(s) belong to another lineage",
        .mismatches.len()
    )]
    LineageMismatch {
        lineage_root_id: RecordId,
        mismatches: Vec<LineageMismatch>,
    },

    #[error("journal {path}: {reason}")]
    Journal { path: String, reason: String },
}

fn join_ids(ids: &[RecordId]) -> String {
    ids.iter()
        .map(RecordId::as_str)
        .collect::<Vec<_>>()
        .join(",")
}

impl StorageError {
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::ContractViolation(_) => "CONTRACT_VIOLATION",
            StorageError::ForeignKeyViolation { .. } => "FOREIGN_KEY_VIOLATION",
            StorageError::DuplicateKey { .. } => "DUPLICATE_KEY",
            StorageError::IdentifierCollision { .. } => "IDENTIFIER_COLLISION",
            StorageError::PayloadMismatch { .. } => "PAYLOAD_MISMATCH",
            StorageError::LinkMismatch { .. } => "LINK_MISMATCH",
            StorageError::ImmutableUpdate { .. } => "IMMUTABLE_UPDATE",
            StorageError::ImmutableDelete { .. } => "IMMUTABLE_DELETE",
            StorageError::MissingEvidence { .. } => "MISSING_EVIDENCE",
            StorageError::LineageMismatch { .. } => "LINEAGE_MISMATCH",
            StorageError::Journal { .. } => "JOURNAL_IO",
        }
    }

    pub fn class(&self) -> ErrorClass {
        match self {
            StorageError::ContractViolation(_) | StorageError::ForeignKeyViolation { .. } => {
                ErrorClass::Validation
            }
            // A lost check-then-insert race surfaces as a duplicate key.
            StorageError::DuplicateKey { .. }
            | StorageError::IdentifierCollision { .. }
            | StorageError::PayloadMismatch { .. }
            | StorageError::LinkMismatch { .. } => ErrorClass::Conflict,
            StorageError::ImmutableUpdate { .. } | StorageError::ImmutableDelete { .. } => {
                ErrorClass::Immutability
            }
            StorageError::MissingEvidence { .. } | StorageError::LineageMismatch { .. } => {
                ErrorClass::Traceability
            }
            StorageError::Journal { .. } => ErrorClass::Io,
        }
    }

    /// The ledger never retries. A verbatim replay of identical inputs is the
    /// caller's only safe retry, and that is not an error-driven decision.
    pub fn is_retryable(&self) -> bool {
        false
    }
}
