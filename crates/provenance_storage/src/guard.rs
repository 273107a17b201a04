#![forbid(unsafe_code)]

//! Process-wide mutation guard.
//!
//! Once installed, every [`crate::LedgerTxn::commit`] hands its final
//! write-set to [`MutationGuard::evaluate`] before anything is applied. A
//! delete on a protected table aborts the commit; so does an update, unless
//! every changed field is a sanctioned field moving from unset to a value.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};

use provenance_contracts::ledger::{EntityKind, LedgerRow};
use provenance_contracts::RecordId;
use tracing::{info, warn};

use crate::error::StorageError;
use crate::ledger::{LedgerStore, StagedWrite};

static MUTATION_GUARD_INSTALLED: AtomicBool = AtomicBool::new(false);

/// Installs the guard for the whole process. Returns `true` only for the call
/// that actually installed it; later calls are no-ops.
pub fn install_mutation_guard() -> bool {
    let newly_installed = !MUTATION_GUARD_INSTALLED.swap(true, Ordering::SeqCst);
    if newly_installed {
        info!("provenance ledger mutation guard installed");
    }
    newly_installed
}

pub fn mutation_guard_installed() -> bool {
    MUTATION_GUARD_INSTALLED.load(Ordering::SeqCst)
}

/// Clears guard state between test runs. Not for production callers.
#[doc(hidden)]
pub fn reset_mutation_guard_for_tests() {
    MUTATION_GUARD_INSTALLED.store(false, Ordering::SeqCst);
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MutationGuard;

enum Pending {
    /// Inserted by this write-set; later updates to it are still part of the
    /// insert.
    New,
    Row(LedgerRow),
}

impl MutationGuard {
    /// Checks a write-set against committed state, in write-set order. Updates
    /// are compared against the latest state the write-set has produced so far,
    /// so two sanctioned backfills of the same field in one commit still fail.
    pub fn evaluate(store: &LedgerStore, writes: &[StagedWrite]) -> Result<(), StorageError> {
        let mut pending: BTreeMap<(EntityKind, RecordId), Pending> = BTreeMap::new();

        for write in writes {
            match write {
                StagedWrite::Insert(row) => {
                    pending.insert((row.kind(), row.record_id().clone()), Pending::New);
                }
                StagedWrite::Delete { kind, id } => {
                    if kind.is_protected() {
                        warn!(table = kind.table(), id = %id, "IMMUTABLE_DELETE rejected");
                        return Err(StorageError::ImmutableDelete {
                            table: kind.table(),
                            id: id.clone(),
                        });
                    }
                }
                StagedWrite::Update(row) => {
                    let kind = row.kind();
                    if !kind.is_protected() {
                        continue;
                    }
                    let key = (kind, row.record_id().clone());
                    let before = match pending.get(&key) {
                        Some(Pending::New) => continue,
                        Some(Pending::Row(prev)) => Some(prev.clone()),
                        None => store.find_row(kind, row.record_id()),
                    };
                    // Missing targets are rejected by the commit's own checks.
                    if let Some(before) = before {
                        Self::check_update(kind, &before, row)?;
                    }
                    pending.insert(key, Pending::Row(row.clone()));
                }
            }
        }
        Ok(())
    }

    fn check_update(
        kind: EntityKind,
        before: &LedgerRow,
        after: &LedgerRow,
    ) -> Result<(), StorageError> {
        let changed = before.changed_fields(after).unwrap_or_default();
        if changed.is_empty() {
            return Ok(());
        }
        let sanctioned = kind.sanctioned_fields();
        let allowed = changed.iter().all(|field| {
            sanctioned.contains(field)
                && before.field_is_unset(field)
                && !after.field_is_unset(field)
        });
        if allowed {
            info!(
                table = kind.table(),
                id = %after.record_id(),
                fields = ?changed,
                "sanctioned backfill allowed"
            );
            return Ok(());
        }
        warn!(
            table = kind.table(),
            id = %after.record_id(),
            fields = ?changed,
            "IMMUTABLE_UPDATE rejected"
        );
        Err(StorageError::ImmutableUpdate {
            table: kind.table(),
            id: after.record_id().clone(),
            fields: changed,
        })
    }
}
