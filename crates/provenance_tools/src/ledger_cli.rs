#![forbid(unsafe_code)]

use provenance_contracts::RecordId;
use provenance_storage::{LedgerStore, StorageError};
use serde_json::json;
use tracing::debug;

pub const LEDGER_USAGE: &str =
    "usage: provenance ledger <summary|verify|rows> <lineage_root_id> [ids...]";

/// Runs one read-only ledger subcommand and renders the result as JSON.
pub fn execute_ledger_command(
    store: &LedgerStore,
    subcommand: &str,
    lineage_root_id: Option<&str>,
    ids: &[String],
) -> Result<String, String> {
    let root = parse_record_id(lineage_root_id.ok_or_else(|| LEDGER_USAGE.to_string())?)?;
    let ids = ids
        .iter()
        .map(|raw| parse_record_id(raw))
        .collect::<Result<Vec<_>, _>>()?;
    debug!(subcommand, lineage_root = %root, ids = ids.len(), "ledger command");

    let value = match subcommand {
        "summary" => {
            if !ids.is_empty() {
                return Err("summary takes no ids".to_string());
            }
            serde_json::to_value(store.lineage_summary(&root))
        }
        "verify" => {
            let filter = (!ids.is_empty()).then_some(ids.as_slice());
            let report = store
                .verify_traceability(&root, filter)
                .map_err(render_storage_error)?;
            serde_json::to_value(report)
        }
        "rows" => {
            let rows = if ids.is_empty() {
                store.evidence_by_lineage(&root, None, None)
            } else {
                store
                    .evidence_by_ids(&ids, &root)
                    .map_err(render_storage_error)?
            };
            serde_json::to_value(rows)
        }
        _ => {
            return Err(format!(
                "unknown ledger subcommand: {subcommand}. expected one of: summary, verify, rows"
            ))
        }
    }
    .map_err(|e| format!("failed to encode output: {e}"))?;

    serde_json::to_string_pretty(&value).map_err(|e| format!("failed to encode output: {e}"))
}

fn parse_record_id(raw: &str) -> Result<RecordId, String> {
    RecordId::new(raw).map_err(|e| format!("invalid record id '{raw}': {e}"))
}

fn render_storage_error(err: StorageError) -> String {
    let detail = match &err {
        StorageError::MissingEvidence { ids, .. } => json!({ "missing": ids }),
        StorageError::LineageMismatch { mismatches, .. } => json!({ "mismatches": mismatches }),
        _ => json!({}),
    };
    format!("{}: {err} {detail}", err.code())
}
