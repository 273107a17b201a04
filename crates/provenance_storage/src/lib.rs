#![forbid(unsafe_code)]

pub mod aggregate;
pub mod config;
pub mod error;
pub mod guard;
pub mod journal;
pub mod ledger;
pub mod repo;
pub mod trace;
pub mod writer;

pub use aggregate::LineageSummary;
pub use config::LedgerConfig;
pub use error::{ErrorClass, StorageError};
pub use guard::{install_mutation_guard, mutation_guard_installed, reset_mutation_guard_for_tests};
pub use ledger::{CommitReceipt, LedgerStore, LedgerTxn, StagedWrite, StoredEntity};
pub use trace::{LineageMismatch, TraceabilityReport};
