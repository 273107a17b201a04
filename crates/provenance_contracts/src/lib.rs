#![forbid(unsafe_code)]

pub mod common;
pub mod identity;
pub mod ledger;
pub mod payload;

pub use common::{ContractViolation, RecordId, SchemaVersion, Validate};
pub use identity::IdNamespace;
