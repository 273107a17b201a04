#![forbid(unsafe_code)]

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaVersion(pub u32);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ContractViolation {
    #[error("invalid value for {field}: {reason}")]
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

pub const RECORD_ID_MAX_LEN: usize = 128;
pub const TOKEN_MAX_LEN: usize = 96;

pub(crate) fn validate_text(
    field: &'static str,
    value: &str,
    max_len: usize,
) -> Result<(), ContractViolation> {
    if value.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if value.len() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "exceeds max length",
        });
    }
    Ok(())
}

/// Engine ids and record kinds take part in identity derivation, so they are
/// restricted to a printable token alphabet without the `|` key separator.
pub(crate) fn validate_token(field: &'static str, value: &str) -> Result<(), ContractViolation> {
    validate_text(field, value, TOKEN_MAX_LEN)?;
    if !value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.' | ':' | '/'))
    {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must contain only [A-Za-z0-9_.:/-]",
        });
    }
    Ok(())
}

/// Opaque deterministic identifier shared by every ledger table.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Result<Self, ContractViolation> {
        let id = Self(id.into());
        id.validate()?;
        Ok(id)
    }

    pub(crate) fn from_derived(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Validate for RecordId {
    fn validate(&self) -> Result<(), ContractViolation> {
        validate_text("record_id", &self.0, RECORD_ID_MAX_LEN)?;
        if self.0.chars().any(|c| c.is_whitespace() || c == '|') {
            return Err(ContractViolation::InvalidValue {
                field: "record_id",
                reason: "must not contain whitespace or '|'",
            });
        }
        Ok(())
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for RecordId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
