#![forbid(unsafe_code)]

use std::env;
use std::path::PathBuf;

pub const GUARD_ENABLED_ENV: &str = "PROVENANCE_LEDGER_GUARD_ENABLED";
pub const JOURNAL_PATH_ENV: &str = "PROVENANCE_LEDGER_JOURNAL_PATH";

/// Process-level ledger settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Installs the process-wide mutation guard when a store is opened.
    pub guard_enabled: bool,
    /// Append-only commit journal; `None` keeps the store purely in memory.
    pub journal_path: Option<PathBuf>,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            guard_enabled: true,
            journal_path: None,
        }
    }
}

impl LedgerConfig {
    pub fn from_env() -> Self {
        Self::from_env_var_map(|key| env::var(key).ok())
    }

    pub fn from_env_var_map<F>(mut env_getter: F) -> Self
    where
        F: FnMut(&str) -> Option<String>,
    {
        let guard_enabled = match env_getter(GUARD_ENABLED_ENV) {
            Some(v) => !matches!(
                v.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "off" | "no"
            ),
            None => true,
        };
        let journal_path = env_getter(JOURNAL_PATH_ENV)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
            .map(PathBuf::from);
        Self {
            guard_enabled,
            journal_path,
        }
    }

    pub fn with_journal(mut self, path: impl Into<PathBuf>) -> Self {
        self.journal_path = Some(path.into());
        self
    }
}
