#![forbid(unsafe_code)]

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::StorageError;
use crate::ledger::StagedWrite;

pub const JOURNAL_SCHEMA_VERSION: u8 = 1;

/// One committed transaction, one JSON line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub schema_version: u8,
    pub commit_seq: u64,
    pub writes: Vec<StagedWrite>,
}

/// Append-only JSONL record of committed write-sets.
#[derive(Debug, Clone)]
pub struct CommitJournal {
    path: PathBuf,
}

impl CommitJournal {
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|err| journal_error(path, err))?;
            }
        }
        if !path.exists() {
            File::create(path).map_err(|err| journal_error(path, err))?;
        }
        Ok(Self {
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Entries from every complete line. An unterminated final line is never
    /// returned: its commit was not acknowledged.
    pub fn read_entries(&self) -> Result<Vec<JournalEntry>, StorageError> {
        self.scan().map(|(entries, _)| entries)
    }

    /// Reads the journal for replay and cuts off an unterminated final line
    /// left by a crash mid-append. Corruption on a complete line is an error.
    pub fn recover(&self) -> Result<Vec<JournalEntry>, StorageError> {
        let (entries, torn_at) = self.scan()?;
        if let Some(len) = torn_at {
            warn!(
                path = %self.path.display(),
                keep_bytes = len,
                "discarding unterminated journal tail"
            );
            OpenOptions::new()
                .write(true)
                .open(&self.path)
                .and_then(|file| file.set_len(len).and_then(|_| file.sync_data()))
                .map_err(|err| journal_error(&self.path, err))?;
        }
        Ok(entries)
    }

    /// Parses complete lines. Also returns the byte length to keep when the
    /// file ends in an unterminated line.
    fn scan(&self) -> Result<(Vec<JournalEntry>, Option<u64>), StorageError> {
        let bytes = fs::read(&self.path).map_err(|err| journal_error(&self.path, err))?;
        let complete_len = bytes.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
        let torn_at = (complete_len < bytes.len()).then_some(complete_len as u64);

        let mut entries = Vec::new();
        for (line_no, line) in bytes[..complete_len].split(|b| *b == b'\n').enumerate() {
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            let entry: JournalEntry =
                serde_json::from_slice(line).map_err(|err| StorageError::Journal {
                    path: self.path.display().to_string(),
                    reason: format!("parse failed at line {}: {err}", line_no + 1),
                })?;
            if entry.schema_version != JOURNAL_SCHEMA_VERSION {
                return Err(StorageError::Journal {
                    path: self.path.display().to_string(),
                    reason: format!(
                        "unsupported schema_version={} at line {}",
                        entry.schema_version,
                        line_no + 1
                    ),
                });
            }
            entries.push(entry);
        }
        Ok((entries, torn_at))
    }

    pub fn append(&self, commit_seq: u64, writes: &[StagedWrite]) -> Result<(), StorageError> {
        let entry = JournalEntry {
            schema_version: JOURNAL_SCHEMA_VERSION,
            commit_seq,
            writes: writes.to_vec(),
        };
        let json = serde_json::to_string(&entry).map_err(|err| StorageError::Journal {
            path: self.path.display().to_string(),
            reason: format!("encode failed: {err}"),
        })?;
        let mut file = OpenOptions::new()
            .append(true)
            .create(true)
            .open(&self.path)
            .map_err(|err| journal_error(&self.path, err))?;
        file.write_all(json.as_bytes())
            .and_then(|_| file.write_all(b"\n"))
            .and_then(|_| file.sync_data())
            .map_err(|err| journal_error(&self.path, err))
    }
}

fn journal_error(path: &Path, err: std::io::Error) -> StorageError {
    StorageError::Journal {
        path: path.display().to_string(),
        reason: err.to_string(),
    }
}
