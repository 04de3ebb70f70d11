//! File-backed `Journal` — appends one `VpaEvent` per line to a single
//! JSONL file, flushing after every write so a crash mid-run never loses
//! more than the event it was in the middle of recording.
//!
//! Layout: one file per run, path chosen by the caller (typically
//! `{base_dir}/{symbol}/{tf}.journal.jsonl` alongside the bar data it was
//! produced from).

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use vpa_core::interfaces::{Journal, VpaEvent};

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("I/O error writing journal {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize event for journal {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub struct JsonlJournal {
    path: PathBuf,
    file: fs::File,
}

impl JsonlJournal {
    /// Open (creating if absent) the journal file at `path` for appending,
    /// creating parent directories as needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, JournalError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| JournalError::Io {
                path: path.clone(),
                source,
            })?;
        }
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| JournalError::Io {
                path: path.clone(),
                source,
            })?;
        Ok(Self { path, file })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Journal for JsonlJournal {
    type Error = JournalError;

    fn record(&mut self, event: VpaEvent) -> Result<(), Self::Error> {
        let line = serde_json::to_string(&event).map_err(|source| JournalError::Serialize {
            path: self.path.clone(),
            source,
        })?;
        writeln!(self.file, "{line}").map_err(|source| JournalError::Io {
            path: self.path.clone(),
            source,
        })?;
        self.file.flush().map_err(|source| JournalError::Io {
            path: self.path.clone(),
            source,
        })
    }
}
