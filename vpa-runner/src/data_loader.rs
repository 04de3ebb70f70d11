//! File-backed `BarStore` — one JSONL file per `(symbol, timeframe)`, one
//! `Bar` record per line, sorted ascending by timestamp.
//!
//! Layout: `{base_dir}/{symbol}/{tf}.jsonl`. This is the on-disk format the
//! `ingest` CLI subcommand writes and `backtest`/`scan`/`paper` read back.

use std::fs;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use thiserror::Error;
use vpa_core::domain::{Bar, BarError};
use vpa_core::interfaces::BarStore;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no bar data for {symbol}/{tf} at {path}")]
    NotFound {
        symbol: String,
        tf: String,
        path: PathBuf,
    },

    #[error("I/O error reading {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON on line {line} of {path}: {source}")]
    InvalidJson {
        path: PathBuf,
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid bar on line {line} of {path}: {source}")]
    InvalidBar {
        path: PathBuf,
        line: usize,
        #[source]
        source: BarError,
    },

    #[error("bar on line {line} of {path} is not strictly after the previous bar's timestamp")]
    OutOfOrder { path: PathBuf, line: usize },
}

pub struct JsonlBarStore {
    base_dir: PathBuf,
}

impl JsonlBarStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn path_for(&self, symbol: &str, tf: &str) -> PathBuf {
        self.base_dir.join(symbol).join(format!("{tf}.jsonl"))
    }

    /// Append `bars` to the symbol/timeframe file, creating parent
    /// directories as needed. Used by the `ingest` subcommand; callers are
    /// responsible for ensuring `bars` continues strictly after whatever is
    /// already on disk.
    pub fn append(&self, symbol: &str, tf: &str, bars: &[Bar]) -> Result<(), LoadError> {
        let path = self.path_for(symbol, tf);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
        }
        use std::io::Write;
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
        for bar in bars {
            let line = serde_json::to_string(bar).expect("Bar always serializes");
            writeln!(file, "{line}").map_err(|source| LoadError::Io {
                path: path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

fn load_from_path(path: &Path, symbol: &str, tf: &str) -> Result<Vec<Bar>, LoadError> {
    if !path.exists() {
        return Err(LoadError::NotFound {
            symbol: symbol.to_string(),
            tf: tf.to_string(),
            path: path.to_path_buf(),
        });
    }
    let file = fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::new(file);

    let mut bars = Vec::new();
    let mut prev_ts = None;
    for (idx, line) in reader.lines().enumerate() {
        let line_no = idx + 1;
        let line = line.map_err(|source| LoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let bar: Bar = serde_json::from_str(&line).map_err(|source| LoadError::InvalidJson {
            path: path.to_path_buf(),
            line: line_no,
            source,
        })?;
        bar.validate().map_err(|source| LoadError::InvalidBar {
            path: path.to_path_buf(),
            line: line_no,
            source,
        })?;
        if let Some(prev) = prev_ts {
            if bar.timestamp <= prev {
                return Err(LoadError::OutOfOrder {
                    path: path.to_path_buf(),
                    line: line_no,
                });
            }
        }
        prev_ts = Some(bar.timestamp);
        bars.push(bar);
    }
    Ok(bars)
}

impl BarStore for JsonlBarStore {
    type Error = LoadError;

    fn load(&self, symbol: &str, tf: &str) -> Result<Vec<Bar>, Self::Error> {
        let path = self.path_for(symbol, tf);
        load_from_path(&path, symbol, tf)
    }
}
