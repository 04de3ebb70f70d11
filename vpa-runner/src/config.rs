//! Config loading: read a base `VpaConfig` JSON document, optionally
//! deep-merge a per-symbol override document onto it, validate the result,
//! and fingerprint it for journal records.

use std::path::Path;

use thiserror::Error;
use vpa_core::config::{self, ConfigError, VpaConfig};
use vpa_core::domain::ConfigHash;

#[derive(Debug, Error)]
pub enum RunnerConfigError {
    #[error("I/O error reading {path}: {source}")]
    Io {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed JSON in {path}: {source}")]
    InvalidJson {
        path: std::path::PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Validation(#[from] ConfigError),
}

fn read_json(path: &Path) -> Result<serde_json::Value, RunnerConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| RunnerConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&raw).map_err(|source| RunnerConfigError::InvalidJson {
        path: path.to_path_buf(),
        source,
    })
}

/// Load a base config document, deep-merge an optional per-symbol override
/// onto it, deserialize into a `VpaConfig`, and validate. Returns the
/// config alongside its content fingerprint.
pub fn load_config(
    base_path: &Path,
    override_path: Option<&Path>,
) -> Result<(VpaConfig, ConfigHash), RunnerConfigError> {
    let base = read_json(base_path)?;
    let merged = match override_path {
        Some(path) => {
            let override_doc = read_json(path)?;
            config::deep_merge(&base, &override_doc)
        }
        None => base,
    };

    let parsed: VpaConfig =
        serde_json::from_value(merged).map_err(|source| RunnerConfigError::InvalidJson {
            path: override_path.unwrap_or(base_path).to_path_buf(),
            source,
        })?;
    config::validate(&parsed)?;
    let hash = config::fingerprint(&parsed);
    Ok((parsed, hash))
}
