//! Tolerant load / atomic save for the JSON documents in a store.
//!
//! Read paths fail soft: a missing, empty, or unparsable file yields the
//! caller's default value so dashboards keep rendering with partial data.
//! Write paths fail loud so operators know state was not persisted.
//!
//! Saves go through a temporary sibling file plus rename, so a concurrent
//! reader never observes a torn document. Two concurrent savers still race
//! whole-document: last writer wins. That is the accepted contract for these
//! files. Callers needing read-modify-write atomicity within one process go
//! through [`crate::core::broker::DocBroker`] instead of calling save directly.

use crate::core::error::OpsboardError;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;
use ulid::Ulid;

/// Outcome of a tolerant document load.
///
/// `Defaulted` means the file was missing or unreadable and the default
/// structure was substituted. The distinction is observable so tests (and
/// diagnostics) can assert which path was taken instead of inferring it.
#[derive(Debug, Clone)]
pub enum LoadOutcome<T> {
    /// Parsed from the file on disk; absent fields backfilled by serde defaults.
    Loaded(T),
    /// File missing, empty, or unparsable; the default value was substituted.
    Defaulted(T),
}

impl<T> LoadOutcome<T> {
    pub fn into_inner(self) -> T {
        match self {
            LoadOutcome::Loaded(v) | LoadOutcome::Defaulted(v) => v,
        }
    }

    pub fn was_defaulted(&self) -> bool {
        matches!(self, LoadOutcome::Defaulted(_))
    }
}

/// Load a document, substituting `default` when the file is missing, empty,
/// or fails to parse. Never errors and never creates the file as a side
/// effect; the default is persisted only on the first explicit save.
///
/// Forward compatibility: document structs carry `#[serde(default)]` on every
/// field, so an old file read by new code backfills absent fields rather than
/// failing to deserialize.
pub fn load_document<T: DeserializeOwned>(path: &Path, default: T) -> LoadOutcome<T> {
    if !path.exists() {
        return LoadOutcome::Defaulted(default);
    }
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return LoadOutcome::Defaulted(default),
    };
    if content.trim().is_empty() {
        return LoadOutcome::Defaulted(default);
    }
    match serde_json::from_str(&content) {
        Ok(parsed) => LoadOutcome::Loaded(parsed),
        Err(_) => LoadOutcome::Defaulted(default),
    }
}

/// Serialize `doc` as pretty JSON and write it atomically.
pub fn save_document<T: Serialize>(path: &Path, doc: &T) -> Result<(), OpsboardError> {
    let body = serde_json::to_string_pretty(doc)
        .map_err(|e| OpsboardError::StorageError(format!("serialize {}: {}", path.display(), e)))?;
    save_raw(path, &body)
}

/// Write pre-serialized document content atomically: temp sibling + rename.
pub fn save_raw(path: &Path, body: &str) -> Result<(), OpsboardError> {
    let parent = path.parent().ok_or_else(|| {
        OpsboardError::StorageError(format!("document path has no parent: {}", path.display()))
    })?;
    fs::create_dir_all(parent).map_err(OpsboardError::IoError)?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let tmp_path = parent.join(format!(".{}.{}.tmp", file_name, Ulid::new()));

    fs::write(&tmp_path, body).map_err(OpsboardError::IoError)?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(OpsboardError::IoError(err));
    }
    Ok(())
}
