//! The Doc Broker is the "Thin Waist" for document mutation.
//!
//! Every read-modify-write on a shared JSON document routes through
//! [`DocBroker::with_doc`], which serializes mutations within this process
//! and appends an audit event to `store.events.jsonl`. Writers in *other*
//! processes are not serialized: the documents keep last-writer-wins
//! semantics across processes, and callers accept that race window.

use crate::core::document::{self, LoadOutcome};
use crate::core::error::OpsboardError;
use crate::core::time;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

pub struct DocBroker {
    audit_log_path: PathBuf,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DocEvent {
    pub ts: String,
    pub event_id: String,
    pub actor: String,
    pub op: String,
    pub doc_id: String,
    pub status: String,
    /// SHA-256 of the persisted document body; absent when nothing was saved.
    pub content_hash: Option<String>,
}

impl DocBroker {
    pub fn new(root: &Path) -> Self {
        Self {
            audit_log_path: root.join("store.events.jsonl"),
        }
    }

    /// Execute one load-modify-save step on a document as a single logical
    /// mutation. The closure mutates the loaded (or defaulted) document; on
    /// success the document is saved atomically and a `success` event is
    /// logged. If the closure fails, nothing is saved (the document on disk
    /// is left exactly as it was) and an `error` event is logged.
    pub fn with_doc<T, R, F>(
        &self,
        doc_path: &Path,
        default: T,
        actor: &str,
        op_name: &str,
        f: F,
    ) -> Result<R, OpsboardError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce(&mut T) -> Result<R, OpsboardError>,
    {
        // In-process serialization only. Cross-process writers race by design.
        static DOC_LOCK: Mutex<()> = Mutex::new(());
        let _lock = DOC_LOCK.lock().unwrap();

        let doc_id = doc_path
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        let mut doc = match document::load_document(doc_path, default) {
            LoadOutcome::Loaded(d) | LoadOutcome::Defaulted(d) => d,
        };

        let value = match f(&mut doc) {
            Ok(v) => v,
            Err(err) => {
                self.log_event(actor, op_name, &doc_id, "error", None)?;
                return Err(err);
            }
        };

        let body = match serde_json::to_string_pretty(&doc) {
            Ok(b) => b,
            Err(err) => {
                self.log_event(actor, op_name, &doc_id, "error", None)?;
                return Err(OpsboardError::StorageError(format!(
                    "serialize {}: {}",
                    doc_path.display(),
                    err
                )));
            }
        };
        let content_hash = hash_body(&body);

        match document::save_raw(doc_path, &body) {
            Ok(()) => {
                self.log_event(actor, op_name, &doc_id, "success", Some(&content_hash))?;
                Ok(value)
            }
            Err(err) => {
                self.log_event(actor, op_name, &doc_id, "error", Some(&content_hash))?;
                Err(err)
            }
        }
    }

    fn log_event(
        &self,
        actor: &str,
        op: &str,
        doc_id: &str,
        status: &str,
        content_hash: Option<&str>,
    ) -> Result<(), OpsboardError> {
        use std::fs::OpenOptions;
        use std::io::Write;

        let ev = DocEvent {
            ts: time::now_epoch_z(),
            event_id: time::new_event_id(),
            actor: actor.to_string(),
            op: op.to_string(),
            doc_id: doc_id.to_string(),
            status: status.to_string(),
            content_hash: content_hash.map(|s| s.to_string()),
        };

        if let Some(parent) = self.audit_log_path.parent() {
            std::fs::create_dir_all(parent).map_err(OpsboardError::IoError)?;
        }
        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log_path)
            .map_err(OpsboardError::IoError)?;

        writeln!(f, "{}", serde_json::to_string(&ev).unwrap()).map_err(OpsboardError::IoError)?;
        Ok(())
    }
}

fn hash_body(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    format!("{:x}", hasher.finalize())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "broker",
        "version": "0.1.0",
        "description": "Document mutation broker (The Thin Waist)",
        "commands": [
            { "name": "audit", "description": "Show the mutation audit log" }
        ],
        "storage": ["store.events.jsonl"]
    })
}
