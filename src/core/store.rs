//! Store abstraction for Opsboard's coordination state.
//!
//! A store is a directory of named JSON documents shared between the
//! dashboard process and external agent workers. There is no database and
//! no cross-process lock manager: every document is plain UTF-8 JSON,
//! human-editable, and mutated via load-modify-save through the broker.

use std::path::PathBuf;

/// Blackboard document file name inside the store root.
pub const BLACKBOARD_DOC: &str = "blackboard.json";
/// Circuit breaker registry file name inside the store root.
pub const BREAKERS_DOC: &str = "circuit_breakers.json";

/// Store handle representing an Opsboard state workspace.
///
/// All subsystem state (blackboard, circuit breakers) is scoped to a store.
/// Callers obtain a handle for a configured root directory; tests point it
/// at a tempdir.
#[derive(Debug, Clone)]
pub struct Store {
    /// Absolute path to the store root directory.
    pub root: PathBuf,
}

impl Store {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn blackboard_path(&self) -> PathBuf {
        self.root.join(BLACKBOARD_DOC)
    }

    pub fn breakers_path(&self) -> PathBuf {
        self.root.join(BREAKERS_DOC)
    }
}
