//! Circuit breaker registry: read and manually recover failure-tracking state.
//!
//! Entries are created and opened by the external callers that detect
//! failures; this subsystem only surfaces the registry and drives the
//! `open -> closed` recovery transition.

use crate::core::broker::DocBroker;
use crate::core::document;
use crate::core::error::OpsboardError;
use crate::core::store::Store;
use crate::core::time;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Note written when an operator resets a breaker.
pub const MANUAL_RESET_NOTE: &str = "manually reset by operator";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BreakerStatus {
    Closed,
    Open,
}

fn default_status() -> BreakerStatus {
    BreakerStatus::Closed
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BreakerState {
    #[serde(default = "default_status")]
    pub state: BreakerStatus,
    #[serde(default)]
    pub failure_count: u64,
    #[serde(default)]
    pub last_success_time: Option<String>,
    #[serde(default)]
    pub last_update: String,
    #[serde(default)]
    pub note: Option<String>,
}

/// The persisted registry: breaker name -> state. BTreeMap keeps listings
/// and the on-disk file deterministic.
pub type BreakerDoc = BTreeMap<String, BreakerState>;

/// Full registry, verbatim. Missing or unreadable document reads as empty.
pub fn list(store: &Store) -> BreakerDoc {
    document::load_document(&store.breakers_path(), BreakerDoc::new()).into_inner()
}

/// Force a breaker closed. `action` must be `reset` (overwrites the note
/// with the manual-reset marker) or `close` (preserves the note); anything
/// else is rejected before the document is touched. Unknown names fail with
/// `NotFound` and leave the document unchanged.
pub fn recover(store: &Store, name: &str, action: &str) -> Result<BreakerState, OpsboardError> {
    let overwrite_note = match action {
        "reset" => true,
        "close" => false,
        other => {
            return Err(OpsboardError::InvalidArgument(format!(
                "unknown breaker action '{}' (expected 'reset' or 'close')",
                other
            )));
        }
    };

    let broker = DocBroker::new(&store.root);
    broker.with_doc(
        &store.breakers_path(),
        BreakerDoc::new(),
        "opsboard",
        "breaker.recover",
        |doc: &mut BreakerDoc| {
            let entry = doc.get_mut(name).ok_or_else(|| {
                OpsboardError::NotFound(format!("circuit breaker '{}' is not registered", name))
            })?;

            let now = time::now_epoch_z();
            entry.state = BreakerStatus::Closed;
            entry.failure_count = 0;
            entry.last_success_time = Some(now.clone());
            entry.last_update = now;
            if overwrite_note {
                entry.note = Some(MANUAL_RESET_NOTE.to_string());
            }

            Ok(entry.clone())
        },
    )
}

#[derive(Parser, Debug)]
#[clap(name = "breaker", about = "Circuit breaker registry")]
pub struct BreakerCli {
    #[clap(subcommand)]
    pub command: BreakerCommand,
}

#[derive(Subcommand, Debug)]
pub enum BreakerCommand {
    /// Show the full registry.
    List,
    /// Force a breaker closed (`reset` rewrites the note, `close` keeps it).
    Recover {
        #[clap(long)]
        name: String,
        #[clap(long, default_value = "reset")]
        action: String,
    },
}

pub fn run_breaker_cli(store: &Store, cli: BreakerCli) -> Result<(), OpsboardError> {
    match cli.command {
        BreakerCommand::List => {
            let registry = list(store);
            println!("{}", serde_json::to_string_pretty(&registry).unwrap());
        }
        BreakerCommand::Recover { name, action } => {
            let updated = recover(store, &name, &action)?;
            let envelope = time::command_envelope(
                "breaker.recover",
                "ok",
                serde_json::json!({ "name": name, "breaker": updated }),
            );
            println!("{}", serde_json::to_string_pretty(&envelope).unwrap());
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "breaker",
        "version": "0.1.0",
        "description": "Named circuit breakers with manual open -> closed recovery",
        "commands": [
            { "name": "list", "description": "Show all breakers" },
            { "name": "recover", "description": "Force a breaker closed (reset or close)" }
        ],
        "storage": ["circuit_breakers.json"]
    })
}
