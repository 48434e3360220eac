//! Configuration loading for the Opsboard workspace.
//!
//! Config lives at `.opsboard/opsboard.toml`. No config file means defaults
//! (not an error); a file that exists but fails to parse is a hard error so
//! operators notice broken config instead of silently running on defaults.

use crate::core::error::OpsboardError;
use regex::Regex;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE: &str = "opsboard.toml";

#[derive(Debug, Clone, Deserialize, Default)]
pub struct OpsboardConfig {
    /// Override for the document root. Relative paths resolve against the
    /// project root; unset means `.opsboard/data/`.
    #[serde(default)]
    pub data_dir: Option<PathBuf>,
    #[serde(default)]
    pub reaper: ReaperConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReaperConfig {
    /// Runtime budget in seconds before a matched worker counts as stale.
    #[serde(default = "default_threshold_seconds")]
    pub threshold_seconds: u64,
    /// Grace period between the polite and the forceful kill, in milliseconds.
    #[serde(default = "default_grace_ms")]
    pub grace_ms: u64,
    /// Command-line patterns (regular expressions; plain substrings work as-is)
    /// identifying agent worker invocations.
    #[serde(default = "default_patterns")]
    pub patterns: Vec<String>,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            threshold_seconds: default_threshold_seconds(),
            grace_ms: default_grace_ms(),
            patterns: default_patterns(),
        }
    }
}

impl ReaperConfig {
    /// Compile the configured patterns. An invalid pattern is a config error,
    /// reported with the offending source string.
    pub fn compiled_patterns(&self) -> Result<Vec<Regex>, OpsboardError> {
        self.patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    OpsboardError::ValidationError(format!("bad reaper pattern '{}': {}", p, e))
                })
            })
            .collect()
    }
}

fn default_threshold_seconds() -> u64 {
    7200
}

fn default_grace_ms() -> u64 {
    1000
}

fn default_patterns() -> Vec<String> {
    vec![
        "spawn_agent.py".to_string(),
        "agent_runner.py".to_string(),
        "worker_loop.py".to_string(),
    ]
}

/// Load config from `<opsboard_dir>/opsboard.toml`, falling back to defaults
/// when the file does not exist.
pub fn load_config(opsboard_dir: &Path) -> Result<OpsboardConfig, OpsboardError> {
    let config_path = opsboard_dir.join(CONFIG_FILE);
    if !config_path.exists() {
        return Ok(OpsboardConfig::default());
    }
    let content = fs::read_to_string(&config_path).map_err(OpsboardError::IoError)?;
    toml::from_str(&content).map_err(|e| {
        OpsboardError::ValidationError(format!("parse {}: {}", config_path.display(), e))
    })
}
