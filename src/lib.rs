//! Opsboard: a daemonless, file-backed coordination store.
//!
//! **Opsboard is the shared state surface for small multi-agent ops setups.**
//!
//! A dashboard process and any number of external agent workers coordinate
//! through a handful of named JSON documents on the local filesystem: no
//! database, no daemon, no lock manager. Opsboard owns the mutation
//! discipline for those documents and the process-hygiene tooling around
//! the workers that write to them.
//!
//! # Subsystems
//!
//! - `blackboard`: append-only team message log with topic indexing
//! - `breaker`: circuit breaker registry with manual recovery
//! - `reaper`: runtime-budget enforcement for agent worker processes
//!
//! # Architecture
//!
//! All document mutations route through the `DocBroker` for:
//! - Serialization within one process (in-process lock)
//! - Audit logging (`store.events.jsonl`)
//!
//! Across processes the documents are last-writer-wins by contract: no
//! advisory lock is taken, and concurrent whole-document savers race. Read
//! paths fail soft (missing or corrupt documents read as defaults); write
//! paths fail loud.
//!
//! # Layout
//!
//! State lives under `.opsboard/data/` at the project root, discovered by
//! walking up from the current directory. Config is `.opsboard/opsboard.toml`.
//!
//! # Crate structure
//!
//! - [`core`]: store handle, document I/O, mutation broker, config, time
//! - [`plugins`]: subsystem implementations (blackboard, breaker, reaper)

pub mod core;
pub mod plugins;

use crate::core::{broker, config, error, store::Store};
use crate::plugins::{blackboard, breaker, reaper};

use clap::{Parser, Subcommand};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[clap(
    name = "opsboard",
    version = env!("CARGO_PKG_VERSION"),
    about = "Opsboard is the daemonless, file-backed coordination store shared by ops dashboards and agent workers: blackboard messaging, circuit-breaker recovery, and stale-worker reaping."
)]
struct Cli {
    #[clap(subcommand)]
    command: Command,
}

#[derive(clap::Args, Debug)]
struct InitCli {
    /// Directory to initialize (defaults to current working directory).
    #[clap(short, long)]
    dir: Option<PathBuf>,
    /// Rewrite opsboard.toml with defaults, keeping the old file as .bak.
    #[clap(long)]
    force: bool,
}

#[derive(clap::Args, Debug)]
struct DataCli {
    #[clap(subcommand)]
    command: DataCommand,
}

#[derive(Subcommand, Debug)]
enum DataCommand {
    /// Show the audit log of brokered mutations.
    Audit,
    /// Subsystem schemas and discovery.
    Schema {
        /// Optional: filter by subsystem name.
        #[clap(long)]
        subsystem: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Bootstrap the .opsboard workspace
    #[clap(name = "init", visible_alias = "i")]
    Init(InitCli),

    /// Shared team blackboard
    #[clap(name = "board", visible_alias = "b")]
    Board(blackboard::BlackboardCli),

    /// Circuit breaker registry
    #[clap(name = "breaker")]
    Breaker(breaker::BreakerCli),

    /// Stale worker detection and termination
    #[clap(name = "reaper", visible_alias = "r")]
    Reaper(reaper::ReaperCli),

    /// Data: audit log and schemas
    #[clap(name = "data")]
    Data(DataCli),

    /// Show version information
    #[clap(name = "version")]
    Version,
}

const CONFIG_TEMPLATE: &str = r#"# Opsboard configuration. Absent keys fall back to built-in defaults.

# Override for the document root (relative paths resolve against the
# project root). Defaults to .opsboard/data/.
# data_dir = "shared/coord"

[reaper]
# Runtime budget before a matched worker is considered stale.
threshold_seconds = 7200
# Grace period between the polite and the forceful kill, in milliseconds.
grace_ms = 1000
# Command-line patterns (regular expressions) identifying agent workers.
patterns = ["spawn_agent.py", "agent_runner.py", "worker_loop.py"]
"#;

fn find_opsboard_root(start_dir: &Path) -> Result<PathBuf, error::OpsboardError> {
    let mut current_dir = PathBuf::from(start_dir);
    loop {
        if current_dir.join(".opsboard").exists() {
            return Ok(current_dir);
        }
        if !current_dir.pop() {
            return Err(error::OpsboardError::NotFound(
                "'.opsboard' directory not found in current or parent directories. Run `opsboard init` first.".to_string(),
            ));
        }
    }
}

fn run_init(init: InitCli, current_dir: &Path) -> Result<(), error::OpsboardError> {
    use colored::Colorize;

    let target_dir = match init.dir {
        Some(d) => d,
        None => current_dir.to_path_buf(),
    };
    let target_dir = fs::canonicalize(&target_dir).map_err(error::OpsboardError::IoError)?;

    let opsboard_dir = target_dir.join(".opsboard");
    let store_root = opsboard_dir.join("data");
    fs::create_dir_all(&store_root).map_err(error::OpsboardError::IoError)?;

    println!();
    println!(
        "  {} {}",
        "OPSBOARD".bright_cyan().bold(),
        "coordination store".bright_black()
    );
    println!();
    println!(
        "    {} {}",
        "●".bright_green(),
        ".opsboard/data/".bright_white()
    );

    let config_path = opsboard_dir.join(config::CONFIG_FILE);
    if config_path.exists() && !init.force {
        println!(
            "    {} {} {}",
            "✓".bright_green(),
            config::CONFIG_FILE.bright_white(),
            "(preserved - existing config kept)".bright_black()
        );
    } else {
        if config_path.exists() {
            let backup_path = opsboard_dir.join(format!("{}.bak", config::CONFIG_FILE));
            fs::rename(&config_path, &backup_path).map_err(error::OpsboardError::IoError)?;
            println!(
                "    {} {} {}",
                "◆".bright_cyan(),
                config::CONFIG_FILE.bright_white(),
                "⟿ opsboard.toml.bak".bright_black()
            );
        }
        fs::write(&config_path, CONFIG_TEMPLATE).map_err(error::OpsboardError::IoError)?;
        println!(
            "    {} {}",
            "●".bright_green(),
            config::CONFIG_FILE.bright_white()
        );
    }

    println!();
    println!(
        "  Workspace ready at {}",
        opsboard_dir.display().to_string().bright_white()
    );
    Ok(())
}

pub fn run() -> Result<(), error::OpsboardError> {
    let cli = Cli::parse();
    let current_dir = std::env::current_dir()?;

    match cli.command {
        Command::Version => {
            // Simple output for scripts/parsing.
            println!("v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        Command::Init(init) => run_init(init, &current_dir),
        other => {
            let project_root = find_opsboard_root(&current_dir)?;
            let opsboard_dir = project_root.join(".opsboard");
            let cfg = config::load_config(&opsboard_dir)?;

            let store_root = match &cfg.data_dir {
                Some(dir) if dir.is_absolute() => dir.clone(),
                Some(dir) => project_root.join(dir),
                None => opsboard_dir.join("data"),
            };
            fs::create_dir_all(&store_root).map_err(error::OpsboardError::IoError)?;

            let store = Store::new(store_root.clone());

            match other {
                Command::Board(board_cli) => blackboard::run_blackboard_cli(&store, board_cli),
                Command::Breaker(breaker_cli) => breaker::run_breaker_cli(&store, breaker_cli),
                Command::Reaper(reaper_cli) => reaper::run_reaper_cli(&cfg.reaper, reaper_cli),
                Command::Data(data_cli) => match data_cli.command {
                    DataCommand::Audit => {
                        let audit_log = store_root.join("store.events.jsonl");
                        if audit_log.exists() {
                            let content = fs::read_to_string(audit_log)?;
                            println!("{}", content);
                        } else {
                            println!("No audit log found.");
                        }
                        Ok(())
                    }
                    DataCommand::Schema { subsystem } => {
                        let mut schemas = std::collections::BTreeMap::new();
                        schemas.insert("blackboard", blackboard::schema());
                        schemas.insert("breaker", breaker::schema());
                        schemas.insert("reaper", reaper::schema());
                        schemas.insert("broker", broker::schema());

                        let output = if let Some(sub) = subsystem {
                            schemas
                                .get(sub.as_str())
                                .cloned()
                                .unwrap_or(serde_json::json!({ "error": "subsystem not found" }))
                        } else {
                            serde_json::json!({
                                "schema_version": "1.0.0",
                                "subsystems": schemas
                            })
                        };
                        println!("{}", serde_json::to_string_pretty(&output).unwrap());
                        Ok(())
                    }
                },
                _ => unreachable!(),
            }
        }
    }
}
