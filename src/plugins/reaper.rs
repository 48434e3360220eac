//! Stale process reaper: find and terminate agent workers past their
//! runtime budget.
//!
//! Everything here is advisory. Enumeration trouble reads as "no stale
//! processes", a PID that exits between observation and signal counts as
//! success, and one stubborn process never aborts the batch.

use crate::core::config::ReaperConfig;
use crate::core::error::OpsboardError;
use crate::core::time;
use clap::{Parser, Subcommand};
use regex::Regex;
use serde::Serialize;
use std::time::Duration;
use sysinfo::{Pid, Signal, System};

/// Live snapshot of one OS process. Never persisted.
#[derive(Debug, Clone, Serialize)]
pub struct ProcessRecord {
    pub pid: u32,
    pub elapsed_seconds: u64,
    pub command_line: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalKind {
    /// Polite request to exit.
    Term,
    /// Forceful kill after the grace period.
    Kill,
}

/// Capability seam over the OS process table, so reaper logic is testable
/// against a fake table instead of live processes.
pub trait ProcessInspector {
    fn list_processes(&self) -> Vec<ProcessRecord>;
    /// Best-effort signal delivery. Signalling a PID that no longer exists
    /// is a no-op success.
    fn signal(&self, pid: u32, kind: SignalKind) -> bool;
    fn alive(&self, pid: u32) -> bool;
}

/// Production inspector backed by the live process table.
pub struct SystemInspector;

impl SystemInspector {
    fn snapshot() -> System {
        let mut sys = System::new_all();
        sys.refresh_all();
        sys
    }
}

impl ProcessInspector for SystemInspector {
    fn list_processes(&self) -> Vec<ProcessRecord> {
        let sys = Self::snapshot();
        sys.processes()
            .iter()
            .map(|(pid, process)| ProcessRecord {
                pid: pid.as_u32(),
                elapsed_seconds: process.run_time(),
                command_line: process
                    .cmd()
                    .iter()
                    .map(|arg| arg.to_string_lossy())
                    .collect::<Vec<_>>()
                    .join(" "),
            })
            .collect()
    }

    fn signal(&self, pid: u32, kind: SignalKind) -> bool {
        let sys = Self::snapshot();
        match sys.process(Pid::from_u32(pid)) {
            Some(process) => match kind {
                // kill_with returns None on platforms without SIGTERM;
                // fall through to the unconditional kill there.
                SignalKind::Term => process.kill_with(Signal::Term).unwrap_or_else(|| process.kill()),
                SignalKind::Kill => process.kill(),
            },
            None => true,
        }
    }

    fn alive(&self, pid: u32) -> bool {
        Self::snapshot().process(Pid::from_u32(pid)).is_some()
    }
}

/// Processes whose command line matches the allow-list and whose runtime
/// exceeds `threshold_seconds`. The reaper's own process is always excluded.
pub fn find_stale(
    inspector: &dyn ProcessInspector,
    patterns: &[Regex],
    threshold_seconds: u64,
) -> Vec<ProcessRecord> {
    let own_pid = std::process::id();
    inspector
        .list_processes()
        .into_iter()
        .filter(|p| p.pid != own_pid)
        .filter(|p| patterns.iter().any(|re| re.is_match(&p.command_line)))
        .filter(|p| p.elapsed_seconds > threshold_seconds)
        .collect()
}

/// Graceful-then-forceful termination: Term, wait out the grace period,
/// Kill if still alive. A process that exits on its own at any point is
/// success, not failure.
pub fn terminate(inspector: &dyn ProcessInspector, pid: u32, grace: Duration) -> bool {
    if !inspector.alive(pid) {
        return true;
    }
    inspector.signal(pid, SignalKind::Term);
    std::thread::sleep(grace);
    if !inspector.alive(pid) {
        return true;
    }
    inspector.signal(pid, SignalKind::Kill) || !inspector.alive(pid)
}

#[derive(Debug, Clone, Serialize)]
pub struct ReapDetail {
    pub pid: u32,
    pub runtime_hours: f64,
    pub killed: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReapReport {
    pub killed_count: usize,
    pub details: Vec<ReapDetail>,
}

/// Find and terminate every stale worker independently; one failure does
/// not abort the batch.
pub fn reap_all(
    inspector: &dyn ProcessInspector,
    patterns: &[Regex],
    threshold_seconds: u64,
    grace: Duration,
) -> ReapReport {
    let stale = find_stale(inspector, patterns, threshold_seconds);
    let details: Vec<ReapDetail> = stale
        .iter()
        .map(|p| ReapDetail {
            pid: p.pid,
            runtime_hours: (p.elapsed_seconds as f64 / 3600.0 * 10.0).round() / 10.0,
            killed: terminate(inspector, p.pid, grace),
        })
        .collect();

    ReapReport {
        killed_count: details.iter().filter(|d| d.killed).count(),
        details,
    }
}

#[derive(Parser, Debug)]
#[clap(name = "reaper", about = "Stale agent-worker detection and termination")]
pub struct ReaperCli {
    #[clap(subcommand)]
    pub command: ReaperCommand,
}

#[derive(Subcommand, Debug)]
pub enum ReaperCommand {
    /// List stale worker candidates without touching them.
    List {
        /// Runtime budget in seconds; defaults to the configured value.
        #[clap(long)]
        threshold: Option<u64>,
    },
    /// Terminate all stale workers and report the outcome.
    Reap {
        #[clap(long)]
        threshold: Option<u64>,
    },
}

pub fn run_reaper_cli(config: &ReaperConfig, cli: ReaperCli) -> Result<(), OpsboardError> {
    let patterns = config.compiled_patterns()?;
    let inspector = SystemInspector;

    match cli.command {
        ReaperCommand::List { threshold } => {
            let threshold = threshold.unwrap_or(config.threshold_seconds);
            let stale = find_stale(&inspector, &patterns, threshold);
            let output = serde_json::json!({
                "threshold_seconds": threshold,
                "count": stale.len(),
                "stale": stale,
            });
            println!("{}", serde_json::to_string_pretty(&output).unwrap());
        }
        ReaperCommand::Reap { threshold } => {
            let threshold = threshold.unwrap_or(config.threshold_seconds);
            let grace = Duration::from_millis(config.grace_ms);
            let report = reap_all(&inspector, &patterns, threshold, grace);
            let envelope = time::command_envelope(
                "reaper.reap",
                "ok",
                serde_json::json!({ "report": report }),
            );
            println!("{}", serde_json::to_string_pretty(&envelope).unwrap());
        }
    }
    Ok(())
}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "reaper",
        "version": "0.1.0",
        "description": "Runtime-budget enforcement for agent worker processes",
        "commands": [
            { "name": "list", "description": "Show workers past the runtime budget" },
            { "name": "reap", "description": "Terminate stale workers (term, grace, kill)" }
        ],
        "storage": []
    })
}
