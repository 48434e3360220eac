use opsboard::plugins::reaper::{
    self, ProcessInspector, ProcessRecord, SignalKind, find_stale, reap_all, terminate,
};
use regex::Regex;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::time::Duration;

/// In-memory process table. `Term` removes a process unless it is marked
/// term-resistant; `Kill` always removes it.
struct FakeInspector {
    table: RefCell<BTreeMap<u32, FakeProcess>>,
}

struct FakeProcess {
    record: ProcessRecord,
    term_resistant: bool,
}

impl FakeInspector {
    fn new() -> Self {
        Self {
            table: RefCell::new(BTreeMap::new()),
        }
    }

    fn spawn(&self, pid: u32, elapsed_seconds: u64, command_line: &str, term_resistant: bool) {
        self.table.borrow_mut().insert(
            pid,
            FakeProcess {
                record: ProcessRecord {
                    pid,
                    elapsed_seconds,
                    command_line: command_line.to_string(),
                },
                term_resistant,
            },
        );
    }
}

impl ProcessInspector for FakeInspector {
    fn list_processes(&self) -> Vec<ProcessRecord> {
        self.table
            .borrow()
            .values()
            .map(|p| p.record.clone())
            .collect()
    }

    fn signal(&self, pid: u32, kind: SignalKind) -> bool {
        let mut table = self.table.borrow_mut();
        let Some(process) = table.get(&pid) else {
            return true;
        };
        let survives = kind == SignalKind::Term && process.term_resistant;
        if !survives {
            table.remove(&pid);
        }
        true
    }

    fn alive(&self, pid: u32) -> bool {
        self.table.borrow().contains_key(&pid)
    }
}

fn agent_patterns() -> Vec<Regex> {
    vec![Regex::new("spawn_agent.py").unwrap()]
}

#[test]
fn find_stale_applies_the_runtime_threshold() {
    let inspector = FakeInspector::new();
    inspector.spawn(100, 3600, "python3 spawn_agent.py --genome a1", false);
    inspector.spawn(101, 10000, "python3 spawn_agent.py --genome b2", false);

    let stale = find_stale(&inspector, &agent_patterns(), 7200);
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].pid, 101);
}

#[test]
fn find_stale_ignores_non_matching_command_lines() {
    let inspector = FakeInspector::new();
    inspector.spawn(200, 90000, "postgres: writer process", false);
    inspector.spawn(201, 90000, "python3 spawn_agent.py --genome c3", false);

    let stale = find_stale(&inspector, &agent_patterns(), 7200);
    assert_eq!(stale.len(), 1);
    assert_eq!(stale[0].pid, 201);
}

#[test]
fn find_stale_excludes_the_reaper_itself() {
    let inspector = FakeInspector::new();
    inspector.spawn(std::process::id(), 90000, "python3 spawn_agent.py", false);

    assert!(find_stale(&inspector, &agent_patterns(), 7200).is_empty());
}

#[test]
fn find_stale_on_an_empty_table_is_empty_not_an_error() {
    let inspector = FakeInspector::new();
    assert!(find_stale(&inspector, &agent_patterns(), 7200).is_empty());
}

#[test]
fn terminate_of_an_exited_pid_is_success() {
    let inspector = FakeInspector::new();
    assert!(terminate(&inspector, 4242, Duration::ZERO));
}

#[test]
fn terminate_prefers_the_polite_signal() {
    let inspector = FakeInspector::new();
    inspector.spawn(300, 90000, "python3 spawn_agent.py", false);

    assert!(terminate(&inspector, 300, Duration::ZERO));
    assert!(!inspector.alive(300));
}

#[test]
fn terminate_escalates_to_kill_when_term_is_ignored() {
    let inspector = FakeInspector::new();
    inspector.spawn(301, 90000, "python3 spawn_agent.py", true);

    assert!(terminate(&inspector, 301, Duration::ZERO));
    assert!(!inspector.alive(301));
}

#[test]
fn reap_all_terminates_each_stale_worker_independently() {
    let inspector = FakeInspector::new();
    inspector.spawn(400, 10000, "python3 spawn_agent.py --genome a1", false);
    inspector.spawn(401, 36000, "python3 spawn_agent.py --genome b2", true);
    inspector.spawn(402, 60, "python3 spawn_agent.py --genome c3", false);
    inspector.spawn(403, 90000, "nginx: worker process", false);

    let report = reap_all(&inspector, &agent_patterns(), 7200, Duration::ZERO);
    assert_eq!(report.killed_count, 2);
    assert_eq!(report.details.len(), 2);
    assert!(report.details.iter().all(|d| d.killed));

    let hours: BTreeMap<u32, f64> = report
        .details
        .iter()
        .map(|d| (d.pid, d.runtime_hours))
        .collect();
    assert_eq!(hours[&400], 2.8);
    assert_eq!(hours[&401], 10.0);

    // Fresh worker and unrelated process untouched.
    assert!(inspector.alive(402));
    assert!(inspector.alive(403));
}

#[test]
fn reap_all_with_nothing_stale_reports_zero() {
    let inspector = FakeInspector::new();
    inspector.spawn(500, 60, "python3 spawn_agent.py", false);

    let report = reap_all(&inspector, &agent_patterns(), 7200, Duration::ZERO);
    assert_eq!(report.killed_count, 0);
    assert!(report.details.is_empty());
}

#[test]
fn schema_names_the_subsystem() {
    let schema = reaper::schema();
    assert_eq!(schema["name"], "reaper");
    assert!(schema["storage"].as_array().unwrap().is_empty());
}
