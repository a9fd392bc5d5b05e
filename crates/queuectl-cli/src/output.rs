//! Plain-text table / `--json` rendering for read commands. The only
//! "formatter" the CLI collaborator needs per SPEC_FULL.md §6.1; it has no
//! bearing on engine semantics.

use std::collections::BTreeMap;

use queuectl_core::config::ConfigValue;
use queuectl_core::job::Job;
use queuectl_core::worker::WorkerRow;

use crate::control::StatusReport;

pub fn jobs(jobs: &[Job], json: bool) {
    if json {
        print_json(jobs);
        return;
    }

    if jobs.is_empty() {
        println!("(no jobs)");
        return;
    }

    println!(
        "{:<36} {:<10} {:>3} {:>8} {:>3}  {:<19}  COMMAND",
        "ID", "STATE", "PRI", "ATTEMPTS", "RC", "ENQUEUED_AT"
    );
    for job in jobs {
        println!(
            "{:<36} {:<10} {:>3} {:>8} {:>3}  {:<19}  {}",
            job.id,
            job.state.as_str(),
            job.priority,
            job.attempts,
            job.exit_code
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".into()),
            job.enqueued_at.format("%Y-%m-%d %H:%M:%S"),
            truncate(&job.command, 60),
        );
    }
}

pub fn status(report: &StatusReport, json: bool) {
    if json {
        print_json(report);
        return;
    }

    let c = &report.counts;
    println!(
        "pending={} processing={} completed={} failed={} dead={}",
        c.pending, c.processing, c.completed, c.failed, c.dead
    );

    if report.workers.is_empty() {
        println!("(no workers)");
        return;
    }

    println!("{:<44} {:>8} {:<10} {:<19}", "WORKER_ID", "PID", "STATUS", "HEARTBEAT_AT");
    for w in &report.workers {
        println!(
            "{:<44} {:>8} {:<10} {:<19}",
            w.id,
            w.os_pid,
            w.status.as_str(),
            w.heartbeat_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
}

pub fn workers(rows: &[WorkerRow], json: bool) {
    if json {
        print_json(rows);
        return;
    }
    println!("{:<44} {:>8} {:<10} {:<19}", "WORKER_ID", "PID", "STATUS", "HEARTBEAT_AT");
    for w in rows {
        println!(
            "{:<44} {:>8} {:<10} {:<19}",
            w.id,
            w.os_pid,
            w.status.as_str(),
            w.heartbeat_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
}

pub fn config(map: &BTreeMap<String, ConfigValue>, json: bool) {
    if json {
        print_json(map);
        return;
    }
    for (key, value) in map {
        println!("{key} = {}", value.render());
    }
}

pub fn job_id(job: &Job) {
    println!("{}", job.id);
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("failed to serialize output: {e}"),
    }
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max.saturating_sub(1)).collect();
    format!("{truncated}…")
}
