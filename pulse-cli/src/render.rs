use pulse_core::{Plan, Task, TaskStatus};
use std::fmt::Write;

use crate::store::TaskRecord;

fn status_mark(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Todo => " ",
        TaskStatus::Doing => ">",
        TaskStatus::Done => "x",
        TaskStatus::Blocked => "!",
    }
}

fn task_line(t: &Task) -> String {
    format!("[{}] #{} {} (P{}, {}m)", status_mark(t.status), t.id, t.title, t.priority, t.estimate_min)
}

pub fn plan_text(plan: &Plan) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "# Plan for {}\n", plan.date);

    match &plan.now.task {
        Some(t) => {
            let _ = writeln!(out, "Now: #{} {}", t.id, t.title);
        }
        None => {
            let _ = writeln!(out, "Now: (nothing scheduled)");
        }
    }
    let _ = writeln!(out, "     {}\n", plan.now.reason);

    for b in &plan.blocks {
        let lock = if plan.is_locked(&b.id) { " [locked]" } else { "" };
        let _ = writeln!(out, "{}-{}  {} ({}){}", b.start, b.end, b.label, b.id, lock);
        if b.tasks.is_empty() {
            let _ = writeln!(out, "    -");
        }
        for t in &b.tasks {
            let _ = writeln!(out, "    {}", task_line(t));
        }
    }
    let _ = writeln!(out, "\nBuffer: {} min", plan.buffer_min);

    if !plan.changes.is_empty() {
        let _ = writeln!(out, "\n## Changes\n");
        for c in &plan.changes {
            let _ = writeln!(out, "- {c}");
        }
    }
    if let Some(exp) = &plan.explanation {
        let _ = writeln!(out, "\n{exp}");
    }
    out
}

pub fn tasks_text(records: &[TaskRecord]) -> String {
    if records.is_empty() {
        return "(no tasks)\n".to_string();
    }
    let mut out = String::new();
    for r in records {
        let _ = writeln!(out, "{}", task_line(&r.task));
        if !r.task.notes.trim().is_empty() {
            let _ = writeln!(out, "      {}", r.task.notes.trim());
        }
    }
    out
}
