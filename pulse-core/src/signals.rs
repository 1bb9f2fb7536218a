//! Live status signals derived from the day's event log.
//!
//! Signals only bias sorting and selection; they never mutate task records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::task::{Task, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Started,
    Done,
    Completed,
    Blocked,
    Deferred,
    /// Unrecognized kinds are stored but ignored by signal derivation.
    #[serde(untagged)]
    Other(String),
}

impl From<&str> for EventKind {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "started" => EventKind::Started,
            "done" => EventKind::Done,
            "completed" => EventKind::Completed,
            "blocked" => EventKind::Blocked,
            "deferred" => EventKind::Deferred,
            other => EventKind::Other(other.to_string()),
        }
    }
}

impl EventKind {
    pub fn as_str(&self) -> &str {
        match self {
            EventKind::Started => "started",
            EventKind::Done => "done",
            EventKind::Completed => "completed",
            EventKind::Blocked => "blocked",
            EventKind::Deferred => "deferred",
            EventKind::Other(s) => s,
        }
    }
}

/// One row of the day's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DayEvent {
    pub kind: EventKind,
    pub task_id: Option<i64>,
    #[serde(default)]
    pub meta: String,
    pub at: DateTime<Utc>,
}

impl DayEvent {
    pub fn new(kind: impl Into<EventKind>, task_id: Option<i64>, at: DateTime<Utc>) -> Self {
        Self {
            kind: kind.into(),
            task_id,
            meta: String::new(),
            at,
        }
    }
}

/// Per-call signal sets. Callers pass empty sets rather than omitting them.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignalSet {
    pub blocked: BTreeSet<i64>,
    pub doing: BTreeSet<i64>,
    pub deferred: BTreeSet<i64>,
    pub done: BTreeSet<i64>,
    /// Never allocated: completed tasks and tasks pinned in locked blocks.
    pub exclude: BTreeSet<i64>,
}

impl SignalSet {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Fold the event log into signal sets, then mark stored `done` tasks as done.
    pub fn from_day(events: &[DayEvent], tasks: &[Task]) -> Self {
        let mut out = Self::default();
        for ev in events {
            let Some(tid) = ev.task_id else { continue };
            match ev.kind {
                EventKind::Blocked => {
                    out.blocked.insert(tid);
                }
                EventKind::Started => {
                    out.doing.insert(tid);
                }
                EventKind::Deferred => {
                    out.deferred.insert(tid);
                }
                EventKind::Done | EventKind::Completed => {
                    out.done.insert(tid);
                }
                EventKind::Other(_) => {}
            }
        }
        out.done.extend(
            tasks
                .iter()
                .filter(|t| t.status == TaskStatus::Done)
                .map(|t| t.id),
        );
        out
    }

    pub fn is_blocked(&self, id: i64) -> bool {
        self.blocked.contains(&id)
    }
}
