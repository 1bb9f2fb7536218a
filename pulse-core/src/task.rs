//! Task snapshot consumed by the planner.
//!
//! Tasks are owned by the store; the engine receives an immutable copy per call.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    #[default]
    Todo,
    Doing,
    Done,
    Blocked,
}

impl TaskStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TaskStatus::Todo => "todo",
            TaskStatus::Doing => "doing",
            TaskStatus::Done => "done",
            TaskStatus::Blocked => "blocked",
        }
    }

    /// Only open work is eligible for allocation.
    pub fn is_schedulable(self) -> bool {
        matches!(self, TaskStatus::Todo | TaskStatus::Doing)
    }
}

impl std::str::FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "todo" => Ok(TaskStatus::Todo),
            "doing" => Ok(TaskStatus::Doing),
            "done" => Ok(TaskStatus::Done),
            "blocked" => Ok(TaskStatus::Blocked),
            other => Err(format!("unknown status '{other}' (todo|doing|done|blocked)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub notes: String,

    /// 1 = high, 2 = medium, 3 = low.
    pub priority: i32,

    /// Minutes.
    pub estimate_min: i32,

    pub status: TaskStatus,

    pub due_at: Option<DateTime<Utc>>,
}

impl Task {
    pub fn new(id: i64, title: impl Into<String>) -> Self {
        Self {
            id,
            title: title.into(),
            notes: String::new(),
            priority: 2,
            estimate_min: 30,
            status: TaskStatus::Todo,
            due_at: None,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_estimate(mut self, minutes: i32) -> Self {
        self.estimate_min = minutes;
        self
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = notes.into();
        self
    }

    pub fn with_due(mut self, due_at: DateTime<Utc>) -> Self {
        self.due_at = Some(due_at);
        self
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must be non-empty".to_string());
        }
        if !(1..=3).contains(&self.priority) {
            return Err(format!("priority must be 1..=3, got {}", self.priority));
        }
        if self.estimate_min <= 0 {
            return Err(format!("estimate_min must be positive, got {}", self.estimate_min));
        }
        Ok(())
    }
}

/// Partial update applied by the store on behalf of a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub notes: Option<String>,
    pub priority: Option<i32>,
    pub estimate_min: Option<i32>,
    pub status: Option<TaskStatus>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }

    /// Apply onto a copy of `task`, rejecting patches that produce an invalid task.
    pub fn apply(&self, task: &Task) -> Result<Task, String> {
        let mut out = task.clone();
        if let Some(title) = &self.title {
            out.title = title.clone();
        }
        if let Some(notes) = &self.notes {
            out.notes = notes.clone();
        }
        if let Some(p) = self.priority {
            out.priority = p;
        }
        if let Some(m) = self.estimate_min {
            out.estimate_min = m;
        }
        if let Some(s) = self.status {
            out.status = s;
        }
        out.validate()?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_serializes_lowercase() {
        let json = serde_json::to_string(&TaskStatus::Blocked).unwrap();
        assert_eq!(json, "\"blocked\"");
        assert_eq!("Doing".parse::<TaskStatus>().unwrap(), TaskStatus::Doing);
        assert!("later".parse::<TaskStatus>().is_err());
    }

    #[test]
    fn validate_rejects_out_of_range() {
        assert!(Task::new(1, "ok").validate().is_ok());
        assert!(Task::new(1, " ").validate().is_err());
        assert!(Task::new(1, "p").with_priority(4).validate().is_err());
        assert!(Task::new(1, "e").with_estimate(0).validate().is_err());
    }

    #[test]
    fn patch_applies_and_validates() {
        let base = Task::new(3, "Write report").with_priority(2);
        let patch = TaskPatch {
            status: Some(TaskStatus::Done),
            estimate_min: Some(45),
            ..Default::default()
        };
        let out = patch.apply(&base).unwrap();
        assert_eq!(out.status, TaskStatus::Done);
        assert_eq!(out.estimate_min, 45);
        assert_eq!(out.title, "Write report");

        let bad = TaskPatch {
            priority: Some(9),
            ..Default::default()
        };
        assert!(bad.apply(&base).is_err());
        assert!(TaskPatch::default().is_empty());
    }
}
