//! End-of-day review inputs and deterministic fallbacks.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::plan::Plan;
use crate::task::{Task, TaskStatus};

pub const NO_PLAN_REVIEW: &str = "No plan found for today yet.";
pub const DISABLED_REVIEW: &str =
    "AI is disabled (no API key configured). Set one to generate a daily review.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Review {
    pub date: NaiveDate,
    pub review: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewInput {
    pub planned: Vec<String>,
    pub done: Vec<String>,
    pub blocked: Vec<String>,
}

impl ReviewInput {
    pub fn collect(plan: &Plan, tasks: &[Task]) -> Self {
        let titles = |status: TaskStatus| -> Vec<String> {
            tasks
                .iter()
                .filter(|t| t.status == status)
                .map(|t| t.title.clone())
                .collect()
        };
        Self {
            planned: plan
                .blocks
                .iter()
                .flat_map(|b| b.tasks.iter().map(|t| t.title.clone()))
                .collect(),
            done: titles(TaskStatus::Done),
            blocked: titles(TaskStatus::Blocked),
        }
    }

    /// Used when the generator is enabled but fails.
    pub fn summary(&self) -> String {
        format!(
            "Planned {} task(s) today.\nCompleted {}.\nBlocked or stuck: {}.",
            self.planned.len(),
            self.done.len(),
            self.blocked.len()
        )
    }
}
