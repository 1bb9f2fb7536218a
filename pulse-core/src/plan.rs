//! The day plan: the single stored artifact per day key.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::blocks::{Block, BlockKind, DayPrefs};
use crate::now::NowRecommendation;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub date: NaiveDate,
    pub blocks: Vec<Block>,
    pub now: NowRecommendation,
    pub buffer_min: i64,
    /// Sorted, unique.
    #[serde(default)]
    pub locked_block_ids: Vec<String>,
    #[serde(default)]
    pub changes: Vec<String>,
    /// Filled by the text-generation collaborator, never by the engine.
    #[serde(default)]
    pub explanation: Option<String>,
    /// Layout preferences this plan was built with. Replans rebuild from these so
    /// block ids, and therefore locks, stay valid.
    #[serde(default)]
    pub prefs: DayPrefs,
}

impl Plan {
    pub fn block(&self, id: &str) -> Option<&Block> {
        self.blocks.iter().find(|b| b.id == id)
    }

    pub fn is_locked(&self, block_id: &str) -> bool {
        self.locked_block_ids.iter().any(|id| id == block_id)
    }

    /// Task id → block label, in encounter order.
    pub fn task_block_map(&self) -> Vec<(i64, BlockKind)> {
        let mut out: Vec<(i64, BlockKind)> = Vec::new();
        for b in &self.blocks {
            for t in &b.tasks {
                match out.iter_mut().find(|(id, _)| *id == t.id) {
                    Some(entry) => entry.1 = b.label,
                    None => out.push((t.id, b.label)),
                }
            }
        }
        out
    }

    pub fn planned_task_count(&self) -> usize {
        self.blocks.iter().map(|b| b.tasks.len()).sum()
    }
}
