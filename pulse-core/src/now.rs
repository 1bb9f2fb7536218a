//! "Do this now" selection over a finished block list.

use serde::{Deserialize, Serialize};

use crate::blocks::{Block, BlockKind};
use crate::signals::SignalSet;
use crate::task::{Task, TaskStatus};

pub const EMPTY_REASON: &str = "Add tasks to generate a plan.";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NowRecommendation {
    pub task: Option<Task>,
    pub reason: String,
    pub block_label: Option<BlockKind>,
}

impl NowRecommendation {
    pub fn empty() -> Self {
        Self {
            task: None,
            reason: EMPTY_REASON.to_string(),
            block_label: None,
        }
    }
}

fn first_workable<'a>(
    blocks: &'a [Block],
    signals: &SignalSet,
    skip_slack: bool,
) -> Option<(&'a Block, &'a Task)> {
    blocks
        .iter()
        .filter(|b| !(skip_slack && b.label.is_slack()))
        .flat_map(|b| b.tasks.iter().map(move |t| (b, t)))
        .find(|(_, t)| !signals.is_blocked(t.id) && t.status != TaskStatus::Blocked)
}

/// Pick the first unblocked task, preferring real work blocks over Buffer/Wrap-up.
pub fn compute_now(blocks: &[Block], signals: &SignalSet) -> NowRecommendation {
    if let Some((b, t)) = first_workable(blocks, signals, true) {
        return NowRecommendation {
            task: Some(t.clone()),
            reason: format!("Best next step in your {} block.", b.label),
            block_label: Some(b.label),
        };
    }
    if let Some((b, t)) = first_workable(blocks, signals, false) {
        return NowRecommendation {
            task: Some(t.clone()),
            reason: format!("Best next step from {}.", b.label),
            block_label: Some(b.label),
        };
    }
    NowRecommendation::empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(id: &str, label: BlockKind, tasks: Vec<Task>) -> Block {
        Block {
            id: id.to_string(),
            label,
            start: "09:00".to_string(),
            end: "10:00".to_string(),
            tasks,
        }
    }

    #[test]
    fn picks_first_unblocked_in_work_blocks() {
        let blocks = vec![
            block("deep-work-1", BlockKind::DeepWork, vec![Task::new(1, "blocked")]),
            block("admin-2", BlockKind::Admin, vec![Task::new(2, "free")]),
        ];
        let mut signals = SignalSet::empty();
        signals.blocked.insert(1);

        let now = compute_now(&blocks, &signals);
        assert_eq!(now.task.unwrap().id, 2);
        assert_eq!(now.reason, "Best next step in your Admin block.");
        assert_eq!(now.block_label, Some(BlockKind::Admin));
    }

    #[test]
    fn falls_back_to_slack_blocks() {
        let blocks = vec![
            block("deep-work-1", BlockKind::DeepWork, vec![Task::new(1, "x").with_status(TaskStatus::Blocked)]),
            block("buffer-2", BlockKind::Buffer, vec![Task::new(2, "slack")]),
        ];
        let now = compute_now(&blocks, &SignalSet::empty());
        assert_eq!(now.task.unwrap().id, 2);
        assert_eq!(now.reason, "Best next step from Buffer.");
    }

    #[test]
    fn nothing_to_do() {
        let blocks = vec![block("wrap-up-1", BlockKind::WrapUp, vec![])];
        let now = compute_now(&blocks, &SignalSet::empty());
        assert_eq!(now, NowRecommendation::empty());
        assert_eq!(now.reason, "Add tasks to generate a plan.");
    }
}
