//! Human-readable changes between two versions of a day plan.

use std::collections::HashMap;

use crate::plan::Plan;

pub const DEFAULT_DIFF_LIMIT: usize = 4;

pub const NOW_CHANGED: &str = "Updated your 'Now' recommendation.";

/// Compare `old` and `new`, producing at most `limit` change lines.
///
/// The now-change line comes first, then block moves in the old plan's encounter order.
pub fn diff_changes(old: Option<&Plan>, new: &Plan, limit: usize) -> Vec<String> {
    let Some(old) = old else {
        return Vec::new();
    };
    let mut changes = Vec::new();

    if let (Some(a), Some(b)) = (&old.now.task, &new.now.task) {
        if a.id != b.id {
            changes.push(NOW_CHANGED.to_string());
        }
    }

    let new_map: HashMap<i64, _> = new.task_block_map().into_iter().collect();
    let mut moved = 0;
    for (tid, old_label) in old.task_block_map() {
        let Some(new_label) = new_map.get(&tid) else { continue };
        if *new_label == old_label {
            continue;
        }
        if moved >= limit {
            break;
        }
        changes.push(format!("Moved task #{tid} from {old_label} → {new_label}."));
        moved += 1;
    }

    changes.truncate(limit);
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::{Block, BlockKind};
    use crate::now::NowRecommendation;
    use crate::task::Task;
    use chrono::NaiveDate;

    fn plan(blocks: Vec<(BlockKind, Vec<i64>)>, now: Option<i64>) -> Plan {
        Plan {
            date: NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(),
            blocks: blocks
                .into_iter()
                .enumerate()
                .map(|(i, (label, ids))| Block {
                    id: format!("{}-{}", label.slug(), i + 1),
                    label,
                    start: "09:00".into(),
                    end: "10:00".into(),
                    tasks: ids.into_iter().map(|id| Task::new(id, format!("t{id}"))).collect(),
                })
                .collect(),
            now: NowRecommendation {
                task: now.map(|id| Task::new(id, format!("t{id}"))),
                reason: String::new(),
                block_label: None,
            },
            buffer_min: 0,
            locked_block_ids: vec![],
            changes: vec![],
            explanation: None,
            prefs: Default::default(),
        }
    }

    #[test]
    fn no_previous_plan_means_no_changes() {
        let new = plan(vec![(BlockKind::Admin, vec![7])], Some(7));
        assert!(diff_changes(None, &new, DEFAULT_DIFF_LIMIT).is_empty());
    }

    #[test]
    fn reports_block_move() {
        let old = plan(vec![(BlockKind::Admin, vec![7]), (BlockKind::Focus, vec![])], None);
        let new = plan(vec![(BlockKind::Admin, vec![]), (BlockKind::Focus, vec![7])], None);
        assert_eq!(
            diff_changes(Some(&old), &new, DEFAULT_DIFF_LIMIT),
            vec!["Moved task #7 from Admin → Focus.".to_string()]
        );
    }

    #[test]
    fn reports_now_change_and_ignores_vanished_tasks() {
        let old = plan(vec![(BlockKind::DeepWork, vec![1, 2])], Some(1));
        let new = plan(vec![(BlockKind::DeepWork, vec![2])], Some(2));
        assert_eq!(diff_changes(Some(&old), &new, DEFAULT_DIFF_LIMIT), vec![NOW_CHANGED.to_string()]);

        // No now task on one side: no now line.
        let new = plan(vec![(BlockKind::DeepWork, vec![2])], None);
        assert!(diff_changes(Some(&old), &new, DEFAULT_DIFF_LIMIT).is_empty());
    }

    #[test]
    fn output_is_capped() {
        let old = plan(vec![(BlockKind::Admin, vec![1, 2, 3, 4, 5, 6]), (BlockKind::Focus, vec![])], Some(1));
        let new = plan(vec![(BlockKind::Admin, vec![]), (BlockKind::Focus, vec![1, 2, 3, 4, 5, 6])], Some(2));
        let changes = diff_changes(Some(&old), &new, DEFAULT_DIFF_LIMIT);
        assert_eq!(changes.len(), 4);
        assert_eq!(changes[0], NOW_CHANGED);
        assert_eq!(changes[1], "Moved task #1 from Admin → Focus.");
        assert_eq!(changes[3], "Moved task #3 from Admin → Focus.");
    }
}
