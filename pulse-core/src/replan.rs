//! Plan transitions: generate, lock/unlock, move, replan.
//!
//! Every function here is pure: it takes the current plan by reference and returns a
//! new one. Persisting the result is the caller's job (see `crate::service`).

use chrono::NaiveDate;
use std::collections::{BTreeMap, BTreeSet};
use tracing::warn;

use crate::allocator::assign_tasks_to_blocks;
use crate::blocks::{build_day_blocks, DayLayout, DayPrefs};
use crate::diff::{diff_changes, DEFAULT_DIFF_LIMIT};
use crate::error::{PlanError, Result};
use crate::now::compute_now;
use crate::plan::Plan;
use crate::signals::{DayEvent, SignalSet};
use crate::task::Task;

/// Upper bound on the change list a replan reports.
pub const REPLAN_CHANGE_LIMIT: usize = 6;

/// Allocate into `layout`, pin locked blocks and select "now".
///
/// Blocks listed in `pinned` get zero capacity during allocation and then receive the
/// pinned task list verbatim. "Now" is chosen after pinning so it always names a task
/// that is actually in the returned plan.
fn compose(
    date: NaiveDate,
    tasks: &[Task],
    prefs: &DayPrefs,
    layout: DayLayout,
    signals: &SignalSet,
    locked_block_ids: Vec<String>,
    pinned: &BTreeMap<String, Vec<Task>>,
) -> Plan {
    let slots = layout
        .slots
        .into_iter()
        .map(|mut slot| {
            if pinned.contains_key(&slot.block.id) {
                slot.capacity_min = 0;
            }
            slot
        })
        .collect();

    let mut blocks = assign_tasks_to_blocks(tasks, slots, prefs.max_tasks_per_block, signals);
    for block in blocks.iter_mut() {
        if let Some(kept) = pinned.get(&block.id) {
            block.tasks = kept.clone();
        }
    }

    let now = compute_now(&blocks, signals);

    Plan {
        date,
        blocks,
        now,
        buffer_min: layout.buffer_min,
        locked_block_ids,
        changes: Vec::new(),
        explanation: None,
        prefs: prefs.clone(),
    }
}

fn layout_for(prefs: &DayPrefs) -> Result<DayLayout> {
    prefs.validate()?;
    build_day_blocks(prefs)
}

/// Fresh plan with no signals and no locks.
pub fn build_initial_plan(date: NaiveDate, tasks: &[Task], prefs: &DayPrefs) -> Result<Plan> {
    let layout = layout_for(prefs)?;
    Ok(compose(date, tasks, prefs, layout, &SignalSet::empty(), Vec::new(), &BTreeMap::new()))
}

/// Add or remove `block_id` from the locked set. Tasks are not reallocated.
pub fn toggle_lock(plan: &Plan, block_id: &str, locked: bool) -> Result<Plan> {
    if plan.block(block_id).is_none() {
        return Err(PlanError::BlockNotFound(block_id.to_string()));
    }

    let mut ids: BTreeSet<String> = plan.locked_block_ids.iter().cloned().collect();
    if locked {
        ids.insert(block_id.to_string());
    } else {
        ids.remove(block_id);
    }

    let mut out = plan.clone();
    out.locked_block_ids = ids.into_iter().collect();
    out.changes = vec![format!(
        "{} {block_id}.",
        if locked { "Locked" } else { "Unlocked" }
    )];
    Ok(out)
}

/// Move `task_id` from one block to another (or reorder within one block).
///
/// Rejected when either block is locked or unknown, or the task is not in `from`.
pub fn move_task(
    plan: &Plan,
    from_block_id: &str,
    to_block_id: &str,
    task_id: i64,
    to_index: usize,
) -> Result<Plan> {
    for id in [from_block_id, to_block_id] {
        if plan.is_locked(id) {
            return Err(PlanError::LockedBlock(id.to_string()));
        }
    }
    let from_idx = plan
        .blocks
        .iter()
        .position(|b| b.id == from_block_id)
        .ok_or_else(|| PlanError::BlockNotFound(from_block_id.to_string()))?;
    let to_idx = plan
        .blocks
        .iter()
        .position(|b| b.id == to_block_id)
        .ok_or_else(|| PlanError::BlockNotFound(to_block_id.to_string()))?;

    let task_pos = plan.blocks[from_idx]
        .tasks
        .iter()
        .position(|t| t.id == task_id)
        .ok_or_else(|| PlanError::TaskNotInBlock {
            task_id,
            block_id: from_block_id.to_string(),
        })?;

    let mut out = plan.clone();
    let moved = out.blocks[from_idx].tasks.remove(task_pos);
    let dest = &mut out.blocks[to_idx];
    let idx = to_index.min(dest.tasks.len());

    let change = if from_idx == to_idx {
        format!("Reordered “{}” inside {}.", moved.title, dest.label)
    } else {
        format!("Moved “{}” → {}.", moved.title, dest.label)
    };
    dest.tasks.insert(idx, moved);
    out.changes = vec![change];
    Ok(out)
}

/// Recompute the day from live signals while preserving locked blocks.
///
/// The layout is rebuilt from the previous plan's own prefs; `prefs` only applies when
/// there is no previous plan. Locked blocks keep their previous task list minus tasks
/// that are now done, and those survivors are excluded from allocation elsewhere. Task
/// ids that vanished from the snapshot are kept in a locked block as-is. A locked id
/// missing from the rebuilt layout is dropped and its tasks go back into the pool.
pub fn replan(
    previous: Option<&Plan>,
    date: NaiveDate,
    tasks: &[Task],
    events: &[DayEvent],
    prefs: &DayPrefs,
) -> Result<Plan> {
    let prefs = previous.map_or(prefs, |p| &p.prefs);
    let layout = layout_for(prefs)?;
    let mut signals = SignalSet::from_day(events, tasks);

    let mut locked_block_ids = Vec::new();
    let mut pinned: BTreeMap<String, Vec<Task>> = BTreeMap::new();
    if let Some(prev) = previous {
        for block in prev.blocks.iter().filter(|b| prev.is_locked(&b.id)) {
            if !layout.slots.iter().any(|s| s.block.id == block.id) {
                warn!(block = %block.id, "locked block missing from rebuilt layout; releasing its tasks");
                continue;
            }
            let keep: Vec<Task> = block
                .tasks
                .iter()
                .filter(|t| !signals.done.contains(&t.id))
                .cloned()
                .collect();
            signals.exclude.extend(keep.iter().map(|t| t.id));
            pinned.insert(block.id.clone(), keep);
            locked_block_ids.push(block.id.clone());
        }
        locked_block_ids.sort();
    }
    signals.exclude.extend(signals.done.iter().copied());

    let mut plan = compose(date, tasks, prefs, layout, &signals, locked_block_ids, &pinned);

    let mut changes = diff_changes(previous, &plan, DEFAULT_DIFF_LIMIT);
    if !plan.locked_block_ids.is_empty() {
        changes.push(format!("Protected {} locked block(s).", plan.locked_block_ids.len()));
    }
    if !signals.blocked.is_empty() {
        changes.push(format!("Avoiding {} blocked task(s) for now.", signals.blocked.len()));
    }
    if !signals.done.is_empty() {
        changes.push(format!("Removed {} completed task(s).", signals.done.len()));
    }
    changes.truncate(REPLAN_CHANGE_LIMIT);
    plan.changes = changes;

    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blocks::BlockKind;
    use crate::task::TaskStatus;
    use chrono::{TimeZone, Utc};

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn ev(kind: &str, id: i64) -> DayEvent {
        DayEvent::new(kind, Some(id), Utc.with_ymd_and_hms(2026, 3, 2, 10, 0, 0).unwrap())
    }

    fn tasks() -> Vec<Task> {
        vec![
            Task::new(1, "Ship feature").with_priority(1).with_estimate(90),
            Task::new(2, "Email").with_estimate(15),
            Task::new(3, "Review PR").with_estimate(45),
            Task::new(4, "Expense report").with_priority(3).with_estimate(20),
            Task::new(5, "Plan sprint").with_estimate(60),
            Task::new(6, "Refactor").with_priority(1).with_estimate(25),
        ]
    }

    fn ids(plan: &Plan, block_id: &str) -> Vec<i64> {
        plan.block(block_id).unwrap().tasks.iter().map(|t| t.id).collect()
    }

    #[test]
    fn initial_plan_has_now_and_no_changes() {
        let plan = build_initial_plan(day(), &tasks(), &DayPrefs::default()).unwrap();
        assert_eq!(plan.blocks.len(), 6);
        assert_eq!(plan.buffer_min, 102);
        assert_eq!(ids(&plan, "deep-work-1"), vec![1, 6]);
        assert_eq!(plan.now.task.as_ref().unwrap().id, 1);
        assert_eq!(plan.now.reason, "Best next step in your Deep Work block.");
        assert!(plan.changes.is_empty());
        assert!(plan.locked_block_ids.is_empty());
    }

    #[test]
    fn initial_plan_is_deterministic() {
        let a = build_initial_plan(day(), &tasks(), &DayPrefs::default()).unwrap();
        let b = build_initial_plan(day(), &tasks(), &DayPrefs::default()).unwrap();
        assert_eq!(serde_json::to_string(&a).unwrap(), serde_json::to_string(&b).unwrap());
    }

    #[test]
    fn invalid_prefs_are_rejected() {
        let prefs = DayPrefs {
            work_start: "nine".into(),
            ..DayPrefs::default()
        };
        assert!(matches!(
            build_initial_plan(day(), &tasks(), &prefs),
            Err(PlanError::InvalidTime(_))
        ));
    }

    #[test]
    fn lock_and_unlock_record_change() {
        let plan = build_initial_plan(day(), &tasks(), &DayPrefs::default()).unwrap();
        let locked = toggle_lock(&plan, "admin-2", true).unwrap();
        let locked = toggle_lock(&locked, "admin-2", true).unwrap();
        assert_eq!(locked.locked_block_ids, vec!["admin-2".to_string()]);
        assert_eq!(locked.changes, vec!["Locked admin-2.".to_string()]);
        assert_eq!(locked.blocks, plan.blocks);

        let unlocked = toggle_lock(&locked, "admin-2", false).unwrap();
        assert!(unlocked.locked_block_ids.is_empty());
        assert_eq!(unlocked.changes, vec!["Unlocked admin-2.".to_string()]);

        assert!(matches!(toggle_lock(&plan, "nope-9", true), Err(PlanError::BlockNotFound(_))));
    }

    #[test]
    fn move_between_blocks_clamps_index() {
        let plan = build_initial_plan(day(), &tasks(), &DayPrefs::default()).unwrap();
        let moved = move_task(&plan, "admin-2", "focus-3", 2, 99).unwrap();
        assert!(!ids(&moved, "admin-2").contains(&2));
        assert_eq!(ids(&moved, "focus-3").last(), Some(&2));
        assert_eq!(moved.changes, vec!["Moved “Email” → Focus.".to_string()]);
    }

    #[test]
    fn reorder_within_block() {
        let plan = build_initial_plan(day(), &tasks(), &DayPrefs::default()).unwrap();
        assert_eq!(ids(&plan, "deep-work-1"), vec![1, 6]);
        let moved = move_task(&plan, "deep-work-1", "deep-work-1", 6, 0).unwrap();
        assert_eq!(ids(&moved, "deep-work-1"), vec![6, 1]);
        assert_eq!(moved.changes, vec!["Reordered “Refactor” inside Deep Work.".to_string()]);
    }

    #[test]
    fn move_rejections_leave_plan_untouched() {
        let plan = build_initial_plan(day(), &tasks(), &DayPrefs::default()).unwrap();
        let locked = toggle_lock(&plan, "admin-2", true).unwrap();
        let before = locked.clone();

        assert!(matches!(move_task(&locked, "admin-2", "focus-3", 2, 0), Err(PlanError::LockedBlock(_))));
        assert!(matches!(move_task(&locked, "focus-3", "admin-2", 3, 0), Err(PlanError::LockedBlock(_))));
        assert!(matches!(move_task(&locked, "focus-3", "zzz-1", 3, 0), Err(PlanError::BlockNotFound(_))));
        assert!(matches!(
            move_task(&locked, "focus-3", "deep-work-1", 1, 0),
            Err(PlanError::TaskNotInBlock { task_id: 1, .. })
        ));
        assert_eq!(locked, before);
    }

    #[test]
    fn replan_preserves_locked_blocks_minus_done() {
        let plan = build_initial_plan(day(), &tasks(), &DayPrefs::default()).unwrap();
        let admin_before = ids(&plan, "admin-2");
        assert_eq!(admin_before, vec![2, 4]);
        let locked = toggle_lock(&plan, "admin-2", true).unwrap();

        let mut snapshot = tasks();
        snapshot[1].status = TaskStatus::Done;
        let out = replan(Some(&locked), day(), &snapshot, &[], &DayPrefs::default()).unwrap();

        assert_eq!(ids(&out, "admin-2"), vec![4]);
        assert_eq!(out.locked_block_ids, vec!["admin-2".to_string()]);
        let placed: Vec<i64> = out.blocks.iter().flat_map(|b| b.tasks.iter().map(|t| t.id)).collect();
        assert_eq!(placed.iter().filter(|id| **id == 4).count(), 1);
        assert!(!placed.contains(&2));
        assert!(out.changes.contains(&"Protected 1 locked block(s).".to_string()));
        assert!(out.changes.contains(&"Removed 1 completed task(s).".to_string()));
    }

    #[test]
    fn replan_keeps_stale_ids_in_locked_blocks() {
        let plan = build_initial_plan(day(), &tasks(), &DayPrefs::default()).unwrap();
        let locked = toggle_lock(&plan, "admin-2", true).unwrap();

        // Task 2 was deleted from the store.
        let snapshot: Vec<Task> = tasks().into_iter().filter(|t| t.id != 2).collect();
        let out = replan(Some(&locked), day(), &snapshot, &[], &DayPrefs::default()).unwrap();
        assert_eq!(ids(&out, "admin-2"), vec![2, 4]);
    }

    #[test]
    fn replan_rebuilds_with_the_plans_own_layout() {
        let admin_first = DayPrefs {
            deep_work_first: false,
            ..DayPrefs::default()
        };
        let plan = build_initial_plan(day(), &tasks(), &admin_first).unwrap();
        assert_eq!(ids(&plan, "admin-1"), vec![2, 4]);
        let locked = toggle_lock(&plan, "admin-1", true).unwrap();

        // Caller passes different prefs; the stored ones win.
        let out = replan(Some(&locked), day(), &tasks(), &[], &DayPrefs::default()).unwrap();
        assert_eq!(out.blocks[0].id, "admin-1");
        assert_eq!(ids(&out, "admin-1"), vec![2, 4]);
        assert_eq!(out.locked_block_ids, vec!["admin-1".to_string()]);
        assert_eq!(out.prefs, admin_first);
    }

    #[test]
    fn locked_id_missing_from_layout_releases_its_tasks() {
        let admin_first = DayPrefs {
            deep_work_first: false,
            ..DayPrefs::default()
        };
        let plan = build_initial_plan(day(), &tasks(), &admin_first).unwrap();
        let mut locked = toggle_lock(&plan, "admin-1", true).unwrap();
        // A plan stored before prefs were recorded loads with the default layout.
        locked.prefs = DayPrefs::default();

        let out = replan(Some(&locked), day(), &tasks(), &[], &DayPrefs::default()).unwrap();
        assert!(out.block("admin-1").is_none());
        assert!(out.locked_block_ids.is_empty());
        let placed: Vec<i64> = out.blocks.iter().flat_map(|b| b.tasks.iter().map(|t| t.id)).collect();
        assert!(placed.contains(&2) && placed.contains(&4));
        assert_eq!(ids(&out, "admin-2"), vec![2, 4]);
    }

    #[test]
    fn replan_applies_signals_and_reports() {
        let plan = build_initial_plan(day(), &tasks(), &DayPrefs::default()).unwrap();
        let events = vec![ev("blocked", 1), ev("started", 5), ev("completed", 3)];
        let out = replan(Some(&plan), day(), &tasks(), &events, &DayPrefs::default()).unwrap();

        // Task 1 is blocked: P1 task 6 wins deep work, blocked task 1 is the tier-2 fallback.
        assert_eq!(ids(&out, "deep-work-1"), vec![6, 1]);
        assert_ne!(out.now.task.as_ref().unwrap().id, 1);
        assert!(out.blocks.iter().all(|b| b.tasks.iter().all(|t| t.id != 3)));
        assert_eq!(out.changes.last().unwrap(), "Removed 1 completed task(s).");
        assert!(out.changes.contains(&"Avoiding 1 blocked task(s) for now.".to_string()));
        assert!(out.changes.contains(&"Updated your 'Now' recommendation.".to_string()));
        assert!(out.changes.len() <= REPLAN_CHANGE_LIMIT);
    }

    #[test]
    fn replan_without_previous_has_only_summaries() {
        let out = replan(None, day(), &tasks(), &[ev("blocked", 4)], &DayPrefs::default()).unwrap();
        assert_eq!(out.changes, vec!["Avoiding 1 blocked task(s) for now.".to_string()]);
        assert!(out.locked_block_ids.is_empty());
    }

    #[test]
    fn replan_change_list_is_capped() {
        let many: Vec<Task> = (1..=12)
            .map(|i| Task::new(i, format!("t{i}")).with_estimate(10))
            .collect();
        let plan = build_initial_plan(day(), &many, &DayPrefs::default()).unwrap();
        let locked = toggle_lock(&plan, "wrap-up-6", true).unwrap();

        // Deferring the admin tasks pushes them behind everything else.
        let mut events: Vec<DayEvent> = (1..=6).map(|i| ev("deferred", i)).collect();
        events.extend([ev("blocked", 7), ev("done", 8)]);
        let out = replan(Some(&locked), day(), &many, &events, &DayPrefs::default()).unwrap();
        assert!(out.changes.len() <= REPLAN_CHANGE_LIMIT);
        assert_eq!(out.block("wrap-up-6").unwrap().label, BlockKind::WrapUp);
    }
}
