//! Task ranking under live signals.
//!
//! Composite key, ascending:
//! - in progress first
//! - blocked, then deferred, pushed back
//! - priority, then due time (none = far future), then estimate

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::signals::SignalSet;
use crate::task::Task;

type RankKey = (u8, u8, u8, i32, (bool, Option<DateTime<Utc>>), i32);

fn rank_key(task: &Task, signals: &SignalSet) -> RankKey {
    (
        if signals.doing.contains(&task.id) { 0 } else { 1 },
        u8::from(signals.blocked.contains(&task.id)),
        u8::from(signals.deferred.contains(&task.id)),
        task.priority,
        // `None` sorts after every real due time.
        (task.due_at.is_none(), task.due_at),
        task.estimate_min,
    )
}

pub fn compare(a: &Task, b: &Task, signals: &SignalSet) -> Ordering {
    rank_key(a, signals).cmp(&rank_key(b, signals))
}

/// Stable sort by the composite key.
pub fn sort_tasks_with_signals(tasks: &[Task], signals: &SignalSet) -> Vec<Task> {
    let mut out = tasks.to_vec();
    out.sort_by(|a, b| compare(a, b, signals));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ids(tasks: &[Task]) -> Vec<i64> {
        tasks.iter().map(|t| t.id).collect()
    }

    #[test]
    fn doing_beats_priority_and_blocked_sinks() {
        let tasks = vec![
            Task::new(1, "p1").with_priority(1),
            Task::new(2, "p3 in progress").with_priority(3),
            Task::new(3, "p1 blocked").with_priority(1),
            Task::new(4, "p2 deferred").with_priority(2),
            Task::new(5, "p2").with_priority(2),
        ];
        let mut signals = SignalSet::empty();
        signals.doing.insert(2);
        signals.blocked.insert(3);
        signals.deferred.insert(4);

        let sorted = sort_tasks_with_signals(&tasks, &signals);
        assert_eq!(ids(&sorted), vec![2, 1, 5, 4, 3]);
    }

    #[test]
    fn due_then_estimate_break_ties() {
        let soon = Utc.with_ymd_and_hms(2026, 3, 2, 12, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 3, 2, 16, 0, 0).unwrap();
        let tasks = vec![
            Task::new(1, "no due, short").with_estimate(10),
            Task::new(2, "due later").with_due(later),
            Task::new(3, "due soon, long").with_due(soon).with_estimate(90),
            Task::new(4, "no due, long").with_estimate(60),
        ];
        let sorted = sort_tasks_with_signals(&tasks, &SignalSet::empty());
        assert_eq!(ids(&sorted), vec![3, 2, 1, 4]);
    }

    #[test]
    fn ties_keep_input_order() {
        let tasks: Vec<Task> = (1..=4).map(|i| Task::new(i, format!("t{i}"))).collect();
        let sorted = sort_tasks_with_signals(&tasks, &SignalSet::empty());
        assert_eq!(ids(&sorted), vec![1, 2, 3, 4]);
    }
}
