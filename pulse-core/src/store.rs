//! Persistence seam. The engine only reads snapshots and upserts one plan per day.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::plan::Plan;
use crate::signals::DayEvent;
use crate::task::Task;

pub trait DayStore {
    /// Held across one load → compute → save of a day's plan. Stores shared between
    /// processes make this exclusive at their level; in-process callers already
    /// serialize per day.
    type DayLock<'a>
    where
        Self: 'a;

    fn lock_day(&self, day: NaiveDate) -> Result<Self::DayLock<'_>>;

    fn tasks(&self) -> Result<Vec<Task>>;

    /// Events at or after `since`, oldest first.
    fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<DayEvent>>;

    fn load_plan(&self, day: NaiveDate) -> Result<Option<Plan>>;

    /// Insert, or replace the existing plan for `plan.date`.
    fn save_plan(&self, plan: &Plan) -> Result<()>;
}

#[derive(Debug, Default)]
struct MemoryState {
    tasks: Vec<Task>,
    events: Vec<DayEvent>,
    plans: BTreeMap<NaiveDate, Plan>,
}

/// In-process store, for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<MemoryState>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tasks(tasks: Vec<Task>) -> Self {
        let store = Self::default();
        store.state().tasks = tasks;
        store
    }

    fn state(&self) -> std::sync::MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Replace a task by id, or append it.
    pub fn upsert_task(&self, task: Task) {
        let mut st = self.state();
        match st.tasks.iter_mut().find(|t| t.id == task.id) {
            Some(slot) => *slot = task,
            None => st.tasks.push(task),
        }
    }

    pub fn push_event(&self, event: DayEvent) {
        self.state().events.push(event);
    }

    pub fn plan_count(&self) -> usize {
        self.state().plans.len()
    }
}

impl DayStore for MemoryStore {
    type DayLock<'a> = ();

    fn lock_day(&self, _day: NaiveDate) -> Result<()> {
        Ok(())
    }

    fn tasks(&self) -> Result<Vec<Task>> {
        Ok(self.state().tasks.clone())
    }

    fn events_since(&self, since: DateTime<Utc>) -> Result<Vec<DayEvent>> {
        let mut out: Vec<DayEvent> = self
            .state()
            .events
            .iter()
            .filter(|e| e.at >= since)
            .cloned()
            .collect();
        out.sort_by_key(|e| e.at);
        Ok(out)
    }

    fn load_plan(&self, day: NaiveDate) -> Result<Option<Plan>> {
        Ok(self.state().plans.get(&day).cloned())
    }

    fn save_plan(&self, plan: &Plan) -> Result<()> {
        self.state().plans.insert(plan.date, plan.clone());
        Ok(())
    }
}
