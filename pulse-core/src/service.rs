//! Plan service. Wires the pure engine to a store and an optional text generator.
//!
//! Each transition is load → compute → save under a per-day mutex plus the store's own
//! day lock, so concurrent requests for the same day never interleave their
//! read-modify-write. Generated text is added afterwards, outside both locks.

use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, info, warn};

use crate::blocks::DayPrefs;
use crate::enrich::Enricher;
use crate::error::{PlanError, Result};
use crate::plan::Plan;
use crate::prompts::{end_of_day_review_prompt, now_reason_prompt, replan_explain_prompt, SYSTEM_PULSE};
use crate::replan::{build_initial_plan, move_task, replan, toggle_lock};
use crate::review::{Review, ReviewInput, DISABLED_REVIEW, NO_PLAN_REVIEW};
use crate::store::DayStore;
use crate::time::local_day_start_utc;

pub struct PlanService<S: DayStore, E: Enricher> {
    store: S,
    enricher: E,
    day_locks: Mutex<HashMap<NaiveDate, Arc<Mutex<()>>>>,
}

fn lock_ignoring_poison<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|e| e.into_inner())
}

impl<S: DayStore, E: Enricher> PlanService<S, E> {
    pub fn new(store: S, enricher: E) -> Self {
        Self {
            store,
            enricher,
            day_locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn day_lock(&self, day: NaiveDate) -> Arc<Mutex<()>> {
        lock_ignoring_poison(&self.day_locks)
            .entry(day)
            .or_default()
            .clone()
    }

    /// Run `f` with `day` held exclusively, in this process and at the store.
    fn with_day<T>(&self, day: NaiveDate, f: impl FnOnce() -> Result<T>) -> Result<T> {
        let lock = self.day_lock(day);
        let out = {
            let _guard = lock_ignoring_poison(&lock);
            self.store
                .lock_day(day)
                .map_err(PlanError::from)
                .and_then(|_held| f())
        };

        let mut locks = lock_ignoring_poison(&self.day_locks);
        // Map entry plus ours: nobody else is waiting on this day.
        if Arc::strong_count(&lock) == 2 {
            locks.remove(&day);
        }
        out
    }

    fn persist(&self, plan: &Plan, action: &str) -> Result<()> {
        self.store.save_plan(plan)?;
        info!(
            day = %plan.date,
            action,
            blocks = plan.blocks.len(),
            tasks = plan.planned_task_count(),
            locked = plan.locked_block_ids.len(),
            "plan saved"
        );
        Ok(())
    }

    /// Replace the engine's reason with generated text when available.
    fn enrich_now(&self, plan: &mut Plan) {
        if !self.enricher.is_enabled() {
            return;
        }
        let Some(task) = &plan.now.task else { return };
        let label = plan.now.block_label.map_or("Today", |l| l.label());
        let prompt = now_reason_prompt(&task.title, &task.notes, label);
        match self.enricher.generate(SYSTEM_PULSE, &prompt) {
            Ok(text) if !text.trim().is_empty() => plan.now.reason = text.trim().to_string(),
            Ok(_) => warn!("empty now-reason from text generator; keeping engine reason"),
            Err(e) => warn!(error = %e, "now-reason enrichment failed; keeping engine reason"),
        }
    }

    fn explain_replan(&self, plan: &Plan) -> Option<String> {
        if !self.enricher.is_enabled() {
            return None;
        }
        let prompt = replan_explain_prompt(&plan.changes, &plan.locked_block_ids);
        match self.enricher.generate(SYSTEM_PULSE, &prompt) {
            Ok(text) if !text.trim().is_empty() => Some(text.trim().to_string()),
            Ok(_) => None,
            Err(e) => {
                warn!(error = %e, "replan explanation failed");
                None
            }
        }
    }

    /// The stored plan for `day`.
    pub fn today(&self, day: NaiveDate) -> Result<Plan> {
        self.store.load_plan(day)?.ok_or(PlanError::NoPlanForDay(day))
    }

    /// Build a fresh plan, discarding locks and any previous plan for the day.
    pub fn generate(&self, day: NaiveDate, prefs: &DayPrefs) -> Result<Plan> {
        let plan = self.with_day(day, || {
            let tasks = self.store.tasks()?;
            let plan = build_initial_plan(day, &tasks, prefs)?;
            debug!(day = %day, candidates = tasks.len(), "generated plan");
            self.persist(&plan, "generate")?;
            Ok(plan)
        })?;
        self.enrich(plan, false)
    }

    /// Lock or unlock a block. Synthesizes a default plan first when the day has none.
    pub fn set_lock(&self, day: NaiveDate, block_id: &str, locked: bool, prefs: &DayPrefs) -> Result<Plan> {
        self.with_day(day, || {
            let current = match self.store.load_plan(day)? {
                Some(p) => p,
                None => {
                    debug!(day = %day, "no plan yet; synthesizing one before locking");
                    build_initial_plan(day, &self.store.tasks()?, prefs)?
                }
            };
            let plan = toggle_lock(&current, block_id, locked)?;
            self.persist(&plan, if locked { "lock" } else { "unlock" })?;
            Ok(plan)
        })
    }

    pub fn move_task(
        &self,
        day: NaiveDate,
        from_block_id: &str,
        to_block_id: &str,
        task_id: i64,
        to_index: usize,
    ) -> Result<Plan> {
        self.with_day(day, || {
            let current = self.store.load_plan(day)?.ok_or(PlanError::NoPlanForDay(day))?;
            let plan = move_task(&current, from_block_id, to_block_id, task_id, to_index)?;
            self.persist(&plan, "move")?;
            Ok(plan)
        })
    }

    /// Recompute the day from today's events, preserving locked blocks.
    ///
    /// An existing plan is rebuilt with the prefs it was generated with; `prefs` only
    /// applies when the day has no plan yet.
    pub fn replan(&self, day: NaiveDate, prefs: &DayPrefs) -> Result<Plan> {
        let plan = self.with_day(day, || {
            let previous = self.store.load_plan(day)?;
            let tasks = self.store.tasks()?;
            let events = self.store.events_since(local_day_start_utc(day))?;

            let plan = replan(previous.as_ref(), day, &tasks, &events, prefs)?;
            debug!(day = %day, events = events.len(), changes = ?plan.changes, "replanned");
            self.persist(&plan, "replan")?;
            Ok(plan)
        })?;
        self.enrich(plan, true)
    }

    /// Add generated text to a saved plan. The enriched copy replaces the stored plan
    /// only if nobody changed it while the generator was running.
    fn enrich(&self, saved: Plan, explain: bool) -> Result<Plan> {
        if !self.enricher.is_enabled() {
            return Ok(saved);
        }
        let mut plan = saved.clone();
        self.enrich_now(&mut plan);
        if explain {
            plan.explanation = self.explain_replan(&plan);
        }
        if plan == saved {
            return Ok(plan);
        }

        let day = plan.date;
        self.with_day(day, || {
            if self.store.load_plan(day)?.as_ref() == Some(&saved) {
                self.persist(&plan, "enrich")?;
            } else {
                debug!(day = %day, "plan changed during text generation; enriched copy not saved");
            }
            Ok(plan)
        })
    }

    /// End-of-day review. Never fails on generator errors.
    pub fn review(&self, day: NaiveDate) -> Result<Review> {
        let Some(plan) = self.store.load_plan(day)? else {
            return Ok(Review {
                date: day,
                review: NO_PLAN_REVIEW.to_string(),
            });
        };
        let input = ReviewInput::collect(&plan, &self.store.tasks()?);

        let review = if !self.enricher.is_enabled() {
            DISABLED_REVIEW.to_string()
        } else {
            let prompt = end_of_day_review_prompt(&input.planned, &input.done, &input.blocked);
            match self.enricher.generate(SYSTEM_PULSE, &prompt) {
                Ok(text) if !text.trim().is_empty() => text.trim().to_string(),
                Ok(_) => input.summary(),
                Err(e) => {
                    warn!(error = %e, "review generation failed; using summary");
                    input.summary()
                }
            }
        };
        Ok(Review { date: day, review })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enrich::Disabled;
    use crate::store::MemoryStore;
    use crate::task::Task;

    #[test]
    fn day_locks_are_released_after_each_transition() {
        let svc = PlanService::new(MemoryStore::with_tasks(vec![Task::new(1, "a")]), Disabled);
        let day = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap();

        svc.generate(day, &DayPrefs::default()).unwrap();
        svc.set_lock(day, "admin-2", true, &DayPrefs::default()).unwrap();
        assert!(svc.move_task(day, "admin-2", "focus-3", 1, 0).is_err());
        svc.replan(day.succ_opt().unwrap(), &DayPrefs::default()).unwrap();

        assert!(lock_ignoring_poison(&svc.day_locks).is_empty());
    }
}
