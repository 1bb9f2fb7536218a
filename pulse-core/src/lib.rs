//! pulse-core: single-day planning engine for Pulse.
//!
//! Tasks + live signals + work-hours preferences in, a block-structured day plan out.
//! The engine does no I/O; `service` composes it with a store and an optional text
//! generator.

pub mod allocator;
pub mod blocks;
pub mod diff;
pub mod enrich;
pub mod error;
pub mod now;
pub mod plan;
pub mod prompts;
pub mod replan;
pub mod review;
pub mod service;
pub mod signals;
pub mod sorter;
pub mod store;
pub mod task;
pub mod time;

pub use allocator::assign_tasks_to_blocks;
pub use blocks::{build_day_blocks, Block, BlockKind, BlockSlot, DayLayout, DayPrefs};
pub use diff::{diff_changes, DEFAULT_DIFF_LIMIT};
pub use enrich::{Disabled, Enricher};
pub use error::PlanError;
pub use now::{compute_now, NowRecommendation};
pub use plan::Plan;
pub use replan::{build_initial_plan, move_task, replan, toggle_lock, REPLAN_CHANGE_LIMIT};
pub use review::{Review, ReviewInput};
pub use service::PlanService;
pub use signals::{DayEvent, EventKind, SignalSet};
pub use sorter::sort_tasks_with_signals;
pub use store::{DayStore, MemoryStore};
pub use task::{Task, TaskPatch, TaskStatus};
