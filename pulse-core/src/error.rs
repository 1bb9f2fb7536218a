//! Error kinds surfaced by the planner.

use chrono::NaiveDate;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlanError {
    #[error("block not found: {0}")]
    BlockNotFound(String),

    #[error("task #{task_id} not found in block {block_id}")]
    TaskNotInBlock { task_id: i64, block_id: String },

    #[error("cannot move tasks in/out of locked block {0}")]
    LockedBlock(String),

    #[error("no plan for {0}")]
    NoPlanForDay(NaiveDate),

    #[error("invalid time '{0}' (expected HH:MM)")]
    InvalidTime(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Failure inside a `DayStore` implementation.
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, PlanError>;
