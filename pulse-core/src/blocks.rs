//! Block builder: partitions the work-hours span into labeled capacity blocks.
//!
//! Layout (v0):
//! - Deep Work 120 min and Admin 60 min, in the order `deep_work_first` asks for
//! - up to two Focus blocks sharing what is left after the fixed blocks (first capped at 120)
//! - Buffer, only when the reserved buffer is at least 15 min
//! - Wrap-up 30 min, always last

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{PlanError, Result};
use crate::task::Task;
use crate::time::{add_minutes, fmt_hhmm, minutes_between, parse_hhmm};

pub const DEEP_WORK_MIN: i64 = 120;
pub const ADMIN_MIN: i64 = 60;
pub const WRAP_UP_MIN: i64 = 30;
pub const FOCUS_MAX_MIN: i64 = 120;
pub const MIN_USABLE_MIN: i64 = 60;
pub const MIN_BUFFER_BLOCK_MIN: i64 = 15;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    #[serde(rename = "Deep Work")]
    DeepWork,
    Admin,
    Focus,
    Buffer,
    #[serde(rename = "Wrap-up")]
    WrapUp,
}

impl BlockKind {
    pub fn label(self) -> &'static str {
        match self {
            BlockKind::DeepWork => "Deep Work",
            BlockKind::Admin => "Admin",
            BlockKind::Focus => "Focus",
            BlockKind::Buffer => "Buffer",
            BlockKind::WrapUp => "Wrap-up",
        }
    }

    /// Lowercase, hyphenated label used in block ids.
    pub fn slug(self) -> String {
        self.label().to_lowercase().replace(' ', "-")
    }

    /// Buffer and Wrap-up are slack, not places to start real work.
    pub fn is_slack(self) -> bool {
        matches!(self, BlockKind::Buffer | BlockKind::WrapUp)
    }
}

impl fmt::Display for BlockKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Work-hours preferences for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DayPrefs {
    /// "HH:MM", 24-hour.
    pub work_start: String,
    /// "HH:MM"; at or before `work_start` wraps past midnight.
    pub work_end: String,
    /// Fraction of the span reserved as buffer, 0..=1.
    pub buffer_pct: f64,
    pub deep_work_first: bool,
    pub max_tasks_per_block: usize,
}

impl Default for DayPrefs {
    fn default() -> Self {
        Self {
            work_start: "09:00".to_string(),
            work_end: "17:30".to_string(),
            buffer_pct: 0.2,
            deep_work_first: true,
            max_tasks_per_block: 6,
        }
    }
}

impl DayPrefs {
    pub fn validate(&self) -> Result<()> {
        parse_hhmm(&self.work_start)?;
        parse_hhmm(&self.work_end)?;
        if !(0.0..=1.0).contains(&self.buffer_pct) {
            return Err(PlanError::InvalidInput(format!(
                "buffer_pct must be within 0..=1, got {}",
                self.buffer_pct
            )));
        }
        if self.max_tasks_per_block == 0 {
            return Err(PlanError::InvalidInput(
                "max_tasks_per_block must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A block as it appears in a plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Block {
    pub id: String,
    pub label: BlockKind,
    pub start: String,
    pub end: String,
    pub tasks: Vec<Task>,
}

/// A block while it is being filled. Capacity never leaves the allocator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockSlot {
    pub block: Block,
    pub capacity_min: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DayLayout {
    pub slots: Vec<BlockSlot>,
    pub buffer_min: i64,
}

/// Build the ordered, empty block sequence for a day.
pub fn build_day_blocks(prefs: &DayPrefs) -> Result<DayLayout> {
    let start = parse_hhmm(&prefs.work_start)?;
    let end = parse_hhmm(&prefs.work_end)?;
    let total = minutes_between(start, end);

    let buffer_min = (total as f64 * prefs.buffer_pct).floor() as i64;
    let usable = (total - buffer_min).max(MIN_USABLE_MIN);

    let mut remaining = (usable - (DEEP_WORK_MIN + ADMIN_MIN + WRAP_UP_MIN)).max(0);
    let focus1 = remaining.min(FOCUS_MAX_MIN);
    remaining -= focus1;
    let focus2 = remaining;

    let mut sequence: Vec<(BlockKind, i64)> = if prefs.deep_work_first {
        vec![(BlockKind::DeepWork, DEEP_WORK_MIN), (BlockKind::Admin, ADMIN_MIN)]
    } else {
        vec![(BlockKind::Admin, ADMIN_MIN), (BlockKind::DeepWork, DEEP_WORK_MIN)]
    };
    sequence.extend(
        [focus1, focus2]
            .into_iter()
            .filter(|m| *m > 0)
            .map(|m| (BlockKind::Focus, m)),
    );
    if buffer_min >= MIN_BUFFER_BLOCK_MIN {
        sequence.push((BlockKind::Buffer, buffer_min));
    }
    sequence.push((BlockKind::WrapUp, WRAP_UP_MIN));

    let mut cursor = start;
    let slots = sequence
        .into_iter()
        .enumerate()
        .map(|(i, (kind, minutes))| {
            let block_start = cursor;
            cursor = add_minutes(cursor, minutes);
            BlockSlot {
                block: Block {
                    id: format!("{}-{}", kind.slug(), i + 1),
                    label: kind,
                    start: fmt_hhmm(block_start),
                    end: fmt_hhmm(cursor),
                    tasks: Vec::new(),
                },
                capacity_min: minutes,
            }
        })
        .collect();

    Ok(DayLayout { slots, buffer_min })
}
