//! Block allocator: greedy fill of each block's capacity.
//!
//! Each block kind has a strategy: an ordered list of tiers. A tier is a candidate
//! filter plus a pick rule; the first tier that yields a fitting task wins.
//!
//! | kind                   | tier 1                    | tier 2                   |
//! |------------------------|---------------------------|--------------------------|
//! | Deep Work              | P1, unblocked → longest   | P1, any → longest        |
//! | Admin, Buffer, Wrap-up | unblocked → shortest      | any → shortest           |
//! | Focus                  | unblocked → best ranked   | any → shortest           |
//!
//! Kinds are filled in the order Deep Work → Admin → Focus → Buffer → Wrap-up, and a
//! placed task is never considered again.

use std::cmp::Reverse;
use std::collections::HashSet;

use crate::blocks::{Block, BlockKind, BlockSlot};
use crate::signals::SignalSet;
use crate::sorter::sort_tasks_with_signals;
use crate::task::Task;

/// Stop filling a block once less than this much capacity is left.
pub const MIN_REMAINING_MIN: i64 = 5;

pub const FILL_ORDER: [BlockKind; 5] = [
    BlockKind::DeepWork,
    BlockKind::Admin,
    BlockKind::Focus,
    BlockKind::Buffer,
    BlockKind::WrapUp,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pick {
    /// Longest estimate; earliest ranked among equals.
    Longest,
    /// Shortest estimate; earliest ranked among equals.
    Shortest,
    /// First in composite rank order.
    Ranked,
}

#[derive(Clone, Copy)]
pub struct Tier {
    pub admit: fn(&Task, &SignalSet) -> bool,
    pub pick: Pick,
}

fn p1_unblocked(t: &Task, s: &SignalSet) -> bool {
    t.priority == 1 && !s.is_blocked(t.id)
}

fn p1_any(t: &Task, _: &SignalSet) -> bool {
    t.priority == 1
}

fn unblocked(t: &Task, s: &SignalSet) -> bool {
    !s.is_blocked(t.id)
}

fn any(_: &Task, _: &SignalSet) -> bool {
    true
}

const DEEP_WORK: &[Tier] = &[
    Tier { admit: p1_unblocked, pick: Pick::Longest },
    Tier { admit: p1_any, pick: Pick::Longest },
];

const SHORT_FIRST: &[Tier] = &[
    Tier { admit: unblocked, pick: Pick::Shortest },
    Tier { admit: any, pick: Pick::Shortest },
];

const FOCUS: &[Tier] = &[
    Tier { admit: unblocked, pick: Pick::Ranked },
    Tier { admit: any, pick: Pick::Shortest },
];

pub fn strategy(kind: BlockKind) -> &'static [Tier] {
    match kind {
        BlockKind::DeepWork => DEEP_WORK,
        BlockKind::Focus => FOCUS,
        BlockKind::Admin | BlockKind::Buffer | BlockKind::WrapUp => SHORT_FIRST,
    }
}

/// Choose the next task for a block of `kind` with `remaining` minutes free.
///
/// `ranked` must already be in composite rank order.
pub fn pick_next<'a>(
    kind: BlockKind,
    ranked: &'a [Task],
    used: &HashSet<i64>,
    remaining: i64,
    signals: &SignalSet,
) -> Option<&'a Task> {
    strategy(kind).iter().find_map(|tier| {
        let mut fitting = ranked.iter().filter(|t| {
            !used.contains(&t.id)
                && i64::from(t.estimate_min) <= remaining
                && (tier.admit)(t, signals)
        });
        match tier.pick {
            Pick::Ranked => fitting.next(),
            Pick::Shortest => fitting.min_by_key(|t| t.estimate_min),
            Pick::Longest => fitting.min_by_key(|t| Reverse(t.estimate_min)),
        }
    })
}

/// Fill every slot and return the finished blocks in layout order.
pub fn assign_tasks_to_blocks(
    tasks: &[Task],
    slots: Vec<BlockSlot>,
    max_tasks_per_block: usize,
    signals: &SignalSet,
) -> Vec<Block> {
    let candidates: Vec<Task> = tasks
        .iter()
        .filter(|t| t.status.is_schedulable() && !signals.exclude.contains(&t.id))
        .cloned()
        .collect();
    let ranked = sort_tasks_with_signals(&candidates, signals);

    let mut slots = slots;
    let mut used: HashSet<i64> = signals.exclude.iter().copied().collect();

    for kind in FILL_ORDER {
        for slot in slots.iter_mut().filter(|s| s.block.label == kind) {
            let mut remaining = slot.capacity_min;
            let mut count = 0;
            while remaining >= MIN_REMAINING_MIN && count < max_tasks_per_block {
                let Some(next) = pick_next(kind, &ranked, &used, remaining, signals) else {
                    break;
                };
                used.insert(next.id);
                remaining -= i64::from(next.estimate_min);
                count += 1;
                slot.block.tasks.push(next.clone());
            }
        }
    }

    slots.into_iter().map(|s| s.block).collect()
}
