//! Price-level FIFO - the intrusive time-priority queue at a single price.
//!
//! The list is doubly linked through `OrderNode.prev`/`next` with the owning
//! `LevelNode` holding `head` (oldest, first to match) and `tail`. All
//! operations are O(1) index writes; no allocation ever happens here.

use crate::arena::{ArenaIndex, LevelArena, OrderArena, NULL_INDEX};

/// Append an order at the tail of `level_ix` (lowest time priority) and set
/// its back-reference.
#[inline]
pub fn push_back(
    levels: &mut LevelArena,
    orders: &mut OrderArena,
    level_ix: ArenaIndex,
    order_ix: ArenaIndex,
) {
    let tail = levels.get(level_ix).tail;

    if tail == NULL_INDEX {
        debug_assert_eq!(levels.get(level_ix).head, NULL_INDEX);
        let level = levels.get_mut(level_ix);
        level.head = order_ix;
        level.tail = order_ix;
        let order = orders.get_mut(order_ix);
        order.prev = NULL_INDEX;
        order.next = NULL_INDEX;
    } else {
        orders.get_mut(tail).next = order_ix;
        let order = orders.get_mut(order_ix);
        order.prev = tail;
        order.next = NULL_INDEX;
        levels.get_mut(level_ix).tail = order_ix;
    }

    orders.get_mut(order_ix).level = level_ix;
}

/// Unlink an order from its level using its own prev/next links.
///
/// Handles head, tail, middle and only-node positions. The order record is
/// NOT freed; the caller recycles it (or re-queues it, for modify).
///
/// Returns `true` if the level is now empty and must be removed from its
/// tree by the caller.
#[inline]
pub fn unlink(levels: &mut LevelArena, orders: &mut OrderArena, order_ix: ArenaIndex) -> bool {
    let (prev, next, level_ix) = {
        let order = orders.get(order_ix);
        (order.prev, order.next, order.level)
    };
    debug_assert_ne!(level_ix, NULL_INDEX, "order is not resting at any level");

    if prev != NULL_INDEX {
        orders.get_mut(prev).next = next;
    } else {
        debug_assert_eq!(levels.get(level_ix).head, order_ix);
        levels.get_mut(level_ix).head = next;
    }

    if next != NULL_INDEX {
        orders.get_mut(next).prev = prev;
    } else {
        debug_assert_eq!(levels.get(level_ix).tail, order_ix);
        levels.get_mut(level_ix).tail = prev;
    }

    orders.get_mut(order_ix).clear_links();

    levels.get(level_ix).head == NULL_INDEX
}

/// Index of the oldest order at `level_ix`, or `NULL_INDEX` if empty.
#[inline]
pub fn head(levels: &LevelArena, level_ix: ArenaIndex) -> ArenaIndex {
    levels.get(level_ix).head
}
