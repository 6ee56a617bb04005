//! Price-level tree - AVL tree keyed by price over arena indices.
//!
//! Each of the four books (bids, asks, stop-buys, stop-sells) is one root
//! index into the shared `LevelArena`. Nodes are `LevelNode`s; rebalancing
//! follows the classic height-balanced insert/delete with rotations.
//!
//! The delete path is the subtle one: when a node with two children is
//! removed, the in-order successor's price and FIFO (head/tail) are spliced
//! into the removed node's slot, and every order on that FIFO gets its
//! `level` back-reference rewritten to the surviving node. Rotations never
//! move payloads between nodes, so back-references survive them untouched.

use crate::arena::{ArenaIndex, LevelArena, OrderArena, NULL_INDEX};

#[inline]
fn height(levels: &LevelArena, ix: ArenaIndex) -> i32 {
    if ix == NULL_INDEX {
        0
    } else {
        levels.get(ix).height
    }
}

#[inline]
fn update_height(levels: &mut LevelArena, ix: ArenaIndex) {
    let left = height(levels, levels.get(ix).left);
    let right = height(levels, levels.get(ix).right);
    levels.get_mut(ix).height = 1 + left.max(right);
}

#[inline]
fn balance_factor(levels: &LevelArena, ix: ArenaIndex) -> i32 {
    if ix == NULL_INDEX {
        0
    } else {
        height(levels, levels.get(ix).left) - height(levels, levels.get(ix).right)
    }
}

/// Right rotation around `y`; returns the new subtree root.
fn rotate_right(levels: &mut LevelArena, y: ArenaIndex) -> ArenaIndex {
    let x = levels.get(y).left;
    let t = levels.get(x).right;

    levels.get_mut(x).right = y;
    levels.get_mut(y).left = t;

    update_height(levels, y);
    update_height(levels, x);
    x
}

/// Left rotation around `x`; returns the new subtree root.
fn rotate_left(levels: &mut LevelArena, x: ArenaIndex) -> ArenaIndex {
    let y = levels.get(x).right;
    let t = levels.get(y).left;

    levels.get_mut(y).left = x;
    levels.get_mut(x).right = t;

    update_height(levels, x);
    update_height(levels, y);
    y
}

/// Leftmost (lowest-price) node of the subtree, or `NULL_INDEX`.
#[inline]
pub fn min(levels: &LevelArena, mut ix: ArenaIndex) -> ArenaIndex {
    if ix == NULL_INDEX {
        return NULL_INDEX;
    }
    while levels.get(ix).left != NULL_INDEX {
        ix = levels.get(ix).left;
    }
    ix
}

/// Rightmost (highest-price) node of the subtree, or `NULL_INDEX`.
#[inline]
pub fn max(levels: &LevelArena, mut ix: ArenaIndex) -> ArenaIndex {
    if ix == NULL_INDEX {
        return NULL_INDEX;
    }
    while levels.get(ix).right != NULL_INDEX {
        ix = levels.get(ix).right;
    }
    ix
}

/// Find the level holding `price`, creating it if absent.
///
/// Returns `(new_root, level)`. `level` is `NULL_INDEX` when the price was
/// absent and the level pool is exhausted; the tree is unchanged in that
/// case and the caller drops the command.
pub fn insert_or_get(
    levels: &mut LevelArena,
    node: ArenaIndex,
    price: i64,
) -> (ArenaIndex, ArenaIndex) {
    if node == NULL_INDEX {
        return match levels.alloc(price) {
            Some(fresh) => (fresh, fresh),
            None => (NULL_INDEX, NULL_INDEX),
        };
    }

    let node_price = levels.get(node).price;
    let target;

    if price < node_price {
        let left = levels.get(node).left;
        let (new_left, found) = insert_or_get(levels, left, price);
        levels.get_mut(node).left = new_left;
        target = found;
    } else if price > node_price {
        let right = levels.get(node).right;
        let (new_right, found) = insert_or_get(levels, right, price);
        levels.get_mut(node).right = new_right;
        target = found;
    } else {
        return (node, node);
    }

    if target == NULL_INDEX {
        // Nothing was inserted; heights are unchanged
        return (node, NULL_INDEX);
    }

    update_height(levels, node);
    let bal = balance_factor(levels, node);

    if bal > 1 && price < levels.get(levels.get(node).left).price {
        return (rotate_right(levels, node), target);
    }
    if bal < -1 && price > levels.get(levels.get(node).right).price {
        return (rotate_left(levels, node), target);
    }
    if bal > 1 && price > levels.get(levels.get(node).left).price {
        let left = levels.get(node).left;
        let new_left = rotate_left(levels, left);
        levels.get_mut(node).left = new_left;
        return (rotate_right(levels, node), target);
    }
    if bal < -1 && price < levels.get(levels.get(node).right).price {
        let right = levels.get(node).right;
        let new_right = rotate_right(levels, right);
        levels.get_mut(node).right = new_right;
        return (rotate_left(levels, node), target);
    }

    (node, target)
}

/// Remove the level holding `price`, recycling its record.
///
/// Returns the new subtree root. When the removed node has two children,
/// the in-order successor's price and FIFO are moved into the node and every
/// moved order's `level` back-reference is rewritten - this is the invariant
/// that keeps cancel-by-id valid across deletions.
pub fn remove(
    levels: &mut LevelArena,
    orders: &mut OrderArena,
    node: ArenaIndex,
    price: i64,
) -> ArenaIndex {
    if node == NULL_INDEX {
        return NULL_INDEX;
    }

    let node_price = levels.get(node).price;

    if price < node_price {
        let left = levels.get(node).left;
        let new_left = remove(levels, orders, left, price);
        levels.get_mut(node).left = new_left;
    } else if price > node_price {
        let right = levels.get(node).right;
        let new_right = remove(levels, orders, right, price);
        levels.get_mut(node).right = new_right;
    } else {
        let left = levels.get(node).left;
        let right = levels.get(node).right;

        if left == NULL_INDEX || right == NULL_INDEX {
            let child = if left != NULL_INDEX { left } else { right };
            levels.free(node);
            return child;
        }

        // Two children: splice the in-order successor into this slot
        let succ = min(levels, right);
        let (succ_price, succ_head, succ_tail) = {
            let s = levels.get(succ);
            (s.price, s.head, s.tail)
        };
        {
            let n = levels.get_mut(node);
            n.price = succ_price;
            n.head = succ_head;
            n.tail = succ_tail;
        }

        // Every transferred order must point at its new home
        let mut cur = succ_head;
        while cur != NULL_INDEX {
            let order = orders.get_mut(cur);
            order.level = node;
            cur = order.next;
        }

        let new_right = remove(levels, orders, right, succ_price);
        levels.get_mut(node).right = new_right;
    }

    update_height(levels, node);
    let bal = balance_factor(levels, node);

    if bal > 1 && balance_factor(levels, levels.get(node).left) >= 0 {
        return rotate_right(levels, node);
    }
    if bal > 1 {
        let left = levels.get(node).left;
        let new_left = rotate_left(levels, left);
        levels.get_mut(node).left = new_left;
        return rotate_right(levels, node);
    }
    if bal < -1 && balance_factor(levels, levels.get(node).right) <= 0 {
        return rotate_left(levels, node);
    }
    if bal < -1 {
        let right = levels.get(node).right;
        let new_right = rotate_right(levels, right);
        levels.get_mut(node).right = new_right;
        return rotate_left(levels, node);
    }

    node
}
