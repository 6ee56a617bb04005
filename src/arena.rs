//! Arena allocators - fixed-capacity pools for order and price-level records.
//!
//! Both pools pre-allocate a contiguous block at startup and recycle records
//! through an embedded free list, eliminating heap traffic in the hot path.
//! "Pointers" between records are 32-bit indices into the owning pool.

use crate::command::{OrderType, Side};
use std::fmt;

/// Sentinel value representing a null/invalid index (like nullptr)
pub const NULL_INDEX: u32 = u32::MAX;

/// Type alias for arena indices - our "compressed pointers".
/// Using u32 instead of 64-bit pointers halves linkage metadata,
/// doubling cache efficiency.
pub type ArenaIndex = u32;

/// A single order record - exactly 64 bytes (one cache line).
///
/// Doubles as a free-list entry: while pooled, `next` holds the index of the
/// next free record and every other field is stale.
#[repr(C)]
#[repr(align(64))]
#[derive(Clone, Copy)]
pub struct OrderNode {
    // === Hot data (read on every trade) ===
    /// External (or synthetic) order id
    pub id: u64,

    /// Limit price; `i64::MAX` for a market buy, `0` for a market sell
    pub price: i64,

    /// Trigger price; meaningful only for Stop / StopLimit
    pub stop_price: i64,

    /// Remaining quantity to fill
    pub shares: u32,

    // === Linkage (FIFO queue within a price level) ===
    /// Next order at the same level; free-list link while pooled
    pub next: ArenaIndex,

    /// Previous order at the same level (enables O(1) cancel)
    pub prev: ArenaIndex,

    /// Back-reference to the owning price level
    pub level: ArenaIndex,

    pub side: Side,
    pub kind: OrderType,
}

const _: () = assert!(
    std::mem::size_of::<OrderNode>() == 64,
    "OrderNode must be exactly 64 bytes (one cache line)"
);

impl OrderNode {
    /// Create an empty/uninitialized record (for pool construction)
    #[inline]
    pub const fn empty() -> Self {
        Self {
            id: 0,
            price: 0,
            stop_price: 0,
            shares: 0,
            next: NULL_INDEX,
            prev: NULL_INDEX,
            level: NULL_INDEX,
            side: Side::Buy,
            kind: OrderType::Limit,
        }
    }

    /// Reset all structural links. Called on release so that stale links
    /// can never resurrect a recycled record.
    #[inline]
    pub fn clear_links(&mut self) {
        self.next = NULL_INDEX;
        self.prev = NULL_INDEX;
        self.level = NULL_INDEX;
    }
}

impl fmt::Debug for OrderNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderNode")
            .field("id", &self.id)
            .field("side", &self.side)
            .field("kind", &self.kind)
            .field("shares", &self.shares)
            .field("price", &self.price)
            .field("stop_price", &self.stop_price)
            .field("prev", &self.prev)
            .field("next", &self.next)
            .field("level", &self.level)
            .finish()
    }
}

/// A price level record: one AVL node plus the head/tail of the intrusive
/// FIFO of orders resting at this price.
///
/// While pooled, `right` holds the free-list link.
#[repr(C)]
#[repr(align(64))]
#[derive(Clone, Copy, Debug)]
pub struct LevelNode {
    /// The price this level represents
    pub price: i64,

    /// Oldest order (highest time priority, first to match)
    pub head: ArenaIndex,

    /// Newest order (last to match)
    pub tail: ArenaIndex,

    /// AVL left child
    pub left: ArenaIndex,

    /// AVL right child; free-list link while pooled
    pub right: ArenaIndex,

    /// AVL height (leaf = 1)
    pub height: i32,
}

impl LevelNode {
    #[inline]
    pub const fn empty() -> Self {
        Self {
            price: 0,
            head: NULL_INDEX,
            tail: NULL_INDEX,
            left: NULL_INDEX,
            right: NULL_INDEX,
            height: 1,
        }
    }
}

/// Pre-allocated pool of order records with O(1) alloc and free.
///
/// The free list is threaded through the `next` field of pooled records.
pub struct OrderArena {
    nodes: Vec<OrderNode>,
    free_head: ArenaIndex,
    allocated_count: u32,
    capacity: u32,
}

impl OrderArena {
    /// Create a pool holding up to `capacity` orders.
    ///
    /// # Panics
    /// Panics if capacity reaches `NULL_INDEX` (reserved as the sentinel).
    pub fn new(capacity: u32) -> Self {
        assert!(capacity < NULL_INDEX, "capacity must be less than NULL_INDEX");

        let mut nodes = vec![OrderNode::empty(); capacity as usize];
        for i in 0..capacity.saturating_sub(1) {
            nodes[i as usize].next = i + 1;
        }

        Self {
            nodes,
            free_head: if capacity > 0 { 0 } else { NULL_INDEX },
            allocated_count: 0,
            capacity,
        }
    }

    /// Pop a record off the free list and initialize it.
    ///
    /// Returns `None` on exhaustion; the caller drops the command.
    #[inline]
    pub fn alloc(
        &mut self,
        id: u64,
        side: Side,
        kind: OrderType,
        shares: u32,
        price: i64,
        stop_price: i64,
    ) -> Option<ArenaIndex> {
        if self.free_head == NULL_INDEX {
            return None;
        }

        let index = self.free_head;
        let node = &mut self.nodes[index as usize];
        self.free_head = node.next;
        self.allocated_count += 1;

        node.id = id;
        node.side = side;
        node.kind = kind;
        node.shares = shares;
        node.price = price;
        node.stop_price = stop_price;
        node.clear_links();

        Some(index)
    }

    /// Push a record back onto the free list, clearing its links first.
    #[inline]
    pub fn free(&mut self, index: ArenaIndex) {
        debug_assert!(index < self.capacity, "index out of bounds");
        debug_assert!(self.allocated_count > 0, "double free detected");

        let node = &mut self.nodes[index as usize];
        node.clear_links();
        node.next = self.free_head;
        self.free_head = index;
        self.allocated_count -= 1;
    }

    #[inline]
    pub fn get(&self, index: ArenaIndex) -> &OrderNode {
        debug_assert!(index < self.capacity, "index out of bounds");
        &self.nodes[index as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, index: ArenaIndex) -> &mut OrderNode {
        debug_assert!(index < self.capacity, "index out of bounds");
        &mut self.nodes[index as usize]
    }

    /// Number of records currently out of the pool.
    #[inline]
    pub fn allocated(&self) -> u32 {
        self.allocated_count
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Pre-fault all pages (warm-up routine). Walks every record and forces
    /// a write so the OS maps physical RAM before the hot path runs.
    pub fn warm_up(&mut self) {
        for node in &mut self.nodes {
            unsafe {
                std::ptr::write_volatile(&mut node.id, node.id);
            }
        }
    }
}

impl fmt::Debug for OrderArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderArena")
            .field("capacity", &self.capacity)
            .field("allocated", &self.allocated_count)
            .field("free_head", &self.free_head)
            .finish()
    }
}

/// Pre-allocated pool of price-level records.
///
/// The free list is threaded through the `right` field of pooled records.
pub struct LevelArena {
    nodes: Vec<LevelNode>,
    free_head: ArenaIndex,
    allocated_count: u32,
    capacity: u32,
}

impl LevelArena {
    pub fn new(capacity: u32) -> Self {
        assert!(capacity < NULL_INDEX, "capacity must be less than NULL_INDEX");

        let mut nodes = vec![LevelNode::empty(); capacity as usize];
        for i in 0..capacity.saturating_sub(1) {
            nodes[i as usize].right = i + 1;
        }

        Self {
            nodes,
            free_head: if capacity > 0 { 0 } else { NULL_INDEX },
            allocated_count: 0,
            capacity,
        }
    }

    /// Pop a fresh leaf-level record for `price`.
    #[inline]
    pub fn alloc(&mut self, price: i64) -> Option<ArenaIndex> {
        if self.free_head == NULL_INDEX {
            return None;
        }

        let index = self.free_head;
        let node = &mut self.nodes[index as usize];
        self.free_head = node.right;
        self.allocated_count += 1;

        node.price = price;
        node.head = NULL_INDEX;
        node.tail = NULL_INDEX;
        node.left = NULL_INDEX;
        node.right = NULL_INDEX;
        node.height = 1;

        Some(index)
    }

    /// Recycle a level. All tree and FIFO links are cleared so nothing can
    /// reach removed records through this node again.
    #[inline]
    pub fn free(&mut self, index: ArenaIndex) {
        debug_assert!(index < self.capacity, "index out of bounds");
        debug_assert!(self.allocated_count > 0, "double free detected");

        let node = &mut self.nodes[index as usize];
        node.head = NULL_INDEX;
        node.tail = NULL_INDEX;
        node.left = NULL_INDEX;
        node.right = self.free_head;
        self.free_head = index;
        self.allocated_count -= 1;
    }

    #[inline]
    pub fn get(&self, index: ArenaIndex) -> &LevelNode {
        debug_assert!(index < self.capacity, "index out of bounds");
        &self.nodes[index as usize]
    }

    #[inline]
    pub fn get_mut(&mut self, index: ArenaIndex) -> &mut LevelNode {
        debug_assert!(index < self.capacity, "index out of bounds");
        &mut self.nodes[index as usize]
    }

    #[inline]
    pub fn allocated(&self) -> u32 {
        self.allocated_count
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn warm_up(&mut self) {
        for node in &mut self.nodes {
            unsafe {
                std::ptr::write_volatile(&mut node.price, node.price);
            }
        }
    }
}

impl fmt::Debug for LevelArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LevelArena")
            .field("capacity", &self.capacity)
            .field("allocated", &self.allocated_count)
            .field("free_head", &self.free_head)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_node_sizes() {
        assert_eq!(std::mem::size_of::<OrderNode>(), 64);
        assert_eq!(std::mem::align_of::<OrderNode>(), 64);
        assert_eq!(std::mem::size_of::<LevelNode>(), 64);
    }

    #[test]
    fn test_order_arena_alloc_free() {
        let mut arena = OrderArena::new(3);

        let a = arena.alloc(1, Side::Buy, OrderType::Limit, 10, 100, 0).unwrap();
        let b = arena.alloc(2, Side::Sell, OrderType::Limit, 20, 101, 0).unwrap();
        let c = arena.alloc(3, Side::Buy, OrderType::Market, 30, i64::MAX, 0).unwrap();

        assert_eq!(arena.allocated(), 3);
        assert!(arena
            .alloc(4, Side::Buy, OrderType::Limit, 1, 1, 0)
            .is_none());

        arena.free(b);
        assert_eq!(arena.allocated(), 2);

        // Freed slot is reused
        let d = arena.alloc(5, Side::Sell, OrderType::Limit, 5, 99, 0).unwrap();
        assert_eq!(d, b);

        arena.free(a);
        arena.free(c);
        arena.free(d);
        assert_eq!(arena.allocated(), 0);
    }

    #[test]
    fn test_alloc_initializes_fields() {
        let mut arena = OrderArena::new(4);
        let ix = arena
            .alloc(42, Side::Sell, OrderType::StopLimit, 7, 95, 97)
            .unwrap();

        let node = arena.get(ix);
        assert_eq!(node.id, 42);
        assert_eq!(node.side, Side::Sell);
        assert_eq!(node.kind, OrderType::StopLimit);
        assert_eq!(node.shares, 7);
        assert_eq!(node.price, 95);
        assert_eq!(node.stop_price, 97);
        assert_eq!(node.next, NULL_INDEX);
        assert_eq!(node.prev, NULL_INDEX);
        assert_eq!(node.level, NULL_INDEX);
    }

    #[test]
    fn test_free_clears_links() {
        let mut arena = OrderArena::new(4);
        let a = arena.alloc(1, Side::Buy, OrderType::Limit, 10, 100, 0).unwrap();
        let b = arena.alloc(2, Side::Buy, OrderType::Limit, 10, 100, 0).unwrap();

        arena.get_mut(a).next = b;
        arena.get_mut(a).prev = b;
        arena.get_mut(a).level = 3;

        arena.free(b);
        arena.free(a);

        // a sits at the head of the free list; prev/level were cleared
        assert_eq!(arena.get(a).prev, NULL_INDEX);
        assert_eq!(arena.get(a).level, NULL_INDEX);
    }

    #[test]
    fn test_level_arena_alloc_free() {
        let mut arena = LevelArena::new(2);

        let a = arena.alloc(100).unwrap();
        let b = arena.alloc(101).unwrap();
        assert!(arena.alloc(102).is_none());

        assert_eq!(arena.get(a).price, 100);
        assert_eq!(arena.get(a).height, 1);
        assert_eq!(arena.get(b).left, NULL_INDEX);

        arena.free(a);
        let c = arena.alloc(103).unwrap();
        assert_eq!(c, a);
        assert_eq!(arena.get(c).head, NULL_INDEX);
        assert_eq!(arena.get(c).tail, NULL_INDEX);
    }

    #[test]
    fn test_warm_up() {
        let mut orders = OrderArena::new(1000);
        let mut levels = LevelArena::new(200);
        orders.warm_up();
        levels.warm_up();
    }
}
