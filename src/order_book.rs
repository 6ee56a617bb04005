//! Order Book - four price trees plus the id indices.
//!
//! Live limit orders rest in the bid/ask trees; armed stop orders rest in
//! the stop-buy/stop-sell trees keyed by trigger price. The two `FxHashMap`
//! indices are the source of truth for existence: live ⇔ in the live index,
//! armed ⇔ in the stop index, freed ⇔ on a free list. They hold non-owning
//! arena indices and are kept in lockstep with the trees.

use rustc_hash::FxHashMap;

use crate::arena::{ArenaIndex, LevelArena, OrderArena, NULL_INDEX};
use crate::command::Side;
use crate::price_level;
use crate::tree;

pub struct OrderBook {
    /// Resting buy limits; max is the best bid
    pub bid_root: ArenaIndex,
    /// Resting sell limits; min is the best ask
    pub ask_root: ArenaIndex,
    /// Armed buy stops keyed by trigger price; min is next to trigger
    pub stop_buy_root: ArenaIndex,
    /// Armed sell stops keyed by trigger price; max is next to trigger
    pub stop_sell_root: ArenaIndex,
    live: FxHashMap<u64, ArenaIndex>,
    armed: FxHashMap<u64, ArenaIndex>,
}

impl OrderBook {
    pub fn new() -> Self {
        Self {
            bid_root: NULL_INDEX,
            ask_root: NULL_INDEX,
            stop_buy_root: NULL_INDEX,
            stop_sell_root: NULL_INDEX,
            live: FxHashMap::default(),
            armed: FxHashMap::default(),
        }
    }

    /// Pre-size the id indices for the expected order population.
    pub fn with_capacity(orders: usize) -> Self {
        Self {
            bid_root: NULL_INDEX,
            ask_root: NULL_INDEX,
            stop_buy_root: NULL_INDEX,
            stop_sell_root: NULL_INDEX,
            live: FxHashMap::with_capacity_and_hasher(orders, Default::default()),
            armed: FxHashMap::with_capacity_and_hasher(orders / 4, Default::default()),
        }
    }

    // ========================================================================
    // Best Price Access
    // ========================================================================

    /// Highest resting buy price
    #[inline]
    pub fn best_bid(&self, levels: &LevelArena) -> Option<i64> {
        let ix = tree::max(levels, self.bid_root);
        (ix != NULL_INDEX).then(|| levels.get(ix).price)
    }

    /// Lowest resting sell price
    #[inline]
    pub fn best_ask(&self, levels: &LevelArena) -> Option<i64> {
        let ix = tree::min(levels, self.ask_root);
        (ix != NULL_INDEX).then(|| levels.get(ix).price)
    }

    /// Best opposite level for an incoming order (min ask for a buy,
    /// max bid for a sell), or `NULL_INDEX` if that side is empty.
    #[inline]
    pub fn best_opposite(&self, levels: &LevelArena, side: Side) -> ArenaIndex {
        match side {
            Side::Buy => tree::min(levels, self.ask_root),
            Side::Sell => tree::max(levels, self.bid_root),
        }
    }

    // ========================================================================
    // Index Access
    // ========================================================================

    #[inline]
    pub fn lookup_live(&self, id: u64) -> Option<ArenaIndex> {
        self.live.get(&id).copied()
    }

    #[inline]
    pub fn lookup_armed(&self, id: u64) -> Option<ArenaIndex> {
        self.armed.get(&id).copied()
    }

    /// Drop an id from the live index (after a full fill or cancel)
    #[inline]
    pub fn forget_live(&mut self, id: u64) {
        self.live.remove(&id);
    }

    #[inline]
    pub fn forget_armed(&mut self, id: u64) {
        self.armed.remove(&id);
    }

    #[inline]
    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    #[inline]
    pub fn armed_count(&self) -> usize {
        self.armed.len()
    }

    // ========================================================================
    // Insertion
    // ========================================================================

    /// Rest a limit order in its side's tree and index it.
    ///
    /// Returns `false` (leaving the book untouched) when the level pool is
    /// exhausted; the caller recycles the order record.
    pub fn insert_resting(
        &mut self,
        levels: &mut LevelArena,
        orders: &mut OrderArena,
        order_ix: ArenaIndex,
    ) -> bool {
        let (id, side, price) = {
            let order = orders.get(order_ix);
            (order.id, order.side, order.price)
        };

        let root = match side {
            Side::Buy => self.bid_root,
            Side::Sell => self.ask_root,
        };
        let (new_root, level) = tree::insert_or_get(levels, root, price);
        if level == NULL_INDEX {
            return false;
        }
        match side {
            Side::Buy => self.bid_root = new_root,
            Side::Sell => self.ask_root = new_root,
        }

        price_level::push_back(levels, orders, level, order_ix);
        self.live.insert(id, order_ix);
        true
    }

    /// Arm a stop order in its side's stop tree, keyed by trigger price.
    pub fn insert_armed(
        &mut self,
        levels: &mut LevelArena,
        orders: &mut OrderArena,
        order_ix: ArenaIndex,
    ) -> bool {
        let (id, side, stop_price) = {
            let order = orders.get(order_ix);
            (order.id, order.side, order.stop_price)
        };

        let root = match side {
            Side::Buy => self.stop_buy_root,
            Side::Sell => self.stop_sell_root,
        };
        let (new_root, level) = tree::insert_or_get(levels, root, stop_price);
        if level == NULL_INDEX {
            return false;
        }
        match side {
            Side::Buy => self.stop_buy_root = new_root,
            Side::Sell => self.stop_sell_root = new_root,
        }

        price_level::push_back(levels, orders, level, order_ix);
        self.armed.insert(id, order_ix);
        true
    }

    // ========================================================================
    // Removal
    // ========================================================================

    /// Unlink a live order from its level, pruning the level if it empties.
    /// The index entry is erased; the record itself is NOT freed.
    pub fn remove_live(
        &mut self,
        levels: &mut LevelArena,
        orders: &mut OrderArena,
        id: u64,
        order_ix: ArenaIndex,
    ) {
        let side = orders.get(order_ix).side;
        let level_ix = orders.get(order_ix).level;

        if price_level::unlink(levels, orders, order_ix) {
            let price = levels.get(level_ix).price;
            match side {
                Side::Buy => self.bid_root = tree::remove(levels, orders, self.bid_root, price),
                Side::Sell => self.ask_root = tree::remove(levels, orders, self.ask_root, price),
            }
        }
        self.live.remove(&id);
    }

    /// Stop-side counterpart of [`remove_live`](Self::remove_live).
    pub fn remove_armed(
        &mut self,
        levels: &mut LevelArena,
        orders: &mut OrderArena,
        id: u64,
        order_ix: ArenaIndex,
    ) {
        let side = orders.get(order_ix).side;
        let level_ix = orders.get(order_ix).level;

        if price_level::unlink(levels, orders, order_ix) {
            let price = levels.get(level_ix).price;
            match side {
                Side::Buy => {
                    self.stop_buy_root = tree::remove(levels, orders, self.stop_buy_root, price)
                }
                Side::Sell => {
                    self.stop_sell_root = tree::remove(levels, orders, self.stop_sell_root, price)
                }
            }
        }
        self.armed.remove(&id);
    }
}

impl Default for OrderBook {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for OrderBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrderBook")
            .field("live_count", &self.live.len())
            .field("armed_count", &self.armed.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::{OrderType, Side};

    fn setup() -> (LevelArena, OrderArena, OrderBook) {
        (LevelArena::new(64), OrderArena::new(64), OrderBook::new())
    }

    fn rest_limit(
        levels: &mut LevelArena,
        orders: &mut OrderArena,
        book: &mut OrderBook,
        id: u64,
        side: Side,
        price: i64,
    ) -> ArenaIndex {
        let ix = orders
            .alloc(id, side, OrderType::Limit, 10, price, 0)
            .unwrap();
        assert!(book.insert_resting(levels, orders, ix));
        ix
    }

    #[test]
    fn test_empty_book() {
        let (levels, _orders, book) = setup();
        assert_eq!(book.best_bid(&levels), None);
        assert_eq!(book.best_ask(&levels), None);
        assert_eq!(book.live_count(), 0);
        assert_eq!(book.armed_count(), 0);
    }

    #[test]
    fn test_best_prices() {
        let (mut levels, mut orders, mut book) = setup();

        rest_limit(&mut levels, &mut orders, &mut book, 1, Side::Buy, 100);
        rest_limit(&mut levels, &mut orders, &mut book, 2, Side::Buy, 102);
        rest_limit(&mut levels, &mut orders, &mut book, 3, Side::Buy, 99);
        rest_limit(&mut levels, &mut orders, &mut book, 4, Side::Sell, 105);
        rest_limit(&mut levels, &mut orders, &mut book, 5, Side::Sell, 104);

        assert_eq!(book.best_bid(&levels), Some(102));
        assert_eq!(book.best_ask(&levels), Some(104));
        assert_eq!(book.live_count(), 5);
    }

    #[test]
    fn test_best_opposite() {
        let (mut levels, mut orders, mut book) = setup();

        rest_limit(&mut levels, &mut orders, &mut book, 1, Side::Buy, 100);
        rest_limit(&mut levels, &mut orders, &mut book, 2, Side::Sell, 105);

        let for_buyer = book.best_opposite(&levels, Side::Buy);
        assert_eq!(levels.get(for_buyer).price, 105);
        let for_seller = book.best_opposite(&levels, Side::Sell);
        assert_eq!(levels.get(for_seller).price, 100);
    }

    #[test]
    fn test_remove_live_prunes_empty_level() {
        let (mut levels, mut orders, mut book) = setup();

        let a = rest_limit(&mut levels, &mut orders, &mut book, 1, Side::Buy, 100);
        let b = rest_limit(&mut levels, &mut orders, &mut book, 2, Side::Buy, 100);

        book.remove_live(&mut levels, &mut orders, 1, a);
        assert_eq!(book.best_bid(&levels), Some(100), "level survives while populated");
        assert_eq!(book.live_count(), 1);

        book.remove_live(&mut levels, &mut orders, 2, b);
        assert_eq!(book.best_bid(&levels), None);
        assert_eq!(levels.allocated(), 0);
    }

    #[test]
    fn test_armed_stops_are_separate() {
        let (mut levels, mut orders, mut book) = setup();

        let stop = orders
            .alloc(30, Side::Sell, OrderType::Stop, 5, 0, 95)
            .unwrap();
        assert!(book.insert_armed(&mut levels, &mut orders, stop));

        assert_eq!(book.armed_count(), 1);
        assert_eq!(book.live_count(), 0);
        assert_eq!(book.lookup_armed(30), Some(stop));
        assert_eq!(book.lookup_live(30), None);
        // Armed stops never contribute to the live best prices
        assert_eq!(book.best_bid(&levels), None);
        assert_eq!(book.best_ask(&levels), None);

        book.remove_armed(&mut levels, &mut orders, 30, stop);
        assert_eq!(book.armed_count(), 0);
        assert_eq!(levels.allocated(), 0);
    }

    #[test]
    fn test_insert_fails_when_level_pool_exhausted() {
        let mut levels = LevelArena::new(1);
        let mut orders = OrderArena::new(8);
        let mut book = OrderBook::new();

        rest_limit(&mut levels, &mut orders, &mut book, 1, Side::Buy, 100);

        let ix = orders
            .alloc(2, Side::Buy, OrderType::Limit, 10, 101, 0)
            .unwrap();
        assert!(!book.insert_resting(&mut levels, &mut orders, ix));
        assert_eq!(book.live_count(), 1);
        assert_eq!(book.best_bid(&levels), Some(100), "failed insert leaves tree intact");
    }
}
