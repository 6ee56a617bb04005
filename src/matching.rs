//! Matching Engine - place/modify/cancel and the crossing loop.
//!
//! An incoming Market or Limit order sweeps the opposite tree best-level
//! first, FIFO within each level, then rests any Limit residual. After the
//! sweep the two stop trees are scanned against the last executed price;
//! harvested stops convert (Stop -> Market, StopLimit -> Limit) and re-enter
//! `place` with fresh synthetic ids and stop checking disabled, bounding the
//! cascade at one level.

use crate::arena::{ArenaIndex, LevelArena, OrderArena, NULL_INDEX};
use crate::command::{OrderType, PlaceOrder, Side, TradeReport};
use crate::order_book::OrderBook;
use crate::price_level;
use crate::queue::TradeProducer;
use crate::tree;

/// Synthetic ids for triggered stops start here, far above the external
/// id space, so a replacement order can never shadow a client order.
const SYNTHETIC_ID_BASE: u64 = 1_000_000_000;

/// Drop and publication counters. Pool exhaustion and ring overflow drop
/// silently on the hot path; these counters make the drops observable.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EngineStats {
    /// Reports successfully handed to the consumer ring
    pub trades_published: u64,
    /// Reports lost to a full ring (sequence numbers still advance)
    pub trades_dropped: u64,
    /// Commands lost to an exhausted order or level pool
    pub orders_dropped: u64,
}

/// A stop order harvested by the trigger scan, waiting to re-enter `place`.
#[derive(Clone, Copy, Debug)]
struct TriggeredStop {
    side: Side,
    /// Market if the source was Stop, Limit if it was StopLimit
    kind: OrderType,
    shares: u32,
    /// The source order's limit price (market sentinel for plain stops)
    limit_price: i64,
}

/// The matching engine core. Single-threaded: one instance is owned and
/// mutated by exactly one thread.
pub struct MatchingEngine {
    pub orders: OrderArena,
    pub levels: LevelArena,
    pub book: OrderBook,
    trades: TradeProducer,
    seq: u64,
    next_synthetic_id: u64,
    stats: EngineStats,
    /// Reused across calls so a triggered cascade allocates at most once
    triggered_scratch: Vec<TriggeredStop>,
}

impl MatchingEngine {
    /// Create an engine backed by `order_capacity` pooled order records.
    /// The level pool is sized at a fifth of that (books concentrate many
    /// orders on few prices), floored for tiny configurations.
    pub fn new(order_capacity: u32, trades: TradeProducer) -> Self {
        let level_capacity = (order_capacity / 5).max(16);
        Self {
            orders: OrderArena::new(order_capacity),
            levels: LevelArena::new(level_capacity),
            book: OrderBook::with_capacity(order_capacity as usize),
            trades,
            seq: 0,
            next_synthetic_id: SYNTHETIC_ID_BASE,
            stats: EngineStats::default(),
            triggered_scratch: Vec::new(),
        }
    }

    // ========================================================================
    // Public Commands
    // ========================================================================

    /// Process a new order of any kind.
    ///
    /// Stop and StopLimit orders arm without matching. Market and Limit
    /// orders run the crossing loop, may trigger stops, and a Limit residual
    /// rests in the book. Pool exhaustion drops the command silently (see
    /// [`EngineStats::orders_dropped`]).
    pub fn place(&mut self, order: PlaceOrder) {
        debug_assert!(order.shares > 0, "zero-share place is a caller bug");
        self.place_inner(order, true);
    }

    /// Reprice and/or resize a live limit order.
    ///
    /// Same price: shares are reset in place and time priority is kept.
    /// New price: the order is unlinked and re-queued at the tail of the
    /// target level, forfeiting time priority. Stop orders are not
    /// modifiable; returns `false` for them and for unknown ids.
    pub fn modify(&mut self, id: u64, new_shares: u32, new_price: i64) -> bool {
        let Some(order_ix) = self.book.lookup_live(id) else {
            return false;
        };

        let (old_price, side) = {
            let order = self.orders.get(order_ix);
            (order.price, order.side)
        };

        if new_price == old_price {
            self.orders.get_mut(order_ix).shares = new_shares;
            return true;
        }

        let level_ix = self.orders.get(order_ix).level;
        if price_level::unlink(&mut self.levels, &mut self.orders, order_ix) {
            let price = self.levels.get(level_ix).price;
            match side {
                Side::Buy => {
                    let root = self.book.bid_root;
                    self.book.bid_root = tree::remove(&mut self.levels, &mut self.orders, root, price);
                }
                Side::Sell => {
                    let root = self.book.ask_root;
                    self.book.ask_root = tree::remove(&mut self.levels, &mut self.orders, root, price);
                }
            }
        }

        {
            let order = self.orders.get_mut(order_ix);
            order.price = new_price;
            order.shares = new_shares;
        }

        if !self.book.insert_resting(&mut self.levels, &mut self.orders, order_ix) {
            // Level pool exhausted: the order has nowhere to rest
            self.book.forget_live(id);
            self.orders.free(order_ix);
            self.stats.orders_dropped += 1;
            return false;
        }
        true
    }

    /// Cancel a live or armed order. Returns `false` for unknown ids.
    pub fn cancel(&mut self, id: u64) -> bool {
        if let Some(order_ix) = self.book.lookup_live(id) {
            self.book.remove_live(&mut self.levels, &mut self.orders, id, order_ix);
            self.orders.free(order_ix);
            return true;
        }
        if let Some(order_ix) = self.book.lookup_armed(id) {
            self.book.remove_armed(&mut self.levels, &mut self.orders, id, order_ix);
            self.orders.free(order_ix);
            return true;
        }
        false
    }

    // ========================================================================
    // Observability
    // ========================================================================

    /// Resting limit orders
    #[inline]
    pub fn live_order_count(&self) -> usize {
        self.book.live_count()
    }

    /// Armed stop orders
    #[inline]
    pub fn armed_stop_count(&self) -> usize {
        self.book.armed_count()
    }

    #[inline]
    pub fn best_bid(&self) -> Option<i64> {
        self.book.best_bid(&self.levels)
    }

    #[inline]
    pub fn best_ask(&self) -> Option<i64> {
        self.book.best_ask(&self.levels)
    }

    #[inline]
    pub fn stats(&self) -> EngineStats {
        self.stats
    }

    /// Sequence number the next trade will carry; equals trades executed.
    #[inline]
    pub fn trades_executed(&self) -> u64 {
        self.seq
    }

    /// Pre-fault both pools (run before the hot path).
    pub fn warm_up(&mut self) {
        self.orders.warm_up();
        self.levels.warm_up();
    }

    /// Hash of the observable book state, for determinism testing.
    pub fn state_hash(&self) -> u64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut hasher = DefaultHasher::new();
        self.best_bid().hash(&mut hasher);
        self.best_ask().hash(&mut hasher);
        self.book.live_count().hash(&mut hasher);
        self.book.armed_count().hash(&mut hasher);
        self.orders.allocated().hash(&mut hasher);
        self.seq.hash(&mut hasher);
        hasher.finish()
    }

    // ========================================================================
    // Internals
    // ========================================================================

    fn place_inner(&mut self, order: PlaceOrder, check_stops: bool) {
        match order.kind {
            OrderType::Stop | OrderType::StopLimit => self.arm_stop(order),
            OrderType::Market | OrderType::Limit => self.match_incoming(order, check_stops),
        }
    }

    /// Park a stop order in its trigger tree. No matching happens here.
    fn arm_stop(&mut self, order: PlaceOrder) {
        let Some(order_ix) = self.orders.alloc(
            order.id,
            order.side,
            order.kind,
            order.shares,
            order.price,
            order.stop_price,
        ) else {
            self.stats.orders_dropped += 1;
            return;
        };

        if !self.book.insert_armed(&mut self.levels, &mut self.orders, order_ix) {
            self.orders.free(order_ix);
            self.stats.orders_dropped += 1;
        }
    }

    /// The crossing loop for Market and Limit orders.
    fn match_incoming(&mut self, order: PlaceOrder, check_stops: bool) {
        let Some(taker_ix) = self.orders.alloc(
            order.id,
            order.side,
            order.kind,
            order.shares,
            order.price,
            order.stop_price,
        ) else {
            self.stats.orders_dropped += 1;
            return;
        };

        let side = order.side;
        let limit_price = order.price;
        let mut last_price: i64 = 0;

        loop {
            if self.orders.get(taker_ix).shares == 0 {
                break;
            }

            let best = self.book.best_opposite(&self.levels, side);
            if best == NULL_INDEX {
                break;
            }
            let best_price = self.levels.get(best).price;
            let crosses = match side {
                Side::Buy => limit_price >= best_price,
                Side::Sell => limit_price <= best_price,
            };
            if !crosses {
                break;
            }

            // The level is guaranteed non-empty, so at least one trade prints
            self.sweep_level(taker_ix, best, best_price);
            last_price = best_price;

            if self.levels.get(best).head == NULL_INDEX {
                match side {
                    Side::Buy => {
                        let root = self.book.ask_root;
                        self.book.ask_root =
                            tree::remove(&mut self.levels, &mut self.orders, root, best_price);
                    }
                    Side::Sell => {
                        let root = self.book.bid_root;
                        self.book.bid_root =
                            tree::remove(&mut self.levels, &mut self.orders, root, best_price);
                    }
                }
            }
        }

        // Stop scan runs once per place, after all matching, never per trade
        let mut triggered = std::mem::take(&mut self.triggered_scratch);
        if check_stops && last_price != 0 {
            self.collect_triggered(last_price, &mut triggered);
        }

        if self.orders.get(taker_ix).shares > 0 && order.kind == OrderType::Limit {
            if !self.book.insert_resting(&mut self.levels, &mut self.orders, taker_ix) {
                self.orders.free(taker_ix);
                self.stats.orders_dropped += 1;
            }
        } else {
            // Fully filled, or an unfilled market remainder (implicit IOC)
            self.orders.free(taker_ix);
        }

        // Triggered stops re-enter in harvest order. check_stops = false
        // bounds the cascade: their executions cannot trigger further stops
        // within this logical transaction.
        for stop in triggered.drain(..) {
            let id = self.next_synthetic_id;
            self.next_synthetic_id += 1;
            self.place_inner(
                PlaceOrder {
                    id,
                    side: stop.side,
                    kind: stop.kind,
                    shares: stop.shares,
                    price: stop.limit_price,
                    stop_price: 0,
                },
                false,
            );
        }
        self.triggered_scratch = triggered;
    }

    /// Fill against the FIFO of one level, oldest maker first.
    fn sweep_level(&mut self, taker_ix: ArenaIndex, level_ix: ArenaIndex, level_price: i64) {
        let taker_id = self.orders.get(taker_ix).id;
        let mut maker_ix = self.levels.get(level_ix).head;

        while maker_ix != NULL_INDEX && self.orders.get(taker_ix).shares > 0 {
            let (maker_id, maker_shares) = {
                let maker = self.orders.get(maker_ix);
                (maker.id, maker.shares)
            };
            let taker_shares = self.orders.get(taker_ix).shares;
            let traded = taker_shares.min(maker_shares);

            self.publish(taker_id, maker_id, traded, level_price);

            self.orders.get_mut(taker_ix).shares -= traded;
            self.orders.get_mut(maker_ix).shares -= traded;

            if maker_shares == traded {
                // Maker fully filled: pop the head and recycle
                let next = self.orders.get(maker_ix).next;
                self.levels.get_mut(level_ix).head = next;
                if next != NULL_INDEX {
                    self.orders.get_mut(next).prev = NULL_INDEX;
                } else {
                    self.levels.get_mut(level_ix).tail = NULL_INDEX;
                }
                self.book.forget_live(maker_id);
                self.orders.free(maker_ix);
                maker_ix = next;
            } else {
                // Maker survives with remainder: price-time priority forbids
                // skipping ahead, so the taker is done at this level
                break;
            }
        }
    }

    /// Scan both stop trees against the last executed price and harvest
    /// every level past its trigger threshold.
    fn collect_triggered(&mut self, last_price: i64, out: &mut Vec<TriggeredStop>) {
        // Sell stops fire when the market prints at or below their trigger;
        // the max level is the next to go
        loop {
            let top = tree::max(&self.levels, self.book.stop_sell_root);
            if top == NULL_INDEX {
                break;
            }
            let price = self.levels.get(top).price;
            if price < last_price {
                break;
            }
            self.harvest_stop_level(top, out);
            let root = self.book.stop_sell_root;
            self.book.stop_sell_root = tree::remove(&mut self.levels, &mut self.orders, root, price);
        }

        // Buy stops fire when the market prints at or above their trigger
        loop {
            let bottom = tree::min(&self.levels, self.book.stop_buy_root);
            if bottom == NULL_INDEX {
                break;
            }
            let price = self.levels.get(bottom).price;
            if price > last_price {
                break;
            }
            self.harvest_stop_level(bottom, out);
            let root = self.book.stop_buy_root;
            self.book.stop_buy_root = tree::remove(&mut self.levels, &mut self.orders, root, price);
        }
    }

    /// Convert every order at a triggered stop level and recycle the records.
    /// The caller removes the emptied level from its tree.
    fn harvest_stop_level(&mut self, level_ix: ArenaIndex, out: &mut Vec<TriggeredStop>) {
        let mut cur = self.levels.get(level_ix).head;
        while cur != NULL_INDEX {
            let (id, side, kind, shares, limit_price, next) = {
                let order = self.orders.get(cur);
                (order.id, order.side, order.kind, order.shares, order.price, order.next)
            };

            out.push(TriggeredStop {
                side,
                kind: if kind == OrderType::Stop {
                    OrderType::Market
                } else {
                    OrderType::Limit
                },
                shares,
                limit_price,
            });

            self.book.forget_armed(id);
            self.orders.free(cur);
            cur = next;
        }
    }

    /// Stamp and publish one trade. The sequence number advances per
    /// executed trade even when the ring is full, so drops leave a
    /// detectable gap downstream.
    fn publish(&mut self, taker_id: u64, maker_id: u64, qty: u32, price: i64) {
        let report = TradeReport {
            taker_id,
            maker_id,
            qty,
            price,
            seq: self.seq,
        };
        self.seq += 1;

        if self.trades.push(report) {
            self.stats.trades_published += 1;
        } else {
            self.stats.trades_dropped += 1;
        }
    }
}

impl std::fmt::Debug for MatchingEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatchingEngine")
            .field("best_bid", &self.best_bid())
            .field("best_ask", &self.best_ask())
            .field("live", &self.book.live_count())
            .field("armed", &self.book.armed_count())
            .field("seq", &self.seq)
            .finish()
    }
}
