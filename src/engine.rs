//! Engine - construction, command dispatch, CPU pinning and warm-up.
//!
//! Wraps the matching core with the host-facing surface: the constructor
//! builds the pools and the trade ring (handing the consumer half back to
//! the host), `process_command` dispatches ring-fed commands, and `run`
//! busy-polls an rtrb command ring on a pinned core.

use crate::command::{Command, PlaceOrder};
use crate::matching::{EngineStats, MatchingEngine};
use crate::queue::{TradeConsumer, TradeQueue};

/// The engine facade owning the matcher, both pools and the producer half
/// of the trade ring.
pub struct Engine {
    /// The underlying matching engine
    pub matcher: MatchingEngine,
}

impl Engine {
    /// Create an engine with `order_capacity` pooled orders and a trade
    /// ring of `trade_capacity` slots (must be a power of two). Returns the
    /// consumer half of the ring for the reader thread.
    pub fn new(order_capacity: u32, trade_capacity: usize) -> (Self, TradeConsumer) {
        let (producer, consumer) = TradeQueue::with_capacity(trade_capacity);
        (
            Self {
                matcher: MatchingEngine::new(order_capacity, producer),
            },
            consumer,
        )
    }

    /// Run the engine event loop, feeding commands from an rtrb ring.
    ///
    /// # Note
    /// This function runs forever (until the program terminates).
    #[cfg(feature = "runtime")]
    pub fn run(&mut self, input: &mut rtrb::Consumer<Command>, pin_to_core: bool) {
        if pin_to_core {
            self.pin_to_core();
        }
        self.warm_up();

        loop {
            while let Ok(cmd) = input.pop() {
                self.process_command(cmd);
            }
            std::hint::spin_loop();
        }
    }

    /// Process a single command.
    ///
    /// Returns `false` only for a modify/cancel that missed; place always
    /// returns `true` (its failure mode is a counted silent drop).
    #[inline]
    pub fn process_command(&mut self, cmd: Command) -> bool {
        match cmd {
            Command::Place(order) => {
                self.matcher.place(order);
                true
            }
            Command::Modify(modify) => {
                self.matcher
                    .modify(modify.id, modify.new_shares, modify.new_price)
            }
            Command::Cancel(cancel) => self.matcher.cancel(cancel.id),
        }
    }

    /// Place a new order (see [`MatchingEngine::place`]).
    #[inline]
    pub fn place(&mut self, order: PlaceOrder) {
        self.matcher.place(order);
    }

    /// Modify a live limit order (see [`MatchingEngine::modify`]).
    #[inline]
    pub fn modify(&mut self, id: u64, new_shares: u32, new_price: i64) -> bool {
        self.matcher.modify(id, new_shares, new_price)
    }

    /// Cancel a live or armed order (see [`MatchingEngine::cancel`]).
    #[inline]
    pub fn cancel(&mut self, id: u64) -> bool {
        self.matcher.cancel(id)
    }

    /// Pin the current thread to the last available CPU core.
    ///
    /// The last core is typically the quietest under OS interrupts.
    pub fn pin_to_core(&self) {
        if let Some(core_ids) = core_affinity::get_core_ids() {
            if let Some(last_core) = core_ids.last() {
                core_affinity::set_for_current(*last_core);
            }
        }
    }

    /// Pre-fault both pools before the hot path runs.
    pub fn warm_up(&mut self) {
        self.matcher.warm_up();
    }

    #[inline]
    pub fn best_bid(&self) -> Option<i64> {
        self.matcher.best_bid()
    }

    #[inline]
    pub fn best_ask(&self) -> Option<i64> {
        self.matcher.best_ask()
    }

    /// Resting limit orders
    #[inline]
    pub fn live_order_count(&self) -> usize {
        self.matcher.live_order_count()
    }

    /// Armed stop orders
    #[inline]
    pub fn armed_stop_count(&self) -> usize {
        self.matcher.armed_stop_count()
    }

    #[inline]
    pub fn stats(&self) -> EngineStats {
        self.matcher.stats()
    }

    /// Compute state hash for determinism testing.
    #[inline]
    pub fn state_hash(&self) -> u64 {
        self.matcher.state_hash()
    }

    #[inline]
    pub fn trades_executed(&self) -> u64 {
        self.matcher.trades_executed()
    }
}
