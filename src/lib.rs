//! # Cascade-LOB
//!
//! A deterministic single-instrument limit order book matching engine with
//! stop-order cascades.
//!
//! ## Design Principles
//!
//! - **Single-Writer**: one thread owns the book exclusively (no locks)
//! - **Allocation-Free Hot Path**: orders and price levels live in fixed
//!   arenas recycled through embedded free lists
//! - **Price-Time Priority**: AVL-indexed price levels, intrusive FIFO
//!   queues within each level
//! - **Stop Books**: Stop and StopLimit orders arm in two auxiliary trees
//!   and convert to live orders when the last trade crosses their trigger,
//!   with the cascade bounded at one level
//!
//! ## Architecture
//!
//! ```text
//! [Host Thread] --> place/modify/cancel --> [Engine Thread]
//!                                                |
//!                                        [SPSC Trade Ring] --> [Consumer Thread]
//! ```

pub mod arena;
pub mod command;
pub mod engine;
pub mod flow;
pub mod matching;
pub mod order_book;
pub mod price_level;
pub mod queue;
pub mod tree;

// Re-exports for convenience
pub use arena::{ArenaIndex, LevelArena, LevelNode, OrderArena, OrderNode, NULL_INDEX};
pub use command::{
    CancelOrder, Command, ModifyOrder, OrderType, PlaceOrder, Side, TradeReport,
    MARKET_BUY_PRICE, MARKET_SELL_PRICE,
};
pub use engine::Engine;
pub use flow::OrderFlow;
pub use matching::{EngineStats, MatchingEngine};
pub use order_book::OrderBook;
pub use queue::{TradeConsumer, TradeProducer, TradeQueue};
