//! Synthetic order flow - seeded statistical command generator.
//!
//! Drives benchmarks and soak tests with a reproducible mix of order kinds
//! around a configurable center price: half limits, a heavy market share,
//! and a tail of stop / stop-limit orders with triggers set off-market so
//! they arm quietly and fire on real moves.

use rand::prelude::*;
use rand_chacha::ChaCha8Rng;

use crate::command::{PlaceOrder, Side};

/// Deterministic order generator. Two generators built from the same seed
/// produce identical streams.
pub struct OrderFlow {
    rng: ChaCha8Rng,
    next_id: u64,
    center: i64,
    band: i64,
}

impl OrderFlow {
    /// `center` is the fair price the flow hovers around; `band` is the
    /// half-width of the price range (and scales the stop offsets).
    pub fn new(seed: u64, center: i64, band: i64) -> Self {
        assert!(center > band, "prices must stay positive");
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_id: 1,
            center,
            band,
        }
    }

    /// Id the next generated order will carry.
    #[inline]
    pub fn peek_next_id(&self) -> u64 {
        self.next_id
    }

    fn base_price(&mut self) -> i64 {
        self.center + self.rng.gen_range(-self.band..=self.band)
    }

    /// Generate the next order. With `allow_stops` false the stop share of
    /// the mix degrades to limits (useful for seeding a book).
    pub fn next_order(&mut self, allow_stops: bool) -> PlaceOrder {
        let id = self.next_id;
        self.next_id += 1;

        let shares = self.rng.gen_range(1..=100);
        let side = if self.rng.gen_bool(0.5) { Side::Buy } else { Side::Sell };
        let roll: f64 = self.rng.gen();

        // Mix: 50% limit, 30% market, 10% stop, 10% stop-limit
        if roll < 0.50 || (!allow_stops && roll >= 0.80) {
            let base = self.base_price();
            // Bias buys below and sells above fair value so the book keeps
            // a standing spread instead of crossing on every arrival
            let price = match side {
                Side::Buy => (base - self.band / 10).max(1),
                Side::Sell => base + self.band / 10,
            };
            PlaceOrder::limit(id, side, shares, price)
        } else if roll < 0.80 {
            PlaceOrder::market(id, side, shares)
        } else if roll < 0.90 {
            let base = self.base_price();
            // Buy stops trigger above the market, sell stops below
            let stop_price = match side {
                Side::Buy => base + self.band * 3 / 10,
                Side::Sell => (base - self.band * 3 / 10).max(1),
            };
            PlaceOrder::stop(id, side, shares, stop_price)
        } else {
            let base = self.base_price();
            let (stop_price, price) = match side {
                Side::Buy => (base + self.band / 4, base + self.band * 7 / 20),
                Side::Sell => (
                    (base - self.band / 4).max(1),
                    (base - self.band * 7 / 20).max(1),
                ),
            };
            PlaceOrder::stop_limit(id, side, shares, price, stop_price)
        }
    }
}
