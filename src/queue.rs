//! SPSC trade queue - bounded lock-free ring between matcher and consumer.
//!
//! Single producer (the engine thread) and single consumer (one reader
//! thread). Both endpoints are wait-free: the producer publishes a slot with
//! a release store of `write_pos` after writing the payload; the consumer
//! acquires `write_pos` before reading. Positions are 64-bit monotone
//! counters; the slot index is `pos & (capacity - 1)`.

use crate::command::TradeReport;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Pads an atomic counter to its own cache line so the producer's and
/// consumer's counters never false-share.
#[repr(align(64))]
struct CacheAligned(AtomicU64);

struct Ring {
    slots: Box<[UnsafeCell<TradeReport>]>,
    mask: u64,
    write_pos: CacheAligned,
    read_pos: CacheAligned,
}

// Slots are only touched under the write_pos/read_pos protocol: the producer
// writes slot `wp` strictly before releasing `wp + 1`, and the consumer only
// reads slots below an acquired `write_pos`. Handles are not Clone, so there
// is exactly one producer and one consumer.
unsafe impl Send for Ring {}
unsafe impl Sync for Ring {}

/// Factory for the trade ring.
pub struct TradeQueue;

impl TradeQueue {
    /// Create a ring of `capacity` slots (must be a power of two) and split
    /// it into its producer and consumer halves.
    ///
    /// # Panics
    /// Panics if `capacity` is zero or not a power of two.
    pub fn with_capacity(capacity: usize) -> (TradeProducer, TradeConsumer) {
        assert!(
            capacity > 0 && capacity.is_power_of_two(),
            "trade queue capacity must be a power of two"
        );

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(TradeReport::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        let ring = Arc::new(Ring {
            slots,
            mask: (capacity - 1) as u64,
            write_pos: CacheAligned(AtomicU64::new(0)),
            read_pos: CacheAligned(AtomicU64::new(0)),
        });

        (
            TradeProducer { ring: Arc::clone(&ring) },
            TradeConsumer { ring },
        )
    }
}

/// Writer half, owned by the engine thread.
pub struct TradeProducer {
    ring: Arc<Ring>,
}

impl TradeProducer {
    /// Publish one report. Returns `false` if the ring is full; the engine
    /// drops the report and keeps matching.
    #[inline]
    pub fn push(&mut self, report: TradeReport) -> bool {
        let ring = &*self.ring;
        let wp = ring.write_pos.0.load(Ordering::Relaxed);
        let rp = ring.read_pos.0.load(Ordering::Acquire);

        if wp.wrapping_sub(rp) > ring.mask {
            return false;
        }

        unsafe {
            *ring.slots[(wp & ring.mask) as usize].get() = report;
        }
        ring.write_pos.0.store(wp + 1, Ordering::Release);
        true
    }

    /// Reports currently buffered (approximate from the producer side).
    #[inline]
    pub fn len(&self) -> usize {
        let ring = &*self.ring;
        let wp = ring.write_pos.0.load(Ordering::Relaxed);
        let rp = ring.read_pos.0.load(Ordering::Acquire);
        wp.wrapping_sub(rp) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Reader half, handed to the consumer thread at construction.
pub struct TradeConsumer {
    ring: Arc<Ring>,
}

impl TradeConsumer {
    /// Take the oldest unread report, or `None` if the ring is empty.
    /// Never blocks the engine.
    #[inline]
    pub fn try_pop(&mut self) -> Option<TradeReport> {
        let ring = &*self.ring;
        let rp = ring.read_pos.0.load(Ordering::Relaxed);
        let wp = ring.write_pos.0.load(Ordering::Acquire);

        if rp >= wp {
            return None;
        }

        let report = unsafe { *ring.slots[(rp & ring.mask) as usize].get() };
        ring.read_pos.0.store(rp + 1, Ordering::Release);
        Some(report)
    }

    /// Reports currently buffered (approximate from the consumer side).
    #[inline]
    pub fn len(&self) -> usize {
        let ring = &*self.ring;
        let wp = ring.write_pos.0.load(Ordering::Acquire);
        let rp = ring.read_pos.0.load(Ordering::Relaxed);
        wp.wrapping_sub(rp) as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report(seq: u64) -> TradeReport {
        TradeReport {
            taker_id: seq + 100,
            maker_id: seq + 200,
            qty: 1,
            price: 100,
            seq,
        }
    }

    #[test]
    fn test_push_pop_fifo() {
        let (mut tx, mut rx) = TradeQueue::with_capacity(8);

        assert!(rx.try_pop().is_none());

        for i in 0..5 {
            assert!(tx.push(report(i)));
        }
        assert_eq!(rx.len(), 5);

        for i in 0..5 {
            let r = rx.try_pop().unwrap();
            assert_eq!(r.seq, i);
            assert_eq!(r.taker_id, i + 100);
        }
        assert!(rx.try_pop().is_none());
    }

    #[test]
    fn test_full_ring_rejects() {
        let (mut tx, mut rx) = TradeQueue::with_capacity(4);

        for i in 0..4 {
            assert!(tx.push(report(i)));
        }
        assert!(!tx.push(report(4)), "full ring must reject");

        // Draining one slot frees one slot
        assert_eq!(rx.try_pop().unwrap().seq, 0);
        assert!(tx.push(report(4)));
        assert!(!tx.push(report(5)));
    }

    #[test]
    fn test_wraparound() {
        let (mut tx, mut rx) = TradeQueue::with_capacity(4);

        // Cycle well past the capacity to cross the index mask repeatedly
        for i in 0..64 {
            assert!(tx.push(report(i)));
            assert_eq!(rx.try_pop().unwrap().seq, i);
        }
        assert!(rx.is_empty());
    }

    #[test]
    #[should_panic]
    fn test_non_power_of_two_rejected() {
        let _ = TradeQueue::with_capacity(6);
    }

    #[test]
    fn test_cross_thread_stream() {
        const COUNT: u64 = 100_000;
        let (mut tx, mut rx) = TradeQueue::with_capacity(1024);

        let consumer = std::thread::spawn(move || {
            let mut expected = 0u64;
            let mut sum = 0u64;
            while expected < COUNT {
                if let Some(r) = rx.try_pop() {
                    assert_eq!(r.seq, expected, "reports must arrive in order");
                    expected += 1;
                    sum += r.qty as u64;
                } else {
                    std::hint::spin_loop();
                }
            }
            sum
        });

        let mut pushed = 0u64;
        while pushed < COUNT {
            if tx.push(report(pushed)) {
                pushed += 1;
            } else {
                std::hint::spin_loop();
            }
        }

        assert_eq!(consumer.join().unwrap(), COUNT);
    }
}
