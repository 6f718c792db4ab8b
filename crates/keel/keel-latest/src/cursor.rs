//! Capacity configuration and circular cursor arithmetic.
//!
//! This module provides the small pieces the exchange is built from:
//! - Configuration with capacity validation
//! - Circular index stepping over `[0, capacity)`
//! - The producer's skip search for the next writable slot
//! - Cache-line padded cursor cells with a single memory ordering

use crate::sync::{AtomicUsize, Ordering, fence};

/// Smallest slot count the exchange accepts.
///
/// With a single slot the producer's skip search has nowhere to land once the
/// consumer holds that slot, so it would spin forever.
pub const MIN_CAPACITY: usize = 2;

/// Slot count used when nothing else is configured.
pub const DEFAULT_CAPACITY: usize = 5;

/// Ordering for every cursor load and store.
///
/// The skip search relies on the producer seeing the consumer's claim in a
/// single total order with its own `latest` store, so nothing weaker than
/// `SeqCst` is used here.
const CURSOR_ORDERING: Ordering = Ordering::SeqCst;

/// Orders a cursor store before the following cursor load.
///
/// Issued by the producer between storing `latest` and reading `read`, and by
/// the consumer between storing `read` and re-reading `latest`. Whichever
/// fence comes second sees the other side's store.
#[inline(always)]
pub(crate) fn handoff_fence() {
    fence(Ordering::SeqCst);
}

/// Errors raised while configuring an exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExchangeError {
    #[error("exchange needs at least {MIN_CAPACITY} slots, got {0}")]
    CapacityTooSmall(usize),
}

/// Configuration for an exchange.
///
/// A value of this type always carries a capacity of at least
/// [`MIN_CAPACITY`], so building an exchange from it cannot fail.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct ExchangeConfig {
    capacity: usize,
}

impl ExchangeConfig {
    /// Creates a configuration with `capacity` slots.
    ///
    /// # Errors
    /// Returns [`ExchangeError::CapacityTooSmall`] when `capacity < 2`.
    ///
    /// # Example
    /// ```
    /// use keel_latest::{ExchangeConfig, ExchangeError};
    /// assert!(ExchangeConfig::new(3).is_ok());
    /// assert_eq!(ExchangeConfig::new(1), Err(ExchangeError::CapacityTooSmall(1)));
    /// ```
    pub fn new(capacity: usize) -> Result<Self, ExchangeError> {
        if capacity < MIN_CAPACITY {
            return Err(ExchangeError::CapacityTooSmall(capacity));
        }
        Ok(Self { capacity })
    }

    /// Number of slots in the ring.
    #[inline(always)]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for ExchangeConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// Steps a slot index forward by one, wrapping at `capacity`.
///
/// ```text
/// capacity = 3
/// 0 → 1
/// 1 → 2
/// 2 → 0  (wraps)
/// ```
#[inline(always)]
pub(crate) fn next_index(idx: usize, capacity: usize) -> usize {
    let next = idx + 1;
    if next == capacity { 0 } else { next }
}

/// Finds the slot the producer writes next, after publishing into `published`.
///
/// Walks forward from `published` one slot at a time and stops at the first
/// candidate that differs from the consumer's held slot, re-reading `held` on
/// every step since the consumer may move while we search.
///
/// With three or more slots the just-published slot is skipped as well: the
/// consumer may claim it at any moment, so writing into it next would race
/// with that claim. With exactly two slots there is no third slot to land on
/// and the just-published slot is the only candidate left; the consumer may
/// then claim the chosen slot before the next publish, which is why the
/// producer re-checks its target against `read` before writing.
///
/// # Termination
/// The consumer only ever moves its held slot onto a value of `latest`, and
/// `latest` is fixed for the duration of the search, so the held slot changes
/// at most twice here and the walk ends within a few laps of the ring.
#[inline]
pub(crate) fn next_write_index(
    published: usize,
    capacity: usize,
    held: impl Fn() -> usize,
) -> usize {
    let mut candidate = published;
    loop {
        candidate = next_index(candidate, capacity);
        if candidate == published && capacity > MIN_CAPACITY {
            continue;
        }
        if candidate != held() {
            return candidate;
        }
    }
}

/// One cursor, alone on its cache line.
///
/// Each cursor has exactly one writer thread; padding keeps the producer's
/// and consumer's cursors from sharing a line.
#[repr(C, align(64))]
pub(crate) struct Cursor(AtomicUsize);

impl Cursor {
    pub(crate) fn new(idx: usize) -> Self {
        Self(AtomicUsize::new(idx))
    }

    #[inline(always)]
    pub(crate) fn load(&self) -> usize {
        self.0.load(CURSOR_ORDERING)
    }

    #[inline(always)]
    pub(crate) fn store(&self, idx: usize) {
        self.0.store(idx, CURSOR_ORDERING);
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn rejects_capacity_below_two() {
        assert_eq!(ExchangeConfig::new(0), Err(ExchangeError::CapacityTooSmall(0)));
        assert_eq!(ExchangeConfig::new(1), Err(ExchangeError::CapacityTooSmall(1)));
        assert_eq!(ExchangeConfig::new(2).map(|c| c.capacity()), Ok(2));
    }

    #[test]
    fn default_capacity_is_five() {
        assert_eq!(ExchangeConfig::default().capacity(), 5);
    }

    #[test]
    fn error_message_names_the_capacity() {
        let err = ExchangeConfig::new(1).unwrap_err();
        assert_eq!(err.to_string(), "exchange needs at least 2 slots, got 1");
    }

    #[test]
    fn next_index_wraps() {
        assert_eq!(next_index(0, 3), 1);
        assert_eq!(next_index(1, 3), 2);
        assert_eq!(next_index(2, 3), 0);
        assert_eq!(next_index(1, 2), 0);
    }

    #[test]
    fn skip_search_steps_over_held_slot() {
        assert_eq!(next_write_index(0, 5, || 3), 1);
        assert_eq!(next_write_index(0, 5, || 1), 2);
        assert_eq!(next_write_index(4, 5, || 0), 1);
    }

    #[test]
    fn skip_search_with_two_slots_lands_on_published() {
        // The only slot that is not held is the one just published.
        assert_eq!(next_write_index(0, 2, || 1), 0);
        assert_eq!(next_write_index(1, 2, || 0), 1);
        assert_eq!(next_write_index(1, 2, || 1), 0);
    }

    #[test]
    fn skip_search_never_returns_published_slot_with_three_or_more() {
        for capacity in 3..8 {
            for published in 0..capacity {
                for held in 0..capacity {
                    let next = next_write_index(published, capacity, || held);
                    assert_ne!(next, published);
                    assert_ne!(next, held);
                }
            }
        }
    }

    #[test]
    fn skip_search_rereads_held_slot() {
        // Consumer moves from slot 1 to slot 2 while the producer is searching.
        let reads = Cell::new(0);
        let next = next_write_index(0, 4, || {
            reads.set(reads.get() + 1);
            if reads.get() == 1 { 1 } else { 2 }
        });
        assert_eq!(next, 3);
        assert_eq!(reads.get(), 3);
    }
}
