//! Single-producer, single-consumer latest-value exchange.
//!
//! The producer copies complete snapshots into a ring of slots; the consumer
//! claims the most recently completed slot and reads it in place. Neither side
//! ever blocks and neither side allocates after construction.
//!
//! # Design
//! Three cursors index into the slot ring, each with exactly one writer:
//!
//! | Cursor   | Writer   | Meaning                                      |
//! |----------|----------|----------------------------------------------|
//! | `write`  | producer | slot the next publish goes into              |
//! | `latest` | producer | slot holding the newest complete snapshot    |
//! | `read`   | consumer | slot the consumer currently holds            |
//!
//! **Publish:**
//! 1. Load `write`; with two slots, step past it if the consumer has since
//!    claimed it
//! 2. Write the value into the target slot
//! 3. Store `latest = target`, then fence
//! 4. Step forward from there, skipping the slot held by the consumer, and
//!    store the result as the new `write`
//!
//! **Acquire:**
//! 1. Load `latest`
//! 2. Store it into `read`, claiming the slot, then fence
//! 3. Load `latest` again; if it moved, the claim may have raced with the
//!    producer re-using that slot, so go back to step 1
//!
//! No cursor is ever read-modify-written and no compare-and-swap is used.
//!
//! # Capacity 2
//! With two slots the producer's next write target is the slot it just
//! published, because the other one is held by the consumer. An acquire
//! between two publishes can then claim that target, so publish re-checks it
//! against `read` before writing (step 1). That keeps the held slot untouched
//! whenever publish and acquire do not overlap. When they do overlap, the
//! consumer can claim the slot right after the re-check, so concurrent use
//! wants three or more slots.
//!
//! # Thread Safety
//! - [`Publisher`] and [`Subscriber`] are `Send` but not `Clone`: there is
//!   exactly one of each per exchange.
//! - The reference handed out by [`Subscriber::acquire_latest`] borrows the
//!   subscriber mutably, so it cannot outlive the next acquire.

use crate::cursor::{
    Cursor, ExchangeConfig, ExchangeError, MIN_CAPACITY, handoff_fence, next_write_index,
};
use crate::slots::SlotStore;
use crate::sync::Arc;
use std::fmt;
use std::mem::size_of;

/// The shared state of one exchange: slot ring plus three cursors.
///
/// Build one with [`Exchange::new`] and [`split`](Exchange::split) it into
/// its two halves.
pub struct Exchange<T> {
    write: Cursor,
    latest: Cursor,
    read: Cursor,
    slots: SlotStore<T>,
}

// SAFETY: values are moved in on the producer thread and read by reference on
// the consumer thread; slot exclusivity is maintained by the cursor protocol.
unsafe impl<T: Send> Send for Exchange<T> {}
unsafe impl<T: Send + Sync> Sync for Exchange<T> {}

/// Point-in-time copy of the three cursors, for diagnostics and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursors {
    pub write: usize,
    pub latest: usize,
    pub read: usize,
}

/// The producing half of an [`Exchange`].
pub struct Publisher<T> {
    shared: Arc<Exchange<T>>,
}

/// The consuming half of an [`Exchange`].
pub struct Subscriber<T> {
    shared: Arc<Exchange<T>>,
}

impl<T> Exchange<T> {
    /// Creates an exchange with `capacity` slots, each seeded with a clone of
    /// `seed`.
    ///
    /// Until the first publish, acquiring yields the seed.
    ///
    /// # Errors
    /// Returns [`ExchangeError::CapacityTooSmall`] when `capacity < 2`.
    pub fn new(capacity: usize, seed: T) -> Result<Self, ExchangeError>
    where
        T: Clone,
    {
        Ok(Self::with_config(ExchangeConfig::new(capacity)?, seed))
    }

    /// Creates an exchange from an already validated configuration.
    pub fn with_config(config: ExchangeConfig, seed: T) -> Self
    where
        T: Clone,
    {
        let capacity = config.capacity();
        if capacity == MIN_CAPACITY {
            tracing::warn!(
                capacity,
                "two-slot exchange: a publish overlapping an acquire may write the slot being claimed"
            );
        }
        tracing::debug!(
            capacity,
            payload_bytes = size_of::<T>(),
            "latest-value exchange created"
        );

        Self {
            write: Cursor::new(1),
            latest: Cursor::new(0),
            read: Cursor::new(0),
            slots: SlotStore::filled(capacity, &seed),
        }
    }

    /// Number of slots in the ring.
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    /// Splits the exchange into its producer and consumer halves.
    pub fn split(self) -> (Publisher<T>, Subscriber<T>) {
        let shared = Arc::new(self);
        (
            Publisher {
                shared: Arc::clone(&shared),
            },
            Subscriber { shared },
        )
    }

    fn cursors(&self) -> Cursors {
        Cursors {
            write: self.write.load(),
            latest: self.latest.load(),
            read: self.read.load(),
        }
    }

    /// Runs the producer side of the protocol around `fill`, which must leave
    /// a complete value in the slot it is given.
    ///
    /// # Safety
    /// Must only be called from the single producer.
    #[inline]
    unsafe fn commit(&self, fill: impl FnOnce(&SlotStore<T>, usize)) {
        let capacity = self.slots.capacity();
        let mut idx = self.write.load();
        // With two slots the target chosen by the last publish is also the
        // latest slot, so an acquire since then may hold it. With more slots
        // the target is never latest and a matching `read` is only a claim
        // that is about to fail validation, so the target stands.
        if capacity == MIN_CAPACITY && idx == self.read.load() {
            idx = next_write_index(idx, capacity, || self.read.load());
        }

        fill(&self.slots, idx);
        self.latest.store(idx);
        handoff_fence();

        let next = next_write_index(idx, capacity, || self.read.load());
        self.write.store(next);
    }

    /// Claims the newest complete slot for the consumer and returns its index.
    ///
    /// # Safety
    /// Must only be called from the single consumer.
    #[inline]
    unsafe fn claim_latest(&self) -> usize {
        loop {
            let latest = self.latest.load();
            self.read.store(latest);
            handoff_fence();
            // Once `latest` is seen unchanged after the claim, any later choice
            // of write target by the producer observes our claim.
            if self.latest.load() == latest {
                return latest;
            }
        }
    }
}

impl<T> fmt::Debug for Exchange<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Exchange")
            .field("capacity", &self.capacity())
            .field("cursors", &self.cursors())
            .finish()
    }
}

impl<T> Publisher<T> {
    /// Publishes `value` as the newest snapshot.
    ///
    /// The slot previously holding the oldest unread snapshot is overwritten;
    /// the slot the consumer holds is never touched.
    #[inline]
    pub fn publish(&mut self, value: T) {
        // SAFETY: `Publisher` is unique per exchange and `&mut self` rules out
        // concurrent calls.
        unsafe {
            self.shared.commit(|slots, idx| {
                // SAFETY: the write cursor never names the consumer's slot.
                slots.write(idx, value)
            })
        }
    }

    /// Publishes a copy of `value`, reusing the target slot's allocations
    /// through [`Clone::clone_from`].
    #[inline]
    pub fn publish_from(&mut self, value: &T)
    where
        T: Clone,
    {
        // SAFETY: as in `publish`.
        unsafe {
            self.shared.commit(|slots, idx| {
                // SAFETY: the write cursor never names the consumer's slot.
                slots.clone_into(idx, value)
            })
        }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn cursors(&self) -> Cursors {
        self.shared.cursors()
    }
}

impl<T> Subscriber<T> {
    /// Claims the newest published snapshot and returns a reference to it.
    ///
    /// The reference stays valid, and its slot untouched by the producer,
    /// until the next call to `acquire_latest`. Calling again without an
    /// intervening publish returns the same slot.
    #[inline]
    pub fn acquire_latest(&mut self) -> &T {
        // SAFETY: `Subscriber` is unique per exchange and `&mut self` rules out
        // concurrent calls.
        let idx = unsafe { self.shared.claim_latest() };
        // SAFETY: the producer never writes the claimed slot while we hold it.
        unsafe { self.shared.slots.get(idx) }
    }

    /// The snapshot claimed by the last acquire, without claiming a new one.
    ///
    /// Before the first acquire this is the seed value.
    #[inline]
    pub fn current(&self) -> &T {
        let idx = self.shared.read.load();
        // SAFETY: `read` is only written by this subscriber, and its slot is
        // never the producer's write target.
        unsafe { self.shared.slots.get(idx) }
    }

    pub fn capacity(&self) -> usize {
        self.shared.capacity()
    }

    pub fn cursors(&self) -> Cursors {
        self.shared.cursors()
    }
}

impl<T> fmt::Debug for Publisher<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Publisher").field(&*self.shared).finish()
    }
}

impl<T> fmt::Debug for Subscriber<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Subscriber").field(&*self.shared).finish()
    }
}
