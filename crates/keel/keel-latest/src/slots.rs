//! Fixed-capacity slot storage backing an exchange.
//!
//! Every slot holds one complete copy of the payload. The store never grows
//! and is filled at construction, so a slot is never observed uninitialised.
//!
//! # Memory Layout
//!
//! ```text
//! ┌──────────────────────┬──────────────────────┬─────┬──────────────────────┐
//! │ Slot[0] (align 64)   │ Slot[1] (align 64)   │ ... │ Slot[N-1] (align 64) │
//! │  value: T            │  value: T            │     │  value: T            │
//! └──────────────────────┴──────────────────────┴─────┴──────────────────────┘
//! ```
//!
//! The store itself performs no synchronization. Which slot each thread may
//! touch is decided entirely by the exchange's cursors.

use crate::sync::UnsafeCell;

#[repr(C, align(64))]
struct Slot<T> {
    value: UnsafeCell<T>,
}

/// `N` payload slots addressed by index.
pub(crate) struct SlotStore<T> {
    slots: Box<[Slot<T>]>,
}

impl<T> SlotStore<T> {
    /// Allocates `capacity` slots, each holding a clone of `seed`.
    pub(crate) fn filled(capacity: usize, seed: &T) -> Self
    where
        T: Clone,
    {
        let slots = (0..capacity)
            .map(|_| Slot {
                value: UnsafeCell::new(seed.clone()),
            })
            .collect();
        Self { slots }
    }

    #[inline(always)]
    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Moves `value` into slot `idx`, dropping what was there.
    ///
    /// # Safety
    /// No other reference to slot `idx` may be live for the duration of the
    /// call.
    ///
    /// # Panics
    /// Panics if `idx >= capacity`.
    #[inline(always)]
    pub(crate) unsafe fn write(&self, idx: usize, value: T) {
        // SAFETY: caller guarantees exclusive access to this slot.
        self.slots[idx].value.with_mut(|p| unsafe { *p = value });
    }

    /// Overwrites slot `idx` with a copy of `src`, reusing the slot's
    /// existing allocations where `T::clone_from` allows it.
    ///
    /// # Safety
    /// Same as [`SlotStore::write`].
    #[inline(always)]
    pub(crate) unsafe fn clone_into(&self, idx: usize, src: &T)
    where
        T: Clone,
    {
        // SAFETY: caller guarantees exclusive access to this slot.
        self.slots[idx].value.with_mut(|p| unsafe { (*p).clone_from(src) });
    }

    /// Shared access to slot `idx`.
    ///
    /// # Safety
    /// Slot `idx` must not be written for as long as the returned reference
    /// is alive.
    #[inline(always)]
    pub(crate) unsafe fn get(&self, idx: usize) -> &T {
        // SAFETY: caller guarantees no concurrent writer for this slot.
        self.slots[idx].value.with(|p| unsafe { &*p })
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;
    use std::mem::align_of;

    #[test]
    fn filled_clones_seed_into_every_slot() {
        let store = SlotStore::filled(4, &String::from("seed"));
        assert_eq!(store.capacity(), 4);
        for idx in 0..4 {
            assert_eq!(unsafe { store.get(idx) }, "seed");
        }
    }

    #[test]
    fn write_and_clone_into_touch_only_their_slot() {
        let store = SlotStore::filled(3, &vec![0u8; 4]);
        unsafe {
            store.write(1, vec![1, 1]);
            store.clone_into(2, &vec![2, 2, 2]);
        }
        assert_eq!(unsafe { store.get(0) }, &vec![0u8; 4]);
        assert_eq!(unsafe { store.get(1) }, &vec![1u8, 1]);
        assert_eq!(unsafe { store.get(2) }, &vec![2u8, 2, 2]);
    }

    #[test]
    fn write_drops_previous_value() {
        use std::rc::Rc;
        let tracked = Rc::new(());
        let store = SlotStore::filled(2, &Some(Rc::clone(&tracked)));
        assert_eq!(Rc::strong_count(&tracked), 3);
        unsafe { store.write(0, None) };
        assert_eq!(Rc::strong_count(&tracked), 2);
        drop(store);
        assert_eq!(Rc::strong_count(&tracked), 1);
    }

    #[test]
    #[should_panic]
    fn out_of_range_index_panics() {
        let store = SlotStore::filled(2, &0u64);
        let _ = unsafe { store.get(2) };
    }

    #[test]
    fn slots_are_cache_line_aligned() {
        assert_eq!(align_of::<Slot<u8>>(), 64);
    }
}
