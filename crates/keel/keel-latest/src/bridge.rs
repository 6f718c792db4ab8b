//! Adoption protocol between a control thread and a realtime thread.
//!
//! The control thread edits a value and pushes it; the realtime thread adopts
//! the newest pushed version when it is ready to, and keeps a stable reference
//! to it until its next adoption.
//!
//! Two flavours share one implementation, selected by an [`Ownership`]
//! strategy:
//!
//! - [`owned`]: the producer half owns the edited value, and the consumer can
//!   poll [`Consumer::has_update`] before paying for an adoption.
//! - [`borrowed`]: the producer half borrows a value that lives elsewhere;
//!   there is no pending bit and the consumer simply adopts every cycle.
//!
//! # Example
//!
//! ```
//! use keel_latest::{ExchangeConfig, bridge};
//!
//! let (mut producer, mut consumer) = bridge::owned(ExchangeConfig::default(), vec![0u8; 4]);
//!
//! assert!(consumer.has_update());
//! assert_eq!(consumer.adopt(), &vec![0u8; 4]);
//! assert!(!consumer.has_update());
//!
//! producer[0] = 9;
//! producer.push();
//!
//! if consumer.has_update() {
//!     // release anything tied to the previous adoption here
//!     assert_eq!(consumer.adopt()[0], 9);
//! }
//! ```

use crate::cursor::ExchangeConfig;
use crate::exchange::{Exchange, Publisher, Subscriber};
use crate::sync::{Arc, AtomicBool, Ordering};
use std::fmt;
use std::mem::size_of;
use std::ops::{Deref, DerefMut};

/// How the producer half holds the value it edits.
pub trait Ownership {
    type Target;
    /// Signal the producer raises on every push.
    type Signal: UpdateSignal;

    /// Short name used in logs.
    const KIND: &'static str;

    fn value(&self) -> &Self::Target;
    fn value_mut(&mut self) -> &mut Self::Target;
}

/// One-bit channel from the producer's push to the consumer's adoption.
pub trait UpdateSignal: Clone {
    fn raise(&self);
    fn clear(&self);
}

/// The producer half owns the edited value.
#[derive(Debug)]
pub struct Owned<T>(T);

/// The producer half borrows a value owned elsewhere.
#[derive(Debug)]
pub struct Borrowed<'a, T>(&'a mut T);

impl<T> Ownership for Owned<T> {
    type Target = T;
    type Signal = PendingFlag;
    const KIND: &'static str = "owned";

    #[inline(always)]
    fn value(&self) -> &T {
        &self.0
    }

    #[inline(always)]
    fn value_mut(&mut self) -> &mut T {
        &mut self.0
    }
}

impl<T> Ownership for Borrowed<'_, T> {
    type Target = T;
    type Signal = Unsignaled;
    const KIND: &'static str = "borrowed";

    #[inline(always)]
    fn value(&self) -> &T {
        &*self.0
    }

    #[inline(always)]
    fn value_mut(&mut self) -> &mut T {
        &mut *self.0
    }
}

/// "Update pending" bit: set by the producer on push, cleared by the consumer
/// on adoption.
#[derive(Clone)]
pub struct PendingFlag(Arc<AtomicBool>);

impl PendingFlag {
    fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    #[inline(always)]
    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

impl UpdateSignal for PendingFlag {
    #[inline(always)]
    fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    #[inline(always)]
    fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl fmt::Debug for PendingFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("PendingFlag").field(&self.is_raised()).finish()
    }
}

/// No update signal; the consumer adopts unconditionally.
#[derive(Debug, Clone, Copy, Default)]
pub struct Unsignaled;

impl UpdateSignal for Unsignaled {
    #[inline(always)]
    fn raise(&self) {}

    #[inline(always)]
    fn clear(&self) {}
}

/// Control-thread half: edits the value through `Deref`/`DerefMut` and
/// pushes snapshots of it.
pub struct Producer<S: Ownership> {
    source: S,
    publisher: Publisher<S::Target>,
    signal: S::Signal,
}

/// Realtime half: adopts pushed snapshots.
///
/// Adopting never blocks and never allocates.
pub struct Consumer<T, G> {
    subscriber: Subscriber<T>,
    signal: G,
    adopted: bool,
}

pub type OwnedProducer<T> = Producer<Owned<T>>;
pub type OwnedConsumer<T> = Consumer<T, PendingFlag>;
pub type BorrowedProducer<'a, T> = Producer<Borrowed<'a, T>>;
pub type BorrowedConsumer<T> = Consumer<T, Unsignaled>;

/// Builds a bridge that owns `value`.
///
/// The initial value is pushed once, so the consumer starts with
/// [`Consumer::has_update`] raised and its first adoption yields `value`.
pub fn owned<T: Clone>(config: ExchangeConfig, value: T) -> (OwnedProducer<T>, OwnedConsumer<T>) {
    link(config, Owned(value), PendingFlag::new())
}

/// Builds a bridge over a value the caller keeps owning.
///
/// The initial value is pushed once, so the consumer's first adoption yields
/// a copy of `*value`.
pub fn borrowed<T: Clone>(
    config: ExchangeConfig,
    value: &mut T,
) -> (BorrowedProducer<'_, T>, BorrowedConsumer<T>) {
    link(config, Borrowed(value), Unsignaled)
}

fn link<S>(
    config: ExchangeConfig,
    source: S,
    signal: S::Signal,
) -> (Producer<S>, Consumer<S::Target, S::Signal>)
where
    S: Ownership,
    S::Target: Clone,
{
    let exchange = Exchange::with_config(config, source.value().clone());
    let (publisher, subscriber) = exchange.split();

    tracing::debug!(
        kind = S::KIND,
        capacity = config.capacity(),
        payload_bytes = size_of::<S::Target>(),
        "bridge linked"
    );

    let mut producer = Producer {
        source,
        publisher,
        signal: signal.clone(),
    };
    producer.push();

    let consumer = Consumer {
        subscriber,
        signal,
        adopted: false,
    };
    (producer, consumer)
}

impl<S: Ownership> Producer<S> {
    /// Publishes a snapshot of the current value and signals the consumer.
    #[inline]
    pub fn push(&mut self)
    where
        S::Target: Clone,
    {
        self.publisher.publish_from(self.source.value());
        self.signal.raise();
    }

    /// Applies `edit` to the value, then pushes it.
    pub fn edit<R>(&mut self, edit: impl FnOnce(&mut S::Target) -> R) -> R
    where
        S::Target: Clone,
    {
        let out = edit(self.source.value_mut());
        self.push();
        out
    }

    pub fn capacity(&self) -> usize {
        self.publisher.capacity()
    }
}

impl<T> Producer<Owned<T>> {
    /// Gives back the owned value.
    pub fn into_inner(self) -> T {
        self.source.0
    }
}

impl<S: Ownership> Deref for Producer<S> {
    type Target = S::Target;

    #[inline(always)]
    fn deref(&self) -> &S::Target {
        self.source.value()
    }
}

impl<S: Ownership> DerefMut for Producer<S> {
    #[inline(always)]
    fn deref_mut(&mut self) -> &mut S::Target {
        self.source.value_mut()
    }
}

impl<S> fmt::Debug for Producer<S>
where
    S: Ownership,
    S::Target: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Producer")
            .field("kind", &S::KIND)
            .field("value", self.source.value())
            .field("cursors", &self.publisher.cursors())
            .finish()
    }
}

impl<T> Consumer<T, PendingFlag> {
    /// Whether a push happened since the last adoption.
    ///
    /// When this is false the previously adopted reference is still current.
    #[inline(always)]
    pub fn has_update(&self) -> bool {
        self.signal.is_raised()
    }
}

impl<T, G: UpdateSignal> Consumer<T, G> {
    /// Adopts the newest pushed snapshot and returns it.
    ///
    /// The returned reference is valid until the next `adopt`. Release
    /// anything that depends on the previous adoption before calling this.
    #[inline]
    pub fn adopt(&mut self) -> &T {
        // Clear before acquiring: a push landing in between re-raises the flag
        // and is picked up by the next cycle instead of being lost.
        self.signal.clear();
        self.adopted = true;
        self.subscriber.acquire_latest()
    }

    /// The currently adopted snapshot, or `None` before the first adoption.
    #[inline]
    pub fn adopted(&self) -> Option<&T> {
        self.adopted.then(|| self.subscriber.current())
    }

    pub fn capacity(&self) -> usize {
        self.subscriber.capacity()
    }
}

impl<T: fmt::Debug, G: UpdateSignal + fmt::Debug> fmt::Debug for Consumer<T, G> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Consumer")
            .field("signal", &self.signal)
            .field("adopted", &self.adopted())
            .field("cursors", &self.subscriber.cursors())
            .finish()
    }
}

#[cfg(all(test, not(feature = "loom")))]
mod tests {
    use super::*;

    fn config(capacity: usize) -> ExchangeConfig {
        ExchangeConfig::new(capacity).unwrap()
    }

    #[test]
    fn owned_starts_with_pending_initial_value() {
        let (_producer, mut consumer) = owned(config(3), 11u32);
        assert!(consumer.has_update());
        assert_eq!(consumer.adopted(), None);
        assert_eq!(*consumer.adopt(), 11);
        assert!(!consumer.has_update());
        assert_eq!(consumer.adopted(), Some(&11));
    }

    #[test]
    fn push_raises_flag_until_adopted() {
        let (mut producer, mut consumer) = owned(config(3), 0u32);
        consumer.adopt();
        assert!(!consumer.has_update());

        *producer = 5;
        assert!(!consumer.has_update(), "editing alone must not signal");
        producer.push();
        assert!(consumer.has_update());
        assert_eq!(*consumer.adopt(), 5);
        assert!(!consumer.has_update());
    }

    #[test]
    fn without_update_adopted_value_is_unchanged() {
        let (mut producer, mut consumer) = owned(config(3), String::from("a"));
        consumer.adopt();
        let before = consumer.adopted().map(|s| s as *const String);

        producer.push_str("bc");
        assert_eq!(&*producer, "abc");
        assert!(!consumer.has_update());
        assert_eq!(consumer.adopted().map(|s| s as *const String), before);
        assert_eq!(consumer.adopted().map(String::as_str), Some("a"));
    }

    #[test]
    fn edit_pushes_and_returns_closure_result() {
        let (mut producer, mut consumer) = owned(config(4), vec![1u8]);
        consumer.adopt();
        let len = producer.edit(|v| {
            v.push(2);
            v.len()
        });
        assert_eq!(len, 2);
        assert!(consumer.has_update());
        assert_eq!(consumer.adopt(), &vec![1u8, 2]);
    }

    #[test]
    fn several_pushes_adopt_newest() {
        let (mut producer, mut consumer) = owned(config(3), 0u64);
        for v in 1..=3 {
            *producer = v;
            producer.push();
        }
        assert_eq!(*consumer.adopt(), 3);
    }

    #[test]
    fn borrowed_adopts_every_cycle() {
        let mut value = [0i32; 4];
        {
            let (mut producer, mut consumer) = borrowed(config(3), &mut value);
            assert_eq!(consumer.adopted(), None);
            assert_eq!(consumer.adopt(), &[0; 4]);

            producer[2] = 7;
            // Not pushed yet: re-adopting still yields the old snapshot.
            assert_eq!(consumer.adopt(), &[0; 4]);

            producer.push();
            assert_eq!(consumer.adopt(), &[0, 0, 7, 0]);
            assert_eq!(consumer.adopt(), &[0, 0, 7, 0]);
        }
        assert_eq!(value, [0, 0, 7, 0]);
    }

    #[test]
    fn into_inner_returns_edited_value() {
        let (mut producer, _consumer) = owned(config(2), 1u8);
        *producer += 1;
        assert_eq!(producer.into_inner(), 2);
    }

    #[test]
    fn consumer_debug_reports_signal() {
        let (_producer, consumer) = owned(config(3), 0u8);
        let rendered = format!("{consumer:?}");
        assert!(rendered.contains("PendingFlag(true)"), "{rendered}");
    }

    #[test]
    fn borrowed_consumer_debug_shows_adopted_value() {
        let mut value = 5u8;
        let (_producer, mut consumer) = borrowed(config(3), &mut value);
        assert!(format!("{consumer:?}").contains("adopted: None"));
        consumer.adopt();
        let rendered = format!("{consumer:?}");
        assert!(rendered.contains("Unsignaled"), "{rendered}");
        assert!(rendered.contains("adopted: Some(5)"), "{rendered}");
    }
}
