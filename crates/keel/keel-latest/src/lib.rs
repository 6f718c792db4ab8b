//! Lock-free "latest value" exchange between one producer and one consumer.
//!
//! The producer publishes complete snapshots into a small ring of slots; the
//! consumer, which must never block or allocate, acquires the newest snapshot
//! and keeps a stable reference to it until its next acquire. Values that are
//! superseded before the consumer looks at them are silently overwritten.
//!
//! # Layers
//!
//! - [`Exchange`] / [`Publisher`] / [`Subscriber`]: the raw index handoff.
//! - [`bridge`]: the adoption protocol on top of it, in an owning flavour
//!   (with an "update pending" bit) and a borrowing flavour.
//!
//! # Loom Testing
//!
//! ```text
//! cargo test -p keel-latest --features loom --lib --release
//! ```
//!
//! Only the models in `loom_tests` run under loom; unit, integration and doc
//! tests use real atomics and are run without the feature.

pub mod bridge;
mod cursor;
mod exchange;
mod slots;
mod sync;


pub use bridge::{
    Borrowed, BorrowedConsumer, BorrowedProducer, Consumer, Owned, OwnedConsumer, OwnedProducer,
    Ownership, PendingFlag, Producer, Unsignaled, UpdateSignal,
};
pub use cursor::{DEFAULT_CAPACITY, ExchangeConfig, ExchangeError, MIN_CAPACITY};
pub use exchange::{Cursors, Exchange, Publisher, Subscriber};
