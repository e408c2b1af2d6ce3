//! Change aggregation and multi-consumer notification.
//!
//! ```text
//!  Backing ──Change──▶ ┌────────────┐ ◀──Request── Watcher::next()/stop()
//!                      │ Aggregator │
//!  Backing::fetch ◀─── │ (one task) │ ───Batch───▶ waiting Watcher
//!                      └─────┬──────┘
//!                            │ sole owner
//!                      ┌─────▼──────┐
//!                      │EntityStore │
//!                      └────────────┘
//! ```
//!
//! [`StoreManager`] spawns the [`Aggregator`] task, which owns the
//! [`EntityStore`](crate::EntityStore) outright. Watchers never touch the
//! store; every `next()` and `stop()` is a message to the aggregator and a
//! wait on a private reply channel. After each event the aggregator
//! answers the oldest waiting request of every watcher whose revision is
//! behind the store.
//!
//! Reference counting keeps removed entities alive exactly as long as some
//! watcher that saw them has not yet been told of their removal.

mod aggregator;
mod event;
mod manager;
mod watcher;

pub(crate) use aggregator::*;
pub(crate) use event::*;
pub use manager::*;
pub use watcher::*;
