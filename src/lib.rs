//! Change aggregation over a document store, fanned out to many watchers.
//!
//! A single aggregator task keeps an in-memory, revision-ordered
//! [`EntityStore`] in sync with a [`Backing`] store and answers every
//! [`Watcher`] with the deltas it has not seen yet. Each watcher gets a
//! full snapshot on its first `next()` and only changes afterwards.

mod backing;
mod config;
mod entity;
mod errors;
pub mod metrics;
mod multiwatcher;
mod store;

pub use backing::*;
pub use config::*;
pub use entity::*;
pub use errors::*;
pub use multiwatcher::StoreManager;
pub use multiwatcher::StoreStats;
pub use multiwatcher::Watcher;
pub use store::*;

//-----------------------------------------------------------
// Test utils

#[cfg(test)]
pub mod test_utils;
