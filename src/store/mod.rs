//! In-memory cache of entity summaries shared by all watchers.
//!
//! The cache is a pure projection of the backing store: it is rebuilt from a
//! full snapshot on start and never persisted.

mod entity_store;

pub use entity_store::*;
