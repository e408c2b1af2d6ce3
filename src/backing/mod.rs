//! Boundary to the persistent document store.
//!
//! The aggregator only ever needs three things from the store: a full
//! snapshot on start, a way to fetch the current summary of one entity, and
//! a feed of raw change notifications. [`Backing`] is that boundary;
//! [`MemBacking`] is an in-process implementation of it.

mod mem_backing;

pub use mem_backing::*;


#[cfg(test)]
use mockall::automock;
use tokio::sync::mpsc;

use crate::BackingError;
use crate::EntityId;
use crate::EntityInfo;
use crate::EntityStore;

/// Raw notification that a document changed in the backing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub id: EntityId,
    /// Revision of the document in the backing store; -1 once deleted.
    pub revno: i64,
}

pub type ChangeSender = mpsc::UnboundedSender<Change>;
pub type ChangeReceiver = mpsc::UnboundedReceiver<Change>;

#[cfg_attr(test, automock)]
pub trait Backing: Send + Sync + 'static {
    /// Populates `store` with every entity currently observable.
    fn get_all(
        &self,
        store: &mut EntityStore,
    ) -> Result<(), BackingError>;

    /// Current summary of one entity, or [`BackingError::NotFound`].
    fn fetch(
        &self,
        id: &EntityId,
    ) -> Result<EntityInfo, BackingError>;

    /// Starts delivering change notifications to `tx`.
    fn watch(
        &self,
        tx: ChangeSender,
    );

    /// Stops delivering change notifications to `tx`.
    fn unwatch(
        &self,
        tx: &ChangeSender,
    );

    fn entity_id_for_info(
        &self,
        info: &EntityInfo,
    ) -> EntityId {
        info.entity_id()
    }
}
