use std::collections::BTreeMap;

use parking_lot::Mutex;
use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;

use super::Backing;
use super::Change;
use super::ChangeSender;
use crate::BackingError;
use crate::EntityId;
use crate::EntityInfo;
use crate::EntityStore;

#[derive(Debug, Default)]
struct Documents {
    docs: BTreeMap<EntityId, EntityInfo>,
    /// Revision stamped on the last written document
    txn_revno: i64,
}

/// In-memory [`Backing`] keyed by entity id.
///
/// Every `put`/`remove` notifies all registered change channels while the
/// document lock is held, so notifications arrive in mutation order.
#[derive(Debug, Default)]
pub struct MemBacking {
    documents: RwLock<Documents>,
    watchers: Mutex<Vec<ChangeSender>>,
    fetch_error: Mutex<Option<String>>,
}

impl MemBacking {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds the backing without emitting notifications.
    pub fn with_entities(entities: impl IntoIterator<Item = EntityInfo>) -> Self {
        let backing = Self::new();
        {
            let mut documents = backing.documents.write();
            for info in entities {
                documents.txn_revno += 1;
                documents.docs.insert(info.entity_id(), info);
            }
        }
        backing
    }

    /// Inserts or replaces a document and notifies watchers.
    pub fn put(
        &self,
        info: impl Into<EntityInfo>,
    ) {
        let info = info.into();
        let id = info.entity_id();
        let mut documents = self.documents.write();
        documents.txn_revno += 1;
        let revno = documents.txn_revno;
        documents.docs.insert(id.clone(), info);
        self.notify_locked(Change { id, revno });
    }

    /// Deletes a document and notifies watchers. Unknown ids are ignored.
    pub fn remove(
        &self,
        id: &EntityId,
    ) {
        let mut documents = self.documents.write();
        if documents.docs.remove(id).is_none() {
            return;
        }
        self.notify_locked(Change {
            id: id.clone(),
            revno: -1,
        });
    }

    /// Emits a notification for `id` without touching its document.
    pub fn touch(
        &self,
        id: &EntityId,
    ) {
        let documents = self.documents.read();
        let revno = if documents.docs.contains_key(id) {
            documents.txn_revno
        } else {
            -1
        };
        self.notify_locked(Change { id: id.clone(), revno });
    }

    /// Makes every following `fetch` fail with [`BackingError::Unavailable`].
    pub fn fail_fetch_with(
        &self,
        reason: impl Into<String>,
    ) {
        *self.fetch_error.lock() = Some(reason.into());
    }

    pub fn len(&self) -> usize {
        self.documents.read().docs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn watcher_count(&self) -> usize {
        self.watchers.lock().len()
    }

    fn notify_locked(
        &self,
        change: Change,
    ) {
        trace!(id = %change.id, revno = change.revno, "backing change");
        self.watchers.lock().retain(|tx| tx.send(change.clone()).is_ok());
    }
}

impl Backing for MemBacking {
    fn get_all(
        &self,
        store: &mut EntityStore,
    ) -> Result<(), BackingError> {
        let documents = self.documents.read();
        for info in documents.docs.values() {
            store.update(info.clone());
        }
        debug!(entities = documents.docs.len(), "loaded backing snapshot");
        Ok(())
    }

    fn fetch(
        &self,
        id: &EntityId,
    ) -> Result<EntityInfo, BackingError> {
        if let Some(reason) = self.fetch_error.lock().clone() {
            return Err(BackingError::Unavailable(reason));
        }
        self.documents
            .read()
            .docs
            .get(id)
            .cloned()
            .ok_or_else(|| BackingError::NotFound(id.clone()))
    }

    fn watch(
        &self,
        tx: ChangeSender,
    ) {
        self.watchers.lock().push(tx);
    }

    fn unwatch(
        &self,
        tx: &ChangeSender,
    ) {
        self.watchers.lock().retain(|w| !w.same_channel(tx));
    }
}
