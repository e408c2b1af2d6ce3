use std::collections::BTreeMap;
use std::collections::HashMap;
use std::ops::Bound;

use tracing::trace;

use crate::Delta;
use crate::EntityId;
use crate::EntityInfo;

/// One cached entity together with its revision and observer bookkeeping.
#[derive(Debug, Clone)]
pub struct Entry {
    info: EntityInfo,
    revno: u64,
    creation_revno: u64,
    ref_count: usize,
    removed: bool,
    /// `[removed, revived)` revision spans in which the entity did not exist
    dead_spans: Vec<(u64, u64)>,
}

impl Entry {
    pub fn info(&self) -> &EntityInfo {
        &self.info
    }

    /// Revision of the last mutation of this entry
    pub fn revno(&self) -> u64 {
        self.revno
    }

    /// Revision at which the entity first appeared
    pub fn creation_revno(&self) -> u64 {
        self.creation_revno
    }

    /// Number of watchers holding the last non-removed state of the entity
    pub fn ref_count(&self) -> usize {
        self.ref_count
    }

    pub fn removed(&self) -> bool {
        self.removed
    }

    /// Whether the entity was part of the live state at revision `revno`,
    /// i.e. whether a watcher positioned there holds it in its view.
    pub fn existed_at(
        &self,
        revno: u64,
    ) -> bool {
        if revno < self.creation_revno {
            return false;
        }
        if self.removed && revno >= self.revno {
            return false;
        }
        !self.dead_spans.iter().any(|&(from, to)| from <= revno && revno < to)
    }
}

/// Result of applying a fetched summary with [`EntityStore::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The entity was not known and has been inserted
    Added,
    /// The stored summary was replaced
    Updated,
    /// The summary was identical to the stored one; nothing changed
    Unchanged,
    /// A removed entry still held for its observers was brought back.
    /// `removed_at` is the revision its removal had been recorded at; a
    /// watcher positioned between that and the revival does not hold it.
    Revived { removed_at: u64 },
}

/// Revision-ordered cache of entity summaries.
///
/// Every mutation (insert, update, removal) takes the next value of one
/// global revision counter, so "everything after revision R" is a suffix
/// of the ordering index. The store does no locking: it is owned by a
/// single aggregator task.
#[derive(Debug, Default)]
pub struct EntityStore {
    latest_revno: u64,
    entities: HashMap<EntityId, Entry>,
    /// revno -> id, one slot per entry
    order: BTreeMap<u64, EntityId>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest_revno(&self) -> u64 {
        self.latest_revno
    }

    /// Number of entries, including removed entries still held for observers
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn entry(
        &self,
        id: &EntityId,
    ) -> Option<&Entry> {
        self.entities.get(id)
    }

    /// Current summary of a live entity; `None` if unknown or removed.
    pub fn get(
        &self,
        id: &EntityId,
    ) -> Option<&EntityInfo> {
        self.entities.get(id).filter(|e| !e.removed).map(|e| &e.info)
    }

    /// Summaries of all live entities, in revision order.
    pub fn all(&self) -> Vec<EntityInfo> {
        self.order
            .values()
            .map(|id| &self.entities[id])
            .filter(|e| !e.removed)
            .map(|e| e.info.clone())
            .collect()
    }

    /// Inserts a new entry at the next revision.
    ///
    /// # Panics
    /// If an entry for `id` already exists.
    pub fn add(
        &mut self,
        id: EntityId,
        info: EntityInfo,
    ) {
        if self.entities.contains_key(&id) {
            panic!("adding new entry with duplicate id {id}");
        }
        self.latest_revno += 1;
        let revno = self.latest_revno;
        trace!(%id, revno, "entity added");
        self.order.insert(revno, id.clone());
        self.entities.insert(
            id,
            Entry {
                info,
                revno,
                creation_revno: revno,
                ref_count: 0,
                removed: false,
                dead_spans: Vec::new(),
            },
        );
    }

    /// Inserts or replaces the summary of the entity `info` identifies.
    pub fn update(
        &mut self,
        info: EntityInfo,
    ) -> UpdateOutcome {
        let id = info.entity_id();
        let Some(entry) = self.entities.get_mut(&id) else {
            self.add(id, info);
            return UpdateOutcome::Added;
        };
        if !entry.removed && entry.info == info {
            return UpdateOutcome::Unchanged;
        }

        let old_revno = entry.revno;
        self.latest_revno += 1;
        let revno = self.latest_revno;
        let outcome = if entry.removed {
            entry.dead_spans.push((old_revno, revno));
            UpdateOutcome::Revived { removed_at: old_revno }
        } else {
            UpdateOutcome::Updated
        };
        entry.info = info;
        entry.revno = revno;
        entry.removed = false;

        self.order.remove(&old_revno);
        self.order.insert(revno, id.clone());
        trace!(%id, revno, ?outcome, "entity updated");
        outcome
    }

    /// Records that the entity no longer exists.
    ///
    /// An entry nobody has observed is dropped at once; otherwise it is kept,
    /// flagged as removed, until every observer has been told or has left.
    pub fn mark_removed(
        &mut self,
        id: &EntityId,
    ) {
        let ref_count = match self.entities.get(id) {
            Some(entry) if !entry.removed => entry.ref_count,
            _ => return,
        };
        if ref_count == 0 {
            self.delete(id);
            return;
        }

        self.latest_revno += 1;
        let revno = self.latest_revno;
        let Some(entry) = self.entities.get_mut(id) else {
            return;
        };
        let old_revno = entry.revno;
        entry.revno = revno;
        entry.removed = true;

        self.order.remove(&old_revno);
        self.order.insert(revno, id.clone());
        trace!(%id, revno, ref_count = entry.ref_count, "entity marked removed");
    }

    /// Takes one observer reference on the entry.
    ///
    /// # Panics
    /// If the entry does not exist.
    pub fn inc_ref(
        &mut self,
        id: &EntityId,
    ) {
        let entry = self
            .entities
            .get_mut(id)
            .unwrap_or_else(|| panic!("reference taken on unknown entry {id}"));
        entry.ref_count += 1;
    }

    /// Releases one observer reference, deleting the entry when it was the
    /// last reference to a removed entity.
    ///
    /// # Panics
    /// If the entry does not exist or holds no references.
    pub fn dec_ref(
        &mut self,
        id: &EntityId,
    ) {
        let entry = self
            .entities
            .get_mut(id)
            .unwrap_or_else(|| panic!("reference released on unknown entry {id}"));
        if entry.ref_count == 0 {
            panic!("negative reference count on {id}");
        }
        entry.ref_count -= 1;
        if entry.ref_count == 0 && entry.removed {
            self.delete(id);
        }
    }

    /// Unconditionally drops the entry from the index and the ordering.
    ///
    /// # Panics
    /// If the entry does not exist.
    pub fn delete(
        &mut self,
        id: &EntityId,
    ) {
        let entry = self
            .entities
            .remove(id)
            .unwrap_or_else(|| panic!("delete of non-existent entry {id}"));
        self.order.remove(&entry.revno);
        trace!(%id, revno = entry.revno, "entity deleted");
    }

    /// Deltas for every entry changed after `revno`, oldest first.
    ///
    /// Removed entries that did not exist at `revno` are left out: whoever
    /// sits at `revno` never saw them, so there is nothing to retract.
    pub fn changes_since(
        &self,
        revno: u64,
    ) -> Vec<Delta> {
        self.after(revno)
            .filter(|(_, entry)| !entry.removed || entry.existed_at(revno))
            .map(|(_, entry)| Delta {
                removed: entry.removed,
                entity: entry.info.clone(),
            })
            .collect()
    }

    /// Adjusts references after a watcher positioned at `since` has been
    /// handed `changes_since(since)`.
    ///
    /// Entities entering its view gain a reference; removals of entities
    /// that were in its view release the reference it held.
    pub fn seen(
        &mut self,
        since: u64,
    ) {
        let mut acquired = Vec::new();
        let mut released = Vec::new();
        for (id, entry) in self.after(since) {
            match (entry.existed_at(since), entry.removed) {
                (false, false) => acquired.push(id.clone()),
                (true, true) => released.push(id.clone()),
                _ => {}
            }
        }
        for id in &acquired {
            self.inc_ref(id);
        }
        for id in &released {
            self.dec_ref(id);
        }
    }

    /// Releases every reference held by a watcher positioned at `revno`.
    ///
    /// The watcher holds a reference on each entry that existed at its
    /// position.
    pub fn leave(
        &mut self,
        revno: u64,
    ) {
        let held: Vec<EntityId> = self
            .entities
            .iter()
            .filter(|(_, e)| e.existed_at(revno))
            .map(|(id, _)| id.clone())
            .collect();
        for id in &held {
            self.dec_ref(id);
        }
    }

    fn after(
        &self,
        revno: u64,
    ) -> impl Iterator<Item = (&EntityId, &Entry)> {
        self.order
            .range((Bound::Excluded(revno), Bound::Unbounded))
            .map(|(_, id)| (id, &self.entities[id]))
    }
}
