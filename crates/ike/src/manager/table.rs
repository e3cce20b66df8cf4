//! Registry table of IKE SA entries
//!
//! Entries are bucketed by `(initiator SPI, role)`. Both halves of that key
//! are fixed when an SA is created, so a bucket stays valid when the
//! responder SPI of an entry is completed later; only the responder SPI
//! bookkeeping needs updating then. Within a bucket entries keep insertion
//! order, which makes the first-inserted entry win when a half-open entry
//! and a lookup both lack the responder SPI.
//!
//! The table does no locking of its own. Every call happens under the
//! manager's registry lock.

use crate::sa::SaId;
use parking_lot::Condvar;
use std::collections::HashMap;
use std::sync::Arc;

/// Stable reference to an entry, valid until the entry is removed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct EntryKey(u64);

/// Outcome of trying to take something out of an entry
pub(crate) enum Slot<T> {
    /// Entry was free; here is what was taken
    Free(T),
    /// Entry is checked out; wait on this condition before retrying
    Held(Arc<Condvar>),
}

/// One registered IKE SA
pub(crate) struct Entry<H> {
    id: SaId,
    /// `None` while the SA is lent to a holder
    handle: Option<H>,
    waiters: Arc<Condvar>,
}

impl<H> Entry<H> {
    pub(crate) fn id(&self) -> &SaId {
        &self.id
    }

    pub(crate) fn is_held(&self) -> bool {
        self.handle.is_none()
    }

    pub(crate) fn waiters(&self) -> &Arc<Condvar> {
        &self.waiters
    }

    pub(crate) fn into_handle(self) -> Option<H> {
        self.handle
    }
}

pub(crate) struct SaTable<H> {
    entries: HashMap<EntryKey, Entry<H>>,
    buckets: HashMap<(u64, bool), Vec<EntryKey>>,
    /// Reference counts of responder SPIs in use
    responder_spis: HashMap<u64, usize>,
    next_key: u64,
}

impl<H> SaTable<H> {
    pub(crate) fn new() -> Self {
        SaTable {
            entries: HashMap::new(),
            buckets: HashMap::new(),
            responder_spis: HashMap::new(),
            next_key: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub(crate) fn held_count(&self) -> usize {
        self.entries.values().filter(|e| e.is_held()).count()
    }

    pub(crate) fn get(&self, key: EntryKey) -> Option<&Entry<H>> {
        self.entries.get(&key)
    }

    /// Find the entry answering a lookup for `query`, see [`SaId::matches`]
    pub(crate) fn find(&self, query: &SaId) -> Option<EntryKey> {
        let bucket = self
            .buckets
            .get(&(query.initiator_spi(), query.is_initiator()))?;
        bucket.iter().copied().find(|key| {
            self.entries
                .get(key)
                .map_or(false, |entry| entry.id.matches(query))
        })
    }

    /// Whether `spi` is used as either SPI by any live entry
    pub(crate) fn spi_in_use(&self, spi: u64) -> bool {
        self.buckets.contains_key(&(spi, true))
            || self.buckets.contains_key(&(spi, false))
            || self.responder_spis.contains_key(&spi)
    }

    /// Register a new, not checked out entry
    pub(crate) fn insert(&mut self, id: SaId, handle: H) -> EntryKey {
        let key = EntryKey(self.next_key);
        self.next_key += 1;

        self.buckets
            .entry((id.initiator_spi(), id.is_initiator()))
            .or_default()
            .push(key);
        if let Some(spi) = id.responder_spi() {
            *self.responder_spis.entry(spi).or_insert(0) += 1;
        }
        self.entries.insert(
            key,
            Entry {
                id,
                handle: Some(handle),
                waiters: Arc::new(Condvar::new()),
            },
        );
        key
    }

    /// Take the handle out of a free entry, marking it held
    pub(crate) fn lend(&mut self, key: EntryKey) -> Option<Slot<H>> {
        let entry = self.entries.get_mut(&key)?;
        Some(match entry.handle.take() {
            Some(handle) => Slot::Free(handle),
            None => Slot::Held(Arc::clone(&entry.waiters)),
        })
    }

    /// Put a lent handle back, marking the entry free
    ///
    /// Returns the handle if the entry is gone or not held.
    pub(crate) fn restore(&mut self, key: EntryKey, handle: H) -> Result<(), H> {
        match self.entries.get_mut(&key) {
            Some(entry) if entry.handle.is_none() => {
                entry.handle = Some(handle);
                Ok(())
            }
            _ => Err(handle),
        }
    }

    /// Record the responder SPI of an entry learned after creation
    ///
    /// Only a half-open entry can be completed, and only with an identifier
    /// carrying the same initiator SPI and role.
    pub(crate) fn complete(&mut self, key: EntryKey, id: &SaId) -> bool {
        let Some(entry) = self.entries.get_mut(&key) else {
            return false;
        };
        let Some(spi) = id.responder_spi() else {
            return false;
        };
        if entry.id.is_complete() || !entry.id.matches(id) {
            return false;
        }
        if entry.id.set_responder_spi(spi).is_err() {
            return false;
        }
        *self.responder_spis.entry(spi).or_insert(0) += 1;
        true
    }

    /// Remove an entry that is not checked out
    pub(crate) fn remove_free(&mut self, key: EntryKey) -> Option<Slot<Entry<H>>> {
        let entry = self.entries.get(&key)?;
        if entry.is_held() {
            return Some(Slot::Held(Arc::clone(&entry.waiters)));
        }
        self.remove(key).map(Slot::Free)
    }

    /// Remove an entry regardless of its checkout state
    pub(crate) fn remove(&mut self, key: EntryKey) -> Option<Entry<H>> {
        let entry = self.entries.remove(&key)?;

        let bucket_key = (entry.id.initiator_spi(), entry.id.is_initiator());
        if let Some(bucket) = self.buckets.get_mut(&bucket_key) {
            bucket.retain(|k| *k != key);
            if bucket.is_empty() {
                self.buckets.remove(&bucket_key);
            }
        }
        if let Some(spi) = entry.id.responder_spi() {
            if let Some(count) = self.responder_spis.get_mut(&spi) {
                *count -= 1;
                if *count == 0 {
                    self.responder_spis.remove(&spi);
                }
            }
        }
        Some(entry)
    }

    /// Condition of some checked out entry, if any is left
    pub(crate) fn any_held(&self) -> Option<Arc<Condvar>> {
        self.entries
            .values()
            .find(|e| e.is_held())
            .map(|e| Arc::clone(&e.waiters))
    }

    /// Wake every thread waiting on any entry
    pub(crate) fn notify_all(&self) {
        for entry in self.entries.values() {
            entry.waiters.notify_all();
        }
    }

    /// Remove all entries in insertion order
    pub(crate) fn drain(&mut self) -> Vec<Entry<H>> {
        self.buckets.clear();
        self.responder_spis.clear();
        let mut entries: Vec<_> = self.entries.drain().collect();
        entries.sort_by_key(|(key, _)| *key);
        entries.into_iter().map(|(_, entry)| entry).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lent(table: &mut SaTable<&'static str>, key: EntryKey) -> &'static str {
        match table.lend(key) {
            Some(Slot::Free(handle)) => handle,
            _ => panic!("Expected free entry"),
        }
    }

    #[test]
    fn test_insert_and_find() {
        let mut table = SaTable::new();
        let id = SaId::new(1, Some(2), false);
        let key = table.insert(id, "sa");

        assert_eq!(table.len(), 1);
        assert_eq!(table.find(&id), Some(key));
        assert_eq!(table.find(&SaId::new(1, Some(3), false)), None);
        assert_eq!(table.find(&SaId::half_open(1, false)), None);
        assert_eq!(table.find(&SaId::new(1, Some(2), true)), None);
    }

    #[test]
    fn test_first_inserted_wins() {
        let mut table = SaTable::new();
        let first = table.insert(SaId::half_open(5, true), "first");
        let _second = table.insert(SaId::half_open(5, true), "second");

        assert_eq!(table.find(&SaId::half_open(5, true)), Some(first));
        assert_eq!(table.find(&SaId::new(5, Some(9), true)), Some(first));
    }

    #[test]
    fn test_lend_and_restore() {
        let mut table = SaTable::new();
        let key = table.insert(SaId::new(1, Some(2), false), "sa");

        let handle = lent(&mut table, key);
        assert_eq!(handle, "sa");
        assert!(table.get(key).unwrap().is_held());
        assert_eq!(table.held_count(), 1);
        assert!(matches!(table.lend(key), Some(Slot::Held(_))));

        table.restore(key, handle).unwrap();
        assert!(!table.get(key).unwrap().is_held());
        assert_eq!(table.restore(key, "again"), Err("again"));
    }

    #[test]
    fn test_complete_revalidates_lookup() {
        let mut table = SaTable::new();
        let key = table.insert(SaId::half_open(1, true), "sa");
        assert!(!table.spi_in_use(2));

        assert!(table.complete(key, &SaId::new(1, Some(2), true)));
        assert!(table.spi_in_use(2));
        assert_eq!(table.find(&SaId::new(1, Some(2), true)), Some(key));
        assert_eq!(table.find(&SaId::half_open(1, true)), None);
        assert_eq!(table.find(&SaId::new(1, Some(3), true)), None);

        // responder SPI is immutable once known
        assert!(!table.complete(key, &SaId::new(1, Some(3), true)));
        assert_eq!(table.get(key).unwrap().id().responder_spi(), Some(2));
    }

    #[test]
    fn test_remove_free_refuses_held() {
        let mut table = SaTable::new();
        let key = table.insert(SaId::new(1, Some(2), false), "sa");
        let handle = lent(&mut table, key);

        assert!(matches!(table.remove_free(key), Some(Slot::Held(_))));
        table.restore(key, handle).unwrap();

        match table.remove_free(key) {
            Some(Slot::Free(entry)) => assert_eq!(entry.into_handle(), Some("sa")),
            _ => panic!("Expected removal"),
        }
        assert!(table.is_empty());
        assert!(!table.spi_in_use(1));
        assert!(!table.spi_in_use(2));
        assert!(table.remove_free(key).is_none());
    }

    #[test]
    fn test_spi_in_use_tracks_shared_responder_spi() {
        let mut table = SaTable::new();
        let a = table.insert(SaId::new(1, Some(9), true), "a");
        let _b = table.insert(SaId::new(2, Some(9), true), "b");

        table.remove(a);
        assert!(table.spi_in_use(9));
        assert!(table.spi_in_use(2));
        assert!(!table.spi_in_use(1));
    }

    #[test]
    fn test_drain_in_insertion_order() {
        let mut table = SaTable::new();
        table.insert(SaId::half_open(3, true), "a");
        table.insert(SaId::half_open(1, true), "b");
        table.insert(SaId::half_open(2, true), "c");

        let handles: Vec<_> = table
            .drain()
            .into_iter()
            .filter_map(Entry::into_handle)
            .collect();
        assert_eq!(handles, vec!["a", "b", "c"]);
        assert!(table.is_empty());
        assert!(table.any_held().is_none());
    }
}
