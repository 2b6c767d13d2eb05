//! Per-connection stream table: a slab keyed by a dense integer, looked up by
//! `StreamId` through a side hash map.
//!
//! No intrusive `Queue`/`Next` linked list is needed here (pending-request
//! FIFO ordering is handled by a plain `VecDeque` in `crate::connection`
//! instead), so only the slab + id-index pairing is kept. The id index uses
//! an `fnv` hasher rather than `std`'s SipHash-backed default, since stream
//! ids are exactly the small dense integer keys `FnvHashMap` is built for.

use fnv::FnvHashMap;
use slab::Slab;

use crate::frame::StreamId;

#[derive(Debug)]
pub struct Store<T> {
    slab: Slab<T>,
    ids: FnvHashMap<StreamId, usize>,
}

impl<T> Store<T> {
    pub fn new() -> Self {
        Store {
            slab: Slab::new(),
            ids: FnvHashMap::default(),
        }
    }

    /// Inserts a new stream. Panics if `id` is already present: a stream id
    /// is created exactly once for its lifetime on a connection.
    pub fn insert(&mut self, id: StreamId, value: T) {
        let key = self.slab.insert(value);
        let prior = self.ids.insert(id, key);
        assert!(prior.is_none(), "stream id {id} inserted twice");
    }

    pub fn get(&self, id: &StreamId) -> Option<&T> {
        self.ids.get(id).map(|&key| &self.slab[key])
    }

    pub fn get_mut(&mut self, id: &StreamId) -> Option<&mut T> {
        let key = *self.ids.get(id)?;
        Some(&mut self.slab[key])
    }

    pub fn contains(&self, id: &StreamId) -> bool {
        self.ids.contains_key(id)
    }

    pub fn remove(&mut self, id: &StreamId) -> Option<T> {
        let key = self.ids.remove(id)?;
        Some(self.slab.remove(key))
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn ids(&self) -> impl Iterator<Item = &StreamId> {
        self.ids.keys()
    }

    pub fn values_mut(&mut self) -> impl Iterator<Item = &mut T> {
        self.slab.iter_mut().map(|(_, v)| v)
    }
}

impl<T> Default for Store<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn insert_find_remove_round_trip() {
        let mut store: Store<&'static str> = Store::new();
        let id = StreamId::new(1);
        store.insert(id, "hello");
        assert_eq!(store.get(&id), Some(&"hello"));
        assert_eq!(store.len(), 1);
        assert_eq!(store.remove(&id), Some("hello"));
        assert!(store.get(&id).is_none());
    }

    #[test]
    #[should_panic(expected = "inserted twice")]
    fn duplicate_insert_panics() {
        let mut store: Store<u32> = Store::new();
        let id = StreamId::new(3);
        store.insert(id, 1);
        store.insert(id, 2);
    }
}
