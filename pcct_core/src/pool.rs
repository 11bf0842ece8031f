//! Fixed-capacity entry pool.
//!
//! All slots are allocated up front; the pool never grows. Never-used slots
//! are handed out in index order, then freed slot indices come back from a
//! FIFO queue, so a slot sits idle as long as possible before it is reused.
//! Its generation is bumped on every free so old `EntryId`s stop resolving,
//! and every pool stamps its handles with its own table tag.

use crate::constants::SLOT_GEN_MASK;
use crate::types::{EntryId, PccEntry};
use crossbeam_queue::SegQueue;
use log::trace;
use std::collections::TryReserveError;
use std::sync::atomic::{AtomicU32, Ordering};

static NEXT_TABLE_TAG: AtomicU32 = AtomicU32::new(1);

struct Slot {
    gen: u32,
    entry: Option<PccEntry>,
}

pub(crate) struct EntryPool {
    tag: u16,
    slots: Vec<Slot>,
    capacity: u32,
    /// Slots at or above this index have never been handed out.
    fresh: u32,
    freelist: SegQueue<u32>,
    len: u32,
}

impl EntryPool {
    /// Reserves every slot up front; fails instead of aborting when the
    /// allocator cannot satisfy the request.
    pub fn new(capacity: u32) -> Result<Self, TryReserveError> {
        let mut slots: Vec<Slot> = Vec::new();
        slots.try_reserve_exact(capacity as usize)?;
        slots.extend((0..capacity).map(|_| Slot { gen: 0, entry: None }));
        Ok(Self {
            tag: NEXT_TABLE_TAG.fetch_add(1, Ordering::Relaxed) as u16,
            slots,
            capacity,
            fresh: 0,
            freelist: SegQueue::new(),
            len: 0,
        })
    }

    #[inline]
    pub fn tag(&self) -> u16 {
        self.tag
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn available(&self) -> u32 {
        self.capacity() - self.len
    }

    /// Takes ownership of a fully built entry. `None` when exhausted, in which
    /// case `entry` is dropped and nothing else changes.
    pub fn alloc(&mut self, entry: PccEntry) -> Option<EntryId> {
        let index = if self.fresh < self.capacity {
            self.fresh += 1;
            self.fresh - 1
        } else {
            self.freelist.pop()?
        };
        let slot = &mut self.slots[index as usize];
        debug_assert!(slot.entry.is_none(), "freelist handed out a live slot");
        slot.entry = Some(entry);
        self.len += 1;
        trace!("[POOL] alloc index={} gen={}", index, slot.gen);
        Some(EntryId::new(self.tag, index, slot.gen))
    }

    #[inline]
    fn slot(&self, id: EntryId) -> Option<&Slot> {
        if id.table_tag() != self.tag {
            return None;
        }
        self.slots
            .get(id.index() as usize)
            .filter(|s| s.gen == id.generation())
    }

    #[inline]
    fn slot_mut(&mut self, id: EntryId) -> Option<&mut Slot> {
        if id.table_tag() != self.tag {
            return None;
        }
        self.slots
            .get_mut(id.index() as usize)
            .filter(|s| s.gen == id.generation())
    }

    /// Releases a live entry. Panics on a stale or foreign handle.
    pub fn free(&mut self, id: EntryId) -> PccEntry {
        let slot = self
            .slot_mut(id)
            .unwrap_or_else(|| panic!("erase of stale or foreign entry {:?}", id));
        let entry = slot
            .entry
            .take()
            .unwrap_or_else(|| panic!("double erase of entry {:?}", id));
        slot.gen = (slot.gen + 1) & SLOT_GEN_MASK as u32;
        let next_gen = slot.gen;
        self.len -= 1;
        self.freelist.push(id.index());
        trace!("[POOL] free index={} next_gen={}", id.index(), next_gen);
        entry
    }

    #[inline]
    pub fn get(&self, id: EntryId) -> Option<&PccEntry> {
        self.slot(id).and_then(|s| s.entry.as_ref())
    }

    #[inline]
    pub fn get_mut(&mut self, id: EntryId) -> Option<&mut PccEntry> {
        self.slot_mut(id).and_then(|s| s.entry.as_mut())
    }

    #[inline]
    pub fn contains(&self, id: EntryId) -> bool {
        self.get(id).is_some()
    }

    /// Like `get`, for handles the caller guarantees are live.
    #[inline]
    pub fn entry(&self, id: EntryId) -> &PccEntry {
        self.get(id)
            .unwrap_or_else(|| panic!("stale or foreign entry {:?}", id))
    }

    #[inline]
    pub fn entry_mut(&mut self, id: EntryId) -> &mut PccEntry {
        match self.get_mut(id) {
            Some(e) => e,
            None => panic!("stale or foreign entry {:?}", id),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntryId, &PccEntry)> + '_ {
        let tag = self.tag;
        self.slots.iter().enumerate().filter_map(move |(i, s)| {
            s.entry
                .as_ref()
                .map(|e| (EntryId::new(tag, i as u32, s.gen), e))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PccSearch;

    fn entry(name: &[u8]) -> PccEntry {
        let search = PccSearch::new(name);
        PccEntry::new(search.hash(), search.to_key())
    }

    #[test]
    fn alloc_until_exhausted() {
        let mut pool = EntryPool::new(2).unwrap();
        assert!(pool.alloc(entry(b"a")).is_some());
        assert!(pool.alloc(entry(b"b")).is_some());
        assert!(pool.alloc(entry(b"c")).is_none());
        assert_eq!(pool.len(), 2);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn freed_slot_gets_new_generation() {
        let mut pool = EntryPool::new(1).unwrap();
        let a = pool.alloc(entry(b"a")).unwrap();
        pool.free(a);
        let b = pool.alloc(entry(b"b")).unwrap();
        assert_eq!(a.index(), b.index());
        assert_ne!(a.generation(), b.generation());
        assert!(pool.get(a).is_none());
        assert_eq!(pool.entry(b).key().name(), b"b");
    }

    #[test]
    fn fifo_reuse_delays_slot_recycling() {
        let mut pool = EntryPool::new(3).unwrap();
        let a = pool.alloc(entry(b"a")).unwrap();
        pool.free(a);
        let b = pool.alloc(entry(b"b")).unwrap();
        assert_ne!(a.index(), b.index());
    }

    #[test]
    #[should_panic(expected = "stale or foreign")]
    fn double_free_panics() {
        let mut pool = EntryPool::new(4).unwrap();
        let a = pool.alloc(entry(b"a")).unwrap();
        pool.free(a);
        pool.free(a);
    }

    #[test]
    fn handles_from_another_pool_do_not_resolve() {
        let mut a = EntryPool::new(4).unwrap();
        let mut b = EntryPool::new(4).unwrap();
        let ida = a.alloc(entry(b"a")).unwrap();
        let idb = b.alloc(entry(b"b")).unwrap();
        assert_eq!(ida.index(), idb.index());
        assert_ne!(ida, idb);
        assert!(b.get(ida).is_none());
        assert!(b.get_mut(ida).is_none());
        assert!(!a.contains(idb));
    }

    #[test]
    #[should_panic(expected = "stale or foreign")]
    fn free_of_foreign_handle_panics() {
        let mut a = EntryPool::new(4).unwrap();
        let mut b = EntryPool::new(4).unwrap();
        let ida = a.alloc(entry(b"a")).unwrap();
        b.alloc(entry(b"b")).unwrap();
        b.free(ida);
    }

    #[test]
    fn iter_reports_live_entries() {
        let mut pool = EntryPool::new(4).unwrap();
        let a = pool.alloc(entry(b"a")).unwrap();
        let b = pool.alloc(entry(b"b")).unwrap();
        pool.free(a);
        let ids: Vec<_> = pool.iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec![b]);
    }
}
